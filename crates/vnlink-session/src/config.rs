use std::time::Duration;

use serde::{Deserialize, Serialize};
use vnlink_frame::{AsciiChecksum, FrameConfig};

/// Ring buffer sizing and diagnostic mirrors for the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynchronizerConfig {
    /// Capacity of the shared receive buffer.
    pub buffer_capacity: usize,
    /// Typical bytes per transport read. An incomplete frame is abandoned
    /// when less than this much room is left.
    pub nominal_push_size: usize,
    /// Capacity of the skipped-byte mirror; 0 disables it.
    pub skipped_mirror_capacity: usize,
    /// Capacity of the received-byte mirror; 0 disables it.
    pub received_mirror_capacity: usize,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            nominal_push_size: 1024,
            skipped_mirror_capacity: 0,
            received_mirror_capacity: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Commands that may await a response at once.
    pub queue_capacity: usize,
    /// Response timeout when a command does not name one.
    pub default_timeout_ms: u64,
    /// Trailer appended to outgoing commands.
    pub checksum: AsciiChecksum,
}

impl ProcessorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            default_timeout_ms: 500,
            checksum: AsciiChecksum::Crc16,
        }
    }
}

/// Everything needed to stand up a [`Sensor`](crate::Sensor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub frame: FrameConfig,
    pub synchronizer: SynchronizerConfig,
    pub processor: ProcessorConfig,
    /// Decoded measurements buffered for the consumer; 0 disables decoding.
    pub measurement_queue_capacity: usize,
    pub async_error_capacity: usize,
    /// Bytes requested from the source per read.
    pub read_chunk_size: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            synchronizer: SynchronizerConfig::default(),
            processor: ProcessorConfig::default(),
            measurement_queue_capacity: 32,
            async_error_capacity: 32,
            read_chunk_size: 1024,
        }
    }
}
