use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::sink::StreamSink;
use crate::traits::{ByteSink, ByteSource};

/// Factory default baud rate of the sensor's serial ports.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Rates the sensor's serial ports can be set to.
pub const SUPPORTED_BAUDS: [u32; 9] = [
    9_600, 19_200, 38_400, 57_600, 115_200, 128_000, 230_400, 460_800, 921_600,
];

/// Longest a read blocks on a silent line.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Command half of a [`SerialPort`], writing through a cloned handle.
pub type SerialSink = StreamSink<Box<dyn serialport::SerialPort>>;

/// A serial device opened 8N1 without flow control.
///
/// Reads return after at most [`READ_TIMEOUT`] even when the line is
/// silent, so a driver loop can notice a stop request.
pub struct SerialPort {
    port: Box<dyn serialport::SerialPort>,
    path: PathBuf,
    baud: u32,
}

impl SerialPort {
    /// Open `path` and configure it for `baud`.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_baud(baud)?;

        let port = serialport::new(path.to_string_lossy(), baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|err| open_error(&path, err))?;

        port.clear(ClearBuffer::Input)
            .map_err(|err| TransportError::Configure {
                path: path.clone(),
                source: err.into(),
            })?;

        info!(?path, baud, "opened serial device");
        Ok(Self { port, path, baud })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// Second handle on the same device for writing commands while another
    /// thread reads.
    pub fn try_clone_sink(&self) -> Result<SerialSink> {
        let port = self
            .port
            .try_clone()
            .map_err(|err| TransportError::Io(err.into()))?;
        debug!(path = ?self.path, "cloned serial handle for writing");
        Ok(StreamSink::new(port))
    }
}

impl ByteSource for SerialPort {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        // A timed out read is a silent poll interval, not end of stream.
        loop {
            match self.port.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => return Ok(0),
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl ByteSink for SerialPort {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .field("baud", &self.baud)
            .finish()
    }
}

/// Reject rates the sensor cannot be configured for.
pub fn check_baud(baud: u32) -> Result<()> {
    if SUPPORTED_BAUDS.contains(&baud) {
        Ok(())
    } else {
        Err(TransportError::UnsupportedBaud(baud))
    }
}

/// Line-setting rejections are configuration failures; the rest mean the
/// device could not be opened.
fn open_error(path: &Path, err: serialport::Error) -> TransportError {
    let path = path.to_path_buf();
    match err.kind() {
        serialport::ErrorKind::InvalidInput => TransportError::Configure {
            path,
            source: err.into(),
        },
        _ => TransportError::Open {
            path,
            source: err.into(),
        },
    }
}
