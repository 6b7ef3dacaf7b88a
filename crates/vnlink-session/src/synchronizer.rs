//! Arbitration among dispatchers sharing one receive buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};
use vnlink_frame::sync::protocol_name;
use vnlink_frame::{RingByteBuffer, Validity, ASCII_SYNC, FA_SYNC, FB_SYNC};

use crate::config::SynchronizerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ErrorReporter, Result, SensorError};

/// Result of one [`PacketSynchronizer::dispatch_next_packet`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A frame was dispatched; call again.
    Dispatched,
    /// A frame has started but needs more bytes.
    Waiting,
    /// Nothing to do until more bytes arrive.
    Idle,
}

#[derive(Debug, Default)]
pub struct FrameCounters {
    valid: AtomicU64,
    invalid: AtomicU64,
}

/// Counters shared with observers on other threads.
#[derive(Debug, Default)]
pub struct SyncStats {
    received_bytes: AtomicU64,
    skipped_bytes: AtomicU64,
    ascii: FrameCounters,
    fa: FrameCounters,
    fb: FrameCounters,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received_bytes: u64,
    pub skipped_bytes: u64,
    pub ascii_valid: u64,
    pub ascii_invalid: u64,
    pub fa_valid: u64,
    pub fa_invalid: u64,
    pub fb_valid: u64,
    pub fb_invalid: u64,
}

impl SyncStats {
    fn counters(&self, sync: u8) -> Option<&FrameCounters> {
        match sync {
            ASCII_SYNC => Some(&self.ascii),
            FA_SYNC => Some(&self.fa),
            FB_SYNC => Some(&self.fb),
            _ => None,
        }
    }

    fn count_valid(&self, sync: u8) {
        if let Some(c) = self.counters(sync) {
            c.valid.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn count_invalid(&self, sync: u8) {
        if let Some(c) = self.counters(sync) {
            c.invalid.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |a: &AtomicU64| a.load(Ordering::Relaxed);
        StatsSnapshot {
            received_bytes: load(&self.received_bytes),
            skipped_bytes: load(&self.skipped_bytes),
            ascii_valid: load(&self.ascii.valid),
            ascii_invalid: load(&self.ascii.invalid),
            fa_valid: load(&self.fa.valid),
            fa_invalid: load(&self.fa.invalid),
            fb_valid: load(&self.fb.valid),
            fb_invalid: load(&self.fb.invalid),
        }
    }
}

/// Scans the receive buffer for frames and hands each to its dispatcher.
pub struct PacketSynchronizer {
    buffer: RingByteBuffer,
    dispatchers: Vec<Box<dyn Dispatcher>>,
    nominal_push_size: usize,
    /// Buffer length the last incomplete frame needs.
    waiting_for: Option<usize>,
    skipped_mirror: Option<RingByteBuffer>,
    received_mirror: Option<RingByteBuffer>,
    stats: Arc<SyncStats>,
    reporter: ErrorReporter,
}

impl PacketSynchronizer {
    pub fn new(config: &SynchronizerConfig, reporter: ErrorReporter) -> Self {
        let mirror = |cap: usize| (cap > 0).then(|| RingByteBuffer::new(cap));
        Self {
            buffer: RingByteBuffer::new(config.buffer_capacity),
            dispatchers: Vec::new(),
            nominal_push_size: config.nominal_push_size,
            waiting_for: None,
            skipped_mirror: mirror(config.skipped_mirror_capacity),
            received_mirror: mirror(config.received_mirror_capacity),
            stats: Arc::new(SyncStats::default()),
            reporter,
        }
    }

    /// Register a dispatcher. Earlier dispatchers get first claim on a
    /// shared sync byte.
    pub fn add_dispatcher(&mut self, dispatcher: Box<dyn Dispatcher>) {
        debug!(
            protocol = protocol_name(dispatcher.sync_byte()),
            "dispatcher registered"
        );
        self.dispatchers.push(dispatcher);
    }

    pub fn buffer(&self) -> &RingByteBuffer {
        &self.buffer
    }

    /// Room left in the receive buffer.
    pub fn free(&self) -> usize {
        self.buffer.free()
    }

    pub fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    /// Append received bytes. Fails without writing if they do not fit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(err) = self.buffer.put(bytes) {
            self.reporter.report(SensorError::PrimaryBufferFull, "");
            return Err(err.into());
        }
        self.stats
            .received_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        if let Some(mirror) = &mut self.received_mirror {
            if mirror.put(bytes).is_err() {
                self.reporter.report(SensorError::ReceivedByteBufferFull, "");
            }
        }
        Ok(())
    }

    /// Move mirrored skipped bytes into `out`.
    pub fn take_skipped(&mut self, out: &mut Vec<u8>) {
        take_mirror(self.skipped_mirror.as_mut(), out);
    }

    /// Move mirrored received bytes into `out`.
    pub fn take_received(&mut self, out: &mut Vec<u8>) {
        take_mirror(self.received_mirror.as_mut(), out);
    }

    /// Dispatch at most one frame from the front of the buffer.
    pub fn dispatch_next_packet(&mut self) -> Progress {
        if self.buffer.is_empty() {
            return Progress::Idle;
        }
        // Rescan once the buffer is nearly full, even mid-wait.
        let about_to_overrun = self.buffer.free() < self.nominal_push_size;
        if let Some(needed) = self.waiting_for.take() {
            if self.buffer.len() < needed && !about_to_overrun {
                self.waiting_for = Some(needed);
                return Progress::Waiting;
            }
        }

        let capacity = self.buffer.capacity();
        let len = self.buffer.len();
        for offset in 0..len {
            let byte = self.buffer.peek_unchecked(offset);
            for i in 0..self.dispatchers.len() {
                if self.dispatchers[i].sync_byte() != byte {
                    continue;
                }
                let found = self.dispatchers[i].find_packet(&self.buffer, offset);
                match found.validity {
                    Validity::Valid => {
                        self.skip(offset);
                        trace!(protocol = protocol_name(byte), length = found.length, "frame found");
                        self.dispatchers[i].dispatch_packet(&self.buffer, 0);
                        let consumed = found.length.max(1).min(self.buffer.len());
                        if let Err(err) = self.buffer.discard(consumed) {
                            debug!(error = %err, consumed, "discarding dispatched frame failed");
                        }
                        self.stats.count_valid(byte);
                        return Progress::Dispatched;
                    }
                    Validity::Incomplete if found.length > capacity => {
                        trace!(offset, needed = found.length, capacity, "frame cannot fit in buffer");
                        self.stats.count_invalid(byte);
                    }
                    Validity::Incomplete if !about_to_overrun => {
                        self.skip(offset);
                        self.waiting_for = Some(found.length);
                        trace!(
                            protocol = protocol_name(byte),
                            needed = found.length,
                            have = self.buffer.len(),
                            "waiting for rest of frame"
                        );
                        return Progress::Waiting;
                    }
                    Validity::Incomplete => {
                        trace!(offset, "incomplete frame would overrun buffer");
                    }
                    Validity::Invalid => self.stats.count_invalid(byte),
                }
            }
        }

        self.skip(len);
        Progress::Idle
    }

    /// Drop `n` bytes of noise from the front.
    fn skip(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if let Some(mirror) = &mut self.skipped_mirror {
            let mut noise = vec![0u8; n];
            let copied = self.buffer.peek(&mut noise, 0).is_ok();
            if !copied || mirror.put(&noise).is_err() {
                self.reporter.report(SensorError::SkippedByteBufferFull, "");
            }
        }
        if let Err(err) = self.buffer.discard(n) {
            debug!(error = %err, skipped = n, "discarding skipped bytes failed");
            return;
        }
        self.stats
            .skipped_bytes
            .fetch_add(n as u64, Ordering::Relaxed);
        debug!(skipped = n, "skipped bytes");
    }
}

fn take_mirror(mirror: Option<&mut RingByteBuffer>, out: &mut Vec<u8>) {
    if let Some(mirror) = mirror {
        out.extend(mirror.to_vec());
        mirror.clear();
    }
}
