//! Per-protocol validate, decode and fan-out.

mod ascii;
mod fa;
mod fb;

use std::time::Instant;

use serde::Serialize;
use vnlink_frame::{FindResult, RingByteBuffer};
use vnlink_measure::{CompositeData, EnabledMeasurements};

pub use ascii::AsciiDispatcher;
pub use fa::{FaDispatcher, FaOutputs};
pub use fb::FbDispatcher;

/// One protocol's handler on the shared stream.
///
/// The synchronizer calls [`find_packet`](Dispatcher::find_packet) at every
/// offset holding [`sync_byte`](Dispatcher::sync_byte) and, when it reports a
/// valid frame, calls [`dispatch_packet`](Dispatcher::dispatch_packet) with the
/// frame moved to the front of the buffer.
pub trait Dispatcher: Send {
    fn sync_byte(&self) -> u8;

    /// Check the candidate frame at `offset`, remembering its metadata.
    fn find_packet(&mut self, buf: &RingByteBuffer, offset: usize) -> FindResult;

    /// Hand off the frame last found valid, now at `offset`.
    fn dispatch_packet(&mut self, buf: &RingByteBuffer, offset: usize);
}

/// Framing a measurement arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ascii,
    Binary,
}

/// A decoded frame as delivered to the measurement queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub protocol: Protocol,
    /// Fields the frame carried.
    pub header: EnabledMeasurements,
    #[serde(skip)]
    pub timestamp: Instant,
    pub data: CompositeData,
}

fn copy_frame(buf: &RingByteBuffer, offset: usize, len: usize) -> Option<bytes::Bytes> {
    let mut raw = bytes::BytesMut::zeroed(len);
    buf.peek(&mut raw, offset).ok()?;
    Some(raw.freeze())
}
