use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tracing::debug;
use vnlink_frame::{AsciiMetadata, FaMetadata};
use vnlink_measure::EnabledMeasurements;

use crate::error::{ErrorReporter, SensorError};

/// A raw frame copied out for a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet<M> {
    /// Whole frame, sync byte through checksum.
    pub bytes: Bytes,
    pub metadata: M,
}

/// Decides whether a subscriber wants a frame.
pub trait PacketFilter<M>: Send {
    fn matches(&self, metadata: &M) -> bool;
}

/// Header-prefix filter for ASCII frames, e.g. `VNYPR` or `VN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsciiFilter {
    StartsWith(String),
    DoesNotStartWith(String),
}

impl PacketFilter<AsciiMetadata> for AsciiFilter {
    fn matches(&self, metadata: &AsciiMetadata) -> bool {
        match self {
            Self::StartsWith(prefix) => metadata.header().starts_with(prefix.as_str()),
            Self::DoesNotStartWith(prefix) => !metadata.header().starts_with(prefix.as_str()),
        }
    }
}

/// Measurement-content filter for binary frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaFilter {
    /// Exactly these measurements.
    Exact(EnabledMeasurements),
    /// At least one of these measurements.
    Any(EnabledMeasurements),
    /// Anything but exactly these measurements.
    NotExact(EnabledMeasurements),
}

impl PacketFilter<FaMetadata> for FaFilter {
    fn matches(&self, metadata: &FaMetadata) -> bool {
        let carried = EnabledMeasurements::from_binary_header(&metadata.header);
        match self {
            Self::Exact(want) => carried == *want,
            Self::Any(want) => carried.overlaps(want),
            Self::NotExact(want) => carried != *want,
        }
    }
}

struct Subscriber<F, M> {
    filter: F,
    tx: SyncSender<Packet<M>>,
}

/// Subscribers of one protocol. Shared between the consumer, who adds
/// subscribers, and the I/O context, which publishes to them.
pub struct SubscriberList<F, M> {
    inner: Mutex<Vec<Subscriber<F, M>>>,
}

impl<F, M> Default for SubscriberList<F, M> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl<F: PacketFilter<M>, M: Clone> SubscriberList<F, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a queue of `capacity` frames.
    pub fn subscribe(&self, filter: F, capacity: usize) -> Receiver<Packet<M>> {
        let (tx, rx) = sync_channel(capacity);
        self.lock().push(Subscriber { filter, tx });
        rx
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer a frame to every matching subscriber without blocking.
    ///
    /// `copy` runs at most once. Full queues drop the frame; subscribers
    /// whose receiver is gone are removed.
    pub fn publish(&self, metadata: &M, copy: impl FnOnce() -> Option<Bytes>, reporter: &ErrorReporter) {
        let mut subs = self.lock();
        if subs.is_empty() {
            return;
        }

        let mut copy = Some(copy);
        let mut bytes: Option<Bytes> = None;
        subs.retain(|sub| {
            if !sub.filter.matches(metadata) {
                return true;
            }
            if bytes.is_none() {
                bytes = copy.take().and_then(|f| f());
            }
            let Some(frame) = &bytes else {
                return true;
            };
            let packet = Packet {
                bytes: frame.clone(),
                metadata: metadata.clone(),
            };
            match sub.tx.try_send(packet) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    debug!("subscriber queue full; dropping frame");
                    reporter.report(SensorError::SubscriberQueueFull, "");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber<F, M>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
