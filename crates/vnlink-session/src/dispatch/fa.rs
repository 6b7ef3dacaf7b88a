use std::sync::Arc;

use tracing::{debug, trace};
use vnlink_frame::{find_fa_packet, FaMetadata, FindResult, FrameConfig, RingByteBuffer, FA_SYNC};
use vnlink_measure::{parse_fa_packet, EnabledMeasurements};

use super::{copy_frame, Dispatcher, Measurement, Protocol};
use crate::error::{ErrorReporter, SensorError};
use crate::queue::MeasurementQueue;
use crate::subscriber::{FaFilter, SubscriberList};

/// Where valid binary frames go. Shared by the FA dispatcher and the FB
/// dispatcher's reassembly path.
pub struct FaOutputs {
    pub subscribers: Arc<SubscriberList<FaFilter, FaMetadata>>,
    pub measurements: Arc<MeasurementQueue<Measurement>>,
    pub reporter: ErrorReporter,
}

pub struct FaDispatcher {
    config: FrameConfig,
    outputs: Arc<FaOutputs>,
    pending: Option<FaMetadata>,
}

impl FaDispatcher {
    pub fn new(config: FrameConfig, outputs: Arc<FaOutputs>) -> Self {
        Self {
            config,
            outputs,
            pending: None,
        }
    }

    /// A second dispatcher feeding the same outputs.
    pub fn fork(&self) -> Self {
        Self::new(self.config.clone(), Arc::clone(&self.outputs))
    }

    pub fn outputs(&self) -> &Arc<FaOutputs> {
        &self.outputs
    }
}

impl Dispatcher for FaDispatcher {
    fn sync_byte(&self) -> u8 {
        FA_SYNC
    }

    fn find_packet(&mut self, buf: &RingByteBuffer, offset: usize) -> FindResult {
        let found = find_fa_packet(buf, offset, &self.config);
        let result = found.find_result();
        self.pending = found.into_valid();
        result
    }

    fn dispatch_packet(&mut self, buf: &RingByteBuffer, offset: usize) {
        let Some(meta) = self.pending.take() else {
            return;
        };
        let out = &self.outputs;
        out.subscribers.publish(
            &meta,
            || copy_frame(buf, offset, meta.length),
            &out.reporter,
        );

        let header = EnabledMeasurements::from_binary_header(&meta.header);
        if !out.measurements.is_enabled() || header.is_empty() {
            return;
        }
        match parse_fa_packet(buf, offset, &meta) {
            Ok(data) => {
                trace!(offset, length = meta.length, "binary measurement decoded");
                let m = Measurement {
                    protocol: Protocol::Binary,
                    header,
                    timestamp: meta.timestamp,
                    data,
                };
                if out.measurements.try_put(m).is_err() {
                    debug!("measurement queue full; dropping binary frame");
                    out.reporter.report(SensorError::MeasurementQueueFull, "");
                }
            }
            Err(err) => debug!(offset, error = %err, "binary frame failed to decode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use vnlink_frame::fields::{attitude, group};
    use vnlink_frame::{encode_fa, Validity};

    use super::*;
    use crate::error::error_channel;

    fn ypr_frame(yaw: f32) -> Vec<u8> {
        let mut payload = Vec::new();
        for v in [yaw, -2.0f32, 0.1] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        encode_fa(&[0x10], &[0x0002], &payload)
    }

    #[test]
    fn valid_frame_reaches_queue_and_subscribers() {
        let (reporter, _errors) = error_channel(4);
        let outputs = Arc::new(FaOutputs {
            subscribers: Arc::new(SubscriberList::new()),
            measurements: Arc::new(MeasurementQueue::new(4)),
            reporter,
        });
        let ypr = EnabledMeasurements::new().with(group::ATTITUDE, attitude::YPR);
        let rx = outputs.subscribers.subscribe(FaFilter::Exact(ypr), 4);
        let mut d = FaDispatcher::new(FrameConfig::default(), Arc::clone(&outputs));

        let frame = ypr_frame(10.0);
        let mut buf = RingByteBuffer::new(64);
        buf.put(&frame).unwrap();

        let found = d.find_packet(&buf, 0);
        assert_eq!(found.validity, Validity::Valid);
        assert_eq!(found.length, frame.len());
        d.dispatch_packet(&buf, 0);

        let m = outputs.measurements.try_get().unwrap();
        assert_eq!(m.protocol, Protocol::Binary);
        assert_eq!(m.header, ypr);
        assert_eq!(m.data.attitude.ypr.unwrap().yaw, 10.0);
        assert_eq!(rx.try_recv().unwrap().bytes.as_ref(), frame.as_slice());
    }

    #[test]
    fn dispatch_without_find_is_a_no_op() {
        let outputs = Arc::new(FaOutputs {
            subscribers: Arc::new(SubscriberList::new()),
            measurements: Arc::new(MeasurementQueue::new(1)),
            reporter: ErrorReporter::disabled(),
        });
        let mut d = FaDispatcher::new(FrameConfig::default(), Arc::clone(&outputs));
        let mut buf = RingByteBuffer::new(64);
        buf.put(&ypr_frame(1.0)).unwrap();
        d.dispatch_packet(&buf, 0);
        assert!(outputs.measurements.is_empty());
    }
}
