use std::sync::Arc;

use tracing::{debug, trace};
use vnlink_frame::{
    find_ascii_packet, AsciiMetadata, FindResult, FrameConfig, RingByteBuffer, ASCII_SYNC,
};
use vnlink_measure::{ascii_header_to_meas_header, parse_ascii_packet};

use super::{copy_frame, Dispatcher, Measurement, Protocol};
use crate::error::{ErrorReporter, SensorError};
use crate::processor::CommandProcessor;
use crate::queue::MeasurementQueue;
use crate::subscriber::{AsciiFilter, SubscriberList};

/// Routes ASCII measurement outputs to the queue and everything else to the
/// command processor.
pub struct AsciiDispatcher {
    config: FrameConfig,
    subscribers: Arc<SubscriberList<AsciiFilter, AsciiMetadata>>,
    measurements: Arc<MeasurementQueue<Measurement>>,
    processor: Option<Arc<CommandProcessor>>,
    reporter: ErrorReporter,
    pending: Option<AsciiMetadata>,
}

impl AsciiDispatcher {
    pub fn new(
        config: FrameConfig,
        subscribers: Arc<SubscriberList<AsciiFilter, AsciiMetadata>>,
        measurements: Arc<MeasurementQueue<Measurement>>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            config,
            subscribers,
            measurements,
            processor: None,
            reporter,
            pending: None,
        }
    }

    /// Send non-measurement frames to `processor`.
    pub fn with_processor(mut self, processor: Arc<CommandProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }
}

impl Dispatcher for AsciiDispatcher {
    fn sync_byte(&self) -> u8 {
        ASCII_SYNC
    }

    fn find_packet(&mut self, buf: &RingByteBuffer, offset: usize) -> FindResult {
        let found = find_ascii_packet(buf, offset, &self.config);
        let result = found.find_result();
        self.pending = found.into_valid();
        result
    }

    fn dispatch_packet(&mut self, buf: &RingByteBuffer, offset: usize) {
        let Some(meta) = self.pending.take() else {
            return;
        };
        self.subscribers.publish(
            &meta,
            || copy_frame(buf, offset, meta.length()),
            &self.reporter,
        );

        let Some(header) = ascii_header_to_meas_header(meta.header()) else {
            match (&self.processor, meta.text(buf, offset)) {
                (Some(processor), Some(text)) => processor.match_response(&text, &meta),
                (None, _) => trace!(header = meta.header(), "no command processor; ignoring"),
                (_, None) => debug!(offset, "response frame is not utf-8"),
            }
            return;
        };

        if !self.measurements.is_enabled() {
            return;
        }
        match parse_ascii_packet(buf, offset, &meta) {
            Ok(data) => {
                let m = Measurement {
                    protocol: Protocol::Ascii,
                    header,
                    timestamp: meta.timestamp(),
                    data,
                };
                if self.measurements.try_put(m).is_err() {
                    debug!("measurement queue full; dropping ascii frame");
                    self.reporter.report(SensorError::MeasurementQueueFull, "");
                }
            }
            Err(err) => debug!(header = meta.header(), error = %err, "ascii frame failed to decode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use vnlink_frame::{encode_ascii, AsciiChecksum, Validity};

    use super::*;
    use crate::command::Command;
    use crate::config::ProcessorConfig;

    fn dispatcher(queue: usize) -> (AsciiDispatcher, Arc<MeasurementQueue<Measurement>>) {
        let queue = Arc::new(MeasurementQueue::new(queue));
        let d = AsciiDispatcher::new(
            FrameConfig::default(),
            Arc::new(SubscriberList::new()),
            Arc::clone(&queue),
            ErrorReporter::disabled(),
        );
        (d, queue)
    }

    fn run(d: &mut AsciiDispatcher, text: &str) {
        let mut buf = RingByteBuffer::new(256);
        buf.put(text.as_bytes()).unwrap();
        assert_eq!(d.find_packet(&buf, 0).validity, Validity::Valid);
        d.dispatch_packet(&buf, 0);
    }

    #[test]
    fn measurement_frame_is_decoded() {
        let (mut d, queue) = dispatcher(2);
        run(&mut d, "$VNYPR,+010.0,-002.0,+000.1*6E\r\n");
        let m = queue.try_get().unwrap();
        assert_eq!(m.protocol, Protocol::Ascii);
        let ypr = m.data.attitude.ypr.unwrap();
        assert!((ypr.yaw - 10.0).abs() < 1e-6);
    }

    #[test]
    fn response_frame_goes_to_processor() {
        let (d, queue) = dispatcher(2);
        let processor = Arc::new(CommandProcessor::new(
            ProcessorConfig::default(),
            ErrorReporter::disabled(),
        ));
        let mut d = d.with_processor(Arc::clone(&processor));

        let cmd = Arc::new(Command::read_register(8));
        processor.register_command(&cmd, None).unwrap();
        let response = encode_ascii("VNRRG,08,+010.0,-002.0,+000.1", AsciiChecksum::Crc16);
        run(&mut d, &response);

        assert!(queue.is_empty());
        assert!(!cmd.is_awaiting_response());
        assert_eq!(cmd.response().as_deref(), Some(response.trim_end()));
    }
}
