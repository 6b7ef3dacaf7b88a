use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};
use vnlink_frame::{AsciiMetadata, FaMetadata};
use vnlink_transport::{ByteSink, ByteSource, TransportError};

use crate::command::Command;
use crate::config::SensorConfig;
use crate::dispatch::{AsciiDispatcher, FaDispatcher, FaOutputs, FbDispatcher, Measurement};
use crate::error::{error_channel, AsyncError, ErrorReporter, Result, SensorError, SessionError};
use crate::processor::CommandProcessor;
use crate::queue::MeasurementQueue;
use crate::subscriber::{AsciiFilter, FaFilter, Packet, SubscriberList};
use crate::synchronizer::{PacketSynchronizer, Progress, StatsSnapshot, SyncStats};

/// Pause between polls when the source has nothing to give.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// What one [`Sensor::process_available`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Activity {
    pub read: usize,
    pub dispatched: usize,
}

/// Registers commands and writes them to the sensor. Cheap to clone.
pub struct CommandSender<W> {
    processor: Arc<CommandProcessor>,
    sink: Arc<Mutex<W>>,
}

impl<W> Clone for CommandSender<W> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<W: ByteSink> CommandSender<W> {
    /// Queue `command` for a response and transmit it. Returns the text sent.
    pub fn send(&self, command: &Arc<Command>, timeout: Option<Duration>) -> Result<String> {
        let text = self.processor.register_command(command, timeout)?;
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = sink.write_bytes(text.as_bytes()) {
            command.set_stale();
            return Err(err.into());
        }
        debug!(command = command.command_string(), "command sent");
        Ok(text)
    }

    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.processor
    }
}

/// Consumer-side handles shared by [`Sensor`] and [`SensorHandle`].
struct Endpoints<W> {
    commands: CommandSender<W>,
    measurements: Arc<MeasurementQueue<Measurement>>,
    errors: Receiver<AsyncError>,
    ascii_subscribers: Arc<SubscriberList<AsciiFilter, AsciiMetadata>>,
    fa_subscribers: Arc<SubscriberList<FaFilter, FaMetadata>>,
    stats: Arc<SyncStats>,
}

/// The I/O context: source, receive buffer and dispatchers.
struct Io<S> {
    source: S,
    synchronizer: PacketSynchronizer,
    chunk: Vec<u8>,
    reporter: ErrorReporter,
}

impl<S: ByteSource> Io<S> {
    fn process_available(&mut self) -> Result<Activity> {
        let read = match self.source.read_bytes(&mut self.chunk) {
            Ok(n) => n,
            Err(TransportError::Closed) => return Err(TransportError::Closed.into()),
            Err(err) => {
                self.reporter
                    .report(SensorError::SerialReadFailed, err.to_string());
                return Err(err.into());
            }
        };

        // Feed the chunk in pieces that fit, dispatching between them.
        let mut pending = &self.chunk[..read];
        let mut dispatched = 0;
        loop {
            let fits = pending.len().min(self.synchronizer.free());
            if fits > 0 {
                self.synchronizer.push(&pending[..fits])?;
                pending = &pending[fits..];
            }
            while self.synchronizer.dispatch_next_packet() == Progress::Dispatched {
                dispatched += 1;
            }
            if pending.is_empty() {
                break;
            }
            if self.synchronizer.free() == 0 {
                warn!(dropped = pending.len(), "receive buffer full; bytes dropped");
                self.reporter.report(SensorError::PrimaryBufferFull, "");
                break;
            }
        }
        Ok(Activity { read, dispatched })
    }
}

/// A sensor link: byte source in, commands out, decoded measurements and
/// async errors available to the caller.
pub struct Sensor<S, W> {
    io: Io<S>,
    endpoints: Endpoints<W>,
}

impl<S: ByteSource, W: ByteSink> Sensor<S, W> {
    pub fn new(source: S, sink: W, config: SensorConfig) -> Self {
        let (reporter, errors) = error_channel(config.async_error_capacity);
        let measurements = Arc::new(MeasurementQueue::new(config.measurement_queue_capacity));
        let processor = Arc::new(CommandProcessor::new(
            config.processor.clone(),
            reporter.clone(),
        ));
        let ascii_subscribers = Arc::new(SubscriberList::new());
        let fa_subscribers = Arc::new(SubscriberList::new());

        let fa = FaDispatcher::new(
            config.frame.clone(),
            Arc::new(FaOutputs {
                subscribers: Arc::clone(&fa_subscribers),
                measurements: Arc::clone(&measurements),
                reporter: reporter.clone(),
            }),
        );
        let fb = FbDispatcher::new(config.frame.clone(), fa.fork());
        let ascii = AsciiDispatcher::new(
            config.frame.clone(),
            Arc::clone(&ascii_subscribers),
            Arc::clone(&measurements),
            reporter.clone(),
        )
        .with_processor(Arc::clone(&processor));

        let mut synchronizer = PacketSynchronizer::new(&config.synchronizer, reporter.clone());
        synchronizer.add_dispatcher(Box::new(ascii));
        synchronizer.add_dispatcher(Box::new(fa));
        synchronizer.add_dispatcher(Box::new(fb));
        let stats = Arc::clone(synchronizer.stats());

        Self {
            io: Io {
                source,
                synchronizer,
                chunk: vec![0; config.read_chunk_size.max(1)],
                reporter,
            },
            endpoints: Endpoints {
                commands: CommandSender {
                    processor,
                    sink: Arc::new(Mutex::new(sink)),
                },
                measurements,
                errors,
                ascii_subscribers,
                fa_subscribers,
                stats,
            },
        }
    }

    /// Read one chunk from the source and dispatch every complete frame.
    ///
    /// End of stream surfaces as `TransportError::Closed`.
    pub fn process_available(&mut self) -> Result<Activity> {
        self.io.process_available()
    }

    pub fn send_command(&self, command: &Arc<Command>, timeout: Option<Duration>) -> Result<String> {
        self.endpoints.commands.send(command, timeout)
    }

    pub fn commands(&self) -> CommandSender<W> {
        self.endpoints.commands.clone()
    }

    pub fn measurements(&self) -> &Arc<MeasurementQueue<Measurement>> {
        &self.endpoints.measurements
    }

    pub fn async_errors(&self) -> &Receiver<AsyncError> {
        &self.endpoints.errors
    }

    pub fn subscribe_ascii(&self, filter: AsciiFilter, capacity: usize) -> Receiver<Packet<AsciiMetadata>> {
        self.endpoints.ascii_subscribers.subscribe(filter, capacity)
    }

    pub fn subscribe_fa(&self, filter: FaFilter, capacity: usize) -> Receiver<Packet<FaMetadata>> {
        self.endpoints.fa_subscribers.subscribe(filter, capacity)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.endpoints.stats.snapshot()
    }

    /// Mirrored skipped bytes, when the mirror is enabled.
    pub fn take_skipped(&mut self, out: &mut Vec<u8>) {
        self.io.synchronizer.take_skipped(out);
    }
}

impl<S, W> Sensor<S, W>
where
    S: ByteSource + 'static,
    W: ByteSink + 'static,
{
    /// Move the I/O context onto its own thread.
    pub fn spawn(self) -> Result<SensorHandle<W>> {
        let Sensor { mut io, endpoints } = self;
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("vnlink-io".to_string())
            .spawn(move || {
                info!("sensor i/o started");
                while flag.load(Ordering::Acquire) {
                    match io.process_available() {
                        Ok(activity) if activity.read == 0 => thread::sleep(IDLE_BACKOFF),
                        Ok(_) => {}
                        Err(SessionError::Transport(TransportError::Closed)) => {
                            info!("sensor source closed");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "sensor read failed");
                            thread::sleep(IDLE_BACKOFF);
                        }
                    }
                }
                flag.store(false, Ordering::Release);
                info!("sensor i/o stopped");
            })
            .map_err(TransportError::from)?;

        Ok(SensorHandle {
            endpoints,
            running,
            thread: Some(thread),
        })
    }
}

/// A sensor whose I/O runs on a background thread. Dropping the handle
/// stops the thread.
pub struct SensorHandle<W> {
    endpoints: Endpoints<W>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl<W: ByteSink> SensorHandle<W> {
    pub fn send_command(&self, command: &Arc<Command>, timeout: Option<Duration>) -> Result<String> {
        self.endpoints.commands.send(command, timeout)
    }

    pub fn commands(&self) -> CommandSender<W> {
        self.endpoints.commands.clone()
    }
}

impl<W> SensorHandle<W> {
    pub fn measurements(&self) -> &Arc<MeasurementQueue<Measurement>> {
        &self.endpoints.measurements
    }

    pub fn async_errors(&self) -> &Receiver<AsyncError> {
        &self.endpoints.errors
    }

    pub fn subscribe_ascii(&self, filter: AsciiFilter, capacity: usize) -> Receiver<Packet<AsciiMetadata>> {
        self.endpoints.ascii_subscribers.subscribe(filter, capacity)
    }

    pub fn subscribe_fa(&self, filter: FaFilter, capacity: usize) -> Receiver<Packet<FaMetadata>> {
        self.endpoints.fa_subscribers.subscribe(filter, capacity)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.endpoints.stats.snapshot()
    }

    /// False once stopped or once the source has closed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the I/O thread to stop after its current read.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Stop and wait for the I/O thread.
    pub fn join(mut self) -> Result<()> {
        self.stop();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| SessionError::ThreadPanicked),
            None => Ok(()),
        }
    }
}

impl<W> Drop for SensorHandle<W> {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Instant;

    use vnlink_frame::{encode_ascii, encode_fa, AsciiChecksum};
    use vnlink_transport::CaptureSink;

    use super::*;
    use crate::command::CommandOutcome;
    use crate::config::SynchronizerConfig;
    use crate::dispatch::Protocol;

    /// Hands out scripted chunks, then reports end of stream.
    struct Script(VecDeque<Vec<u8>>);

    impl ByteSource for Script {
        fn read_bytes(&mut self, buf: &mut [u8]) -> vnlink_transport::Result<usize> {
            let Some(mut chunk) = self.0.pop_front() else {
                return Err(TransportError::Closed);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.0.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    fn ypr_fa() -> Vec<u8> {
        let mut payload = Vec::new();
        for v in [10.0f32, -2.0, 0.1] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        encode_fa(&[0x10], &[0x0002], &payload)
    }

    #[test]
    fn processes_mixed_stream() {
        let mut stream = encode_ascii("VNYPR,+010.0,-002.0,+000.1", AsciiChecksum::Xor8).into_bytes();
        stream.extend(ypr_fa());
        let (a, b) = stream.split_at(20);
        let source = Script(VecDeque::from([a.to_vec(), Vec::new(), b.to_vec()]));
        let mut sensor = Sensor::new(source, CaptureSink::new(), SensorConfig::default());

        let mut total = 0;
        loop {
            match sensor.process_available() {
                Ok(activity) => total += activity.dispatched,
                Err(SessionError::Transport(TransportError::Closed)) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(total, 2);

        let protocols: Vec<_> = sensor.measurements().drain().map(|m| m.protocol).collect();
        assert_eq!(protocols, vec![Protocol::Ascii, Protocol::Binary]);
        let stats = sensor.stats();
        assert_eq!(stats.ascii_valid, 1);
        assert_eq!(stats.fa_valid, 1);
        assert_eq!(stats.received_bytes, stream.len() as u64);
    }

    #[test]
    fn stray_fa_sync_in_noise_does_not_stall_decoding() {
        // Quaternion, DCM and AttU claim a 62 byte frame; filler follows.
        let mut stream = b"\x01\x02\x03\x04".to_vec();
        stream.extend_from_slice(&encode_fa(&[0x10], &[0x200C], &[])[..4]);
        stream.extend([b'.'; 20]);
        for _ in 0..20 {
            stream.extend_from_slice(b"$VNYPR,+010.0,-002.0,+000.1*6E\r\n");
        }

        let config = SensorConfig {
            synchronizer: SynchronizerConfig {
                buffer_capacity: 64,
                nominal_push_size: 8,
                ..SynchronizerConfig::default()
            },
            read_chunk_size: 16,
            ..SensorConfig::default()
        };
        let source = Script(VecDeque::from([stream.clone()]));
        let mut sensor = Sensor::new(source, CaptureSink::new(), config);

        let mut total = 0;
        loop {
            match sensor.process_available() {
                Ok(activity) => total += activity.dispatched,
                Err(SessionError::Transport(TransportError::Closed)) => break,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(total, 20);
        assert_eq!(sensor.measurements().drain().count(), 20);

        let stats = sensor.stats();
        assert_eq!(stats.ascii_valid, 20);
        assert_eq!(stats.received_bytes, stream.len() as u64);
        assert!(sensor.async_errors().try_recv().is_err());
    }

    #[test]
    fn ascii_subscriber_reads_tokens_of_its_copy() {
        let line = encode_ascii("VNYPR,+010.0,-002.0,+000.1", AsciiChecksum::Xor8);
        let source = Script(VecDeque::from([line.into_bytes()]));
        let mut sensor = Sensor::new(source, CaptureSink::new(), SensorConfig::default());
        let rx = sensor.subscribe_ascii(AsciiFilter::StartsWith("VNYPR".into()), 4);

        sensor.process_available().unwrap();
        let packet = rx.try_recv().unwrap();
        let tokens: Vec<&str> = packet.metadata.tokens(&packet.bytes).collect();
        assert_eq!(tokens, ["+010.0", "-002.0", "+000.1"]);
    }

    #[test]
    fn command_round_trip_through_stream() {
        let response = encode_ascii("VNRRG,05,115200", AsciiChecksum::Crc16);
        let sink = CaptureSink::new();
        let source = Script(VecDeque::from([response.clone().into_bytes()]));
        let mut sensor = Sensor::new(source, sink.clone(), SensorConfig::default());

        let cmd = Arc::new(Command::read_register(5));
        let sent = sensor.send_command(&cmd, None).unwrap();
        assert_eq!(sink.contents(), sent.into_bytes());

        sensor.process_available().unwrap();
        assert_eq!(
            cmd.outcome(),
            CommandOutcome::Response(response.trim_end().to_string())
        );
    }

    #[test]
    fn spawned_sensor_stops_at_end_of_stream() {
        let frames: Vec<Vec<u8>> = (0..5).map(|_| ypr_fa()).collect();
        let source = Script(frames.into());
        let handle = Sensor::new(source, CaptureSink::new(), SensorConfig::default())
            .spawn()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!handle.is_running());
        assert_eq!(handle.measurements().drain().count(), 5);
        assert_eq!(handle.stats().fa_valid, 5);
        handle.join().unwrap();
    }

    #[test]
    fn async_errors_reach_consumer() {
        let source = Script(VecDeque::from([encode_ascii("VNERR,03", AsciiChecksum::Crc16).into_bytes()]));
        let mut sensor = Sensor::new(source, CaptureSink::new(), SensorConfig::default());
        sensor.process_available().unwrap();
        let err = sensor.async_errors().try_recv().unwrap();
        assert_eq!(err.kind, SensorError::InvalidChecksum);
    }
}
