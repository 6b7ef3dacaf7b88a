use std::sync::mpsc::Receiver;

use tracing::{info, warn};
use vnlink_frame::FA_MIN_LENGTH;
use vnlink_session::{AsyncError, Sensor, SensorConfig, SessionError, StatsSnapshot};
use vnlink_transport::{NullSink, StreamSource, TransportError};

use crate::cmd::ReplayArgs;
use crate::exit::{session_error, transport_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_measurement, print_stats, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat, mut config: SensorConfig) -> CliResult<i32> {
    let source = StreamSource::open_file(&args.path)
        .map_err(|err| transport_error("open capture failed", err))?;

    // Room for a full buffer of minimum-length frames per read.
    config.measurement_queue_capacity = config
        .measurement_queue_capacity
        .max(config.synchronizer.buffer_capacity / FA_MIN_LENGTH);
    let mut sensor = Sensor::new(source, NullSink, config);

    info!(path = %args.path.display(), "replaying capture");
    let mut printed = 0usize;

    'read: loop {
        match sensor.process_available() {
            Ok(_) => {}
            Err(SessionError::Transport(TransportError::Closed)) => break,
            Err(err) => return Err(session_error("replay failed", err)),
        }

        for measurement in sensor.measurements().drain() {
            if !args.stats_only {
                print_measurement(printed, &measurement, format);
            }
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break 'read;
            }
        }
        log_async_errors(sensor.async_errors());
    }

    let stats = sensor.stats();
    print_stats(&stats, printed, format);
    check_decoded(&stats)?;
    Ok(SUCCESS)
}

pub(crate) fn log_async_errors(errors: &Receiver<AsyncError>) {
    while let Ok(err) = errors.try_recv() {
        warn!(kind = %err.kind, message = %err.message, "sensor reported error");
    }
}

/// A stream that carried bytes but no valid frame is not sensor output.
fn check_decoded(stats: &StatsSnapshot) -> CliResult<()> {
    let valid = stats.ascii_valid + stats.fa_valid + stats.fb_valid;
    if stats.received_bytes > 0 && valid == 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "no valid frames in {} bytes ({} skipped)",
                stats.received_bytes, stats.skipped_bytes
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_only_stream_is_invalid_data() {
        let stats = StatsSnapshot {
            received_bytes: 64,
            skipped_bytes: 64,
            ..StatsSnapshot::default()
        };
        assert_eq!(check_decoded(&stats).expect_err("noise").code, DATA_INVALID);
    }

    #[test]
    fn empty_or_decoded_streams_pass() {
        assert!(check_decoded(&StatsSnapshot::default()).is_ok());
        let stats = StatsSnapshot {
            received_bytes: 64,
            fa_valid: 1,
            ..StatsSnapshot::default()
        };
        assert!(check_decoded(&stats).is_ok());
    }
}
