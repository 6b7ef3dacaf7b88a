use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};
use vnlink_session::{Command, CommandOutcome, Sensor, SensorConfig};
use vnlink_transport::SerialPort;

use crate::cmd::replay::log_async_errors;
use crate::cmd::MonitorArgs;
use crate::exit::{session_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_measurement, print_stats, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: MonitorArgs, format: OutputFormat, config: SensorConfig) -> CliResult<i32> {
    let port = SerialPort::open(&args.device, args.baud)
        .map_err(|err| transport_error("open device failed", err))?;
    let sink = port
        .try_clone_sink()
        .map_err(|err| transport_error("open device failed", err))?;
    let timeout = config.processor.default_timeout();

    let handle = Sensor::new(port, sink, config)
        .spawn()
        .map_err(|err| session_error("start failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if let Some(id) = args.read_register {
        let command = Arc::new(Command::read_register(id));
        handle
            .send_command(&command, None)
            .map_err(|err| session_error("send failed", err))?;
        match command.wait(timeout) {
            CommandOutcome::Response(text) => println!("{}", text.trim_end()),
            CommandOutcome::Error(err) => warn!(register = id, error = %err, "sensor rejected read"),
            CommandOutcome::Pending | CommandOutcome::Stale => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no response to register {id} read"),
                ));
            }
        }
    }

    let mut printed = 0usize;
    'poll: while running.load(Ordering::SeqCst) && handle.is_running() {
        for measurement in handle.measurements().drain() {
            print_measurement(printed, &measurement, format);
            printed = printed.saturating_add(1);
            if args.count.is_some_and(|count| printed >= count) {
                break 'poll;
            }
        }
        log_async_errors(handle.async_errors());
        thread::sleep(POLL_INTERVAL);
    }

    let stats = handle.stats();
    handle
        .join()
        .map_err(|err| session_error("shutdown failed", err))?;
    info!(printed, "monitor stopped");
    print_stats(&stats, printed, format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
