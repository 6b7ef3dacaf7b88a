use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use vnlink_frame::AsciiChecksum;
use vnlink_session::SensorConfig;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod command;
pub mod monitor;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured byte stream and print its measurements.
    Replay(ReplayArgs),
    /// Decode a live serial device until interrupted.
    Monitor(MonitorArgs),
    /// Print a command framed for the sensor.
    Command(CommandArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format, load_config(config)?),
        Command::Monitor(args) => monitor::run(args, format, load_config(config)?),
        Command::Command(args) => command::run(args, format, load_config(config)?),
        Command::Version(args) => version::run(args),
    }
}

/// Sensor settings from a JSON file; unset keys keep their defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<SensorConfig> {
    let Some(path) = path else {
        return Ok(SensorConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read config {}", path.display()), err))?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            USAGE,
            format!("invalid config {}: {err}", path.display()),
        )
    })
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture file holding raw sensor output.
    pub path: PathBuf,
    /// Stop after printing N measurements.
    #[arg(long)]
    pub count: Option<usize>,
    /// Print only the final counters.
    #[arg(long)]
    pub stats_only: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Serial device path.
    pub device: PathBuf,
    /// Line speed.
    #[arg(long, default_value_t = vnlink_transport::DEFAULT_BAUD)]
    pub baud: u32,
    /// Exit after printing N measurements.
    #[arg(long)]
    pub count: Option<usize>,
    /// Register to read once the link is up (e.g. 1 for the model number).
    #[arg(long, value_name = "ID")]
    pub read_register: Option<u8>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ChecksumArg {
    Crc16,
    Xor,
    None,
}

impl From<ChecksumArg> for AsciiChecksum {
    fn from(arg: ChecksumArg) -> Self {
        match arg {
            ChecksumArg::Crc16 => AsciiChecksum::Crc16,
            ChecksumArg::Xor => AsciiChecksum::Xor8,
            ChecksumArg::None => AsciiChecksum::Unchecked,
        }
    }
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Command body, e.g. `RRG,1` or `VNWRG,06,0`.
    pub text: String,
    /// Trailer to append. Defaults to the configured processor checksum.
    #[arg(long)]
    pub checksum: Option<ChecksumArg>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_path_uses_defaults() {
        let config = load_config(None).expect("defaults");
        assert_eq!(config, SensorConfig::default());
    }

    #[test]
    fn partial_config_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("vnlink-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"synchronizer":{"buffer_capacity":8192}}"#).expect("write");

        let config = load_config(Some(&path)).expect("config");
        assert_eq!(config.synchronizer.buffer_capacity, 8192);
        assert_eq!(config.processor, SensorConfig::default().processor);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_config_is_a_usage_error() {
        let path = std::env::temp_dir().join(format!("vnlink-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{not json").expect("write");

        let err = load_config(Some(&path)).expect_err("should fail");
        assert_eq!(err.code, USAGE);

        let _ = std::fs::remove_file(&path);
    }
}
