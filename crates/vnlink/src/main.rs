mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "vnlink", version, about = "Inertial sensor stream decoder")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON file with sensor settings.
    #[arg(long, value_name = "FILE", global = true, env = "VNLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.config.as_deref());

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_subcommand() {
        let cli = Cli::try_parse_from([
            "vnlink",
            "--format",
            "json",
            "replay",
            "/tmp/capture.bin",
            "--count",
            "5",
        ])
        .expect("replay args should parse");

        match cli.command {
            Command::Replay(args) => assert_eq!(args.count, Some(5)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_command_checksum() {
        let cli = Cli::try_parse_from(["vnlink", "command", "RRG,1", "--checksum", "xor"])
            .expect("command args should parse");
        assert!(matches!(cli.command, Command::Command(_)));
    }

    #[test]
    fn rejects_unknown_checksum() {
        let err = Cli::try_parse_from(["vnlink", "command", "RRG,1", "--checksum", "md5"])
            .expect_err("bad checksum should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn monitor_defaults_to_factory_baud() {
        let cli = Cli::try_parse_from(["vnlink", "monitor", "/dev/ttyUSB0"])
            .expect("monitor args should parse");
        match cli.command {
            Command::Monitor(args) => assert_eq!(args.baud, vnlink_transport::DEFAULT_BAUD),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
