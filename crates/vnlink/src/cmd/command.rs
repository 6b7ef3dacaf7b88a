use vnlink_frame::{encode_ascii, AsciiChecksum, ASCII_SYNC};
use vnlink_session::SensorConfig;

use crate::cmd::CommandArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_command, OutputFormat};

pub fn run(args: CommandArgs, format: OutputFormat, config: SensorConfig) -> CliResult<i32> {
    let body = command_body(&args.text)?;
    let checksum = args
        .checksum
        .map(AsciiChecksum::from)
        .unwrap_or(config.processor.checksum);
    let frame = encode_ascii(&body, checksum);
    print_command(&body, &frame, format);
    Ok(SUCCESS)
}

/// Normalise user input to the text between `$` and `*`.
fn command_body(text: &str) -> CliResult<String> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix(ASCII_SYNC as char)
        .unwrap_or(trimmed);
    let trimmed = trimmed.split('*').next().unwrap_or_default();

    if trimmed.is_empty() {
        return Err(CliError::new(USAGE, "command text is empty"));
    }
    if !trimmed.is_ascii() || trimmed.contains(['\r', '\n', '$']) {
        return Err(CliError::new(
            USAGE,
            format!("command text must be printable ASCII: {trimmed:?}"),
        ));
    }

    if trimmed.starts_with("VN") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("VN{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_talker_when_missing() {
        assert_eq!(command_body("RRG,1").expect("body"), "VNRRG,1");
        assert_eq!(command_body("VNRRG,1").expect("body"), "VNRRG,1");
    }

    #[test]
    fn strips_framing_the_user_typed() {
        assert_eq!(command_body("$VNRRG,1*XX").expect("body"), "VNRRG,1");
        assert_eq!(command_body("  WNV \n").expect("body"), "VNWNV");
    }

    #[test]
    fn rejects_empty_and_multiline() {
        assert_eq!(command_body("$").expect_err("empty").code, USAGE);
        assert_eq!(command_body("RRG,1\nRRG,2").expect_err("newline").code, USAGE);
    }

    #[test]
    fn xor_trailer_matches_sensor_format() {
        let body = command_body("RRG,1").expect("body");
        assert_eq!(encode_ascii(&body, AsciiChecksum::Xor8), "$VNRRG,1*42\r\n");
    }
}
