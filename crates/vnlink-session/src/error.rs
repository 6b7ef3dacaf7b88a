use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::time::Instant;

use tracing::warn;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] vnlink_transport::TransportError),

    /// Ring buffer error.
    #[error("buffer error: {0}")]
    Buffer(#[from] vnlink_frame::BufferError),

    /// Measurement decoding error.
    #[error("parse error: {0}")]
    Parse(#[from] vnlink_measure::ParseError),

    /// The command processor has no room for another command.
    #[error("command queue full")]
    CommandQueueFull,

    /// The command is still waiting on its previous response.
    #[error("command already awaiting a response")]
    CommandResent,

    /// The I/O thread panicked.
    #[error("sensor thread panicked")]
    ThreadPanicked,
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Conditions reported by the sensor or detected by the host.
///
/// Variants up to `ErrorBufferOverflow` carry the sensor's `$VNERR` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SensorError {
    #[error("hard fault")]
    HardFault,
    #[error("serial buffer overflow")]
    SerialBufferOverflow,
    #[error("invalid checksum")]
    InvalidChecksum,
    #[error("invalid command")]
    InvalidCommand,
    #[error("not enough parameters")]
    NotEnoughParameters,
    #[error("too many parameters")]
    TooManyParameters,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid register")]
    InvalidRegister,
    #[error("unauthorized access")]
    UnauthorizedAccess,
    #[error("watchdog reset")]
    WatchdogReset,
    #[error("output buffer overflow")]
    OutputBufferOverflow,
    #[error("insufficient baud rate")]
    InsufficientBaudRate,
    #[error("error buffer overflow")]
    ErrorBufferOverflow,

    #[error("primary buffer full")]
    PrimaryBufferFull,
    #[error("serial read failed")]
    SerialReadFailed,
    #[error("received unexpected message")]
    ReceivedUnexpectedMessage,
    #[error("received invalid response")]
    ReceivedInvalidResponse,
    #[error("skipped byte buffer full")]
    SkippedByteBufferFull,
    #[error("received byte buffer full")]
    ReceivedByteBufferFull,
    #[error("measurement queue full")]
    MeasurementQueueFull,
    #[error("subscriber queue full")]
    SubscriberQueueFull,
    #[error("command queue full")]
    CommandQueueFull,
    #[error("command resent")]
    CommandResent,
    #[error("response timeout")]
    ResponseTimeout,
    #[error("unknown sensor error {0}")]
    UnknownError(u16),
}

impl SensorError {
    /// Map a `$VNERR` code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::HardFault,
            2 => Self::SerialBufferOverflow,
            3 => Self::InvalidChecksum,
            4 => Self::InvalidCommand,
            5 => Self::NotEnoughParameters,
            6 => Self::TooManyParameters,
            7 => Self::InvalidParameter,
            8 => Self::InvalidRegister,
            9 => Self::UnauthorizedAccess,
            10 => Self::WatchdogReset,
            11 => Self::OutputBufferOverflow,
            12 => Self::InsufficientBaudRate,
            255 => Self::ErrorBufferOverflow,
            other => Self::UnknownError(other),
        }
    }

    /// The sensor's code, if this condition was reported by the sensor.
    pub fn code(&self) -> Option<u16> {
        let code = match self {
            Self::HardFault => 1,
            Self::SerialBufferOverflow => 2,
            Self::InvalidChecksum => 3,
            Self::InvalidCommand => 4,
            Self::NotEnoughParameters => 5,
            Self::TooManyParameters => 6,
            Self::InvalidParameter => 7,
            Self::InvalidRegister => 8,
            Self::UnauthorizedAccess => 9,
            Self::WatchdogReset => 10,
            Self::OutputBufferOverflow => 11,
            Self::InsufficientBaudRate => 12,
            Self::ErrorBufferOverflow => 255,
            Self::UnknownError(code) => *code,
            _ => return None,
        };
        Some(code)
    }
}

/// One entry on the async-error channel.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncError {
    pub kind: SensorError,
    /// Raw text or context, empty when there is none.
    pub message: String,
    pub timestamp: Instant,
}

/// Producer side of the async-error channel.
///
/// Pushing never blocks; a full channel drops the new error.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    tx: Option<SyncSender<AsyncError>>,
}

impl ErrorReporter {
    /// A reporter that only logs.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn report(&self, kind: SensorError, message: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };
        let err = AsyncError {
            kind,
            message: message.into(),
            timestamp: Instant::now(),
        };
        match tx.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(kind = %dropped.kind, "async error channel full; dropping error");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Bounded async-error channel.
pub fn error_channel(capacity: usize) -> (ErrorReporter, Receiver<AsyncError>) {
    let (tx, rx) = sync_channel(capacity);
    (ErrorReporter { tx: Some(tx) }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_codes_round_trip() {
        for code in (1..=12).chain([255]) {
            assert_eq!(SensorError::from_code(code).code(), Some(code));
        }
        assert_eq!(SensorError::from_code(42), SensorError::UnknownError(42));
        assert_eq!(SensorError::PrimaryBufferFull.code(), None);
    }

    #[test]
    fn full_channel_drops_newest() {
        let (reporter, rx) = error_channel(1);
        reporter.report(SensorError::HardFault, "first");
        reporter.report(SensorError::WatchdogReset, "second");
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].kind, SensorError::HardFault);
        assert_eq!(got[0].message, "first");
    }

    #[test]
    fn disabled_reporter_is_silent() {
        ErrorReporter::disabled().report(SensorError::SerialReadFailed, "");
    }
}
