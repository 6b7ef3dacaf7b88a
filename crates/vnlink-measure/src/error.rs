use vnlink_frame::BufferError;

/// Errors that can occur while decoding a validated frame into measurements.
///
/// Finders have already checked framing and checksums; these describe
/// content that does not fit the expected layout.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The ASCII header is not a measurement output.
    #[error("unknown measurement header: {0}")]
    UnknownHeader(String),

    /// The ASCII frame has the wrong number of values for its header.
    #[error("{header} expects {expected} values, found {found}")]
    TokenCount {
        header: String,
        expected: usize,
        found: usize,
    },

    /// An ASCII value could not be parsed.
    #[error("invalid value at token {index}")]
    InvalidToken { index: usize },

    /// A binary field has no known layout.
    #[error("unsupported field {field} in group {group}")]
    UnsupportedField { group: u8, field: u8 },

    /// A GNSS list count exceeds what can be stored.
    #[error("entry count {count} exceeds maximum {max}")]
    TooManyEntries { count: usize, max: usize },

    /// The payload ended before the header's fields were read.
    #[error("payload truncated: field needs {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },

    /// The fields did not consume exactly the payload.
    #[error("payload length mismatch: fields use {consumed} of {length} bytes")]
    LengthMismatch { consumed: usize, length: usize },

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type Result<T> = std::result::Result<T, ParseError>;
