/// Errors reported by the byte buffer.
///
/// Framing problems are never errors: finders classify them as
/// [`Validity::Invalid`](crate::Validity::Invalid) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// A put did not fit in the free space. Nothing was written.
    #[error("buffer overflow ({requested} bytes requested, {available} free)")]
    Overflow { requested: usize, available: usize },

    /// A discard or peek reached past the buffered bytes. Nothing was changed.
    #[error("buffer underflow ({requested} bytes requested, {available} buffered)")]
    Underflow { requested: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, BufferError>;
