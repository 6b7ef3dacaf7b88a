use std::io::{ErrorKind, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, TransportError};
use crate::traits::ByteSink;

/// Writes command bytes to any `Write` stream.
pub struct StreamSink<T> {
    inner: T,
}

impl<T: Write> StreamSink<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the sink and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write + Send> ByteSink for StreamSink<T> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.flush()
    }
}

/// Sink that drops everything, for replaying captures.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ByteSink for NullSink {
    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Sink that records writes in shared memory; clones see the same bytes.
#[derive(Debug, Default, Clone)]
pub struct CaptureSink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take everything written so far, leaving the capture empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ByteSink for CaptureSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
        Ok(())
    }
}
