use crate::error::Result;

/// Producer of raw sensor bytes.
///
/// A read may return fewer bytes than requested, including zero when nothing
/// arrived within the source's poll interval. End of stream is
/// [`TransportError::Closed`](crate::TransportError::Closed), never `Ok(0)`.
pub trait ByteSource: Send {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Consumer of outgoing command bytes. Writes are all-or-nothing.
pub trait ByteSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_bytes(buf)
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }
}
