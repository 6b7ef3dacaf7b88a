use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

/// Reads sensor bytes from any `Read` stream.
///
/// Retries interrupted reads. Timeouts and `WouldBlock` surface as `Ok(0)` so
/// a polling loop can service other work; a zero-length read is end of stream.
pub struct StreamSource<T> {
    inner: T,
    total: u64,
}

impl<T: Read> StreamSource<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, total: 0 }
    }

    /// Bytes delivered so far.
    pub fn total_read(&self) -> u64 {
        self.total
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the source and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl StreamSource<File> {
    /// Open a capture file for replay.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!(?path, "opened capture file");
        Ok(Self::new(file))
    }
}

impl<T: Read + Send> ByteSource for StreamSource<T> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.inner.read(buf) {
                Ok(0) => {
                    debug!(total = self.total, "source reached end of stream");
                    return Err(TransportError::Closed);
                }
                Ok(n) => {
                    self.total += n as u64;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(0)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

impl<T> std::fmt::Debug for StreamSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_until_closed() {
        let mut source = StreamSource::new(Cursor::new(b"$VNYPR".to_vec()));
        let mut buf = [0u8; 4];
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"$VNY");
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
        assert!(matches!(
            source.read_bytes(&mut buf),
            Err(TransportError::Closed)
        ));
        assert_eq!(source.total_read(), 6);
    }

    #[test]
    fn empty_buffer_reads_nothing() {
        let mut source = StreamSource::new(Cursor::new(Vec::<u8>::new()));
        assert_eq!(source.read_bytes(&mut []).unwrap(), 0);
    }

    #[test]
    fn interrupted_read_retries() {
        let mut source = StreamSource::new(Flaky {
            fail_with: Some(ErrorKind::Interrupted),
            bytes: b"ok".to_vec(),
        });
        let mut buf = [0u8; 8];
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
    }

    #[test]
    fn would_block_reports_no_data() {
        let mut source = StreamSource::new(Flaky {
            fail_with: Some(ErrorKind::WouldBlock),
            bytes: b"ok".to_vec(),
        });
        let mut buf = [0u8; 8];
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 0);
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
    }

    #[test]
    fn other_errors_propagate() {
        let mut source = StreamSource::new(Flaky {
            fail_with: Some(ErrorKind::BrokenPipe),
            bytes: Vec::new(),
        });
        let mut buf = [0u8; 8];
        assert!(matches!(
            source.read_bytes(&mut buf),
            Err(TransportError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
    }

    #[test]
    fn open_missing_file_fails() {
        let err = StreamSource::open_file("/nonexistent/vnlink-capture.bin").unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn reads_over_pipe() {
        use std::io::Write;
        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut source = StreamSource::new(right);
        left.write_all(b"\xFA\x01").unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(source.read_bytes(&mut buf).unwrap(), 2);
        assert_eq!(buf, [0xFA, 0x01]);
    }

    struct Flaky {
        fail_with: Option<ErrorKind>,
        bytes: Vec<u8>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.fail_with.take() {
                return Err(std::io::Error::from(kind));
            }
            let n = self.bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes.drain(..n);
            Ok(n)
        }
    }
}
