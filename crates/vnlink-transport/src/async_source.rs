use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, TransportError};

/// Async counterpart of [`StreamSource`](crate::StreamSource) for tokio readers.
pub struct AsyncStreamSource<T> {
    inner: T,
    total: u64,
}

impl<T: AsyncRead + Unpin> AsyncStreamSource<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, total: 0 }
    }

    /// Read available bytes into `buf`.
    ///
    /// End of stream is [`TransportError::Closed`].
    pub async fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.inner.read(buf).await? {
            0 => Err(TransportError::Closed),
            n => {
                self.total += n as u64;
                Ok(n)
            }
        }
    }

    /// Bytes delivered so far.
    pub fn total_read(&self) -> u64 {
        self.total
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn reads_from_duplex_until_closed() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut source = AsyncStreamSource::new(server);

        client.write_all(b"$VNYPR").await.unwrap();
        let mut buf = [0u8; 16];
        let n = source.read_bytes(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$VNYPR");

        drop(client);
        assert!(matches!(
            source.read_bytes(&mut buf).await,
            Err(TransportError::Closed)
        ));
        assert_eq!(source.total_read(), 6);
    }
}
