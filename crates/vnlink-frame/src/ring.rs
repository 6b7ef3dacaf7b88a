use crate::error::{BufferError, Result};

/// Default ring capacity used by the synchronizer: 4 KiB.
pub const DEFAULT_CAPACITY: usize = 4 * 1024;

/// Fixed-capacity circular byte buffer with non-destructive reads.
///
/// Storage is allocated once at construction. Offsets passed to the read
/// methods are logical: offset 0 is the oldest buffered byte, wherever it
/// physically lives in the backing array.
///
/// The buffer is single-producer/single-consumer by convention. `put` is the
/// only operation that advances the tail and `discard` the only operation that
/// advances the head; everything else is a read.
pub struct RingByteBuffer {
    storage: Box<[u8]>,
    head: usize,
    len: usize,
}

impl RingByteBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Create an empty buffer of [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Bytes that can still be put before the buffer is full.
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Physical index one past the newest byte.
    fn tail(&self) -> usize {
        self.physical(self.len)
    }

    fn physical(&self, offset: usize) -> usize {
        let cap = self.capacity();
        if cap == 0 {
            return 0;
        }
        let idx = self.head + offset;
        if idx >= cap {
            idx - cap
        } else {
            idx
        }
    }

    /// Append `bytes` at the tail.
    ///
    /// Fails without writing anything when `bytes` does not fit.
    pub fn put(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.free() {
            return Err(BufferError::Overflow {
                requested: bytes.len(),
                available: self.free(),
            });
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let tail = self.tail();
        let first = bytes.len().min(self.capacity() - tail);
        self.storage[tail..tail + first].copy_from_slice(&bytes[..first]);
        let rest = bytes.len() - first;
        if rest > 0 {
            self.storage[..rest].copy_from_slice(&bytes[first..]);
        }
        self.len += bytes.len();
        Ok(())
    }

    /// Drop `n` bytes from the head.
    pub fn discard(&mut self, n: usize) -> Result<()> {
        if n > self.len {
            return Err(BufferError::Underflow {
                requested: n,
                available: self.len,
            });
        }
        self.head = self.physical(n);
        self.len -= n;
        Ok(())
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Copy `dst.len()` bytes starting at logical `offset` into `dst`.
    pub fn peek(&self, dst: &mut [u8], offset: usize) -> Result<()> {
        let (a, b) = self.slices(offset, dst.len())?;
        dst[..a.len()].copy_from_slice(a);
        dst[a.len()..].copy_from_slice(b);
        Ok(())
    }

    /// Read a fixed-size array starting at logical `offset`.
    pub fn peek_array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.peek(&mut out, offset)?;
        Ok(out)
    }

    /// Single byte at logical `offset`, or `None` past the buffered bytes.
    pub fn get(&self, offset: usize) -> Option<u8> {
        if offset < self.len {
            Some(self.storage[self.physical(offset)])
        } else {
            None
        }
    }

    /// Single byte at logical `offset` without a size check.
    ///
    /// Callers must already have checked `offset < len()`. Out-of-range
    /// offsets return stale storage rather than failing.
    #[inline]
    pub fn peek_unchecked(&self, offset: usize) -> u8 {
        debug_assert!(offset < self.len, "peek_unchecked past buffered bytes");
        self.storage[self.physical(offset % self.capacity().max(1))]
    }

    /// Zero-copy view of `len` bytes at logical `offset`, split at the
    /// physical wrap point. The second slice is empty when the range does
    /// not wrap.
    pub fn slices(&self, offset: usize, len: usize) -> Result<(&[u8], &[u8])> {
        let end = offset.checked_add(len).ok_or(BufferError::Underflow {
            requested: usize::MAX,
            available: self.len,
        })?;
        if end > self.len {
            return Err(BufferError::Underflow {
                requested: end,
                available: self.len,
            });
        }
        if len == 0 {
            return Ok((&[], &[]));
        }

        let start = self.physical(offset);
        let first = len.min(self.capacity() - start);
        Ok((
            &self.storage[start..start + first],
            &self.storage[..len - first],
        ))
    }

    /// Both halves of the buffered bytes in logical order.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        self.slices(0, self.len).unwrap_or((&[], &[]))
    }

    /// Logical offset of the first `byte` at or after `from`.
    pub fn find(&self, byte: u8, from: usize) -> Option<usize> {
        if from >= self.len {
            return None;
        }
        let (a, b) = self.slices(from, self.len - from).ok()?;
        if let Some(pos) = a.iter().position(|&x| x == byte) {
            return Some(from + pos);
        }
        b.iter()
            .position(|&x| x == byte)
            .map(|pos| from + a.len() + pos)
    }

    /// Copy of the buffered bytes in logical order.
    ///
    /// Allocates; meant for diagnostics and tests, not the scan path.
    pub fn to_vec(&self) -> Vec<u8> {
        let (a, b) = self.as_slices();
        let mut out = Vec::with_capacity(self.len);
        out.extend_from_slice(a);
        out.extend_from_slice(b);
        out
    }
}

impl std::fmt::Debug for RingByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingByteBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapped(capacity: usize, shift: usize, payload: &[u8]) -> RingByteBuffer {
        let mut buf = RingByteBuffer::new(capacity);
        buf.put(&vec![0xEE; shift]).unwrap();
        buf.discard(shift).unwrap();
        buf.put(payload).unwrap();
        buf
    }

    #[test]
    fn put_then_peek_roundtrip() {
        let mut buf = RingByteBuffer::new(8);
        buf.put(b"abcde").unwrap();
        assert_eq!(buf.len(), 5);

        let mut out = [0u8; 3];
        buf.peek(&mut out, 1).unwrap();
        assert_eq!(&out, b"bcd");
        assert_eq!(buf.len(), 5, "peek must not consume");
    }

    #[test]
    fn peek_across_physical_wrap() {
        let mut buf = RingByteBuffer::new(8);
        buf.put(b"012345").unwrap();
        buf.discard(5).unwrap();
        buf.put(b"abcdef").unwrap();

        assert_eq!(buf.len(), 7);
        assert_eq!(buf.to_vec(), b"5abcdef");
        let (a, b) = buf.as_slices();
        assert!(!b.is_empty(), "payload should straddle the wrap point");
        assert_eq!([a, b].concat(), b"5abcdef");
        assert_eq!(buf.peek_array::<4>(2).unwrap(), *b"bcde");
        assert_eq!(buf.peek_unchecked(6), b'f');
    }

    #[test]
    fn overflow_leaves_state_unchanged() {
        let mut buf = RingByteBuffer::new(4);
        buf.put(b"abc").unwrap();
        let err = buf.put(b"de").unwrap_err();
        assert_eq!(
            err,
            BufferError::Overflow {
                requested: 2,
                available: 1
            }
        );
        assert_eq!(buf.to_vec(), b"abc");

        buf.put(b"d").unwrap();
        assert!(buf.is_full());
        assert!(buf.put(b"e").is_err());
    }

    #[test]
    fn underflow_on_discard_and_peek() {
        let mut buf = RingByteBuffer::new(4);
        buf.put(b"ab").unwrap();

        assert!(matches!(buf.discard(3), Err(BufferError::Underflow { .. })));
        let mut out = [0u8; 2];
        assert!(buf.peek(&mut out, 1).is_err());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.get(1), Some(b'b'));
        assert_eq!(buf.get(2), None);
    }

    #[test]
    fn find_wraps_and_respects_start() {
        let buf = wrapped(8, 5, b"x$y$z");
        assert_eq!(buf.find(b'$', 0), Some(1));
        assert_eq!(buf.find(b'$', 2), Some(3));
        assert_eq!(buf.find(b'$', 4), None);
        assert_eq!(buf.find(b'q', 0), None);
        assert_eq!(buf.find(b'x', 99), None);
    }

    #[test]
    fn sequence_of_puts_and_discards_preserves_order() {
        let mut buf = RingByteBuffer::new(7);
        let mut model: std::collections::VecDeque<u8> = std::collections::VecDeque::new();
        let mut next = 0u8;

        for step in 0..200usize {
            let put = (step * 7) % 5;
            if put <= buf.free() {
                let chunk: Vec<u8> = (0..put)
                    .map(|_| {
                        next = next.wrapping_add(1);
                        next
                    })
                    .collect();
                buf.put(&chunk).unwrap();
                model.extend(chunk);
            }
            let drop = (step * 3) % 4;
            if drop <= buf.len() {
                buf.discard(drop).unwrap();
                model.drain(..drop);
            }
            assert_eq!(buf.to_vec(), model.iter().copied().collect::<Vec<_>>());
        }
    }

    #[test]
    fn zero_capacity_buffer_is_inert() {
        let mut buf = RingByteBuffer::new(0);
        assert!(buf.put(b"").is_ok());
        assert!(buf.put(b"a").is_err());
        assert_eq!(buf.find(b'a', 0), None);
        assert!(buf.as_slices().0.is_empty());
    }
}
