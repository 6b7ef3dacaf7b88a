//! Typed readers over validated frames.
//!
//! [`BinaryExtractor`] walks a little-endian payload directly in the ring
//! buffer. [`AsciiExtractor`] walks the comma-separated tokens of an ASCII
//! frame, copying each short token into a stack scratch buffer.

use vnlink_frame::{AsciiMetadata, RingByteBuffer};

use crate::composite::{Vec3d, Vec3f};
use crate::error::{ParseError, Result};

/// Longest ASCII token accepted.
pub const MAX_TOKEN_LENGTH: usize = 32;

pub struct BinaryExtractor<'a> {
    buf: &'a RingByteBuffer,
    pos: usize,
    end: usize,
}

impl<'a> BinaryExtractor<'a> {
    /// Reader over `len` bytes at logical `start`.
    pub fn new(buf: &'a RingByteBuffer, start: usize, len: usize) -> Self {
        Self {
            buf,
            pos: start,
            end: start + len,
        }
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Fail unless `n` more bytes are available.
    pub fn require(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(ParseError::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Byte `at` positions ahead without consuming anything.
    pub fn peek_u8(&self, at: usize) -> Result<u8> {
        self.require(at + 1)?;
        Ok(self.buf.peek_array::<1>(self.pos + at)?[0])
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.require(N)?;
        let raw = self.buf.peek_array::<N>(self.pos)?;
        self.pos += N;
        Ok(raw)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.array()?))
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    pub fn f32s<const N: usize>(&mut self) -> Result<[f32; N]> {
        self.require(4 * N)?;
        let mut out = [0f32; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }

    pub fn vec3f(&mut self) -> Result<Vec3f> {
        self.f32s::<3>()
    }

    pub fn vec3d(&mut self) -> Result<Vec3d> {
        self.require(24)?;
        Ok([self.f64()?, self.f64()?, self.f64()?])
    }
}

/// Sequential reader over the tokens of a valid ASCII frame.
pub struct AsciiExtractor<'a> {
    buf: &'a RingByteBuffer,
    offset: usize,
    meta: &'a AsciiMetadata,
    next: usize,
    scratch: [u8; MAX_TOKEN_LENGTH],
}

impl<'a> AsciiExtractor<'a> {
    /// Reader over the frame whose `$` is at logical `offset`.
    pub fn new(buf: &'a RingByteBuffer, offset: usize, meta: &'a AsciiMetadata) -> Self {
        Self {
            buf,
            offset,
            meta,
            next: 0,
            scratch: [0; MAX_TOKEN_LENGTH],
        }
    }

    /// Index of the next token to be read.
    pub fn index(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.meta.token_count().saturating_sub(self.next)
    }

    /// Next token as text.
    pub fn token(&mut self) -> Result<&str> {
        let index = self.next;
        self.next += 1;
        self.meta
            .token(self.buf, self.offset, index, &mut self.scratch)
            .map(str::trim)
            .ok_or(ParseError::InvalidToken { index })
    }

    fn parse<T: std::str::FromStr>(&mut self) -> Result<T> {
        let index = self.next;
        self.token()?
            .parse()
            .map_err(|_| ParseError::InvalidToken { index })
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.parse()
    }

    pub fn f64(&mut self) -> Result<f64> {
        self.parse()
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.parse()
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.parse()
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.parse()
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.parse()
    }

    /// Hexadecimal token, with or without a `0x` prefix.
    pub fn hex_u16(&mut self) -> Result<u16> {
        let index = self.next;
        let token = self.token()?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        u16::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidToken { index })
    }

    /// Seconds as a decimal, converted to whole nanoseconds.
    pub fn seconds_as_nanos(&mut self) -> Result<u64> {
        let index = self.next;
        let secs = self.f64()?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(ParseError::InvalidToken { index });
        }
        Ok((secs * 1e9).round() as u64)
    }

    pub fn vec3f(&mut self) -> Result<Vec3f> {
        Ok([self.f32()?, self.f32()?, self.f32()?])
    }

    pub fn vec3d(&mut self) -> Result<Vec3d> {
        Ok([self.f64()?, self.f64()?, self.f64()?])
    }

    pub fn f32s<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut out = [0f32; N];
        for v in &mut out {
            *v = self.f32()?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use vnlink_frame::{find_ascii_packet, FrameConfig};

    use super::*;

    #[test]
    fn binary_reads_little_endian_across_wrap() {
        let mut buf = RingByteBuffer::new(16);
        buf.put(&[0u8; 12]).unwrap();
        buf.discard(12).unwrap();
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1234u16.to_le_bytes());
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.extend_from_slice(&(-3i8).to_le_bytes());
        buf.put(&payload).unwrap();

        let mut ex = BinaryExtractor::new(&buf, 0, payload.len());
        assert_eq!(ex.peek_u8(1).unwrap(), 0x12);
        assert_eq!(ex.u16().unwrap(), 0x1234);
        assert_eq!(ex.f32().unwrap(), 1.5);
        assert_eq!(ex.i8().unwrap(), -3);
        assert_eq!(ex.remaining(), 0);
        assert!(matches!(
            ex.u8(),
            Err(ParseError::Truncated {
                needed: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn binary_respects_declared_length() {
        let mut buf = RingByteBuffer::new(32);
        buf.put(&[0u8; 24]).unwrap();
        let mut ex = BinaryExtractor::new(&buf, 0, 20);
        assert!(ex.vec3d().is_err());
        assert_eq!(ex.remaining(), 20, "failed read must not consume");
        assert!(ex.vec3f().is_ok());
    }

    #[test]
    fn ascii_tokens_parse_in_order() {
        let frame = b"$VNINS,000123.5,2100,0208,+1.0,-2.0,+3.0*\r\n";
        let mut buf = RingByteBuffer::new(128);
        buf.put(frame).unwrap();
        let meta = find_ascii_packet(&buf, 0, &FrameConfig::default())
            .into_valid()
            .unwrap();

        let mut ex = AsciiExtractor::new(&buf, 0, &meta);
        assert_eq!(ex.remaining(), 6);
        assert_eq!(ex.seconds_as_nanos().unwrap(), 123_500_000_000);
        assert_eq!(ex.u16().unwrap(), 2100);
        assert_eq!(ex.hex_u16().unwrap(), 0x0208);
        assert_eq!(ex.vec3f().unwrap(), [1.0, -2.0, 3.0]);
        assert_eq!(ex.remaining(), 0);
        assert!(matches!(ex.f32(), Err(ParseError::InvalidToken { index: 6 })));
    }

    #[test]
    fn ascii_bad_number_reports_index() {
        let frame = b"$VNYPR,1.0,abc,3.0*\r\n";
        let mut buf = RingByteBuffer::new(64);
        buf.put(frame).unwrap();
        let meta = find_ascii_packet(&buf, 0, &FrameConfig::default())
            .into_valid()
            .unwrap();
        let mut ex = AsciiExtractor::new(&buf, 0, &meta);
        assert!(matches!(ex.vec3f(), Err(ParseError::InvalidToken { index: 1 })));
    }
}
