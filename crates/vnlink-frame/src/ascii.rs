use std::ops::Range;
use std::time::Instant;

use heapless::{String, Vec};
use tracing::trace;

use crate::codec::{AsciiChecksum, Found, FrameConfig, FrameLength};
use crate::crc::Crc16;
use crate::ring::RingByteBuffer;
use crate::sync::ASCII_SYNC;

/// Storage for the header mnemonic; `max_ascii_header_length` is capped by it.
pub const MAX_ASCII_HEADER: usize = 16;

/// Most `,`/`*` delimiters recorded for one frame.
pub const MAX_DELIMITERS: usize = 64;

/// What the ASCII finder learned about a valid frame.
///
/// Delimiter offsets are relative to the `$`. The last one is always the `*`
/// that starts the trailer.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiMetadata {
    header: String<MAX_ASCII_HEADER>,
    delimiters: Vec<u16, MAX_DELIMITERS>,
    length: usize,
    checksum: AsciiChecksum,
    timestamp: Instant,
}

impl AsciiMetadata {
    /// Header text between `$` and the first delimiter, e.g. `VNYPR`.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn delimiters(&self) -> &[u16] {
        &self.delimiters
    }

    /// Whole frame, `$` through `\n`.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn checksum(&self) -> AsciiChecksum {
        self.checksum
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Number of comma-separated values after the header.
    pub fn token_count(&self) -> usize {
        self.delimiters.len().saturating_sub(1)
    }

    /// Byte range of token `index` relative to the `$`.
    pub fn token_range(&self, index: usize) -> Option<Range<usize>> {
        let start = usize::from(*self.delimiters.get(index)?) + 1;
        let end = usize::from(*self.delimiters.get(index + 1)?);
        Some(start..end)
    }

    /// Copy token `index` of the frame at logical `offset` into `scratch`.
    ///
    /// Returns `None` if the token does not exist or does not fit.
    pub fn token<'s>(
        &self,
        buf: &RingByteBuffer,
        offset: usize,
        index: usize,
        scratch: &'s mut [u8],
    ) -> Option<&'s str> {
        let range = self.token_range(index)?;
        let dst = scratch.get_mut(..range.len())?;
        buf.peek(dst, offset + range.start).ok()?;
        std::str::from_utf8(dst).ok()
    }

    /// Tokens of an already-copied frame starting at its `$`.
    pub fn tokens<'a>(&'a self, frame: &'a [u8]) -> impl Iterator<Item = &'a str> + 'a {
        self.delimiters.windows(2).map(move |pair| {
            let range = usize::from(pair[0]) + 1..usize::from(pair[1]);
            frame
                .get(range)
                .and_then(|b| std::str::from_utf8(b).ok())
                .unwrap_or("")
        })
    }

    /// Frame text without the trailing `\r\n`.
    pub fn text(&self, buf: &RingByteBuffer, offset: usize) -> Option<std::string::String> {
        let mut raw = vec![0u8; self.length];
        buf.peek(&mut raw, offset).ok()?;
        let text = std::str::from_utf8(&raw).ok()?;
        Some(text.trim_end_matches(['\r', '\n']).to_owned())
    }
}

impl FrameLength for AsciiMetadata {
    fn frame_length(&self) -> usize {
        self.length
    }
}

/// Check for an ASCII frame whose `$` sits at logical `offset`.
pub fn find_ascii_packet(
    buf: &RingByteBuffer,
    offset: usize,
    config: &FrameConfig,
) -> Found<AsciiMetadata> {
    if buf.get(offset) != Some(ASCII_SYNC) {
        return Found::Invalid;
    }

    let Some(newline) = buf.find(b'\n', offset + 1) else {
        let so_far = buf.len() - offset;
        if so_far > config.max_ascii_length {
            trace!(offset, so_far, "ascii frame too long without newline");
            return Found::Invalid;
        }
        return Found::Incomplete { needed: so_far + 1 };
    };
    let length = newline - offset + 1;
    if length > config.max_ascii_length {
        return Found::Invalid;
    }

    let max_header = config.max_ascii_header_length.min(MAX_ASCII_HEADER);
    let mut header: String<MAX_ASCII_HEADER> = String::new();
    let mut delimiters: Vec<u16, MAX_DELIMITERS> = Vec::new();
    let mut in_header = true;
    let mut star = None;
    let mut xor = 0u8;
    let mut crc = Crc16::new();

    for rel in 1..length - 1 {
        let byte = buf.peek_unchecked(offset + rel);
        if byte == b'\r' {
            if rel == length - 2 {
                break;
            }
            return Found::Invalid;
        }
        if !(0x20..=0x7E).contains(&byte) {
            return Found::Invalid;
        }
        if star.is_some() {
            continue;
        }

        if byte == b',' || byte == b'*' {
            if in_header && header.is_empty() {
                return Found::Invalid;
            }
            in_header = false;
            let Ok(at) = u16::try_from(rel) else {
                return Found::Invalid;
            };
            if delimiters.push(at).is_err() {
                return Found::Invalid;
            }
            if byte == b'*' {
                star = Some(rel);
                continue;
            }
        } else if in_header && (header.len() >= max_header || header.push(byte as char).is_err()) {
            return Found::Invalid;
        }

        xor ^= byte;
        crc.push(byte);
    }

    let Some(star) = star else {
        return Found::Invalid;
    };
    let trailer_end = if buf.get(newline - 1) == Some(b'\r') && newline - 1 > offset + star {
        length - 2
    } else {
        length - 1
    };
    let gap = trailer_end - star - 1;

    let checksum = match gap {
        0 => AsciiChecksum::Unchecked,
        2 => match read_hex(buf, offset + star + 1, 2) {
            Some(value) if value == u16::from(xor) => AsciiChecksum::Xor8,
            _ => return Found::Invalid,
        },
        4 => match read_hex(buf, offset + star + 1, 4) {
            Some(value) if value == crc.value() => AsciiChecksum::Crc16,
            _ => return Found::Invalid,
        },
        _ => return Found::Invalid,
    };

    Found::Valid(AsciiMetadata {
        header,
        delimiters,
        length,
        checksum,
        timestamp: Instant::now(),
    })
}

fn read_hex(buf: &RingByteBuffer, at: usize, digits: usize) -> Option<u16> {
    (0..digits).try_fold(0u16, |acc, i| {
        let digit = char::from(buf.get(at + i)?).to_digit(16)?;
        Some((acc << 4) | digit as u16)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_ascii;

    const YPR: &str = "VNYPR,+010.0,-002.0,+000.1";

    fn ring_with(bytes: &[u8]) -> RingByteBuffer {
        let mut buf = RingByteBuffer::new(512);
        buf.put(bytes).unwrap();
        buf
    }

    fn find(bytes: &[u8]) -> Found<AsciiMetadata> {
        find_ascii_packet(&ring_with(bytes), 0, &FrameConfig::default())
    }

    #[test]
    fn xor_frame_is_valid_with_tokens() {
        let frame = b"$VNYPR,+010.0,-002.0,+000.1*6E\r\n";
        let buf = ring_with(frame);
        let meta = find_ascii_packet(&buf, 0, &FrameConfig::default())
            .into_valid()
            .unwrap();
        assert_eq!(meta.header(), "VNYPR");
        assert_eq!(meta.length(), frame.len());
        assert_eq!(meta.checksum(), AsciiChecksum::Xor8);
        assert_eq!(meta.token_count(), 3);

        let mut scratch = [0u8; 16];
        assert_eq!(meta.token(&buf, 0, 1, &mut scratch), Some("-002.0"));
        let tokens: std::vec::Vec<_> = meta.tokens(frame).collect();
        assert_eq!(tokens, ["+010.0", "-002.0", "+000.1"]);
        assert_eq!(
            meta.text(&buf, 0).as_deref(),
            Some("$VNYPR,+010.0,-002.0,+000.1*6E")
        );
    }

    #[test]
    fn crc_trailer_and_lowercase_hex() {
        let frame = encode_ascii(YPR, AsciiChecksum::Crc16);
        let meta = find(frame.as_bytes()).into_valid().unwrap();
        assert_eq!(meta.checksum(), AsciiChecksum::Crc16);

        let lower = frame.to_lowercase().replace("$vnypr", "$VNYPR");
        assert!(find(lower.as_bytes()).into_valid().is_some());
    }

    #[test]
    fn bare_star_is_unchecked_and_cr_is_optional() {
        let meta = find(b"$VNRRG,5,1*\r\n").into_valid().unwrap();
        assert_eq!(meta.checksum(), AsciiChecksum::Unchecked);
        assert_eq!(meta.token_count(), 2);

        let meta = find(b"$VNYPR,+010.0,-002.0,+000.1*6E\n").into_valid().unwrap();
        assert_eq!(meta.length(), 31);
    }

    #[test]
    fn flipped_payload_bit_is_invalid() {
        let frame = encode_ascii(YPR, AsciiChecksum::Xor8).into_bytes();
        let crc_frame = encode_ascii(YPR, AsciiChecksum::Crc16).into_bytes();
        for source in [frame, crc_frame] {
            let star = source.iter().position(|&b| b == b'*').unwrap();
            for i in 1..star {
                let mut bad = source.clone();
                bad[i] ^= 0x01;
                assert!(
                    !matches!(find(&bad), Found::Valid(_)),
                    "flip at {i} accepted"
                );
            }
        }
    }

    #[test]
    fn truncated_frame_is_incomplete() {
        let frame = encode_ascii(YPR, AsciiChecksum::Xor8);
        let cut = &frame.as_bytes()[..frame.len() - 1];
        assert_eq!(find(cut), Found::Incomplete { needed: cut.len() + 1 });
    }

    #[test]
    fn malformed_frames_are_invalid() {
        let long = format!("${}", "A".repeat(300));
        assert_eq!(find(long.as_bytes()), Found::Invalid);
        assert_eq!(find(b"$VNYPR,1,2,3\r\n"), Found::Invalid);
        assert_eq!(find(b"$,1,2*\r\n"), Found::Invalid);
        assert_eq!(find(b"$VERYLONGHEADER,1*\r\n"), Found::Invalid);
        assert_eq!(find(b"$VNYPR,1\x01,2*\r\n"), Found::Invalid);
        assert_eq!(find(b"$VNYPR,1\r,2*\r\n"), Found::Invalid);
        assert_eq!(find(b"$VNYPR,1*123\r\n"), Found::Invalid);
        assert_eq!(find(b"$VNYPR,1*GG\r\n"), Found::Invalid);
        assert_eq!(find(b"#VNYPR,1*\r\n"), Found::Invalid);
    }

    #[test]
    fn frame_found_across_wrap() {
        let frame = encode_ascii(YPR, AsciiChecksum::Xor8);
        let mut buf = RingByteBuffer::new(48);
        buf.put(&[0u8; 40]).unwrap();
        buf.discard(40).unwrap();
        buf.put(b"zz").unwrap();
        buf.put(frame.as_bytes()).unwrap();
        let meta = find_ascii_packet(&buf, 2, &FrameConfig::default())
            .into_valid()
            .unwrap();
        let mut scratch = [0u8; 8];
        assert_eq!(meta.token(&buf, 2, 2, &mut scratch), Some("+000.1"));
        assert_eq!(meta.token(&buf, 2, 3, &mut scratch), None);
    }
}
