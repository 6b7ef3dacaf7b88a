use std::time::Instant;

use tracing::trace;

use crate::codec::{Found, FrameConfig, FrameLength, FB_HEADER_SIZE};
use crate::crc::crc16_ring;
use crate::ring::RingByteBuffer;
use crate::sync::FB_SYNC;

/// The only FB message type currently defined.
pub const FB_MESSAGE_TYPE_SPLIT: u8 = 0;

/// FB sub-header following the sync byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbHeader {
    pub message_type: u8,
    pub message_id: u8,
    /// Segments in the message, 1-based.
    pub total: u8,
    /// This segment's index, 1-based.
    pub current: u8,
    pub payload_length: u16,
}

impl FbHeader {
    pub fn from_bytes(raw: [u8; FB_HEADER_SIZE]) -> Self {
        Self {
            message_type: raw[0],
            message_id: raw[1],
            total: raw[2] >> 4,
            current: raw[2] & 0x0F,
            payload_length: u16::from_le_bytes([raw[3], raw[4]]),
        }
    }

    pub fn is_first(&self) -> bool {
        self.current == 1
    }

    pub fn is_last(&self) -> bool {
        self.current == self.total
    }

    /// True if `self` directly follows `prev` within the same message.
    pub fn continues(&self, prev: &FbHeader) -> bool {
        self.message_id == prev.message_id
            && self.total == prev.total
            && self.current == prev.current + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FbMetadata {
    pub header: FbHeader,
    /// Whole segment, sync through CRC.
    pub length: usize,
    pub timestamp: Instant,
}

impl FbMetadata {
    /// Offset of the segment payload relative to the sync byte.
    pub const PAYLOAD_OFFSET: usize = 1 + FB_HEADER_SIZE;
}

impl FrameLength for FbMetadata {
    fn frame_length(&self) -> usize {
        self.length
    }
}

/// Check for an FB segment whose sync byte sits at logical `offset`.
pub fn find_fb_packet(buf: &RingByteBuffer, offset: usize, config: &FrameConfig) -> Found<FbMetadata> {
    if buf.get(offset) != Some(FB_SYNC) {
        return Found::Invalid;
    }
    let Ok(raw) = buf.peek_array::<FB_HEADER_SIZE>(offset + 1) else {
        return Found::Incomplete {
            needed: FbMetadata::PAYLOAD_OFFSET,
        };
    };
    let header = FbHeader::from_bytes(raw);

    if header.message_type != FB_MESSAGE_TYPE_SPLIT
        || header.total == 0
        || header.current == 0
        || header.current > header.total
    {
        return Found::Invalid;
    }
    let payload = usize::from(header.payload_length);
    if payload == 0 || payload > config.max_fb_payload {
        return Found::Invalid;
    }

    let length = FbMetadata::PAYLOAD_OFFSET + payload + 2;
    if buf.len() - offset < length {
        return Found::Incomplete { needed: length };
    }

    match crc16_ring(buf, offset + 1, length - 1) {
        Ok(0) => {}
        _ => {
            trace!(offset, length, "fb crc mismatch");
            return Found::Invalid;
        }
    }

    Found::Valid(FbMetadata {
        header,
        length,
        timestamp: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_fb_segment;

    fn ring_with(bytes: &[u8]) -> RingByteBuffer {
        let mut buf = RingByteBuffer::new(128);
        buf.put(bytes).unwrap();
        buf
    }

    #[test]
    fn valid_segment_metadata() {
        let seg = encode_fb_segment(0, 7, 3, 2, b"hello");
        let meta = find_fb_packet(&ring_with(&seg), 0, &FrameConfig::default())
            .into_valid()
            .unwrap();
        assert_eq!(meta.length, seg.len());
        assert_eq!(
            meta.header,
            FbHeader {
                message_type: 0,
                message_id: 7,
                total: 3,
                current: 2,
                payload_length: 5,
            }
        );
        assert!(!meta.header.is_first());
        assert!(!meta.header.is_last());
    }

    #[test]
    fn bad_counts_and_types_are_invalid() {
        let cfg = FrameConfig::default();
        for seg in [
            encode_fb_segment(1, 0, 1, 1, b"x"),
            encode_fb_segment(0, 0, 0, 0, b"x"),
            encode_fb_segment(0, 0, 2, 0, b"x"),
            encode_fb_segment(0, 0, 2, 3, b"x"),
            encode_fb_segment(0, 0, 1, 1, b""),
        ] {
            assert_eq!(find_fb_packet(&ring_with(&seg), 0, &cfg), Found::Invalid);
        }

        let small = FrameConfig {
            max_fb_payload: 4,
            ..FrameConfig::default()
        };
        let seg = encode_fb_segment(0, 0, 1, 1, b"hello");
        assert_eq!(find_fb_packet(&ring_with(&seg), 0, &small), Found::Invalid);
    }

    #[test]
    fn partial_segment_is_incomplete() {
        let seg = encode_fb_segment(0, 1, 1, 1, b"payload");
        let cfg = FrameConfig::default();
        assert_eq!(
            find_fb_packet(&ring_with(&seg[..4]), 0, &cfg),
            Found::Incomplete { needed: 6 }
        );
        assert_eq!(
            find_fb_packet(&ring_with(&seg[..10]), 0, &cfg),
            Found::Incomplete { needed: seg.len() }
        );
    }

    #[test]
    fn corrupted_segment_is_invalid() {
        let mut seg = encode_fb_segment(0, 1, 1, 1, b"payload");
        seg[8] ^= 0x01;
        assert_eq!(
            find_fb_packet(&ring_with(&seg), 0, &FrameConfig::default()),
            Found::Invalid
        );
    }

    #[test]
    fn continuation_rules() {
        let first = FbHeader::from_bytes([0, 4, 0x31, 10, 0]);
        let second = FbHeader::from_bytes([0, 4, 0x32, 10, 0]);
        let other = FbHeader::from_bytes([0, 5, 0x32, 10, 0]);
        assert!(first.is_first());
        assert!(second.continues(&first));
        assert!(!other.continues(&first));
        assert!(!first.continues(&second));
    }
}
