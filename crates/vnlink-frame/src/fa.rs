use std::time::Instant;

use tracing::trace;

use crate::binary::BinaryHeader;
use crate::codec::{Found, FrameConfig, FrameLength, FA_MIN_LENGTH};
use crate::crc::crc16_ring;
use crate::fields::{field_size, FieldSize};
use crate::ring::RingByteBuffer;
use crate::sync::FA_SYNC;

/// What the FA finder learned about a valid frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaMetadata {
    pub header: BinaryHeader,
    /// Whole frame, sync through CRC.
    pub length: usize,
    pub timestamp: Instant,
}

impl FaMetadata {
    /// Offset of the first payload byte relative to the sync byte.
    pub fn payload_offset(&self) -> usize {
        1 + self.header.wire_len()
    }

    pub fn payload_length(&self) -> usize {
        self.length - self.payload_offset() - 2
    }
}

impl FrameLength for FaMetadata {
    fn frame_length(&self) -> usize {
        self.length
    }
}

/// Check for an FA frame whose sync byte sits at logical `offset`.
pub fn find_fa_packet(buf: &RingByteBuffer, offset: usize, config: &FrameConfig) -> Found<FaMetadata> {
    if buf.get(offset) != Some(FA_SYNC) {
        return Found::Invalid;
    }
    let available = buf.len() - offset;
    if available < FA_MIN_LENGTH {
        return Found::Incomplete {
            needed: FA_MIN_LENGTH,
        };
    }

    let header = match BinaryHeader::decode(buf, offset + 1) {
        Found::Valid(header) => header,
        Found::Incomplete { needed } => return Found::Incomplete { needed: 1 + needed },
        Found::Invalid => return Found::Invalid,
    };
    let payload_offset = 1 + header.wire_len();

    let payload = match payload_length(&header, buf, offset + payload_offset, config) {
        Found::Valid(0) | Found::Invalid => return Found::Invalid,
        Found::Incomplete { needed } => {
            return Found::Incomplete {
                needed: payload_offset + needed,
            }
        }
        Found::Valid(len) => len,
    };

    let length = payload_offset + payload + 2;
    if length > config.max_fa_length {
        trace!(offset, length, "fa frame exceeds maximum length");
        return Found::Invalid;
    }
    if available < length {
        return Found::Incomplete { needed: length };
    }

    match crc16_ring(buf, offset + 1, length - 1) {
        Ok(0) => {}
        _ => {
            trace!(offset, length, "fa crc mismatch");
            return Found::Invalid;
        }
    }

    Found::Valid(FaMetadata {
        header,
        length,
        timestamp: Instant::now(),
    })
}

/// Payload size implied by `header`.
///
/// Dynamically sized GNSS fields read their count byte from `buf`, starting
/// the payload at logical `payload_start`. The count byte is only read when
/// it is already buffered; otherwise the result is `Incomplete` with `needed`
/// counted from `payload_start`.
pub fn payload_length(
    header: &BinaryHeader,
    buf: &RingByteBuffer,
    payload_start: usize,
    config: &FrameConfig,
) -> Found<usize> {
    let mut total = 0usize;
    for (group, field) in header.fields() {
        let Some(size) = field_size(group, field) else {
            trace!(group, field, "unsized binary field");
            return Found::Invalid;
        };

        let field_len = match size.count_offset() {
            None => size.resolve(0),
            Some(count_at) => {
                let Some(count) = buf.get(payload_start + total + count_at) else {
                    return Found::Incomplete {
                        needed: total + count_at + 1,
                    };
                };
                let max = match size {
                    FieldSize::SatInfo => config.max_sat_info,
                    _ => config.max_raw_meas,
                };
                if usize::from(count) > max {
                    return Found::Invalid;
                }
                size.resolve(usize::from(count))
            }
        };

        total += field_len;
        if total > config.max_fa_length {
            return Found::Invalid;
        }
    }
    Found::Valid(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_fa;
    use crate::fields::{common, gnss, group};

    fn ypr_payload() -> Vec<u8> {
        [10.0f32, -2.0, 0.1]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    fn ring_with(bytes: &[u8]) -> RingByteBuffer {
        let mut buf = RingByteBuffer::new(256);
        buf.put(bytes).unwrap();
        buf
    }

    #[test]
    fn common_ypr_frame_is_valid() {
        let frame = encode_fa(&[0x01], &[1 << common::YPR], &ypr_payload());
        let buf = ring_with(&frame);
        let meta = find_fa_packet(&buf, 0, &FrameConfig::default())
            .into_valid()
            .unwrap();
        assert_eq!(meta.length, 18);
        assert_eq!(meta.payload_offset(), 4);
        assert_eq!(meta.payload_length(), 12);
        assert_eq!(meta.header.fields_of(group::COMMON), 1 << common::YPR);
    }

    #[test]
    fn any_corrupted_byte_is_invalid() {
        let frame = encode_fa(&[0x01], &[1 << common::YPR], &ypr_payload());
        for i in 1..frame.len() {
            let mut bad = frame.clone();
            bad[i] ^= 0x10;
            let found = find_fa_packet(&ring_with(&bad), 0, &FrameConfig::default());
            assert!(
                !matches!(found, Found::Valid(_)),
                "corruption at byte {i} went unnoticed"
            );
        }
    }

    #[test]
    fn truncated_frame_reports_total_length() {
        let frame = encode_fa(&[0x01], &[1 << common::YPR], &ypr_payload());
        let cfg = FrameConfig::default();

        let found = find_fa_packet(&ring_with(&frame[..3]), 0, &cfg);
        assert_eq!(found, Found::Incomplete { needed: FA_MIN_LENGTH });

        let found = find_fa_packet(&ring_with(&frame[..10]), 0, &cfg);
        assert_eq!(found, Found::Incomplete { needed: 18 });
    }

    #[test]
    fn frame_found_at_offset_across_wrap() {
        let frame = encode_fa(&[0x01], &[1 << common::YPR], &ypr_payload());
        let mut buf = RingByteBuffer::new(32);
        buf.put(&[0u8; 25]).unwrap();
        buf.discard(25).unwrap();
        buf.put(b"xx").unwrap();
        buf.put(&frame).unwrap();
        assert!(find_fa_packet(&buf, 2, &FrameConfig::default())
            .into_valid()
            .is_some());
        assert_eq!(find_fa_packet(&buf, 0, &FrameConfig::default()), Found::Invalid);
    }

    #[test]
    fn sat_info_size_comes_from_count_byte() {
        let mut payload = vec![2u8, 0];
        payload.extend_from_slice(&[0xAB; 16]);
        let frame = encode_fa(&[1 << group::GNSS], &[1 << gnss::SAT_INFO], &payload);
        let meta = find_fa_packet(&ring_with(&frame), 0, &FrameConfig::default())
            .into_valid()
            .unwrap();
        assert_eq!(meta.payload_length(), 18);

        let cfg = FrameConfig {
            max_sat_info: 1,
            ..FrameConfig::default()
        };
        assert_eq!(find_fa_packet(&ring_with(&frame), 0, &cfg), Found::Invalid);
    }

    #[test]
    fn raw_meas_count_not_yet_buffered_is_incomplete() {
        // Raw measurements need the second type word (combined bit 15).
        let frame = encode_fa(&[1 << group::GNSS], &[0x8000, 0x0001], &[0u8; 12]);
        let buf = ring_with(&frame[..8]);
        assert_eq!(
            find_fa_packet(&buf, 0, &FrameConfig::default()),
            Found::Incomplete { needed: 1 + 5 + 11 }
        );
        assert!(find_fa_packet(&ring_with(&frame), 0, &FrameConfig::default())
            .into_valid()
            .is_some());
    }

    #[test]
    fn unknown_field_and_oversize_are_invalid() {
        let cfg = FrameConfig::default();
        // Attitude bit 9 has no defined layout.
        let frame = encode_fa(&[1 << group::ATTITUDE], &[1 << 9], &[0u8; 4]);
        assert_eq!(find_fa_packet(&ring_with(&frame), 0, &cfg), Found::Invalid);

        let frame = encode_fa(&[0x01], &[1 << common::YPR], &ypr_payload());
        let small = FrameConfig {
            max_fa_length: 17,
            ..FrameConfig::default()
        };
        assert_eq!(find_fa_packet(&ring_with(&frame), 0, &small), Found::Invalid);
    }

    #[test]
    fn wrong_sync_is_invalid() {
        let buf = ring_with(&[0xFB, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(find_fa_packet(&buf, 0, &FrameConfig::default()), Found::Invalid);
        assert_eq!(find_fa_packet(&buf, 99, &FrameConfig::default()), Found::Invalid);
    }
}
