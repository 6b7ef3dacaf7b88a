use serde::{Deserialize, Serialize};

use crate::crc::{checksum8, crc16};
use crate::sync::{ASCII_SYNC, FA_SYNC, FB_SYNC};

/// Fixed FB sub-header size: type, id, packet count, 16-bit length.
pub const FB_HEADER_SIZE: usize = 5;

/// Smallest possible FA frame: sync + 1 group byte + 1 type word + 1 payload byte + CRC.
pub const FA_MIN_LENGTH: usize = 7;

/// Outcome of checking a candidate sync-byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// A complete frame with a good checksum starts here.
    Valid,
    /// The bytes here cannot start a frame of this protocol.
    Invalid,
    /// The frame may be valid but more bytes are needed.
    Incomplete,
}

/// What a finder reports to the synchronizer.
///
/// `length` is the frame length when valid, the total bytes needed from the
/// frame start when incomplete, and zero when invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindResult {
    pub validity: Validity,
    pub length: usize,
}

impl FindResult {
    pub const INVALID: FindResult = FindResult {
        validity: Validity::Invalid,
        length: 0,
    };

    pub fn valid(length: usize) -> Self {
        Self {
            validity: Validity::Valid,
            length,
        }
    }

    pub fn incomplete(needed: usize) -> Self {
        Self {
            validity: Validity::Incomplete,
            length: needed,
        }
    }
}

/// Finder outcome carrying protocol metadata when the frame is valid.
#[derive(Debug, Clone, PartialEq)]
pub enum Found<M> {
    Valid(M),
    Incomplete { needed: usize },
    Invalid,
}

/// Metadata that knows the length of the frame it describes.
pub trait FrameLength {
    fn frame_length(&self) -> usize;
}

impl<M: FrameLength> Found<M> {
    pub fn find_result(&self) -> FindResult {
        match self {
            Found::Valid(meta) => FindResult::valid(meta.frame_length()),
            Found::Incomplete { needed } => FindResult::incomplete(*needed),
            Found::Invalid => FindResult::INVALID,
        }
    }

    pub fn validity(&self) -> Validity {
        match self {
            Found::Valid(_) => Validity::Valid,
            Found::Incomplete { .. } => Validity::Incomplete,
            Found::Invalid => Validity::Invalid,
        }
    }
}

impl<M> Found<M> {
    /// The metadata, if the frame was valid.
    pub fn into_valid(self) -> Option<M> {
        match self {
            Found::Valid(meta) => Some(meta),
            _ => None,
        }
    }
}

/// Trailer used on an ASCII frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsciiChecksum {
    /// Two hex digits: XOR of the body.
    Xor8,
    /// Four hex digits: CRC-16 of the body.
    #[default]
    Crc16,
    /// No check. Found as a bare `*`; encoded as the sensor's `*XX` wildcard.
    Unchecked,
}

/// Size limits applied by the finders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Longest ASCII frame, `$` through `\n`.
    pub max_ascii_length: usize,
    /// Longest ASCII header (`VNYPR` is 5).
    pub max_ascii_header_length: usize,
    /// Longest FA frame, sync through CRC.
    pub max_fa_length: usize,
    /// Longest FB segment payload.
    pub max_fb_payload: usize,
    /// Largest satellite count accepted in a GNSS satellite-info field.
    pub max_sat_info: usize,
    /// Largest measurement count accepted in a GNSS raw-measurement field.
    pub max_raw_meas: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_ascii_length: 256,
            max_ascii_header_length: 10,
            max_fa_length: 4096,
            max_fb_payload: 4096,
            max_sat_info: 50,
            max_raw_meas: 50,
        }
    }
}

/// Encode an ASCII frame around `body` (the text between `$` and `*`).
///
/// ```
/// use vnlink_frame::{encode_ascii, AsciiChecksum};
/// assert_eq!(encode_ascii("VNRRG,1", AsciiChecksum::Xor8), "$VNRRG,1*42\r\n");
/// ```
pub fn encode_ascii(body: &str, checksum: AsciiChecksum) -> String {
    let trailer = match checksum {
        AsciiChecksum::Xor8 => format!("{:02X}", checksum8(body.as_bytes())),
        AsciiChecksum::Crc16 => format!("{:04X}", crc16(body.as_bytes())),
        AsciiChecksum::Unchecked => "XX".to_string(),
    };
    format!("{}{body}*{trailer}\r\n", ASCII_SYNC as char)
}

/// Encode an FA frame from raw group bytes, type words and payload.
///
/// Wire format:
/// ```text
/// ┌──────┬─────────────┬──────────────────┬──────────┬─────────────┐
/// │ 0xFA │ group bytes │ type words (LE)  │ payload  │ CRC-16 (BE) │
/// └──────┴─────────────┴──────────────────┴──────────┴─────────────┘
/// ```
/// No validation is done; this is how malformed fixtures get built too.
pub fn encode_fa(group_bytes: &[u8], type_words: &[u16], payload: &[u8]) -> Vec<u8> {
    let capacity = 1 + group_bytes.len() + 2 * type_words.len() + payload.len() + 2;
    let mut out = Vec::with_capacity(capacity);
    out.push(FA_SYNC);
    out.extend_from_slice(group_bytes);
    for word in type_words {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(payload);
    let crc = crc16(&out[1..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}

/// Split a complete FA frame into FB segments carrying at most
/// `max_segment_payload` bytes each.
///
/// The FA sync byte and CRC are not transmitted; reassembly restores them.
/// Returns an empty list when the frame needs more than 15 segments.
pub fn encode_fb_segments(
    fa_frame: &[u8],
    message_id: u8,
    max_segment_payload: usize,
) -> Vec<Vec<u8>> {
    if fa_frame.len() < 3 || max_segment_payload == 0 {
        return Vec::new();
    }
    let inner = &fa_frame[1..fa_frame.len() - 2];
    let chunks: Vec<&[u8]> = inner.chunks(max_segment_payload).collect();
    if chunks.len() > 0x0F {
        return Vec::new();
    }

    let total = chunks.len() as u8;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| encode_fb_segment(0, message_id, total, i as u8 + 1, chunk))
        .collect()
}

/// Encode one FB segment with explicit header fields.
pub fn encode_fb_segment(
    message_type: u8,
    message_id: u8,
    total: u8,
    current: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + FB_HEADER_SIZE + payload.len() + 2);
    out.push(FB_SYNC);
    out.push(message_type);
    out.push(message_id);
    out.push(((total & 0x0F) << 4) | (current & 0x0F));
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    let crc = crc16(&out[1..]);
    out.extend_from_slice(&crc.to_be_bytes());
    out
}
