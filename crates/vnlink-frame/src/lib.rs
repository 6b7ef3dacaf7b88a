//! Frame discovery for inertial sensor byte streams.
//!
//! One byte stream carries three framings, told apart by their sync byte:
//! - `$` ASCII: `$VNYPR,...*XX\r\n` with an 8-bit XOR or CRC-16 trailer
//! - `0xFA` binary: chained group/type header, little-endian payload, CRC-16
//! - `0xFB` split binary: an FA frame cut into numbered segments
//!
//! Finders read through [`RingByteBuffer`] without linearizing the stream and
//! report whether a candidate offset holds a valid, invalid or incomplete frame.

pub mod ascii;
pub mod binary;
pub mod codec;
pub mod crc;
pub mod error;
pub mod fa;
pub mod fb;
pub mod fields;
pub mod ring;
pub mod sync;

pub use ascii::{find_ascii_packet, AsciiMetadata};
pub use binary::BinaryHeader;
pub use codec::{
    encode_ascii, encode_fa, encode_fb_segment, encode_fb_segments, AsciiChecksum, FindResult,
    Found, FrameConfig, FrameLength, Validity, FA_MIN_LENGTH, FB_HEADER_SIZE,
};
pub use crc::{checksum8, crc16, Crc16};
pub use error::{BufferError, Result};
pub use fa::{find_fa_packet, FaMetadata};
pub use fb::{find_fb_packet, FbHeader, FbMetadata};
pub use ring::RingByteBuffer;
pub use sync::{ASCII_SYNC, FA_SYNC, FB_SYNC};
