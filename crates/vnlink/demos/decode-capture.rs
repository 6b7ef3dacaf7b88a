//! Decode a capture and print every measurement as JSON.
//!
//! Run with:
//!   cargo run --example decode-capture -- path/to/capture.bin
//!
//! Without a path, a short synthetic stream (ASCII, FA and FB frames mixed
//! with noise) is decoded instead.

use std::io::Cursor;

use vnlink::frame::{encode_ascii, encode_fa, encode_fb_segments, AsciiChecksum};
use vnlink::session::{Sensor, SensorConfig, SessionError};
use vnlink::transport::{ByteSource, NullSink, StreamSource, TransportError};

fn synthetic_capture() -> Vec<u8> {
    let mut payload = Vec::new();
    for v in [45.0f32, 1.5, -0.25] {
        payload.extend_from_slice(&v.to_le_bytes());
    }
    let fa = encode_fa(&[0x10], &[0x0002], &payload);

    let mut capture = b"\x00\x17noise".to_vec();
    let ypr = encode_ascii("VNYPR,+010.0,-002.0,+000.1", AsciiChecksum::Crc16);
    capture.extend_from_slice(ypr.as_bytes());
    capture.extend_from_slice(&fa);
    for segment in encode_fb_segments(&fa, 1, 6) {
        capture.extend_from_slice(&segment);
    }
    capture
}

fn decode<S: ByteSource>(source: S) -> Result<(), Box<dyn std::error::Error>> {
    let mut sensor = Sensor::new(source, NullSink, SensorConfig::default());
    loop {
        match sensor.process_available() {
            Ok(_) => {}
            Err(SessionError::Transport(TransportError::Closed)) => break,
            Err(err) => return Err(err.into()),
        }
        for measurement in sensor.measurements().drain() {
            println!("{}", serde_json::to_string(&measurement.data)?);
        }
    }

    let stats = sensor.stats();
    eprintln!(
        "received {} bytes, skipped {}, frames ascii={} fa={} fb={}",
        stats.received_bytes,
        stats.skipped_bytes,
        stats.ascii_valid,
        stats.fa_valid,
        stats.fb_valid
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => decode(StreamSource::open_file(path)?),
        None => decode(StreamSource::new(Cursor::new(synthetic_capture()))),
    }
}
