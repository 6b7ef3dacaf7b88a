//! Sync bytes that open each framing on the shared stream.

/// ASCII frames start with `$`.
pub const ASCII_SYNC: u8 = b'$';

/// FA binary frames.
pub const FA_SYNC: u8 = 0xFA;

/// FB split-binary segments.
pub const FB_SYNC: u8 = 0xFB;

/// Returns a human-readable protocol name for a sync byte.
pub fn protocol_name(sync: u8) -> &'static str {
    match sync {
        ASCII_SYNC => "ASCII",
        FA_SYNC => "FA",
        FB_SYNC => "FB",
        _ => "UNKNOWN",
    }
}

/// Returns true if `byte` opens any known framing.
pub fn is_sync_byte(byte: u8) -> bool {
    matches!(byte, ASCII_SYNC | FA_SYNC | FB_SYNC)
}
