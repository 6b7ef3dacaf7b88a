//! Stream decoding and command handling for VectorNav-style inertial sensors.
//!
//! One serial stream interleaves ASCII sentences, FA binary frames and FB
//! split-binary segments. vnlink finds and validates each frame, decodes its
//! measurements, and matches command responses to the commands that asked.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte sources and sinks (serial devices, capture files)
//! - [`frame`]: ring buffer, checksums and the three frame finders
//! - [`measure`]: measurement bitmaps and decoding into typed data
//! - [`session`]: synchronizer, dispatchers, command processor and the
//!   [`Sensor`](session::Sensor) driver (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use vnlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use vnlink_frame::*;
}

/// Re-export measurement types.
pub mod measure {
    pub use vnlink_measure::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use vnlink_session::*;
}
