//! Typed measurements decoded from validated sensor frames.
//!
//! [`EnabledMeasurements`] is the framing-independent bitmap of which fields
//! a frame carries. [`parse_fa_packet`] and [`parse_ascii_packet`] turn a
//! frame that a finder has already validated into [`CompositeData`].

pub mod ascii;
pub mod binary;
pub mod composite;
pub mod enabled;
pub mod error;
pub mod extract;

pub use ascii::{
    ascii_header_to_meas_header, is_measurement_header, parse_ascii_packet, AsciiHeaderLayout,
    ASCII_HEADERS,
};
pub use binary::parse_fa_packet;
pub use composite::CompositeData;
pub use enabled::EnabledMeasurements;
pub use error::{ParseError, Result};
