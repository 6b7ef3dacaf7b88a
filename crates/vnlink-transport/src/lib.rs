//! Byte transport for inertial sensor links.
//!
//! The protocol layers never touch a device directly. They pull bytes from a
//! [`ByteSource`] and push command text into a [`ByteSink`]:
//! - any `Read`/`Write` stream (capture files, pipes, sockets)
//! - a serial device through `serialport`
//! - a tokio reader behind the `async` feature
//!
//! This is the lowest layer of vnlink.

pub mod error;
pub mod sink;
pub mod source;
pub mod serial;
pub mod traits;

#[cfg(feature = "async")]
pub mod async_source;

pub use error::{Result, TransportError};
pub use sink::{CaptureSink, NullSink, StreamSink};
pub use source::StreamSource;
pub use traits::{ByteSink, ByteSource};

pub use serial::{SerialPort, SerialSink, DEFAULT_BAUD, SUPPORTED_BAUDS};

#[cfg(feature = "async")]
pub use async_source::AsyncStreamSource;
