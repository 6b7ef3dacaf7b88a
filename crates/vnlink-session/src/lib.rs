//! Stream synchronization and command correlation for inertial sensors.
//!
//! This is the layer that ties the protocols together: a
//! [`PacketSynchronizer`] arbitrates between the ASCII, FA and FB
//! dispatchers sharing one receive buffer, decoded measurements flow into a
//! bounded [`MeasurementQueue`], and a [`CommandProcessor`] matches sensor
//! responses to the commands awaiting them. [`Sensor`] wires all of it to a
//! byte source and sink.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod processor;
pub mod queue;
pub mod sensor;
pub mod subscriber;
pub mod synchronizer;

pub use command::{Command, CommandOutcome};
pub use config::{ProcessorConfig, SensorConfig, SynchronizerConfig};
pub use dispatch::{
    AsciiDispatcher, Dispatcher, FaDispatcher, FaOutputs, FbDispatcher, Measurement, Protocol,
};
pub use error::{error_channel, AsyncError, ErrorReporter, Result, SensorError, SessionError};
pub use processor::CommandProcessor;
pub use queue::MeasurementQueue;
pub use sensor::{Activity, CommandSender, Sensor, SensorHandle};
pub use subscriber::{AsciiFilter, FaFilter, Packet, PacketFilter, SubscriberList};
pub use synchronizer::{PacketSynchronizer, Progress, StatsSnapshot, SyncStats};
