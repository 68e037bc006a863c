//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the exporter.
//! Business crates depend on this crate only; reverse dependencies are
//! prohibited.
//!
//! ## Data Model
//! - `Envelope` is what a transport delivers
//! - `Sample` is the per-instance usage record kept by the store
//! - `MetricFamily` is what the collector hands to a `MetricSink`

mod blueprint;
mod envelope;
mod error;
mod instance_id;
mod sample;
mod sink;
mod stream_error;
mod transport;

pub use blueprint::*;
pub use envelope::*;
pub use error::*;
pub use instance_id::InstanceId;
pub use sample::*;
pub use sink::*;
pub use stream_error::*;
pub use transport::{FirehoseTransport, LocalFirehoseTransport, StreamChannels};
