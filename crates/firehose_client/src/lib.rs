//! # Firehose Client
//!
//! Websocket transport for the Loggregator firehose.
//!
//! - `FirehoseConsumer`: `FirehoseTransport` over `tokio-tungstenite`
//! - `decode_envelope`: protobuf frame to `contracts::Envelope`
//! - `RetryPolicy`: reconnect backoff

mod backoff;
mod consumer;
mod error;
mod wire;

pub use backoff::{
    RetryPolicy, DEFAULT_MAX_RETRY_COUNT, DEFAULT_MAX_RETRY_DELAY, DEFAULT_MIN_RETRY_DELAY,
};
pub use consumer::{ConsumerConfig, FirehoseConsumer};
pub use error::TransportError;
pub use wire::{decode_envelope, EventType, WireContainerMetric, WireCounterEvent, WireEnvelope};
