//! FirehoseTransport trait - stream connection abstraction
//!
//! The ingestion loop never sees sockets. A transport hands back two
//! channels on subscription and accepts a single `close` control.

use async_channel::Receiver;

use crate::{ContractError, Envelope, StreamError};

/// Inbound side of a subscription.
#[derive(Debug)]
pub struct StreamChannels {
    /// Accepted envelopes, in delivery order
    pub messages: Receiver<Envelope>,

    /// Classified transport errors
    pub errors: Receiver<StreamError>,
}

/// Firehose transport.
///
/// Implemented by the websocket consumer and by the in-process mock.
#[trait_variant::make(FirehoseTransport: Send)]
pub trait LocalFirehoseTransport {
    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// Open the subscription.
    ///
    /// # Errors
    /// Returns a transport error when the subscription cannot be set up at
    /// all; failures after that point arrive on `StreamChannels::errors`.
    async fn subscribe(&mut self, subscription_id: &str) -> Result<StreamChannels, ContractError>;

    /// Tear down the connection. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), ContractError>;
}
