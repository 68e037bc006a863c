//! # Ingestion
//!
//! Firehose stream ingestion.
//!
//! Responsibilities:
//! - Subscribe through a `FirehoseTransport` (websocket or mock)
//! - Count received envelopes and detect upstream drop signals
//! - Record container samples into the shared `MetricsStore`
//! - Classify stream errors: retryable errors keep the loop alive, a fatal
//!   one closes the transport and ends it
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{MockFirehoseConfig, MockTransport, StreamIngestor};
//!
//! let transport = MockTransport::synthetic(MockFirehoseConfig::default());
//! let mut ingestor = StreamIngestor::new(transport, "exporter", store, metadata);
//! if let Err(e) = ingestor.run().await {
//!     tracing::error!(error = %e, "ingestion stopped");
//! }
//! ```

mod error;
mod ingestor;
mod mock;

// Re-exports
pub use error::{IngestionError, Result};
pub use ingestor::{Disposition, IngestorState, StreamIngestor};
pub use mock::{MockFirehoseConfig, MockHandle, MockTransport};
