//! # Collector
//!
//! Scrape-time metric assembly.
//!
//! Responsibilities:
//! - Describe the container gauge and operational counter families
//! - On each collection, reset every family, snapshot the store, join it
//!   with the metadata table and emit the families to a `MetricSink`

mod collector;
mod family;
pub mod sinks;

pub use collector::{CollectStats, SnapshotCollector};
pub use contracts::{MetricFamily, MetricSink};
pub use family::{CONTAINER_LABELS, CONTAINER_SUBSYSTEM, FIREHOSE_SUBSYSTEM};
pub use sinks::{LogSink, MemorySink};
