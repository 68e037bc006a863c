//! # Metrics Store
//!
//! Shared state between the ingestion loop and the scrape path.
//!
//! - `MetricsStore`: last-write-wins container samples plus operational
//!   counters, one mutex over the sample map
//! - `MetadataTable`: application metadata, swapped wholesale under an
//!   `RwLock`
//!
//! ## Locking
//!
//! Both the ingestion loop and the collector take the metadata read lock
//! before the store mutex. Nothing ever takes them in the other order.

mod counter;
mod metadata;
mod store;

pub use counter::OperationalCounter;
pub use metadata::{MetadataTable, MetadataView};
pub use store::MetricsStore;
