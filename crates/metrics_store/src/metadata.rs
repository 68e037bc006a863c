//! MetadataTable - application id to name/space/org
//!
//! The table is an immutable `Arc`'d map behind a reader-writer lock.
//! Refreshing builds the new map outside the lock and swaps the `Arc` under
//! the write lock, so a reader sees either the old table or the new one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use contracts::{InstanceId, MetadataEntry};
use tracing::debug;

type Entries = HashMap<InstanceId, MetadataEntry>;

static EMPTY_ENTRY: MetadataEntry = MetadataEntry {
    name: String::new(),
    group: String::new(),
    owner: String::new(),
};

/// Shared metadata lookup table.
#[derive(Default)]
pub struct MetadataTable {
    inner: RwLock<Arc<Entries>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Entries) -> Self {
        Self {
            inner: RwLock::new(Arc::new(entries)),
        }
    }

    /// Take the shared lock.
    ///
    /// While the returned view is alive no refresh can complete, which is
    /// what lets ingestion and collection pin one version of the table.
    pub fn read(&self) -> MetadataView<'_> {
        MetadataView {
            guard: self.inner.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Replace the whole table.
    pub fn replace(&self, entries: Entries) {
        let next = Arc::new(entries);
        let count = next.len();
        let previous = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        // The old map is freed after the write lock is released.
        drop(previous);
        debug!(entries = count, "metadata table replaced");
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read view pinned to one version of the table.
pub struct MetadataView<'a> {
    guard: RwLockReadGuard<'a, Arc<Entries>>,
}

impl MetadataView<'_> {
    /// Entry for `id`, or the empty entry when the id is unknown.
    pub fn lookup(&self, id: &str) -> &MetadataEntry {
        self.guard.get(id).unwrap_or(&EMPTY_ENTRY)
    }

    pub fn get(&self, id: &str) -> Option<&MetadataEntry> {
        self.guard.get(id)
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}
