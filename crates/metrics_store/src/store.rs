//! MetricsStore - latest sample per application instance

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{InstanceKey, Sample};
use tracing::debug;

use crate::counter::OperationalCounter;

struct StoredSample {
    sample: Sample,
    recorded_at: Instant,
}

/// Thread-safe aggregate of container samples and operational counters.
///
/// One mutex covers the sample map, so a snapshot never sees a sample that
/// is half written. Counters are independent atomics.
pub struct MetricsStore {
    samples: Mutex<HashMap<InstanceKey, StoredSample>>,
    counters: [AtomicU64; OperationalCounter::COUNT],
    expiration: Option<Duration>,
}

impl MetricsStore {
    /// Store whose samples live until overwritten.
    pub fn new() -> Self {
        Self::with_expiration(None)
    }

    /// Store that drops samples not refreshed within `expiration`.
    pub fn with_expiration(expiration: Option<Duration>) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            counters: Default::default(),
            expiration,
        }
    }

    /// Insert or overwrite the sample for its (instance id, index) key.
    pub fn record(&self, sample: Sample) {
        let key = sample.key();
        let stored = StoredSample {
            sample,
            recorded_at: Instant::now(),
        };
        self.lock_samples().insert(key, stored);
    }

    /// Copy of every live sample, taken under the store lock.
    pub fn snapshot(&self) -> Vec<Sample> {
        let now = Instant::now();
        self.lock_samples()
            .values()
            .filter(|stored| self.is_live(stored, now))
            .map(|stored| stored.sample.clone())
            .collect()
    }

    /// Remove expired samples, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.expiration.is_none() {
            return 0;
        }

        let now = Instant::now();
        let mut samples = self.lock_samples();
        let before = samples.len();
        samples.retain(|_, stored| self.is_live(stored, now));
        let purged = before - samples.len();

        if purged > 0 {
            debug!(purged, remaining = samples.len(), "expired samples purged");
        }
        purged
    }

    /// Number of stored samples, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock_samples().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn increment_counter(&self, counter: OperationalCounter) {
        self.counters[counter.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn read_counter(&self, counter: OperationalCounter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    fn is_live(&self, stored: &StoredSample, now: Instant) -> bool {
        match self.expiration {
            Some(ttl) => now.saturating_duration_since(stored.recorded_at) < ttl,
            None => true,
        }
    }

    // A panic while holding the lock cannot leave a half-inserted entry
    // behind, so a poisoned map is still consistent.
    fn lock_samples(&self) -> MutexGuard<'_, HashMap<InstanceKey, StoredSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    fn sample(app: &str, index: u32, value: u64) -> Sample {
        Sample {
            source: format!("10.0.0.{}", value % 255),
            instance_id: app.into(),
            instance_index: index,
            cpu_percentage: value as f64,
            memory_bytes: value,
            disk_bytes: value,
            memory_bytes_quota: value,
            disk_bytes_quota: value,
        }
    }

    fn is_coherent(s: &Sample) -> bool {
        let v = s.memory_bytes;
        s.cpu_percentage == v as f64
            && s.disk_bytes == v
            && s.memory_bytes_quota == v
            && s.disk_bytes_quota == v
            && s.source == format!("10.0.0.{}", v % 255)
    }

    #[test]
    fn test_record_overwrites_same_key() {
        let store = MetricsStore::new();
        store.record(sample("app-1", 0, 1));
        store.record(sample("app-1", 0, 2));
        store.record(sample("app-1", 1, 3));

        let mut snapshot = store.snapshot();
        snapshot.sort_by_key(|s| s.instance_index);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].memory_bytes, 2);
        assert_eq!(snapshot[1].memory_bytes, 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = MetricsStore::new();
        store.record(sample("app-1", 0, 1));
        let snapshot = store.snapshot();
        store.record(sample("app-1", 0, 9));
        store.record(sample("app-2", 0, 9));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].memory_bytes, 1);
    }

    #[test]
    fn test_counters() {
        let store = MetricsStore::new();
        store.increment_counter(OperationalCounter::SlowConsumerAlert);
        store.increment_counter(OperationalCounter::SlowConsumerAlert);
        store.increment_counter(OperationalCounter::EnvelopesReceived);

        assert_eq!(store.read_counter(OperationalCounter::SlowConsumerAlert), 2);
        assert_eq!(store.read_counter(OperationalCounter::EnvelopesReceived), 1);
        assert_eq!(store.read_counter(OperationalCounter::CounterEventsReceived), 0);
    }

    #[test]
    fn test_zero_expiration_hides_and_purges_everything() {
        let store = MetricsStore::with_expiration(Some(Duration::ZERO));
        store.record(sample("app-1", 0, 1));
        store.record(sample("app-2", 0, 1));

        assert!(store.snapshot().is_empty());
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_long_expiration_keeps_samples() {
        let store = MetricsStore::with_expiration(Some(Duration::from_secs(3600)));
        store.record(sample("app-1", 0, 1));
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_no_expiration_never_purges() {
        let store = MetricsStore::new();
        store.record(sample("app-1", 0, 1));
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_snapshot_never_sees_torn_samples() {
        let store = Arc::new(MetricsStore::new());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut rng = rand::rng();
                    for _ in 0..2_000 {
                        let index = rng.random_range(0..8);
                        let value = rng.random_range(0..1_000_000u64);
                        store.record(sample("app-1", index, value));
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checked = 0usize;
                while !done.load(Ordering::Relaxed) {
                    for s in store.snapshot() {
                        assert!(is_coherent(&s), "torn sample: {s:?}");
                        checked += 1;
                    }
                }
                checked
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();

        let final_snapshot = store.snapshot();
        assert!(final_snapshot.len() <= 8);
        assert!(final_snapshot.iter().all(is_coherent));
    }
}
