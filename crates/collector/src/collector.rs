//! SnapshotCollector - turns the store into metric families on each scrape

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use contracts::{
    MetadataEntry, MetricDesc, MetricFamily, MetricSink, MetricsConfig, Sample, Series,
};
use metrics_store::{MetadataTable, MetricsStore};
use tracing::{debug, instrument};

use crate::family::{counter_families, gauge_families, CounterFamily, GaugeFamily};

/// Outcome of one `collect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    /// Samples read from the store
    pub samples: usize,
    /// Series emitted across all families
    pub series: usize,
    pub duration: Duration,
}

/// Per-family series, cleared at the start of every collection.
struct CollectState {
    gauges: Vec<MetricFamily>,
    collections: u64,
}

/// Joins the metrics store with the metadata table and emits the result.
///
/// `collect` holds, for its whole duration and in this order: the
/// collector's own mutex, the metadata read lock, and (while snapshotting)
/// the store mutex. A scrape therefore never mixes two store states or two
/// metadata tables.
pub struct SnapshotCollector {
    store: Arc<MetricsStore>,
    metadata: Arc<MetadataTable>,
    gauges: Vec<GaugeFamily>,
    counters: Vec<CounterFamily>,
    state: Mutex<CollectState>,
}

impl SnapshotCollector {
    pub fn new(
        store: Arc<MetricsStore>,
        metadata: Arc<MetadataTable>,
        config: &MetricsConfig,
    ) -> Self {
        let gauges = gauge_families(&config.namespace, &config.environment);
        let counters = counter_families(&config.namespace, &config.environment);
        let state = CollectState {
            gauges: gauges
                .iter()
                .map(|g| MetricFamily {
                    desc: Arc::clone(&g.desc),
                    series: Vec::new(),
                })
                .collect(),
            collections: 0,
        };

        Self {
            store,
            metadata,
            gauges,
            counters,
            state: Mutex::new(state),
        }
    }

    /// Static descriptions of every family this collector owns.
    pub fn describe(&self) -> Vec<Arc<MetricDesc>> {
        self.gauges
            .iter()
            .map(|g| Arc::clone(&g.desc))
            .chain(self.counters.iter().map(|c| Arc::clone(&c.desc)))
            .collect()
    }

    /// Rebuild every family from the current store contents and emit it.
    #[instrument(name = "snapshot_collect", skip_all, fields(sink = %sink.name()))]
    pub fn collect(&self, sink: &mut dyn MetricSink) -> CollectStats {
        let started = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let metadata = self.metadata.read();

        for family in &mut state.gauges {
            family.series.clear();
        }

        let mut samples = self.store.snapshot();
        samples.sort_by(|a, b| {
            (&*a.instance_id, a.instance_index).cmp(&(&*b.instance_id, b.instance_index))
        });

        for sample in &samples {
            let labels = label_values(sample, metadata.lookup(&sample.instance_id));
            for (family, gauge) in state.gauges.iter_mut().zip(&self.gauges) {
                family.series.push(Series {
                    label_values: labels.clone(),
                    value: (gauge.extract)(sample),
                });
            }
        }

        let mut series = 0;
        for family in &state.gauges {
            series += family.series.len();
            sink.emit(family);
        }
        for counter in &self.counters {
            sink.emit(&MetricFamily {
                desc: Arc::clone(&counter.desc),
                series: vec![Series {
                    label_values: Vec::new(),
                    value: self.store.read_counter(counter.counter) as f64,
                }],
            });
            series += 1;
        }

        drop(metadata);
        state.collections += 1;

        let stats = CollectStats {
            samples: samples.len(),
            series,
            duration: started.elapsed(),
        };
        debug!(
            collection = state.collections,
            samples = stats.samples,
            series = stats.series,
            "Collection complete"
        );
        stats
    }

    /// Number of completed collections.
    pub fn collections(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collections
    }
}

fn label_values(sample: &Sample, entry: &MetadataEntry) -> Vec<String> {
    vec![
        sample.source.clone(),
        sample.instance_id.to_string(),
        sample.instance_index.to_string(),
        entry.name.clone(),
        entry.group.clone(),
        entry.owner.clone(),
    ]
}
