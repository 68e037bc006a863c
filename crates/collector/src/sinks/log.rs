//! LogSink - logs collection summaries via tracing

use std::sync::Arc;

use contracts::{MetricDesc, MetricFamily, MetricKind, MetricSink};
use tracing::{debug, info, trace};

/// Sink that logs family summaries, used when no exporter is listening
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MetricSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&mut self, descs: &[Arc<MetricDesc>]) {
        for desc in descs {
            debug!(sink = %self.name, metric = %desc.name, kind = ?desc.kind, "Metric described");
        }
    }

    fn emit(&mut self, family: &MetricFamily) {
        match family.desc.kind {
            MetricKind::Counter => {
                let value = family.series.first().map(|s| s.value).unwrap_or_default();
                info!(sink = %self.name, metric = %family.desc.name, value, "Counter");
            }
            MetricKind::Gauge => {
                let total: f64 = family.series.iter().map(|s| s.value).sum();
                info!(
                    sink = %self.name,
                    metric = %family.desc.name,
                    series = family.series.len(),
                    total,
                    "Gauge family"
                );
                for series in &family.series {
                    trace!(metric = %family.desc.name, labels = ?series.label_values, value = series.value);
                }
            }
        }
    }
}
