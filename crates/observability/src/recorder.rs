//! RecorderSink - forwards collected families to the `metrics` facade

use std::sync::Arc;

use contracts::{MetricDesc, MetricFamily, MetricKind, MetricSink};
use metrics::{counter, describe_counter, describe_gauge, gauge, Label};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Sink backed by the current `metrics` recorder.
///
/// Operational counters are written as absolute values. Use it through
/// [`render_scrape`] so every scrape starts from an empty recorder.
#[derive(Debug, Default)]
pub struct RecorderSink;

impl RecorderSink {
    pub fn new() -> Self {
        Self
    }
}

/// Run one collection against a fresh recorder and render it.
///
/// The rendered text contains exactly the series emitted by `collect`:
/// nothing survives from earlier scrapes.
pub fn render_scrape<R>(collect: impl FnOnce(&mut RecorderSink) -> R) -> (String, R) {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let result = metrics::with_local_recorder(&recorder, || collect(&mut RecorderSink::new()));
    (handle.render(), result)
}

fn labels(family: &MetricFamily, series: &contracts::Series) -> Vec<Label> {
    family
        .labels(series)
        .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
        .collect()
}

impl MetricSink for RecorderSink {
    fn name(&self) -> &str {
        "recorder"
    }

    fn describe(&mut self, descs: &[Arc<MetricDesc>]) {
        for desc in descs {
            match desc.kind {
                MetricKind::Gauge => describe_gauge!(desc.name.clone(), desc.help.clone()),
                MetricKind::Counter => describe_counter!(desc.name.clone(), desc.help.clone()),
            }
        }
    }

    fn emit(&mut self, family: &MetricFamily) {
        let name = &family.desc.name;
        for series in &family.series {
            let labels = labels(family, series);
            match family.desc.kind {
                MetricKind::Gauge => gauge!(name.clone(), labels).set(series.value),
                MetricKind::Counter => counter!(name.clone(), labels).absolute(series.value as u64),
            }
        }
    }
}
