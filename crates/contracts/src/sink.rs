//! MetricSink trait - collector output interface
//!
//! The collector knows nothing about exposition formats or scrape
//! transports; it hands fully-built metric families to a sink.

use std::sync::Arc;

/// Kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Static description of a metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDesc {
    /// Fully qualified name, namespace included
    pub name: String,

    pub help: String,

    pub kind: MetricKind,

    /// Names of the variable labels, in label-value order
    pub label_names: Vec<&'static str>,

    /// Labels attached to every series of the family
    pub const_labels: Vec<(String, String)>,
}

/// One series of a family: label values plus the current value.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Values for `MetricDesc::label_names`, same order
    pub label_values: Vec<String>,
    pub value: f64,
}

/// A family ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub desc: Arc<MetricDesc>,
    pub series: Vec<Series>,
}

impl MetricFamily {
    /// Labels of one series zipped with their names, const labels first.
    pub fn labels<'a>(&'a self, series: &'a Series) -> impl Iterator<Item = (&'a str, &'a str)> {
        let consts = self
            .desc
            .const_labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()));
        let vars = self
            .desc
            .label_names
            .iter()
            .copied()
            .zip(series.label_values.iter().map(String::as_str));
        consts.chain(vars)
    }
}

/// Destination of collected metric families.
pub trait MetricSink {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Register family descriptions. Called before any `emit`.
    fn describe(&mut self, descs: &[Arc<MetricDesc>]);

    /// Accept one family of the current collection.
    fn emit(&mut self, family: &MetricFamily);
}
