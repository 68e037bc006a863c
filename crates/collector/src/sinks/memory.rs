//! MemorySink - keeps the last collection in memory

use std::sync::Arc;

use contracts::{MetricDesc, MetricFamily, MetricSink, Series};

/// Sink that stores every emitted family, for tests and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    descs: Vec<Arc<MetricDesc>>,
    families: Vec<MetricFamily>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descs(&self) -> &[Arc<MetricDesc>] {
        &self.descs
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    /// Most recently emitted family with this name.
    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().rev().find(|f| f.desc.name == name)
    }

    /// Series of a family, empty if it was never emitted.
    pub fn series(&self, name: &str) -> &[Series] {
        self.family(name).map(|f| f.series.as_slice()).unwrap_or(&[])
    }

    /// `application_id` label of every series of a family.
    pub fn instances(&self, name: &str) -> Vec<String> {
        let Some(family) = self.family(name) else {
            return Vec::new();
        };
        family
            .series
            .iter()
            .filter_map(|s| {
                family
                    .labels(s)
                    .find(|(k, _)| *k == "application_id")
                    .map(|(_, v)| v.to_string())
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.families.clear();
    }
}

impl MetricSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn describe(&mut self, descs: &[Arc<MetricDesc>]) {
        self.descs = descs.to_vec();
    }

    fn emit(&mut self, family: &MetricFamily) {
        self.families.push(family.clone());
    }
}
