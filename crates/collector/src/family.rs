//! Metric family descriptors

use std::sync::Arc;

use contracts::{MetricDesc, MetricKind, Sample};
use metrics_store::OperationalCounter;

/// Variable labels of every container gauge, in label-value order.
pub const CONTAINER_LABELS: [&str; 6] = [
    "bosh_job_ip",
    "application_id",
    "instance_index",
    "app_name",
    "space",
    "org",
];

pub const CONTAINER_SUBSYSTEM: &str = "container_metric";
pub const FIREHOSE_SUBSYSTEM: &str = "firehose";

/// One container gauge: suffix, help and the sample field it reads.
struct GaugeDef {
    suffix: &'static str,
    help: &'static str,
    extract: fn(&Sample) -> f64,
}

const GAUGES: [GaugeDef; 5] = [
    GaugeDef {
        suffix: "cpu_percentage",
        help: "Cloud Foundry Firehose container metric: CPU used, on a scale of 0 to 100.",
        extract: |s| s.cpu_percentage,
    },
    GaugeDef {
        suffix: "memory_bytes",
        help: "Cloud Foundry Firehose container metric: bytes of memory used.",
        extract: |s| s.memory_bytes as f64,
    },
    GaugeDef {
        suffix: "disk_bytes",
        help: "Cloud Foundry Firehose container metric: bytes of disk used.",
        extract: |s| s.disk_bytes as f64,
    },
    GaugeDef {
        suffix: "memory_bytes_quota",
        help: "Cloud Foundry Firehose container metric: maximum bytes of memory allocated to container.",
        extract: |s| s.memory_bytes_quota as f64,
    },
    GaugeDef {
        suffix: "disk_bytes_quota",
        help: "Cloud Foundry Firehose container metric: maximum bytes of disk allocated to container.",
        extract: |s| s.disk_bytes_quota as f64,
    },
];

/// A container gauge bound to its namespaced description.
#[derive(Clone)]
pub struct GaugeFamily {
    pub desc: Arc<MetricDesc>,
    pub extract: fn(&Sample) -> f64,
}

/// An operational counter bound to its namespaced description.
#[derive(Debug, Clone)]
pub struct CounterFamily {
    pub desc: Arc<MetricDesc>,
    pub counter: OperationalCounter,
}

fn const_labels(environment: &str) -> Vec<(String, String)> {
    vec![("environment".to_string(), environment.to_string())]
}

pub fn gauge_families(namespace: &str, environment: &str) -> Vec<GaugeFamily> {
    GAUGES
        .iter()
        .map(|def| GaugeFamily {
            desc: Arc::new(MetricDesc {
                name: format!("{namespace}_{CONTAINER_SUBSYSTEM}_{}", def.suffix),
                help: def.help.to_string(),
                kind: MetricKind::Gauge,
                label_names: CONTAINER_LABELS.to_vec(),
                const_labels: const_labels(environment),
            }),
            extract: def.extract,
        })
        .collect()
}

pub fn counter_families(namespace: &str, environment: &str) -> Vec<CounterFamily> {
    OperationalCounter::ALL
        .iter()
        .map(|&counter| CounterFamily {
            desc: Arc::new(MetricDesc {
                name: format!("{namespace}_{FIREHOSE_SUBSYSTEM}_{}_total", counter.name()),
                help: counter.help().to_string(),
                kind: MetricKind::Counter,
                label_names: Vec::new(),
                const_labels: const_labels(environment),
            }),
            counter,
        })
        .collect()
}
