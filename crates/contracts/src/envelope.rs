//! Envelope - unit of data delivered by a firehose transport
//!
//! Transports translate their wire format into these types; the ingestion
//! loop only ever sees `Envelope`.

use serde::{Deserialize, Serialize};

use crate::{InstanceId, Sample};

/// Counter event the traffic controller emits when it sheds envelopes.
pub const DROPPED_MESSAGES_EVENT: &str = "TruncatingBuffer.DroppedMessages";

/// Origin used by the doppler broker for its own diagnostic events.
pub const BROKER_ORIGIN: &str = "doppler";

/// One message from the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Component that emitted the event
    pub origin: String,

    /// IP of the emitting VM, empty when unknown
    #[serde(default)]
    pub ip: String,

    /// Emission time, nanoseconds since the epoch
    #[serde(default)]
    pub timestamp: Option<i64>,

    pub event: Event,
}

/// Payload carried by an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    ContainerMetric(ContainerMetric),
    CounterEvent(CounterEvent),
    /// Any event type the exporter does not aggregate
    Other,
}

/// Resource usage of one application instance as reported by a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetric {
    pub application_id: String,
    pub instance_index: i32,
    pub cpu_percentage: f64,
    pub memory_bytes: u64,
    pub disk_bytes: u64,
    #[serde(default)]
    pub memory_bytes_quota: u64,
    #[serde(default)]
    pub disk_bytes_quota: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterEvent {
    pub name: String,
    pub delta: u64,
    #[serde(default)]
    pub total: u64,
}

impl Envelope {
    /// Build an envelope around a container metric.
    pub fn container_metric(
        origin: impl Into<String>,
        ip: impl Into<String>,
        metric: ContainerMetric,
    ) -> Self {
        Self {
            origin: origin.into(),
            ip: ip.into(),
            timestamp: None,
            event: Event::ContainerMetric(metric),
        }
    }

    /// Build an envelope around a counter event.
    pub fn counter_event(origin: impl Into<String>, name: impl Into<String>, delta: u64) -> Self {
        Self {
            origin: origin.into(),
            ip: String::new(),
            timestamp: None,
            event: Event::CounterEvent(CounterEvent {
                name: name.into(),
                delta,
                total: delta,
            }),
        }
    }

    /// True for the broker's own "dropped messages" counter.
    ///
    /// The same counter name coming from any other origin is not a
    /// backpressure signal.
    pub fn is_upstream_drop_signal(&self) -> bool {
        match &self.event {
            Event::CounterEvent(counter) => {
                counter.name == DROPPED_MESSAGES_EVENT && self.origin == BROKER_ORIGIN
            }
            _ => false,
        }
    }

    /// Sample carried by this envelope, if it is a container metric.
    ///
    /// A negative instance index cannot name a real instance; such metrics
    /// yield `None`.
    pub fn to_sample(&self) -> Option<Sample> {
        let Event::ContainerMetric(metric) = &self.event else {
            return None;
        };
        let instance_index = u32::try_from(metric.instance_index).ok()?;

        Some(Sample {
            source: self.ip.clone(),
            instance_id: InstanceId::from(metric.application_id.as_str()),
            instance_index,
            cpu_percentage: metric.cpu_percentage,
            memory_bytes: metric.memory_bytes,
            disk_bytes: metric.disk_bytes,
            memory_bytes_quota: metric.memory_bytes_quota,
            disk_bytes_quota: metric.disk_bytes_quota,
        })
    }
}
