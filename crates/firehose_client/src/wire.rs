//! Loggregator v1 envelope wire format
//!
//! Only the fields the exporter reads are declared; prost skips unknown
//! tags, so log messages, http events and value metrics decode with their
//! payloads ignored.

use contracts::{ContainerMetric, CounterEvent, Envelope, Event};
use prost::Message;

use crate::error::TransportError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum EventType {
    HttpStartStop = 4,
    LogMessage = 5,
    ValueMetric = 6,
    CounterEvent = 7,
    Error = 8,
    ContainerMetric = 9,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireEnvelope {
    #[prost(string, required, tag = "1")]
    pub origin: String,
    #[prost(enumeration = "EventType", required, tag = "2")]
    pub event_type: i32,
    #[prost(int64, optional, tag = "6")]
    pub timestamp: Option<i64>,
    #[prost(message, optional, tag = "10")]
    pub counter_event: Option<WireCounterEvent>,
    #[prost(message, optional, tag = "12")]
    pub container_metric: Option<WireContainerMetric>,
    #[prost(string, optional, tag = "13")]
    pub deployment: Option<String>,
    #[prost(string, optional, tag = "14")]
    pub job: Option<String>,
    #[prost(string, optional, tag = "15")]
    pub index: Option<String>,
    #[prost(string, optional, tag = "16")]
    pub ip: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireCounterEvent {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(uint64, required, tag = "2")]
    pub delta: u64,
    #[prost(uint64, optional, tag = "3")]
    pub total: Option<u64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WireContainerMetric {
    #[prost(string, required, tag = "1")]
    pub application_id: String,
    #[prost(int32, required, tag = "2")]
    pub instance_index: i32,
    #[prost(double, required, tag = "3")]
    pub cpu_percentage: f64,
    #[prost(uint64, required, tag = "4")]
    pub memory_bytes: u64,
    #[prost(uint64, required, tag = "5")]
    pub disk_bytes: u64,
    #[prost(uint64, optional, tag = "6")]
    pub memory_bytes_quota: Option<u64>,
    #[prost(uint64, optional, tag = "7")]
    pub disk_bytes_quota: Option<u64>,
}

/// Decode one binary websocket frame.
///
/// An envelope whose declared type has no matching payload decodes as
/// `Event::Other`.
pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, TransportError> {
    let wire = WireEnvelope::decode(frame)?;

    let event = match EventType::try_from(wire.event_type) {
        Ok(EventType::ContainerMetric) => wire
            .container_metric
            .map(|m| {
                Event::ContainerMetric(ContainerMetric {
                    application_id: m.application_id,
                    instance_index: m.instance_index,
                    cpu_percentage: m.cpu_percentage,
                    memory_bytes: m.memory_bytes,
                    disk_bytes: m.disk_bytes,
                    memory_bytes_quota: m.memory_bytes_quota.unwrap_or_default(),
                    disk_bytes_quota: m.disk_bytes_quota.unwrap_or_default(),
                })
            })
            .unwrap_or(Event::Other),
        Ok(EventType::CounterEvent) => wire
            .counter_event
            .map(|c| {
                Event::CounterEvent(CounterEvent {
                    total: c.total.unwrap_or(c.delta),
                    name: c.name,
                    delta: c.delta,
                })
            })
            .unwrap_or(Event::Other),
        _ => Event::Other,
    };

    Ok(Envelope {
        origin: wire.origin,
        ip: wire.ip.unwrap_or_default(),
        timestamp: wire.timestamp,
        event,
    })
}
