//! Operational counters kept next to the samples

use std::fmt;

/// Named monotonically increasing counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationalCounter {
    /// The consumer could not keep pace with the stream
    SlowConsumerAlert,
    EnvelopesReceived,
    ContainerMetricsReceived,
    CounterEventsReceived,
}

impl OperationalCounter {
    pub const COUNT: usize = 4;

    pub const ALL: [OperationalCounter; Self::COUNT] = [
        Self::SlowConsumerAlert,
        Self::EnvelopesReceived,
        Self::ContainerMetricsReceived,
        Self::CounterEventsReceived,
    ];

    /// Metric name suffix, without namespace
    pub fn name(self) -> &'static str {
        match self {
            Self::SlowConsumerAlert => "slow_consumer_alert",
            Self::EnvelopesReceived => "envelopes_received",
            Self::ContainerMetricsReceived => "container_metrics_received",
            Self::CounterEventsReceived => "counter_events_received",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Self::SlowConsumerAlert => {
                "Number of times the firehose signalled that this exporter is not keeping up."
            }
            Self::EnvelopesReceived => "Total number of envelopes received from the firehose.",
            Self::ContainerMetricsReceived => {
                "Total number of container metric envelopes received from the firehose."
            }
            Self::CounterEventsReceived => {
                "Total number of counter event envelopes received from the firehose."
            }
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationalCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
