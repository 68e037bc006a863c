//! Exporter run statistics.

use std::time::Duration;

use observability::ScrapeMetricsAggregator;

/// Statistics from an exporter run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Envelopes read from the firehose
    pub envelopes_received: u64,

    /// Container metric envelopes among them
    pub container_metrics_received: u64,

    /// Upstream drop notifications seen
    pub slow_consumer_alerts: u64,

    /// Instances held by the store at shutdown
    pub tracked_instances: usize,

    /// Collection statistics
    pub scrape: ScrapeMetricsAggregator,
}

impl PipelineStats {
    /// Envelopes per second over the whole run
    pub fn envelope_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.envelopes_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Exporter Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Envelopes received: {}", self.envelopes_received);
        println!("   ├─ Container metrics: {}", self.container_metrics_received);
        println!("   ├─ Envelopes/s: {:.2}", self.envelope_rate());
        println!("   ├─ Slow consumer alerts: {}", self.slow_consumer_alerts);
        println!("   └─ Tracked instances: {}", self.tracked_instances);

        println!("\n{}", self.scrape.summary());
    }
}
