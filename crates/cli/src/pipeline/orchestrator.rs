//! Pipeline orchestrator - wires ingestion, storage and exposition.
//!
//! Uses the websocket firehose client when the `real-firehose` feature is
//! enabled, otherwise a synthetic stream.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use collector::{LogSink, SnapshotCollector};
use config_loader::MetadataLoader;
use contracts::{
    ExporterBlueprint, FirehoseTransport, InstanceId, MetadataConfig, MetadataEntry, MetricSink,
};
use ingestion::StreamIngestor;
use metrics_store::{MetadataTable, MetricsStore, OperationalCounter};
use observability::{record_metadata_refresh, record_purged, ScrapeMetricsAggregator};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::exposition::{note_collection, MetricsServer, ScrapeState};
use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The exporter configuration
    pub blueprint: ExporterBlueprint,

    /// Prometheus listener port (None = log families instead)
    pub metrics_port: Option<u16>,

    /// Stop after this long (None = until shutdown)
    pub timeout: Option<Duration>,
}

/// Main exporter orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

enum Outcome {
    Shutdown,
    TimedOut,
    Stopped(ingestion::IngestionError),
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses, or the stream
    /// fails permanently.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        #[cfg(feature = "real-firehose")]
        let transport = {
            use firehose_client::{ConsumerConfig, FirehoseConsumer};

            info!(url = %self.config.blueprint.firehose.url, "Using firehose websocket transport");
            FirehoseConsumer::new(ConsumerConfig::from_config(&self.config.blueprint.firehose))
        };

        #[cfg(not(feature = "real-firehose"))]
        let transport = {
            info!("Running in MOCK mode (synthetic container metrics)");
            ingestion::MockTransport::synthetic(ingestion::MockFirehoseConfig::default())
        };

        self.run_with(transport, shutdown).await
    }

    /// Run with an explicit transport
    pub async fn run_with<T: FirehoseTransport>(
        self,
        transport: T,
        shutdown: impl Future<Output = ()>,
    ) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let metrics = &blueprint.metrics;

        let store = Arc::new(MetricsStore::with_expiration(metrics.expiration()));
        let metadata = Arc::new(load_metadata(blueprint.metadata.as_ref()).await?);
        let collector = Arc::new(SnapshotCollector::new(
            Arc::clone(&store),
            Arc::clone(&metadata),
            metrics,
        ));
        let aggregator = Arc::new(Mutex::new(ScrapeMetricsAggregator::new()));

        // With an HTTP endpoint every scrape runs its own collection; without
        // one, collections are logged on the scrape interval.
        let (server, mut log_sink) = match self.config.metrics_port {
            Some(port) => {
                let state = Arc::new(ScrapeState {
                    collector: Arc::clone(&collector),
                    store: Arc::clone(&store),
                    aggregator: Arc::clone(&aggregator),
                    self_metrics: Some(observability::install_self_metrics()?),
                });
                (Some(MetricsServer::start(port, state).await?), None)
            }
            None => {
                warn!("No metrics port configured - families are logged only");
                let mut sink = LogSink::new("log");
                sink.describe(&collector.describe());
                (None, Some(sink))
            }
        };

        let mut scrape = log_sink
            .as_ref()
            .map(|_| interval(metrics.scrape_interval(), false));
        let mut purge = metrics
            .expiration()
            .map(|_| interval(metrics.cleanup_interval(), true));
        let refresher = blueprint.metadata.clone().map(|source| {
            tokio::spawn(refresh_loop(
                source,
                Arc::clone(&metadata),
                Arc::clone(&aggregator),
            ))
        });

        info!(
            expiration_secs = metrics.expiration().map(|d| d.as_secs()),
            scrape_interval_secs = metrics.scrape_interval_sec,
            metadata_entries = metadata.len(),
            endpoint = ?server.as_ref().map(MetricsServer::local_addr),
            "Exporter configured"
        );

        let mut ingestor = StreamIngestor::new(
            transport,
            blueprint.firehose.subscription_id.clone(),
            Arc::clone(&store),
            Arc::clone(&metadata),
        );

        let deadline = self.config.timeout;
        let outcome = {
            let ingest = ingestor.run();
            tokio::pin!(ingest);
            tokio::pin!(shutdown);
            let timeout = sleep_or_pending(deadline);
            tokio::pin!(timeout);

            loop {
                tokio::select! {
                    result = &mut ingest => match result {
                        Ok(()) => break Outcome::Shutdown,
                        Err(e) => break Outcome::Stopped(e),
                    },
                    _ = &mut shutdown => break Outcome::Shutdown,
                    _ = &mut timeout => break Outcome::TimedOut,
                    _ = tick(&mut scrape) => {
                        if let Some(sink) = log_sink.as_mut() {
                            let stats = collector.collect(sink);
                            note_collection(&stats, &store, &aggregator);
                        }
                    }
                    _ = tick(&mut purge) => {
                        let purged = store.purge_expired();
                        record_purged(purged);
                        lock(&aggregator).record_purged(purged);
                        if purged > 0 {
                            debug!(purged, remaining = store.len(), "Expired samples purged");
                        }
                    }
                }
            }
        };

        info!("Shutting down exporter...");
        ingestor.shutdown().await;
        if let Some(refresher) = refresher {
            refresher.abort();
        }
        if let Some(server) = server {
            server.stop().await;
        }

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            envelopes_received: store.read_counter(OperationalCounter::EnvelopesReceived),
            container_metrics_received: store
                .read_counter(OperationalCounter::ContainerMetricsReceived),
            slow_consumer_alerts: store.read_counter(OperationalCounter::SlowConsumerAlert),
            tracked_instances: store.len(),
            scrape: lock(&aggregator).clone(),
        };

        match outcome {
            Outcome::Shutdown => info!("Exporter shutdown complete"),
            Outcome::TimedOut => {
                warn!(timeout_secs = deadline.map(|d| d.as_secs()), "Exporter timed out")
            }
            Outcome::Stopped(e) => {
                stats.print_summary();
                return Err(e).context("Firehose ingestion stopped");
            }
        }

        Ok(stats)
    }
}

/// Parse the metadata file on the blocking pool
async fn read_metadata(path: PathBuf) -> Result<HashMap<InstanceId, MetadataEntry>> {
    let entries = tokio::task::spawn_blocking(move || MetadataLoader::load_from_path(&path))
        .await
        .context("Metadata loader task failed")??;
    Ok(entries)
}

/// Initial metadata load; a broken file at startup is a configuration error
async fn load_metadata(source: Option<&MetadataConfig>) -> Result<MetadataTable> {
    let Some(source) = source else {
        return Ok(MetadataTable::new());
    };

    let entries = read_metadata(source.path.clone())
        .await
        .with_context(|| format!("Failed to load metadata from {}", source.path.display()))?;
    record_metadata_refresh(true, entries.len());
    info!(path = %source.path.display(), entries = entries.len(), "Metadata loaded");
    Ok(MetadataTable::from_entries(entries))
}

/// Reload the metadata file; keeps the current table on failure
async fn refresh_metadata(source: &MetadataConfig, table: &MetadataTable) -> bool {
    match read_metadata(source.path.clone()).await {
        Ok(entries) => {
            let count = entries.len();
            table.replace(entries);
            record_metadata_refresh(true, count);
            debug!(entries = count, "Metadata refreshed");
            true
        }
        Err(e) => {
            record_metadata_refresh(false, table.len());
            warn!(
                path = %source.path.display(),
                error = %format!("{e:#}"),
                "Metadata refresh failed, keeping previous table"
            );
            false
        }
    }
}

/// Periodic metadata refresh, run as its own task
async fn refresh_loop(
    source: MetadataConfig,
    table: Arc<MetadataTable>,
    aggregator: Arc<Mutex<ScrapeMetricsAggregator>>,
) {
    let mut every = interval(source.refresh_interval(), true);
    loop {
        every.tick().await;
        if !refresh_metadata(&source, &table).await {
            lock(&aggregator).record_metadata_failure();
        }
    }
}

fn lock(aggregator: &Mutex<ScrapeMetricsAggregator>) -> MutexGuard<'_, ScrapeMetricsAggregator> {
    aggregator.lock().unwrap_or_else(PoisonError::into_inner)
}

fn interval(period: Duration, delay_first: bool) -> Interval {
    let mut interval = if delay_first {
        time::interval_at(time::Instant::now() + period, period)
    } else {
        time::interval(period)
    };
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn sleep_or_pending(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}
