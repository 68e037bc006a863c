//! `/metrics` endpoint - one fresh collection per scrape

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use collector::{CollectStats, MetricSink, SnapshotCollector};
use metrics_store::MetricsStore;
use observability::{
    record_collect, record_store_size, render_scrape, PrometheusHandle, ScrapeMetricsAggregator,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Everything a scrape needs
pub struct ScrapeState {
    pub collector: Arc<SnapshotCollector>,
    pub store: Arc<MetricsStore>,
    pub aggregator: Arc<Mutex<ScrapeMetricsAggregator>>,
    /// Exporter self-metrics, appended after the collected families
    pub self_metrics: Option<PrometheusHandle>,
}

impl ScrapeState {
    /// Collect into a fresh recorder and render the result.
    pub fn scrape(&self) -> String {
        let (mut body, stats) = render_scrape(|sink| {
            sink.describe(&self.collector.describe());
            self.collector.collect(sink)
        });
        note_collection(&stats, &self.store, &self.aggregator);

        if let Some(handle) = &self.self_metrics {
            handle.run_upkeep();
            body.push_str(&handle.render());
        }
        body
    }
}

/// Self-metrics and run statistics for one finished collection
pub fn note_collection(
    stats: &CollectStats,
    store: &MetricsStore,
    aggregator: &Mutex<ScrapeMetricsAggregator>,
) {
    record_collect(stats.samples, stats.series, stats.duration);
    record_store_size(store.len());
    aggregator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .update(stats.samples, stats.duration);
}

pub fn router(state: Arc<ScrapeState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<Arc<ScrapeState>>) -> Response {
    // collect() waits on the collector lock; keep it off the async workers.
    match tokio::task::spawn_blocking(move || state.scrape()).await {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Scrape task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// HTTP server for the metrics endpoint
pub struct MetricsServer {
    local_addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl MetricsServer {
    /// Bind `0.0.0.0:port` and start serving.
    pub async fn start(port: u16, state: Arc<ScrapeState>) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("Failed to bind metrics endpoint on port {port}"))?;
        let local_addr = listener.local_addr()?;

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async {
                    let _ = stopped.await;
                })
                .await
        });

        info!(%local_addr, "Metrics endpoint listening");
        Ok(Self {
            local_addr,
            stop,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting scrapes and wait for in-flight ones.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        match self.task.await {
            Ok(Ok(())) => debug!("Metrics endpoint stopped"),
            Ok(Err(e)) => warn!(error = %e, "Metrics endpoint failed"),
            Err(e) => warn!(error = %e, "Metrics endpoint task aborted"),
        }
    }
}
