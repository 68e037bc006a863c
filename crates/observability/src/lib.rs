//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式，`RUST_LOG` 优先)
//! - 自身指标 recorder 安装 (全局，不带 HTTP listener)
//! - `RecorderSink` / `render_scrape`：每次 scrape 写入全新 recorder 并渲染
//! - Exporter 自身指标与采集统计
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init_logging, install_self_metrics, render_scrape, LoggingConfig};
//!
//! init_logging(&LoggingConfig::default())?;
//! let self_metrics = install_self_metrics()?;
//! let (mut body, stats) = render_scrape(|sink| {
//!     sink.describe(&collector.describe());
//!     collector.collect(sink)
//! });
//! observability::metrics::record_collect(stats.samples, stats.series, stats.duration);
//! body.push_str(&self_metrics.render());
//! ```

pub mod metrics;
mod recorder;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_collect, record_metadata_refresh, record_purged, record_store_size, RunningStats,
    ScrapeMetricsAggregator, ScrapeSummary, StatsSummary,
};
pub use metrics_exporter_prometheus::PrometheusHandle;
pub use recorder::{render_scrape, RecorderSink};

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// 未设置 `RUST_LOG` 时的过滤级别
    pub default_level: String,
    /// 忽略 `RUST_LOG` (--quiet)
    pub ignore_env: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_level: "info".to_string(),
            ignore_env: false,
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志，附带当前 span
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 安装全局 tracing subscriber
///
/// 只能调用一次；重复调用返回错误。
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = if config.ignore_env {
        EnvFilter::new(&config.default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(format = ?config.format, level = %config.default_level, "Logging initialized");
    Ok(())
}

/// 安装全局 Prometheus recorder，用于 exporter 自身指标
///
/// 不启动 HTTP listener；调用方在 `/metrics` 响应中追加 `handle.render()`。
pub fn install_self_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!("Self-metrics recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_level, "info");
        assert!(!config.ignore_env);
    }
}
