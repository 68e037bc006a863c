//! ExporterBlueprint - Config Loader output
//!
//! Describes the whole exporter: firehose subscription, metric naming,
//! metadata source and the scrape endpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExporterBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Firehose subscription settings
    #[validate(nested)]
    pub firehose: FirehoseConfig,

    /// Metric naming and retention
    #[serde(default)]
    #[validate(nested)]
    pub metrics: MetricsConfig,

    /// Application metadata source (optional)
    #[serde(default)]
    #[validate(nested)]
    pub metadata: Option<MetadataConfig>,

    /// Scrape endpoint
    #[serde(default)]
    pub exporter: ExporterConfig,
}

/// Firehose subscription settings.
///
/// Zero-valued timing fields keep the transport's own default.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FirehoseConfig {
    /// Doppler endpoint, e.g. `wss://doppler.sys.example.com:443`
    #[validate(length(min = 1))]
    pub url: String,

    /// Subscription id; consumers sharing an id share the stream
    #[validate(length(min = 1))]
    pub subscription_id: String,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Seconds without a frame before the connection counts as dead
    #[serde(default)]
    pub idle_timeout_sec: u64,

    #[serde(default)]
    pub min_retry_delay_ms: u64,

    #[serde(default)]
    pub max_retry_delay_ms: u64,

    #[serde(default)]
    pub max_retry_count: u32,

    /// Value for the `Authorization` header (e.g. `bearer <token>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl FirehoseConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero(self.idle_timeout_sec).map(Duration::from_secs)
    }

    pub fn min_retry_delay(&self) -> Option<Duration> {
        non_zero(self.min_retry_delay_ms).map(Duration::from_millis)
    }

    pub fn max_retry_delay(&self) -> Option<Duration> {
        non_zero(self.max_retry_delay_ms).map(Duration::from_millis)
    }

    pub fn max_retry_count(&self) -> Option<u32> {
        (self.max_retry_count > 0).then_some(self.max_retry_count)
    }
}

/// Metric naming and retention
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricsConfig {
    /// Prefix of every family name
    #[serde(default = "default_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    /// Value of the constant `environment` label
    #[serde(default)]
    pub environment: String,

    /// Seconds after which an unrefreshed sample is dropped (0 = never)
    #[serde(default)]
    pub expiration_sec: u64,

    /// How often expired samples are purged
    #[serde(default = "default_cleanup_interval")]
    #[validate(range(min = 1))]
    pub cleanup_interval_sec: u64,

    /// How often the collector refreshes the exposition
    #[serde(default = "default_scrape_interval")]
    #[validate(range(min = 1))]
    pub scrape_interval_sec: u64,
}

impl MetricsConfig {
    pub fn expiration(&self) -> Option<Duration> {
        non_zero(self.expiration_sec).map(Duration::from_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_sec)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_sec)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            environment: String::new(),
            expiration_sec: 0,
            cleanup_interval_sec: default_cleanup_interval(),
            scrape_interval_sec: default_scrape_interval(),
        }
    }
}

fn default_namespace() -> String {
    "firehose".to_string()
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_scrape_interval() -> u64 {
    15
}

/// Application metadata file
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetadataConfig {
    /// TOML or JSON file with `[[apps]]` entries
    pub path: PathBuf,

    /// Seconds between reloads
    #[serde(default = "default_refresh_interval")]
    #[validate(range(min = 1))]
    pub refresh_interval_sec: u64,
}

impl MetadataConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_sec)
    }
}

fn default_refresh_interval() -> u64 {
    300
}

/// Scrape endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Prometheus listener port (0 = no listener, families are logged)
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
        }
    }
}

fn default_listen_port() -> u16 {
    9186
}

fn non_zero(value: u64) -> Option<u64> {
    (value > 0).then_some(value)
}
