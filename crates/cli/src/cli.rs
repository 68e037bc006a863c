//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Firehose Exporter - Cloud Foundry container metrics for Prometheus
#[derive(Parser, Debug)]
#[command(
    name = "firehose-exporter",
    author,
    version,
    about = "Cloud Foundry firehose exporter for Prometheus",
    long_about = "Subscribes to the Cloud Foundry Loggregator firehose, keeps the latest \n\
                  container usage sample per application instance, and exposes it as \n\
                  Prometheus gauges labelled with application metadata."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FIREHOSE_EXPORTER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FIREHOSE_EXPORTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the exporter
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "exporter.toml",
        env = "FIREHOSE_EXPORTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the Doppler endpoint from configuration
    #[arg(long, env = "FIREHOSE_URL")]
    pub url: Option<String>,

    /// Override the firehose subscription id from configuration
    #[arg(long, env = "FIREHOSE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Override the Authorization header value
    #[arg(long, env = "FIREHOSE_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "FIREHOSE_SKIP_TLS_VERIFY")]
    pub skip_tls_verify: bool,

    /// Override the Prometheus listener port (0 = log families instead)
    #[arg(long, env = "FIREHOSE_EXPORTER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "FIREHOSE_EXPORTER_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "exporter.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "exporter.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List the metric families the exporter exposes
    #[arg(long)]
    pub families: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
