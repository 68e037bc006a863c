//! # Firehose Exporter CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - Exporter 编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::{LogFormat, LoggingConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_exporter, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    observability::init_logging(&logging_config(&cli))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Firehose exporter starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_exporter(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// `-q` pins the level to warn; otherwise `RUST_LOG` wins over `-v`.
fn logging_config(cli: &Cli) -> LoggingConfig {
    let default_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    LoggingConfig {
        format: match cli.log_format {
            cli::LogFormat::Json => LogFormat::Json,
            cli::LogFormat::Pretty => LogFormat::Pretty,
            cli::LogFormat::Compact => LogFormat::Compact,
        },
        default_level: default_level.to_string(),
        ignore_env: cli.quiet,
    }
}
