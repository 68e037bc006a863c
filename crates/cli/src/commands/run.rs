//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ExporterBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_exporter(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after command-line overrides")?;

    info!(
        url = %blueprint.firehose.url,
        subscription_id = %blueprint.firehose.subscription_id,
        namespace = %blueprint.metrics.namespace,
        environment = %blueprint.metrics.environment,
        listen_port = blueprint.exporter.listen_port,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let listen_port = blueprint.exporter.listen_port;
    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (listen_port != 0).then_some(listen_port),
        timeout: (args.timeout != 0).then(|| Duration::from_secs(args.timeout)),
    });

    info!("Starting exporter...");

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Exporter stopped")?;

    info!(
        duration_secs = stats.duration.as_secs_f64(),
        envelopes = stats.envelopes_received,
        collections = stats.scrape.summary().total_collections,
        "Exporter finished"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(blueprint: &mut ExporterBlueprint, args: &RunArgs) {
    if let Some(ref url) = args.url {
        info!(url = %url, "Overriding firehose url from CLI");
        blueprint.firehose.url = url.clone();
    }
    if let Some(ref id) = args.subscription_id {
        info!(subscription_id = %id, "Overriding subscription id from CLI");
        blueprint.firehose.subscription_id = id.clone();
    }
    if let Some(ref token) = args.auth_token {
        blueprint.firehose.auth_token = Some(token.clone());
    }
    if args.skip_tls_verify {
        warn!("TLS certificate verification disabled from CLI");
        blueprint.firehose.skip_tls_verify = true;
    }
    if let Some(port) = args.metrics_port {
        info!(port, "Overriding metrics port from CLI");
        blueprint.exporter.listen_port = port;
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ExporterBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Firehose:");
    println!("  URL: {}", blueprint.firehose.url);
    println!("  Subscription: {}", blueprint.firehose.subscription_id);
    println!("  Skip TLS verify: {}", blueprint.firehose.skip_tls_verify);

    let metrics = &blueprint.metrics;
    println!("\nMetrics:");
    println!("  Namespace: {}", metrics.namespace);
    println!("  Environment: {}", metrics.environment);
    match metrics.expiration() {
        Some(expiration) => println!("  Expiration: {}s", expiration.as_secs()),
        None => println!("  Expiration: never"),
    }

    if let Some(ref metadata) = blueprint.metadata {
        println!("\nMetadata:");
        println!("  File: {}", metadata.path.display());
        println!("  Refresh: every {}s", metadata.refresh_interval_sec);
    }

    println!("\nListen port: {}", blueprint.exporter.listen_port);
    println!();
}
