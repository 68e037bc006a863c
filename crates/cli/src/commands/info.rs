//! `info` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use collector::SnapshotCollector;
use contracts::{ExporterBlueprint, MetricKind};
use metrics_store::{MetadataTable, MetricsStore};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    firehose: FirehoseInfo,
    metrics: MetricsInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<MetadataInfo>,
    listen_port: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    families: Vec<FamilyInfo>,
}

#[derive(Serialize)]
struct FirehoseInfo {
    url: String,
    subscription_id: String,
    skip_tls_verify: bool,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    idle_timeout_sec: Option<u64>,
}

#[derive(Serialize)]
struct MetricsInfo {
    namespace: String,
    environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration_sec: Option<u64>,
    cleanup_interval_sec: u64,
    scrape_interval_sec: u64,
}

#[derive(Serialize)]
struct MetadataInfo {
    path: String,
    refresh_interval_sec: u64,
}

#[derive(Serialize)]
struct FamilyInfo {
    name: String,
    kind: String,
    labels: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &ExporterBlueprint, args: &InfoArgs) -> ConfigInfo {
    let families = if args.families {
        describe_families(blueprint)
    } else {
        Vec::new()
    };

    let firehose = &blueprint.firehose;
    let metrics = &blueprint.metrics;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        firehose: FirehoseInfo {
            url: firehose.url.clone(),
            subscription_id: firehose.subscription_id.clone(),
            skip_tls_verify: firehose.skip_tls_verify,
            authenticated: firehose.auth_token.is_some(),
            idle_timeout_sec: firehose.idle_timeout().map(|d| d.as_secs()),
        },
        metrics: MetricsInfo {
            namespace: metrics.namespace.clone(),
            environment: metrics.environment.clone(),
            expiration_sec: metrics.expiration().map(|d| d.as_secs()),
            cleanup_interval_sec: metrics.cleanup_interval_sec,
            scrape_interval_sec: metrics.scrape_interval_sec,
        },
        metadata: blueprint.metadata.as_ref().map(|m| MetadataInfo {
            path: m.path.display().to_string(),
            refresh_interval_sec: m.refresh_interval_sec,
        }),
        listen_port: blueprint.exporter.listen_port,
        families,
    }
}

/// Families exactly as the collector would describe them
fn describe_families(blueprint: &ExporterBlueprint) -> Vec<FamilyInfo> {
    let collector = SnapshotCollector::new(
        Arc::new(MetricsStore::new()),
        Arc::new(MetadataTable::new()),
        &blueprint.metrics,
    );

    collector
        .describe()
        .iter()
        .map(|desc| FamilyInfo {
            name: desc.name.clone(),
            kind: match desc.kind {
                MetricKind::Gauge => "gauge".to_string(),
                MetricKind::Counter => "counter".to_string(),
            },
            labels: desc
                .const_labels
                .iter()
                .map(|(k, _)| k.clone())
                .chain(desc.label_names.iter().map(|l| l.to_string()))
                .collect(),
        })
        .collect()
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Firehose Exporter Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let firehose = &info.firehose;
    println!("🔌 Firehose");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ URL: {}", firehose.url);
    println!("   ├─ Subscription: {}", firehose.subscription_id);
    println!("   ├─ Skip TLS verify: {}", firehose.skip_tls_verify);
    match firehose.idle_timeout_sec {
        Some(secs) => println!("   ├─ Idle timeout: {}s", secs),
        None => println!("   ├─ Idle timeout: none"),
    }
    println!("   └─ Authenticated: {}", firehose.authenticated);

    let metrics = &info.metrics;
    println!("\n📈 Metrics");
    println!("   ├─ Namespace: {}", metrics.namespace);
    println!("   ├─ Environment: {}", metrics.environment);
    match metrics.expiration_sec {
        Some(secs) => println!("   ├─ Expiration: {}s", secs),
        None => println!("   ├─ Expiration: never"),
    }
    println!("   ├─ Cleanup interval: {}s", metrics.cleanup_interval_sec);
    println!("   └─ Scrape interval: {}s", metrics.scrape_interval_sec);

    match &info.metadata {
        Some(metadata) => {
            println!("\n🏷️  Metadata");
            println!("   ├─ File: {}", metadata.path);
            println!("   └─ Refresh: every {}s", metadata.refresh_interval_sec);
        }
        None => println!("\n🏷️  Metadata: none"),
    }

    println!("\n📤 Listen port: {}", info.listen_port);

    if !info.families.is_empty() {
        println!("\n📋 Families ({})", info.families.len());
        for (i, family) in info.families.iter().enumerate() {
            let prefix = if i == info.families.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} ({})", prefix, family.name, family.kind);
        }
    }

    println!();
}
