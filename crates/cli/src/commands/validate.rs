//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ExporterBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    url: String,
    subscription_id: String,
    namespace: String,
    environment: String,
    metadata_file: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    url: blueprint.firehose.url.clone(),
                    subscription_id: blueprint.firehose.subscription_id.clone(),
                    namespace: blueprint.metrics.namespace.clone(),
                    environment: blueprint.metrics.environment.clone(),
                    metadata_file: blueprint
                        .metadata
                        .as_ref()
                        .map(|m| m.path.display().to_string()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ExporterBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.firehose.skip_tls_verify {
        warnings.push("firehose.skip_tls_verify is set - certificates are not checked".to_string());
    }

    if blueprint.firehose.auth_token.is_none() {
        warnings.push("firehose.auth_token is not set - Doppler will reject the stream".to_string());
    }

    if blueprint.metrics.expiration().is_none() {
        warnings.push(
            "metrics.expiration_sec is 0 - samples of stopped instances are never dropped"
                .to_string(),
        );
    }

    match blueprint.metadata {
        None => warnings.push(
            "No metadata file configured - app_name, space and org labels will be empty"
                .to_string(),
        ),
        Some(ref metadata) if !metadata.path.exists() => warnings.push(format!(
            "Metadata file '{}' does not exist",
            metadata.path.display()
        )),
        Some(_) => {}
    }

    if blueprint.exporter.listen_port == 0 {
        warnings.push("exporter.listen_port is 0 - families are only logged".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Firehose: {}", summary.url);
            println!("  Subscription: {}", summary.subscription_id);
            println!("  Namespace: {}", summary.namespace);
            println!("  Environment: {}", summary.environment);
            if let Some(ref file) = summary.metadata_file {
                println!("  Metadata: {}", file);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
