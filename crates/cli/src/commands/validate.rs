//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ServerSettings, SplitMode};
use serde::Serialize;
use tracing::info;

use super::load_settings;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SettingsSummary>,
}

#[derive(Serialize)]
struct SettingsSummary {
    input: String,
    mode: String,
    target_count: usize,
    block_count: usize,
    high_water_mark: usize,
    monitoring: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!("Validating configuration");

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
    let config_path = args.config.config.as_ref().map(|p| p.display().to_string());

    match load_settings(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(SettingsSummary {
                    input: settings.input.describe(),
                    mode: settings.mode.as_str().to_string(),
                    target_count: settings.target_count(),
                    block_count: settings.blocks.len(),
                    high_water_mark: settings.high_water_mark,
                    monitoring: settings.monitoring_enabled(),
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
fn collect_warnings(settings: &ServerSettings) -> Vec<String> {
    let mut warnings = settings.warnings.clone();

    if settings.channels.missed_indices.is_none() {
        warnings.push("No missed-indices channel - index gaps are only logged".to_string());
    }

    if settings.channels.commands.is_none() {
        warnings.push("No command channel - consumers will not receive STOP or EOF".to_string());
    }

    if settings.channels.metrics.is_some() && !settings.monitoring_enabled() {
        warnings.push("Metrics channel set but monitoring.publish_every is 0".to_string());
    }

    if settings.mode != SplitMode::NoSplit && settings.high_water_mark == 1 {
        warnings.push(
            "high_water_mark = 1 with a split mode - slow targets will miss timeslices"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    let source = result.config_path.as_deref().unwrap_or("(flags only)");

    if result.valid {
        println!("✓ Configuration is valid: {}", source);

        if let Some(ref summary) = result.summary {
            println!("\n  Input: {}", summary.input);
            println!("  Mode: {}", summary.mode);
            println!("  Targets: {}", summary.target_count);
            println!("  Blocks: {}", summary.block_count);
            println!("  High water mark: {}", summary.high_water_mark);
            println!(
                "  Monitoring: {}",
                if summary.monitoring { "on" } else { "off" }
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", source);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
