//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CoveragePolicy, MissionBlueprint, SinkType, TerrainConfig};
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
    link: String,
    terrain: String,
    confidence_threshold: f32,
    max_detections: usize,
    sink_count: usize,
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
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    link: blueprint.link.address.clone(),
                    terrain: terrain_label(&blueprint.projection.terrain),
                    confidence_threshold: blueprint.analysis.settings.confidence_threshold,
                    max_detections: blueprint.analysis.settings.max_detections,
                    sink_count: blueprint.sinks.len(),
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

pub(crate) fn terrain_label(terrain: &TerrainConfig) -> String {
    match terrain {
        TerrainConfig::Flat { elevation } => format!("flat ({elevation} m)"),
        TerrainConfig::Dem { paths } => format!("dem ({} tiles)", paths.len()),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &MissionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - snapshots are only kept in memory".to_string());
    }

    if !blueprint
        .sinks
        .iter()
        .any(|s| s.sink_type != SinkType::Log)
    {
        warnings.push("No file or network sink - results are not persisted".to_string());
    }

    if matches!(blueprint.projection.terrain, TerrainConfig::Flat { .. })
        && blueprint.projection.coverage != CoveragePolicy::Unresolved
    {
        warnings.push("coverage policy has no effect on flat terrain".to_string());
    }

    if blueprint.analysis.settings.confidence_threshold == 0.0 {
        warnings.push("confidence_threshold is 0 - every detection is kept".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Link: {}", summary.link);
            println!("  Terrain: {}", summary.terrain);
            println!("  Confidence threshold: {}", summary.confidence_threshold);
            println!("  Max detections: {}", summary.max_detections);
            println!("  Sinks: {}", summary.sink_count);
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
