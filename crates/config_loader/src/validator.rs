//! Configuration validation
//!
//! Rules:
//! - detection thresholds within [0, 1], max_detections >= 1
//! - idle_backoff_ms > 0
//! - telemetry and frame rates > 0
//! - frame size non-zero, horizontal fov within (0, π)
//! - projection step > 0 and max_range > step
//! - DEM terrain lists at least one path
//! - sink names non-empty and unique

use std::collections::HashSet;
use std::f64::consts::PI;

use contracts::{ContractError, CoveragePolicy, MissionBlueprint, TerrainConfig};
use validator::Validate;

/// Validate a MissionBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    validate_link(blueprint)?;
    validate_stream(blueprint)?;
    validate_analysis(blueprint)?;
    validate_projection(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_link(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    let link = &blueprint.link;
    if !is_positive(link.telemetry_rate_hz) {
        return Err(ContractError::config_validation(
            "link.telemetry_rate_hz",
            format!("telemetry_rate_hz must be > 0, got {}", link.telemetry_rate_hz),
        ));
    }
    if !link.simulation.home.is_valid() {
        return Err(ContractError::config_validation(
            "link.simulation.home",
            "home must be a valid latitude/longitude",
        ));
    }
    Ok(())
}

fn validate_stream(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    let stream = &blueprint.stream;
    if !is_positive(stream.frame_rate_hz) {
        return Err(ContractError::config_validation(
            "stream.frame_rate_hz",
            format!("frame_rate_hz must be > 0, got {}", stream.frame_rate_hz),
        ));
    }
    if stream.width == 0 || stream.height == 0 {
        return Err(ContractError::config_validation(
            "stream.width / stream.height",
            format!(
                "frame size must be non-zero, got {}x{}",
                stream.width, stream.height
            ),
        ));
    }
    if !is_positive(stream.fov_horizontal) || stream.fov_horizontal >= PI {
        return Err(ContractError::config_validation(
            "stream.fov_horizontal",
            format!(
                "fov_horizontal must be within (0, π) radians, got {}",
                stream.fov_horizontal
            ),
        ));
    }
    Ok(())
}

fn validate_analysis(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    let analysis = &blueprint.analysis;

    if let Some(field) = analysis.settings.non_finite_threshold() {
        return Err(ContractError::config_validation(
            format!("analysis.{field}"),
            format!("{field} must be a number within [0, 1]"),
        ));
    }
    if let Err(errors) = analysis.settings.validate() {
        let mut fields: Vec<_> = errors.field_errors().into_keys().collect();
        fields.sort();
        let field = fields
            .first()
            .map(|f| format!("analysis.{f}"))
            .unwrap_or_else(|| "analysis".to_string());
        return Err(ContractError::config_validation(field, errors.to_string()));
    }

    if analysis.idle_backoff_ms == 0 {
        return Err(ContractError::config_validation(
            "analysis.idle_backoff_ms",
            "idle_backoff_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_projection(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    let projection = &blueprint.projection;

    if !is_positive(projection.step_m) {
        return Err(ContractError::config_validation(
            "projection.step_m",
            format!("step_m must be > 0, got {}", projection.step_m),
        ));
    }
    if !projection.max_range_m.is_finite() || projection.max_range_m <= projection.step_m {
        return Err(ContractError::config_validation(
            "projection.max_range_m",
            format!(
                "max_range_m ({}) must be > step_m ({})",
                projection.max_range_m, projection.step_m
            ),
        ));
    }

    match &projection.terrain {
        TerrainConfig::Flat { elevation } if !elevation.is_finite() => {
            return Err(ContractError::config_validation(
                "projection.terrain.elevation",
                "elevation must be finite",
            ));
        }
        TerrainConfig::Dem { paths } if paths.is_empty() => {
            return Err(ContractError::config_validation(
                "projection.terrain.paths",
                "dem terrain requires at least one path",
            ));
        }
        _ => {}
    }

    if let CoveragePolicy::FlatFallback { offset } = projection.coverage {
        if !offset.is_finite() || offset < 0.0 {
            return Err(ContractError::config_validation(
                "projection.coverage.offset",
                format!("offset must be a finite value >= 0, got {offset}"),
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &MissionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}

/// Finite and strictly positive (NaN fails)
fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
