//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::MissionBlueprint;
use serde::Serialize;
use tracing::info;

use super::validate::terrain_label;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    link: LinkInfo,
    stream: StreamInfo,
    analysis: AnalysisInfo,
    projection: ProjectionInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct LinkInfo {
    address: String,
    telemetry_rate_hz: f64,
}

#[derive(Serialize)]
struct StreamInfo {
    endpoint: String,
    width: u32,
    height: u32,
    frame_rate_hz: f64,
    fov_horizontal_deg: f64,
}

#[derive(Serialize)]
struct AnalysisInfo {
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    excluded_classes: Vec<u32>,
    idle_backoff_ms: u64,
}

#[derive(Serialize)]
struct ProjectionInfo {
    terrain: String,
    step_m: f64,
    max_range_m: f64,
    coverage: String,
    orientation: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &MissionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let settings = &blueprint.analysis.settings;
    let projection = &blueprint.projection;

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        link: LinkInfo {
            address: blueprint.link.address.clone(),
            telemetry_rate_hz: blueprint.link.telemetry_rate_hz,
        },
        stream: StreamInfo {
            endpoint: format!("{}:{}", blueprint.stream.host, blueprint.stream.port),
            width: blueprint.stream.width,
            height: blueprint.stream.height,
            frame_rate_hz: blueprint.stream.frame_rate_hz,
            fov_horizontal_deg: blueprint.stream.fov_horizontal.to_degrees(),
        },
        analysis: AnalysisInfo {
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            max_detections: settings.max_detections,
            excluded_classes: settings.excluded_classes.iter().copied().collect(),
            idle_backoff_ms: blueprint.analysis.idle_backoff_ms,
        },
        projection: ProjectionInfo {
            terrain: terrain_label(&projection.terrain),
            step_m: projection.step_m,
            max_range_m: projection.max_range_m,
            coverage: format!("{:?}", projection.coverage),
            orientation: format!("{:?}", projection.orientation),
        },
        sinks,
    }
}

fn print_config_info(blueprint: &MissionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 geotrack Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🛰  Link");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Address: {}", blueprint.link.address);
    println!(
        "   └─ Telemetry rate: {} Hz",
        blueprint.link.telemetry_rate_hz
    );

    let stream = &blueprint.stream;
    println!("\n📷 Stream");
    println!("   ├─ Endpoint: {}:{}", stream.host, stream.port);
    println!(
        "   ├─ Frame: {}x{} @ {} Hz",
        stream.width, stream.height, stream.frame_rate_hz
    );
    println!(
        "   └─ Horizontal FOV: {:.1}°",
        stream.fov_horizontal.to_degrees()
    );

    let settings = &blueprint.analysis.settings;
    println!("\n🔍 Analysis");
    println!("   ├─ Confidence threshold: {}", settings.confidence_threshold);
    println!("   ├─ NMS IoU threshold: {}", settings.iou_threshold);
    println!("   ├─ Max detections: {}", settings.max_detections);
    if !settings.excluded_classes.is_empty() {
        println!("   ├─ Excluded classes: {:?}", settings.excluded_classes);
    }
    println!("   └─ Idle backoff: {} ms", blueprint.analysis.idle_backoff_ms);

    let projection = &blueprint.projection;
    println!("\n🌍 Projection");
    println!("   ├─ Terrain: {}", terrain_label(&projection.terrain));
    println!(
        "   ├─ Ray march: {} m steps, {} m range",
        projection.step_m, projection.max_range_m
    );
    println!("   ├─ Coverage: {:?}", projection.coverage);
    println!("   └─ Orientation: {:?}", projection.orientation);

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, queue {})",
                    prefix, sink.name, sink.sink_type, sink.queue_capacity
                );
                for (key, value) in &sink.params {
                    println!("   {}     {} = {}", if is_last { " " } else { "│" }, key, value);
                }
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}
