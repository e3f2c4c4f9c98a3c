//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{load_script, Pipeline, PipelineConfig, PipelineStats};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref link) = args.link {
        info!(link = %link, "Overriding link address from CLI");
        blueprint.link.address = link.clone();
    }
    if let Some(port) = args.stream_port {
        info!(port, "Overriding stream port from CLI");
        blueprint.stream.port = port;
    }
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid CLI overrides")?;

    info!(
        link = %blueprint.link.address,
        stream = %format!("{}:{}", blueprint.stream.host, blueprint.stream.port),
        terrain = ?blueprint.projection.terrain,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    let commands = match args.commands {
        Some(ref path) => {
            let script = load_script(path)?;
            info!(path = %path.display(), steps = script.len(), "Command script loaded");
            script
        }
        None => Vec::new(),
    };

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, commands.len());
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_iterations: (args.max_iterations > 0).then_some(args.max_iterations),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        targets: args.targets,
        commands,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    info!("Starting pipeline...");
    let stats: PipelineStats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        published = stats.analysis.published,
        skipped = stats.analysis.skipped,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("geotrack finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed the corresponding branch never fires.
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
        _ = ctrl_c => warn!("Received Ctrl+C, stopping pipeline..."),
        _ = terminate => warn!("Received SIGTERM, stopping pipeline..."),
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::MissionBlueprint, command_steps: usize) {
    println!("\n=== Configuration Summary ===\n");
    println!("Link: {} ({} Hz)", blueprint.link.address, blueprint.link.telemetry_rate_hz);
    println!(
        "Stream: {}:{} {}x{} @ {} Hz",
        blueprint.stream.host,
        blueprint.stream.port,
        blueprint.stream.width,
        blueprint.stream.height,
        blueprint.stream.frame_rate_hz
    );

    let settings = &blueprint.analysis.settings;
    println!("\nDetection:");
    println!("  Confidence threshold: {}", settings.confidence_threshold);
    println!("  Max detections: {}", settings.max_detections);

    println!("\nProjection:");
    println!("  Terrain: {:?}", blueprint.projection.terrain);
    println!("  Coverage: {:?}", blueprint.projection.coverage);
    println!("  Orientation: {:?}", blueprint.projection.orientation);

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    if command_steps > 0 {
        println!("\nScripted commands: {}", command_steps);
    }

    println!();
}
