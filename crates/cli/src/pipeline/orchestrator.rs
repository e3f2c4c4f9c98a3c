//! Pipeline orchestrator - wires ingestion, analysis, dispatch and commands.
//!
//! The vehicle link and the video stream are simulated from the blueprint:
//! a synthetic flight feeds telemetry, a gradient camera feeds frames, a
//! scripted detector produces drifting targets and commands go to a
//! recording link.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use analysis_engine::{
    AnalysisHandle, AnalysisLoop, AnalysisLoopConfig, IouTracker, ScriptedDetector,
    SettingsHandle,
};
use anyhow::{Context, Result};
use command_channel::{CommandChannel, MockVehicleLink};
use contracts::MissionBlueprint;
use geolocation::{terrain_from_config, GeoProjector, ProjectorConfig};
use ingestion::{
    IngestionPipeline, MockTelemetryConfig, MockTelemetryFeed, MockVideoConfig, MockVideoFeed,
};
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::script::{run_script, CommandReport, ScriptedCommand};
use super::stats::{PipelineStats, StopReason};
use crate::error::CliError;

/// Seconds for a scripted target to cross the frame once
const TARGET_CROSSING_SECS: f64 = 10.0;

/// Time allowed for sinks to drain on shutdown
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The mission blueprint
    pub blueprint: MissionBlueprint,

    /// Stop after this many published snapshots (None = unlimited)
    pub max_iterations: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Targets produced by the scripted detector
    pub targets: usize,

    /// Operator commands replayed during the run
    pub commands: Vec<ScriptedCommand>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until a stop condition is met or `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        info!(
            link = %blueprint.link.address,
            stream = %format!("{}:{}", blueprint.stream.host, blueprint.stream.port),
            "Running with simulated link and stream"
        );

        // Ingestion
        let mut ingestion = IngestionPipeline::new();
        ingestion
            .register_telemetry_feed(Box::new(MockTelemetryFeed::new(
                MockTelemetryConfig::from_link(&blueprint.link),
            )))
            .context("Failed to register telemetry feed")?;
        ingestion
            .register_video_feed(Box::new(MockVideoFeed::new(MockVideoConfig::from_stream(
                &blueprint.stream,
            ))))
            .context("Failed to register video feed")?;

        // Projection
        let terrain =
            terrain_from_config(&blueprint.projection.terrain).context("Failed to load terrain")?;
        let projector = GeoProjector::new(terrain, ProjectorConfig::from(&blueprint.projection));
        info!(
            terrain = ?blueprint.projection.terrain,
            orientation = ?blueprint.projection.orientation,
            "Projector configured"
        );

        // Analysis
        let stream = &blueprint.stream;
        let script_frames = (stream.frame_rate_hz * TARGET_CROSSING_SECS).ceil() as usize;
        let detector = ScriptedDetector::drifting(
            self.config.targets,
            stream.width,
            stream.height,
            script_frames,
        );
        let analysis = AnalysisLoop::new(
            ingestion.telemetry().clone(),
            ingestion.video().clone(),
            Box::new(detector),
            Box::new(IouTracker::default()),
            projector,
        )
        .with_config(AnalysisLoopConfig::from(&blueprint.analysis))
        .with_settings(SettingsHandle::new(blueprint.analysis.settings.clone()));
        let snapshots = analysis.snapshots();

        // Dispatcher
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - snapshots are only kept in memory");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), snapshots.subscribe())
            .await
            .context("Failed to create dispatcher")?;
        let (dispatcher_stop_tx, dispatcher_stop_rx) = oneshot::channel::<()>();
        let dispatcher_handle = dispatcher.spawn(async move {
            let _ = dispatcher_stop_rx.await;
        });
        info!(sinks = blueprint.sinks.len(), "Dispatcher started");

        // Commands
        let channel = Arc::new(CommandChannel::new(
            Arc::new(MockVehicleLink::new()),
            snapshots.clone(),
        ));
        let script_task = tokio::spawn(run_script(
            Arc::clone(&channel),
            self.config.commands.clone(),
        ));

        // Start
        ingestion.start_all();
        let analysis = analysis
            .spawn()
            .map_err(|e| CliError::startup("analysis loop", e))?;
        info!(
            max_iterations = ?self.config.max_iterations,
            timeout = ?self.config.timeout,
            "Pipeline running"
        );

        let stop_reason = self.wait_for_stop(&analysis, shutdown).await;

        // Shutdown
        info!(reason = %stop_reason, "Shutting down pipeline...");
        let analysis_stats = analysis.stats();
        analysis.stop();
        let summary = tokio::task::spawn_blocking(move || analysis.join())
            .await
            .map_err(|e| CliError::shutdown(e.to_string()))?
            .map_err(|e| CliError::shutdown(e.to_string()))?;

        ingestion.stop_all();
        script_task.abort();

        let _ = dispatcher_stop_tx.send(());
        let sinks = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                Vec::new()
            }
        };

        let stats = PipelineStats {
            stop_reason,
            duration: start_time.elapsed(),
            ingestion: ingestion.metrics().snapshot(),
            analysis: analysis_stats,
            summary,
            sinks,
            commands: CommandReport::from_channel(&channel),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.iterations_per_sec()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    async fn wait_for_stop<F>(&self, analysis: &AnalysisHandle, shutdown: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = &mut shutdown => return StopReason::Signal,
                _ = &mut deadline => {
                    warn!(timeout_secs = timeout.map(|t| t.as_secs()), "Pipeline timed out");
                    return StopReason::Timeout;
                }
                _ = ticker.tick() => {
                    if !analysis.is_running() {
                        return StopReason::LoopExited;
                    }
                    if let Some(max) = self.config.max_iterations {
                        let published = analysis.stats().published;
                        if published >= max {
                            info!(published, "Reached max iterations limit");
                            return StopReason::MaxIterations;
                        }
                    }
                }
            }
        }
    }
}
