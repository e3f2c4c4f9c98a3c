//! # Integration Tests
//!
//! End-to-end scenarios across the workspace crates, all on simulated feeds:
//! - configuration to running pipeline to files on disk
//! - operator commands resolved against live snapshots
//! - runtime settings changes
//! - projection over terrain gaps

#[cfg(test)]
mod contract_tests {
    use contracts::{MissionBlueprint, SinkType, TerrainConfig};

    #[test]
    fn test_blueprint_from_toml() {
        let content = r#"
[link]
telemetry_rate_hz = 50.0

[link.simulation]
home = { latitude = 47.397742, longitude = 8.545594, altitude = 488.0 }

[analysis]
confidence_threshold = 0.4
excluded_classes = [2]

[projection.terrain]
type = "flat"
elevation = 408.0

[[sinks]]
name = "log"
sink_type = "log"
"#;
        let blueprint: MissionBlueprint =
            config_loader::ConfigLoader::load_from_str(content, config_loader::ConfigFormat::Toml)
                .unwrap();

        assert_eq!(blueprint.link.simulation.home.altitude, 488.0);
        assert_eq!(blueprint.analysis.settings.confidence_threshold, 0.4);
        assert!(blueprint.analysis.settings.excluded_classes.contains(&2));
        assert_eq!(
            blueprint.projection.terrain,
            TerrainConfig::Flat { elevation: 408.0 }
        );
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::Log);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use analysis_engine::{AnalysisHandle, AnalysisLoop, IouTracker, ScriptedDetector, SettingsHandle};
    use command_channel::{Command, CommandChannel, LinkCall, MockVehicleLink};
    use contracts::{
        AnalysisSnapshot, CoveragePolicy, DetectionSettings, GeoPoint, SinkConfig, SinkType,
        SnapshotRecord, TerrainModel,
    };
    use dispatcher::create_dispatcher;
    use geolocation::{FlatTerrain, GeoProjector, ProjectorConfig, TerrainStack};
    use ingestion::{IngestionPipeline, LatestCell, MockTelemetryFeed, MockVideoFeed};
    use observability::MetricsSummary;
    use tokio::sync::oneshot;

    const WIDTH: u32 = 160;
    const HEIGHT: u32 = 120;

    fn home() -> GeoPoint {
        GeoPoint::new(-35.363_261, 149.165_230, 100.0)
    }

    /// Simulated vehicle hovering at `home`, camera straight down
    struct Stack {
        ingestion: IngestionPipeline,
        analysis: AnalysisHandle,
        snapshots: LatestCell<AnalysisSnapshot>,
        settings: SettingsHandle,
    }

    impl Stack {
        fn start(terrain: Arc<dyn TerrainModel>, projector: ProjectorConfig) -> Self {
            let mut ingestion = IngestionPipeline::new();
            ingestion
                .register_telemetry_feed(Box::new(MockTelemetryFeed::hovering(
                    "link", 50.0, home(),
                )))
                .unwrap();
            ingestion
                .register_video_feed(Box::new(MockVideoFeed::camera("cam", 30.0, WIDTH, HEIGHT)))
                .unwrap();

            let analysis = AnalysisLoop::new(
                ingestion.telemetry().clone(),
                ingestion.video().clone(),
                Box::new(ScriptedDetector::drifting(2, WIDTH, HEIGHT, 90)),
                Box::new(IouTracker::default()),
                GeoProjector::new(terrain, projector),
            );
            let snapshots = analysis.snapshots();
            let settings = analysis.settings();

            ingestion.start_all();
            let analysis = analysis.spawn().unwrap();

            Self {
                ingestion,
                analysis,
                snapshots,
                settings,
            }
        }

        fn flat(elevation: f64) -> Self {
            Self::start(
                Arc::new(FlatTerrain::new(elevation)),
                ProjectorConfig::default(),
            )
        }

        fn shutdown(self) -> MetricsSummary {
            self.analysis.stop();
            let summary = self.analysis.join().unwrap();
            self.ingestion.stop_all();
            summary
        }
    }

    /// Poll `cond` until it holds or the timeout elapses
    async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cond()
    }

    fn latest_has_tracks(snapshots: &LatestCell<AnalysisSnapshot>) -> bool {
        snapshots
            .latest()
            .map(|s| !s.tracks.is_empty())
            .unwrap_or(false)
    }

    fn near_home(point: &GeoPoint) -> bool {
        // 60° fov from 100 m: every ground point lies within ~0.001° of nadir
        (point.latitude - home().latitude).abs() < 0.005
            && (point.longitude - home().longitude).abs() < 0.005
            && point.altitude.abs() < 1e-6
    }

    /// Simulated feeds -> AnalysisLoop -> Dispatcher -> FileSink + LogSink
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_snapshots_reach_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let stack = Stack::flat(0.0);

        let mut params = HashMap::new();
        params.insert(
            "base_path".to_string(),
            dir.path().to_string_lossy().into_owned(),
        );
        let sinks = vec![
            SinkConfig {
                name: "files".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 64,
                params,
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 64,
                params: HashMap::new(),
            },
        ];
        let dispatcher = create_dispatcher(sinks, stack.snapshots.subscribe())
            .await
            .unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let dispatcher_task = dispatcher.spawn(async move {
            let _ = stop_rx.await;
        });

        let snapshots = stack.snapshots.clone();
        assert!(
            wait_until(Duration::from_secs(5), || {
                snapshots.latest().map(|s| s.sequence).unwrap_or(0) >= 10
            })
            .await,
            "analysis loop did not publish"
        );

        let summary = stack.shutdown();
        assert!(summary.total_iterations >= 10);

        stop_tx.send(()).unwrap();
        let metrics = tokio::time::timeout(Duration::from_secs(5), dispatcher_task)
            .await
            .unwrap()
            .unwrap();

        let files = metrics.iter().find(|(name, _)| name == "files").unwrap();
        assert!(files.1.write_count > 0);
        assert_eq!(files.1.failure_count, 0);

        let records = read_records(&dir.path().join("records"));
        assert_eq!(records.len() as u64, files.1.write_count);
        for record in &records {
            assert_eq!(record.frame.width, WIDTH);
            for tracked in &record.tracks {
                assert!(near_home(&tracked.location), "{:?}", tracked.location);
            }
        }
        assert!(records.iter().any(|r| !r.tracks.is_empty()));

        let last = records.iter().map(|r| r.sequence).max().unwrap();
        let frame = dir.path().join("frames").join(format!("{last}.png"));
        assert!(frame.exists(), "missing {}", frame.display());
    }

    fn read_records(dir: &Path) -> Vec<SnapshotRecord> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
                serde_json::from_str(&content).unwrap()
            })
            .collect()
    }

    /// Object-relative command resolved against the latest snapshot
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_object_command_uses_latest_location() {
        let stack = Stack::flat(0.0);
        let snapshots = stack.snapshots.clone();

        assert!(
            wait_until(Duration::from_secs(5), || latest_has_tracks(&snapshots)).await,
            "no tracks published"
        );
        // freeze the cell so the resolved location is predictable
        stack.shutdown();

        let snapshot = snapshots.latest().unwrap();
        let track_id = snapshot.tracks[0].track.id;
        let expected = snapshot.locate(track_id).unwrap();

        let channel = CommandChannel::new(Arc::new(MockVehicleLink::new()), snapshots.clone());
        channel
            .dispatch(Command::SetRoiObject { track_id })
            .await
            .unwrap();
        assert_eq!(channel.link().calls(), vec![LinkCall::SetRoi(expected)]);

        let absent = snapshot.track_ids().max().unwrap() + 100;
        assert!(channel
            .dispatch(Command::SetRoiObject { track_id: absent })
            .await
            .is_err());
        assert_eq!(channel.link().calls().len(), 1);
    }

    /// Settings changed while running apply to later iterations
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_settings_update_while_running() {
        let stack = Stack::flat(0.0);
        let snapshots = stack.snapshots.clone();

        assert!(wait_until(Duration::from_secs(5), || latest_has_tracks(&snapshots)).await);

        // scripted detections all score 0.9
        stack
            .settings
            .update(DetectionSettings {
                confidence_threshold: 0.95,
                ..Default::default()
            })
            .unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || {
                snapshots
                    .latest()
                    .map(|s| s.tracks.is_empty() && s.stage_failure.is_none())
                    .unwrap_or(false)
            })
            .await,
            "tracks still published above the new threshold"
        );

        // invalid settings are rejected and the running ones kept
        let invalid = DetectionSettings {
            max_detections: 0,
            ..Default::default()
        };
        assert!(stack.settings.update(invalid).is_err());
        assert_eq!(stack.settings.current().confidence_threshold, 0.95);

        stack.shutdown();
    }

    /// Terrain gaps leave tracks unresolved unless a flat fallback is set
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_terrain_gap_policies() {
        let unresolved = Stack::start(Arc::new(TerrainStack::new()), ProjectorConfig::default());
        let counters_ok = {
            let snapshots = unresolved.snapshots.clone();
            wait_until(Duration::from_secs(5), || {
                snapshots.latest().map(|s| s.sequence).unwrap_or(0) >= 10
            })
            .await
        };
        assert!(counters_ok);
        let stats = unresolved.analysis.stats();
        let snapshot = unresolved.snapshots.latest().unwrap();
        let summary = unresolved.shutdown();

        assert!(stats.unresolved > 0);
        assert!(summary.total_unresolved > 0);
        assert!(snapshot.tracks.is_empty());

        let fallback = Stack::start(
            Arc::new(TerrainStack::new()),
            ProjectorConfig {
                coverage: CoveragePolicy::FlatFallback { offset: 100.0 },
                ..Default::default()
            },
        );
        let snapshots = fallback.snapshots.clone();
        assert!(wait_until(Duration::from_secs(5), || latest_has_tracks(&snapshots)).await);
        let snapshot = snapshots.latest().unwrap();
        fallback.shutdown();

        for tracked in &snapshot.tracks {
            assert!(near_home(&tracked.location), "{:?}", tracked.location);
        }
    }
}
