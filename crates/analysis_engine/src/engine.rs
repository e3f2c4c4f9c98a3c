//! Analysis loop implementation.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use contracts::{
    AnalysisConfig, AnalysisSnapshot, CameraFrame, ContractError, Detection, DetectionParams,
    Detector, IterationMeta, StageFailure, TelemetryChannel, Track, TrackedObject, Tracker,
    VehicleState,
};
use geolocation::{GeoProjector, Projection};
use ingestion::{LatestCell, TelemetrySource, VideoSource};
use observability::{
    record_iteration, record_iteration_skipped, IterationMetricsAggregator, MetricsSummary,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{AnalysisError, Result, SettingsHandle};

/// Loop tuning
#[derive(Debug, Clone)]
pub struct AnalysisLoopConfig {
    /// Thread name used by [`AnalysisLoop::spawn`]
    pub name: String,

    /// Sleep after an iteration that published nothing
    pub idle_backoff: Duration,

    /// Do not re-run detection on a frame whose sequence was already
    /// analysed; its tracks are re-projected with fresh telemetry instead
    pub skip_repeated_frames: bool,
}

impl Default for AnalysisLoopConfig {
    fn default() -> Self {
        Self {
            name: "analysis".to_string(),
            idle_backoff: Duration::from_millis(10),
            skip_repeated_frames: true,
        }
    }
}

impl From<&AnalysisConfig> for AnalysisLoopConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            idle_backoff: config.idle_backoff(),
            skip_repeated_frames: config.skip_repeated_frames,
            ..Default::default()
        }
    }
}

/// Why an iteration published nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A telemetry channel has never delivered a sample
    TelemetryUnavailable(TelemetryChannel),
    /// No frame has been decoded yet
    NoFrame,
    /// Neither the frame nor the telemetry changed since the last snapshot
    StaleFrame,
    /// The loop is disabled
    Disabled,
}

impl SkipReason {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TelemetryUnavailable(_) => "telemetry_unavailable",
            Self::NoFrame => "no_frame",
            Self::StaleFrame => "stale_frame",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TelemetryUnavailable(channel) => write!(f, "no {channel} telemetry yet"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of one [`AnalysisLoop::run_iteration`] call
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    /// A snapshot was published
    Published(IterationMeta),
    /// Nothing was published; try again after the backoff
    Skipped(SkipReason),
    /// Stop was requested
    Stopped,
}

/// Loop counters, shared with the handle
#[derive(Debug, Default)]
pub struct LoopCounters {
    published: AtomicU64,
    skipped: AtomicU64,
    stage_failures: AtomicU64,
    unresolved: AtomicU64,
}

impl LoopCounters {
    fn record(&self, outcome: &IterationOutcome) {
        match outcome {
            IterationOutcome::Published(meta) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                self.unresolved
                    .fetch_add(meta.unresolved as u64, Ordering::Relaxed);
                if meta.stage_failure.is_some() && !meta.reused_frame {
                    self.stage_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            IterationOutcome::Skipped(_) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            IterationOutcome::Stopped => {}
        }
    }

    pub fn snapshot(&self) -> LoopStats {
        LoopStats {
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            stage_failures: self.stage_failures.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`LoopCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub published: u64,
    pub skipped: u64,
    pub stage_failures: u64,
    pub unresolved: u64,
}

/// The perception loop
///
/// Sole consumer of the frame and telemetry cells and sole writer of the
/// snapshot cell. Every iteration is sequential; nothing inside one
/// terminates the loop.
pub struct AnalysisLoop {
    telemetry: TelemetrySource,
    video: VideoSource,
    detector: Box<dyn Detector>,
    tracker: Box<dyn Tracker>,
    projector: GeoProjector,
    settings: SettingsHandle,
    output: LatestCell<AnalysisSnapshot>,
    config: AnalysisLoopConfig,
    enabled: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    counters: Arc<LoopCounters>,
    /// Frame sequence analysed by the previous published iteration
    last_frame_sequence: Option<u64>,
    /// Tracker output for that frame
    last_tracks: Vec<Track>,
    last_stage_failure: Option<StageFailure>,
    last_vehicle_state: Option<VehicleState>,
    last_timestamp: Option<DateTime<Utc>>,
    sequence: u64,
}

impl fmt::Debug for AnalysisLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisLoop")
            .field("detector", &self.detector.name())
            .field("tracker", &self.tracker.name())
            .field("config", &self.config)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl AnalysisLoop {
    /// Create a loop reading from `telemetry` and `video`
    ///
    /// Starts enabled, with default settings and a fresh output cell.
    pub fn new(
        telemetry: TelemetrySource,
        video: VideoSource,
        detector: Box<dyn Detector>,
        tracker: Box<dyn Tracker>,
        projector: GeoProjector,
    ) -> Self {
        Self {
            telemetry,
            video,
            detector,
            tracker,
            projector,
            settings: SettingsHandle::default(),
            output: LatestCell::new(),
            config: AnalysisLoopConfig::default(),
            enabled: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(LoopCounters::default()),
            last_frame_sequence: None,
            last_tracks: Vec::new(),
            last_stage_failure: None,
            last_vehicle_state: None,
            last_timestamp: None,
            sequence: 0,
        }
    }

    pub fn with_config(mut self, config: AnalysisLoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing settings handle
    pub fn with_settings(mut self, settings: SettingsHandle) -> Self {
        self.settings = settings;
        self
    }

    /// Publish into an existing snapshot cell
    pub fn with_output(mut self, output: LatestCell<AnalysisSnapshot>) -> Self {
        self.output = output;
        self
    }

    /// Handle to the published snapshots
    pub fn snapshots(&self) -> LatestCell<AnalysisSnapshot> {
        self.output.clone()
    }

    pub fn settings(&self) -> SettingsHandle {
        self.settings.clone()
    }

    pub fn counters(&self) -> Arc<LoopCounters> {
        self.counters.clone()
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Pause analysis; the loop keeps running but publishes nothing
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Request the loop to exit at the top of its next iteration
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Run one iteration
    #[instrument(level = "trace", name = "analysis_iteration", skip(self))]
    pub fn run_iteration(&mut self) -> IterationOutcome {
        let outcome = self.iterate();
        self.counters.record(&outcome);
        outcome
    }

    fn iterate(&mut self) -> IterationOutcome {
        if self.stop.load(Ordering::SeqCst) {
            return IterationOutcome::Stopped;
        }
        if !self.is_enabled() {
            return IterationOutcome::Skipped(SkipReason::Disabled);
        }

        let started = Instant::now();

        let vehicle_state = match self.telemetry.vehicle_state() {
            Ok(state) => state,
            Err(ContractError::TelemetryUnavailable { channel }) => {
                return IterationOutcome::Skipped(SkipReason::TelemetryUnavailable(channel));
            }
            Err(e) => {
                // vehicle_state only reports missing channels
                warn!(error = %e, "unexpected telemetry error");
                return IterationOutcome::Skipped(SkipReason::TelemetryUnavailable(
                    TelemetryChannel::Attitude,
                ));
            }
        };

        let Some(frame) = self.video.latest() else {
            return IterationOutcome::Skipped(SkipReason::NoFrame);
        };
        if self.config.skip_repeated_frames && self.last_frame_sequence == Some(frame.sequence) {
            if self.last_vehicle_state == Some(vehicle_state) {
                return IterationOutcome::Skipped(SkipReason::StaleFrame);
            }
            return IterationOutcome::Published(self.refresh(vehicle_state, frame, started));
        }
        self.last_frame_sequence = Some(frame.sequence);

        let settings = self.settings.current();
        let params = DetectionParams::from_settings(&settings, &self.detector.class_ids());

        let mut meta = IterationMeta::default();
        let tracks = match self.detect_and_track(&frame, &params) {
            Ok((detections, tracks)) => {
                meta.detections = detections;
                tracks
            }
            Err(failure) => {
                warn!(
                    stage = failure.stage(),
                    error = failure.message(),
                    frame_sequence = frame.sequence,
                    "analysis stage failed, publishing telemetry only"
                );
                meta.stage_failure = Some(failure);
                Vec::new()
            }
        };
        self.last_tracks = tracks;
        self.last_stage_failure = meta.stage_failure.clone();

        IterationOutcome::Published(self.locate_and_publish(meta, vehicle_state, frame, started))
    }

    /// Publish the previous frame's tracks located from the current telemetry
    fn refresh(
        &mut self,
        vehicle_state: VehicleState,
        frame: Arc<CameraFrame>,
        started: Instant,
    ) -> IterationMeta {
        let meta = IterationMeta {
            stage_failure: self.last_stage_failure.clone(),
            reused_frame: true,
            ..Default::default()
        };
        self.locate_and_publish(meta, vehicle_state, frame, started)
    }

    fn locate_and_publish(
        &mut self,
        mut meta: IterationMeta,
        vehicle_state: VehicleState,
        frame: Arc<CameraFrame>,
        started: Instant,
    ) -> IterationMeta {
        meta.tracks = self.last_tracks.len();
        let mut tracked = Vec::with_capacity(self.last_tracks.len());
        for track in &self.last_tracks {
            match self.projector.project_track(track, &frame, &vehicle_state) {
                Projection::Resolved(location) => {
                    tracked.push(TrackedObject {
                        track: *track,
                        location,
                    });
                }
                Projection::Unresolved(reason) => {
                    debug!(track_id = track.id, %reason, "track not projected");
                    meta.unresolved += 1;
                }
            }
        }

        meta.published = tracked.len();
        meta.sequence = self.publish(vehicle_state, frame, tracked, meta.stage_failure.clone());
        meta.latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        trace!(
            sequence = meta.sequence,
            published = meta.published,
            unresolved = meta.unresolved,
            reused_frame = meta.reused_frame,
            "snapshot published"
        );
        meta
    }

    /// Detector then tracker; returns the sanitised detection count and tracks
    fn detect_and_track(
        &mut self,
        frame: &CameraFrame,
        params: &DetectionParams,
    ) -> std::result::Result<(usize, Vec<Track>), StageFailure> {
        let raw = self
            .detector
            .detect(frame, params)
            .map_err(|e| StageFailure::Detection(e.to_string()))?;
        let detections = sanitize_detections(raw, params, frame);

        let tracks = self
            .tracker
            .update(frame, &detections)
            .map_err(|e| StageFailure::Tracking(e.to_string()))?;

        Ok((detections.len(), dedup_tracks(tracks)))
    }

    fn publish(
        &mut self,
        vehicle_state: VehicleState,
        camera_frame: Arc<CameraFrame>,
        tracks: Vec<TrackedObject>,
        stage_failure: Option<StageFailure>,
    ) -> u64 {
        self.sequence += 1;
        let timestamp = self.next_timestamp();
        self.last_vehicle_state = Some(vehicle_state);

        self.output.publish(AnalysisSnapshot {
            timestamp,
            sequence: self.sequence,
            vehicle_state,
            camera_frame,
            tracks,
            stage_failure,
        });
        self.sequence
    }

    /// Wall clock, nudged forward when it did not advance
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// Run the loop on its own OS thread
    ///
    /// # Errors
    /// Returns `AnalysisError::Spawn` when the thread cannot be created.
    pub fn spawn(mut self) -> Result<AnalysisHandle> {
        let name = self.config.name.clone();
        let stop = self.stop.clone();
        let enabled = self.enabled.clone();
        let counters = self.counters.clone();
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let summary = self.run_until_stopped();
                running_flag.store(false, Ordering::SeqCst);
                summary
            })
            .map_err(|source| AnalysisError::Spawn {
                name: name.clone(),
                source,
            })?;

        Ok(AnalysisHandle {
            name,
            stop,
            enabled,
            running,
            counters,
            thread,
        })
    }

    #[instrument(
        name = "analysis_loop",
        skip(self),
        fields(detector = %self.detector.name(), tracker = %self.tracker.name())
    )]
    fn run_until_stopped(&mut self) -> MetricsSummary {
        let mut aggregator = IterationMetricsAggregator::new();
        info!("analysis loop started");

        loop {
            match self.run_iteration() {
                IterationOutcome::Published(meta) => {
                    record_iteration(&meta);
                    aggregator.update(&meta);
                }
                IterationOutcome::Skipped(reason) => {
                    record_iteration_skipped(reason.as_str());
                    aggregator.record_skip(reason.as_str());
                    trace!(%reason, "iteration skipped");
                    thread::sleep(self.config.idle_backoff);
                }
                IterationOutcome::Stopped => break,
            }
        }

        info!(
            published = aggregator.total_iterations,
            tracks = aggregator.total_tracks,
            "analysis loop stopped"
        );
        aggregator.summary()
    }
}

/// Drop out-of-range scores and disallowed classes, clamp boxes, cap the count
fn sanitize_detections(
    detections: Vec<Detection>,
    params: &DetectionParams,
    frame: &CameraFrame,
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| {
            d.score >= params.confidence_threshold
                && d.score <= 1.0
                && params.allows(d.class_id)
                && [d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2]
                    .iter()
                    .all(|v| v.is_finite())
        })
        .map(|d| Detection {
            bbox: d.bbox.clamp_to(frame.width, frame.height),
            ..d
        })
        .take(params.max_detections)
        .collect()
}

/// Keep the first track for every id
fn dedup_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen = HashSet::with_capacity(tracks.len());
    tracks.into_iter().filter(|t| seen.insert(t.id)).collect()
}

/// Control handle of a spawned [`AnalysisLoop`]
#[derive(Debug)]
pub struct AnalysisHandle {
    name: String,
    stop: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    counters: Arc<LoopCounters>,
    thread: JoinHandle<MetricsSummary>,
}

impl AnalysisHandle {
    /// Request a stop; the current iteration finishes first
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> LoopStats {
        self.counters.snapshot()
    }

    /// Wait for the loop to exit and return its run summary
    ///
    /// Does not request a stop by itself.
    pub fn join(self) -> Result<MetricsSummary> {
        self.thread
            .join()
            .map_err(|_| AnalysisError::Panicked { name: self.name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{
        Attitude, BoundingBox, ClassId, DetectionSettings, GimbalOrientation, GlobalPosition,
        PixelFormat, TelemetrySample,
    };
    use geolocation::{FlatTerrain, ProjectorConfig};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use crate::{IouTracker, ScriptedDetector};

    const HOME_LAT: f64 = -35.363_261;
    const HOME_LON: f64 = 149.165_230;

    /// Tracker echoing a scripted id per detection
    struct FixedIdTracker {
        ids: Vec<Vec<u64>>,
        calls: usize,
    }

    impl Tracker for FixedIdTracker {
        fn name(&self) -> &str {
            "fixed_id"
        }

        fn update(
            &mut self,
            _frame: &CameraFrame,
            detections: &[Detection],
        ) -> std::result::Result<Vec<Track>, ContractError> {
            let ids = self.ids.get(self.calls).cloned().unwrap_or_default();
            self.calls += 1;
            Ok(ids
                .into_iter()
                .zip(detections)
                .map(|(id, d)| Track {
                    id,
                    bbox: d.bbox,
                    class_id: d.class_id,
                })
                .collect())
        }
    }

    struct BrokenTracker;

    impl Tracker for BrokenTracker {
        fn name(&self) -> &str {
            "broken"
        }

        fn update(
            &mut self,
            _frame: &CameraFrame,
            _detections: &[Detection],
        ) -> std::result::Result<Vec<Track>, ContractError> {
            Err(ContractError::tracker("broken", "state corrupted"))
        }
    }

    /// Records the parameters of every call
    struct RecordingDetector {
        seen: Arc<Mutex<Vec<DetectionParams>>>,
    }

    impl Detector for RecordingDetector {
        fn name(&self) -> &str {
            "recording"
        }

        fn class_ids(&self) -> Vec<ClassId> {
            vec![0, 1, 2]
        }

        fn detect(
            &mut self,
            _frame: &CameraFrame,
            params: &DetectionParams,
        ) -> std::result::Result<Vec<Detection>, ContractError> {
            self.seen.lock().unwrap().push(params.clone());
            Ok(Vec::new())
        }
    }

    fn det(x: f64, score: f32, class_id: ClassId) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, 200.0, x + 40.0, 240.0),
            score,
            class_id,
        }
    }

    fn frame() -> CameraFrame {
        CameraFrame::new(
            Bytes::from(vec![0u8; 640 * 480 * 3]),
            640,
            480,
            PixelFormat::Rgb8,
            std::f64::consts::FRAC_PI_3,
        )
    }

    fn feed_telemetry(telemetry: &TelemetrySource) {
        telemetry.ingest(TelemetrySample::Attitude(Attitude::default()));
        telemetry.ingest(TelemetrySample::Position(GlobalPosition {
            latitude: HOME_LAT,
            longitude: HOME_LON,
            altitude: 100.0,
            heading: 0.0,
        }));
        telemetry.ingest(TelemetrySample::Gimbal(GimbalOrientation {
            roll: 0.0,
            pitch: -std::f64::consts::FRAC_PI_2,
            yaw: 0.0,
        }));
    }

    struct Fixture {
        telemetry: TelemetrySource,
        video: VideoSource,
    }

    impl Fixture {
        fn ready() -> Self {
            let fixture = Self {
                telemetry: TelemetrySource::new(),
                video: VideoSource::new(),
            };
            feed_telemetry(&fixture.telemetry);
            fixture.video.publish(frame()).unwrap();
            fixture
        }

        fn analysis(&self, detector: Box<dyn Detector>, tracker: Box<dyn Tracker>) -> AnalysisLoop {
            let projector = GeoProjector::new(
                Arc::new(FlatTerrain::new(0.0)),
                ProjectorConfig::default(),
            );
            AnalysisLoop::new(
                self.telemetry.clone(),
                self.video.clone(),
                detector,
                tracker,
                projector,
            )
            .with_config(AnalysisLoopConfig {
                skip_repeated_frames: false,
                idle_backoff: Duration::from_millis(1),
                ..Default::default()
            })
        }

        fn next_frame(&self) {
            self.video.publish(frame()).unwrap();
        }
    }

    fn published(outcome: IterationOutcome) -> IterationMeta {
        match outcome {
            IterationOutcome::Published(meta) => meta,
            other => panic!("expected a published iteration, got {other:?}"),
        }
    }

    #[test]
    fn test_skips_until_inputs_arrive() {
        let telemetry = TelemetrySource::new();
        let video = VideoSource::new();
        let fixture = Fixture {
            telemetry: telemetry.clone(),
            video: video.clone(),
        };
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![])),
            Box::new(IouTracker::default()),
        );

        assert_eq!(
            analysis.run_iteration(),
            IterationOutcome::Skipped(SkipReason::TelemetryUnavailable(TelemetryChannel::Attitude))
        );

        feed_telemetry(&telemetry);
        assert_eq!(
            analysis.run_iteration(),
            IterationOutcome::Skipped(SkipReason::NoFrame)
        );

        video.publish(frame()).unwrap();
        published(analysis.run_iteration());
        assert!(analysis.snapshots().latest().is_some());
    }

    #[test]
    fn test_nadir_track_located_below_vehicle() {
        let fixture = Fixture::ready();
        // box centred on the principal point
        let centred = Detection {
            bbox: BoundingBox::new(300.0, 220.0, 340.0, 260.0),
            score: 0.9,
            class_id: 0,
        };
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![centred])),
            Box::new(IouTracker::default()),
        );

        let meta = published(analysis.run_iteration());
        assert_eq!(meta.published, 1);

        let snapshot = analysis.snapshots().latest().unwrap();
        let location = snapshot.locate(1).unwrap();
        assert!((location.latitude - HOME_LAT).abs() < 1e-6);
        assert!((location.longitude - HOME_LON).abs() < 1e-6);
        assert!(location.altitude.abs() < 1e-6);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let fixture = Fixture::ready();
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![])),
            Box::new(IouTracker::default()),
        );
        let snapshots = analysis.snapshots();

        let mut previous: Option<(DateTime<Utc>, u64)> = None;
        for _ in 0..50 {
            published(analysis.run_iteration());
            let snapshot = snapshots.latest().unwrap();
            if let Some((ts, seq)) = previous {
                assert!(snapshot.timestamp > ts);
                assert_eq!(snapshot.sequence, seq + 1);
            }
            previous = Some((snapshot.timestamp, snapshot.sequence));
        }
    }

    #[test]
    fn test_absent_track_not_carried_over() {
        let fixture = Fixture::ready();
        let detector = ScriptedDetector::new(vec![
            vec![det(100.0, 0.9, 0), det(300.0, 0.9, 0)],
            vec![det(100.0, 0.9, 0)],
            vec![det(100.0, 0.9, 0)],
        ]);
        let tracker = FixedIdTracker {
            ids: vec![vec![7, 8], vec![7], vec![7]],
            calls: 0,
        };
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(tracker));
        let snapshots = analysis.snapshots();

        published(analysis.run_iteration());
        assert!(snapshots.latest().unwrap().locate(8).is_some());

        // id 8 stays gone for two consecutive iterations
        for _ in 0..2 {
            fixture.next_frame();
            published(analysis.run_iteration());
            let snapshot = snapshots.latest().unwrap();
            assert!(snapshot.locate(7).is_some());
            assert!(snapshot.locate(8).is_none());
            assert_eq!(snapshot.tracks.len(), 1);
        }
    }

    #[test]
    fn test_duplicate_track_ids_keep_first() {
        let fixture = Fixture::ready();
        let detector = ScriptedDetector::constant(vec![det(100.0, 0.9, 0), det(300.0, 0.9, 1)]);
        let tracker = FixedIdTracker {
            ids: vec![vec![4, 4]],
            calls: 0,
        };
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(tracker));

        let meta = published(analysis.run_iteration());
        assert_eq!(meta.tracks, 1);

        let snapshot = analysis.snapshots().latest().unwrap();
        assert_eq!(snapshot.tracks.len(), 1);
        assert_eq!(snapshot.tracks[0].track.class_id, 0);
    }

    #[test]
    fn test_zero_detections_publish_empty_snapshot() {
        let fixture = Fixture::ready();
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![])),
            Box::new(IouTracker::default()),
        );

        let meta = published(analysis.run_iteration());
        assert_eq!(meta.detections, 0);

        let snapshot = analysis.snapshots().latest().unwrap();
        assert!(snapshot.tracks.is_empty());
        assert!(snapshot.stage_failure.is_none());
        assert_eq!(snapshot.vehicle_state.position.altitude, 100.0);
    }

    #[test]
    fn test_detector_failure_publishes_telemetry_only() {
        let fixture = Fixture::ready();
        let detector = ScriptedDetector::constant(vec![det(100.0, 0.9, 0)]).failing_on(1);
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(IouTracker::default()));
        let snapshots = analysis.snapshots();

        published(analysis.run_iteration());
        assert_eq!(snapshots.latest().unwrap().tracks.len(), 1);

        fixture.next_frame();
        let meta = published(analysis.run_iteration());
        assert!(matches!(meta.stage_failure, Some(StageFailure::Detection(_))));

        let snapshot = snapshots.latest().unwrap();
        assert!(snapshot.tracks.is_empty());
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.vehicle_state.position.latitude, HOME_LAT);

        // the loop carries on
        fixture.next_frame();
        let meta = published(analysis.run_iteration());
        assert!(meta.stage_failure.is_none());
        assert_eq!(analysis.counters().snapshot().stage_failures, 1);
    }

    #[test]
    fn test_tracker_failure_reported() {
        let fixture = Fixture::ready();
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![det(100.0, 0.9, 0)])),
            Box::new(BrokenTracker),
        );

        let meta = published(analysis.run_iteration());
        assert!(matches!(meta.stage_failure, Some(StageFailure::Tracking(_))));
        assert_eq!(
            analysis.snapshots().latest().unwrap().stage_failure.as_ref().map(|f| f.stage()),
            Some("tracking")
        );
    }

    #[test]
    fn test_sanitises_detections() {
        let fixture = Fixture::ready();
        let detector = ScriptedDetector::constant(vec![
            det(100.0, 0.1, 0),
            det(200.0, 1.5, 0),
            det(300.0, 0.8, 5),
            Detection {
                bbox: BoundingBox::new(600.0, 400.0, 700.0, 520.0),
                score: 0.8,
                class_id: 0,
            },
            det(10.0, f32::NAN, 0),
        ])
        .with_class_ids(vec![0, 5]);
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(IouTracker::default()));
        analysis
            .settings()
            .modify(|s| {
                s.excluded_classes.insert(5);
            })
            .unwrap();

        let meta = published(analysis.run_iteration());
        assert_eq!(meta.detections, 1);

        let snapshot = analysis.snapshots().latest().unwrap();
        let bbox = snapshot.tracks[0].track.bbox;
        assert_eq!((bbox.x2, bbox.y2), (640.0, 480.0));
    }

    #[test]
    fn test_max_detections_truncates() {
        let fixture = Fixture::ready();
        let detector = ScriptedDetector::constant(
            (0..5).map(|i| det(i as f64 * 100.0, 0.9, 0)).collect(),
        );
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(IouTracker::default()));
        analysis.settings().modify(|s| s.max_detections = 2).unwrap();

        assert_eq!(published(analysis.run_iteration()).detections, 2);
    }

    #[test]
    fn test_settings_reread_every_iteration() {
        let fixture = Fixture::ready();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let detector = RecordingDetector { seen: seen.clone() };
        let mut analysis = fixture.analysis(Box::new(detector), Box::new(IouTracker::default()));
        let settings = analysis.settings();

        published(analysis.run_iteration());
        settings
            .update(DetectionSettings {
                confidence_threshold: 0.8,
                iou_threshold: 0.3,
                max_detections: 3,
                excluded_classes: [1].into(),
            })
            .unwrap();
        fixture.next_frame();
        published(analysis.run_iteration());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].confidence_threshold, 0.25);
        assert!(seen[0].allowed_classes.is_none());
        assert_eq!(seen[1].confidence_threshold, 0.8);
        assert_eq!(seen[1].iou_threshold, 0.3);
        assert_eq!(seen[1].max_detections, 3);
        assert_eq!(seen[1].allowed_classes, Some(BTreeSet::from([0, 2])));
    }

    #[test]
    fn test_repeated_frame_skipped() {
        let fixture = Fixture::ready();
        let mut analysis = fixture
            .analysis(
                Box::new(ScriptedDetector::constant(vec![])),
                Box::new(IouTracker::default()),
            )
            .with_config(AnalysisLoopConfig::default());

        published(analysis.run_iteration());
        assert_eq!(
            analysis.run_iteration(),
            IterationOutcome::Skipped(SkipReason::StaleFrame)
        );

        fixture.next_frame();
        published(analysis.run_iteration());
    }

    #[test]
    fn test_repeated_frame_refreshes_telemetry() {
        let fixture = Fixture::ready();
        let centred = Detection {
            bbox: BoundingBox::new(300.0, 220.0, 340.0, 260.0),
            score: 0.9,
            class_id: 0,
        };
        let mut analysis = fixture
            .analysis(
                Box::new(ScriptedDetector::constant(vec![centred])),
                Box::new(IouTracker::default()),
            )
            .with_config(AnalysisLoopConfig::default());
        let snapshots = analysis.snapshots();

        let first = published(analysis.run_iteration());
        assert!(!first.reused_frame);

        // vehicle moves north while the video stalls
        fixture.telemetry.ingest(TelemetrySample::Position(GlobalPosition {
            latitude: HOME_LAT + 0.001,
            longitude: HOME_LON,
            altitude: 250.0,
            heading: 0.0,
        }));
        let refreshed = published(analysis.run_iteration());
        assert!(refreshed.reused_frame);
        assert_eq!(refreshed.detections, 0);
        assert_eq!(refreshed.published, 1);

        let snapshot = snapshots.latest().unwrap();
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.vehicle_state.position.altitude, 250.0);
        assert_eq!(snapshot.camera_frame.sequence, 1);
        let location = snapshot.locate(1).unwrap();
        assert!((location.latitude - (HOME_LAT + 0.001)).abs() < 1e-6);

        // nothing new at all
        assert_eq!(
            analysis.run_iteration(),
            IterationOutcome::Skipped(SkipReason::StaleFrame)
        );
    }

    #[test]
    fn test_unresolved_tracks_omitted() {
        let fixture = Fixture::ready();
        // gimbal level: every ray stays above the horizon
        fixture.telemetry.ingest(TelemetrySample::Gimbal(GimbalOrientation {
            roll: 0.0,
            pitch: 0.3,
            yaw: 0.0,
        }));
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![det(100.0, 0.9, 0)])),
            Box::new(IouTracker::default()),
        );

        let meta = published(analysis.run_iteration());
        assert_eq!(meta.tracks, 1);
        assert_eq!(meta.unresolved, 1);
        assert_eq!(meta.published, 0);
    }

    #[test]
    fn test_disabled_loop_skips() {
        let fixture = Fixture::ready();
        let mut analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![])),
            Box::new(IouTracker::default()),
        );

        analysis.disable();
        assert_eq!(
            analysis.run_iteration(),
            IterationOutcome::Skipped(SkipReason::Disabled)
        );
        analysis.enable();
        published(analysis.run_iteration());
    }

    #[test]
    fn test_spawned_loop_stops() {
        let fixture = Fixture::ready();
        let analysis = fixture.analysis(
            Box::new(ScriptedDetector::constant(vec![det(100.0, 0.9, 0)])),
            Box::new(IouTracker::default()),
        );
        let snapshots = analysis.snapshots();

        let handle = analysis.spawn().unwrap();
        assert!(handle.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while snapshots.latest().map(|s| s.sequence).unwrap_or(0) < 3 {
            assert!(Instant::now() < deadline, "loop never published");
            thread::sleep(Duration::from_millis(1));
        }

        handle.stop();
        let summary = handle.join().unwrap();
        assert!(summary.total_iterations >= 3);
    }
}
