//! MissionBlueprint - Config Loader output
//!
//! Describes a complete mission: vehicle link, video stream, analysis
//! tuning, projection model and output routing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DetectionSettings, GeoPoint};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete mission configuration blueprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Vehicle link (telemetry + commands)
    #[serde(default)]
    pub link: LinkConfig,

    /// Video stream
    #[serde(default)]
    pub stream: StreamConfig,

    /// Detection settings and loop tuning
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Camera-to-ground projection
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Vehicle link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Link address (e.g. "udp://:14540")
    #[serde(default = "default_link_address")]
    pub address: String,

    /// Telemetry sample rate per channel (Hz), must be > 0
    #[serde(default = "default_telemetry_rate")]
    pub telemetry_rate_hz: f64,

    /// Synthetic flight used when no real link is attached
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_link_address() -> String {
    "udp://:14540".to_string()
}

fn default_telemetry_rate() -> f64 {
    20.0
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_link_address(),
            telemetry_rate_hz: default_telemetry_rate(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// Synthetic flight parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting position; altitude shares the terrain's vertical datum
    #[serde(default = "default_home")]
    pub home: GeoPoint,

    /// Heading, radians clockwise from north
    #[serde(default)]
    pub heading: f64,

    /// Ground speed along the heading (m/s)
    #[serde(default)]
    pub ground_speed: f64,

    /// Gimbal pitch relative to the body (radians, negative looks down)
    #[serde(default = "default_gimbal_pitch")]
    pub gimbal_pitch: f64,
}

fn default_home() -> GeoPoint {
    GeoPoint::new(-35.363_261, 149.165_230, 100.0)
}

fn default_gimbal_pitch() -> f64 {
    -std::f64::consts::FRAC_PI_2
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            heading: 0.0,
            ground_speed: 0.0,
            gimbal_pitch: default_gimbal_pitch(),
        }
    }
}

/// Video stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_stream_host")]
    pub host: String,

    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Decoded frame rate (Hz), must be > 0
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: f64,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Horizontal field of view (radians), within (0, π)
    #[serde(default = "default_fov")]
    pub fov_horizontal: f64,
}

fn default_stream_host() -> String {
    "127.0.0.1".to_string()
}

fn default_stream_port() -> u16 {
    5600
}

fn default_frame_rate() -> f64 {
    10.0
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fov() -> f64 {
    std::f64::consts::FRAC_PI_3
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: default_stream_host(),
            port: default_stream_port(),
            frame_rate_hz: default_frame_rate(),
            width: default_width(),
            height: default_height(),
            fov_horizontal: default_fov(),
        }
    }
}

/// Analysis loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Initial detection settings (adjustable at runtime)
    #[serde(flatten)]
    pub settings: DetectionSettings,

    /// Wait before retrying when inputs are missing (ms), must be > 0
    #[serde(default = "default_idle_backoff")]
    pub idle_backoff_ms: u64,

    /// Re-project the previous tracks instead of re-detecting a frame that
    /// was already analysed
    #[serde(default = "default_true")]
    pub skip_repeated_frames: bool,
}

fn default_idle_backoff() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            settings: DetectionSettings::default(),
            idle_backoff_ms: default_idle_backoff(),
            skip_repeated_frames: true,
        }
    }
}

impl AnalysisConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Projection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub terrain: TerrainConfig,

    /// Ray-march step (metres), must be > 0
    #[serde(default = "default_step")]
    pub step_m: f64,

    /// Maximum ray length (metres), must exceed `step_m`
    #[serde(default = "default_max_range")]
    pub max_range_m: f64,

    #[serde(default)]
    pub coverage: CoveragePolicy,

    #[serde(default)]
    pub orientation: OrientationModel,
}

fn default_step() -> f64 {
    1.0
}

fn default_max_range() -> f64 {
    5_000.0
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            step_m: default_step(),
            max_range_m: default_max_range(),
            coverage: CoveragePolicy::default(),
            orientation: OrientationModel::default(),
        }
    }
}

/// Terrain source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerrainConfig {
    /// Constant elevation everywhere
    Flat {
        #[serde(default)]
        elevation: f64,
    },
    /// SRTM `.hgt` tiles, consulted in order
    Dem { paths: Vec<PathBuf> },
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self::Flat { elevation: 0.0 }
    }
}

/// What to do when the ray passes over a terrain gap
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CoveragePolicy {
    /// Report the track as unresolved
    #[default]
    Unresolved,
    /// Intersect a plane `offset` metres below the vehicle instead
    FlatFallback { offset: f64 },
}

/// How gimbal and vehicle orientation combine into the view direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationModel {
    /// Per-axis sum of gimbal and vehicle angles (small-angle approximation)
    #[default]
    Additive,
    /// Gimbal rotation composed onto the body rotation
    Rotation,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    16
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log output
    Log,
    /// JSON record + annotated frame per snapshot
    File,
    /// Network output (UDP)
    Network,
}
