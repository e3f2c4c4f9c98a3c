//! Mock feeds
//!
//! Synthetic telemetry and video for running without a vehicle link or a
//! stream receiver. Each feed produces on its own OS thread, like a real
//! decoder callback would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    Attitude, CameraFrame, FrameCallback, GeoPoint, GimbalOrientation, GlobalPosition,
    LinkConfig, PixelFormat, StreamConfig, TelemetryCallback, TelemetryFeed, TelemetrySample,
    VideoFeed,
};
use tracing::{debug, trace, warn};

/// Metres per degree of latitude, close enough for a synthetic track
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Mock telemetry feed configuration
#[derive(Debug, Clone)]
pub struct MockTelemetryConfig {
    /// Feed name
    pub name: String,

    /// Sample rate per channel (Hz)
    pub rate_hz: f64,

    /// Start position
    pub home: GeoPoint,

    /// Heading (radians clockwise from north)
    pub heading: f64,

    /// Ground speed along the heading (m/s)
    pub ground_speed: f64,

    /// Body attitude reported on every tick
    pub attitude: Attitude,

    /// Gimbal attitude quaternion `[w, x, y, z]`, as gimbal devices report it
    pub gimbal_quaternion: [f64; 4],
}

impl Default for MockTelemetryConfig {
    fn default() -> Self {
        Self {
            name: "mock_telemetry".to_string(),
            rate_hz: 20.0,
            home: GeoPoint::new(-35.363_261, 149.165_230, 100.0),
            heading: 0.0,
            ground_speed: 0.0,
            attitude: Attitude::default(),
            gimbal_quaternion: pitch_quaternion(-std::f64::consts::FRAC_PI_2),
        }
    }
}

impl MockTelemetryConfig {
    /// Synthetic flight described by the link section of a blueprint
    pub fn from_link(link: &LinkConfig) -> Self {
        let sim = &link.simulation;
        Self {
            rate_hz: link.telemetry_rate_hz,
            home: sim.home,
            heading: sim.heading,
            ground_speed: sim.ground_speed,
            gimbal_quaternion: pitch_quaternion(sim.gimbal_pitch),
            ..Default::default()
        }
    }

    fn gimbal(&self) -> GimbalOrientation {
        let [w, x, y, z] = self.gimbal_quaternion;
        GimbalOrientation::from_quaternion(w, x, y, z)
    }

    /// Position after `elapsed` seconds of straight flight
    fn position_at(&self, elapsed: f64) -> GlobalPosition {
        let distance = self.ground_speed * elapsed;
        let north = distance * self.heading.cos();
        let east = distance * self.heading.sin();
        let lat_scale = self.home.latitude.to_radians().cos().max(1e-6);
        GlobalPosition {
            latitude: self.home.latitude + north / METRES_PER_DEGREE,
            longitude: self.home.longitude + east / (METRES_PER_DEGREE * lat_scale),
            altitude: self.home.altitude,
            heading: self.heading,
        }
    }
}

/// Rotation about the mount's pitch axis only
fn pitch_quaternion(pitch: f64) -> [f64; 4] {
    let half = pitch / 2.0;
    [half.cos(), 0.0, half.sin(), 0.0]
}

/// Mock telemetry feed
///
/// Emits one attitude, one position and one gimbal sample per tick.
pub struct MockTelemetryFeed {
    config: MockTelemetryConfig,
    running: Arc<AtomicBool>,
}

impl MockTelemetryFeed {
    pub fn new(config: MockTelemetryConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Hovering vehicle at `home` looking straight down
    pub fn hovering(name: &str, rate_hz: f64, home: GeoPoint) -> Self {
        Self::new(MockTelemetryConfig {
            name: name.to_string(),
            rate_hz,
            home,
            ..Default::default()
        })
    }
}

impl TelemetryFeed for MockTelemetryFeed {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn listen(&self, callback: TelemetryCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-feed", config.name))
            .spawn(move || {
                let interval = Duration::from_secs_f64(1.0 / config.rate_hz);
                let gimbal = config.gimbal();
                let started = std::time::Instant::now();
                let mut tick: u64 = 0;

                debug!(feed = %config.name, rate_hz = config.rate_hz, "mock telemetry feed started");

                while running.load(Ordering::Relaxed) {
                    tick += 1;
                    let position = config.position_at(started.elapsed().as_secs_f64());

                    callback(TelemetrySample::Attitude(config.attitude));
                    callback(TelemetrySample::Position(position));
                    callback(TelemetrySample::Gimbal(gimbal));

                    trace!(feed = %config.name, tick, "mock telemetry tick");
                    thread::sleep(interval);
                }

                debug!(feed = %config.name, ticks = tick, "mock telemetry feed stopped");
            });

        if let Err(e) = spawned {
            warn!(feed = %self.config.name, error = %e, "failed to spawn mock telemetry thread");
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Mock video feed configuration
#[derive(Debug, Clone)]
pub struct MockVideoConfig {
    /// Feed name
    pub name: String,

    /// Frame rate (Hz)
    pub rate_hz: f64,

    pub width: u32,
    pub height: u32,

    /// Horizontal field of view (radians)
    pub fov_horizontal: f64,
}

impl Default for MockVideoConfig {
    fn default() -> Self {
        Self {
            name: "mock_video".to_string(),
            rate_hz: 10.0,
            width: 640,
            height: 480,
            fov_horizontal: std::f64::consts::FRAC_PI_3,
        }
    }
}

impl MockVideoConfig {
    pub fn from_stream(stream: &StreamConfig) -> Self {
        Self {
            rate_hz: stream.frame_rate_hz,
            width: stream.width,
            height: stream.height,
            fov_horizontal: stream.fov_horizontal,
            ..Default::default()
        }
    }
}

/// Mock video feed
///
/// Produces RGB frames with a horizontal gradient that shifts every frame.
pub struct MockVideoFeed {
    config: MockVideoConfig,
    running: Arc<AtomicBool>,
}

impl MockVideoFeed {
    pub fn new(config: MockVideoConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn camera(name: &str, rate_hz: f64, width: u32, height: u32) -> Self {
        Self::new(MockVideoConfig {
            name: name.to_string(),
            rate_hz,
            width,
            height,
            ..Default::default()
        })
    }
}

fn gradient_frame(config: &MockVideoConfig, tick: u64) -> CameraFrame {
    let width = config.width as usize;
    let mut pixels = Vec::with_capacity(width * config.height as usize * 3);
    for _ in 0..config.height {
        for x in 0..width {
            let v = ((x as u64 + tick) % 256) as u8;
            pixels.extend_from_slice(&[v, v / 2, 255 - v]);
        }
    }
    CameraFrame::new(
        Bytes::from(pixels),
        config.width,
        config.height,
        PixelFormat::Rgb8,
        config.fov_horizontal,
    )
}

impl VideoFeed for MockVideoFeed {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn listen(&self, callback: FrameCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let running = self.running.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-feed", config.name))
            .spawn(move || {
                let interval = Duration::from_secs_f64(1.0 / config.rate_hz);
                let mut tick: u64 = 0;

                debug!(
                    feed = %config.name,
                    width = config.width,
                    height = config.height,
                    "mock video feed started"
                );

                while running.load(Ordering::Relaxed) {
                    callback(gradient_frame(&config, tick));
                    tick += 1;
                    thread::sleep(interval);
                }

                debug!(feed = %config.name, frames = tick, "mock video feed stopped");
            });

        if let Err(e) = spawned {
            warn!(feed = %self.config.name, error = %e, "failed to spawn mock video thread");
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
