//! GeoProjector - pixel ray to ground intersection
//!
//! The camera ray is built in the local NED frame (x north, y east, z down)
//! from the vehicle and gimbal orientation plus the pixel's angular offset,
//! marched in fixed steps until it reaches the terrain and refined by
//! bisection.

use std::fmt;
use std::sync::Arc;

use contracts::{
    CameraFrame, ContractError, CoveragePolicy, GeoPoint, OrientationModel, ProjectionConfig,
    TerrainModel, Track, TrackId, VehicleState,
};
use nalgebra::{Rotation3, Vector3};
use tracing::warn;

use crate::geodesy::offset_to_geodetic;

/// Bisection stops once the bracket is shorter than this (m)
const REFINE_TOLERANCE: f64 = 1e-3;
const MAX_REFINE_STEPS: usize = 64;

/// Why a ray has no ground point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The ray has no downward component
    AboveHorizon,
    /// No terrain within the maximum range
    OutOfRange,
    /// The ray crossed a terrain gap and the policy is to give up
    OutOfCoverage,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AboveHorizon => f.write_str("ray points at or above the horizon"),
            Self::OutOfRange => f.write_str("no terrain within range"),
            Self::OutOfCoverage => f.write_str("ray left terrain coverage"),
        }
    }
}

/// Result of projecting one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Resolved(GeoPoint),
    Unresolved(UnresolvedReason),
}

impl Projection {
    pub fn resolved(self) -> Option<GeoPoint> {
        match self {
            Self::Resolved(point) => Some(point),
            Self::Unresolved(_) => None,
        }
    }

    /// Convert into a result for the given track
    pub fn into_result(self, track_id: TrackId) -> Result<GeoPoint, ContractError> {
        match self {
            Self::Resolved(point) => Ok(point),
            Self::Unresolved(reason) => Err(ContractError::ProjectionUnresolved {
                track_id,
                reason: reason.to_string(),
            }),
        }
    }
}

/// Projector tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectorConfig {
    /// March step (m)
    pub step: f64,
    /// Maximum ray length (m)
    pub max_range: f64,
    pub coverage: CoveragePolicy,
    pub orientation: OrientationModel,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self::from(&ProjectionConfig::default())
    }
}

impl From<&ProjectionConfig> for ProjectorConfig {
    fn from(config: &ProjectionConfig) -> Self {
        Self {
            step: config.step_m,
            max_range: config.max_range_m,
            coverage: config.coverage,
            orientation: config.orientation,
        }
    }
}

impl ProjectorConfig {
    /// Number of march samples, `None` unless `0 < step < max_range`
    pub fn march_steps(&self) -> Option<usize> {
        let usable = self.step.is_finite()
            && self.step > 0.0
            && self.max_range.is_finite()
            && self.max_range > self.step;
        usable.then(|| (self.max_range / self.step).ceil() as usize)
    }
}

/// Angular offset of a pixel from the optical axis: (azimuth, elevation)
///
/// Image rows grow downward, so pixels below the centre get a negative
/// elevation offset.
pub fn pixel_angles(
    px: f64,
    py: f64,
    width: u32,
    height: u32,
    fov_horizontal: f64,
    fov_vertical: f64,
) -> (f64, f64) {
    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    let azimuth = (px - half_w) / half_w * fov_horizontal / 2.0;
    let elevation = -(py - half_h) / half_h * fov_vertical / 2.0;
    (azimuth, elevation)
}

/// Maps image pixels to ground coordinates
#[derive(Clone)]
pub struct GeoProjector {
    terrain: Arc<dyn TerrainModel>,
    config: ProjectorConfig,
}

impl fmt::Debug for GeoProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoProjector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GeoProjector {
    /// A config without a usable march leaves every ray unresolved
    pub fn new(terrain: Arc<dyn TerrainModel>, config: ProjectorConfig) -> Self {
        if config.march_steps().is_none() {
            warn!(
                step = config.step,
                max_range = config.max_range,
                "ray march needs 0 < step < max_range, no pixel will resolve"
            );
        }
        Self { terrain, config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Unit view direction (NED) for a pixel
    pub fn view_direction(
        &self,
        px: f64,
        py: f64,
        frame: &CameraFrame,
        state: &VehicleState,
    ) -> Vector3<f64> {
        let (azimuth, elevation) = pixel_angles(
            px,
            py,
            frame.width,
            frame.height,
            frame.fov_horizontal,
            frame.fov_vertical(),
        );
        let gimbal = &state.gimbal;
        let attitude = &state.attitude;
        let heading = state.position.heading;

        let rotation = match self.config.orientation {
            OrientationModel::Additive => Rotation3::from_euler_angles(
                gimbal.roll + attitude.roll,
                gimbal.pitch + attitude.pitch + elevation,
                gimbal.yaw + heading + azimuth,
            ),
            OrientationModel::Rotation => {
                let body = Rotation3::from_euler_angles(attitude.roll, attitude.pitch, heading);
                let mount = Rotation3::from_euler_angles(gimbal.roll, gimbal.pitch, gimbal.yaw);
                let pixel = Rotation3::from_euler_angles(0.0, elevation, azimuth);
                body * mount * pixel
            }
        };
        rotation * Vector3::x()
    }

    /// Project one pixel onto the terrain
    pub fn project(
        &self,
        px: f64,
        py: f64,
        frame: &CameraFrame,
        state: &VehicleState,
    ) -> Projection {
        let direction = self.view_direction(px, py, frame, state);
        self.intersect(state, &direction)
    }

    /// Project the centre of a track's bounding box
    pub fn project_track(
        &self,
        track: &Track,
        frame: &CameraFrame,
        state: &VehicleState,
    ) -> Projection {
        let (cx, cy) = track.bbox.center();
        self.project(cx, cy, frame, state)
    }

    /// March along `direction` from the vehicle until the ray meets the ground
    pub fn intersect(&self, state: &VehicleState, direction: &Vector3<f64>) -> Projection {
        if direction.z.is_nan() || direction.z <= 0.0 {
            return Projection::Unresolved(UnresolvedReason::AboveHorizon);
        }

        let Some(steps) = self.config.march_steps() else {
            return Projection::Unresolved(UnresolvedReason::OutOfRange);
        };
        let ray = Ray::new(state, direction);

        let mut previous = 0.0;
        let origin_ground = match self.ground_at(&ray, 0.0) {
            Some(ground) => ground,
            None => return Projection::Unresolved(UnresolvedReason::OutOfCoverage),
        };
        if ray.altitude(0.0) <= origin_ground {
            return Projection::Resolved(ray.point(0.0, origin_ground));
        }

        for i in 1..=steps {
            let t = (i as f64 * self.config.step).min(self.config.max_range);
            let ground = match self.ground_at(&ray, t) {
                Some(ground) => ground,
                None => return Projection::Unresolved(UnresolvedReason::OutOfCoverage),
            };
            if ray.altitude(t) <= ground {
                return Projection::Resolved(self.refine(&ray, previous, t));
            }
            previous = t;
        }

        Projection::Unresolved(UnresolvedReason::OutOfRange)
    }

    /// Bisect between `above` (ray over ground) and `below` (ray at or under ground)
    fn refine(&self, ray: &Ray, mut above: f64, mut below: f64) -> GeoPoint {
        let mut hit_ground = self.ground_at(ray, below).unwrap_or(ray.altitude(below));

        for _ in 0..MAX_REFINE_STEPS {
            if below - above < REFINE_TOLERANCE {
                break;
            }
            let mid = (above + below) / 2.0;
            let Some(ground) = self.ground_at(ray, mid) else {
                break;
            };
            if ray.altitude(mid) <= ground {
                below = mid;
                hit_ground = ground;
            } else {
                above = mid;
            }
        }

        ray.point(below, hit_ground)
    }

    /// Ground elevation under the ray sample at distance `t`
    fn ground_at(&self, ray: &Ray, t: f64) -> Option<f64> {
        let (lat, lon) = ray.horizontal(t);
        self.terrain
            .elevation(lat, lon)
            .or(match self.config.coverage {
                CoveragePolicy::Unresolved => None,
                CoveragePolicy::FlatFallback { offset } => Some(ray.origin_altitude - offset),
            })
    }
}

/// Ray from the vehicle position
struct Ray {
    latitude: f64,
    longitude: f64,
    origin_altitude: f64,
    direction: Vector3<f64>,
}

impl Ray {
    fn new(state: &VehicleState, direction: &Vector3<f64>) -> Self {
        Self {
            latitude: state.position.latitude,
            longitude: state.position.longitude,
            origin_altitude: state.position.altitude,
            direction: *direction,
        }
    }

    fn horizontal(&self, t: f64) -> (f64, f64) {
        offset_to_geodetic(
            self.latitude,
            self.longitude,
            t * self.direction.x,
            t * self.direction.y,
        )
    }

    fn altitude(&self, t: f64) -> f64 {
        self.origin_altitude - t * self.direction.z
    }

    fn point(&self, t: f64, ground: f64) -> GeoPoint {
        let (latitude, longitude) = self.horizontal(t);
        GeoPoint::new(latitude, longitude, ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::geodetic_to_offset;
    use crate::terrain::{DemRaster, FlatTerrain};
    use bytes::Bytes;
    use contracts::{
        Attitude, BoundingBox, GimbalOrientation, GlobalPosition, PixelFormat,
    };
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_3};

    const LAT0: f64 = -35.363_261;
    const LON0: f64 = 149.165_230;

    fn frame() -> CameraFrame {
        CameraFrame::new(Bytes::new(), 640, 480, PixelFormat::Rgb8, FRAC_PI_3)
    }

    fn state(altitude: f64, gimbal_pitch: f64, heading: f64) -> VehicleState {
        VehicleState {
            attitude: Attitude::default(),
            position: GlobalPosition {
                latitude: LAT0,
                longitude: LON0,
                altitude,
                heading,
            },
            gimbal: GimbalOrientation {
                roll: 0.0,
                pitch: gimbal_pitch,
                yaw: 0.0,
            },
        }
    }

    fn flat_projector(elevation: f64, config: ProjectorConfig) -> GeoProjector {
        GeoProjector::new(Arc::new(FlatTerrain::new(elevation)), config)
    }

    #[test]
    fn test_pixel_angles_at_centre_and_edges() {
        let (az, el) = pixel_angles(320.0, 240.0, 640, 480, 1.0, 0.8);
        assert_eq!((az, el), (0.0, 0.0));

        let (az, _) = pixel_angles(640.0, 240.0, 640, 480, 1.0, 0.8);
        assert!((az - 0.5).abs() < 1e-12);

        // bottom row looks further down
        let (_, el) = pixel_angles(320.0, 480.0, 640, 480, 1.0, 0.8);
        assert!((el + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_straight_down_lands_below_vehicle() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        let point = projector
            .project(320.0, 240.0, &frame(), &state(100.0, -FRAC_PI_2, 0.0))
            .resolved()
            .unwrap();
        assert!((point.latitude - LAT0).abs() < 1e-9);
        assert!((point.longitude - LON0).abs() < 1e-9);
        assert_eq!(point.altitude, 0.0);
    }

    #[test]
    fn test_forty_five_degrees_lands_altitude_ahead() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        // heading east, looking 45 degrees down
        let point = projector
            .project(320.0, 240.0, &frame(), &state(100.0, -FRAC_PI_4, FRAC_PI_2))
            .resolved()
            .unwrap();
        let (north, east) = geodetic_to_offset(LAT0, LON0, point.latitude, point.longitude);
        assert!(north.abs() < 0.01, "north = {north}");
        assert!((east - 100.0).abs() < 0.01, "east = {east}");
    }

    #[test]
    fn test_lower_pixel_lands_closer() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        let s = state(100.0, -FRAC_PI_4, 0.0);
        let centre = projector.project(320.0, 240.0, &frame(), &s).resolved().unwrap();
        let lower = projector.project(320.0, 400.0, &frame(), &s).resolved().unwrap();
        assert!(lower.latitude < centre.latitude);
    }

    #[test]
    fn test_skyward_ray_is_unresolved() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        let result = projector.project(320.0, 240.0, &frame(), &state(100.0, 0.3, 0.0));
        assert_eq!(
            result,
            Projection::Unresolved(UnresolvedReason::AboveHorizon)
        );
        assert!(matches!(
            result.into_result(4),
            Err(ContractError::ProjectionUnresolved { track_id: 4, .. })
        ));
    }

    #[test]
    fn test_horizontal_ray_is_unresolved() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        let result = projector.project(320.0, 240.0, &frame(), &state(100.0, 0.0, 0.0));
        assert_eq!(
            result,
            Projection::Unresolved(UnresolvedReason::AboveHorizon)
        );
    }

    #[test]
    fn test_shallow_ray_out_of_range() {
        let config = ProjectorConfig {
            max_range: 200.0,
            ..Default::default()
        };
        let projector = flat_projector(0.0, config);
        // 5 degrees down from 100 m reaches the ground after ~1.1 km
        let result = projector.project(320.0, 240.0, &frame(), &state(100.0, -0.087, 0.0));
        assert_eq!(result, Projection::Unresolved(UnresolvedReason::OutOfRange));
    }

    #[test]
    fn test_unusable_march_returns_unresolved() {
        for (step, max_range) in [(0.0, 500.0), (-1.0, 500.0), (f64::NAN, 500.0), (10.0, 5.0)] {
            let config = ProjectorConfig {
                step,
                max_range,
                ..Default::default()
            };
            assert_eq!(config.march_steps(), None);
            let projector = flat_projector(0.0, config);
            let result = projector.project(320.0, 240.0, &frame(), &state(100.0, -0.5, 0.0));
            assert_eq!(result, Projection::Unresolved(UnresolvedReason::OutOfRange));
        }
        assert_eq!(ProjectorConfig::default().march_steps().map(|n| n > 0), Some(true));
    }

    fn small_dem() -> Arc<dyn TerrainModel> {
        // 0.001 degree tile centred on the vehicle, 50 m everywhere
        let span = 0.001;
        let dem = DemRaster::from_grid(
            LAT0 - span / 2.0,
            LON0 - span / 2.0,
            span,
            3,
            vec![50; 9],
        )
        .unwrap();
        Arc::new(dem)
    }

    #[test]
    fn test_dem_gap_unresolved_by_default() {
        let projector = GeoProjector::new(small_dem(), ProjectorConfig::default());
        // shallow ray leaves the ~100 m tile before reaching 50 m
        let result = projector.project(320.0, 240.0, &frame(), &state(150.0, -0.2, 0.0));
        assert_eq!(
            result,
            Projection::Unresolved(UnresolvedReason::OutOfCoverage)
        );

        let down = projector
            .project(320.0, 240.0, &frame(), &state(150.0, -FRAC_PI_2, 0.0))
            .resolved()
            .unwrap();
        assert_eq!(down.altitude, 50.0);
    }

    #[test]
    fn test_dem_gap_flat_fallback() {
        let config = ProjectorConfig {
            coverage: CoveragePolicy::FlatFallback { offset: 150.0 },
            ..Default::default()
        };
        let projector = GeoProjector::new(small_dem(), config);
        let point = projector
            .project(320.0, 240.0, &frame(), &state(150.0, -0.2, 0.0))
            .resolved()
            .unwrap();
        // plane at 150 - 150 = 0 m
        assert_eq!(point.altitude, 0.0);
        let (north, _) = geodetic_to_offset(LAT0, LON0, point.latitude, point.longitude);
        let expected = 150.0 / 0.2f64.tan();
        assert!((north - expected).abs() < 0.05, "north = {north}");
    }

    #[test]
    fn test_project_track_uses_box_centre() {
        let projector = flat_projector(0.0, ProjectorConfig::default());
        let track = Track {
            id: 1,
            bbox: BoundingBox::new(300.0, 220.0, 340.0, 260.0),
            class_id: 0,
        };
        let s = state(100.0, -FRAC_PI_2, 0.0);
        assert_eq!(
            projector.project_track(&track, &frame(), &s),
            projector.project(320.0, 240.0, &frame(), &s)
        );
    }

    #[test]
    fn test_rotation_model_matches_additive_without_body_tilt() {
        let additive = flat_projector(0.0, ProjectorConfig::default());
        let rotation = flat_projector(
            0.0,
            ProjectorConfig {
                orientation: OrientationModel::Rotation,
                ..Default::default()
            },
        );
        let s = state(100.0, -FRAC_PI_4, 0.3);
        let a = additive.view_direction(320.0, 240.0, &frame(), &s);
        let r = rotation.view_direction(320.0, 240.0, &frame(), &s);
        assert!((a - r).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_model_differs_under_roll() {
        let mut s = state(100.0, -FRAC_PI_4, 0.0);
        s.attitude.roll = 0.3;
        let additive = flat_projector(0.0, ProjectorConfig::default());
        let rotation = flat_projector(
            0.0,
            ProjectorConfig {
                orientation: OrientationModel::Rotation,
                ..Default::default()
            },
        );
        let a = additive.view_direction(320.0, 240.0, &frame(), &s);
        let r = rotation.view_direction(320.0, 240.0, &frame(), &s);
        // additive ignores roll for the forward axis, composition does not
        assert!((a - r).norm() > 1e-3);
    }
}
