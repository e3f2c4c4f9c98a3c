//! # Geolocation
//!
//! Camera-to-ground projection.
//!
//! - `terrain`: elevation models (`FlatTerrain`, `DemRaster`, `TerrainStack`)
//! - `projector`: pixel → `GeoPoint` by ray marching over the terrain
//! - `geodesy`: WGS-84 local offset helpers
//!
//! ```ignore
//! let terrain = terrain_from_config(&blueprint.projection.terrain)?;
//! let projector = GeoProjector::new(terrain, ProjectorConfig::from(&blueprint.projection));
//! if let Projection::Resolved(point) = projector.project_track(&track, &frame, &state) {
//!     println!("track {} at {:.6}, {:.6}", track.id, point.latitude, point.longitude);
//! }
//! ```

pub mod geodesy;
mod projector;
mod terrain;

pub use projector::{pixel_angles, GeoProjector, Projection, ProjectorConfig, UnresolvedReason};
pub use terrain::{
    terrain_from_config, DemRaster, FlatTerrain, TerrainStack, HGT_VOID, SRTM1_SIZE, SRTM3_SIZE,
};
