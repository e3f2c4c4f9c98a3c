//! Terrain elevation models
//!
//! - `FlatTerrain`: constant elevation
//! - `DemRaster`: one SRTM `.hgt` tile with bilinear interpolation
//! - `TerrainStack`: several models, first answer wins

use std::path::Path;
use std::sync::Arc;

use bytes::Buf;
use contracts::{ContractError, TerrainConfig, TerrainModel};
use tracing::{debug, info};

/// Void marker in SRTM tiles
pub const HGT_VOID: i16 = -32768;

/// Samples per side of a 3 arc-second tile
pub const SRTM3_SIZE: usize = 1201;

/// Samples per side of a 1 arc-second tile
pub const SRTM1_SIZE: usize = 3601;

/// Constant elevation everywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain {
    pub elevation: f64,
}

impl FlatTerrain {
    pub fn new(elevation: f64) -> Self {
        Self { elevation }
    }
}

impl TerrainModel for FlatTerrain {
    fn elevation(&self, _latitude: f64, _longitude: f64) -> Option<f64> {
        Some(self.elevation)
    }
}

/// Square elevation grid covering `span` degrees from its south-west corner
///
/// Row 0 is the northern edge, as in SRTM tiles.
#[derive(Debug, Clone)]
pub struct DemRaster {
    south: f64,
    west: f64,
    span: f64,
    size: usize,
    samples: Vec<i16>,
}

impl DemRaster {
    /// Build from an in-memory grid (row-major, north row first)
    pub fn from_grid(
        south: f64,
        west: f64,
        span: f64,
        size: usize,
        samples: Vec<i16>,
    ) -> Result<Self, ContractError> {
        if size < 2 {
            return Err(ContractError::terrain_load(
                "grid",
                format!("grid needs at least 2 samples per side, got {size}"),
            ));
        }
        if samples.len() != size * size {
            return Err(ContractError::terrain_load(
                "grid",
                format!(
                    "expected {} samples for a {size}x{size} grid, got {}",
                    size * size,
                    samples.len()
                ),
            ));
        }
        if !(span.is_finite() && span > 0.0) {
            return Err(ContractError::terrain_load(
                "grid",
                format!("span must be > 0, got {span}"),
            ));
        }
        Ok(Self {
            south,
            west,
            span,
            size,
            samples,
        })
    }

    /// Load an SRTM `.hgt` tile; the corner comes from the file name
    pub fn from_hgt_file(path: &Path) -> Result<Self, ContractError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ContractError::terrain_load(path.display().to_string(), "missing file name")
            })?;
        let data = std::fs::read(path).map_err(|e| {
            ContractError::terrain_load(path.display().to_string(), e.to_string())
        })?;
        let raster = Self::from_hgt_bytes(name, &data)?;
        info!(
            tile = %name,
            size = raster.size,
            path = %path.display(),
            "loaded dem tile"
        );
        Ok(raster)
    }

    /// Parse big-endian SRTM samples for the tile named `name` (e.g. `S36E149`)
    pub fn from_hgt_bytes(name: &str, mut data: &[u8]) -> Result<Self, ContractError> {
        let (south, west) = parse_tile_name(name)?;
        let size = match data.len() {
            n if n == SRTM3_SIZE * SRTM3_SIZE * 2 => SRTM3_SIZE,
            n if n == SRTM1_SIZE * SRTM1_SIZE * 2 => SRTM1_SIZE,
            n => {
                return Err(ContractError::terrain_load(
                    name,
                    format!("unexpected hgt size of {n} bytes"),
                ))
            }
        };
        let mut samples = Vec::with_capacity(size * size);
        while data.has_remaining() {
            samples.push(data.get_i16());
        }
        debug!(tile = %name, size, "parsed hgt samples");
        Self::from_grid(south, west, 1.0, size, samples)
    }

    /// South-west corner (latitude, longitude)
    pub fn origin(&self) -> (f64, f64) {
        (self.south, self.west)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn sample(&self, row: usize, col: usize) -> Option<f64> {
        let v = self.samples[row * self.size + col];
        (v != HGT_VOID).then_some(v as f64)
    }
}

impl TerrainModel for DemRaster {
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        let north = self.south + self.span;
        let east = self.west + self.span;
        if !(self.south..=north).contains(&latitude) || !(self.west..=east).contains(&longitude) {
            return None;
        }

        let last = (self.size - 1) as f64;
        let row_f = (north - latitude) / self.span * last;
        let col_f = (longitude - self.west) / self.span * last;

        let row0 = (row_f.floor() as usize).min(self.size - 2);
        let col0 = (col_f.floor() as usize).min(self.size - 2);
        let dr = row_f - row0 as f64;
        let dc = col_f - col0 as f64;

        let nw = self.sample(row0, col0)?;
        let ne = self.sample(row0, col0 + 1)?;
        let sw = self.sample(row0 + 1, col0)?;
        let se = self.sample(row0 + 1, col0 + 1)?;

        let top = nw + (ne - nw) * dc;
        let bottom = sw + (se - sw) * dc;
        Some(top + (bottom - top) * dr)
    }
}

/// `N35E149` → (35, 149), `S36W071` → (-36, -71)
fn parse_tile_name(name: &str) -> Result<(f64, f64), ContractError> {
    let upper = name.trim().to_ascii_uppercase();
    let invalid = || ContractError::terrain_load(name, "tile name must look like S36E149");

    let lon_at = upper.find(['E', 'W']).ok_or_else(invalid)?;
    let (lat_part, lon_part) = upper.split_at(lon_at);

    let lat_sign = match lat_part.chars().next() {
        Some('N') => 1.0,
        Some('S') => -1.0,
        _ => return Err(invalid()),
    };
    let lon_sign = if lon_part.starts_with('E') { 1.0 } else { -1.0 };

    let lat: f64 = lat_part[1..].parse().map_err(|_| invalid())?;
    let lon: f64 = lon_part[1..].parse().map_err(|_| invalid())?;
    if lat > 90.0 || lon > 180.0 {
        return Err(invalid());
    }
    Ok((lat_sign * lat, lon_sign * lon))
}

/// Ordered terrain models; the first one with an answer wins
#[derive(Clone, Default)]
pub struct TerrainStack {
    layers: Vec<Arc<dyn TerrainModel>>,
}

impl TerrainStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: Arc<dyn TerrainModel>) {
        self.layers.push(layer);
    }

    pub fn with(mut self, layer: Arc<dyn TerrainModel>) -> Self {
        self.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl TerrainModel for TerrainStack {
    fn elevation(&self, latitude: f64, longitude: f64) -> Option<f64> {
        self.layers
            .iter()
            .find_map(|layer| layer.elevation(latitude, longitude))
    }
}

/// Build the terrain model described by a blueprint
pub fn terrain_from_config(config: &TerrainConfig) -> Result<Arc<dyn TerrainModel>, ContractError> {
    match config {
        TerrainConfig::Flat { elevation } => Ok(Arc::new(FlatTerrain::new(*elevation))),
        TerrainConfig::Dem { paths } => {
            let mut stack = TerrainStack::new();
            for path in paths {
                stack.push(Arc::new(DemRaster::from_hgt_file(path)?));
            }
            Ok(Arc::new(stack))
        }
    }
}
