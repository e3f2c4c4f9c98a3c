//! WGS-84 local offset conversions
//!
//! Horizontal offsets are small compared to the earth's radius, so a local
//! tangent plane at the origin latitude is used: north offsets scale with the
//! meridional radius and east offsets with the prime-vertical radius.

/// Semi-major axis (m)
pub const WGS84_A: f64 = 6_378_137.0;

/// Flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// First eccentricity squared
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Meridional radius of curvature at a latitude (degrees)
pub fn meridional_radius(latitude: f64) -> f64 {
    let s = latitude.to_radians().sin();
    WGS84_A * (1.0 - WGS84_E2) / (1.0 - WGS84_E2 * s * s).powf(1.5)
}

/// Prime-vertical radius of curvature at a latitude (degrees)
pub fn prime_vertical_radius(latitude: f64) -> f64 {
    let s = latitude.to_radians().sin();
    WGS84_A / (1.0 - WGS84_E2 * s * s).sqrt()
}

/// Shift a coordinate by `north` / `east` metres
pub fn offset_to_geodetic(latitude: f64, longitude: f64, north: f64, east: f64) -> (f64, f64) {
    let d_lat = north / meridional_radius(latitude);
    let cos_lat = latitude.to_radians().cos().max(1e-12);
    let d_lon = east / (prime_vertical_radius(latitude) * cos_lat);
    (
        latitude + d_lat.to_degrees(),
        longitude + d_lon.to_degrees(),
    )
}

/// North / east metres from an origin to a nearby coordinate
pub fn geodetic_to_offset(
    origin_latitude: f64,
    origin_longitude: f64,
    latitude: f64,
    longitude: f64,
) -> (f64, f64) {
    let north = (latitude - origin_latitude).to_radians() * meridional_radius(origin_latitude);
    let east = (longitude - origin_longitude).to_radians()
        * prime_vertical_radius(origin_latitude)
        * origin_latitude.to_radians().cos();
    (north, east)
}
