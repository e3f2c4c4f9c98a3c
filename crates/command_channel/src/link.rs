//! VehicleLink trait - the command side of the vehicle connection

use contracts::GeoPoint;

use crate::Result;

/// Vehicle operations the command channel can trigger
///
/// Methods take `&self` so a link can serve concurrent commands; the
/// channel never holds a lock while awaiting one.
#[trait_variant::make(VehicleLink: Send)]
pub trait LocalVehicleLink {
    /// Link name (used for logging/errors)
    fn name(&self) -> &str;

    /// Point the gimbal (radians, relative to the body)
    async fn set_gimbal_angles(&self, roll: f64, pitch: f64, yaw: f64) -> Result<()>;

    /// Lock the gimbal onto a ground location
    async fn set_roi(&self, target: GeoPoint) -> Result<()>;

    /// Release the region of interest
    async fn disable_roi(&self) -> Result<()>;
}
