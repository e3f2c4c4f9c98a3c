//! In-memory vehicle link for tests and offline runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use contracts::GeoPoint;
use tracing::info;

use crate::{CommandError, Result, VehicleLink};

/// A call received by [`MockVehicleLink`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkCall {
    SetGimbalAngles { roll: f64, pitch: f64, yaw: f64 },
    SetRoi(GeoPoint),
    DisableRoi,
}

/// Vehicle link that records calls and can be told to fail
#[derive(Debug, Default)]
pub struct MockVehicleLink {
    calls: Mutex<Vec<LinkCall>>,
    failing: AtomicBool,
}

impl MockVehicleLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn receive(&self, call: LinkCall) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CommandError::vehicle_link("mock", "link unavailable"));
        }
        info!(?call, "mock vehicle link call");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

impl VehicleLink for MockVehicleLink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn set_gimbal_angles(&self, roll: f64, pitch: f64, yaw: f64) -> Result<()> {
        self.receive(LinkCall::SetGimbalAngles { roll, pitch, yaw })
    }

    async fn set_roi(&self, target: GeoPoint) -> Result<()> {
        self.receive(LinkCall::SetRoi(target))
    }

    async fn disable_roi(&self) -> Result<()> {
        self.receive(LinkCall::DisableRoi)
    }
}
