//! Coordinates, sensor samples and the update-location request body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{GeoPresenceError, Result};
use crate::protocol::event::Identity;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    /// Build a validated location.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let loc = Self { lat, lng };
        loc.validate()?;
        Ok(loc)
    }

    /// Reject NaN/infinite values and out-of-range degrees.
    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(GeoPresenceError::BadEvent("location must be finite".into()));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(GeoPresenceError::BadEvent(format!(
                "lat {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(GeoPresenceError::BadEvent(format!(
                "lng {} out of range [-180, 180]",
                self.lng
            )));
        }
        Ok(())
    }
}

/// One position fix from the device sensor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sample {
    pub location: Location,
    /// Reported accuracy radius in meters.
    #[serde(default)]
    pub accuracy_m: f64,
}

impl Sample {
    pub fn new(lat: f64, lng: f64, accuracy_m: f64) -> Self {
        Self {
            location: Location { lat, lng },
            accuracy_m,
        }
    }
}

/// Why a single position fix failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFailure {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timeout")]
    Timeout,
}

impl SensorFailure {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            SensorFailure::PermissionDenied => "permission_denied",
            SensorFailure::PositionUnavailable => "position_unavailable",
            SensorFailure::Timeout => "timeout",
        }
    }
}

/// Body of `POST /update-location`, also the `location-update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub username: Identity,
    pub location: Location,
}
