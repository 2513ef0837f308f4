//! Shared error type across geopresence crates.

use thiserror::Error;

use crate::protocol::location::SensorFailure;

/// Stable error codes (logged and exported as metric labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed frame or payload.
    BadEvent,
    /// Event name not handled by the engine.
    UnknownEvent,
    /// `initialize` called twice in one connection lifecycle.
    DoubleInit,
    /// Device has no position sensor.
    SensorUnavailable,
    /// A single failed position fix.
    Sensor,
    /// update-location call did not succeed.
    Persistence,
    /// Transport read failed.
    Transport,
    /// Invalid configuration.
    Config,
    /// Unsupported config/protocol version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadEvent => "BAD_EVENT",
            ErrorCode::UnknownEvent => "UNKNOWN_EVENT",
            ErrorCode::DoubleInit => "DOUBLE_INIT",
            ErrorCode::SensorUnavailable => "SENSOR_UNAVAILABLE",
            ErrorCode::Sensor => "SENSOR",
            ErrorCode::Persistence => "PERSISTENCE",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Config => "CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GeoPresenceError>;

/// Unified error type used by core and agent.
#[derive(Debug, Error)]
pub enum GeoPresenceError {
    #[error("bad event: {0}")]
    BadEvent(String),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("presence state already initialized for this connection")]
    DoubleInitialization,
    #[error("geolocation is not supported on this device")]
    SensorUnavailable,
    #[error("sensor error: {0}")]
    Sensor(SensorFailure),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("config: {0}")]
    Config(String),
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl GeoPresenceError {
    /// Map error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            GeoPresenceError::BadEvent(_) => ErrorCode::BadEvent,
            GeoPresenceError::UnknownEvent(_) => ErrorCode::UnknownEvent,
            GeoPresenceError::DoubleInitialization => ErrorCode::DoubleInit,
            GeoPresenceError::SensorUnavailable => ErrorCode::SensorUnavailable,
            GeoPresenceError::Sensor(_) => ErrorCode::Sensor,
            GeoPresenceError::Persistence(_) => ErrorCode::Persistence,
            GeoPresenceError::Transport(_) => ErrorCode::Transport,
            GeoPresenceError::Config(_) => ErrorCode::Config,
            GeoPresenceError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            GeoPresenceError::Internal(_) => ErrorCode::Internal,
        }
    }
}
