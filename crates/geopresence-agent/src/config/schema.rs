use serde::Deserialize;
use geopresence_core::error::{GeoPresenceError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub version: u32,

    pub transport: TransportSection,

    pub backend: BackendSection,

    #[serde(default)]
    pub map: MapSection,

    #[serde(default)]
    pub sensor: SensorSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub ops: OpsSection,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(GeoPresenceError::UnsupportedVersion);
        }

        self.transport.validate()?;
        self.backend.validate()?;
        self.map.validate()?;
        self.sensor.validate()?;

        Ok(())
    }
}

/// Presence transport settings. Injected, never hardcoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    pub app_key: String,

    pub auth_endpoint: String,

    pub cluster: String,

    #[serde(default = "default_channel")]
    pub channel: String,
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() {
            return Err(GeoPresenceError::Config("transport.app_key must not be empty".into()));
        }
        if self.cluster.trim().is_empty() {
            return Err(GeoPresenceError::Config("transport.cluster must not be empty".into()));
        }
        require_http_url("transport.auth_endpoint", &self.auth_endpoint)?;
        if !self.channel.starts_with("presence-") {
            return Err(GeoPresenceError::Config(
                "transport.channel must be a presence channel (presence-*)".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    pub api_base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum gap between two update-location calls. 0 sends every sample.
    #[serde(default)]
    pub min_publish_interval_ms: u64,
}

impl BackendSection {
    pub fn validate(&self) -> Result<()> {
        require_http_url("backend.api_base_url", &self.api_base_url)?;
        if !(100..=60000).contains(&self.timeout_ms) {
            return Err(GeoPresenceError::Config(
                "backend.timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    /// `{api_base_url}/update-location`, tolerating a trailing slash.
    pub fn update_location_url(&self) -> String {
        format!("{}/update-location", self.api_base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapSection {
    #[serde(default = "default_zoom")]
    pub zoom: u8,
}

impl Default for MapSection {
    fn default() -> Self {
        Self { zoom: default_zoom() }
    }
}

impl MapSection {
    pub fn validate(&self) -> Result<()> {
        if self.zoom > 22 {
            return Err(GeoPresenceError::Config("map.zoom must be between 0 and 22".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorSection {
    /// false models a device without geolocation.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// YAML list of samples replayed as the device sensor.
    #[serde(default)]
    pub replay_file: Option<String>,

    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            replay_file: None,
            replay_interval_ms: default_replay_interval_ms(),
        }
    }
}

impl SensorSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=600000).contains(&self.replay_interval_ms) {
            return Err(GeoPresenceError::Config(
                "sensor.replay_interval_ms must be between 10 and 600000".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// End the session on a second snapshot instead of ignoring it.
    #[serde(default = "default_strict_init")]
    pub strict_init: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            strict_init: default_strict_init(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpsSection {
    #[serde(default = "default_ops_listen")]
    pub listen: String,
}

impl Default for OpsSection {
    fn default() -> Self {
        Self {
            listen: default_ops_listen(),
        }
    }
}

fn require_http_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(GeoPresenceError::Config(format!("{field} must be an http(s) URL")))
    }
}

fn default_channel() -> String {
    "presence-channel".into()
}
fn default_timeout_ms() -> u64 {
    5000
}
fn default_zoom() -> u8 {
    13
}
fn default_true() -> bool {
    true
}
fn default_replay_interval_ms() -> u64 {
    1000
}
fn default_strict_init() -> bool {
    cfg!(debug_assertions)
}
fn default_ops_listen() -> String {
    "127.0.0.1:9090".into()
}
