//! Agent config loader (strict parsing).

pub mod schema;

use std::fs;

use geopresence_core::error::{GeoPresenceError, Result};

pub use schema::{
    AgentConfig, BackendSection, MapSection, OpsSection, SensorSection, SessionSection,
    TransportSection,
};

pub fn load_from_file(path: &str) -> Result<AgentConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| GeoPresenceError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<AgentConfig> {
    let cfg: AgentConfig = serde_yaml::from_str(s)
        .map_err(|e| GeoPresenceError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
