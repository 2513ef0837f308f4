//! geopresence agent library entry.
//!
//! Wires the presence transport, the position sensor, the persistence sink and
//! the map surface around the synchronous core. Consumed by the binary
//! (`main.rs`) and by integration tests, which drive a `Session` with
//! channel-backed transport and sensor.

pub mod app_state;
pub mod config;
pub mod notify;
pub mod obs;
pub mod ops;
pub mod publisher;
pub mod reconciler;
pub mod router;
pub mod sensor;
pub mod session;
pub mod surface;
pub mod transport;
