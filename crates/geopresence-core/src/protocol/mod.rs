//! Wire contracts of the presence channel and the persistence endpoint.
//!
//! - `event`: inbound presence/location frames, decoded once into a tagged enum.
//! - `location`: coordinates, sensor samples and the update-location body.
//!
//! Decoding is panic-free: malformed input is reported as `GeoPresenceError`
//! and coordinates are validated here, at the boundary, so state code never
//! sees a NaN or an out-of-range latitude.

pub mod event;
pub mod location;
