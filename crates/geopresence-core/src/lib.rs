//! geopresence core: presence roster, location table, marker projection and
//! the wire contracts of the presence channel.
//!
//! This crate is the synchronous heart of the engine. It carries no transport
//! or runtime dependencies: every operation is a plain state transition so the
//! whole engine can be driven by synthetic event sequences in tests.
//!
//! # Guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed frames surface as `GeoPresenceError`/`Result` so a hostile or
//! buggy peer on the channel cannot take the reconciliation loop down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod state;

/// Shared result type.
pub use error::{ErrorCode, GeoPresenceError, Result};
pub use protocol::event::{Identity, PresenceEvent};
pub use protocol::location::{Location, Sample, SensorFailure};
pub use state::{project, MarkerView, PresenceStateStore, Viewport};
