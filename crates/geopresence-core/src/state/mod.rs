//! Presence state and its marker projection.
//!
//! `PresenceStateStore` owns the roster and the location table; `project`
//! turns a snapshot of both into the markers a map should show.

mod projection;
mod store;

pub use projection::{label_for, project, MarkerView, Viewport, SELF_LABEL};
pub use store::PresenceStateStore;
