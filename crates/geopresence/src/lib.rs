//! Top-level facade crate for geopresence.
//!
//! Re-exports the core state engine and the agent runtime so users can depend on a single crate.

pub mod core {
    pub use geopresence_core::*;
}

pub mod agent {
    pub use geopresence_agent::*;
}
