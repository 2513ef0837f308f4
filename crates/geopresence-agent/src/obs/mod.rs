//! Lightweight in-process metrics.
//!
//! Counters and gauges are plain atomics rendered by the `/metrics` handler in
//! Prometheus text format.

pub mod metrics;

pub use metrics::AgentMetrics;
