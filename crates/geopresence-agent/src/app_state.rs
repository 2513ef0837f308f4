//! Shared state for the ops HTTP endpoints.
//!
//! The event loop owns all presence state; the HTTP side only sees metrics and
//! the last committed map snapshot through a `watch` receiver.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AgentConfig;
use crate::obs::AgentMetrics;
use crate::surface::MapSnapshot;

#[derive(Clone)]
pub struct AgentState {
    inner: Arc<AgentStateInner>,
}

struct AgentStateInner {
    cfg: AgentConfig,
    metrics: Arc<AgentMetrics>,
    snapshot: watch::Receiver<MapSnapshot>,
}

impl AgentState {
    pub fn new(
        cfg: AgentConfig,
        metrics: Arc<AgentMetrics>,
        snapshot: watch::Receiver<MapSnapshot>,
    ) -> Self {
        Self {
            inner: Arc::new(AgentStateInner {
                cfg,
                metrics,
                snapshot,
            }),
        }
    }

    pub fn cfg(&self) -> &AgentConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.inner.metrics
    }

    /// Ready once the snapshot arrived, and not while draining.
    pub fn is_ready(&self) -> bool {
        let m = self.metrics();
        m.is_synced() && !m.is_draining()
    }

    pub fn snapshot(&self) -> MapSnapshot {
        self.inner.snapshot.borrow().clone()
    }
}
