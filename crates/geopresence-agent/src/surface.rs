//! Rendering seam.
//!
//! The agent never patches markers: every projection clears the surface and
//! draws the full marker list again (`redraw`).

use serde::Serialize;
use tokio::sync::watch;

use geopresence_core::{Identity, MarkerView, Viewport};

/// External map surface.
pub trait MapSurface: Send {
    fn set_viewport(&mut self, viewport: Viewport);
    fn clear_markers(&mut self);
    fn draw_marker(&mut self, marker: &MarkerView);

    /// Roster listing shown next to the map.
    fn set_roster(&mut self, _online: &[Identity]) {}

    /// Called once a redraw is complete.
    fn commit(&mut self) {}

    fn redraw(&mut self, markers: &[MarkerView]) {
        self.clear_markers();
        for m in markers {
            self.draw_marker(m);
        }
        self.commit();
    }
}

/// Surface that only logs commands.
#[derive(Debug, Default)]
pub struct TracingSurface;

impl MapSurface for TracingSurface {
    fn set_viewport(&mut self, viewport: Viewport) {
        tracing::info!(lat = viewport.lat, lng = viewport.lng, zoom = viewport.zoom, "viewport");
    }

    fn clear_markers(&mut self) {}

    fn draw_marker(&mut self, marker: &MarkerView) {
        tracing::debug!(lat = marker.lat, lng = marker.lng, label = %marker.label, "marker");
    }
}

/// Last rendered state, served by the ops endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MapSnapshot {
    pub viewport: Option<Viewport>,
    pub markers: Vec<MarkerView>,
    pub online: Vec<Identity>,
}

/// Surface that publishes every committed redraw on a `watch` channel.
pub struct WatchSurface {
    tx: watch::Sender<MapSnapshot>,
    pending: Vec<MarkerView>,
}

impl WatchSurface {
    pub fn new() -> (Self, watch::Receiver<MapSnapshot>) {
        let (tx, rx) = watch::channel(MapSnapshot::default());
        (
            Self {
                tx,
                pending: Vec::new(),
            },
            rx,
        )
    }
}

impl MapSurface for WatchSurface {
    fn set_viewport(&mut self, viewport: Viewport) {
        self.tx.send_modify(|s| s.viewport = Some(viewport));
    }

    fn clear_markers(&mut self) {
        self.pending.clear();
    }

    fn draw_marker(&mut self, marker: &MarkerView) {
        tracing::debug!(lat = marker.lat, lng = marker.lng, label = %marker.label, "marker");
        self.pending.push(marker.clone());
    }

    fn set_roster(&mut self, online: &[Identity]) {
        let online = online.to_vec();
        self.tx.send_modify(|s| s.online = online);
    }

    fn commit(&mut self) {
        let markers = std::mem::take(&mut self.pending);
        self.tx.send_modify(|s| s.markers = markers);
    }
}
