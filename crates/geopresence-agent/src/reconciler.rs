//! Event reconciler: one transport event -> one store operation -> redraw.
//!
//! The reconciler is the only owner of the `PresenceStateStore`. Every
//! mutation is followed by a synchronous re-projection so the surface reflects
//! each discrete change, never a batched one.

use std::sync::Arc;

use geopresence_core::error::{GeoPresenceError, Result};
use geopresence_core::{Identity, Location, PresenceEvent, PresenceStateStore, Viewport};

use crate::notify::{Notification, Notifier};
use crate::obs::AgentMetrics;
use crate::surface::MapSurface;

/// What the event loop must do after an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    None,
    /// Event was valid but skipped; nothing changed.
    Ignored,
    /// Snapshot applied: start watching the local position sensor.
    StartAcquisition,
}

pub struct EventReconciler {
    store: PresenceStateStore,
    surface: Box<dyn MapSurface>,
    notifier: Box<dyn Notifier>,
    metrics: Arc<AgentMetrics>,
    strict_init: bool,
}

impl EventReconciler {
    pub fn new(
        surface: Box<dyn MapSurface>,
        notifier: Box<dyn Notifier>,
        metrics: Arc<AgentMetrics>,
        strict_init: bool,
    ) -> Self {
        Self {
            store: PresenceStateStore::new(),
            surface,
            notifier,
            metrics,
            strict_init,
        }
    }

    pub fn store(&self) -> &PresenceStateStore {
        &self.store
    }

    /// Apply one event.
    ///
    /// The only error is a repeated snapshot in strict mode; in lenient mode
    /// it is logged and ignored. A removal of the local identity is ignored
    /// too: the local user stays on the roster for the whole connection.
    pub fn apply(&mut self, event: PresenceEvent) -> Result<Reaction> {
        let name = event.name();
        let reaction = match event {
            PresenceEvent::SubscriptionSucceeded { members, self_id } => {
                match self.store.initialize(members.into_keys(), self_id) {
                    Ok(()) => {}
                    Err(GeoPresenceError::DoubleInitialization) if !self.strict_init => {
                        tracing::error!("duplicate subscription snapshot ignored");
                        self.metrics.events_ignored.inc(&[("reason", "double_init")]);
                        return Ok(Reaction::Ignored);
                    }
                    Err(e) => return Err(e),
                }
                self.metrics.set_synced(true);
                self.publish_roster();
                self.reproject();
                self.notifier.notify(Notification::Synced {
                    online: self.store.roster().len(),
                });
                Reaction::StartAcquisition
            }
            PresenceEvent::LocationUpdate { user, location } => {
                self.store.set_location(user, location);
                self.reproject();
                Reaction::None
            }
            PresenceEvent::MemberRemoved { id } => {
                if self.store.self_id() == Some(&id) {
                    tracing::warn!(user = %id, "removal of the local user ignored");
                    self.metrics.events_ignored.inc(&[("reason", "self_removed")]);
                    return Ok(Reaction::Ignored);
                }
                let changed = self.store.remove_member(id.as_str());
                self.publish_roster();
                self.reproject();
                if changed {
                    self.notifier.notify(Notification::Left(id));
                }
                Reaction::None
            }
            PresenceEvent::MemberAdded { id, .. } => {
                let changed = self.store.add_member(id.clone());
                self.publish_roster();
                self.reproject();
                if changed {
                    self.notifier.notify(Notification::Joined(id));
                }
                Reaction::None
            }
        };

        self.metrics.events_applied.inc(&[("event", name)]);
        Ok(reaction)
    }

    /// Record a local sample under the local identity. Returns that identity,
    /// or `None` before the snapshot told us who we are.
    pub fn record_self_location(&mut self, location: Location) -> Option<Identity> {
        let self_id = self.store.self_id()?.clone();
        self.store.set_location(self_id.clone(), location);
        Some(self_id)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.surface.set_viewport(viewport);
    }

    /// Recompute markers and redraw the surface.
    pub fn reproject(&mut self) {
        let markers = self.store.project();
        self.surface.redraw(&markers);

        self.metrics.markers.set(markers.len() as i64);
        self.metrics.roster_size.set(self.store.roster().len() as i64);
        self.metrics.orphan_locations.set(self.store.orphan_count() as i64);
    }

    /// Connection ended: discard state and clear the surface.
    pub fn end(&mut self) {
        self.store.reset();
        self.metrics.set_synced(false);
        self.publish_roster();
        self.reproject();
    }

    fn publish_roster(&mut self) {
        let online = self.store.online_users();
        self.surface.set_roster(&online);
    }
}
