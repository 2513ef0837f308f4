use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GeoPresenceError, Result};
use crate::protocol::event::Identity;
use crate::protocol::location::Location;
use crate::state::projection::{project, MarkerView};

/// Roster + location table for one connection lifecycle.
///
/// - `roster`: identities currently present on the channel.
/// - `locations`: last received location per identity (last write wins).
///
/// A location may be recorded for an identity that is not (yet) a member;
/// it only becomes visible once the identity joins, see [`project`].
/// Such orphan entries hold at most one location per identity seen on the
/// channel. They are dropped by the next `remove_member` for that identity and
/// by `reset` at connection end, so they are bounded by membership churn
/// within one connection. `orphan_count` exposes the current number.
#[derive(Debug, Default)]
pub struct PresenceStateStore {
    roster: BTreeSet<Identity>,
    locations: BTreeMap<Identity, Location>,
    self_id: Option<Identity>,
}

impl PresenceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with the subscription snapshot and record the local
    /// identity. The local identity is always a member, even when the snapshot
    /// omits it.
    ///
    /// Returns `DoubleInitialization` (state untouched) on a second call within
    /// the same lifecycle.
    pub fn initialize<I>(&mut self, members: I, self_id: Identity) -> Result<()>
    where
        I: IntoIterator<Item = Identity>,
    {
        if self.self_id.is_some() {
            return Err(GeoPresenceError::DoubleInitialization);
        }

        self.roster = members.into_iter().collect();
        self.roster.insert(self_id.clone());
        self.self_id = Some(self_id);
        Ok(())
    }

    /// Insert `id` into the roster. Returns false if it was already present.
    pub fn add_member(&mut self, id: Identity) -> bool {
        self.roster.insert(id)
    }

    /// Remove `id` from the roster and drop its location.
    /// Returns false if neither existed.
    pub fn remove_member(&mut self, id: &str) -> bool {
        let was_member = self.roster.remove(id);
        let had_location = self.locations.remove(id).is_some();
        was_member || had_location
    }

    /// Upsert the location of `id`, returning the previous one.
    pub fn set_location(&mut self, id: Identity, loc: Location) -> Option<Location> {
        if !self.roster.contains(&id) {
            tracing::trace!(user = %id, "location recorded for non-member");
        }
        self.locations.insert(id, loc)
    }

    /// Discard everything at connection end. The next lifecycle may
    /// `initialize` again.
    pub fn reset(&mut self) {
        self.roster.clear();
        self.locations.clear();
        self.self_id = None;
    }

    pub fn self_id(&self) -> Option<&Identity> {
        self.self_id.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.self_id.is_some()
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.roster.contains(id)
    }

    pub fn location_of(&self, id: &str) -> Option<Location> {
        self.locations.get(id).copied()
    }

    pub fn roster(&self) -> &BTreeSet<Identity> {
        &self.roster
    }

    pub fn locations(&self) -> &BTreeMap<Identity, Location> {
        &self.locations
    }

    /// Roster listing in stable (sorted) order.
    pub fn online_users(&self) -> Vec<Identity> {
        self.roster.iter().cloned().collect()
    }

    /// Number of location entries held for identities outside the roster.
    pub fn orphan_count(&self) -> usize {
        self.locations
            .keys()
            .filter(|id| !self.roster.contains(*id))
            .count()
    }

    /// Markers for the current state.
    pub fn project(&self) -> Vec<MarkerView> {
        project(&self.roster, &self.locations, self.self_id.as_ref())
    }
}
