use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::protocol::event::Identity;
use crate::protocol::location::Location;

/// Label of the local user's marker.
pub const SELF_LABEL: &str = "My location";

/// One renderable marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerView {
    pub user: Identity,
    pub lat: f64,
    pub lng: f64,
    pub label: String,
}

/// Map viewport command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u8,
}

impl Viewport {
    pub fn centered_on(loc: Location, zoom: u8) -> Self {
        Self {
            lat: loc.lat,
            lng: loc.lng,
            zoom,
        }
    }
}

/// Marker label for `id`.
pub fn label_for(id: &Identity, self_id: Option<&Identity>) -> String {
    if self_id == Some(id) {
        SELF_LABEL.to_string()
    } else {
        format!("{id}'s location")
    }
}

/// Project roster ∩ locations into markers.
///
/// Output follows the location table's key order (sorted by identity), so the
/// same inputs always give the same sequence.
pub fn project(
    roster: &BTreeSet<Identity>,
    locations: &BTreeMap<Identity, Location>,
    self_id: Option<&Identity>,
) -> Vec<MarkerView> {
    locations
        .iter()
        .filter(|(id, _)| roster.contains(*id))
        .map(|(id, loc)| MarkerView {
            user: id.clone(),
            lat: loc.lat,
            lng: loc.lng,
            label: label_for(id, self_id),
        })
        .collect()
}
