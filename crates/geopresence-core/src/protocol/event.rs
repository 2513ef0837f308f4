//! Presence channel frames (JSON).
//!
//! A frame carries the event name, the channel it was published on and an
//! optional `data` payload. `data` is kept as `RawValue` until the event name
//! is known, then decoded into exactly one `PresenceEvent` variant.
//!
//! Pusher-compatible peers send `data` as a JSON-encoded *string*; both the
//! string and the plain object form are accepted.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{GeoPresenceError, Result};
use crate::protocol::location::{Location, LocationUpdate};

pub const EVENT_SUBSCRIPTION_SUCCEEDED: &str = "pusher:subscription_succeeded";
pub const EVENT_LOCATION_UPDATE: &str = "location-update";
pub const EVENT_MEMBER_REMOVED: &str = "pusher:member_removed";
pub const EVENT_MEMBER_ADDED: &str = "pusher:member_added";

/// Opaque per-connection user handle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Free-form member info attached by the transport (unused by the engine).
pub type MemberInfo = serde_json::Value;

/// Wire frame as received from the transport.
#[derive(Debug, Deserialize)]
pub struct Frame {
    /// Event name (e.g. `pusher:member_added`).
    pub event: String,
    /// Channel the frame was published on; absent for connection-level frames.
    #[serde(default)]
    pub channel: Option<String>,
    /// Optional payload, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

/// Inbound presence/location event, one variant per handled event name.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceEvent {
    /// Initial roster snapshot for this connection.
    SubscriptionSucceeded {
        members: BTreeMap<Identity, MemberInfo>,
        self_id: Identity,
    },
    LocationUpdate {
        user: Identity,
        location: Location,
    },
    MemberRemoved {
        id: Identity,
    },
    MemberAdded {
        id: Identity,
        info: Option<MemberInfo>,
    },
}

impl PresenceEvent {
    /// Wire event name of this variant.
    pub fn name(&self) -> &'static str {
        match self {
            PresenceEvent::SubscriptionSucceeded { .. } => EVENT_SUBSCRIPTION_SUCCEEDED,
            PresenceEvent::LocationUpdate { .. } => EVENT_LOCATION_UPDATE,
            PresenceEvent::MemberRemoved { .. } => EVENT_MEMBER_REMOVED,
            PresenceEvent::MemberAdded { .. } => EVENT_MEMBER_ADDED,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionSucceededData {
    members: BTreeMap<Identity, MemberInfo>,
    #[serde(rename = "myID")]
    my_id: Identity,
}

#[derive(Debug, Deserialize)]
struct MemberRemovedData {
    #[serde(alias = "user_id")]
    id: Identity,
}

#[derive(Debug, Deserialize)]
struct MemberAddedData {
    #[serde(alias = "user_id")]
    id: Identity,
    #[serde(default, alias = "user_info")]
    info: Option<MemberInfo>,
}

impl Frame {
    /// Decode `data` into `T`, unwrapping a string-encoded payload first.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .data
            .as_ref()
            .ok_or_else(|| GeoPresenceError::BadEvent(format!("{} requires data", self.event)))?;

        let text = raw.get();
        let parsed = if text.trim_start().starts_with('"') {
            let inner: String = serde_json::from_str(text)
                .map_err(|e| GeoPresenceError::BadEvent(format!("{} data: {e}", self.event)))?;
            serde_json::from_str(&inner)
        } else {
            serde_json::from_str(text)
        };
        parsed.map_err(|e| GeoPresenceError::BadEvent(format!("{} invalid data: {e}", self.event)))
    }

    /// Decode this frame into a typed event.
    ///
    /// Unhandled event names yield `UnknownEvent`, which callers are expected
    /// to skip rather than treat as a failure.
    pub fn into_event(self) -> Result<PresenceEvent> {
        match self.event.as_str() {
            EVENT_SUBSCRIPTION_SUCCEEDED => {
                let d: SubscriptionSucceededData = self.payload()?;
                for id in d.members.keys() {
                    require_identity(id, &self.event)?;
                }
                require_identity(&d.my_id, &self.event)?;
                Ok(PresenceEvent::SubscriptionSucceeded {
                    members: d.members,
                    self_id: d.my_id,
                })
            }
            EVENT_LOCATION_UPDATE => {
                let d: LocationUpdate = self.payload()?;
                require_identity(&d.username, &self.event)?;
                d.location.validate()?;
                Ok(PresenceEvent::LocationUpdate {
                    user: d.username,
                    location: d.location,
                })
            }
            EVENT_MEMBER_REMOVED => {
                let d: MemberRemovedData = self.payload()?;
                require_identity(&d.id, &self.event)?;
                Ok(PresenceEvent::MemberRemoved { id: d.id })
            }
            EVENT_MEMBER_ADDED => {
                let d: MemberAddedData = self.payload()?;
                require_identity(&d.id, &self.event)?;
                Ok(PresenceEvent::MemberAdded {
                    id: d.id,
                    info: d.info,
                })
            }
            other => Err(GeoPresenceError::UnknownEvent(other.to_string())),
        }
    }
}

fn require_identity(id: &Identity, event: &str) -> Result<()> {
    if id.as_str().trim().is_empty() {
        return Err(GeoPresenceError::BadEvent(format!("{event}: empty identity")));
    }
    Ok(())
}

/// Parse a frame header from bytes. `data` stays raw.
pub fn decode_frame(buf: &[u8]) -> Result<Frame> {
    serde_json::from_slice(buf)
        .map_err(|e| GeoPresenceError::BadEvent(format!("invalid frame json: {e}")))
}

/// Parse a frame and decode its event in one step.
pub fn decode_event(buf: &[u8]) -> Result<PresenceEvent> {
    decode_frame(buf)?.into_event()
}
