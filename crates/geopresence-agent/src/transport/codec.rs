//! Decode-once codec for transport frames.
//!
//! - Presence frames on our channel => `PresenceEvent`
//! - Frames for other channels and unhandled event names are surfaced as
//!   `Ignored` so the loop can count and skip them

use bytes::Bytes;
use geopresence_core::{
    error::{GeoPresenceError, Result},
    protocol::event::decode_frame,
    PresenceEvent,
};

#[derive(Debug)]
pub enum Inbound {
    Event(PresenceEvent),
    Ignored { event: String, reason: &'static str },
}

pub fn decode(buf: &Bytes, channel: &str) -> Result<Inbound> {
    let frame = decode_frame(buf)?;

    if let Some(ch) = frame.channel.as_deref() {
        if ch != channel {
            return Ok(Inbound::Ignored {
                event: frame.event,
                reason: "wrong_channel",
            });
        }
    }

    match frame.into_event() {
        Ok(ev) => Ok(Inbound::Event(ev)),
        Err(GeoPresenceError::UnknownEvent(event)) => Ok(Inbound::Ignored {
            event,
            reason: "unknown_event",
        }),
        Err(e) => Err(e),
    }
}
