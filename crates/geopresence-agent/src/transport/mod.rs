//! Presence transport seam.
//!
//! A `TransportChannel` hands out the frame stream of one subscription. The
//! stream ending means the connection ended; dropping it unsubscribes. Frames
//! are decoded once by `codec` before they reach the reconciler.

pub mod channel;
pub mod codec;

pub use channel::{ChannelTransport, FrameStream, LineTransport, TransportChannel};
pub use codec::{decode, Inbound};
