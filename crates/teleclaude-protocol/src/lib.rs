//! Wire shapes for the multiplexed notification WebSocket (spec §6).
//!
//! A single connection carries topic subscription requests and, once
//! subscribed, unsolicited push frames — there is no connect/auth
//! handshake here, just the envelope the Event Platform Core's WS
//! delivery callback and the REST adapter's `/ws` route both speak.

pub mod frames;
pub mod topics;

pub use frames::{ErrorShape, EventFrame, InboundFrame, ReqFrame, ResFrame};
pub use topics::{SubscribeParams, Topic, UnsubscribeParams, NOTIFICATIONS};
