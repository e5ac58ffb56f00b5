//! Unified Adapter Client (UCAP) — the single event fan-in/fan-out
//! boundary (spec §4.3).

pub mod adapter;
pub mod client;
pub mod error;
pub mod handlers;
pub mod types;

pub use adapter::Adapter;
pub use client::AdapterClient;
pub use error::AdapterError;
pub use handlers::InboundHandlers;
pub use types::{DispatchEnvelope, DispatchStatus, InboundEvent, InboundMetadata, OutputForm};
