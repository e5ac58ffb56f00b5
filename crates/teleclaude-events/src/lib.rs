pub mod cartridge;
pub mod db;
pub mod delivery;
pub mod error;
pub mod processor;
pub mod producer;
pub mod schema;
pub mod store;
pub mod types;

pub use cartridge::{Cartridge, DedupCartridge, NotificationProjectorCartridge};
pub use delivery::{ChatDeliveryCallback, DeliveryHub, PushCallback, WsBroadcastCallback};
pub use error::{EventsError, Result};
pub use processor::EventProcessor;
pub use producer::{EventProducer, EVENTS_STREAM_KEY};
pub use schema::lookup as lookup_schema;
pub use store::{NotificationFilter, NotificationStore};
pub use types::{
    AgentStatus, CartridgeOutcome, EventEnvelope, EventLevel, EventSchema, HumanStatus, Lifecycle, Notification, PushCallbackArgs, Visibility,
};
