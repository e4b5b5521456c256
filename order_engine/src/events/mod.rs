//! Engine events and the hook system used to react to them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{publish_to_all, EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
