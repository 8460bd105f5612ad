//! Circulation event plumbing: the event contract, envelopes, an append-only
//! journal and an in-memory broadcast bus.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod journal;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use journal::EventJournal;
