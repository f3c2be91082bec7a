//! Verbena Event
//!
//! This crate provides the event plumbing for verbena: the immutable
//! [`EventEnvelope`], content-based routing [`Rule`]s, the [`EventRouter`]
//! that fans matched envelopes out to workflow handlers, and the in-process
//! [`EventBus`] that carries envelopes from publishers to the router.
//!
//! The bus handle is an explicit dependency: anything that publishes holds a
//! cloned [`EventBus`], and routing is driven by a single dispatcher loop
//! ([`run_dispatcher`]) so routing can be unit tested without any live
//! infrastructure.

mod bus;
mod envelope;
mod error;
mod router;
mod rule;

pub use bus::{EventBus, event_channel, run_dispatcher};
pub use envelope::EventEnvelope;
pub use error::RouterError;
pub use router::{EventHandler, EventRouter, HandlerError};
pub use rule::{Rule, TypePattern};
