//! Readiness notification.
//!
//! This is the boundary to the event loop, not an event loop itself:
//! - [`event`]: readiness reports returned by a poll
//! - [`poller`]: the [`Registry`] seam and the level-triggered [`Poller`]

pub mod event;
pub mod poller;

pub use event::Event;
pub use poller::{Interest, Poller, Registry};
