//! Building blocks for a non-blocking, reactor-style network server.
//!
//! The crate provides the pieces an event loop is assembled from, not the
//! event loop itself.
//!
//! # Architecture
//!
//! - **Buffer**: growable byte buffer with a read cursor, line/pattern search
//!   and single-shot descriptor I/O
//! - **TaskQueue**: bounded FIFO of closures drained by a fixed worker pool,
//!   for work that must not run on the I/O thread
//! - **Acceptor**: listening socket that survives descriptor exhaustion
//! - **Poller**: level-triggered readiness notification behind the
//!   [`Registry`] trait the acceptor registers through
//! - **TaskQueueBuilder**: fluent construction of task queues
//! - **logging**: installs a `tracing` subscriber from an explicit [`LogConfig`]
//!
//! A typical server polls, lets the [`Acceptor`] admit connections, reads
//! each connection into a [`Buffer`], splits requests out of it with
//! [`Buffer::read_line`] or [`Buffer::find`], and hands CPU-heavy requests to
//! a [`TaskQueue`].

pub mod buffer;
mod builder;
pub mod error;
pub mod logging;
pub mod net;
pub mod reactor;
pub mod runtime;

pub use buffer::{Buffer, BufferObserver};
pub use builder::TaskQueueBuilder;
pub use error::{Error, Result};
pub use logging::LogConfig;
pub use net::acceptor::Acceptor;
pub use net::socket::Socket;
pub use reactor::{Event, Interest, Poller, Registry};
pub use runtime::{Task, TaskQueue};
