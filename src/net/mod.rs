//! TCP networking primitives.
//!
//! - [`socket`]: [`Socket`], an owned non-blocking TCP socket
//! - [`acceptor`]: [`Acceptor`], connection admission with descriptor-exhaustion recovery
//! - [`utils`]: address conversion and descriptor flag helpers
//!
//! [`Socket`]: socket::Socket
//! [`Acceptor`]: acceptor::Acceptor

pub mod acceptor;
pub mod socket;
pub mod utils;
