//! Listening socket that keeps accepting when descriptors run out.
//!
//! Under level-triggered notification a listener stays readable while its
//! accept queue is non-empty. If `accept` fails with `EMFILE` the connection
//! is never taken off the queue and the event loop would spin on it. The
//! acceptor therefore keeps one spare descriptor open on `/dev/null`; on
//! exhaustion it closes the spare, accepts and immediately closes the pending
//! connection, then reopens the spare.
//!
//! # Example
//!
//! ```no_run
//! use netbase::{Acceptor, Poller};
//!
//! let poller = Poller::new()?;
//! let mut acceptor = Acceptor::new(&poller, "127.0.0.1:8080".parse().unwrap(), false)?;
//!
//! acceptor.set_new_connection_callback(|socket, peer| {
//!     println!("connection from {peer}");
//!     drop(socket);
//! });
//! acceptor.listen()?;
//!
//! let mut events = Vec::new();
//! loop {
//!     poller.poll(&mut events, None)?;
//!     for event in &events {
//!         if event.file_descriptor == acceptor.file_descriptor() {
//!             acceptor.on_readable();
//!         }
//!     }
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

use crate::net::socket::Socket;
use crate::reactor::{Interest, Registry};

use libc::{EMFILE, ENFILE, O_CLOEXEC, O_RDONLY, c_int, open};
use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Called with every accepted connection and its peer address.
pub type NewConnectionCallback = Box<dyn FnMut(Socket, SocketAddr)>;

/// Accepts connections on one address for a single event-loop thread.
pub struct Acceptor<R: Registry> {
    registry: R,
    socket: Socket,
    reserve: Option<OwnedFd>,
    listening: bool,
    backlog: c_int,
    on_connection: Option<NewConnectionCallback>,
}

impl<R: Registry> Acceptor<R> {
    /// Creates a non-blocking socket bound to `address` with `SO_REUSEADDR`
    /// (and `SO_REUSEPORT` if asked) plus the spare descriptor.
    ///
    /// Nothing is accepted until [`listen`](Self::listen).
    pub fn new(registry: R, address: SocketAddr, reuse_port: bool) -> io::Result<Self> {
        let reserve = open_reserve()?;
        let socket = Socket::new_nonblocking(&address)?;

        socket.set_reuse_addr(true)?;
        if reuse_port {
            socket.set_reuse_port(true)?;
        }
        socket.bind(&address)?;

        Ok(Self {
            registry,
            socket,
            reserve: Some(reserve),
            listening: false,
            backlog: libc::SOMAXCONN,
            on_connection: None,
        })
    }

    /// Sets the backlog passed to `listen(2)`.
    pub fn with_backlog(mut self, backlog: c_int) -> Self {
        self.backlog = backlog;
        self
    }

    /// Installs the handler for accepted connections.
    ///
    /// Without one, accepted connections are closed straight away.
    pub fn set_new_connection_callback<F>(&mut self, callback: F)
    where
        F: FnMut(Socket, SocketAddr) + 'static,
    {
        self.on_connection = Some(Box::new(callback));
    }

    /// Starts listening and registers the socket for readability.
    ///
    /// Call this from the thread that will deliver [`on_readable`](Self::on_readable).
    pub fn listen(&mut self) -> io::Result<()> {
        self.socket.listen(self.backlog)?;
        self.registry
            .register(self.socket.as_raw_fd(), Interest::READABLE)?;
        self.listening = true;

        tracing::debug!(
            fd = self.socket.as_raw_fd(),
            address = ?self.socket.local_addr().ok(),
            "acceptor listening"
        );

        Ok(())
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The listening descriptor, for matching readiness events.
    pub fn file_descriptor(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    /// Whether the spare descriptor is currently held.
    pub fn has_reserve(&self) -> bool {
        self.reserve.is_some()
    }

    /// Handles one readiness notification for the listening socket.
    ///
    /// Accepts a single connection. Failures are logged and never returned;
    /// the event loop reports the socket again while connections are pending.
    pub fn on_readable(&mut self) {
        match self.socket.accept() {
            Ok((connection, peer)) => match self.on_connection.as_mut() {
                Some(callback) => callback(connection, peer),
                None => {
                    tracing::debug!(%peer, "no connection callback; closing");
                    drop(connection);
                }
            },
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                tracing::debug!(fd = self.socket.as_raw_fd(), "spurious accept readiness");
            }
            Err(error) => {
                tracing::error!(fd = self.socket.as_raw_fd(), %error, "accept failed");

                if matches!(error.raw_os_error(), Some(EMFILE | ENFILE)) {
                    self.shed_pending_connection();
                }
            }
        }
    }

    fn shed_pending_connection(&mut self) {
        tracing::warn!(
            fd = self.socket.as_raw_fd(),
            "descriptor table exhausted; discarding one pending connection"
        );

        drop(self.reserve.take());

        match self.socket.accept() {
            Ok((connection, peer)) => {
                tracing::warn!(%peer, "connection dropped for lack of descriptors");
                drop(connection);
            }
            Err(error) => {
                tracing::error!(%error, "accept with freed descriptor failed");
            }
        }

        match open_reserve() {
            Ok(reserve) => self.reserve = Some(reserve),
            Err(error) => tracing::error!(%error, "failed to reopen reserve descriptor"),
        }
    }
}

impl<R: Registry> Drop for Acceptor<R> {
    fn drop(&mut self) {
        if self.listening
            && let Err(error) = self.registry.deregister(self.socket.as_raw_fd())
        {
            tracing::warn!(%error, "failed to deregister listening socket");
        }
    }
}

fn open_reserve() -> io::Result<OwnedFd> {
    let file_descriptor = unsafe { open(c"/dev/null".as_ptr(), O_RDONLY | O_CLOEXEC) };
    if file_descriptor < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(unsafe { OwnedFd::from_raw_fd(file_descriptor) })
}
