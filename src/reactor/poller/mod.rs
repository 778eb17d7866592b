//! Readiness registration.
//!
//! [`Registry`] is the seam between the network primitives and whatever
//! event loop drives them: the acceptor only ever registers and deregisters
//! its listening descriptor through it. [`Poller`] is the platform's
//! level-triggered implementation (epoll on Linux, kqueue on macOS).

mod common;

#[cfg(target_os = "linux")]
mod epoll;
#[cfg(any(target_os = "macos", target_os = "ios"))]
mod kqueue;

pub use common::Interest;

#[cfg(target_os = "linux")]
pub use epoll::EpollPoller as Poller;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use kqueue::KqueuePoller as Poller;

use std::io;
use std::os::fd::RawFd;
use std::rc::Rc;
use std::sync::Arc;

/// Registration half of a readiness notifier.
pub trait Registry {
    /// Starts reporting `file_descriptor` for `interest`.
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()>;

    /// Replaces the interest of an already registered descriptor.
    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()>;

    /// Stops reporting `file_descriptor`. Call before closing it.
    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()>;
}

impl<R: Registry + ?Sized> Registry for &R {
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).register(file_descriptor, interest)
    }

    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).reregister(file_descriptor, interest)
    }

    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()> {
        (**self).deregister(file_descriptor)
    }
}

impl<R: Registry + ?Sized> Registry for Rc<R> {
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).register(file_descriptor, interest)
    }

    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).reregister(file_descriptor, interest)
    }

    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()> {
        (**self).deregister(file_descriptor)
    }
}

impl<R: Registry + ?Sized> Registry for Arc<R> {
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).register(file_descriptor, interest)
    }

    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        (**self).reregister(file_descriptor, interest)
    }

    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()> {
        (**self).deregister(file_descriptor)
    }
}
