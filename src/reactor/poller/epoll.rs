use super::common::Interest;
use super::Registry;
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, EPOLLPRI, EPOLLRDHUP, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

const MAX_EVENTS: usize = 64;

/// Level-triggered epoll instance.
///
/// A descriptor stays reported for as long as it is ready, so a listener with
/// a non-empty accept queue keeps firing until the queue is drained.
#[derive(Debug)]
pub struct EpollPoller {
    epoll: OwnedFd,
}

impl EpollPoller {
    pub fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            epoll: unsafe { OwnedFd::from_raw_fd(epoll) },
        })
    }

    /// Waits for readiness and replaces the contents of `events` with what
    /// was reported. `None` waits indefinitely.
    ///
    /// An interrupted wait reports zero events.
    pub fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize> {
        let mut raw = [epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

        events.clear();

        let count = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                raw.as_mut_ptr(),
                MAX_EVENTS as i32,
                timeout_millis(timeout),
            )
        };

        if count < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }

            return Err(error);
        }

        for entry in raw.iter().take(count as usize) {
            let bits = entry.events;
            let mut event = Event::new(entry.u64 as RawFd);

            event.readable = bits & (EPOLLIN | EPOLLPRI) as u32 != 0;
            event.writable = bits & EPOLLOUT as u32 != 0;
            event.hangup = bits & (EPOLLHUP | EPOLLRDHUP) as u32 != 0;
            event.error = bits & EPOLLERR as u32 != 0;

            events.push(event);
        }

        Ok(events.len())
    }

    fn control(
        &self,
        operation: i32,
        file_descriptor: RawFd,
        interest: Interest,
    ) -> io::Result<()> {
        let mut flags = 0u32;
        if interest.read {
            flags |= (EPOLLIN | EPOLLRDHUP) as u32;
        }
        if interest.write {
            flags |= EPOLLOUT as u32;
        }

        let mut event = epoll_event {
            events: flags,
            u64: file_descriptor as u64,
        };

        let result =
            unsafe { epoll_ctl(self.epoll.as_raw_fd(), operation, file_descriptor, &mut event) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl Registry for EpollPoller {
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_ADD, file_descriptor, interest)
    }

    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        self.control(EPOLL_CTL_MOD, file_descriptor, interest)
    }

    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()> {
        let result = unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                file_descriptor,
                ptr::null_mut(),
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(duration) => {
            let millis = duration.as_nanos().div_ceil(1_000_000);
            millis.min(i32::MAX as u128) as i32
        }
    }
}
