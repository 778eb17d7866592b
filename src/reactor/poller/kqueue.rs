use super::common::Interest;
use super::Registry;
use crate::reactor::event::Event;

use libc::{
    EV_ADD, EV_DELETE, EV_ENABLE, EV_EOF, EV_ERROR, EVFILT_READ, EVFILT_WRITE, kevent, kqueue,
};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::time::Duration;

const MAX_EVENTS: usize = 64;

/// kqueue instance used level-triggered (no `EV_CLEAR`).
#[derive(Debug)]
pub struct KqueuePoller {
    kqueue: OwnedFd,
}

impl KqueuePoller {
    pub fn new() -> io::Result<Self> {
        let kqueue = unsafe { kqueue() };
        if kqueue < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            kqueue: unsafe { OwnedFd::from_raw_fd(kqueue) },
        })
    }

    /// Waits for readiness and replaces the contents of `events` with what
    /// was reported. `None` waits indefinitely.
    pub fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<usize> {
        let mut raw: [kevent; MAX_EVENTS] = unsafe { mem::zeroed() };
        let timespec = timeout.map(|duration| libc::timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        });
        let timespec_ptr = timespec
            .as_ref()
            .map_or(ptr::null(), |timespec| timespec as *const libc::timespec);

        events.clear();

        let count = unsafe {
            kevent(
                self.kqueue.as_raw_fd(),
                ptr::null(),
                0,
                raw.as_mut_ptr(),
                MAX_EVENTS as i32,
                timespec_ptr,
            )
        };

        if count < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }

            return Err(error);
        }

        // kqueue reports read and write readiness as separate entries.
        for entry in raw.iter().take(count as usize) {
            let file_descriptor = entry.ident as RawFd;
            let index = match events
                .iter()
                .position(|event| event.file_descriptor == file_descriptor)
            {
                Some(index) => index,
                None => {
                    events.push(Event::new(file_descriptor));
                    events.len() - 1
                }
            };

            let event = &mut events[index];
            match entry.filter {
                EVFILT_READ => event.readable = true,
                EVFILT_WRITE => event.writable = true,
                _ => {}
            }
            event.hangup |= entry.flags & EV_EOF != 0;
            event.error |= entry.flags & EV_ERROR != 0;
        }

        Ok(events.len())
    }

    fn apply(&self, changes: &[kevent]) -> io::Result<()> {
        let result = unsafe {
            kevent(
                self.kqueue.as_raw_fd(),
                changes.as_ptr(),
                changes.len() as i32,
                ptr::null_mut(),
                0,
                ptr::null(),
            )
        };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

fn change(file_descriptor: RawFd, filter: i16, flags: u16) -> kevent {
    let mut event: kevent = unsafe { mem::zeroed() };
    event.ident = file_descriptor as usize;
    event.filter = filter;
    event.flags = flags;
    event
}

impl Registry for KqueuePoller {
    fn register(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        let mut changes = Vec::with_capacity(2);

        if interest.read {
            changes.push(change(file_descriptor, EVFILT_READ, EV_ADD | EV_ENABLE));
        }

        if interest.write {
            changes.push(change(file_descriptor, EVFILT_WRITE, EV_ADD | EV_ENABLE));
        }

        self.apply(&changes)
    }

    fn reregister(&self, file_descriptor: RawFd, interest: Interest) -> io::Result<()> {
        let read_flags = if interest.read { EV_ADD | EV_ENABLE } else { EV_DELETE };
        let write_flags = if interest.write { EV_ADD | EV_ENABLE } else { EV_DELETE };

        // Deleting a filter that was never added reports ENOENT; that is fine here.
        for update in [
            change(file_descriptor, EVFILT_READ, read_flags),
            change(file_descriptor, EVFILT_WRITE, write_flags),
        ] {
            match self.apply(&[update]) {
                Err(error) if error.raw_os_error() == Some(libc::ENOENT) => {}
                other => other?,
            }
        }

        Ok(())
    }

    fn deregister(&self, file_descriptor: RawFd) -> io::Result<()> {
        self.reregister(
            file_descriptor,
            Interest {
                read: false,
                write: false,
            },
        )
    }
}
