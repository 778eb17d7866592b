//! Single-shot descriptor I/O for [`Buffer`].
//!
//! Both directions issue exactly one `read(2)` or `write(2)` per call and
//! hand the raw outcome back: a positive count, `Ok(0)` for end of stream,
//! or the OS error. `EAGAIN` comes back as an error for which
//! [`Error::is_would_block`](crate::Error::is_would_block) is true.

use super::Buffer;
use crate::error::Result;

use libc::{FIONREAD, c_int, ioctl, read, write};
use std::io;
use std::os::fd::RawFd;

/// Read size used when the kernel cannot say how much is pending.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Asks the kernel how many bytes are waiting on `file_descriptor`.
pub fn pending_bytes(file_descriptor: RawFd) -> Option<usize> {
    let mut pending: c_int = 0;
    let result = unsafe { ioctl(file_descriptor, FIONREAD, &mut pending as *mut c_int) };

    if result < 0 {
        return None;
    }

    usize::try_from(pending).ok()
}

impl Buffer {
    /// Reads once from `file_descriptor` into the free tail.
    ///
    /// The read size is the pending byte count reported by the kernel, or
    /// [`DEFAULT_READ_CHUNK`] when that is unknown. Without a `size_hint` a
    /// large backlog is capped at four times the current capacity (never
    /// below the default chunk) so one call cannot balloon the buffer. A
    /// `size_hint` is clamped into `1..=` that size.
    pub fn read_from(&mut self, file_descriptor: RawFd, size_hint: Option<usize>) -> Result<usize> {
        let old_len = self.len();
        let amount = read_size(pending_bytes(file_descriptor), size_hint, self.capacity());

        self.reserve(amount)?;

        let tail = self.region.tail_mut();
        let result = unsafe { read(file_descriptor, tail.as_mut_ptr().cast(), amount) };

        if result < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let count = result as usize;
        if count == 0 {
            return Ok(0);
        }

        self.region.len += count;
        self.notify(old_len, self.region.len);

        Ok(count)
    }

    /// Writes as much of the readable region as `file_descriptor` accepts in
    /// one call, then drains exactly that much.
    pub fn write_to(&mut self, file_descriptor: RawFd) -> Result<usize> {
        let data = self.data();
        let result = unsafe { write(file_descriptor, data.as_ptr().cast(), data.len()) };

        if result < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let count = result as usize;
        self.drain(count);

        Ok(count)
    }
}

fn read_size(pending: Option<usize>, size_hint: Option<usize>, capacity: usize) -> usize {
    let Some(pending) = pending.filter(|&pending| pending > 0) else {
        return match size_hint {
            Some(hint) => hint.clamp(1, DEFAULT_READ_CHUNK),
            None => DEFAULT_READ_CHUNK,
        };
    };

    let mut available = pending;
    if available > DEFAULT_READ_CHUNK && size_hint.is_none_or(|hint| available > hint) {
        available = available
            .min(capacity.saturating_mul(4))
            .max(DEFAULT_READ_CHUNK);
    }

    match size_hint {
        Some(hint) => hint.clamp(1, available),
        None => available,
    }
}
