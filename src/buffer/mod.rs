//! Growable I/O byte buffer.
//!
//! A [`Buffer`] owns one contiguous allocation and tracks the readable bytes
//! inside it with two numbers: `misalign`, the bytes already consumed in
//! front of the read cursor, and `len`, the readable bytes after it.
//!
//! ```text
//! 0          misalign          misalign + len          capacity
//! |-consumed-|-------readable-------|--------free---------|
//! ```
//!
//! Draining only moves the cursor. Consumed space is reclaimed either when
//! the buffer drains to empty or when a later append needs it, in which case
//! the readable bytes are moved back to the front before any reallocation.
//!
//! - [`search`]: pattern and line lookup over the readable region
//! - [`io`]: single-shot reads from and writes to raw descriptors

pub mod io;
pub mod search;

use crate::error::{Error, Result};

use std::fmt;
use std::io as stdio;
use std::mem;
use std::sync::{Arc, Weak};

/// Smallest allocation the buffer ever makes.
pub const MIN_CAPACITY: usize = 256;

/// Bytes guaranteed free before the first formatting attempt.
const FORMAT_RESERVE: usize = 64;

/// A correctly sized second attempt always fits.
const FORMAT_ATTEMPTS: usize = 2;

/// Receives `(old_len, new_len)` whenever a buffer's readable length changes.
///
/// A buffer holds at most one observer, and only weakly: dropping the last
/// `Arc` detaches it.
pub trait BufferObserver: Send + Sync {
    fn on_change(&self, old_len: usize, new_len: usize);
}

impl<F> BufferObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_change(&self, old_len: usize, new_len: usize) {
        self(old_len, new_len)
    }
}

/// The allocation and cursors, kept apart from the observer so a transfer
/// can exchange storage without exchanging observers.
#[derive(Default)]
struct Region {
    storage: Vec<u8>,
    misalign: usize,
    len: usize,
}

impl Region {
    fn used(&self) -> usize {
        self.misalign + self.len
    }

    fn readable(&self) -> &[u8] {
        &self.storage[self.misalign..self.used()]
    }

    fn tail_mut(&mut self) -> &mut [u8] {
        let used = self.used();
        &mut self.storage[used..]
    }

    fn compact(&mut self) {
        if self.misalign == 0 {
            return;
        }

        let used = self.used();
        self.storage.copy_within(self.misalign..used, 0);
        self.misalign = 0;
    }
}

/// A contiguous byte buffer with a read cursor and amortised O(1) appends.
///
/// Not synchronised: a buffer belongs to one thread at a time.
#[derive(Default)]
pub struct Buffer {
    region: Region,
    observer: Option<Weak<dyn BufferObserver>>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.region.len)
            .field("misalign", &self.region.misalign)
            .field("capacity", &self.region.storage.len())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl Buffer {
    /// Creates an empty buffer. Nothing is allocated until the first append.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of readable bytes.
    pub fn len(&self) -> usize {
        self.region.len
    }

    pub fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// Total bytes allocated, consumed and free space included.
    pub fn capacity(&self) -> usize {
        self.region.storage.len()
    }

    /// Consumed bytes still sitting in front of the read cursor.
    pub fn misalign(&self) -> usize {
        self.region.misalign
    }

    /// The readable bytes.
    pub fn data(&self) -> &[u8] {
        self.region.readable()
    }

    /// Attaches `observer`, replacing any previous one.
    pub fn set_observer<O>(&mut self, observer: &Arc<O>)
    where
        O: BufferObserver + 'static,
    {
        let observer: Weak<O> = Arc::downgrade(observer);
        self.observer = Some(observer);
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    fn notify(&self, old_len: usize, new_len: usize) {
        if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
            observer.on_change(old_len, new_len);
        }
    }

    /// Makes room for `additional` more bytes after the readable region.
    ///
    /// Consumed space is reclaimed by compaction when it alone covers the
    /// request; otherwise the allocation grows to the next power of two
    /// (at least [`MIN_CAPACITY`]) that holds everything.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let region = &mut self.region;
        let need = region
            .used()
            .checked_add(additional)
            .ok_or(Error::OutOfMemory {
                requested: usize::MAX,
            })?;

        if region.storage.len() >= need {
            return Ok(());
        }

        if region.misalign >= additional {
            region.compact();
            return Ok(());
        }

        let target = grown_capacity(need).ok_or(Error::OutOfMemory { requested: need })?;

        region.compact();
        region
            .storage
            .try_reserve_exact(target - region.storage.len())
            .map_err(|_| Error::OutOfMemory { requested: target })?;
        region.storage.resize(target, 0);

        Ok(())
    }

    /// Copies `bytes` after the readable region.
    ///
    /// On failure the buffer is unchanged.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let old_len = self.region.len;

        self.reserve(bytes.len())?;
        self.region.tail_mut()[..bytes.len()].copy_from_slice(bytes);
        self.region.len += bytes.len();

        if !bytes.is_empty() {
            self.notify(old_len, self.region.len);
        }

        Ok(())
    }

    /// Formats `args` straight into the free tail and returns the bytes added.
    ///
    /// ```
    /// use netbase::Buffer;
    ///
    /// let mut buffer = Buffer::new();
    /// buffer.append_fmt(format_args!("HTTP/1.1 {} {}\r\n", 200, "OK")).unwrap();
    ///
    /// assert_eq!(buffer.data(), b"HTTP/1.1 200 OK\r\n");
    /// ```
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let old_len = self.region.len;

        self.reserve(FORMAT_RESERVE)?;

        for _ in 0..FORMAT_ATTEMPTS {
            let mut writer = TailWriter::new(self.region.tail_mut());
            fmt::write(&mut writer, args).map_err(|_| Error::Format)?;

            let required = writer.required;
            if !writer.overflowed {
                self.region.len += required;
                if required > 0 {
                    self.notify(old_len, self.region.len);
                }

                return Ok(required);
            }

            // Room for the rendered text plus a terminator byte.
            self.reserve(required + 1)?;
        }

        Err(Error::Format)
    }

    /// Moves up to `out.len()` readable bytes into `out` and drains them.
    pub fn consume(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.region.len);

        out[..count].copy_from_slice(&self.region.readable()[..count]);
        self.drain(count);

        count
    }

    /// Discards `count` readable bytes from the front without moving data.
    pub fn drain(&mut self, count: usize) {
        let old_len = self.region.len;

        if count >= old_len {
            self.region.misalign = 0;
            self.region.len = 0;
        } else {
            self.region.misalign += count;
            self.region.len -= count;
        }

        if self.region.len != old_len {
            self.notify(old_len, self.region.len);
        }
    }

    /// Moves every readable byte into `destination`, leaving `self` empty.
    ///
    /// An empty destination simply takes over this buffer's allocation.
    /// Observers stay with their buffers and each sees its own length change.
    pub fn transfer_to(&mut self, destination: &mut Buffer) -> Result<()> {
        if destination.is_empty() {
            let moved = self.region.len;

            mem::swap(&mut self.region, &mut destination.region);

            if moved != 0 {
                self.notify(moved, 0);
                destination.notify(0, moved);
            }

            return Ok(());
        }

        destination.append(self.region.readable())?;
        self.drain(self.region.len);

        Ok(())
    }
}

fn grown_capacity(need: usize) -> Option<usize> {
    need.checked_next_power_of_two()
        .map(|capacity| capacity.max(MIN_CAPACITY))
}

/// Writes into a fixed slice and keeps counting once it no longer fits.
struct TailWriter<'a> {
    tail: &'a mut [u8],
    required: usize,
    overflowed: bool,
}

impl<'a> TailWriter<'a> {
    fn new(tail: &'a mut [u8]) -> Self {
        Self {
            tail,
            required: 0,
            overflowed: false,
        }
    }
}

impl fmt::Write for TailWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let end = self.required + bytes.len();

        if !self.overflowed && end <= self.tail.len() {
            self.tail[self.required..end].copy_from_slice(bytes);
        } else {
            self.overflowed = true;
        }

        self.required = end;

        Ok(())
    }
}

impl stdio::Write for Buffer {
    fn write(&mut self, bytes: &[u8]) -> stdio::Result<usize> {
        self.append(bytes).map_err(into_io_error)?;

        Ok(bytes.len())
    }

    fn flush(&mut self) -> stdio::Result<()> {
        Ok(())
    }
}

impl stdio::Read for Buffer {
    fn read(&mut self, out: &mut [u8]) -> stdio::Result<usize> {
        Ok(self.consume(out))
    }
}

fn into_io_error(error: Error) -> stdio::Error {
    match error {
        Error::Io(error) => error,
        Error::OutOfMemory { .. } => stdio::Error::new(stdio::ErrorKind::OutOfMemory, error),
        other => stdio::Error::other(other),
    }
}
