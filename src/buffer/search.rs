//! Pattern and line lookup over a buffer's readable bytes.

use super::Buffer;
use crate::error::{Error, Result};

impl Buffer {
    /// Returns the offset of the first occurrence of `needle` in the readable
    /// bytes, relative to the read cursor.
    ///
    /// A plain first-byte scan followed by a full compare; buffers holding
    /// protocol lines are short enough that this beats a preprocessing search.
    /// An empty needle is never found.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        let data = self.data();
        let (&first, _) = needle.split_first()?;
        let mut search = 0;

        while search < data.len() {
            let position = search + data[search..].iter().position(|&byte| byte == first)?;

            if position + needle.len() > data.len() {
                return None;
            }

            if &data[position..position + needle.len()] == needle {
                return Some(position);
            }

            search = position + 1;
        }

        None
    }

    /// Removes one line from the front of the buffer.
    ///
    /// A line ends at the first `\n` or `\r`. The pairs `\r\n` and `\n\r`
    /// count as a single terminator. The terminator is drained but not
    /// returned. `Ok(None)` means no complete line is buffered yet; the
    /// buffer is left untouched so the caller can read more and retry.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let data = self.data();
        let Some(end) = data.iter().position(|&byte| is_line_end(byte)) else {
            return Ok(None);
        };

        let mut line = Vec::new();
        line.try_reserve_exact(end)
            .map_err(|_| Error::OutOfMemory { requested: end })?;
        line.extend_from_slice(&data[..end]);

        let mut consumed = end + 1;
        if let Some(&next) = data.get(end + 1)
            && is_line_end(next)
            && next != data[end]
        {
            consumed += 1;
        }

        self.drain(consumed);

        Ok(Some(line))
    }
}

fn is_line_end(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}
