// logtail - core/scan.rs
//
// Backward chunked scan with boundary-safe line reassembly.
//
// The scanner walks a cursor from end-of-source toward offset 0 in fixed
// steps, prepending each chunk to a pending buffer. Lines are cut off the
// *end* of that buffer at the last '\n'; bytes before the first delimiter in
// the buffer stay pending because the line they belong to may continue in
// the next (earlier) chunk. Only when the cursor reaches 0 is the remainder
// flushed as the first line of the source.
//
// Line rules:
//   - '\n' delimits lines.
//   - One terminal '\n' at end of source ends the last line; it does not
//     open an empty trailing line.
//   - A trailing '\r' is stripped at decode time (CRLF sources).

use crate::core::source::ByteSource;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::io;

// =============================================================================
// Pending buffer
// =============================================================================

/// Bytes read but not yet resolved into complete lines.
///
/// Supports prepend at the front and "split at last delimiter" at the back,
/// both proportional to the bytes moved rather than the buffer size.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: VecDeque<u8>,
    /// Bytes at the back of the buffer already searched and known to contain
    /// no delimiter. Saves rescanning a long line on every prepend.
    clean_tail: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `chunk` before the current contents.
    pub fn prepend(&mut self, chunk: &[u8]) {
        self.bytes.reserve(chunk.len());
        for &b in chunk.iter().rev() {
            self.bytes.push_front(b);
        }
    }

    /// Remove and return the bytes after the last '\n', dropping the
    /// delimiter. `None` when the buffer holds no delimiter.
    pub fn pop_last_line(&mut self) -> Option<Vec<u8>> {
        let search_end = self.bytes.len() - self.clean_tail;
        match self.bytes.range(..search_end).rposition(|&b| b == b'\n') {
            Some(pos) => {
                let line = self.bytes.split_off(pos + 1);
                self.bytes.pop_back();
                self.clean_tail = 0;
                Some(Vec::from(line))
            }
            None => {
                self.clean_tail = self.bytes.len();
                None
            }
        }
    }

    /// Drain everything left; used once the cursor reaches offset 0.
    pub fn take_all(&mut self) -> Vec<u8> {
        self.clean_tail = 0;
        Vec::from(std::mem::take(&mut self.bytes))
    }
}

// =============================================================================
// Scanner
// =============================================================================

/// Cursor + pending buffer over one byte source.
///
/// Owned by exactly one retrieval. Yields raw line bytes newest-first.
pub struct BackwardScanner<S> {
    source: S,
    /// Offset of the first byte already read; decreases toward 0.
    cursor: u64,
    pending: LineBuffer,
    chunk: Vec<u8>,
    chunk_size: usize,
    chunks_read: u64,
    exhausted: bool,
}

impl<S: ByteSource> BackwardScanner<S> {
    /// Position a scanner at the end of `source`. A `chunk_size` of 0 is
    /// treated as 1.
    pub fn new(source: S, chunk_size: usize) -> Self {
        let size = source.size();
        Self {
            source,
            cursor: size,
            pending: LineBuffer::new(),
            chunk: Vec::new(),
            chunk_size: chunk_size.max(1),
            chunks_read: 0,
            exhausted: size == 0,
        }
    }

    /// Next complete line, newest-first. `Ok(None)` once the first line of
    /// the source has been returned.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            if let Some(line) = self.pending.pop_last_line() {
                return Ok(Some(line));
            }
            if self.cursor == 0 {
                self.exhausted = true;
                return Ok(Some(self.pending.take_all()));
            }
            self.read_chunk()?;
        }
    }

    fn read_chunk(&mut self) -> io::Result<()> {
        let is_first = self.cursor == self.source.size();
        let step = (self.chunk_size as u64).min(self.cursor);
        let offset = self.cursor - step;
        let len = step as usize;

        self.chunk.resize(len, 0);
        self.source.read_at(offset, &mut self.chunk[..len])?;
        self.chunks_read += 1;
        self.cursor = offset;

        let mut data: &[u8] = &self.chunk[..len];
        if is_first {
            if let Some(stripped) = data.strip_suffix(b"\n") {
                data = stripped;
            }
        }
        self.pending.prepend(data);
        Ok(())
    }

    /// Number of `read_at` calls issued so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks_read
    }

    /// Current scan position.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

/// Decode one line lossily, stripping a trailing '\r'.
///
/// The flag is true when invalid UTF-8 was replaced.
pub fn decode_line(bytes: &[u8]) -> (String, bool) {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => (s.to_owned(), false),
        Cow::Owned(s) => (s, true),
    }
}
