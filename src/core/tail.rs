// logtail - core/tail.rs
//
// Tail retrieval: the last N lines of a log file, optionally keyword
// filtered, without reading more of the file than necessary.
//
// Size tiers (policy, evaluated once per call on the size sampled at open):
//   1. size == 0                    -> no lines
//   2. size >  max_source_bytes     -> SourceTooLarge, before any read
//   3. size <  small-file threshold -> read in full, scan as one chunk
//   4. otherwise                    -> scan backwards from the end in
//                                      chunk_size reads
//
// Tiers 3 and 4 run the same scanner, so they cannot disagree on line
// boundaries. Both stop as soon as `line_limit` matching lines are found.
//
// Files are read with positioned reads, never mapped: a log truncated under
// a running scan (copytruncate rotation) surfaces as `TailError::Io`
// instead of a fault. The file handle is owned by the scan value and
// released when it is dropped, on every return path.

use crate::core::filter::KeywordFilter;
use crate::core::model::validate_line_limit;
use crate::core::scan::{decode_line, BackwardScanner};
use crate::core::source::{ByteSource, FileSource, SliceSource};
use crate::util::constants;
use crate::util::error::TailError;
use crate::util::logging::preview;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Instant;

// =============================================================================
// Configuration
// =============================================================================

/// Retrieval policy. Built once from configuration, never per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    /// Bytes per backward read.
    pub chunk_size: usize,
    /// Small-file threshold as a multiple of `chunk_size`.
    pub small_file_chunks: usize,
    /// Sources above this size are rejected.
    pub max_source_bytes: u64,
    /// Largest accepted `line_limit`.
    pub max_lines: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            small_file_chunks: constants::DEFAULT_SMALL_FILE_CHUNKS,
            max_source_bytes: constants::DEFAULT_MAX_SOURCE_BYTES,
            max_lines: constants::DEFAULT_MAX_LINES,
        }
    }
}

impl TailConfig {
    /// Sources strictly below this many bytes are read in full.
    pub fn small_file_threshold(&self) -> u64 {
        (self.chunk_size as u64).saturating_mul(self.small_file_chunks as u64)
    }
}

// =============================================================================
// Streaming scan
// =============================================================================

/// Lazy, newest-first sequence of matching lines.
///
/// Finite: ends after `line_limit` matches or at the start of the source.
/// Not restartable; a fresh scan needs a fresh source. Lines are yielded in
/// the order they are resolved, i.e. the most recent line first.
pub struct TailStream<S> {
    scanner: BackwardScanner<S>,
    filter: KeywordFilter,
    remaining: usize,
    degraded: usize,
    done: bool,
}

impl<S: ByteSource> TailStream<S> {
    pub fn new(source: S, line_limit: usize, filter: KeywordFilter, chunk_size: usize) -> Self {
        Self {
            scanner: BackwardScanner::new(source, chunk_size),
            filter,
            remaining: line_limit,
            degraded: 0,
            done: line_limit == 0,
        }
    }

    /// Read calls issued against the source so far.
    pub fn chunks_read(&self) -> u64 {
        self.scanner.chunks_read()
    }

    /// Lines seen so far that contained invalid UTF-8 and were decoded with
    /// replacement characters.
    pub fn degraded_lines(&self) -> usize {
        self.degraded
    }
}

impl<S: ByteSource> Iterator for TailStream<S> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.scanner.next_line() {
                Ok(Some(bytes)) => {
                    let (line, lossy) = decode_line(&bytes);
                    if lossy {
                        self.degraded += 1;
                    }
                    if self.filter.matches(&line) {
                        self.remaining -= 1;
                        self.done = self.remaining == 0;
                        return Some(Ok(line));
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Eager scan over any source: the last `line_limit` matching lines,
/// oldest-first.
pub fn tail_source<S: ByteSource>(
    source: S,
    line_limit: usize,
    keyword: Option<&str>,
    chunk_size: usize,
) -> io::Result<Vec<String>> {
    let mut stream = TailStream::new(source, line_limit, KeywordFilter::new(keyword), chunk_size);
    collect_oldest_first(&mut stream)
}

fn collect_oldest_first<S: ByteSource>(stream: &mut TailStream<S>) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in stream.by_ref() {
        lines.push(line?);
    }
    lines.reverse();
    Ok(lines)
}

// =============================================================================
// TailReader
// =============================================================================

/// Which size tier served a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTier {
    Empty,
    WholeFile,
    Chunked,
}

/// File-backed tail retrieval with the configured size policy.
///
/// Stateless between calls; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct TailReader {
    config: TailConfig,
}

impl TailReader {
    pub fn new(config: TailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// The last `line_limit` lines of `path` (matching `keyword` if given),
    /// oldest-first.
    ///
    /// `path` is assumed to be already resolved and safe; this only
    /// classifies size and read failures.
    pub fn tail(
        &self,
        path: &Path,
        line_limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<String>, TailError> {
        validate_line_limit(line_limit, self.config.max_lines)?;
        let (file, size) = open_source(path)?;
        self.check_size(path, size)?;
        self.scan_opened(path, file, size, line_limit, keyword)
    }

    /// Scan an already-opened file whose size was sampled at open.
    ///
    /// Reads beyond the current end of the file (it shrank since `size` was
    /// sampled) fail with `TailError::Io`.
    fn scan_opened(
        &self,
        path: &Path,
        file: File,
        size: u64,
        line_limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<String>, TailError> {
        let started = Instant::now();
        let filter = KeywordFilter::new(keyword);
        let (tier, result) = if size == 0 {
            (ReadTier::Empty, Ok((Vec::new(), 0, 0)))
        } else if size < self.config.small_file_threshold() {
            (ReadTier::WholeFile, read_whole(file, size, line_limit, filter))
        } else {
            (
                ReadTier::Chunked,
                read_chunked(file, size, line_limit, filter, self.config.chunk_size),
            )
        };

        let (lines, chunks, degraded) = result.map_err(|source| TailError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if degraded > 0 {
            tracing::debug!(
                file = %path.display(),
                degraded,
                "Decoded lines containing invalid UTF-8 with replacement"
            );
        }
        tracing::debug!(
            file = %path.display(),
            size,
            ?tier,
            chunks,
            lines = lines.len(),
            newest = lines.last().map(|l| preview(l)).unwrap_or(""),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tail retrieval complete"
        );
        Ok(lines)
    }

    /// Streaming variant of [`tail`](Self::tail): lines are produced
    /// newest-first as the scan resolves them.
    ///
    /// Size and open failures are reported here; read failures surface as
    /// `Err` items from the stream.
    pub fn stream(
        &self,
        path: &Path,
        line_limit: usize,
        keyword: Option<&str>,
    ) -> Result<TailStream<FileSource>, TailError> {
        validate_line_limit(line_limit, self.config.max_lines)?;
        let (file, size) = open_source(path)?;
        self.check_size(path, size)?;

        tracing::debug!(file = %path.display(), size, line_limit, "Tail stream opened");
        Ok(TailStream::new(
            FileSource::new(file, size),
            line_limit,
            KeywordFilter::new(keyword),
            self.config.chunk_size,
        ))
    }

    fn check_size(&self, path: &Path, size: u64) -> Result<(), TailError> {
        if size > self.config.max_source_bytes {
            tracing::warn!(
                file = %path.display(),
                size,
                max = self.config.max_source_bytes,
                "Rejected oversized source"
            );
            return Err(TailError::SourceTooLarge {
                path: path.to_path_buf(),
                size,
                max: self.config.max_source_bytes,
            });
        }
        Ok(())
    }
}

type ScanOutput = (Vec<String>, u64, usize);

fn read_whole(
    mut file: File,
    size: u64,
    line_limit: usize,
    filter: KeywordFilter,
) -> io::Result<ScanOutput> {
    let mut bytes = vec![0u8; size as usize];
    file.read_exact(&mut bytes)?;
    let chunk = bytes.len().max(1);
    let mut stream = TailStream::new(SliceSource::new(bytes), line_limit, filter, chunk);
    let lines = collect_oldest_first(&mut stream)?;
    Ok((lines, stream.chunks_read(), stream.degraded_lines()))
}

fn read_chunked(
    file: File,
    size: u64,
    line_limit: usize,
    filter: KeywordFilter,
    chunk_size: usize,
) -> io::Result<ScanOutput> {
    let mut stream = TailStream::new(FileSource::new(file, size), line_limit, filter, chunk_size);
    let lines = collect_oldest_first(&mut stream)?;
    Ok((lines, stream.chunks_read(), stream.degraded_lines()))
}

/// Open `path` read-only and sample its size.
///
/// Missing files, directories and other non-regular files are all
/// `SourceNotFound`.
fn open_source(path: &Path) -> Result<(File, u64), TailError> {
    let not_found = |source: Option<io::Error>| TailError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| not_found(Some(e)))?;
    let meta = file.metadata().map_err(|e| not_found(Some(e)))?;
    if !meta.is_file() {
        return Err(not_found(None));
    }
    Ok((file, meta.len()))
}
