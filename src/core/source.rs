// logtail - core/source.rs
//
// Random-access byte sources for the backward scan.
//
// A source's size is sampled once when it is opened. Appends made by a log
// writer after that point are invisible to the retrieval in progress; the
// next retrieval opens a fresh view and sees them.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// A fixed-size, readable byte sequence.
pub trait ByteSource {
    /// Size in bytes, fixed for the lifetime of this value.
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with `UnexpectedEof` if the range extends past the end of the
    /// underlying data (for example when the file was truncated mid-scan).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
}

// =============================================================================
// File handle
// =============================================================================

/// Read-only file handle read with seek + read_exact.
///
/// Backs the chunked tier and the streaming reader. A file that shrinks
/// after its size was sampled yields `UnexpectedEof` on the next read.
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    /// Wrap an open file whose size the caller has already sampled.
    pub fn new(file: File, size: u64) -> Self {
        Self { file, size }
    }
}

impl ByteSource for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }
}

// =============================================================================
// In-memory bytes
// =============================================================================

/// Bytes already held in memory. Backs the small-file tier.
pub struct SliceSource<B> {
    bytes: B,
}

impl<B: AsRef<[u8]>> SliceSource<B> {
    pub fn new(bytes: B) -> Self {
        Self { bytes }
    }
}

impl<B: AsRef<[u8]>> ByteSource for SliceSource<B> {
    fn size(&self) -> u64 {
        self.bytes.as_ref().len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        copy_range(self.bytes.as_ref(), offset, buf)
    }
}

fn copy_range(data: &[u8], offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let start = usize::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset beyond address space"))?;
    let end = start
        .checked_add(buf.len())
        .filter(|&end| end <= data.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of source"))?;
    buf.copy_from_slice(&data[start..end]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_slice_source_reads_range() {
        let mut src = SliceSource::new(b"hello world".to_vec());
        let mut buf = [0u8; 5];
        src.read_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(src.size(), 11);
    }

    #[test]
    fn test_slice_source_past_end_is_eof() {
        let mut src = SliceSource::new(b"abc");
        let mut buf = [0u8; 4];
        let err = src.read_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_file_source_reads_range() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"line one\nline two\n").unwrap();
        tmp.flush().unwrap();

        let file = tmp.reopen().unwrap();
        let size = file.metadata().unwrap().len();
        let mut src = FileSource::new(file, size);
        assert_eq!(src.size(), 18);
        let mut buf = [0u8; 8];
        src.read_at(9, &mut buf).unwrap();
        assert_eq!(&buf, b"line two");
    }

    #[test]
    fn test_file_source_truncated_after_open_is_eof() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[b'x'; 16_384]).unwrap();
        tmp.flush().unwrap();

        let file = tmp.reopen().unwrap();
        let size = file.metadata().unwrap().len();
        let mut src = FileSource::new(file, size);
        tmp.as_file().set_len(0).unwrap();
        let mut buf = [0u8; 8192];
        let err = src.read_at(src.size() - 8192, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
