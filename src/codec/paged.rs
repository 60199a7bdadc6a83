//! Fixed-page file writer and reader.
//!
//! The writer buffers one page in memory, supports reserving header bytes
//! that are patched once a count is known, and flushes each page zero-padded
//! to exactly the configured size. The string property codec additionally
//! rewinds to the first page after its body is written; every other codec is
//! pure append. The reader mirrors this: each `next_page` call must produce
//! exactly one full page, and a bounds-checked cursor decodes it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec::header::{check_file_header, write_file_header, FILE_HEADER_LEN};
use crate::error::{PartError, Result};

/// Append-oriented page writer.
pub struct PageWriter {
    file: File,
    page: Vec<u8>,
    page_size: usize,
    pages_written: usize,
}

impl PageWriter {
    /// Creates (truncating) the file and writes the magic/version header.
    pub fn create(path: &Path, page_size: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        write_file_header(&mut file)?;
        Ok(Self {
            file,
            page: Vec::with_capacity(page_size),
            page_size,
            pages_written: 0,
        })
    }

    /// Bytes still free in the current page.
    pub fn remaining(&self) -> usize {
        self.page_size - self.page.len()
    }

    /// Pages flushed so far.
    pub fn pages_written(&self) -> usize {
        self.pages_written
    }

    fn ensure(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(PartError::Oversize("page write"));
        }
        Ok(())
    }

    /// Appends one byte to the current page.
    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.ensure(1)?;
        self.page.push(v);
        Ok(())
    }

    /// Appends a little-endian u32.
    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.ensure(4)?;
        self.page.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a little-endian u64.
    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.ensure(8)?;
        self.page.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a little-endian i64.
    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.ensure(8)?;
        self.page.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a little-endian f64.
    pub fn put_f64(&mut self, v: f64) -> Result<()> {
        self.ensure(8)?;
        self.page.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Appends a raw byte slice.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure(bytes.len())?;
        self.page.extend_from_slice(bytes);
        Ok(())
    }

    /// Reserves four bytes for a count to be patched later; returns the
    /// in-page offset to hand to [`PageWriter::patch_u32`].
    pub fn reserve_u32(&mut self) -> Result<usize> {
        let offset = self.page.len();
        self.put_u32(0)?;
        Ok(offset)
    }

    /// Overwrites previously reserved bytes in the still-buffered page.
    pub fn patch_u32(&mut self, offset: usize, v: u32) -> Result<()> {
        let end = offset + 4;
        if end > self.page.len() {
            return Err(PartError::Invalid(
                "patch offset outside the buffered page".into(),
            ));
        }
        self.page[offset..end].copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Flushes the current page to disk, zero-padding the unused tail, and
    /// starts a fresh one.
    pub fn next_page(&mut self) -> Result<()> {
        self.page.resize(self.page_size, 0);
        self.file.write_all(&self.page)?;
        self.page.clear();
        self.pages_written += 1;
        Ok(())
    }

    /// Seeks back so the next flushed page overwrites page zero. Only the
    /// string property codec uses this, to finalize its metadata page once
    /// body counts are known.
    pub fn rewind_to_first_page(&mut self) -> Result<()> {
        if !self.page.is_empty() {
            return Err(PartError::Invalid(
                "rewind with buffered page data".into(),
            ));
        }
        self.file.seek(SeekFrom::Start(FILE_HEADER_LEN as u64))?;
        Ok(())
    }

    /// Flushes any buffered partial page and syncs the file.
    pub fn finish(mut self) -> Result<()> {
        if !self.page.is_empty() {
            self.next_page()?;
        }
        self.file.sync_data()?;
        Ok(())
    }
}

/// Page-at-a-time reader over a part file.
pub struct PageReader {
    file: File,
    page: Vec<u8>,
    page_size: usize,
    version: u64,
}

impl PageReader {
    /// Opens the file and validates the magic/version header.
    pub fn open(path: &Path, page_size: usize) -> Result<Self> {
        let mut file = File::open(path)?;
        let version = check_file_header(&mut file)?;
        Ok(Self {
            file,
            page: Vec::new(),
            page_size,
            version,
        })
    }

    /// Format version read from the header.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reads the next page; anything short of a full page is corruption.
    pub fn next_page(&mut self) -> Result<()> {
        self.page.resize(self.page_size, 0);
        self.file
            .read_exact(&mut self.page)
            .map_err(|_| PartError::corruption("short page read"))?;
        Ok(())
    }

    /// Cursor over the current page.
    pub fn cursor(&self) -> PageCursor<'_> {
        PageCursor {
            data: &self.page,
            index: 0,
        }
    }
}

/// Bounds-checked decoding cursor over one page.
pub struct PageCursor<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> PageCursor<'a> {
    /// Bytes left on the page.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.index
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.index + len > self.data.len() {
            return Err(PartError::corruption("unexpected end of page"));
        }
        let start = self.index;
        self.index += len;
        Ok(&self.data[start..start + len])
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u32.
    pub fn get_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("slice has exactly 4 bytes");
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads a little-endian u64.
    pub fn get_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("slice has exactly 8 bytes");
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads a little-endian i64.
    pub fn get_i64(&mut self) -> Result<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("slice has exactly 8 bytes");
        Ok(i64::from_le_bytes(bytes))
    }

    /// Reads a little-endian f64.
    pub fn get_f64(&mut self) -> Result<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("slice has exactly 8 bytes");
        Ok(f64::from_le_bytes(bytes))
    }

    /// Reads a raw byte slice of the given length.
    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::header::UP_TO_DATE_VERSION;
    use tempfile::tempdir;

    const PAGE: usize = 128;

    #[test]
    fn write_and_read_pages() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("pages");

        let mut w = PageWriter::create(&path, PAGE).expect("create");
        w.put_u32(7).unwrap();
        w.put_u64(u64::MAX).unwrap();
        w.next_page().unwrap();
        w.put_bytes(b"tail").unwrap();
        assert_eq!(w.pages_written(), 1);
        w.finish().expect("finish");

        let mut r = PageReader::open(&path, PAGE).expect("open");
        assert_eq!(r.version(), UP_TO_DATE_VERSION);
        r.next_page().unwrap();
        let mut c = r.cursor();
        assert_eq!(c.get_u32().unwrap(), 7);
        assert_eq!(c.get_u64().unwrap(), u64::MAX);
        assert_eq!(c.remaining(), PAGE - 12);
        r.next_page().unwrap();
        let mut c = r.cursor();
        assert_eq!(c.get_bytes(4).unwrap(), b"tail");
        // zero padding fills the rest
        assert!(c.get_bytes(PAGE - 4).unwrap().iter().all(|&b| b == 0));
        assert!(r.next_page().is_err(), "no third page");
    }

    #[test]
    fn reserve_and_patch_backfills_count() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("patched");

        let mut w = PageWriter::create(&path, PAGE).expect("create");
        let off = w.reserve_u32().unwrap();
        w.put_u64(1).unwrap();
        w.put_u64(2).unwrap();
        w.patch_u32(off, 2).unwrap();
        w.finish().expect("finish");

        let mut r = PageReader::open(&path, PAGE).expect("open");
        r.next_page().unwrap();
        let mut c = r.cursor();
        assert_eq!(c.get_u32().unwrap(), 2);
        assert_eq!(c.get_u64().unwrap(), 1);
        assert_eq!(c.get_u64().unwrap(), 2);
    }

    #[test]
    fn rewind_overwrites_page_zero() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("rewound");

        let mut w = PageWriter::create(&path, PAGE).expect("create");
        w.next_page().unwrap(); // placeholder page 0
        w.put_u8(0xAB).unwrap();
        w.next_page().unwrap(); // body page 1
        w.rewind_to_first_page().unwrap();
        w.put_u32(0xFEED).unwrap();
        w.next_page().unwrap();
        w.finish().expect("finish");

        let mut r = PageReader::open(&path, PAGE).expect("open");
        r.next_page().unwrap();
        assert_eq!(r.cursor().get_u32().unwrap(), 0xFEED);
        r.next_page().unwrap();
        assert_eq!(r.cursor().get_u8().unwrap(), 0xAB);
    }

    #[test]
    fn oversize_write_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("oversize");
        let mut w = PageWriter::create(&path, PAGE).expect("create");
        let big = vec![0u8; PAGE + 1];
        assert!(matches!(
            w.put_bytes(&big),
            Err(PartError::Oversize(_))
        ));
    }

    #[test]
    fn cursor_never_reads_past_the_page() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bounds");
        let mut w = PageWriter::create(&path, PAGE).expect("create");
        w.next_page().unwrap();
        w.finish().unwrap();

        let mut r = PageReader::open(&path, PAGE).expect("open");
        r.next_page().unwrap();
        let mut c = r.cursor();
        c.get_bytes(PAGE).unwrap();
        assert!(c.get_u8().is_err());
    }
}
