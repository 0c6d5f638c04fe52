use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{
    bucket_of, read_directory, read_record_header, read_slot, DirEntry, FilePos, Slot,
    DIRECTORY_BYTES, RECORD_HEADER_BYTES, SLOT_BYTES,
};

/// Reads an immutable table file.
///
/// The 2048-byte directory is loaded and validated up front; a lookup then
/// probes the on-disk subtable for its bucket with a few seeks. The reader
/// owns a single file handle whose cursor every operation repositions,
/// which is why the lookup methods take `&mut self`. To share one table
/// across threads, open one reader per thread; independent readers never
/// interfere.
///
/// # Validation
///
/// [`open`](TableReader::open) rejects files shorter than the directory and
/// directory entries whose subtable would start inside the directory region
/// or run past end of file. The lowest subtable offset becomes `data_end`,
/// the boundary between record data and the hash index.
pub struct TableReader {
    file: Option<File>,
    directory: Vec<DirEntry>,
    data_end: u64,
}

impl TableReader {
    /// Opens a table file and loads its directory.
    ///
    /// # Errors
    ///
    /// [`Error::Corrupt`] if the file is structurally invalid,
    /// [`Error::Io`] on any read failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < DIRECTORY_BYTES {
            return Err(Error::corrupt("file too small for a directory"));
        }

        let mut header = [0u8; DIRECTORY_BYTES as usize];
        file.read_exact(&mut header)?;
        let directory = read_directory(&mut header.as_slice())?;

        let mut data_end = file_len;
        for entry in &directory {
            if entry.slots == 0 {
                // no subtable for this bucket
                continue;
            }
            let offset = u64::from(entry.offset);
            let end = offset + u64::from(entry.slots) * SLOT_BYTES;
            if offset < DIRECTORY_BYTES || end > file_len {
                return Err(Error::corrupt("directory entry outside file bounds"));
            }
            data_end = data_end.min(offset);
        }

        debug!(file_len, data_end, "table opened");
        Ok(Self {
            file: Some(file),
            directory,
            data_end,
        })
    }

    /// Finds the `occurrence`-th record stored under `key` (0-based, in the
    /// order the records were added) and returns the position of its value.
    ///
    /// Returns `Ok(None)` when the key is absent or has fewer occurrences.
    /// The probe inspects at most one full subtable and stops early at the
    /// first vacant slot.
    pub fn lookup(&mut self, key: &[u8], occurrence: u64) -> Result<Option<FilePos>> {
        let hash = cdbhash::hash(key);
        let entry = self.directory[bucket_of(hash)];
        if entry.slots == 0 {
            return Ok(None);
        }

        let slots = u64::from(entry.slots);
        let base = u64::from(entry.offset);
        let mut seen = 0u64;
        let mut idx = u64::from(hash) % slots;
        for _ in 0..slots {
            let slot = self.slot_at(base + idx * SLOT_BYTES)?;
            if slot.is_empty() {
                return Ok(None);
            }
            if slot.hash == hash {
                if let Some(pos) = self.value_if_key_matches(u64::from(slot.offset), key)? {
                    if seen == occurrence {
                        return Ok(Some(pos));
                    }
                    seen += 1;
                }
            }
            idx = (idx + 1) % slots;
        }
        Ok(None)
    }

    /// Counts the records stored under `key`.
    ///
    /// Uses the same probe as [`lookup`](TableReader::lookup), so
    /// `lookup(key, i)` succeeds exactly for `i < count(key)`.
    pub fn count(&mut self, key: &[u8]) -> Result<u64> {
        let hash = cdbhash::hash(key);
        let entry = self.directory[bucket_of(hash)];
        if entry.slots == 0 {
            return Ok(0);
        }

        let slots = u64::from(entry.slots);
        let base = u64::from(entry.offset);
        let mut found = 0u64;
        let mut idx = u64::from(hash) % slots;
        for _ in 0..slots {
            let slot = self.slot_at(base + idx * SLOT_BYTES)?;
            if slot.is_empty() {
                break;
            }
            if slot.hash == hash && self.value_if_key_matches(u64::from(slot.offset), key)?.is_some()
            {
                found += 1;
            }
            idx = (idx + 1) % slots;
        }
        Ok(found)
    }

    /// Returns the first value stored under `key`, copied out.
    ///
    /// Convenience for `lookup(key, 0)` followed by
    /// [`read_value`](TableReader::read_value).
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.lookup(key, 0)? {
            Some(pos) => Ok(Some(self.read_value(pos)?)),
            None => Ok(None),
        }
    }

    /// Reads the bytes at `pos`.
    ///
    /// Positions come from [`lookup`](TableReader::lookup) or
    /// [`raw_iter`](TableReader::raw_iter) and stay valid for the life of
    /// the file, so values can be fetched repeatedly and in any order.
    pub fn read_value(&mut self, pos: FilePos) -> Result<Vec<u8>> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(pos.offset))?;
        let mut buf = vec![0u8; pos.length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Drops the file handle. A second close is a no-op; any later read
    /// fails with [`Error::Closed`]. Dropping the reader closes implicitly.
    pub fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    /// Number of bytes of record data (the region iteration walks).
    pub fn data_len(&self) -> u64 {
        self.data_end - DIRECTORY_BYTES
    }

    /// Number of buckets holding at least one record.
    pub fn occupied_buckets(&self) -> usize {
        self.directory.iter().filter(|e| e.slots > 1).count()
    }

    /// Slot count of the largest subtable.
    pub fn largest_subtable(&self) -> u32 {
        self.directory.iter().map(|e| e.slots).max().unwrap_or(0)
    }

    pub(crate) fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Reads the record header at `pos` and returns the key position, the
    /// value position, and the offset of the next record.
    pub(crate) fn record_bounds_at(&self, pos: u64) -> Result<(FilePos, FilePos, u64)> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(pos))?;
        let (key_len, val_len) = read_record_header(&mut file)?;

        let key_offset = pos + RECORD_HEADER_BYTES;
        let val_offset = key_offset + u64::from(key_len);
        let next = val_offset + u64::from(val_len);
        if next > self.data_end {
            return Err(Error::corrupt("record extends past the data section"));
        }
        Ok((
            FilePos {
                offset: key_offset,
                length: u64::from(key_len),
            },
            FilePos {
                offset: val_offset,
                length: u64::from(val_len),
            },
            next,
        ))
    }

    /// Reads the full record at `pos`, returning owned key and value bytes
    /// plus the offset of the next record.
    pub(crate) fn record_at(&self, pos: u64) -> Result<(Vec<u8>, Vec<u8>, u64)> {
        let (key_pos, val_pos, next) = self.record_bounds_at(pos)?;

        let mut file = self.file()?;
        file.seek(SeekFrom::Start(key_pos.offset))?;
        let mut key = vec![0u8; key_pos.length as usize];
        file.read_exact(&mut key)?;
        let mut value = vec![0u8; val_pos.length as usize];
        file.read_exact(&mut value)?;
        Ok((key, value, next))
    }

    fn file(&self) -> Result<&File> {
        self.file.as_ref().ok_or(Error::Closed)
    }

    fn slot_at(&self, pos: u64) -> Result<Slot> {
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(pos))?;
        Ok(read_slot(&mut file)?)
    }

    /// Checks the record at `record_offset` against `key`; on a full match
    /// returns the position of the record's value.
    fn value_if_key_matches(&self, record_offset: u64, key: &[u8]) -> Result<Option<FilePos>> {
        if record_offset < DIRECTORY_BYTES || record_offset + RECORD_HEADER_BYTES > self.data_end {
            return Err(Error::corrupt("slot points outside the data section"));
        }
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(record_offset))?;
        let (key_len, val_len) = read_record_header(&mut file)?;

        let val_offset = record_offset + RECORD_HEADER_BYTES + u64::from(key_len);
        if val_offset + u64::from(val_len) > self.data_end {
            return Err(Error::corrupt("record extends past the data section"));
        }
        if key_len as usize != key.len() {
            // same hash, different key
            return Ok(None);
        }
        let mut stored = vec![0u8; key_len as usize];
        file.read_exact(&mut stored)?;
        if stored != key {
            return Ok(None);
        }
        Ok(Some(FilePos {
            offset: val_offset,
            length: u64::from(val_len),
        }))
    }
}
