use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::{
    bucket_of, subtable_slots, write_directory, write_record_header, write_slot, DirEntry, Slot,
    DIRECTORY_BYTES, DIRECTORY_ENTRIES, RECORD_HEADER_BYTES, SLOT_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Building,
    Finalized,
}

/// Builds an immutable table file record by record.
///
/// The directory region is reserved when the writer is created, records are
/// appended behind it as they arrive, and [`finalize`](TableWriter::finalize)
/// packs the hash subtables and fills in the directory. Until `finalize`
/// returns, the file on disk is incomplete and unreadable.
///
/// # Lifecycle
///
/// A writer moves through `Open -> Building -> Finalized`. Records may be
/// added in the first two states; after `finalize` every call fails with
/// [`Error::Closed`]. Dropping a writer without finalizing leaves the zeroed
/// directory placeholder in place, so an abandoned build stays visibly
/// unfinished rather than passing for a valid table.
pub struct TableWriter {
    file: BufWriter<File>,
    /// Staged `(hash, record offset)` pairs, one list per bucket, in
    /// insertion order within each list.
    buckets: Vec<Vec<Slot>>,
    /// Next free byte in the data section.
    cursor: u64,
    records: u64,
    state: State,
}

impl TableWriter {
    /// Creates (or truncates) the file at `path` and reserves the
    /// directory region.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);

        // Directory placeholder; finalize overwrites it in place.
        file.write_all(&[0u8; DIRECTORY_BYTES as usize])?;

        Ok(Self {
            file,
            buckets: vec![Vec::new(); DIRECTORY_ENTRIES],
            cursor: DIRECTORY_BYTES,
            records: 0,
            state: State::Open,
        })
    }

    /// Appends one record and stages its hash-table entry.
    ///
    /// Duplicate keys are allowed; each call stores its own record, and
    /// readers can address every occurrence separately. Keys and values may
    /// be empty.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after `finalize`, [`Error::Full`] if the record
    /// would push any on-disk offset past `u32::MAX`, or [`Error::Io`] on
    /// write failure.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.state == State::Finalized {
            return Err(Error::Closed);
        }
        self.state = State::Building;

        let key_len = u32::try_from(key.len()).map_err(|_| Error::Full)?;
        let val_len = u32::try_from(value.len()).map_err(|_| Error::Full)?;
        let end = self.cursor + RECORD_HEADER_BYTES + key.len() as u64 + value.len() as u64;
        if end > u64::from(u32::MAX) {
            return Err(Error::Full);
        }

        write_record_header(&mut self.file, key_len, val_len)?;
        self.file.write_all(key)?;
        self.file.write_all(value)?;

        let hash = cdbhash::hash(key);
        self.buckets[bucket_of(hash)].push(Slot {
            hash,
            offset: self.cursor as u32,
        });
        self.cursor = end;
        self.records += 1;
        Ok(())
    }

    /// Packs the subtables, writes the directory, and syncs the file.
    ///
    /// For each bucket in order the staged entries are placed into a
    /// subtable of `max(2 * entries, 1)` slots by linear probing from
    /// `hash % slots`; placing entries in insertion order means a probe
    /// visits duplicates of a key oldest-first. The subtables land directly
    /// after the data section, then the directory is written over the
    /// placeholder at offset 0 and the file is fsynced.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] if already finalized, [`Error::Full`] if a
    /// subtable offset cannot fit in 32 bits, or [`Error::Io`]. A failed
    /// finalize leaves the writer closed and the file unusable; there is no
    /// retry.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == State::Finalized {
            return Err(Error::Closed);
        }
        self.state = State::Finalized;

        let mut directory = Vec::with_capacity(DIRECTORY_ENTRIES);
        let mut next = self.cursor;
        for bucket in &self.buckets {
            let slots = subtable_slots(bucket.len());
            let offset = u32::try_from(next).map_err(|_| Error::Full)?;

            let mut table = vec![Slot::EMPTY; slots as usize];
            for &entry in bucket {
                let mut idx = (u64::from(entry.hash) % slots) as usize;
                while !table[idx].is_empty() {
                    idx = (idx + 1) % slots as usize;
                }
                table[idx] = entry;
            }
            for slot in &table {
                write_slot(&mut self.file, *slot)?;
            }

            directory.push(DirEntry {
                offset,
                slots: slots as u32,
            });
            next += slots * SLOT_BYTES;
        }

        self.file.seek(SeekFrom::Start(0))?;
        write_directory(&mut self.file, &directory)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;

        debug!(records = self.records, bytes = next, "table finalized");
        Ok(())
    }

    /// Number of records added so far.
    pub fn len(&self) -> u64 {
        self.records
    }

    /// Returns `true` if no record has been added yet.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{read_directory, read_slot};
    use tempfile::tempdir;

    // -------------------- Golden layout --------------------

    #[test]
    fn single_record_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.cdb");
        {
            let mut w = TableWriter::create(&path).unwrap();
            w.add(b"key", b"value").unwrap();
            w.finalize().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        // 2048 directory + 16 record + 255 empty subtables + one 2-slot subtable
        assert_eq!(bytes.len(), 4120);

        // record: key_len=3, val_len=5, then the bytes back to back
        assert_eq!(&bytes[2048..2064], b"\x03\x00\x00\x00\x05\x00\x00\x00keyvalue");

        let directory = read_directory(&mut &bytes[..DIRECTORY_BYTES as usize]).unwrap();
        let bucket = bucket_of(cdbhash::hash(b"key"));
        assert_eq!(directory[bucket], DirEntry { offset: 2464, slots: 2 });
        // bucket 0 is empty: its single vacant slot sits right after the data
        assert_eq!(directory[0], DirEntry { offset: 2064, slots: 1 });

        let mut sub = &bytes[2464..2480];
        let slot = read_slot(&mut sub).unwrap();
        assert_eq!(
            slot,
            Slot {
                hash: cdbhash::hash(b"key"),
                offset: 2048
            }
        );
        assert!(read_slot(&mut sub).unwrap().is_empty());
    }

    #[test]
    fn empty_table_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.cdb");
        {
            let mut w = TableWriter::create(&path).unwrap();
            assert!(w.is_empty());
            w.finalize().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        // 2048 directory + 256 single-slot subtables
        assert_eq!(bytes.len(), 4096);

        let directory = read_directory(&mut &bytes[..DIRECTORY_BYTES as usize]).unwrap();
        for (i, entry) in directory.iter().enumerate() {
            assert_eq!(u64::from(entry.offset), DIRECTORY_BYTES + i as u64 * SLOT_BYTES);
            assert_eq!(entry.slots, 1);
        }
        for chunk in bytes[2048..].chunks(8) {
            assert_eq!(chunk, [0u8; 8]);
        }
    }

    #[test]
    fn duplicate_keys_share_a_subtable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.cdb");
        {
            let mut w = TableWriter::create(&path).unwrap();
            w.add(b"a", b"1").unwrap();
            w.add(b"a", b"2").unwrap();
            w.add(b"a", b"3").unwrap();
            assert_eq!(w.len(), 3);
            w.finalize().unwrap();
        }

        let bytes = std::fs::read(&path).unwrap();
        let directory = read_directory(&mut &bytes[..DIRECTORY_BYTES as usize]).unwrap();
        let entry = directory[bucket_of(cdbhash::hash(b"a"))];
        assert_eq!(entry.slots, 6);

        // hash("a") % 6 == 4: insertion order lands in slots 4, 5, then 0
        let base = entry.offset as usize;
        let slots: Vec<Slot> = (0..6)
            .map(|i| read_slot(&mut &bytes[base + i * 8..]).unwrap())
            .collect();
        assert_eq!(slots[4].offset, 2048);
        assert_eq!(slots[5].offset, 2058);
        assert_eq!(slots[0].offset, 2068);
        assert!(slots[1].is_empty());
        assert!(slots[2].is_empty());
        assert!(slots[3].is_empty());
    }

    // -------------------- State machine --------------------

    #[test]
    fn add_after_finalize_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.cdb");
        let mut w = TableWriter::create(&path).unwrap();
        w.add(b"k", b"v").unwrap();
        w.finalize().unwrap();

        assert!(matches!(w.add(b"k2", b"v2"), Err(Error::Closed)));
    }

    #[test]
    fn finalize_twice_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.cdb");
        let mut w = TableWriter::create(&path).unwrap();
        w.finalize().unwrap();

        assert!(matches!(w.finalize(), Err(Error::Closed)));
    }

    #[test]
    fn finalize_with_no_records_is_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.cdb");
        let mut w = TableWriter::create(&path).unwrap();
        w.finalize().unwrap();
        assert!(path.exists());
    }

    // -------------------- Bookkeeping --------------------

    #[test]
    fn len_counts_every_add() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("len.cdb");
        let mut w = TableWriter::create(&path).unwrap();
        assert_eq!(w.len(), 0);
        w.add(b"a", b"1").unwrap();
        w.add(b"a", b"2").unwrap();
        w.add(b"b", b"3").unwrap();
        assert_eq!(w.len(), 3);
        assert!(!w.is_empty());
    }

    #[test]
    fn empty_key_and_empty_value_are_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emptykv.cdb");
        let mut w = TableWriter::create(&path).unwrap();
        w.add(b"", b"").unwrap();
        w.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // one 8-byte record (both lengths zero) in the data section
        assert_eq!(&bytes[2048..2056], [0u8; 8]);
        let directory = read_directory(&mut &bytes[..DIRECTORY_BYTES as usize]).unwrap();
        let entry = directory[bucket_of(cdbhash::hash(b""))];
        assert_eq!(entry.slots, 2);
    }
}
