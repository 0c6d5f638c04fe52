//! Binary format constants and codec helpers.
//!
//! The directory is always the **first 2048 bytes** of a table file:
//!
//! ```text
//! 256 × [subtable_offset: u32 LE][slots: u32 LE]
//! ```
//!
//! Each record in the data section starts with an 8-byte header:
//!
//! ```text
//! [key_len: u32 LE][val_len: u32 LE]
//! ```
//!
//! and each subtable slot is 8 bytes:
//!
//! ```text
//! [hash: u32 LE][data_offset: u32 LE]
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Write};

/// Number of directory entries (hash buckets). Fixed by the format.
pub const DIRECTORY_ENTRIES: usize = 256;

/// Size of one directory entry in bytes: 4 (`subtable_offset`) + 4 (`slots`).
pub const DIRECTORY_ENTRY_BYTES: u64 = 4 + 4;

/// Size of the directory in bytes; the data section starts here.
pub const DIRECTORY_BYTES: u64 = DIRECTORY_ENTRIES as u64 * DIRECTORY_ENTRY_BYTES;

/// Size of one subtable slot in bytes: 4 (`hash`) + 4 (`data_offset`).
pub const SLOT_BYTES: u64 = 8;

/// Size of a record header in bytes: 4 (`key_len`) + 4 (`val_len`).
pub const RECORD_HEADER_BYTES: u64 = 8;

/// Returns the directory bucket for a key hash: `hash % 256`.
pub fn bucket_of(hash: u32) -> usize {
    hash as usize % DIRECTORY_ENTRIES
}

/// Returns the slot count for a subtable holding `entries` records.
///
/// Twice the entry count keeps the load factor at or below one half, and
/// the minimum of one slot lets an empty bucket still be probed (its single
/// slot is all-zero, ending every probe immediately).
pub fn subtable_slots(entries: usize) -> u64 {
    (entries as u64 * 2).max(1)
}

/// A location in the data section: byte offset from the start of the file
/// plus length. Produced by lookups and iteration, consumed by
/// [`TableReader::read_value`](crate::TableReader::read_value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilePos {
    pub offset: u64,
    pub length: u64,
}

/// One directory entry: where a bucket's subtable starts and how many
/// slots it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub offset: u32,
    pub slots: u32,
}

/// One subtable slot. Both fields zero means the slot is vacant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub hash: u32,
    pub offset: u32,
}

impl Slot {
    pub const EMPTY: Slot = Slot { hash: 0, offset: 0 };

    /// A slot is empty only when **both** fields are zero. The hash alone
    /// is not enough: a real key may hash to 0, but no record can live at
    /// offset 0 (that is inside the directory).
    pub fn is_empty(&self) -> bool {
        self.hash == 0 && self.offset == 0
    }
}

/// Writes the full 2048-byte directory to `w`. `dir` must hold 256 entries.
pub fn write_directory<W: Write>(w: &mut W, dir: &[DirEntry]) -> IoResult<()> {
    debug_assert_eq!(dir.len(), DIRECTORY_ENTRIES);
    for entry in dir {
        w.write_u32::<LittleEndian>(entry.offset)?;
        w.write_u32::<LittleEndian>(entry.slots)?;
    }
    Ok(())
}

/// Reads the full 2048-byte directory from `r`.
pub fn read_directory<R: Read>(r: &mut R) -> IoResult<Vec<DirEntry>> {
    let mut dir = Vec::with_capacity(DIRECTORY_ENTRIES);
    for _ in 0..DIRECTORY_ENTRIES {
        let offset = r.read_u32::<LittleEndian>()?;
        let slots = r.read_u32::<LittleEndian>()?;
        dir.push(DirEntry { offset, slots });
    }
    Ok(dir)
}

/// Writes one subtable slot to `w`.
pub fn write_slot<W: Write>(w: &mut W, slot: Slot) -> IoResult<()> {
    w.write_u32::<LittleEndian>(slot.hash)?;
    w.write_u32::<LittleEndian>(slot.offset)?;
    Ok(())
}

/// Reads one subtable slot from `r`.
pub fn read_slot<R: Read>(r: &mut R) -> IoResult<Slot> {
    let hash = r.read_u32::<LittleEndian>()?;
    let offset = r.read_u32::<LittleEndian>()?;
    Ok(Slot { hash, offset })
}

/// Writes a record header (`key_len` + `val_len`) to `w`.
pub fn write_record_header<W: Write>(w: &mut W, key_len: u32, val_len: u32) -> IoResult<()> {
    w.write_u32::<LittleEndian>(key_len)?;
    w.write_u32::<LittleEndian>(val_len)?;
    Ok(())
}

/// Reads a record header from `r`, returning `(key_len, val_len)`.
pub fn read_record_header<R: Read>(r: &mut R) -> IoResult<(u32, u32)> {
    let key_len = r.read_u32::<LittleEndian>()?;
    let val_len = r.read_u32::<LittleEndian>()?;
    Ok((key_len, val_len))
}
