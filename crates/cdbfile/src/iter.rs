//! Insertion-order iteration over a table's data section.
//!
//! Iteration walks records sequentially from the end of the directory up to
//! `data_end`, ignoring the hash index entirely, so it yields every record
//! (duplicates included) in exactly the order the records were added.

use crate::error::{Error, Result};
use crate::format::{FilePos, DIRECTORY_BYTES};
use crate::reader::TableReader;

impl TableReader {
    /// Iterates over decoded `(key, value)` pairs in insertion order.
    ///
    /// The iterator is restartable: calling `iter` again walks the same
    /// records in the same order.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter {
            reader: self,
            pos: DIRECTORY_BYTES,
            done: false,
        }
    }

    /// Iterates over `(key, value)` positions in insertion order, leaving
    /// all decoding to the caller.
    ///
    /// Useful when only some records need their bytes: collect the
    /// positions, then fetch the interesting ones with
    /// [`read_value`](TableReader::read_value).
    pub fn raw_iter(&mut self) -> RawIter<'_> {
        RawIter {
            reader: self,
            pos: DIRECTORY_BYTES,
            done: false,
        }
    }

    /// Walks every record in insertion order, feeding each to `visit`.
    ///
    /// The walk stops at the first visitor error and returns it; records
    /// already visited stay visited. Engine failures (I/O, corrupt data,
    /// closed reader) convert into `E` through its `From<Error>` impl.
    pub fn walk<F, E>(&mut self, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let mut pos = DIRECTORY_BYTES;
        while pos < self.data_end() {
            let (key, value, next) = self.record_at(pos)?;
            visit(&key, &value)?;
            pos = next;
        }
        Ok(())
    }
}

/// Iterator over decoded records. Created by [`TableReader::iter`].
pub struct Iter<'a> {
    reader: &'a mut TableReader,
    pos: u64,
    done: bool,
}

impl Iterator for Iter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.reader.data_end() {
            return None;
        }
        match self.reader.record_at(self.pos) {
            Ok((key, value, next)) => {
                self.pos = next;
                Some(Ok((key, value)))
            }
            Err(e) => {
                // a damaged record ends the walk
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Iterator over record positions. Created by [`TableReader::raw_iter`].
pub struct RawIter<'a> {
    reader: &'a mut TableReader,
    pos: u64,
    done: bool,
}

impl Iterator for RawIter<'_> {
    type Item = Result<(FilePos, FilePos)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.reader.data_end() {
            return None;
        }
        match self.reader.record_bounds_at(self.pos) {
            Ok((key_pos, val_pos, next)) => {
                self.pos = next;
                Some(Ok((key_pos, val_pos)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
