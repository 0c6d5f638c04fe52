//! # cdbfile — constant database files
//!
//! Immutable, on-disk hash tables in the constant-database (CDB) format.
//!
//! A table is built once with [`TableWriter`] and then only ever read.
//! Lookups hit a two-level hash index (a fixed 256-entry directory pointing
//! at per-bucket subtables), so a hit costs a handful of seeks regardless of
//! table size. Keys and values are opaque byte strings; the same key may be
//! stored any number of times, and every stored value stays addressable by
//! its occurrence index.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ DIRECTORY (fixed 2048 bytes, written last)    │
//! │                                               │
//! │ 256 × [subtable_offset (u32) | slots (u32)]   │
//! ├───────────────────────────────────────────────┤
//! │ DATA SECTION (records in insertion order)     │
//! │                                               │
//! │ key_len (u32) | val_len (u32) | key | val     │
//! │                                               │
//! │ ... repeated for each record ...              │
//! ├───────────────────────────────────────────────┤
//! │ SUBTABLES (256 open-addressed slot arrays)    │
//! │                                               │
//! │ slots × [hash (u32) | data_offset (u32)]      │
//! │                                               │
//! │ ... one subtable per bucket, in order ...     │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. A key lives in bucket `hash % 256`; its
//! subtable holds twice as many slots as entries, probed linearly from
//! `hash % slots`. An all-zero slot ends a probe chain.
//!
//! ## Example
//! ```no_run
//! use cdbfile::{Result, TableReader, TableWriter};
//!
//! fn demo() -> Result<()> {
//!     let mut w = TableWriter::create("example.cdb")?;
//!     w.add(b"hello", b"world")?;
//!     w.finalize()?;
//!
//!     let mut r = TableReader::open("example.cdb")?;
//!     assert_eq!(r.get(b"hello")?, Some(b"world".to_vec()));
//!     Ok(())
//! }
//! ```

mod error;
mod format;
mod iter;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use format::{FilePos, DIRECTORY_BYTES, DIRECTORY_ENTRIES};
pub use iter::{Iter, RawIter};
pub use reader::TableReader;
pub use writer::TableWriter;
