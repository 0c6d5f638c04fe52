//! Implementations of the `cdb` subcommands.
//!
//! Each command is a plain function over paths and writers so the logic is
//! testable without spawning the binary; `main` only parses arguments and
//! wires up stdin/stdout.

use anyhow::{bail, Context, Result};
use cdbfile::{TableReader, TableWriter, DIRECTORY_ENTRIES};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

/// Builds a table at `db` from `key<TAB>value` lines.
///
/// Reads `input` when given, stdin otherwise. Blank lines are skipped; a
/// line without a tab is an error. The value keeps any further tabs.
///
/// The table is written to a sibling temp file and renamed over `db` only
/// after a successful finalize, so a failed build never leaves a
/// half-written table at the target path.
///
/// Returns the number of records stored.
pub fn build(db: &Path, input: Option<&Path>) -> Result<u64> {
    let lines: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let tmp = db.with_extension("cdb.tmp");
    let mut writer =
        TableWriter::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;

    for (idx, line) in lines.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('\t') {
            Some(kv) => kv,
            None => bail!("line {}: expected key<TAB>value", idx + 1),
        };
        writer.add(key.as_bytes(), value.as_bytes())?;
    }

    let records = writer.len();
    writer.finalize()?;
    fs::rename(&tmp, db).with_context(|| format!("rename into {}", db.display()))?;

    info!(records, db = %db.display(), "table built");
    Ok(records)
}

/// Fetches the `record`-th value stored under `key` (0-based).
pub fn get(db: &Path, key: &[u8], record: u64) -> Result<Option<Vec<u8>>> {
    let mut reader = open_table(db)?;
    match reader.lookup(key, record)? {
        Some(pos) => Ok(Some(reader.read_value(pos)?)),
        None => Ok(None),
    }
}

/// Counts the values stored under `key`.
pub fn count(db: &Path, key: &[u8]) -> Result<u64> {
    let mut reader = open_table(db)?;
    Ok(reader.count(key)?)
}

/// Writes every record to `out` as `key<TAB>value` lines, in insertion
/// order. The output of `dump` feeds straight back into `build`.
pub fn dump<W: Write>(db: &Path, out: &mut W) -> Result<()> {
    let mut reader = open_table(db)?;
    reader.walk(|key, value| -> Result<()> {
        out.write_all(key)?;
        out.write_all(b"\t")?;
        out.write_all(value)?;
        out.write_all(b"\n")?;
        Ok(())
    })
}

/// Writes summary statistics for the table at `db` to `out`.
pub fn stats<W: Write>(db: &Path, out: &mut W) -> Result<()> {
    let mut reader = open_table(db)?;

    let mut records = 0u64;
    let mut key_bytes = 0u64;
    let mut val_bytes = 0u64;
    for item in reader.raw_iter() {
        let (key_pos, val_pos) = item?;
        records += 1;
        key_bytes += key_pos.length;
        val_bytes += val_pos.length;
    }

    writeln!(out, "records:          {}", records)?;
    writeln!(out, "data bytes:       {}", reader.data_len())?;
    writeln!(out, "key bytes:        {}", key_bytes)?;
    writeln!(out, "value bytes:      {}", val_bytes)?;
    writeln!(
        out,
        "occupied buckets: {}/{}",
        reader.occupied_buckets(),
        DIRECTORY_ENTRIES
    )?;
    writeln!(out, "largest subtable: {} slots", reader.largest_subtable())?;
    Ok(())
}

fn open_table(db: &Path) -> Result<TableReader> {
    TableReader::open(db).with_context(|| format!("open {}", db.display()))
}
