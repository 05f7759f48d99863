//! Durable append-only action logs, one file per player per match instance.
//!
//! Layout: `<dir>/rollback_<uuid>.csv`, a header line followed by one
//! [`MutationRecord`] per line in append (event) order. The file is the sole
//! source of truth for crash recovery: its mere presence at startup means the
//! owning player's match ended abnormally and a rollback is still owed.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::RollbackError;
use crate::record::MutationRecord;

const LOG_PREFIX: &str = "rollback_";
const LOG_EXT: &str = "csv";

/// Header line declaring the record schema.
pub const HEADER: &str = "timestamp,action,x,y,z,block_type";

/// Deterministic log path for a player.
pub fn log_path(dir: &Path, uuid: &str) -> PathBuf {
    dir.join(format!("{LOG_PREFIX}{uuid}.{LOG_EXT}"))
}

/// Create (or truncate) a player's log, writing the header. Creates the log
/// directory if needed.
pub fn create(dir: &Path, uuid: &str) -> Result<PathBuf, RollbackError> {
    std::fs::create_dir_all(dir)?;
    let path = log_path(dir, uuid);
    let mut file = File::create(&path)?;
    writeln!(file, "{HEADER}")?;
    Ok(path)
}

/// Append a batch of records in one buffered write.
pub fn append(path: &Path, records: &[MutationRecord]) -> Result<(), RollbackError> {
    if records.is_empty() {
        return Ok(());
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    let mut out = BufWriter::new(file);
    for record in records {
        writeln!(out, "{}", record.to_line())?;
    }
    out.flush()?;
    Ok(())
}

/// Read every record in the log, in append order. The header line is skipped;
/// malformed lines are logged and skipped rather than failing the whole read,
/// since an aborted read would leave the arena permanently damaged.
pub fn read_all(path: &Path) -> Result<Vec<MutationRecord>, RollbackError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if index == 0 || line.is_empty() {
            continue;
        }
        match MutationRecord::parse_line(&line) {
            Some(record) => records.push(record),
            None => warn!("skipping malformed log line {} in {:?}", index + 1, path),
        }
    }
    Ok(records)
}

/// Delete a player's log. A failed delete is reported to the caller; the
/// leftover file will be picked up by the startup scan on next restart.
pub fn delete(path: &Path) -> Result<(), RollbackError> {
    std::fs::remove_file(path)?;
    Ok(())
}

/// List `(uuid, path)` for every log file in the directory. A missing or
/// unreadable directory yields an empty list.
pub fn scan(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if dir.exists() {
                warn!("cannot scan rollback dir {:?}: {e}", dir);
            }
            return Vec::new();
        }
    };
    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let is_log = path.extension().and_then(|e| e.to_str()) == Some(LOG_EXT);
        if is_log && stem.starts_with(LOG_PREFIX) {
            found.push((stem[LOG_PREFIX.len()..].to_string(), path));
        }
    }
    found
}
