//! Snapshot persistence.
//!
//! Every file is written through a [`StagedWrite`]: the bytes land in a temp file beside the
//! destination, are flushed and fsynced, and only then renamed over the destination. A staged
//! write that is dropped without [`StagedWrite::commit`] removes its temp file and leaves the
//! destination untouched.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{Snapshot, StoreError, UtcDateTime};

const HISTORY_PREFIX: &str = "prices_";
const HISTORY_SUFFIX: &str = ".json";
const SECONDS_PER_DAY: u64 = 86_400;

/// Bytes written and synced to a temp file, waiting to replace `destination`.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedWrite {
    pub fn stage(destination: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self, StoreError> {
        let destination = destination.into();
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| StoreError::io(&parent, e))?;
        temp.write_all(bytes)
            .and_then(|()| temp.flush())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| StoreError::io(temp.path(), e))?;

        Ok(Self { temp, destination })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Renames the temp file over the destination.
    pub fn commit(self) -> Result<PathBuf, StoreError> {
        let Self { temp, destination } = self;
        temp.persist(&destination).map_err(|e| StoreError::Commit {
            path: destination.clone(),
            source: e.error,
        })?;
        Ok(destination)
    }
}

/// Atomically replaces `path` with `bytes`.
pub fn write_atomic(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    StagedWrite::stage(path, bytes)?.commit()
}

/// Atomically writes `value` as pretty JSON with a trailing newline.
pub fn write_json_atomic<T: Serialize>(
    path: impl Into<PathBuf>,
    value: &T,
) -> Result<PathBuf, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Reads a snapshot document. A file that does not exist yields `Ok(None)`.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Timestamp of the snapshot at `path`, read from `asOfUtc`, `asOf` or `as_of`.
pub fn snapshot_as_of(path: &Path) -> Option<UtcDateTime> {
    let bytes = fs::read(path).ok()?;
    let document: Value = serde_json::from_slice(&bytes).ok()?;
    ["asOfUtc", "asOf", "as_of"]
        .iter()
        .filter_map(|key| document.get(key).and_then(Value::as_str))
        .find_map(|value| UtcDateTime::parse(value).ok())
}

/// Files written by one [`SnapshotStore::write`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub output: PathBuf,
    pub history: Option<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

/// Latest-snapshot file plus an optional dated history directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    output: PathBuf,
    history_dir: Option<PathBuf>,
    keep_days: u64,
}

impl SnapshotStore {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            history_dir: None,
            keep_days: 45,
        }
    }

    /// Also keep dated copies in `dir`, pruned after `keep_days`.
    pub fn with_history(mut self, dir: impl Into<PathBuf>, keep_days: u64) -> Self {
        self.history_dir = Some(dir.into());
        self.keep_days = keep_days;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn history_dir(&self) -> Option<&Path> {
        self.history_dir.as_deref()
    }

    /// The last written snapshot, if it can be read. Corrupt files are logged and ignored.
    pub fn previous(&self) -> Option<Snapshot> {
        match read_snapshot(&self.output) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!("ignoring unreadable previous snapshot: {error}");
                None
            }
        }
    }

    /// Whether the current output is at most `max_age_minutes` old at `now`.
    pub fn is_recent(&self, max_age_minutes: i64, now: UtcDateTime) -> bool {
        snapshot_as_of(&self.output)
            .is_some_and(|as_of| now.seconds_since(as_of) <= max_age_minutes.saturating_mul(60))
    }

    pub fn write(&self, snapshot: &Snapshot) -> Result<WriteReport, StoreError> {
        let output = write_json_atomic(&self.output, snapshot)?;
        tracing::info!("wrote {} ({} symbols)", output.display(), snapshot.prices.len());

        let mut report = WriteReport {
            output,
            ..WriteReport::default()
        };
        if let Some(dir) = &self.history_dir {
            let name = format!(
                "{HISTORY_PREFIX}{}{HISTORY_SUFFIX}",
                snapshot.as_of_utc.compact_stamp()
            );
            let history = write_json_atomic(dir.join(name), snapshot)?;
            tracing::info!("wrote history snapshot {}", history.display());
            report.history = Some(history);
            report.pruned = prune_history(dir, self.keep_days, SystemTime::now())?;
        }

        Ok(report)
    }
}

/// Deletes `prices_*.json` files in `dir` last modified more than `keep_days` before `now`.
///
/// Returns the deleted paths. Files that vanish mid-scan are skipped, so repeated runs are
/// harmless. A missing directory prunes nothing.
pub fn prune_history(
    dir: &Path,
    keep_days: u64,
    now: SystemTime,
) -> Result<Vec<PathBuf>, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(dir, e)),
    };
    let cutoff = now
        .checked_sub(Duration::from_secs(keep_days.saturating_mul(SECONDS_PER_DAY)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut deleted = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let path = entry.path();
        let is_history = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(HISTORY_PREFIX) && name.ends_with(HISTORY_SUFFIX));
        if !is_history {
            continue;
        }

        let modified = match entry.metadata().and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("pruned {}", path.display());
                deleted.push(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e)),
        }
    }

    deleted.sort();
    Ok(deleted)
}
