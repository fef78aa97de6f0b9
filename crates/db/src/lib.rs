//! File-backed JSON snapshots.
//!
//! The dashboard keeps its state in memory and persists it as a single JSON
//! document. Every save writes to a temporary file first and renames it into
//! place; the previous snapshot is copied into `backups/` with a timestamped
//! name (`state_YYYYMMDDHHMMSSnnnnnnnnn.json`) and old backups are pruned.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use time::{macros::format_description, Duration, OffsetDateTime};

const BACKUP_DIR: &str = "backups";

/// A snapshot location plus its backup policy.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
    keep_backups: usize,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>, keep_backups: usize) -> Self {
        Self {
            path: path.into(),
            keep_backups,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(|dir| dir.join(BACKUP_DIR))
            .unwrap_or_else(|| PathBuf::from(BACKUP_DIR))
    }

    /// Read the snapshot, or `None` when nothing has been saved yet.
    pub fn load<T: DeserializeOwned>(&self) -> anyhow::Result<Option<T>> {
        if !self.path.exists() {
            tracing::info!(
                target: "preorder-db",
                path = %self.path.display(),
                "no snapshot found"
            );
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", self.path.display()))?;

        tracing::info!(target: "preorder-db", path = %self.path.display(), "snapshot loaded");
        Ok(Some(value))
    }

    /// Persist `value`, backing up whatever was there before.
    pub fn save<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let body = Self::encode(value)?;
        self.save_encoded(&body)
    }

    /// The bytes `save` would write for `value`.
    pub fn encode<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
        serde_json::to_vec_pretty(value).context("failed to encode snapshot")
    }

    /// Persist an already encoded document. Blocking.
    pub fn save_encoded(&self, body: &[u8]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;

        if self.keep_backups > 0 && self.path.exists() {
            self.backup_current()?;
        }

        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move snapshot into {}", self.path.display()))?;

        tracing::debug!(target: "preorder-db", path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    fn backup_current(&self) -> anyhow::Result<PathBuf> {
        let dir = self.backup_dir();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        // Nanosecond stamps; on a clash move one tick forward so no backup
        // is overwritten and name order stays age order.
        let mut at = OffsetDateTime::now_utc();
        let target = loop {
            let stamp = at
                .format(format_description!(
                    "[year][month][day][hour][minute][second][subsecond digits:9]"
                ))
                .context("failed to format backup timestamp")?;
            let candidate = dir.join(format!("{}_{}.{}", self.stem(), stamp, self.extension()));
            if !candidate.exists() {
                break candidate;
            }
            at += Duration::nanoseconds(1);
        };

        fs::copy(&self.path, &target)
            .with_context(|| format!("failed to back up to {}", target.display()))?;
        self.prune_backups()?;

        Ok(target)
    }

    /// Remove the oldest backups beyond `keep_backups`. Returns how many went.
    pub fn prune_backups(&self) -> anyhow::Result<usize> {
        let mut backups = self.list_backups()?;
        if backups.len() <= self.keep_backups {
            return Ok(0);
        }

        let excess = backups.len() - self.keep_backups;
        for stale in backups.drain(..excess) {
            fs::remove_file(&stale)
                .with_context(|| format!("failed to remove {}", stale.display()))?;
        }

        tracing::debug!(target: "preorder-db", removed = excess, "pruned snapshot backups");
        Ok(excess)
    }

    /// Backups of this snapshot, oldest first.
    pub fn list_backups(&self) -> anyhow::Result<Vec<PathBuf>> {
        let dir = self.backup_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_", self.stem());
        let suffix = format!(".{}", self.extension());
        let mut backups = Vec::new();

        for entry in fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stamp) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
            else {
                continue;
            };
            // `state_test_*` belongs to another snapshot.
            if !stamp.is_empty()
                && stamp.bytes().all(|b| b.is_ascii_digit())
                && entry.path().is_file()
            {
                backups.push(entry.path());
            }
        }

        // Timestamps are fixed width, so name order is age order.
        backups.sort();
        Ok(backups)
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string())
    }

    fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_else(|| "json".to_string())
    }
}
