//! Persist session progress to disk so a relaunch within five minutes resumes it.

use crate::game::Progress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILENAME: &str = "session.json";

/// Snapshots older than this are discarded on restore.
pub const MAX_AGE_SECS: i64 = 5 * 60;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub level: u32,
    pub score: u32,
    #[serde(default)]
    pub last_cleared_level: u32,
    #[serde(default)]
    pub last_cleared_score: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(progress: Progress, timestamp: DateTime<Utc>) -> Self {
        Self {
            level: progress.level,
            score: progress.score,
            last_cleared_level: progress.last_cleared_level,
            last_cleared_score: progress.last_cleared_score,
            timestamp,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            level: self.level,
            score: self.score,
            last_cleared_level: self.last_cleared_level,
            last_cleared_score: self.last_cleared_score,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = (now - self.timestamp).num_seconds();
        (0..MAX_AGE_SECS).contains(&age)
    }
}

/// Data directory: `$XDG_CONFIG_HOME/nekotui` or `~/.config/nekotui`.
pub fn default_dir() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("nekotui")
}

/// One snapshot file in a data directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FILENAME),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `progress` stamped with `now`. Creates the directory if needed.
    pub fn save(&self, progress: Progress, now: DateTime<Utc>) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&Snapshot::new(progress, now))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Saved progress if present, readable and fresh. Anything else is deleted and ignored.
    pub fn restore(&self, now: DateTime<Utc>) -> Option<Progress> {
        let text = fs::read_to_string(&self.path).ok()?;
        let snapshot = match serde_json::from_str::<Snapshot>(&text) {
            Ok(s) => s,
            Err(err) => {
                tracing::debug!(%err, "discarding unreadable session snapshot");
                self.discard();
                return None;
            }
        };
        if !snapshot.is_fresh(now) {
            tracing::debug!(saved = %snapshot.timestamp, "discarding stale session snapshot");
            self.discard();
            return None;
        }
        tracing::info!(
            level = snapshot.level,
            score = snapshot.score,
            "restored session"
        );
        Some(snapshot.progress())
    }

    /// Remove the snapshot; a missing file is not an error.
    pub fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn discard(&self) {
        if let Err(err) = self.clear() {
            tracing::warn!(%err, "could not remove session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn progress() -> Progress {
        Progress {
            level: 3,
            score: 140,
            last_cleared_level: 2,
            last_cleared_score: 120,
        }
    }

    #[test]
    fn restores_fresh_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let now = Utc::now();
        store.save(progress(), now).unwrap();
        let later = now + TimeDelta::seconds(MAX_AGE_SECS - 1);
        assert_eq!(store.restore(later), Some(progress()));
    }

    #[test]
    fn stale_snapshot_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let now = Utc::now();
        store.save(progress(), now).unwrap();
        assert_eq!(store.restore(now + TimeDelta::seconds(MAX_AGE_SECS)), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn malformed_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        fs::write(store.path(), "{ level: ").unwrap();
        assert_eq!(store.restore(Utc::now()), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn missing_cleared_fields_default_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let now = Utc::now();
        let json = format!(
            r#"{{"level":2,"score":30,"timestamp":{}}}"#,
            now.timestamp_millis()
        );
        fs::write(store.path(), json).unwrap();
        let p = store.restore(now).unwrap();
        assert_eq!((p.level, p.score, p.last_cleared_level), (2, 30, 0));
    }

    #[test]
    fn clear_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.clear().is_ok());
        store.save(progress(), Utc::now()).unwrap();
        assert!(store.clear().is_ok());
        assert_eq!(store.restore(Utc::now()), None);
    }
}
