//! Ranking: player records kept either in a local top-10 file or a shared append-only log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const FILENAME: &str = "rankings.json";

/// Entries shown (and kept, for the local store).
pub const MAX_ENTRIES: usize = 10;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("please enter a name")]
    EmptyName,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub name: String,
    pub level: u32,
    pub score: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub date: DateTime<Utc>,
}

impl RankingRecord {
    /// Build a record; the name is trimmed and must not be empty.
    pub fn new(name: &str, level: u32, score: u32, now: DateTime<Utc>) -> Result<Self, RankingError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RankingError::EmptyName);
        }
        Ok(Self {
            name: name.to_string(),
            level,
            score,
            timestamp: now,
            date: now,
        })
    }
}

/// Somewhere ranking records go and come back from.
pub trait Leaderboard {
    fn submit(&mut self, record: RankingRecord) -> Result<(), RankingError>;

    /// Best records first, at most [`MAX_ENTRIES`].
    fn top(&self) -> Result<Vec<RankingRecord>, RankingError>;

    /// Shown after a successful submission.
    fn label(&self) -> &'static str;
}

/// Highest score first; ties keep submission order.
fn rank(records: &mut Vec<RankingRecord>) {
    records.sort_by(|a, b| b.score.cmp(&a.score));
    records.truncate(MAX_ENTRIES);
}

/// JSON array in the data directory, never longer than [`MAX_ENTRIES`].
#[derive(Debug, Clone)]
pub struct LocalRanking {
    path: PathBuf,
}

impl LocalRanking {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FILENAME),
        }
    }

    fn load(&self) -> Result<Vec<RankingRecord>, RankingError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Leaderboard for LocalRanking {
    fn submit(&mut self, record: RankingRecord) -> Result<(), RankingError> {
        let mut records = self.load()?;
        records.push(record);
        rank(&mut records);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }

    fn top(&self) -> Result<Vec<RankingRecord>, RankingError> {
        let mut records = self.load()?;
        rank(&mut records);
        Ok(records)
    }

    fn label(&self) -> &'static str {
        "Saved to ranking!"
    }
}

/// JSON-lines file that several players append to; every submission is kept.
#[derive(Debug, Clone)]
pub struct SharedRanking {
    path: PathBuf,
}

impl SharedRanking {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Leaderboard for SharedRanking {
    fn submit(&mut self, record: RankingRecord) -> Result<(), RankingError> {
        let line = serde_json::to_string(&record)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    fn top(&self) -> Result<Vec<RankingRecord>, RankingError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records: Vec<RankingRecord> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(r) => Some(r),
                Err(err) => {
                    tracing::warn!(%err, "skipping malformed ranking line");
                    None
                }
            })
            .collect();
        rank(&mut records);
        Ok(records)
    }

    fn label(&self) -> &'static str {
        "Saved to shared ranking!"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, score: u32) -> RankingRecord {
        RankingRecord::new(name, 1, score, Utc::now()).unwrap()
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            RankingRecord::new("   ", 2, 40, Utc::now()),
            Err(RankingError::EmptyName)
        ));
        assert_eq!(record("  Mio ", 10).name, "Mio");
    }

    #[test]
    fn local_keeps_top_ten_by_score() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = LocalRanking::new(dir.path());
        assert!(board.top().unwrap().is_empty());
        for i in 0..12u32 {
            board.submit(record(&format!("p{i}"), i * 10)).unwrap();
        }
        let top = board.top().unwrap();
        assert_eq!(top.len(), MAX_ENTRIES);
        assert_eq!(top[0].score, 110);
        assert_eq!(top[9].score, 20);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn local_ties_keep_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = LocalRanking::new(dir.path());
        board.submit(record("first", 50)).unwrap();
        board.submit(record("second", 50)).unwrap();
        let names: Vec<_> = board.top().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn local_corrupt_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FILENAME), "[{").unwrap();
        let mut board = LocalRanking::new(dir.path());
        assert!(matches!(board.submit(record("a", 1)), Err(RankingError::Json(_))));
    }

    #[test]
    fn shared_keeps_everything_and_reads_top_ten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.jsonl");
        let mut board = SharedRanking::new(path.clone());
        for i in 0..15u32 {
            board.submit(record(&format!("p{i}"), i)).unwrap();
        }
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "garbage"))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 16);
        let top = board.top().unwrap();
        assert_eq!(top.len(), MAX_ENTRIES);
        assert_eq!(top[0].score, 14);
    }
}
