//! Lateral session history
//!
//! Two kinds of files under the history directory:
//!
//! - `snapshots.jsonl`: one line per state change (`start`, `divergence`,
//!   `synthesis`, `reflection`), append-only
//! - `lateral-synthesis-session-<timestamp>-<id8>.jsonl`: one file per
//!   completed session, read back by `list_sessions`
//!
//! Nothing is written when persistence is disabled. Write failures are logged
//! and never surface to the caller.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::types::LateralSession;

const HISTORY_PREFIX: &str = "lateral-synthesis-session-";
const SNAPSHOT_FILE: &str = "snapshots.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStage {
    Start,
    Divergence,
    Synthesis,
    Reflection,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    timestamp: chrono::DateTime<Utc>,
    stage: SnapshotStage,
    session: &'a LateralSession,
}

#[derive(Debug)]
pub struct SessionHistory {
    dir: PathBuf,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl SessionHistory {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            write_lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot(&self, session: &LateralSession, stage: SnapshotStage) {
        if !self.enabled {
            return;
        }
        let entry = Snapshot {
            timestamp: Utc::now(),
            stage,
            session,
        };
        if let Err(e) = self.append_line(&self.dir.join(SNAPSHOT_FILE), &entry) {
            warn!(session_id = %session.session_id, error = %e, "Failed to write session snapshot");
        }
    }

    /// Write a completed session to its own history file.
    pub fn save_completed(&self, session: &LateralSession) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let at = session.completed_at.unwrap_or_else(Utc::now);
        let short_id: String = session.session_id.chars().take(8).collect();
        let path = self.dir.join(format!(
            "{}{}-{}.jsonl",
            HISTORY_PREFIX,
            at.format("%Y%m%dT%H%M%S"),
            short_id
        ));
        match self.append_line(&path, session) {
            Ok(()) => {
                info!(session_id = %session.session_id, path = %path.display(), "Saved session to history");
                Some(path)
            }
            Err(e) => {
                error!(session_id = %session.session_id, error = %e, "Failed to save session to history");
                None
            }
        }
    }

    /// Completed sessions, newest first, at most `limit`.
    ///
    /// Unreadable files and malformed lines are skipped.
    pub fn load(&self, limit: usize) -> Vec<LateralSession> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(HISTORY_PREFIX) && n.ends_with(".jsonl"))
            })
            .collect();
        files.sort();
        files.reverse();

        let mut sessions = Vec::new();
        for path in files.into_iter().take(limit) {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read history file");
                    continue;
                }
            };
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<LateralSession>(line) {
                    Ok(session) => sessions.push(session),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping invalid history line"),
                }
            }
        }
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        sessions
    }

    fn append_line<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> io::Result<()> {
        let line = serde_json::to_string(value)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(origin: &str) -> LateralSession {
        let mut session = LateralSession::new(origin, "random");
        session.completed_at = Some(Utc::now());
        session
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new(dir.path(), false);
        let session = completed("o");
        history.snapshot(&session, SnapshotStage::Start);
        assert!(history.save_completed(&session).is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new(dir.path(), true);
        let first = completed("first");
        let second = completed("second");
        history.save_completed(&first).unwrap();
        history.save_completed(&second).unwrap();
        fs::write(
            dir.path().join(format!("{}00000000T000000-garbage.jsonl", HISTORY_PREFIX)),
            "not json\n",
        )
        .unwrap();

        let loaded = history.load(10);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().any(|s| s.session_id == first.session_id));
        assert!(loaded[0].created_at >= loaded[1].created_at);
        assert_eq!(history.load(1).len(), 1);
    }

    #[test]
    fn test_snapshots_append() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new(dir.path(), true);
        let session = LateralSession::new("o", "random");
        history.snapshot(&session, SnapshotStage::Start);
        history.snapshot(&session, SnapshotStage::Divergence);

        let text = fs::read_to_string(dir.path().join(SNAPSHOT_FILE)).unwrap();
        let stages: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["stage"].to_string())
            .collect();
        assert_eq!(stages, vec!["\"start\"", "\"divergence\""]);
    }
}
