//! Append-only session event log
//!
//! One NDJSON file per session under the configured directory. Each line is
//! a [`SessionEvent`]. Files are only ever appended to.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What happened in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Start,
    Contribute,
    EndorseChallenge,
    ProposeIntegration,
    Synthesize,
    ResetRate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp: DateTime<Utc>,
    pub event: SessionEventKind,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl SessionEvent {
    pub fn new(event: SessionEventKind, session_id: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            session_id: session_id.into(),
            details,
        }
    }
}

/// Writes session events to `<dir>/<session_id>.jsonl`.
#[derive(Debug)]
pub struct EventLog {
    dir: PathBuf,
    // Serializes appends so concurrent lines never interleave
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", session_id))
    }

    pub fn append(&self, event: &SessionEvent) -> io::Result<()> {
        let line = serde_json::to_string(event)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&event.session_id);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        debug!(path = %path.display(), event = ?event.event, "appended session event");
        Ok(())
    }

    /// Read back every event for a session. Malformed lines are skipped.
    pub fn read(&self, session_id: &str) -> io::Result<Vec<SessionEvent>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(event) = serde_json::from_str(&line) {
                events.push(event);
            }
        }
        Ok(events)
    }
}
