//! Daily consultation log
//!
//! One JSON line per completed consultation in
//! `<dir>/consultations-YYYYMMDD.jsonl` (UTC date).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::types::{ConsultationRequest, ConsultationResponse};

#[derive(Debug)]
pub struct ConsultationLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConsultationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("consultations-{}.jsonl", at.format("%Y%m%d")))
    }

    pub fn record(
        &self,
        request: &ConsultationRequest,
        response: &ConsultationResponse,
    ) -> io::Result<()> {
        let now = Utc::now();
        let entry = json!({
            "timestamp": now,
            "request": {
                "provider": request.provider,
                "model": request.model,
                "query": request.query,
                "system_prompt": request.system_prompt,
                "temperature": request.temperature,
                "session_id": request.session_id,
            },
            "response": {
                "content": response.response,
                "metadata": response.metadata,
            },
        });

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(now))?;
        writeln!(file, "{}", entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federated::config::ProviderKind;
    use serde_json::{Map, Value};

    #[test]
    fn test_record_appends_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ConsultationLog::new(dir.path().join("federated"));
        let request = ConsultationRequest::new(ProviderKind::Google, "gemini", "why?");
        let response = ConsultationResponse {
            provider: ProviderKind::Google,
            model: "gemini".to_string(),
            response: "because".to_string(),
            timestamp: Utc::now(),
            metadata: Map::new(),
        };

        log.record(&request, &response).unwrap();
        log.record(&request, &response).unwrap();

        let path = log.path_for(Utc::now());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("consultations-"));
        let lines: Vec<Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["request"]["provider"], "google");
        assert_eq!(lines[0]["response"]["content"], "because");
    }
}
