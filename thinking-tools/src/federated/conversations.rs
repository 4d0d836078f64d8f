//! Multi-turn conversation sessions
//!
//! Conversations live in memory. When a transcript directory is set, every
//! message is also appended to `<dir>/<session_id>.jsonl`; transcripts are
//! write-only and never read back.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use super::types::{ChatMessage, Role};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<StoredMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl Conversation {
    /// History in wire format, oldest first.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

/// Listing entry for `list_sessions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    /// First characters of the latest message
    pub preview: String,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<String, Conversation>,
    transcript_dir: Option<PathBuf>,
}

impl ConversationStore {
    pub fn new(transcript_dir: Option<PathBuf>) -> Self {
        Self {
            conversations: HashMap::new(),
            transcript_dir,
        }
    }

    pub fn create(&mut self, metadata: Map<String, Value>) -> &Conversation {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let conversation = Conversation {
            id: id.clone(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata,
        };
        self.conversations.entry(id).or_insert(conversation)
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// Append a message. Returns `false` if the conversation does not exist.
    pub fn append(&mut self, id: &str, role: Role, content: &str) -> bool {
        let Some(conversation) = self.conversations.get_mut(id) else {
            return false;
        };
        let message = StoredMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        conversation.updated_at = message.timestamp;

        if let Some(dir) = &self.transcript_dir {
            if let Err(e) = append_transcript(dir, id, &message) {
                warn!(session_id = id, error = %e, "Failed to append conversation transcript");
            }
        }
        conversation.messages.push(message);
        true
    }

    /// Newest first.
    pub fn list(&self) -> Vec<ConversationSummary> {
        let mut summaries: Vec<_> = self
            .conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                created_at: c.created_at,
                message_count: c.messages.len(),
                preview: c
                    .messages
                    .last()
                    .map(|m| m.content.chars().take(PREVIEW_CHARS).collect())
                    .unwrap_or_default(),
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

fn append_transcript(dir: &Path, id: &str, message: &StoredMessage) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.jsonl", id)))?;
    let line = serde_json::to_string(message)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_history() {
        let mut store = ConversationStore::new(None);
        let id = store.create(Map::new()).id.clone();
        assert!(store.append(&id, Role::User, "hello"));
        assert!(store.append(&id, Role::Assistant, "hi there"));
        assert!(!store.append("missing", Role::User, "x"));

        let history = store.get(&id).unwrap().chat_messages();
        assert_eq!(history, vec![ChatMessage::user("hello"), ChatMessage::assistant("hi there")]);
    }

    #[test]
    fn test_list_preview_truncated() {
        let mut store = ConversationStore::new(None);
        let id = store.create(Map::new()).id.clone();
        store.append(&id, Role::User, &"é".repeat(80));
        store.create(Map::new());

        let list = store.list();
        assert_eq!(list.len(), 2);
        let entry = list.iter().find(|s| s.id == id).unwrap();
        assert_eq!(entry.preview.chars().count(), PREVIEW_CHARS);
        assert_eq!(entry.message_count, 1);
        assert!(list[0].created_at >= list[1].created_at);
    }

    #[test]
    fn test_transcript_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConversationStore::new(Some(dir.path().to_path_buf()));
        let id = store.create(Map::new()).id.clone();
        store.append(&id, Role::User, "q");
        store.append(&id, Role::Assistant, "a");

        let text = fs::read_to_string(dir.path().join(format!("{}.jsonl", id))).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["role"], "assistant");
    }
}
