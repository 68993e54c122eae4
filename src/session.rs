use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SESSION_EXT: &str = "json";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One conversation. `messages[0]` is always the system prompt; the list is
/// append-only for the lifetime of the session.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub started_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(system_prompt: &str, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            messages: vec![Message::new(Role::System, system_prompt)],
            model: model.into(),
            temperature,
            started_at: Utc::now(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::new(Role::Assistant, content));
    }

    /// File name a saved copy of this session uses: the RFC3339 start time
    /// plus the session extension.
    pub fn filename(&self) -> String {
        format!(
            "{}.{}",
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            SESSION_EXT
        )
    }
}

/// A decoded session file from the history directory.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub filename: String,
    pub started_at: DateTime<Utc>,
    pub session: ChatSession,
}

/// Write `session` into `dir` if it holds more than the system prompt.
/// Returns the path written, or `None` when there was nothing worth saving.
pub fn encode(session: &ChatSession, dir: &Path) -> Result<Option<PathBuf>> {
    if session.messages.len() <= 1 {
        return Ok(None);
    }

    let path = dir.join(session.filename());
    let data = serde_json::to_string_pretty(session)?;
    fs::write(&path, data)
        .with_context(|| format!("could not write session to {}", path.display()))?;
    Ok(Some(path))
}

pub fn decode(bytes: &[u8]) -> Result<ChatSession> {
    serde_json::from_slice(bytes).context("could not decode session file")
}

/// Load every decodable session in `dir`, sorted ascending by start time.
///
/// Zero-byte files are skipped silently; files that fail to read or decode
/// are skipped with a warning. Only a failure to read the directory itself
/// is an error.
pub fn load_records(dir: &Path) -> Result<Vec<SessionRecord>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("could not read history directory {}", dir.display()))?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() || meta.len() == 0 {
            continue;
        }

        let filename = entry.file_name().to_string_lossy().into_owned();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(file = %filename, %err, "skipping unreadable session file");
                continue;
            }
        };
        let session = match decode(&bytes) {
            Ok(session) => session,
            Err(err) => {
                warn!(file = %filename, %err, "skipping undecodable session file");
                continue;
            }
        };

        let started_at = parse_started_at(&filename);
        records.push(SessionRecord {
            filename,
            started_at,
            session,
        });
    }

    records.sort_by_key(|r| r.started_at);
    Ok(records)
}

/// Session files are named after their RFC3339 start time; anything else
/// sorts as the epoch.
fn parse_started_at(filename: &str) -> DateTime<Utc> {
    filename
        .strip_suffix(&format!(".{}", SESSION_EXT))
        .and_then(|stem| DateTime::parse_from_rfc3339(stem).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> ChatSession {
        let mut session = ChatSession::new("You are a helpful AI assistant.", "gpt-4", 0.7);
        session.push_user("hello");
        session.push_assistant("Hi there");
        session
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();

        let path = encode(&session, dir.path()).unwrap().unwrap();
        let decoded = decode(&fs::read(path).unwrap()).unwrap();

        assert_eq!(decoded.messages, session.messages);
        assert_eq!(decoded.model, session.model);
        assert_eq!(decoded.temperature, session.temperature);
    }

    #[test]
    fn encode_skips_prompt_only_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let session = ChatSession::new("prompt", "gpt-4", 0.0);

        assert!(encode(&session, dir.path()).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn decode_rejects_malformed_input() {
        assert!(decode(b"not json at all").is_err());
        assert!(decode(b"{\"messages\": 42}").is_err());
    }

    #[test]
    fn load_records_skips_bad_files_and_keeps_good_ones() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        encode(&session, dir.path()).unwrap();

        fs::write(dir.path().join("empty.json"), "").unwrap();
        fs::write(dir.path().join("garbage.json"), "{{{{").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a session").unwrap();

        let records = load_records(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, session.filename());
        assert_eq!(records[0].session.messages, session.messages);
    }

    #[test]
    fn load_records_sorts_ascending_by_start_time() {
        let dir = tempfile::tempdir().unwrap();

        let mut older = sample_session();
        older.started_at = "2024-01-01T10:00:00Z".parse().unwrap();
        let mut newer = sample_session();
        newer.started_at = "2024-06-01T10:00:00Z".parse().unwrap();

        encode(&newer, dir.path()).unwrap();
        encode(&older, dir.path()).unwrap();

        let records = load_records(dir.path()).unwrap();
        assert_eq!(records[0].started_at, older.started_at);
        assert_eq!(records[1].started_at, newer.started_at);
    }

    #[test]
    fn unparseable_filename_sorts_as_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();

        let data = serde_json::to_string(&session).unwrap();
        fs::write(dir.path().join("renamed.json"), &data).unwrap();
        encode(&session, dir.path()).unwrap();

        let records = load_records(dir.path()).unwrap();
        assert_eq!(records[0].filename, "renamed.json");
        assert_eq!(records[0].started_at, DateTime::<Utc>::UNIX_EPOCH);
    }
}
