use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

/// Everything a try-on session can record, in the order a session usually
/// produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted,
    PersonUploaded,
    ClothingUploaded,
    DescriptionReady,
    GenerationRejected,
    GenerationStarted,
    GenerationFinished,
    GenerationFailed,
    PoseSelected,
    AccessoryStarted,
    AccessoryApplied,
    AccessoryFailed,
    ChatMessage,
    ChatReply,
    ChatFailed,
    StaleResultDiscarded,
    SessionFinished,
}

impl SessionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::PersonUploaded => "person_uploaded",
            Self::ClothingUploaded => "clothing_uploaded",
            Self::DescriptionReady => "description_ready",
            Self::GenerationRejected => "generation_rejected",
            Self::GenerationStarted => "generation_started",
            Self::GenerationFinished => "generation_finished",
            Self::GenerationFailed => "generation_failed",
            Self::PoseSelected => "pose_selected",
            Self::AccessoryStarted => "accessory_started",
            Self::AccessoryApplied => "accessory_applied",
            Self::AccessoryFailed => "accessory_failed",
            Self::ChatMessage => "chat_message",
            Self::ChatReply => "chat_reply",
            Self::ChatFailed => "chat_failed",
            Self::StaleResultDiscarded => "stale_result_discarded",
            Self::SessionFinished => "session_finished",
        }
    }
}

/// One line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    #[serde(rename = "type")]
    pub event: SessionEvent,
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

const RESERVED_KEYS: [&str; 4] = ["seq", "type", "session_id", "ts"];

/// Appends [`EventRecord`]s for one session. Clones share the file and the
/// sequence counter, so `seq` is strictly increasing across all of them.
#[derive(Debug, Clone)]
pub struct SessionLog {
    inner: Arc<SessionLogInner>,
}

#[derive(Debug)]
struct SessionLogInner {
    path: PathBuf,
    session_id: String,
    next_seq: Mutex<u64>,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLogInner {
                path: path.into(),
                session_id: session_id.into(),
                next_seq: Mutex::new(0),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Records `event`. Payload keys that collide with the record's own
    /// fields are dropped.
    pub fn emit(&self, event: SessionEvent, mut payload: EventPayload) -> anyhow::Result<EventRecord> {
        payload.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));

        let mut next_seq = self
            .inner
            .next_seq
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))?;
        let record = EventRecord {
            seq: *next_seq,
            event,
            session_id: self.inner.session_id.clone(),
            ts: now_utc_iso(),
            payload,
        };

        if let Some(parent) = self.inner.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to {}", self.inner.path.display()))?;

        *next_seq += 1;
        Ok(record)
    }
}

/// Reads back every record of an `events.jsonl` file, skipping blank lines.
pub fn read_events(path: &Path) -> anyhow::Result<Vec<EventRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed event", path.display(), index + 1))
        })
        .collect()
}

pub fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4().simple())
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;
    use serde_json::{json, Value};

    use super::{new_session_id, read_events, EventPayload, SessionEvent, SessionLog};

    fn payload(value: Value) -> EventPayload {
        match value {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        }
    }

    #[test]
    fn record_carries_type_seq_and_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = SessionLog::new(&path, "session-123");

        let record = log.emit(
            SessionEvent::GenerationStarted,
            payload(json!({"pose": "standard"})),
        )?;

        let content = fs::read_to_string(&path)?;
        let line: Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(line["type"], "generation_started");
        assert_eq!(line["seq"], 0);
        assert_eq!(line["session_id"], "session-123");
        assert_eq!(line["pose"], "standard");
        DateTime::parse_from_rfc3339(&record.ts)?;
        Ok(())
    }

    #[test]
    fn reserved_keys_cannot_be_spoofed() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = SessionLog::new(temp.path().join("events.jsonl"), "session-123");

        let record = log.emit(
            SessionEvent::PersonUploaded,
            payload(json!({"session_id": "other", "type": "chat_reply", "bytes": 12})),
        )?;

        assert_eq!(record.session_id, "session-123");
        assert_eq!(record.event, SessionEvent::PersonUploaded);
        assert_eq!(record.payload.len(), 1);
        assert_eq!(record.payload["bytes"], 12);
        Ok(())
    }

    #[test]
    fn clones_share_one_sequence() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let log = SessionLog::new(&path, "session-123");

        log.emit(SessionEvent::SessionStarted, EventPayload::new())?;
        log.clone()
            .emit(SessionEvent::ChatMessage, payload(json!({"text": "oi"})))?;
        log.emit(SessionEvent::SessionFinished, EventPayload::new())?;

        let records = read_events(&path)?;
        let seqs: Vec<u64> = records.iter().map(|record| record.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(records[1].event, SessionEvent::ChatMessage);
        assert_eq!(records[1].payload["text"], "oi");
        Ok(())
    }

    #[test]
    fn malformed_line_names_its_position() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        fs::write(&path, "\n{\"oops\": true}\n")?;

        let err = read_events(&path).unwrap_err();
        assert!(format!("{err:#}").contains("events.jsonl:2"));
        Ok(())
    }

    #[test]
    fn names_match_serde() -> anyhow::Result<()> {
        for event in [
            SessionEvent::SessionStarted,
            SessionEvent::StaleResultDiscarded,
            SessionEvent::AccessoryFailed,
        ] {
            assert_eq!(serde_json::to_value(event)?, Value::from(event.as_str()));
        }
        Ok(())
    }

    #[test]
    fn session_ids_are_unique() {
        let a = new_session_id();
        let b = new_session_id();
        assert!(a.starts_with("session-"));
        assert_ne!(a, b);
    }
}
