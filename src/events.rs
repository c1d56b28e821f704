//! Hook event and notification records.
//!
//! `HookEvent` is one line of the append-only JSONL log written by the
//! external hook process; the tracker only ever reads it. `NotificationEvent`
//! is the immutable snapshot handed from the tracker to the orchestrator —
//! nothing downstream ever sees the tracker's mutable state.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum HookEventType {
    UserPromptSubmit,
    PostToolUse,
    Stop,
    #[serde(other)]
    Unknown,
}

/// One record from the hook event log. Unknown fields are ignored and
/// malformed lines are skipped by the tailer, so this only needs to model
/// what the pipeline consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    pub event_type: HookEventType,
    /// Epoch milliseconds. RFC3339 strings are accepted on the wire and
    /// converted at parse time.
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: i64,
    pub session_id: String,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub files_modified: Option<Vec<String>>,
    #[serde(default)]
    pub tools_used: Option<Vec<String>>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Normalized handoff record from tracker to orchestrator. Immutable once
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub transaction_id: String,
    pub session_id: String,
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    pub duration_ms: i64,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub stop_payload: serde_json::Value,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    #[serde(default)]
    pub model: Option<String>,
}

impl NotificationEvent {
    /// Display label for log lines and channel messages.
    pub fn label(&self) -> &str {
        self.session_name
            .as_deref()
            .or(self.project_name.as_deref())
            .unwrap_or(&self.session_id)
    }
}

/// Accept epoch milliseconds (integer or float) or an RFC3339 string.
fn de_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct TimestampVisitor;

    impl Visitor<'_> for TimestampVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("epoch milliseconds or an RFC3339 timestamp")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom("timestamp out of range"))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            Ok(v as i64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            chrono::DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.timestamp_millis())
                .map_err(|e| E::custom(format!("bad timestamp {v:?}: {e}")))
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
