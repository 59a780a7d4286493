use crate::types::SendOptions;
use serde::{Deserialize, Serialize};

/// A user turn that could not be delivered and waits for the next open link.
///
/// Persisted as `{message, options, timestamp, sessionId}` so entries written
/// by older clients (without `sessionId`) still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTurn {
    #[serde(rename = "message")]
    pub text: String,
    pub options: SendOptions,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub enqueued_at: u64,
    /// Session the turn was written in. `None` flushes under the current one.
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl QueuedTurn {
    pub fn new(text: impl Into<String>, options: SendOptions, enqueued_at: u64) -> Self {
        Self {
            text: text.into(),
            options,
            enqueued_at,
            session_id: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
