//! JSON frames exchanged with the backend over the socket.

use crate::types::SendOptions;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One outbound user turn: `{content, sessionId, model, whisperModel, ttsVoice}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundFrame {
    pub content: String,
    pub session_id: String,
    #[serde(flatten)]
    pub options: SendOptions,
}

impl OutboundFrame {
    pub fn new(content: impl Into<String>, session_id: impl Into<String>, options: SendOptions) -> Self {
        Self {
            content: content.into(),
            session_id: session_id.into(),
            options,
        }
    }
}

/// One inbound frame. Only `content` is meaningful to the chat layer;
/// `error` is the backend's failure reply, everything else passes through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundFrame {
    #[inline]
    #[must_use]
    pub fn content_str(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
