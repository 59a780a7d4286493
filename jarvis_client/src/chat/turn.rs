use jarvis_content::{parse, ContentBlock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One rendered message. Blocks are shared, never mutated after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub content: Arc<[ContentBlock]>,
    pub is_user: bool,
    pub timestamp: String,
    pub raw: String,
}

impl ChatTurn {
    pub fn new(raw: impl Into<String>, is_user: bool, timestamp: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            content: parse(&raw).into(),
            is_user,
            timestamp: timestamp.into(),
            raw,
        }
    }

    pub fn user(raw: impl Into<String>) -> Self {
        Self::new(raw, true, now_label())
    }

    pub fn assistant(raw: impl Into<String>) -> Self {
        Self::new(raw, false, now_label())
    }

    pub fn to_stored(&self) -> StoredTurn {
        StoredTurn {
            content: self.raw.clone(),
            is_user: self.is_user,
            timestamp: self.timestamp.clone(),
        }
    }

    /// Blocks worth drawing: whitespace-only prose is skipped.
    pub fn visible_blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content.iter().filter(|b| !b.is_blank())
    }
}

/// Persisted form of a turn. Content is kept raw and re-parsed on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTurn {
    pub content: String,
    pub is_user: bool,
    #[serde(default)]
    pub timestamp: String,
}

impl From<StoredTurn> for ChatTurn {
    fn from(stored: StoredTurn) -> Self {
        ChatTurn::new(stored.content, stored.is_user, stored.timestamp)
    }
}

fn now_label() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_parses_content() {
        let turn = ChatTurn::assistant("see\n```mermaid\ngraph TD; A-->B\n```\n");
        assert!(!turn.is_user);
        assert_eq!(turn.content.len(), 3);
        assert!(matches!(turn.content[1], ContentBlock::GraphDiagram { .. }));
        assert_eq!(turn.visible_blocks().count(), 2);
    }

    #[test]
    fn test_stored_shape() {
        let turn = ChatTurn::new("hi", true, "10:00:00");
        let json = serde_json::to_value(turn.to_stored()).unwrap();
        assert_eq!(json, serde_json::json!({"content": "hi", "isUser": true, "timestamp": "10:00:00"}));
    }

    #[test]
    fn test_restore_reparses() {
        let stored: StoredTurn =
            serde_json::from_str(r#"{"content":"```diagram-chart\n{\"x\":}\n```","isUser":false}"#)
                .unwrap();
        let turn = ChatTurn::from(stored);
        assert!(turn.content[0].is_error());
        assert_eq!(turn.timestamp, "");
    }
}
