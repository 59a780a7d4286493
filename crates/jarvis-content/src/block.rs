use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The exact text of one fenced region, split at the delimiters.
///
/// `opening` is the marker plus the rest of its line (tag and newline),
/// `closing` is the closing marker or `None` when the input ended first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fence {
    pub opening: String,
    pub body: String,
    pub closing: Option<String>,
}

impl Fence {
    pub fn source(&self) -> String {
        let mut out = String::with_capacity(
            self.opening.len() + self.body.len() + self.closing.as_ref().map_or(0, String::len),
        );
        out.push_str(&self.opening);
        out.push_str(&self.body);
        if let Some(closing) = &self.closing {
            out.push_str(closing);
        }
        out
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.closing.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The fence itself cannot be rendered (e.g. an empty diagram).
    Parse,
    /// The body is not valid structured data for its kind.
    Validation,
}

/// One independently renderable piece of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Prose, handed to a markdown renderer as is.
    Text { markdown: String },
    Code {
        language: Option<String>,
        source: String,
        fence: Fence,
    },
    /// Opaque graph description; syntax is checked by the renderer.
    GraphDiagram { source: String, fence: Fence },
    ChartSpec {
        raw: String,
        parsed: serde_json::Value,
        fence: Fence,
    },
    Error {
        kind: ErrorKind,
        message: String,
        /// The complete fenced region, markers included.
        original_source: String,
    },
}

impl ContentBlock {
    /// The message text this block was cut from.
    pub fn source_text(&self) -> Cow<'_, str> {
        match self {
            ContentBlock::Text { markdown } => Cow::Borrowed(markdown),
            ContentBlock::Code { fence, .. }
            | ContentBlock::GraphDiagram { fence, .. }
            | ContentBlock::ChartSpec { fence, .. } => Cow::Owned(fence.source()),
            ContentBlock::Error {
                original_source, ..
            } => Cow::Borrowed(original_source),
        }
    }

    /// Text made only of whitespace. Renderers usually skip these.
    pub fn is_blank(&self) -> bool {
        matches!(self, ContentBlock::Text { markdown } if markdown.trim().is_empty())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ContentBlock::Error { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ContentBlock::Text { .. } => "text",
            ContentBlock::Code { .. } => "code",
            ContentBlock::GraphDiagram { .. } => "graph_diagram",
            ContentBlock::ChartSpec { .. } => "chart_spec",
            ContentBlock::Error { .. } => "error",
        }
    }
}

/// Rebuild the original message from its blocks.
pub fn reassemble(blocks: &[ContentBlock]) -> String {
    blocks.iter().map(|b| b.source_text()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_source_with_and_without_closing() {
        let mut fence = Fence {
            opening: "```rust\n".into(),
            body: "fn main() {}\n".into(),
            closing: Some("```".into()),
        };
        assert_eq!(fence.source(), "```rust\nfn main() {}\n```");
        fence.closing = None;
        assert_eq!(fence.source(), "```rust\nfn main() {}\n");
        assert!(!fence.is_terminated());
    }

    #[test]
    fn test_blank_text() {
        assert!(ContentBlock::Text { markdown: " \n\t".into() }.is_blank());
        assert!(!ContentBlock::Text { markdown: "hi".into() }.is_blank());
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let block = ContentBlock::Error {
            kind: ErrorKind::Validation,
            message: "bad".into(),
            original_source: "```diagram-chart\n{\n```".into(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "validation");
    }
}
