//! Per-kind checks for fenced regions.

use crate::block::{ContentBlock, ErrorKind, Fence};
use tracing::debug;

pub const GRAPH_TAGS: &[&str] = &["diagram-graph", "mermaid"];
pub const CHART_TAGS: &[&str] = &["diagram-chart", "echarts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    Graph,
    Chart,
}

impl DiagramKind {
    /// Tags compare case-insensitively.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let matches = |tags: &[&str]| tags.iter().any(|t| t.eq_ignore_ascii_case(tag));
        if matches(GRAPH_TAGS) {
            Some(DiagramKind::Graph)
        } else if matches(CHART_TAGS) {
            Some(DiagramKind::Chart)
        } else {
            None
        }
    }
}

/// Graph bodies are passed through opaque. Only emptiness is rejected.
pub fn validate_graph(fence: Fence) -> ContentBlock {
    let source = fence.body.trim();
    if source.is_empty() {
        debug!("[Content] empty graph diagram");
        return error_block(ErrorKind::Parse, "diagram is empty", &fence);
    }
    ContentBlock::GraphDiagram {
        source: source.to_string(),
        fence,
    }
}

/// Chart bodies must be a JSON object.
pub fn validate_chart(fence: Fence) -> ContentBlock {
    let raw = fence.body.trim();
    if raw.is_empty() {
        debug!("[Content] empty chart spec");
        return error_block(ErrorKind::Parse, "chart spec is empty", &fence);
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(parsed) if parsed.is_object() => ContentBlock::ChartSpec {
            raw: raw.to_string(),
            parsed,
            fence,
        },
        Ok(_) => error_block(
            ErrorKind::Validation,
            "chart spec must be a JSON object",
            &fence,
        ),
        Err(e) => {
            debug!("[Content] invalid chart spec: {}", e);
            error_block(
                ErrorKind::Validation,
                &format!("chart spec is not valid JSON: {}", e),
                &fence,
            )
        }
    }
}

fn error_block(kind: ErrorKind, message: &str, fence: &Fence) -> ContentBlock {
    ContentBlock::Error {
        kind,
        message: message.to_string(),
        original_source: fence.source(),
    }
}
