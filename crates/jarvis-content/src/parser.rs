//! Fence scanner.
//!
//! A fence opens with [`FENCE_MARKER`] anywhere in the text; the rest of that
//! line, which must end in a newline, is the info string whose first word is
//! the tag. The body runs up to the next marker. A marker whose line contains
//! another backtick is inline code and stays part of the surrounding prose.

use crate::block::{ContentBlock, Fence};
use crate::validate::{validate_chart, validate_graph, DiagramKind};
use tracing::trace;

pub const FENCE_MARKER: &str = "```";

/// Split a message into blocks in reading order.
///
/// Never fails. Concatenating `source_text()` of the result gives back
/// `message` exactly.
pub fn parse(message: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut text_start = 0;
    let mut scan = 0;

    while let Some(rel) = message[scan..].find(FENCE_MARKER) {
        let open_at = scan + rel;
        let info_start = open_at + FENCE_MARKER.len();
        // No newline after the marker: nothing further can open a fence.
        let Some(nl) = message[info_start..].find('\n') else {
            break;
        };
        let info = &message[info_start..info_start + nl];
        let body_start = info_start + nl + 1;

        if let Some(inline_close) = info.find(FENCE_MARKER) {
            // ```like this``` on one line
            scan = info_start + inline_close + FENCE_MARKER.len();
            continue;
        }
        if info.contains('`') {
            scan = info_start;
            continue;
        }

        push_text(&mut blocks, &message[text_start..open_at]);

        let tag = info.split_whitespace().next().map(str::to_string);
        let opening = message[open_at..body_start].to_string();
        let (body, closing, end) = match message[body_start..].find(FENCE_MARKER) {
            Some(rel_close) => {
                let close_at = body_start + rel_close;
                (
                    &message[body_start..close_at],
                    Some(FENCE_MARKER.to_string()),
                    close_at + FENCE_MARKER.len(),
                )
            }
            None => (&message[body_start..], None, message.len()),
        };

        let fence = Fence {
            opening,
            body: body.to_string(),
            closing,
        };
        trace!(
            "[Content] fence tag={:?} terminated={} bytes={}",
            tag,
            fence.is_terminated(),
            fence.body.len()
        );
        blocks.push(classify(tag, fence));

        text_start = end;
        scan = end;
    }

    push_text(&mut blocks, &message[text_start..]);
    blocks
}

fn classify(tag: Option<String>, fence: Fence) -> ContentBlock {
    // An unterminated fence is still streaming or was cut off. Show it as
    // code rather than validating half a spec.
    let kind = match (&tag, fence.is_terminated()) {
        (Some(t), true) => DiagramKind::from_tag(t),
        _ => None,
    };
    match kind {
        Some(DiagramKind::Graph) => validate_graph(fence),
        Some(DiagramKind::Chart) => validate_chart(fence),
        None => code_block(tag, fence),
    }
}

fn code_block(language: Option<String>, fence: Fence) -> ContentBlock {
    let body = fence.body.as_str();
    let source = body
        .strip_suffix("\r\n")
        .or_else(|| body.strip_suffix('\n'))
        .unwrap_or(body)
        .to_string();
    ContentBlock::Code {
        language,
        source,
        fence,
    }
}

fn push_text(blocks: &mut Vec<ContentBlock>, span: &str) {
    if span.is_empty() {
        return;
    }
    blocks.push(ContentBlock::Text {
        markdown: span.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{reassemble, ErrorKind};

    fn kinds(blocks: &[ContentBlock]) -> Vec<&'static str> {
        blocks.iter().map(ContentBlock::kind_name).collect()
    }

    #[test]
    fn test_plain_text_is_one_block() {
        let blocks = parse("just some **markdown**");
        assert_eq!(
            blocks,
            vec![ContentBlock::Text {
                markdown: "just some **markdown**".into()
            }]
        );
    }

    #[test]
    fn test_empty_message_has_no_blocks() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_code_block_language_and_source() {
        let blocks = parse("Try:\n```rust\nfn main() {}\n```\nDone.");
        assert_eq!(kinds(&blocks), vec!["text", "code", "text"]);
        match &blocks[1] {
            ContentBlock::Code {
                language, source, ..
            } => {
                assert_eq!(language.as_deref(), Some("rust"));
                assert_eq!(source, "fn main() {}");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_untagged_fence_is_code_without_language() {
        let blocks = parse("```\nls -la\n```");
        match &blocks[0] {
            ContentBlock::Code { language, .. } => assert!(language.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_info_string_uses_first_word() {
        let blocks = parse("```python title=\"x.py\"\nprint(1)\n```");
        match &blocks[0] {
            ContentBlock::Code { language, .. } => assert_eq!(language.as_deref(), Some("python")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mixed_blocks_keep_order() {
        let msg = "Intro\n```diagram-graph\ngraph TD; A-->B\n```\nmiddle\n```diagram-chart\n{\"series\":[1,2,3]}\n```\n```js\nx()\n```";
        let blocks = parse(msg);
        assert_eq!(
            kinds(&blocks),
            vec!["text", "graph_diagram", "text", "chart_spec", "text", "code"]
        );
        assert_eq!(reassemble(&blocks), msg);
    }

    #[test]
    fn test_unterminated_chart_becomes_code() {
        let msg = "hello ```diagram-chart\n{bad";
        let blocks = parse(msg);
        assert_eq!(kinds(&blocks), vec!["text", "code"]);
        assert_eq!(blocks[0], ContentBlock::Text { markdown: "hello ".into() });
        match &blocks[1] {
            ContentBlock::Code {
                language,
                source,
                fence,
            } => {
                assert_eq!(language.as_deref(), Some("diagram-chart"));
                assert_eq!(source, "{bad");
                assert!(!fence.is_terminated());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(reassemble(&blocks), msg);
    }

    #[test]
    fn test_invalid_chart_keeps_original_source() {
        let msg = "```diagram-chart\n{\"x\":}\n```";
        let blocks = parse(msg);
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::Error {
                kind,
                original_source,
                ..
            } => {
                assert_eq!(*kind, ErrorKind::Validation);
                assert_eq!(original_source, msg);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_inline_triple_backticks_stay_text() {
        let msg = "use ```cargo build``` then\n```sh\nrun\n```";
        let blocks = parse(msg);
        assert_eq!(kinds(&blocks), vec!["text", "code"]);
        assert_eq!(
            blocks[0],
            ContentBlock::Text {
                markdown: "use ```cargo build``` then\n".into()
            }
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let msg = "```rust\r\nlet x = 1;\r\n```";
        let blocks = parse(msg);
        match &blocks[0] {
            ContentBlock::Code {
                language, source, ..
            } => {
                assert_eq!(language.as_deref(), Some("rust"));
                assert_eq!(source, "let x = 1;");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(reassemble(&blocks), msg);
    }

    #[test]
    fn test_marker_without_newline_stays_text() {
        for msg in ["trailing ```", "```rust", "see ```python fn"] {
            let blocks = parse(msg);
            assert_eq!(kinds(&blocks), vec!["text"], "{:?}", msg);
            assert_eq!(reassemble(&blocks), msg);
        }
    }

    #[test]
    fn test_tag_line_then_end_is_unterminated_code() {
        let blocks = parse("```rust\n");
        match &blocks[..] {
            [ContentBlock::Code {
                language, source, ..
            }] => {
                assert_eq!(language.as_deref(), Some("rust"));
                assert!(source.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
