//! Plain-text rendering of turns for the terminal.

use crate::chat::ChatTurn;
use jarvis_content::{ContentBlock, ErrorKind};
use std::fmt::Write;

pub fn render_turn(turn: &ChatTurn) -> String {
    let speaker = if turn.is_user { "you" } else { "jarvis" };
    let mut out = format!("[{}] {}:\n", turn.timestamp, speaker);
    for block in turn.visible_blocks() {
        render_block(&mut out, block);
    }
    out
}

pub fn render_block(out: &mut String, block: &ContentBlock) {
    match block {
        ContentBlock::Text { markdown } => {
            out.push_str(markdown.trim_matches('\n'));
            out.push('\n');
        }
        ContentBlock::Code {
            language, source, ..
        } => {
            let _ = writeln!(out, "--- {} ---", language.as_deref().unwrap_or("code"));
            indented(out, source);
        }
        ContentBlock::GraphDiagram { source, .. } => {
            out.push_str("--- graph ---\n");
            indented(out, source);
        }
        ContentBlock::ChartSpec { parsed, raw, .. } => {
            out.push_str("--- chart ---\n");
            let pretty = serde_json::to_string_pretty(parsed).unwrap_or_else(|_| raw.clone());
            indented(out, &pretty);
        }
        ContentBlock::Error {
            kind,
            message,
            original_source,
        } => {
            let label = match kind {
                ErrorKind::Parse => "parse error",
                ErrorKind::Validation => "invalid chart",
            };
            let _ = writeln!(out, "--- {}: {} ---", label, message);
            indented(out, original_source);
        }
    }
}

fn indented(out: &mut String, body: &str) {
    for line in body.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
}
