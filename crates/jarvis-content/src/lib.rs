//! Structured message content.
//!
//! A chat message is markdown with embedded fenced regions. [`parse`] splits
//! it into an ordered list of [`ContentBlock`]s: prose, source code, graph
//! diagrams and chart specs. A malformed chart spec becomes an inline
//! [`ContentBlock::Error`] instead of failing the whole message.

pub mod block;
pub mod parser;
pub mod validate;

pub use block::{reassemble, ContentBlock, ErrorKind, Fence};
pub use parser::{parse, FENCE_MARKER};
pub use validate::{DiagramKind, CHART_TAGS, GRAPH_TAGS};
