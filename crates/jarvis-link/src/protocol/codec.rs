//! Frame encoding and decoding.

use crate::error::Result;
use crate::types::{InboundFrame, OutboundFrame, QueuedTurn};

/// Serialize an outbound frame to the text written on the socket.
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String> {
    Ok(serde_json::to_string(frame)?)
}

/// Build and serialize the frame for a queued turn.
///
/// The turn's own session wins over `current_session`.
pub fn encode_queued(turn: &QueuedTurn, current_session: &str) -> Result<String> {
    let session = turn.session_id.as_deref().unwrap_or(current_session);
    encode_outbound(&OutboundFrame::new(
        turn.text.clone(),
        session,
        turn.options.clone(),
    ))
}

/// Turn a frame the transport could not deliver back into a queued turn,
/// keeping the session it was written under.
pub fn decode_undelivered(raw: &str, enqueued_at: u64) -> Result<QueuedTurn> {
    let frame: OutboundFrame = serde_json::from_str(raw)?;
    Ok(QueuedTurn::new(frame.content, frame.options, enqueued_at).with_session(frame.session_id))
}

/// Parse one inbound text frame.
///
/// Anything that is not a JSON object is a decode failure.
pub fn decode_inbound(text: &str) -> Result<InboundFrame> {
    Ok(serde_json::from_str(text)?)
}
