use crate::chat::SessionEvent;
use tokio::sync::broadcast;

/// UI event broadcast for one chat session
pub type SessionEventBroadcast = broadcast::Sender<SessionEvent>;

/// Helper to broadcast an event
pub fn broadcast_event(broadcast_tx: &SessionEventBroadcast, event: SessionEvent) -> usize {
    match broadcast_tx.send(event) {
        Ok(subscriber_count) => {
            tracing::trace!("[Chat] Event broadcast to {} subscribers", subscriber_count);
            subscriber_count
        }
        Err(e) => {
            tracing::debug!("[Chat] No subscribers to receive event: {:?}", e.0.name());
            0
        }
    }
}
