use super::turn::{ChatTurn, StoredTurn};
use crate::realtime::{broadcast_event, SessionEventBroadcast};
use jarvis_link::traits::KeyValueStore;
use jarvis_link::{ConnectionManager, InboundFrame, SendOptions, SendOutcome, Subscription};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Storage key for the persisted turn list.
pub const HISTORY_KEY: &str = "chatMessages";

const EVENT_CAPACITY: usize = 256;

/// What the UI reacts to.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A turn was appended; scroll to it.
    TurnAppended { index: usize, turn: ChatTurn },
    Connectivity(bool),
    /// The backend answered with `{error}` instead of content.
    BackendError(String),
    /// The turn list was emptied for a new conversation.
    Cleared { session_id: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::TurnAppended { .. } => "turn_appended",
            SessionEvent::Connectivity(_) => "connectivity",
            SessionEvent::BackendError(_) => "backend_error",
            SessionEvent::Cleared { .. } => "cleared",
        }
    }
}

struct SessionInner {
    link: ConnectionManager,
    store: Arc<dyn KeyValueStore>,
    turns: RwLock<Vec<ChatTurn>>,
    events: SessionEventBroadcast,
}

/// Owns the turn list and binds it to a [`ConnectionManager`].
pub struct ChatSession {
    inner: Arc<SessionInner>,
    subscriptions: Vec<Subscription>,
}

impl ChatSession {
    /// Restore history from `store` and start listening on `link`.
    pub fn new(link: ConnectionManager, store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let turns = load_history(store.as_ref());
        if !turns.is_empty() {
            info!("[Chat] Restored {} turns", turns.len());
        }

        let inner = Arc::new(SessionInner {
            link,
            store,
            turns: RwLock::new(turns),
            events,
        });

        let weak = Arc::downgrade(&inner);
        let on_message = inner.link.on_message(move |frame| {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame(frame);
            }
        });
        let weak = Arc::downgrade(&inner);
        let on_status = inner.link.on_status_change(move |connected| {
            if let Some(inner) = weak.upgrade() {
                broadcast_event(&inner.events, SessionEvent::Connectivity(connected));
            }
        });

        Self {
            inner,
            subscriptions: vec![on_message, on_status],
        }
    }

    /// Append the user's turn and hand it to the link.
    ///
    /// Blank input is ignored and returns `None`.
    pub fn send(&self, text: &str, options: &SendOptions) -> Option<SendOutcome> {
        if text.trim().is_empty() {
            return None;
        }
        self.inner.append(ChatTurn::user(text));
        let outcome = self.inner.link.send(text, options);
        if outcome == SendOutcome::Queued {
            info!(
                "[Chat] Offline, turn queued ({} pending)",
                self.inner.link.pending_count()
            );
        }
        Some(outcome)
    }

    /// Clear the turn list and start a new session id. Queued turns are kept
    /// and still flushed under the session they were written in.
    pub fn new_conversation(&self) -> String {
        {
            let mut turns = self.inner.turns.write();
            turns.clear();
            if let Err(e) = self.inner.store.remove(HISTORY_KEY) {
                warn!("[Chat] Failed to clear history: {}", e);
            }
        }
        let session_id = self.inner.link.create_new_session();
        info!("[Session] New conversation {}", session_id);
        broadcast_event(
            &self.inner.events,
            SessionEvent::Cleared {
                session_id: session_id.clone(),
            },
        );
        session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the turn list.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.inner.turns.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn link(&self) -> &ConnectionManager {
        &self.inner.link
    }

    pub fn session_id(&self) -> String {
        self.inner.link.session_id()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.link.is_connected()
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl SessionInner {
    fn on_frame(&self, frame: &InboundFrame) {
        if let Some(error) = &frame.error {
            warn!("[Chat] Backend error: {}", error);
            broadcast_event(&self.events, SessionEvent::BackendError(error.clone()));
            return;
        }
        match frame.content_str() {
            Some(content) => self.append(ChatTurn::assistant(content)),
            None => debug!("[Chat] Ignoring frame without content"),
        }
    }

    fn append(&self, turn: ChatTurn) {
        let index = {
            let mut turns = self.turns.write();
            turns.push(turn.clone());
            let stored: Vec<StoredTurn> = turns.iter().map(ChatTurn::to_stored).collect();
            match serde_json::to_string(&stored) {
                Ok(raw) => {
                    if let Err(e) = self.store.set(HISTORY_KEY, &raw) {
                        warn!("[Chat] Failed to persist history: {}", e);
                    }
                }
                Err(e) => warn!("[Chat] Failed to encode history: {}", e),
            }
            turns.len() - 1
        };
        broadcast_event(&self.events, SessionEvent::TurnAppended { index, turn });
    }
}

fn load_history(store: &dyn KeyValueStore) -> Vec<ChatTurn> {
    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("[Chat] History unavailable: {}", e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<StoredTurn>>(&raw) {
        Ok(stored) => stored.into_iter().map(ChatTurn::from).collect(),
        Err(e) => {
            warn!("[Chat] Discarding malformed history: {}", e);
            Vec::new()
        }
    }
}
