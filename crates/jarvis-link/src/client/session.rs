//! Durable session identity.

use crate::traits::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The token that ties every outbound turn to one logical conversation.
///
/// Ids come from UUIDv7, which embeds a millisecond timestamp and random
/// bits, so two ids minted in the same millisecond still differ.
pub struct SessionIdentity {
    store: Arc<dyn KeyValueStore>,
    key: String,
    current: Option<String>,
    durable: bool,
}

impl SessionIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            current: None,
            durable: true,
        }
    }

    /// Current id, loading or minting (and persisting) one on first use.
    pub fn get(&mut self) -> String {
        if let Some(id) = &self.current {
            return id.clone();
        }

        if let Some(id) = self.load() {
            debug!("[Session] Restored session {}", id);
            self.current = Some(id.clone());
            return id;
        }

        let id = Self::mint();
        info!("[Session] Created session {}", id);
        self.persist(&id);
        self.current = Some(id.clone());
        id
    }

    /// Replace the id with a fresh one. Used only for a new conversation.
    pub fn reset(&mut self) -> String {
        let id = Self::mint();
        info!("[Session] Reset session to {}", id);
        self.persist(&id);
        self.current = Some(id.clone());
        id
    }

    /// Whether the id is still backed by durable storage.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    fn mint() -> String {
        uuid::Uuid::now_v7().simple().to_string()
    }

    fn load(&mut self) -> Option<String> {
        if !self.durable {
            return None;
        }
        match self.store.get(&self.key) {
            Ok(Some(id)) if !id.trim().is_empty() => Some(id),
            Ok(_) => None,
            Err(e) => {
                warn!("[Session] Storage unavailable, keeping id in memory: {}", e);
                self.durable = false;
                None
            }
        }
    }

    fn persist(&mut self, id: &str) {
        if !self.durable {
            return;
        }
        if let Err(e) = self.store.set(&self.key, id) {
            warn!("[Session] Failed to persist session id, keeping it in memory: {}", e);
            self.durable = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MemoryStore, UnavailableStore};

    #[test]
    fn test_get_creates_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut identity = SessionIdentity::new(store.clone(), "sessionId");
        let id = identity.get();
        assert!(!id.is_empty());
        assert_eq!(identity.get(), id);
        assert_eq!(store.get("sessionId").unwrap(), Some(id));
    }

    #[test]
    fn test_get_survives_reload() {
        let store = Arc::new(MemoryStore::new());
        let first = SessionIdentity::new(store.clone(), "sessionId").get();
        let second = SessionIdentity::new(store, "sessionId").get();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_replaces_id() {
        let store = Arc::new(MemoryStore::new());
        let mut identity = SessionIdentity::new(store.clone(), "sessionId");
        let old = identity.get();
        let new = identity.reset();
        assert_ne!(old, new);
        assert_eq!(identity.get(), new);
        assert_eq!(store.get("sessionId").unwrap(), Some(new));
    }

    #[test]
    fn test_storage_failure_degrades_to_memory() {
        let mut identity = SessionIdentity::new(Arc::new(UnavailableStore), "sessionId");
        let id = identity.get();
        assert!(!identity.is_durable());
        assert_eq!(identity.get(), id);
        assert_ne!(identity.reset(), id);
    }
}
