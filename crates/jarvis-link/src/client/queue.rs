//! Offline queue of undelivered user turns.

use crate::traits::KeyValueStore;
use crate::types::QueuedTurn;
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// FIFO store of turns written while the link was down.
///
/// The in-memory deque is authoritative; every mutation is mirrored to the
/// backing store as a JSON array. Store failures are logged and the queue
/// keeps working from memory.
pub struct OfflineQueue {
    turns: VecDeque<QueuedTurn>,
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl OfflineQueue {
    /// Open the queue, loading entries left by a previous process.
    pub fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let turns = match store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<QueuedTurn>>(&raw) {
                Ok(turns) => {
                    if !turns.is_empty() {
                        info!("[Queue] Restored {} pending turns", turns.len());
                    }
                    turns.into()
                }
                Err(e) => {
                    warn!("[Queue] Discarding unreadable pending turns: {}", e);
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(e) => {
                warn!("[Queue] Storage unavailable, queue is memory-only: {}", e);
                VecDeque::new()
            }
        };
        Self { turns, store, key }
    }

    pub fn enqueue(&mut self, turn: QueuedTurn) {
        self.turns.push_back(turn);
        debug!("[Queue] Enqueued turn ({} pending)", self.turns.len());
        self.persist();
    }

    /// Put turns back at the head of the queue, in the given order.
    pub fn requeue_front(&mut self, turns: Vec<QueuedTurn>) {
        if turns.is_empty() {
            return;
        }
        debug!("[Queue] Requeued {} undelivered turns", turns.len());
        for turn in turns.into_iter().rev() {
            self.turns.push_front(turn);
        }
        self.persist();
    }

    /// Deliver queued turns to `sink` in FIFO order.
    ///
    /// Each turn is removed once `sink` accepts it. The first rejection stops
    /// the drain and leaves that turn and everything after it queued.
    /// Returns the number of turns delivered.
    pub fn drain_into<E, F>(&mut self, mut sink: F) -> usize
    where
        E: Display,
        F: FnMut(&QueuedTurn) -> Result<(), E>,
    {
        let mut delivered = 0;
        while let Some(turn) = self.turns.front() {
            match sink(turn) {
                Ok(()) => {
                    self.turns.pop_front();
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        "[Queue] Drain halted after {} turns, {} remain: {}",
                        delivered,
                        self.turns.len(),
                        e
                    );
                    break;
                }
            }
        }
        if delivered > 0 {
            info!("[Queue] Flushed {} pending turns", delivered);
            self.persist();
        }
        delivered
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedTurn> {
        self.turns.iter()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.persist();
    }

    fn persist(&self) {
        let result = if self.turns.is_empty() {
            self.store.remove(&self.key)
        } else {
            match serde_json::to_string(&self.turns) {
                Ok(raw) => self.store.set(&self.key, &raw),
                Err(e) => Err(e.into()),
            }
        };
        if let Err(e) = result {
            warn!("[Queue] Failed to persist pending turns: {}", e);
        }
    }
}
