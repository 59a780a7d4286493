use crate::error::{LinkError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Abstraction for asynchronous runtime operations.
pub trait ChatRuntime: Send + Sync + 'static {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>);
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
    fn now_ms(&self) -> u64;
}

/// Lifecycle and data events reported by an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// Frames accepted by `TransportHandle::send` that never reached the
    /// wire, oldest first. Sent before the `Error`/`Closed` that follows.
    Undelivered(Vec<String>),
    Closed,
    Error(String),
}

/// Write side of one transport connection.
pub trait TransportHandle: Send + Sync {
    /// Queue one text frame for writing. Must not block.
    fn send(&self, frame: &str) -> Result<()>;
    fn close(&self);
}

/// Abstraction for the socket-shaped channel to the backend.
///
/// `open` must return without waiting for the connection to complete. All
/// outcomes, including a failed handshake, arrive on the returned receiver.
pub trait Transport: Send + Sync + 'static {
    fn open(
        &self,
        url: &str,
    ) -> Result<(
        Box<dyn TransportHandle>,
        async_channel::Receiver<TransportEvent>,
    )>;
}

/// Abstraction for durable string storage (a `localStorage`-shaped store).
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store. Also the fallback when durable storage is unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// A store that refuses every operation. Useful for exercising the
/// in-memory fallback paths.
#[derive(Debug, Default)]
pub struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(LinkError::Storage("storage unavailable".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(LinkError::Storage("storage unavailable".into()))
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(LinkError::Storage("storage unavailable".into()))
    }
}

pub struct NativeRuntime;

impl ChatRuntime for NativeRuntime {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) {
        tokio::spawn(future);
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(tokio::time::sleep(duration))
    }

    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}
