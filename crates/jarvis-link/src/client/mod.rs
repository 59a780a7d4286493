//! Realtime link client.

mod config;
mod connection;
#[cfg(not(target_arch = "wasm32"))]
pub mod native_network;
mod queue;
pub mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
mod session;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, HostSignal, SendOutcome, Subscription};
#[cfg(not(target_arch = "wasm32"))]
pub use native_network::{connect_native, WsTransport};
pub use queue::OfflineQueue;
pub use retry::{Backoff, ReconnectConfig, ReconnectState, RetryDecision};
#[cfg(any(test, feature = "testing"))]
pub use scripted::{ScriptedLink, ScriptedTransport};
pub use session::SessionIdentity;
