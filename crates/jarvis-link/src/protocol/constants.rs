//! Defaults shared with the backend and with older clients' storage.

/// Backend socket endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:5001/ws";

/// Storage key holding the current session id.
pub const SESSION_KEY: &str = "sessionId";

/// Storage key holding the JSON array of undelivered turns.
pub const QUEUE_KEY: &str = "pendingMessages";

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3000;
