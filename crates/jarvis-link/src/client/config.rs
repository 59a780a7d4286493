//! Configuration for the realtime link.

use crate::client::retry::ReconnectConfig;
use crate::error::{LinkError, Result};
use crate::protocol::{DEFAULT_SERVER_URL, QUEUE_KEY, SESSION_KEY};
use std::time::Duration;

/// Configuration for [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Backend socket endpoint (`ws://` or `wss://`).
    pub server_url: String,
    /// Reconnect bound and delay policy.
    pub reconnect: ReconnectConfig,
    /// Storage key for the session id.
    pub session_key: String,
    /// Storage key for the offline queue.
    pub queue_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            session_key: SESSION_KEY.to_string(),
            queue_key: QUEUE_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.reconnect.max_attempts = max;
        self
    }

    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect.interval = interval;
        self
    }

    /// Check that the server URL is a websocket URL.
    pub fn validate(&self) -> Result<url::Url> {
        let url = url::Url::parse(&self.server_url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(LinkError::Config(format!(
                "unsupported scheme '{}' in {}",
                other, self.server_url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_url, "ws://localhost:5001/ws");
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.interval, Duration::from_millis(3000));
        assert_eq!(config.session_key, "sessionId");
        assert_eq!(config.queue_key, "pendingMessages");
    }

    #[test]
    fn test_partial_override() {
        let config = ClientConfig {
            server_url: "wss://example.org/ws".into(),
            ..Default::default()
        };
        assert_eq!(config.reconnect.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::default()
            .with_max_reconnect_attempts(2)
            .with_reconnect_interval(Duration::from_millis(10));
        assert_eq!(config.reconnect.max_attempts, 2);
        assert_eq!(config.reconnect.interval, Duration::from_millis(10));
    }

    #[test]
    fn test_validate_rejects_http() {
        let config = ClientConfig::default().with_server_url("http://localhost:5001/ws");
        assert!(matches!(config.validate(), Err(LinkError::Config(_))));
        let config = ClientConfig::default().with_server_url("::");
        assert!(matches!(config.validate(), Err(LinkError::InvalidUrl(_))));
    }
}
