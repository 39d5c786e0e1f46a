//! Configuration for the chat client
//!
//! `ChatConfig` is built programmatically (`ChatConfig::default()` plus
//! field updates), loaded from a camelCase JSON file, or read from
//! `A3S_CHAT_*` environment variables.

use crate::error::{ChatError, Result};
use crate::ticker::TickerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// WebSocket endpoint override
pub const ENV_URL: &str = "A3S_CHAT_URL";

/// HTTP base URL override for the agent API
pub const ENV_API_URL: &str = "A3S_CHAT_API_URL";

/// Reconnect backoff override, in milliseconds
pub const ENV_RECONNECT_MS: &str = "A3S_CHAT_RECONNECT_MS";

/// Chat client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// WebSocket endpoint of the chat server
    #[serde(default = "default_url")]
    pub url: String,

    /// Base URL for the HTTP agent API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Fixed delay between reconnect attempts
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Give up after this many consecutive failed connects (`None` = never)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// How long `send` waits for an open connection
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Where preferences are persisted (`None` keeps them in memory)
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,

    #[serde(default)]
    pub ticker: TickerConfig,
}

fn default_url() -> String {
    "ws://127.0.0.1:8000/api/chat/ws".to_string()
}

fn default_api_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_reconnect_backoff_ms() -> u64 {
    3000
}

fn default_send_timeout_ms() -> u64 {
    10_000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_url: default_api_url(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            max_reconnect_attempts: None,
            send_timeout_ms: default_send_timeout_ms(),
            preferences_path: None,
            ticker: TickerConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ChatError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `A3S_CHAT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (environment or otherwise)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_URL) {
            self.url = url;
        }
        if let Some(api_url) = lookup(ENV_API_URL) {
            self.api_url = api_url;
        }
        if let Some(ms) = lookup(ENV_RECONNECT_MS) {
            self.reconnect_backoff_ms = ms.trim().parse().map_err(|e| {
                ChatError::Config(format!("Invalid {} '{}': {}", ENV_RECONNECT_MS, ms, e))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(ChatError::Config(format!(
                "url must be a ws:// or wss:// URL, got '{}'",
                self.url
            )));
        }
        if self.ticker.speed <= 0.0 {
            return Err(ChatError::Config(format!(
                "ticker speed must be positive, got {}",
                self.ticker.speed
            )));
        }
        Ok(())
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
