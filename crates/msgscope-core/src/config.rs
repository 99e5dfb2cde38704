//! Runtime configuration.
//!
//! Every field has a default, so an empty or partial TOML file is valid.

use crate::keys;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ScopeConfig {
    pub cache: CacheConfig,
    pub stream: StreamConfig,
    pub keys: KeyConfig,
    pub timestamps: TimestampMode,
}

/// Bounds for the payload cache and the per-session message caches.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Approximate bytes of payload strings kept decoded.
    pub payload_max_weight: u64,
    pub payload_idle_secs: u64,
    pub messages_per_session: u64,
    pub message_idle_secs: u64,
    /// Sessions whose message caches are kept at once.
    pub max_sessions: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            payload_max_weight: 64_000_000,
            payload_idle_secs: 300,
            messages_per_session: 8192,
            message_idle_secs: 300,
            max_sessions: 256,
        }
    }
}

impl CacheConfig {
    pub fn payload_idle(&self) -> Duration {
        Duration::from_secs(self.payload_idle_secs)
    }

    pub fn message_idle(&self) -> Duration {
        Duration::from_secs(self.message_idle_secs)
    }
}

/// Read sizes and buffering for message streams.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Entries requested per ranged or tail read.
    pub page_size: usize,
    /// How long a tail read may wait for new entries.
    pub poll_timeout_ms: u64,
    /// Messages queued per subscriber before the producer waits.
    pub buffer: usize,
    /// Capacity of the status fan-out ring.
    pub status_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            page_size: 512,
            poll_timeout_ms: 2000,
            buffer: 256,
            status_buffer: 1024,
        }
    }
}

impl StreamConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KeyConfig {
    pub status_channel: String,
    pub session_counter: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            status_channel: keys::STATUS_CHANNEL.to_string(),
            session_counter: keys::SESSION_COUNTER.to_string(),
        }
    }
}

/// Timestamp convention of messages handed to session-level callers.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// Epoch milliseconds as recorded.
    #[default]
    Absolute,
    /// Milliseconds since the session's start time.
    SessionRelative,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ScopeConfig = toml::from_str(
            r#"
            timestamps = "session_relative"

            [stream]
            page_size = 64
            "#,
        )
        .unwrap();

        assert_eq!(config.timestamps, TimestampMode::SessionRelative);
        assert_eq!(config.stream.page_size, 64);
        assert_eq!(config.stream.buffer, StreamConfig::default().buffer);
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.keys.status_channel, "inspector-channel");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: ScopeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScopeConfig::default());
    }
}
