//! Router configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the read-router's dictionary retrieval service.
///
/// All fields have defaults, so a config file only needs to name the values
/// it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Deadline for a single dictionary fetch, and the total deadline for
    /// the startup warm-up, in milliseconds.
    #[serde(default = "default_dictionary_retrieval_time_ms")]
    pub dictionary_retrieval_time_ms: u64,

    /// Maximum number of dictionary fetches in flight at once.
    #[serde(default = "default_dictionary_processing_threads")]
    pub dictionary_processing_threads: usize,

    /// Whether to address storage nodes over TLS.
    #[serde(default)]
    pub ssl_enabled: bool,
}

fn default_dictionary_retrieval_time_ms() -> u64 {
    10_000
}

fn default_dictionary_processing_threads() -> usize {
    8
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dictionary_retrieval_time_ms: default_dictionary_retrieval_time_ms(),
            dictionary_processing_threads: default_dictionary_processing_threads(),
            ssl_enabled: false,
        }
    }
}

impl RouterConfig {
    /// The per-fetch (and warm-up total) deadline as a `Duration`.
    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_millis(self.dictionary_retrieval_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.dictionary_retrieval_time_ms, 10_000);
        assert_eq!(config.dictionary_processing_threads, 8);
        assert!(!config.ssl_enabled);
        assert_eq!(config.retrieval_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: RouterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.dictionary_retrieval_time_ms, 10_000);
        assert_eq!(config.dictionary_processing_threads, 8);
        assert!(!config.ssl_enabled);
    }

    #[test]
    fn test_deserialize_partial_override() {
        let config: RouterConfig = serde_json::from_str(
            r#"{"dictionary_retrieval_time_ms": 2500, "ssl_enabled": true}"#,
        )
        .unwrap();
        assert_eq!(config.retrieval_timeout(), Duration::from_millis(2500));
        assert!(config.ssl_enabled);
        assert_eq!(config.dictionary_processing_threads, 8);
    }
}
