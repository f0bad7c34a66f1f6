//! # Engine Configuration
//!
//! Knobs for script execution and the blocking host bindings.
//!
//! ## Responsibilities
//! - **EngineConfig**: Top-level configuration handed to `ScriptEngine::new`.
//! - **HttpConfig**: TLS policy and request timeout for the `http` binding.
//! - **DbConfig**: Query, ping and busy timeouts for the `database` binding.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::ScriptEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Register the `database` binding for this engine.
    pub enable_database: bool,
    pub http: HttpConfig,
    pub db: DbConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_database: false,
            http: HttpConfig::default(),
            db: DbConfig::default(),
        }
    }
}

/// Configuration for the `http` host binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Verify TLS certificates on outbound requests.
    ///
    /// Defaults to `false`, mirroring the historical behavior of the binding.
    /// Flip this on for engines that talk to properly certified endpoints.
    pub verify_tls: bool,
    /// Upper bound for a single request when no run deadline is active.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration for the `database` host binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Upper bound for a single statement when no run deadline is active.
    pub query_timeout: Duration,
    /// Upper bound for the connection-verification ping issued by `open()`.
    pub ping_timeout: Duration,
    /// How long the driver waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"enable_database": true}"#).unwrap();
        assert!(config.enable_database);
        assert!(!config.http.verify_tls);
        assert_eq!(config.db.ping_timeout, Duration::from_secs(5));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.http.timeout, config.http.timeout);
        assert_eq!(back.db.query_timeout, config.db.query_timeout);
    }
}
