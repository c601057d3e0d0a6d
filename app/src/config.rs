//! Configuration management for the Pitstop client.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Malformed values are reported instead of silently replaced by defaults.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "pitstop=debug,pitstop_runtime=info";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed
    #[error("invalid value {value:?} for {variable}: {reason}")]
    Invalid {
        /// Environment variable name
        variable: &'static str,
        /// Raw value
        value: String,
        /// What was expected
        reason: &'static str,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Backend connection
    pub api: ApiConfig,
    /// Screen behaviour
    pub screens: ScreenConfig,
    /// Identity used for requests
    pub session: SessionConfig,
    /// Log filter directive (`RUST_LOG`)
    pub log_filter: String,
}

/// Backend connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Per-request timeout, enforced by the transport
    pub timeout: Duration,
}

/// Screen behaviour configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Quiet period before a filter edit is applied
    pub filter_debounce: Duration,
    /// Units bought per purchase (a set)
    pub purchase_set_size: u32,
    /// Status codes that mean the local cache was stale (stock or slot taken)
    pub conflict_statuses: Vec<u16>,
}

/// Identity configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bearer token (`PITSTOP_API_TOKEN`)
    pub token: Option<String>,
    /// Role name (`PITSTOP_ROLE`), `ADMIN` for administrators
    pub role: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout: Duration::from_secs(30),
            },
            screens: ScreenConfig {
                filter_debounce: Duration::from_millis(300),
                purchase_set_size: 4,
                conflict_statuses: vec![400, 409],
            },
            session: SessionConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to a value that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = var("PITSTOP_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api.base_url);

        let timeout = match var("PITSTOP_API_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_number("PITSTOP_API_TIMEOUT_SECS", &value)?),
            None => defaults.api.timeout,
        };

        let filter_debounce = match var("PITSTOP_FILTER_DEBOUNCE_MS") {
            Some(value) => Duration::from_millis(parse_number("PITSTOP_FILTER_DEBOUNCE_MS", &value)?),
            None => defaults.screens.filter_debounce,
        };

        let purchase_set_size = match var("PITSTOP_PURCHASE_SET_SIZE") {
            Some(value) => {
                let size: u32 = parse_number("PITSTOP_PURCHASE_SET_SIZE", &value)?;
                if size == 0 {
                    return Err(ConfigError::Invalid {
                        variable: "PITSTOP_PURCHASE_SET_SIZE",
                        value,
                        reason: "must be at least 1",
                    });
                }
                size
            },
            None => defaults.screens.purchase_set_size,
        };

        let conflict_statuses = match var("PITSTOP_STOCK_CONFLICT_STATUSES") {
            Some(value) => value
                .split(',')
                .map(|code| parse_number("PITSTOP_STOCK_CONFLICT_STATUSES", code))
                .collect::<Result<Vec<u16>, _>>()?,
            None => defaults.screens.conflict_statuses,
        };

        Ok(Self {
            api: ApiConfig { base_url, timeout },
            screens: ScreenConfig {
                filter_debounce,
                purchase_set_size,
                conflict_statuses,
            },
            session: SessionConfig {
                token: var("PITSTOP_API_TOKEN"),
                role: var("PITSTOP_ROLE"),
            },
            log_filter: var("RUST_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_number<T: std::str::FromStr>(variable: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        variable,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.screens.filter_debounce, Duration::from_millis(300));
        assert_eq!(config.screens.conflict_statuses, vec![400, 409]);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PITSTOP_API_BASE_URL", "https://shop.example/"),
            ("PITSTOP_API_TIMEOUT_SECS", "5"),
            ("PITSTOP_FILTER_DEBOUNCE_MS", "50"),
            ("PITSTOP_PURCHASE_SET_SIZE", "2"),
            ("PITSTOP_STOCK_CONFLICT_STATUSES", "409, 422"),
            ("PITSTOP_ROLE", "ADMIN"),
        ]))
        .unwrap();

        assert_eq!(config.api.base_url, "https://shop.example");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert_eq!(config.screens.filter_debounce, Duration::from_millis(50));
        assert_eq!(config.screens.purchase_set_size, 2);
        assert_eq!(config.screens.conflict_statuses, vec![409, 422]);
        assert_eq!(config.session.role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let error = AppConfig::from_lookup(lookup(&[("PITSTOP_API_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::Invalid { variable: "PITSTOP_API_TIMEOUT_SECS", .. }
        ));

        let error = AppConfig::from_lookup(lookup(&[("PITSTOP_PURCHASE_SET_SIZE", "0")])).unwrap_err();
        assert_eq!(error.to_string(), "invalid value \"0\" for PITSTOP_PURCHASE_SET_SIZE: must be at least 1");
    }
}
