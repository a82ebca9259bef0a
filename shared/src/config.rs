use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::{
    DEFAULT_ACTIVITY_DEBOUNCE, DEFAULT_GRAPHQL_ENDPOINT, DEFAULT_MAX_CACHED_QUERIES,
    DEFAULT_POLLING_INTERVAL,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid page config: {0}")]
    Parse(String),

    #[error("polling interval must be greater than zero")]
    ZeroInterval,

    #[error("activity debounce ({debounce_ms}ms) must be shorter than the polling interval ({interval_ms}ms)")]
    DebounceTooLong { debounce_ms: u64, interval_ms: u64 },

    #[error("invalid GraphQL endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("query cache must hold at least one entry")]
    ZeroCapacity,
}

/// Settings fixed at mount for the lifetime of the page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpensePageConfig {
    pub polling_interval_ms: u64,
    pub activity_debounce_ms: u64,
    pub graphql_endpoint: String,
    pub max_cached_queries: usize,
}

impl Default for ExpensePageConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: duration_millis(DEFAULT_POLLING_INTERVAL),
            activity_debounce_ms: duration_millis(DEFAULT_ACTIVITY_DEBOUNCE),
            graphql_endpoint: DEFAULT_GRAPHQL_ENDPOINT.to_string(),
            max_cached_queries: DEFAULT_MAX_CACHED_QUERIES,
        }
    }
}

impl ExpensePageConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.activity_debounce_ms >= self.polling_interval_ms {
            return Err(ConfigError::DebounceTooLong {
                debounce_ms: self.activity_debounce_ms,
                interval_ms: self.polling_interval_ms,
            });
        }
        if self.max_cached_queries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let endpoint = Url::parse(&self.graphql_endpoint).map_err(|e| {
            ConfigError::InvalidEndpoint {
                endpoint: self.graphql_endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.graphql_endpoint.clone(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    #[must_use]
    pub fn activity_debounce(&self) -> Duration {
        Duration::from_millis(self.activity_debounce_ms)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults_are_valid() {
        let config = ExpensePageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.polling_interval(), Duration::from_secs(60));
        assert_eq!(config.activity_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ExpensePageConfig::from_json(r#"{ "pollingIntervalMs": 5000 }"#).unwrap();
        assert_eq!(config.polling_interval_ms, 5000);
        assert_eq!(config.max_cached_queries, DEFAULT_MAX_CACHED_QUERIES);
        assert_eq!(config.graphql_endpoint, DEFAULT_GRAPHQL_ENDPOINT);
    }

    #[test]
    fn rejects_bad_values() {
        assert_matches!(
            ExpensePageConfig::from_json(r#"{ "pollingIntervalMs": 0 }"#),
            Err(ConfigError::ZeroInterval)
        );
        assert_matches!(
            ExpensePageConfig::from_json(r#"{ "pollingIntervalMs": 100, "activityDebounceMs": 100 }"#),
            Err(ConfigError::DebounceTooLong { .. })
        );
        assert_matches!(
            ExpensePageConfig::from_json(r#"{ "graphqlEndpoint": "not a url" }"#),
            Err(ConfigError::InvalidEndpoint { .. })
        );
        assert_matches!(
            ExpensePageConfig::from_json(r#"{ "graphqlEndpoint": "ftp://example.com/graphql" }"#),
            Err(ConfigError::InvalidEndpoint { .. })
        );
        assert_matches!(
            ExpensePageConfig::from_json(r#"{ "maxCachedQueries": 0 }"#),
            Err(ConfigError::ZeroCapacity)
        );
        assert_matches!(
            ExpensePageConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        );
    }
}
