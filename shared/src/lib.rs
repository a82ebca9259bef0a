// lib.rs - Expense page core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod cache;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod polling;
pub mod response;
pub mod route;
pub mod submission;
pub mod thread;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::ExpensePageConfig;
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{Model, PageMode, PageStatus, ViewMode};
pub use view::ViewModel;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_ACTIVITY_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.opencollective.com/graphql/v2";
pub const DEFAULT_MAX_CACHED_QUERIES: usize = 64;
pub const EXPENSE_TOP_ANCHOR: &str = "expense-top";
pub const US_TAX_FORM: &str = "US_TAX_FORM";
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Graphql,
    Serialization,
    Deserialization,
    Cache,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Graphql => "GRAPHQL_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Cache => "CACHE_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Conflict | Self::RateLimited | Self::Cache => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::Deserialization | Self::Internal | Self::InvalidState => {
                ErrorSeverity::Fatal
            }

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Graphql
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Conflict | Self::Cache
        )
    }

    #[must_use]
    pub const fn http_status_hint(self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Authorization => Some(403),
            Self::NotFound => Some(404),
            Self::Conflict => Some(409),
            Self::RateLimited => Some(429),
            Self::Validation => Some(400),
            Self::Timeout => Some(504),
            Self::Network => Some(502),
            Self::Internal => Some(500),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: BTreeMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut message: String = message.into();
        if message.len() > MAX_ERROR_MESSAGE_LENGTH {
            let mut cut = MAX_ERROR_MESSAGE_LENGTH;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Self {
            kind,
            severity: kind.default_severity(),
            message,
            internal_message: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Not-found is an expected navigational outcome and is never reported as a defect.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self.kind, ErrorKind::NotFound | ErrorKind::Validation)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to connect. Please check your internet connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::Authentication => "Your session has expired. Please sign in again.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation | ErrorKind::Graphql => self.message.clone(),
            ErrorKind::NotFound => "This expense could not be found.".into(),
            ErrorKind::Conflict => {
                "This expense was changed by someone else. Please refresh and try again.".into()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization | ErrorKind::Cache => {
                "A data error occurred. Please reload the page.".into()
            }
            ErrorKind::InvalidState => "The page is in an invalid state. Please reload it.".into(),
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again or contact support.".into()
            }
        }
    }

    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            408 | 504 => ErrorKind::Timeout,
            502 | 503 => ErrorKind::Network,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };

        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

impl From<cache::CacheError> for AppError {
    fn from(e: cache::CacheError) -> Self {
        let kind = match &e {
            cache::CacheError::Miss { .. } => ErrorKind::Cache,
            cache::CacheError::Encode { .. } => ErrorKind::Serialization,
            cache::CacheError::Decode { .. } => ErrorKind::Deserialization,
        };
        AppError::new(kind, e.to_string()).with_internal(format!("{e:?}"))
    }
}

impl From<route::RouteError> for AppError {
    fn from(e: route::RouteError) -> Self {
        AppError::new(ErrorKind::NotFound, e.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::new(ErrorKind::InvalidState, e.to_string())
    }
}

impl From<submission::SubmissionError> for AppError {
    fn from(e: submission::SubmissionError) -> Self {
        AppError::new(ErrorKind::InvalidState, e.to_string())
    }
}

impl From<capabilities::GraphqlError> for AppError {
    fn from(e: capabilities::GraphqlError) -> Self {
        match e {
            capabilities::GraphqlError::Transport { message } => {
                AppError::new(ErrorKind::Network, message)
            }
            capabilities::GraphqlError::Status { status, body } => {
                AppError::from_http_status(status, body.as_deref().map(str::as_bytes))
            }
            capabilities::GraphqlError::Server { code, message } => {
                let kind = match code.as_deref() {
                    Some("UNAUTHENTICATED") => ErrorKind::Authentication,
                    Some("FORBIDDEN" | "Unauthorized") => ErrorKind::Authorization,
                    Some("BAD_USER_INPUT" | "ValidationFailed") => ErrorKind::Validation,
                    Some("NotFound") => ErrorKind::NotFound,
                    Some("RATE_LIMITED" | "TooManyRequests") => ErrorKind::RateLimited,
                    _ => ErrorKind::Graphql,
                };
                let err = AppError::new(kind, message);
                match code {
                    Some(code) => err.with_context("graphql_code", code),
                    None => err,
                }
            }
            capabilities::GraphqlError::EmptyResponse => {
                AppError::new(ErrorKind::Deserialization, "GraphQL response carried no data")
            }
            capabilities::GraphqlError::Encode { message } => {
                AppError::new(ErrorKind::Serialization, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorKind::NotFound.code(), "NOT_FOUND");
        assert_eq!(ErrorKind::Graphql.code(), "GRAPHQL_ERROR");
        assert_eq!(ErrorKind::Network.code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_cache_errors_keep_debug_detail_internal() {
        let err = AppError::from(cache::CacheError::Miss {
            key: "ExpensePage(42)".into(),
        });
        assert_eq!(err.kind, ErrorKind::Cache);
        assert!(err
            .internal_message
            .as_deref()
            .is_some_and(|m| m.contains("Miss")));
    }

    #[test]
    fn test_not_found_is_not_reportable() {
        assert!(!AppError::new(ErrorKind::NotFound, "missing").is_reportable());
        assert!(AppError::new(ErrorKind::Network, "offline").is_reportable());
    }

    #[test]
    fn test_from_http_status_maps_kind() {
        assert_eq!(AppError::from_http_status(401, None).kind, ErrorKind::Authentication);
        assert_eq!(AppError::from_http_status(404, None).kind, ErrorKind::NotFound);
        assert_eq!(AppError::from_http_status(503, None).kind, ErrorKind::Network);
        assert_eq!(AppError::from_http_status(500, None).kind, ErrorKind::Internal);
        assert_eq!(AppError::from_http_status(418, None).kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_from_http_status_reads_body_message() {
        let err = AppError::from_http_status(400, Some(br#"{"message":"Bad amount"}"#));
        assert_eq!(err.message, "Bad amount");
        assert_eq!(err.context.get("http_status").map(String::as_str), Some("400"));

        let err = AppError::from_http_status(400, Some(b"not json"));
        assert_eq!(err.message, "HTTP error: 400");
    }

    #[test]
    fn test_long_messages_are_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_ERROR_MESSAGE_LENGTH);
        let err = AppError::new(ErrorKind::Graphql, long);
        assert!(err.message.len() <= MAX_ERROR_MESSAGE_LENGTH);
        assert!(err.message.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_fatal_errors_are_never_retryable() {
        let err = AppError::new(ErrorKind::Network, "x").with_severity(ErrorSeverity::Fatal);
        assert!(!err.is_retryable());
        assert!(AppError::new(ErrorKind::Network, "x").is_retryable());
    }

    #[test]
    fn test_graphql_server_codes_map_to_kinds() {
        let err: AppError = capabilities::GraphqlError::Server {
            code: Some("UNAUTHENTICATED".into()),
            message: "login".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Authentication);

        let err: AppError = capabilities::GraphqlError::Server {
            code: None,
            message: "Amount must be positive".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Graphql);
        assert_eq!(err.user_facing_message(), "Amount must be positive");
    }
}
