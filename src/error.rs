//! Error taxonomy for the agent service.
//!
//! Mirrors the teacher SDK's approach (a single `thiserror`-derived enum with
//! constructor associated functions and a crate-wide `Result<T>` alias) but
//! widened to the full taxonomy a service needs: validation, auth/ownership,
//! not-found/conflict, timeouts, upstream provider faults, store faults, tool
//! faults, and config faults. `IntoResponse` (src/http/error_response.rs) maps
//! every variant to its HTTP status exactly once.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("ownership error: {0}")]
    Authz(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream provider error: {0}")]
    UpstreamProvider(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    pub fn authz(msg: impl Into<String>) -> Self {
        Error::Authz(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Error::RateLimited(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Error::UpstreamProvider(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error is safe to retry (network blips, timeouts, 5xx/429).
    /// Generalized from the teacher's `retry::is_retryable_error`.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Timeout(_) | Error::RateLimited(_) => true,
            Error::UpstreamProvider(msg) => {
                msg.contains("500") || msg.contains("502") || msg.contains("503") || msg.contains("504")
            }
            _ => false,
        }
    }

    /// Whether this fault should be sent to the Error Notifier (§4.12, §7).
    /// Validation/auth/ownership faults are surfaced as-is and never alerted.
    pub fn should_alert(&self) -> bool {
        !matches!(
            self,
            Error::Validation(_) | Error::Auth(_) | Error::Authz(_) | Error::NotFound(_) | Error::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::timeout("deadline exceeded").is_retryable());
        assert!(Error::upstream("500 Internal Server Error").is_retryable());
        assert!(!Error::upstream("400 Bad Request").is_retryable());
        assert!(!Error::validation("message too long").is_retryable());
    }

    #[test]
    fn alerting_excludes_client_faults() {
        assert!(!Error::validation("x").should_alert());
        assert!(!Error::authz("x").should_alert());
        assert!(Error::internal("x").should_alert());
        assert!(Error::store("x").should_alert());
    }

    #[test]
    fn display_strings() {
        assert_eq!(Error::not_found("session").to_string(), "not found: session");
        assert_eq!(Error::conflict("tool exists").to_string(), "conflict: tool exists");
    }
}
