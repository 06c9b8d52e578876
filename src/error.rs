//! Error types for the perspective resolution layer.

use thiserror::Error;

/// Identity classification errors.
///
/// Raised per record; the fetcher excludes the record and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Unrecognized variant identity {identity:?}: {reason}")]
    UnrecognizedVariantIdentity { identity: String, reason: String },
}

impl IdentityError {
    pub(crate) fn unrecognized(identity: &str, reason: impl Into<String>) -> Self {
        IdentityError::UnrecognizedVariantIdentity {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by fetch, resolve and service operations.
///
/// A document that is not visible under the requested perspective is not an
/// error: single-document reads return `Ok(None)` for that case.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to render output: {0}")]
    Output(String),
}

impl ResolveError {
    /// True when the failure came from the store transport rather than the caller.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, ResolveError::StoreUnavailable(_))
    }
}

impl From<config::ConfigError> for ResolveError {
    fn from(err: config::ConfigError) -> Self {
        ResolveError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ResolveError::StoreUnavailable(format!("request timed out: {}", err))
        } else {
            ResolveError::StoreUnavailable(err.to_string())
        }
    }
}
