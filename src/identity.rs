//! Document Identity Model
//!
//! Derives the logical key and lifecycle status of a stored variant from its
//! store-level identity. Draft identities carry the structural `drafts.` prefix;
//! everything else that passes validation is a published identity.

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix the store reserves for draft identities.
pub const DRAFT_PREFIX: &str = "drafts.";

/// Namespaces this layer does not resolve (release-scoped copies and the like).
const RESERVED_PREFIXES: &[&str] = &["versions."];

const MAX_IDENTITY_LEN: usize = 128;

/// Stable identity of one authored content item, independent of lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalKey(String);

impl LogicalKey {
    /// Build a key from a caller-supplied string.
    ///
    /// The string must be a valid published identity; passing a draft identity
    /// is rejected so callers cannot address a variant directly.
    pub fn parse(key: &str) -> Result<Self, IdentityError> {
        match classify(key)? {
            (logical_key, VariantStatus::Published) => Ok(logical_key),
            (_, VariantStatus::Draft) => Err(IdentityError::unrecognized(
                key,
                "logical keys never carry the draft prefix",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Store identity of this key's published variant.
    pub fn published_identity(&self) -> String {
        self.0.clone()
    }

    /// Store identity of this key's draft variant.
    pub fn draft_identity(&self) -> String {
        format!("{}{}", DRAFT_PREFIX, self.0)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LogicalKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalKey::parse(s)
    }
}

/// Lifecycle status of a stored variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Draft,
    Published,
}

impl fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantStatus::Draft => f.write_str("draft"),
            VariantStatus::Published => f.write_str("published"),
        }
    }
}

/// Classify a store identity into `(logical key, status)`.
///
/// Pure; never touches the network. Identities that cannot be classified are
/// rejected rather than treated as published.
pub fn classify(identity: &str) -> Result<(LogicalKey, VariantStatus), IdentityError> {
    if identity.is_empty() {
        return Err(IdentityError::unrecognized(identity, "empty identity"));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(IdentityError::unrecognized(
            identity,
            format!("longer than {} characters", MAX_IDENTITY_LEN),
        ));
    }
    if let Some(bad) = identity
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(IdentityError::unrecognized(
            identity,
            format!("invalid character {:?}", bad),
        ));
    }
    if let Some(reserved) = RESERVED_PREFIXES.iter().find(|p| identity.starts_with(*p)) {
        return Err(IdentityError::unrecognized(
            identity,
            format!("reserved namespace {:?}", reserved),
        ));
    }

    let (rest, status) = match identity.strip_prefix(DRAFT_PREFIX) {
        Some(rest) => (rest, VariantStatus::Draft),
        None => (identity, VariantStatus::Published),
    };

    if rest.is_empty() {
        return Err(IdentityError::unrecognized(identity, "draft marker without a key"));
    }
    if rest.starts_with(DRAFT_PREFIX) {
        return Err(IdentityError::unrecognized(identity, "nested draft marker"));
    }
    if RESERVED_PREFIXES.iter().any(|p| rest.starts_with(p)) {
        return Err(IdentityError::unrecognized(identity, "draft of a reserved namespace"));
    }
    if rest.starts_with('-') || rest.starts_with('.') {
        return Err(IdentityError::unrecognized(
            identity,
            "key must start with a letter, digit or '_'",
        ));
    }

    Ok((LogicalKey(rest.to_string()), status))
}
