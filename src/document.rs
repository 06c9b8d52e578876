//! Variant and resolved-document data model.

use crate::error::IdentityError;
use crate::identity::{classify, LogicalKey, VariantStatus};
use crate::perspective::Perspective;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Raw variant record as returned by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "_id")]
    pub identity: String,
    #[serde(rename = "_rev")]
    pub revision: String,
    #[serde(rename = "_type")]
    pub document_type: String,
    #[serde(rename = "_updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Opaque store revision token.
///
/// Only ever compared to break ties between duplicate variants: integer tokens
/// compare numerically and sort before any other token, which compare
/// lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Revision(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored representation of a logical key's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub logical_key: LogicalKey,
    /// Store-assigned identity, unique per variant.
    pub variant_id: String,
    pub status: VariantStatus,
    pub document_type: String,
    pub revision: Revision,
    pub updated_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub payload: Map<String, Value>,
}

impl Variant {
    /// Classify and convert a raw store record.
    pub fn from_record(record: RawRecord) -> Result<Self, IdentityError> {
        let (logical_key, status) = classify(&record.identity)?;
        Ok(Variant {
            logical_key,
            variant_id: record.identity,
            status,
            document_type: record.document_type,
            revision: Revision(record.revision),
            updated_at: record.updated_at,
            created_at: record.created_at,
            payload: record.payload,
        })
    }

    /// Recency order used when the store holds duplicates of one status.
    ///
    /// Highest revision first, then `updated_at`, then identity. Duplicates
    /// that tie on all three are ordered by their canonical content so the
    /// winner never depends on the order the store returned them in.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.revision
            .cmp(&other.revision)
            .then_with(|| self.updated_at.cmp(&other.updated_at))
            .then_with(|| self.variant_id.cmp(&other.variant_id))
            .then_with(|| self.created_at.cmp(&other.created_at))
            .then_with(|| self.document_type.cmp(&other.document_type))
            .then_with(|| canonical_payload(&self.payload).cmp(&canonical_payload(&other.payload)))
    }

    /// Look up a payload value by dotted path (`seo.title`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.payload, path)
    }
}

/// Payload rendered with sorted keys.
fn canonical_payload(payload: &Map<String, Value>) -> String {
    serde_json::to_string(payload).unwrap_or_default()
}

pub(crate) fn lookup_path<'a>(payload: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = payload.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Publish-lifecycle metadata copied from the published variant onto a draft
/// under [`Perspective::DraftOverlay`]. Content fields are never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishMetadata {
    /// Creation time of the published variant, i.e. the first publish.
    pub first_published_at: Option<DateTime<Utc>>,
    pub published_revision: Revision,
    /// Last update time of the published variant.
    pub published_at: DateTime<Utc>,
}

impl PublishMetadata {
    pub fn from_published(published: &Variant) -> Self {
        PublishMetadata {
            first_published_at: published.created_at,
            published_revision: published.revision.clone(),
            published_at: published.updated_at,
        }
    }
}

/// Output unit of resolution: one logical key mapped to its visible variant.
///
/// Owned by the caller, safe to cache or serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDocument {
    pub logical_key: LogicalKey,
    pub perspective: Perspective,
    pub variant: Variant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_metadata: Option<PublishMetadata>,
}

impl ResolvedDocument {
    pub fn variant_id(&self) -> &str {
        &self.variant.variant_id
    }

    pub fn revision(&self) -> &Revision {
        &self.variant.revision
    }

    pub fn is_draft(&self) -> bool {
        self.variant.status == VariantStatus::Draft
    }
}
