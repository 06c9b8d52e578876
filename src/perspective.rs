//! Read intents.
//!
//! A perspective is always passed explicitly by the caller. Nothing in this
//! crate defaults it from configuration or the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-declared read intent that decides which variant is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    /// Only published variants; a key with nothing published is not found.
    PublishedOnly,
    /// Draft if present, else published. For editorial consumers.
    RawPreferDraft,
    /// Same selection as `RawPreferDraft`, plus publish metadata from the
    /// published variant when a draft is shown.
    DraftOverlay,
}

impl Perspective {
    pub const ALL: [Perspective; 3] = [
        Perspective::PublishedOnly,
        Perspective::RawPreferDraft,
        Perspective::DraftOverlay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Perspective::PublishedOnly => "published-only",
            Perspective::RawPreferDraft => "raw-prefer-draft",
            Perspective::DraftOverlay => "draft-overlay",
        }
    }
}

impl fmt::Display for Perspective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Perspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "published" | "published-only" => Ok(Perspective::PublishedOnly),
            "raw" | "raw-prefer-draft" => Ok(Perspective::RawPreferDraft),
            "drafts" | "draft-overlay" | "preview-drafts" | "previewdrafts" => {
                Ok(Perspective::DraftOverlay)
            }
            other => Err(format!(
                "Unknown perspective '{}' (expected published, raw or drafts)",
                other
            )),
        }
    }
}
