//! Perspective Policy
//!
//! Pure reduction of one logical key's variant set to the zero-or-one variant
//! visible under a perspective. No I/O and no caching; the resolver runs every
//! read path through [`resolve`] so list and single-document reads cannot
//! diverge.

use crate::document::{PublishMetadata, ResolvedDocument, Variant};
use crate::identity::{LogicalKey, VariantStatus};
use crate::perspective::Perspective;
use tracing::warn;

/// Variants of one logical key, tagged by status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantSet {
    draft: Option<Variant>,
    published: Option<Variant>,
    duplicates: usize,
}

impl VariantSet {
    /// Collect the variants of `key`.
    ///
    /// Variants belonging to another key are ignored. When the store holds more
    /// than one variant of a status, the highest revision is kept and a
    /// `DuplicateVariantDetected` warning is logged.
    pub fn collect<'a, I>(key: &LogicalKey, variants: I) -> Self
    where
        I: IntoIterator<Item = &'a Variant>,
    {
        let mut drafts: Vec<&Variant> = Vec::new();
        let mut published: Vec<&Variant> = Vec::new();

        for variant in variants {
            if variant.logical_key != *key {
                warn!(
                    key = %key,
                    variant_id = %variant.variant_id,
                    "Ignoring variant of another logical key"
                );
                continue;
            }
            match variant.status {
                VariantStatus::Draft => drafts.push(variant),
                VariantStatus::Published => published.push(variant),
            }
        }

        let mut duplicates = 0;
        let draft = pick_latest(key, VariantStatus::Draft, drafts, &mut duplicates);
        let published = pick_latest(key, VariantStatus::Published, published, &mut duplicates);

        VariantSet {
            draft,
            published,
            duplicates,
        }
    }

    pub fn draft(&self) -> Option<&Variant> {
        self.draft.as_ref()
    }

    pub fn published(&self) -> Option<&Variant> {
        self.published.as_ref()
    }

    /// Number of duplicate variants discarded while collecting.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

fn pick_latest(
    key: &LogicalKey,
    status: VariantStatus,
    candidates: Vec<&Variant>,
    duplicates: &mut usize,
) -> Option<Variant> {
    let count = candidates.len();
    let latest = candidates.into_iter().max_by(|a, b| a.recency_cmp(b))?;
    if count > 1 {
        *duplicates += count - 1;
        warn!(
            condition = "DuplicateVariantDetected",
            key = %key,
            status = %status,
            count,
            kept_variant = %latest.variant_id,
            kept_revision = %latest.revision,
            "Store holds more than one variant with the same status; keeping the highest revision"
        );
    }
    Some(latest.clone())
}

/// Select the visible variant of a tagged set under `perspective`.
pub fn select(perspective: Perspective, set: &VariantSet) -> Option<ResolvedSelection<'_>> {
    match (perspective, set.draft(), set.published()) {
        (Perspective::PublishedOnly, _, Some(published)) => Some(ResolvedSelection {
            variant: published,
            overlay_from: None,
        }),
        (Perspective::PublishedOnly, _, None) => None,

        (Perspective::RawPreferDraft, Some(draft), _) => Some(ResolvedSelection {
            variant: draft,
            overlay_from: None,
        }),
        (Perspective::DraftOverlay, Some(draft), published) => Some(ResolvedSelection {
            variant: draft,
            overlay_from: published,
        }),

        (Perspective::RawPreferDraft | Perspective::DraftOverlay, None, Some(published)) => {
            Some(ResolvedSelection {
                variant: published,
                overlay_from: None,
            })
        }
        (Perspective::RawPreferDraft | Perspective::DraftOverlay, None, None) => None,
    }
}

/// Borrowed outcome of [`select`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedSelection<'a> {
    pub variant: &'a Variant,
    /// Published variant whose publish metadata is overlaid onto a draft.
    pub overlay_from: Option<&'a Variant>,
}

/// Resolve one logical key's variants under `perspective`.
///
/// Returns `None` when nothing is visible, which callers report as not found.
pub fn resolve(
    perspective: Perspective,
    key: &LogicalKey,
    variants: &[Variant],
) -> Option<ResolvedDocument> {
    let set = VariantSet::collect(key, variants);
    let selection = select(perspective, &set)?;
    Some(ResolvedDocument {
        logical_key: key.clone(),
        perspective,
        variant: selection.variant.clone(),
        publish_metadata: selection.overlay_from.map(PublishMetadata::from_published),
    })
}
