// 🧹 Text Normalizer - Raw cells → canonical names
//
// Steps, in order:
// 1. Tabs and repeated whitespace (newlines included) → single space
// 2. Trim
// 3. Synonym/typo table lookup
// Case-folding happens only when comparing (see identity::canonical_key);
// display values keep their source casing.

use crate::identity::{canonical_key, assign_uid, Uid};
use crate::vocabulary::Vocabulary;

/// Collapse every whitespace run (tabs, newlines, repeated spaces) to one
/// space and trim both ends.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizer bound to a vocabulary
#[derive(Debug, Clone, Copy)]
pub struct TextNormalizer<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> TextNormalizer<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        TextNormalizer { vocabulary }
    }

    /// Whitespace cleanup only (steps 1-2). Used for item names, which the
    /// synonym table does not cover.
    pub fn clean(&self, raw: &str) -> String {
        collapse_whitespace(raw)
    }

    /// Full normalization (steps 1-3)
    ///
    /// Example: "Abfallumladeanlage \tFES" → "FES-Abfallumladeanlage"
    pub fn normalize(&self, raw: &str) -> String {
        let cleaned = collapse_whitespace(raw);
        match self.vocabulary.canonical_synonym(&cleaned) {
            Some(canonical) => canonical.to_string(),
            None => cleaned,
        }
    }

    /// Canonical key of the normalized form
    pub fn canonical_key(&self, raw: &str) -> String {
        canonical_key(&self.normalize(raw))
    }

    /// UID of the normalized form
    pub fn uid(&self, raw: &str) -> Uid {
        assign_uid(&self.normalize(raw))
    }

    pub fn vocabulary(&self) -> &'a Vocabulary {
        self.vocabulary
    }
}

// ============================================================================
// TESTS
// ============================================================================
