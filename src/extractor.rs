// 🔍 Disposal-Target Extractor - One messy cell → ordered mentions
//
// Cells in the Entsorgungsweg column look like this:
//
//   "Restabfalltonne\nWertstoffhof Nord"                      → 2 mentions
//   "Wertstoffhof Nord Wertstoffhof West Schadstoffsammlung"  → 3 mentions
//   "Laut FES: siehe Hinweis"                                 → 0 mentions
//   "1 Stück = Sperrmüll"                                     → "Sperrmüll"
//   "Wertstoffhof Nord Wertstoffhof Harheim"                  → 2 mentions
//
// Lines are split first. Each line is then matched against the catalog of
// known names so concatenated names come apart; text between catalog
// matches becomes a candidate of its own. Notes are filtered last.

use crate::error::ConfigError;
use crate::normalizer::collapse_whitespace;
use crate::vocabulary::Vocabulary;
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Splits a disposal-target cell into candidate target names.
///
/// Mentions keep source order; duplicates within a cell are kept.
pub trait TargetExtractor {
    fn extract_targets(&self, cell: &str) -> Vec<String>;
}

// ============================================================================
// NAME FILTER
// ============================================================================

/// True when `name` reads like a facility or stream name rather than a note
pub fn is_valid_target_name(name: &str, vocabulary: &Vocabulary) -> bool {
    let name = name.trim();

    if name.is_empty() || name.chars().count() < vocabulary.min_name_length() {
        return false;
    }

    // "--", "...", "/"
    if !name.chars().any(char::is_alphanumeric) {
        return false;
    }

    let lower = name.to_lowercase();

    if vocabulary
        .note_markers()
        .iter()
        .any(|marker| lower.contains(marker.as_str()))
    {
        return false;
    }

    !vocabulary
        .note_prefixes()
        .iter()
        .any(|prefix| lower.starts_with(prefix.as_str()))
}

fn is_placeholder(line: &str) -> bool {
    line.is_empty() || line == "-"
}

// ============================================================================
// PATTERN EXTRACTOR
// ============================================================================

/// Catalog-driven extractor
#[derive(Debug, Clone)]
pub struct PatternExtractor<'a> {
    vocabulary: &'a Vocabulary,

    /// Case-insensitive alternation of the catalog, longest pattern first
    catalog: Option<Regex>,
}

impl<'a> PatternExtractor<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Result<Self, ConfigError> {
        let mut patterns: Vec<&str> = vocabulary
            .target_patterns()
            .iter()
            .map(String::as_str)
            .collect();

        let catalog = if patterns.is_empty() {
            None
        } else {
            // Alternation is leftmost-first, so longer names must come first
            patterns.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
            let alternation = patterns
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");

            Some(
                RegexBuilder::new(&format!("(?:{})", alternation))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(PatternExtractor { vocabulary, catalog })
    }

    /// Non-overlapping catalog matches sitting on word boundaries
    pub fn fragments<'l>(&self, line: &'l str) -> Vec<&'l str> {
        self.fragment_spans(line)
            .into_iter()
            .map(|(start, end)| &line[start..end])
            .collect()
    }

    /// Byte ranges of `fragments`, in source order
    fn fragment_spans(&self, line: &str) -> Vec<(usize, usize)> {
        let Some(catalog) = &self.catalog else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut at = 0;

        while let Some(m) = catalog.find_at(line, at) {
            if on_word_boundary(line, m.start(), m.end()) {
                found.push((m.start(), m.end()));
                at = m.end();
            } else {
                // Retry one character further, "easi" must not match "Leasing"
                let step = line[m.start()..].chars().next().map_or(1, char::len_utf8);
                at = m.start() + step;
            }

            if at >= line.len() {
                break;
            }
        }

        found
    }

    /// Catalog fragments and the text between them, in source order.
    ///
    /// Leftover text is trimmed of separators; what remains is kept as its
    /// own candidate so unknown names next to known ones survive.
    fn segments<'l>(&self, line: &'l str) -> Vec<&'l str> {
        let spans = self.fragment_spans(line);
        if spans.is_empty() {
            return vec![line];
        }

        let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
        let mut at = 0;

        for (start, end) in spans {
            push_leftover(&mut segments, &line[at..start]);
            segments.push(&line[start..end]);
            at = end;
        }
        push_leftover(&mut segments, &line[at..]);

        segments
    }

    /// Whole line is a name the vocabulary already knows
    fn is_known_name(&self, line: &str) -> bool {
        self.vocabulary.canonical_synonym(line).is_some()
            || self.vocabulary.waste_stream(line).is_some()
    }

    fn is_valid(&self, name: &str) -> bool {
        is_valid_target_name(name, self.vocabulary)
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '/' | ',' | ';' | '(' | ')' | '+' | '&' | '=' | '-')
}

fn push_leftover<'l>(segments: &mut Vec<&'l str>, text: &'l str) {
    let text = text.trim_matches(is_separator);
    if !text.is_empty() {
        segments.push(text);
    }
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();

    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

impl TargetExtractor for PatternExtractor<'_> {
    fn extract_targets(&self, cell: &str) -> Vec<String> {
        if is_placeholder(cell.trim()) {
            return Vec::new();
        }

        let mut mentions = Vec::new();

        for raw_line in cell.lines() {
            let line = collapse_whitespace(raw_line);
            if is_placeholder(&line) {
                continue;
            }

            // "Schadstoffsammlung FES" is one name, not two
            let candidates: Vec<&str> = if self.is_known_name(&line) {
                vec![line.as_str()]
            } else {
                self.segments(&line)
            };

            for candidate in candidates {
                if self.is_valid(candidate) {
                    mentions.push(candidate.to_string());
                } else {
                    debug!(line = %line, candidate, "dropping note");
                }
            }
        }

        debug!(cell = %cell.escape_debug(), mentions = ?mentions, "extracted targets");
        mentions
    }
}

// ============================================================================
// TESTS
// ============================================================================
