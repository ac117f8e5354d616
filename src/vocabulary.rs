// 📚 Vocabulary - Fixed tables as data
//
// Synonyms, the waste-stream enumeration, the facility-name pattern catalog
// and the note filters. Loaded once at startup, validated, then passed by
// reference to the normalizer, extractor and classifier.

use crate::error::ConfigError;
use crate::identity::canonical_key;
use crate::normalizer::collapse_whitespace;
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Vocabulary shipped with the crate (config/vocabulary.json)
const BUILTIN_VOCABULARY: &str = include_str!("../config/vocabulary.json");

fn default_min_name_length() -> usize {
    3
}

/// On-disk shape. `waste_streams` and `synonyms` are required.
#[derive(Debug, Deserialize)]
struct VocabularyFile {
    waste_streams: Vec<String>,
    synonyms: IndexMap<String, String>,
    #[serde(default)]
    target_patterns: Vec<String>,
    #[serde(default)]
    note_markers: Vec<String>,
    #[serde(default)]
    note_prefixes: Vec<String>,
    #[serde(default = "default_min_name_length")]
    min_name_length: usize,
}

// ============================================================================
// VOCABULARY
// ============================================================================

#[derive(Debug, Clone)]
pub struct Vocabulary {
    waste_streams: Vec<String>,
    target_patterns: Vec<String>,
    note_markers: Vec<String>,
    note_prefixes: Vec<String>,
    min_name_length: usize,

    /// canonical key of a variant → canonical display form
    synonym_index: HashMap<String, String>,

    /// canonical key of a stream → display name
    stream_index: HashMap<String, String>,
}

impl Vocabulary {
    /// Load the vocabulary compiled into the crate
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_VOCABULARY)
    }

    /// Load vocabulary from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        Self::from_tables(file)
    }

    fn from_tables(file: VocabularyFile) -> Result<Self, ConfigError> {
        if file.waste_streams.is_empty() {
            return Err(ConfigError::NoWasteStreams);
        }

        // Streams
        let mut waste_streams = Vec::with_capacity(file.waste_streams.len());
        let mut stream_index = HashMap::new();
        for stream in &file.waste_streams {
            let display = collapse_whitespace(stream);
            if display.is_empty() {
                return Err(ConfigError::EmptyEntry { table: "waste_streams" });
            }
            if stream_index
                .insert(canonical_key(&display), display.clone())
                .is_some()
            {
                return Err(ConfigError::DuplicateStream(display));
            }
            waste_streams.push(display);
        }

        // Synonyms
        let mut synonym_index: HashMap<String, String> = HashMap::new();
        for (variant, canonical) in &file.synonyms {
            let key = canonical_key(variant);
            let canonical = collapse_whitespace(canonical);
            if key.is_empty() || canonical.is_empty() {
                return Err(ConfigError::EmptyEntry { table: "synonyms" });
            }

            match synonym_index.get(&key) {
                Some(first) if *first != canonical => {
                    return Err(ConfigError::ConflictingSynonym {
                        variant: variant.clone(),
                        first: first.clone(),
                        second: canonical,
                    });
                }
                Some(_) => {}
                None => {
                    synonym_index.insert(key, canonical);
                }
            }
        }

        // A canonical form must be final: one lookup, no chains
        for (variant, canonical) in &synonym_index {
            if let Some(next) = synonym_index.get(&canonical_key(canonical)) {
                if next != canonical {
                    return Err(ConfigError::ChainedSynonym {
                        variant: variant.clone(),
                        target: canonical.clone(),
                    });
                }
            }
        }

        for stream in &waste_streams {
            if let Some(mapped) = synonym_index.get(&canonical_key(stream)) {
                if mapped != stream {
                    return Err(ConfigError::ShadowedStream(stream.clone()));
                }
            }
        }

        let target_patterns = non_empty(file.target_patterns, "target_patterns", |p| {
            collapse_whitespace(&p)
        })?;
        let note_markers = non_empty(file.note_markers, "note_markers", |m| m.to_lowercase())?;
        let note_prefixes = non_empty(file.note_prefixes, "note_prefixes", |p| p.to_lowercase())?;

        Ok(Vocabulary {
            waste_streams,
            target_patterns,
            note_markers,
            note_prefixes,
            min_name_length: file.min_name_length,
            synonym_index,
            stream_index,
        })
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// Canonical form for a known variant (case- and whitespace-insensitive)
    pub fn canonical_synonym(&self, name: &str) -> Option<&str> {
        self.synonym_index
            .get(&canonical_key(name))
            .map(String::as_str)
    }

    /// Enumerated stream matching `name`, in its display form
    pub fn waste_stream(&self, name: &str) -> Option<&str> {
        self.stream_index.get(&canonical_key(name)).map(String::as_str)
    }

    pub fn waste_streams(&self) -> &[String] {
        &self.waste_streams
    }

    /// Recognizable facility/stream names used to split concatenated cells
    pub fn target_patterns(&self) -> &[String] {
        &self.target_patterns
    }

    /// Lowercased substrings that mark a note rather than a name
    pub fn note_markers(&self) -> &[String] {
        &self.note_markers
    }

    /// Lowercased prefixes that mark a note rather than a name
    pub fn note_prefixes(&self) -> &[String] {
        &self.note_prefixes
    }

    pub fn min_name_length(&self) -> usize {
        self.min_name_length
    }

    pub fn synonym_count(&self) -> usize {
        self.synonym_index.len()
    }

    /// Every display name the vocabulary knows (streams, canonical synonyms, patterns)
    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.waste_streams.clone();
        names.extend(self.synonym_index.values().cloned());
        names.extend(self.target_patterns.iter().cloned());
        names.sort();
        names.dedup();
        names
    }
}

/// Reject blank entries, map the rest
fn non_empty<F>(entries: Vec<String>, table: &'static str, map: F) -> Result<Vec<String>, ConfigError>
where
    F: Fn(String) -> String,
{
    entries
        .into_iter()
        .map(|entry| {
            if entry.trim().is_empty() {
                Err(ConfigError::EmptyEntry { table })
            } else {
                Ok(map(entry))
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
