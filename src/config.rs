// ⚙️ Configuration - Paths and vocabulary from the environment
//
// `.env` is read first, then FESSI_* variables; CLI flags override both.

use crate::error::ConfigError;
use crate::vocabulary::Vocabulary;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_DB_PATH: &str = "data/fessi_graph.db";
pub const DEFAULT_FACILITIES_FILE: &str = "data/disposal_map_db.json";
pub const DEFAULT_WASTE_ITEMS_FILE: &str = "data/Abfall-ABC_new.csv";

/// Importer configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub facilities_file: PathBuf,
    pub waste_items_file: PathBuf,

    /// Vocabulary override; the built-in tables are used when unset
    pub vocabulary_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            db_path: var("FESSI_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            facilities_file: var("FESSI_FACILITIES_FILE")
                .unwrap_or_else(|| DEFAULT_FACILITIES_FILE.to_string())
                .into(),
            waste_items_file: var("FESSI_WASTE_ITEMS_FILE")
                .unwrap_or_else(|| DEFAULT_WASTE_ITEMS_FILE.to_string())
                .into(),
            vocabulary_file: var("FESSI_VOCABULARY_FILE").map(PathBuf::from),
        }
    }

    /// Load the configured vocabulary, falling back to the built-in one
    pub fn load_vocabulary(&self) -> Result<Vocabulary, ConfigError> {
        let vocabulary = match &self.vocabulary_file {
            Some(path) => {
                info!(path = %path.display(), "loading vocabulary");
                Vocabulary::from_file(path)?
            }
            None => Vocabulary::builtin()?,
        };

        info!(
            streams = vocabulary.waste_streams().len(),
            synonyms = vocabulary.synonym_count(),
            patterns = vocabulary.target_patterns().len(),
            "vocabulary ready"
        );

        Ok(vocabulary)
    }
}
