// ⚠️ Errors - Typed failures for the import pipeline
//
// Only fatal conditions live here. Recoverable problems (malformed records,
// unresolved references) are data-quality issues, see data_quality.rs.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// STAGE
// ============================================================================

/// Pipeline stage, named in fatal error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadFacilities,
    WriteFacilities,
    LoadWasteItems,
    WriteWasteItems,
    QueryStore,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadFacilities => "loading facilities",
            Stage::WriteFacilities => "writing facilities",
            Stage::LoadWasteItems => "loading waste items",
            Stage::WriteWasteItems => "writing waste items",
            Stage::QueryStore => "querying the graph store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors raised by a graph store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("property encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Relationship endpoint missing from the store
    #[error("{rel_type} from {source_uid} to {target_uid} references a missing node")]
    DanglingRelationship {
        rel_type: &'static str,
        source_uid: String,
        target_uid: String,
    },
}

/// Errors reading a source file.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
}

/// Errors in the vocabulary tables. Always raised before any row is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read vocabulary {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid vocabulary: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("vocabulary defines no waste streams")]
    NoWasteStreams,

    #[error("empty entry in `{table}`")]
    EmptyEntry { table: &'static str },

    #[error("waste stream `{0}` is listed twice")]
    DuplicateStream(String),

    #[error("synonym `{variant}` maps to both `{first}` and `{second}`")]
    ConflictingSynonym {
        variant: String,
        first: String,
        second: String,
    },

    #[error("synonym `{variant}` maps to `{target}`, which is itself remapped")]
    ChainedSynonym { variant: String, target: String },

    #[error("waste stream `{0}` is remapped by the synonym table")]
    ShadowedStream(String),

    #[error("invalid target pattern catalog: {0}")]
    Pattern(#[from] regex::Error),
}

/// Fatal pipeline error. Every variant halts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("{stage} failed: {source}")]
    Source {
        stage: Stage,
        #[source]
        source: SourceError,
    },

    #[error("graph store unavailable while {stage}: {source}")]
    StoreUnavailable {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl PipelineError {
    pub fn store(stage: Stage, source: StoreError) -> Self {
        PipelineError::StoreUnavailable { stage, source }
    }

    pub fn source(stage: Stage, source: SourceError) -> Self {
        PipelineError::Source { stage, source }
    }

    /// Stage that failed, if the error happened after startup
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Configuration(_) => None,
            PipelineError::Source { stage, .. } | PipelineError::StoreUnavailable { stage, .. } => {
                Some(*stage)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
