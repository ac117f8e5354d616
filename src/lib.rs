// Fessi Graph - Core Library
// Waste-disposal knowledge graph importer, used by the CLI and the tests

pub mod error;
pub mod identity;      // Deterministic UIDs from canonical names
pub mod vocabulary;    // Synonyms, streams, pattern catalog, note filters
pub mod normalizer;    // Raw cells → canonical names
pub mod facilities;    // Facility source + deduplication
pub mod waste_items;   // A-Z waste CSV
pub mod extractor;     // Disposal-target cell → mentions
pub mod classifier;    // Mention → WasteStream | Facility
pub mod graph;         // Store interface, SQLite / memory / dry-run stores
pub mod data_quality;
pub mod pipeline;
pub mod config;

// Re-export commonly used types
pub use error::{ConfigError, PipelineError, Result, SourceError, Stage, StoreError};
pub use identity::{assign_uid, canonical_key, Uid, UID_LENGTH};
pub use vocabulary::Vocabulary;
pub use normalizer::{collapse_whitespace, TextNormalizer};
pub use facilities::{
    Facility, FacilityIndex, FacilityLoad, RawFacility,
    load_facilities, read_facility_file, read_facility_records,
};
pub use waste_items::{
    WasteItemRow, WasteItemSource,
    read_waste_item_file, read_waste_items,
};
pub use extractor::{is_valid_target_name, PatternExtractor, TargetExtractor};
pub use classifier::{Target, TargetClassifier};
pub use graph::{
    DryRunStore, Event, GraphQuery, GraphStats, GraphStore, MemoryGraphStore,
    NodeLabel, Properties, RelType, Row, SqliteGraphStore, Upsert,
    graph_stats,
};
pub use data_quality::{IssueKind, QualityIssue, QualitySummary, Severity};
pub use pipeline::{
    ImportReport, Pipeline, WriteTally,
    load_facility_source, load_waste_item_source,
};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
