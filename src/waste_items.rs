// 🗑️ Waste Items - Read the A-Z waste CSV
//
// Only two columns matter:
//   Abfallart      → item name
//   Entsorgungsweg → disposal-target cell (free text, may span lines)
// Address/hours/contact columns are ignored; facility details come from the
// facility source.

use crate::data_quality::{IssueKind, QualityIssue};
use crate::error::SourceError;
use crate::normalizer::collapse_whitespace;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

pub const ITEM_COLUMN: &str = "Abfallart";
pub const TARGET_COLUMN: &str = "Entsorgungsweg";

/// One usable CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasteItemRow {
    /// 1-based line in the source file (header is line 1)
    pub line: u64,

    /// Item name, whitespace-normalized
    pub name: String,

    /// Raw disposal-target cell, untouched
    pub disposal: String,
}

#[derive(Debug, Clone, Default)]
pub struct WasteItemSource {
    pub rows: Vec<WasteItemRow>,
    pub rows_read: usize,
    pub section_markers: usize,
    pub issues: Vec<QualityIssue>,
}

/// Alphabet divider rows ("A", "B", …) with an empty target cell
pub fn is_section_marker(name: &str, disposal: &str) -> bool {
    let mut chars = name.trim().chars();
    let single_letter = matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic());
    single_letter && disposal.trim().is_empty()
}

pub fn read_waste_items<R: Read>(reader: R) -> Result<WasteItemSource, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let position = |column: &'static str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
            .ok_or(SourceError::MissingColumn(column))
    };
    let item_idx = position(ITEM_COLUMN)?;
    let target_idx = position(TARGET_COLUMN)?;

    let mut source = WasteItemSource::default();

    for result in csv_reader.records() {
        let record = result?;
        source.rows_read += 1;

        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(source.rows_read as u64 + 1);
        let name = collapse_whitespace(record.get(item_idx).unwrap_or(""));
        let disposal = record.get(target_idx).unwrap_or("").to_string();

        if name.is_empty() && disposal.trim().is_empty() {
            continue;
        }

        if is_section_marker(&name, &disposal) {
            debug!(marker = %name, "skipping section marker");
            source.section_markers += 1;
            continue;
        }

        if name.is_empty() {
            source.issues.push(QualityIssue::raise(
                IssueKind::MalformedRecord,
                format!("line {}", line),
                "waste item row has no name; skipped",
            ));
            continue;
        }

        source.rows.push(WasteItemRow { line, name, disposal });
    }

    info!(
        rows = source.rows_read,
        items = source.rows.len(),
        markers = source.section_markers,
        "waste items read"
    );

    Ok(source)
}

pub fn read_waste_item_file(path: &Path) -> Result<WasteItemSource, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    read_waste_items(BufReader::new(file))
}

// ============================================================================
// TESTS
// ============================================================================
