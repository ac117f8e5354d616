// 🏭 Facilities - Load, normalize and merge disposal facilities
//
// The source JSON lists facilities under many uuids; the same physical place
// shows up several times with different field coverage:
//
//   { "3f2a…": [ {"name": "Wertstoffhof Nord", "address": "Max-Holder-Str. 29"} ],
//     "91bc…": [ {"name": "Wertstoffhof  Nord", "opening_hours": "Mo-Fr 8-17"} ] }
//
// After loading there is exactly one Facility per canonical key, holding the
// union of non-empty fields. On conflict the first-seen value wins.

use crate::data_quality::{IssueKind, QualityIssue};
use crate::error::SourceError;
use crate::graph::Properties;
use crate::identity::{assign_uid, canonical_key, Uid};
use crate::normalizer::TextNormalizer;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// RAW RECORD
// ============================================================================

/// One facility entry as it appears in the source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFacility {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub link: Option<String>,

    /// Position in the source ("<uuid>#<index>"), for issue messages
    #[serde(skip)]
    pub source: String,
}

impl RawFacility {
    pub fn named(name: &str) -> Self {
        RawFacility {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn with_opening_hours(mut self, opening_hours: &str) -> Self {
        self.opening_hours = Some(opening_hours.to_string());
        self
    }

    pub fn with_contact(mut self, contact: &str) -> Self {
        self.contact = Some(contact.to_string());
        self
    }

    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_string());
        self
    }
}

/// Read the `{uuid: [record, …]}` source, keeping file order
pub fn read_facility_records<R: Read>(reader: R) -> Result<Vec<RawFacility>, SourceError> {
    let grouped: IndexMap<String, Vec<RawFacility>> = serde_json::from_reader(reader)?;

    let mut records = Vec::new();
    for (uuid, entries) in grouped {
        for (position, mut record) in entries.into_iter().enumerate() {
            record.source = format!("{}#{}", uuid, position);
            records.push(record);
        }
    }

    Ok(records)
}

pub fn read_facility_file(path: &Path) -> Result<Vec<RawFacility>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    read_facility_records(BufReader::new(file))
}

// ============================================================================
// FACILITY ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub uid: Uid,

    /// Canonical key (normalized + case-folded name)
    pub key: String,

    /// Display name of the first record seen
    pub name: String,

    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub contact: Option<String>,
    pub additional_info: Option<String>,
    pub link: Option<String>,

    /// Source positions merged into this facility
    pub sources: Vec<String>,
}

impl Facility {
    fn from_raw(name: String, raw: RawFacility) -> Self {
        let key = canonical_key(&name);
        Facility {
            uid: assign_uid(&name),
            key,
            name,
            address: clean_field(raw.address),
            opening_hours: clean_field(raw.opening_hours),
            contact: clean_field(raw.contact),
            additional_info: clean_field(raw.additional_info),
            link: clean_field(raw.link),
            sources: vec![raw.source],
        }
    }

    /// Fill empty fields from `other`. Returns how many fields were filled.
    pub fn merge(&mut self, other: RawFacility) -> usize {
        let filled = fill(&mut self.address, other.address)
            + fill(&mut self.opening_hours, other.opening_hours)
            + fill(&mut self.contact, other.contact)
            + fill(&mut self.additional_info, other.additional_info)
            + fill(&mut self.link, other.link);

        self.sources.push(other.source);
        filled
    }

    /// Number of non-empty optional fields
    pub fn completeness(&self) -> usize {
        [
            &self.address,
            &self.opening_hours,
            &self.contact,
            &self.additional_info,
            &self.link,
        ]
        .iter()
        .filter(|field| field.is_some())
        .count()
    }

    /// Store properties (only populated fields; empty never overwrites)
    pub fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        let fields = [
            ("address", &self.address),
            ("opening_hours", &self.opening_hours),
            ("contact", &self.contact),
            ("additional_info", &self.additional_info),
            ("link", &self.link),
        ];

        for (key, value) in fields {
            if let Some(value) = value {
                properties.insert(key.to_string(), Value::String(value.clone()));
            }
        }

        properties
    }
}

fn clean_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Non-empty wins over empty; an existing value is never replaced
fn fill(slot: &mut Option<String>, incoming: Option<String>) -> usize {
    if slot.is_some() {
        return 0;
    }

    match clean_field(incoming) {
        Some(value) => {
            *slot = Some(value);
            1
        }
        None => 0,
    }
}

// ============================================================================
// FACILITY INDEX
// ============================================================================

/// One facility per canonical key, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct FacilityIndex {
    facilities: IndexMap<String, Facility>,
}

impl FacilityIndex {
    pub fn get(&self, key: &str) -> Option<&Facility> {
        self.facilities.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.facilities.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.facilities.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.values()
    }

    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }
}

/// Output of [`load_facilities`]
#[derive(Debug, Clone, Default)]
pub struct FacilityLoad {
    pub index: FacilityIndex,
    pub records_read: usize,
    pub issues: Vec<QualityIssue>,
}

/// Normalize names and merge duplicates into one facility per canonical key.
///
/// Records without a usable name are skipped and reported as
/// `MalformedRecord`; they never abort the load.
pub fn load_facilities<I>(records: I, normalizer: &TextNormalizer<'_>) -> FacilityLoad
where
    I: IntoIterator<Item = RawFacility>,
{
    let mut load = FacilityLoad::default();

    for record in records {
        load.records_read += 1;

        let name = normalizer.normalize(record.name.as_deref().unwrap_or(""));
        if name.is_empty() {
            load.issues.push(QualityIssue::raise(
                IssueKind::MalformedRecord,
                record.source.clone(),
                "facility record has no name; skipped",
            ));
            continue;
        }

        let key = canonical_key(&name);
        match load.index.facilities.get_mut(&key) {
            None => {
                debug!(facility = %name, source = %record.source, "new facility");
                let facility = Facility::from_raw(name, record);
                load.index.facilities.insert(key, facility);
            }
            Some(existing) => {
                let source = record.source.clone();
                let filled = existing.merge(record);
                load.issues.push(QualityIssue::raise(
                    IssueKind::MergedDuplicate,
                    existing.name.clone(),
                    format!("merged {} ({} field(s) filled)", source, filled),
                ));
            }
        }
    }

    info!(
        records = load.records_read,
        facilities = load.index.len(),
        "facilities loaded"
    );

    load
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn load(records: Vec<RawFacility>) -> FacilityLoad {
        let vocabulary = Vocabulary::builtin().unwrap();
        let normalizer = TextNormalizer::new(&vocabulary);
        load_facilities(records, &normalizer)
    }

    #[test]
    fn test_complementary_records_merge() {
        let result = load(vec![
            RawFacility::named("Wertstoffhof Nord").with_address("Max-Holder-Str. 29"),
            RawFacility::named("Wertstoffhof  Nord").with_opening_hours("Mo-Fr 8-17"),
            RawFacility::named("wertstoffhof nord")
                .with_contact("069 212 30")
                .with_link("https://www.fes-frankfurt.de"),
        ]);

        assert_eq!(result.records_read, 3);
        assert_eq!(result.index.len(), 1, "one facility per canonical name");

        let facility = result.index.get("wertstoffhof nord").unwrap();
        assert_eq!(facility.name, "Wertstoffhof Nord");
        assert_eq!(facility.address.as_deref(), Some("Max-Holder-Str. 29"));
        assert_eq!(facility.opening_hours.as_deref(), Some("Mo-Fr 8-17"));
        assert_eq!(facility.contact.as_deref(), Some("069 212 30"));
        assert_eq!(facility.link.as_deref(), Some("https://www.fes-frankfurt.de"));
        assert_eq!(facility.completeness(), 4);
        assert_eq!(facility.sources.len(), 3);
    }

    #[test]
    fn test_first_seen_wins_on_conflict() {
        let result = load(vec![
            RawFacility::named("Wertstoffhof West").with_address("Am Römerhof 3"),
            RawFacility::named("Wertstoffhof West").with_address("Somewhere else 1"),
        ]);

        let facility = result.index.get("wertstoffhof west").unwrap();
        assert_eq!(facility.address.as_deref(), Some("Am Römerhof 3"));
    }

    #[test]
    fn test_blank_value_never_wins() {
        let result = load(vec![
            RawFacility::named("Wertstoffhof Süd").with_address("   "),
            RawFacility::named("Wertstoffhof Süd").with_address("Babenhäuser Landstr. 1"),
        ]);

        let facility = result.index.get("wertstoffhof süd").unwrap();
        assert_eq!(facility.address.as_deref(), Some("Babenhäuser Landstr. 1"));
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut unnamed = RawFacility::named("   ");
        unnamed.source = "abc#0".to_string();

        let result = load(vec![unnamed, RawFacility::default(), RawFacility::named("Biotonne")]);

        assert_eq!(result.records_read, 3);
        assert_eq!(result.index.len(), 1);
        let malformed: Vec<_> = result
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::MalformedRecord)
            .collect();
        assert_eq!(malformed.len(), 2);
        assert_eq!(malformed[0].subject, "abc#0");
    }

    #[test]
    fn test_synonym_variants_merge() {
        let result = load(vec![
            RawFacility::named("Fachhandel / Hersteller"),
            RawFacility::named("Fachhandel/Hersteller").with_contact("Händler vor Ort"),
        ]);

        assert_eq!(result.index.len(), 1);
        let facility = result.index.get("fachhandel / hersteller").unwrap();
        assert_eq!(facility.contact.as_deref(), Some("Händler vor Ort"));
        assert_eq!(facility.uid, assign_uid("Fachhandel / Hersteller"));
    }

    #[test]
    fn test_properties_skip_empty_fields() {
        let result = load(vec![RawFacility::named("Wertstoffhof Ost").with_address("Ost-Str. 5")]);
        let properties = result.index.get("wertstoffhof ost").unwrap().properties();

        assert_eq!(properties.len(), 1);
        assert_eq!(properties["address"], "Ost-Str. 5");
    }

    #[test]
    fn test_read_records_keeps_order_and_nulls() {
        let json = r#"{
            "b-uuid": [
                {"name": "Wertstoffhof Nord", "address": "Max-Holder-Str. 29", "link": null},
                {"name": "Biotonne", "extra": 42}
            ],
            "a-uuid": [
                {"name": "Wertstoffhof Nord", "link": "https://example.org"}
            ]
        }"#;

        let records = read_facility_records(json.as_bytes()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].source, "b-uuid#0");
        assert_eq!(records[0].link, None);
        assert_eq!(records[1].source, "b-uuid#1");
        assert_eq!(records[2].source, "a-uuid#0");
    }

    #[test]
    fn test_read_records_rejects_bad_json() {
        let result = read_facility_records("[1, 2".as_bytes());
        assert!(matches!(result, Err(SourceError::Json(_))));
    }
}
