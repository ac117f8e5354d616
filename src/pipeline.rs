// 🚚 Import Pipeline - Sources → normalized entities → graph
//
// Single pass, single thread:
//   1. facilities: load, merge duplicates, upsert one node per canonical name
//   2. waste items: per row, upsert the item, extract + classify targets,
//      upsert each target and the DISPOSED_AT / DISPOSED_IN edge
//
// Every write is an upsert, so an interrupted run is fixed by running again.

use crate::classifier::{Target, TargetClassifier};
use crate::data_quality::{IssueKind, QualityIssue, QualitySummary};
use crate::error::{PipelineError, Result, Stage};
use crate::extractor::{PatternExtractor, TargetExtractor};
use crate::facilities::{load_facilities, read_facility_file, FacilityIndex, FacilityLoad, RawFacility};
use crate::graph::{node_names, GraphStore, NodeLabel, Properties, RelType, Upsert};
use crate::identity::{assign_uid, canonical_key};
use crate::normalizer::TextNormalizer;
use crate::vocabulary::Vocabulary;
use crate::waste_items::{read_waste_item_file, WasteItemSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteTally {
    pub created: usize,
    pub matched: usize,
}

impl WriteTally {
    fn record(&mut self, outcome: Upsert) {
        match outcome {
            Upsert::Created => self.created += 1,
            Upsert::Matched => self.matched += 1,
        }
    }
}

/// Counts and issues of one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,

    pub facility_records_read: usize,
    pub facilities_loaded: usize,
    pub facilities_merged: usize,

    pub waste_item_rows_read: usize,
    pub section_markers: usize,
    pub waste_items: usize,
    pub mentions_extracted: usize,

    pub node_writes: BTreeMap<NodeLabel, WriteTally>,
    pub relationship_writes: BTreeMap<RelType, WriteTally>,

    pub issues: Vec<QualityIssue>,
}

impl Default for ImportReport {
    fn default() -> Self {
        ImportReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            dry_run: false,
            facility_records_read: 0,
            facilities_loaded: 0,
            facilities_merged: 0,
            waste_item_rows_read: 0,
            section_markers: 0,
            waste_items: 0,
            mentions_extracted: 0,
            node_writes: BTreeMap::new(),
            relationship_writes: BTreeMap::new(),
            issues: Vec::new(),
        }
    }
}

impl ImportReport {
    pub fn new(dry_run: bool) -> Self {
        ImportReport {
            dry_run,
            ..Default::default()
        }
    }

    pub fn record_node(&mut self, label: NodeLabel, outcome: Upsert) {
        self.node_writes.entry(label).or_default().record(outcome);
    }

    pub fn record_relationship(&mut self, rel_type: RelType, outcome: Upsert) {
        self.relationship_writes.entry(rel_type).or_default().record(outcome);
    }

    pub fn nodes(&self, label: NodeLabel) -> WriteTally {
        self.node_writes.get(&label).copied().unwrap_or_default()
    }

    pub fn relationships(&self, rel_type: RelType) -> WriteTally {
        self.relationship_writes.get(&rel_type).copied().unwrap_or_default()
    }

    pub fn nodes_created(&self) -> usize {
        self.node_writes.values().map(|t| t.created).sum()
    }

    pub fn relationships_created(&self) -> usize {
        self.relationship_writes.values().map(|t| t.created).sum()
    }

    pub fn quality(&self) -> QualitySummary {
        QualitySummary::from_issues(&self.issues)
    }

    /// Issues of one kind
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |issue| issue.kind == kind)
    }

    /// Payload of the `import_run` audit event
    pub fn to_event_data(&self) -> serde_json::Value {
        let quality = self.quality();
        serde_json::json!({
            "started_at": self.started_at.to_rfc3339(),
            "facility_records_read": self.facility_records_read,
            "facilities_loaded": self.facilities_loaded,
            "waste_item_rows_read": self.waste_item_rows_read,
            "waste_items": self.waste_items,
            "nodes_created": self.nodes_created(),
            "relationships_created": self.relationships_created(),
            "warnings": quality.warnings,
        })
    }
}

// ============================================================================
// SOURCES
// ============================================================================

pub fn load_facility_source(path: &Path) -> Result<Vec<RawFacility>> {
    read_facility_file(path).map_err(|e| PipelineError::source(Stage::LoadFacilities, e))
}

pub fn load_waste_item_source(path: &Path) -> Result<WasteItemSource> {
    read_waste_item_file(path).map_err(|e| PipelineError::source(Stage::LoadWasteItems, e))
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline<'a> {
    normalizer: TextNormalizer<'a>,
    extractor: Box<dyn TargetExtractor + 'a>,
    classifier: TargetClassifier<'a>,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with the catalog-driven extractor
    pub fn new(vocabulary: &'a Vocabulary) -> Result<Self> {
        let extractor = PatternExtractor::new(vocabulary)?;
        Ok(Self::with_extractor(vocabulary, Box::new(extractor)))
    }

    pub fn with_extractor(vocabulary: &'a Vocabulary, extractor: Box<dyn TargetExtractor + 'a>) -> Self {
        Pipeline {
            normalizer: TextNormalizer::new(vocabulary),
            extractor,
            classifier: TargetClassifier::new(vocabulary),
        }
    }

    /// Both stages, facilities first
    pub fn run(
        &self,
        facilities: Vec<RawFacility>,
        waste_items: WasteItemSource,
        store: &mut dyn GraphStore,
        report: &mut ImportReport,
    ) -> Result<()> {
        let index = self.import_facilities(facilities, store, report)?;
        self.import_waste_items(waste_items, &index, store, report)?;

        info!(
            run_id = %report.run_id,
            nodes_created = report.nodes_created(),
            relationships_created = report.relationships_created(),
            quality = %report.quality().summary(),
            "import finished"
        );

        Ok(())
    }

    /// Load, merge and upsert facilities. Returns the merged index so the
    /// waste-item stage can resolve facility mentions against it.
    pub fn import_facilities(
        &self,
        records: Vec<RawFacility>,
        store: &mut dyn GraphStore,
        report: &mut ImportReport,
    ) -> Result<FacilityIndex> {
        let FacilityLoad {
            index,
            records_read,
            issues,
        } = load_facilities(records, &self.normalizer);

        report.facility_records_read += records_read;
        report.facilities_loaded += index.len();
        report.facilities_merged += issues
            .iter()
            .filter(|issue| issue.kind == IssueKind::MergedDuplicate)
            .count();
        report.issues.extend(issues);

        for facility in index.iter() {
            let outcome = store
                .upsert_node(NodeLabel::Facility, &facility.uid, &facility.name, &facility.properties())
                .map_err(|e| PipelineError::store(Stage::WriteFacilities, e))?;
            report.record_node(NodeLabel::Facility, outcome);
        }

        info!(
            facilities = index.len(),
            created = report.nodes(NodeLabel::Facility).created,
            "facilities written"
        );

        Ok(index)
    }

    /// Upsert waste items and their disposal relationships.
    ///
    /// Facility mentions resolve against `facilities` and against Facility
    /// nodes already in the store. Unresolved ones are still written as
    /// name-only Facility nodes and reported once per name.
    pub fn import_waste_items(
        &self,
        source: WasteItemSource,
        facilities: &FacilityIndex,
        store: &mut dyn GraphStore,
        report: &mut ImportReport,
    ) -> Result<()> {
        let mut known: HashSet<String> = facilities.keys().cloned().collect();
        let stored = node_names(&*store, NodeLabel::Facility)
            .map_err(|e| PipelineError::store(Stage::QueryStore, e))?;
        known.extend(stored.iter().map(|name| canonical_key(name)));

        report.waste_item_rows_read += source.rows_read;
        report.section_markers += source.section_markers;
        report.issues.extend(source.issues);

        let mut items_seen: HashSet<String> = HashSet::new();
        let mut unresolved: HashSet<String> = HashSet::new();
        let no_properties = Properties::new();

        for row in source.rows {
            let item_name = self.normalizer.clean(&row.name);
            let item_uid = assign_uid(&item_name);

            let outcome = store
                .upsert_node(NodeLabel::WasteItem, &item_uid, &item_name, &no_properties)
                .map_err(|e| PipelineError::store(Stage::WriteWasteItems, e))?;
            report.record_node(NodeLabel::WasteItem, outcome);
            items_seen.insert(canonical_key(&item_name));

            let cell = row.disposal.trim();
            if cell.is_empty() || cell == "-" {
                report.issues.push(QualityIssue::raise(
                    IssueKind::NoDisposalTarget,
                    item_name.clone(),
                    format!("line {}: empty disposal target", row.line),
                ));
                continue;
            }

            let mentions = self.extractor.extract_targets(&row.disposal);
            if mentions.is_empty() {
                report.issues.push(QualityIssue::raise(
                    IssueKind::NoValidTarget,
                    item_name.clone(),
                    format!("line {}: only notes in {:?}", row.line, cell),
                ));
                continue;
            }

            for mention in mentions {
                report.mentions_extracted += 1;
                let target = self.classifier.classify(&mention);

                if let Target::Facility(name) = &target {
                    let key = target.key();
                    if !known.contains(&key) && unresolved.insert(key) {
                        report.issues.push(QualityIssue::raise(
                            IssueKind::UnresolvedReference,
                            name.clone(),
                            format!("referenced by {} but not in the facility source", item_name),
                        ));
                    }
                }

                let target_uid = target.uid();
                let outcome = store
                    .upsert_node(target.label(), &target_uid, target.name(), &no_properties)
                    .map_err(|e| PipelineError::store(Stage::WriteWasteItems, e))?;
                report.record_node(target.label(), outcome);

                let rel_type = target.relationship();
                let outcome = store
                    .upsert_relationship(rel_type, &item_uid, &target_uid)
                    .map_err(|e| PipelineError::store(Stage::WriteWasteItems, e))?;
                report.record_relationship(rel_type, outcome);

                debug!(item = %item_name, %target, ?outcome, "linked");
            }
        }

        report.waste_items += items_seen.len();

        info!(
            items = items_seen.len(),
            mentions = report.mentions_extracted,
            unresolved = unresolved.len(),
            "waste items written"
        );

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, StoreResult};
    use crate::graph::{graph_stats, GraphQuery, MemoryGraphStore, Row};
    use crate::identity::Uid;
    use crate::waste_items::WasteItemRow;

    fn row(line: u64, name: &str, disposal: &str) -> WasteItemRow {
        WasteItemRow {
            line,
            name: name.to_string(),
            disposal: disposal.to_string(),
        }
    }

    fn source(rows: Vec<WasteItemRow>) -> WasteItemSource {
        WasteItemSource {
            rows_read: rows.len(),
            rows,
            ..Default::default()
        }
    }

    /// Extractor that treats every line as one mention
    struct LineExtractor;

    impl TargetExtractor for LineExtractor {
        fn extract_targets(&self, cell: &str) -> Vec<String> {
            cell.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    /// Memory store whose node writes fail for one label
    struct LockedStore {
        inner: MemoryGraphStore,
        locked: NodeLabel,
    }

    impl LockedStore {
        fn new(locked: NodeLabel) -> Self {
            LockedStore {
                inner: MemoryGraphStore::new(),
                locked,
            }
        }
    }

    impl GraphStore for LockedStore {
        fn upsert_node(
            &mut self,
            label: NodeLabel,
            uid: &Uid,
            name: &str,
            properties: &Properties,
        ) -> StoreResult<Upsert> {
            if label == self.locked {
                return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    Some("database is locked".to_string()),
                )));
            }
            self.inner.upsert_node(label, uid, name, properties)
        }

        fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert> {
            self.inner.upsert_relationship(rel_type, source, target)
        }

        fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>> {
            self.inner.query(query)
        }
    }

    #[test]
    fn test_multi_target_row() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                vec![RawFacility::named("Wertstoffhof Nord").with_address("Max-Holder-Str. 29")],
                source(vec![row(2, "Altholz", "Restabfalltonne\nWertstoffhof Nord")]),
                &mut store,
                &mut report,
            )
            .unwrap();

        let stats = graph_stats(&store).unwrap();
        assert_eq!(stats.facilities, 1);
        assert_eq!(stats.waste_streams, 1);
        assert_eq!(stats.disposed_at, 1);
        assert_eq!(stats.disposed_in, 1);
        assert_eq!(report.mentions_extracted, 2);
        assert_eq!(report.quality().warnings, 0);
    }

    #[test]
    fn test_unresolved_reported_once() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                Vec::new(),
                source(vec![
                    row(2, "Altholz", "Wertstoffhof Harheim"),
                    row(3, "Altmetall", "wertstoffhof  harheim"),
                ]),
                &mut store,
                &mut report,
            )
            .unwrap();

        assert_eq!(report.issues_of(IssueKind::UnresolvedReference).count(), 1);
        let stats = graph_stats(&store).unwrap();
        assert_eq!(stats.facilities, 1, "name-only facility created once");
        assert_eq!(stats.disposed_at, 2);
    }

    #[test]
    fn test_facility_in_store_resolves() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();

        let mut first = ImportReport::new(false);
        pipeline
            .import_facilities(vec![RawFacility::named("Wertstoffhof West")], &mut store, &mut first)
            .unwrap();

        let mut second = ImportReport::new(false);
        pipeline
            .import_waste_items(
                source(vec![row(2, "Bauschutt", "Wertstoffhof West")]),
                &FacilityIndex::default(),
                &mut store,
                &mut second,
            )
            .unwrap();

        assert_eq!(second.issues_of(IssueKind::UnresolvedReference).count(), 0);
        assert_eq!(second.nodes(NodeLabel::Facility).matched, 1);
    }

    #[test]
    fn test_notes_only_cell() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                Vec::new(),
                source(vec![row(2, "Feuerwerk", "Laut FES: siehe Hinweis")]),
                &mut store,
                &mut report,
            )
            .unwrap();

        assert_eq!(report.issues_of(IssueKind::NoValidTarget).count(), 1);
        assert_eq!(graph_stats(&store).unwrap().items_without_target, 1);
    }

    #[test]
    fn test_custom_extractor() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::with_extractor(&vocabulary, Box::new(LineExtractor));
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                Vec::new(),
                source(vec![row(2, "Altpapier", "Altpapiertonne\nBiotonne")]),
                &mut store,
                &mut report,
            )
            .unwrap();

        assert_eq!(report.relationships(RelType::DisposedIn).created, 2);
    }

    #[test]
    fn test_duplicate_item_rows_merge() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                Vec::new(),
                source(vec![
                    row(2, "Altholz", "Biotonne"),
                    row(3, "ALTHOLZ ", "Biotonne"),
                ]),
                &mut store,
                &mut report,
            )
            .unwrap();

        assert_eq!(report.waste_items, 1);
        assert_eq!(report.nodes(NodeLabel::WasteItem), WriteTally { created: 1, matched: 1 });
        assert_eq!(report.relationships(RelType::DisposedIn).created, 1);
    }

    #[test]
    fn test_store_failure_in_facility_stage_aborts() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = LockedStore::new(NodeLabel::Facility);
        let mut report = ImportReport::new(false);

        let err = pipeline
            .run(
                vec![RawFacility::named("Wertstoffhof Nord")],
                source(vec![row(2, "Altholz", "Biotonne")]),
                &mut store,
                &mut report,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::StoreUnavailable { .. }), "got: {}", err);
        assert_eq!(err.stage(), Some(Stage::WriteFacilities));
        assert!(err.to_string().contains("writing facilities"));

        // The waste-item stage never ran
        assert_eq!(store.inner.node_count(), 0);
        assert_eq!(report.waste_items, 0);
        assert_eq!(report.nodes(NodeLabel::WasteItem), WriteTally::default());
    }

    #[test]
    fn test_store_failure_in_waste_item_stage_aborts() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = LockedStore::new(NodeLabel::WasteItem);
        let mut report = ImportReport::new(false);

        let err = pipeline
            .run(
                vec![RawFacility::named("Wertstoffhof Nord")],
                source(vec![
                    row(2, "Altholz", "Wertstoffhof Nord"),
                    row(3, "Altmetall", "Wertstoffhof Nord"),
                ]),
                &mut store,
                &mut report,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::StoreUnavailable { .. }), "got: {}", err);
        assert_eq!(err.stage(), Some(Stage::WriteWasteItems));

        // Facilities were committed, nothing after the first failing row
        assert_eq!(store.inner.node_count(), 1);
        assert_eq!(store.inner.relationship_count(), 0);
        assert_eq!(report.mentions_extracted, 0);
    }

    #[test]
    fn test_loaded_facility_links_next_to_unknown_name() {
        let vocabulary = Vocabulary::builtin().unwrap();
        let pipeline = Pipeline::new(&vocabulary).unwrap();
        let mut store = MemoryGraphStore::new();
        let mut report = ImportReport::new(false);

        pipeline
            .run(
                vec![RawFacility::named("Wertstoffhof Nord").with_address("Max-Holder-Str. 29")],
                source(vec![row(2, "Altholz", "Wertstoffhof Nord Wertstoffhof Harheim")]),
                &mut store,
                &mut report,
            )
            .unwrap();

        assert!(store.contains_relationship(
            RelType::DisposedAt,
            &assign_uid("Altholz"),
            &assign_uid("Wertstoffhof Nord"),
        ));
        assert!(store.contains_relationship(
            RelType::DisposedAt,
            &assign_uid("Altholz"),
            &assign_uid("Wertstoffhof Harheim"),
        ));

        let mut names = node_names(&store, NodeLabel::Facility).unwrap();
        names.sort();
        assert_eq!(names, vec!["Wertstoffhof Harheim", "Wertstoffhof Nord"]);

        let unresolved: Vec<&str> = report
            .issues_of(IssueKind::UnresolvedReference)
            .map(|issue| issue.subject.as_str())
            .collect();
        assert_eq!(unresolved, vec!["Wertstoffhof Harheim"]);
    }
}
