// 👀 Dry-run store - Log every write, apply none
//
// Wraps a real store. Reads go through unchanged; writes are checked
// against the wrapped store plus what this dry run already "wrote", so the
// Created/Matched counts predict a real run exactly.

use super::{GraphQuery, GraphStore, NodeLabel, Properties, RelType, Row, Upsert};
use crate::error::{StoreError, StoreResult};
use crate::identity::Uid;
use std::collections::BTreeSet;
use tracing::info;

pub struct DryRunStore<S> {
    inner: S,
    planned_nodes: BTreeSet<(NodeLabel, Uid)>,
    planned_relationships: BTreeSet<(RelType, Uid, Uid)>,
    node_writes: usize,
    relationship_writes: usize,
}

impl<S: GraphStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        DryRunStore {
            inner,
            planned_nodes: BTreeSet::new(),
            planned_relationships: BTreeSet::new(),
            node_writes: 0,
            relationship_writes: 0,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Node upserts that would have been sent
    pub fn node_writes(&self) -> usize {
        self.node_writes
    }

    /// Relationship upserts that would have been sent
    pub fn relationship_writes(&self) -> usize {
        self.relationship_writes
    }

    fn node_known(&self, label: NodeLabel, uid: &Uid) -> StoreResult<bool> {
        if self.planned_nodes.contains(&(label, uid.clone())) {
            return Ok(true);
        }
        let rows = self.inner.query(&GraphQuery::NodeByUid(label, uid.clone()))?;
        Ok(!rows.is_empty())
    }
}

impl<S: GraphStore> GraphStore for DryRunStore<S> {
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        uid: &Uid,
        name: &str,
        properties: &Properties,
    ) -> StoreResult<Upsert> {
        self.node_writes += 1;

        let outcome = if self.node_known(label, uid)? {
            Upsert::Matched
        } else {
            Upsert::Created
        };

        let fields: Vec<&str> = properties.keys().map(String::as_str).collect();
        info!(
            %label,
            %uid,
            name,
            properties = ?fields,
            outcome = ?outcome,
            "[dry-run] would upsert node"
        );

        self.planned_nodes.insert((label, uid.clone()));
        Ok(outcome)
    }

    fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert> {
        self.relationship_writes += 1;

        if !self.node_known(rel_type.source_label(), source)?
            || !self.node_known(rel_type.target_label(), target)?
        {
            return Err(StoreError::DanglingRelationship {
                rel_type: rel_type.as_str(),
                source_uid: source.to_string(),
                target_uid: target.to_string(),
            });
        }

        let key = (rel_type, source.clone(), target.clone());
        let outcome = if self.planned_relationships.contains(&key) {
            Upsert::Matched
        } else {
            let existing = self.inner.query(&GraphQuery::Relationship {
                rel_type,
                source: source.clone(),
                target: target.clone(),
            })?;
            if existing.is_empty() {
                Upsert::Created
            } else {
                Upsert::Matched
            }
        };

        info!(%rel_type, %source, %target, outcome = ?outcome, "[dry-run] would upsert relationship");

        self.planned_relationships.insert(key);
        Ok(outcome)
    }

    fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>> {
        self.inner.query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{graph_stats, MemoryGraphStore};
    use crate::identity::assign_uid;

    #[test]
    fn test_dry_run_writes_nothing() {
        let mut store = DryRunStore::new(MemoryGraphStore::new());
        let item = assign_uid("Altholz");
        let stream = assign_uid("Restabfalltonne");

        store.upsert_node(NodeLabel::WasteItem, &item, "Altholz", &Properties::new()).unwrap();
        store
            .upsert_node(NodeLabel::WasteStream, &stream, "Restabfalltonne", &Properties::new())
            .unwrap();
        let outcome = store.upsert_relationship(RelType::DisposedIn, &item, &stream).unwrap();

        assert_eq!(outcome, Upsert::Created);
        assert_eq!(store.node_writes(), 2);
        assert_eq!(store.relationship_writes(), 1);

        let inner = store.into_inner();
        assert_eq!(inner.node_count(), 0);
        assert_eq!(inner.relationship_count(), 0);
    }

    #[test]
    fn test_dry_run_predicts_matches() {
        let mut real = MemoryGraphStore::new();
        let facility = assign_uid("Wertstoffhof Nord");
        real.upsert_node(NodeLabel::Facility, &facility, "Wertstoffhof Nord", &Properties::new())
            .unwrap();

        let mut store = DryRunStore::new(real);
        let item = assign_uid("Altholz");

        let existing = store
            .upsert_node(NodeLabel::Facility, &facility, "Wertstoffhof Nord", &Properties::new())
            .unwrap();
        let first = store.upsert_node(NodeLabel::WasteItem, &item, "Altholz", &Properties::new()).unwrap();
        let second = store.upsert_node(NodeLabel::WasteItem, &item, "Altholz", &Properties::new()).unwrap();

        assert_eq!(existing, Upsert::Matched);
        assert_eq!(first, Upsert::Created);
        assert_eq!(second, Upsert::Matched);

        let edge = store.upsert_relationship(RelType::DisposedAt, &item, &facility).unwrap();
        let again = store.upsert_relationship(RelType::DisposedAt, &item, &facility).unwrap();
        assert_eq!(edge, Upsert::Created);
        assert_eq!(again, Upsert::Matched);

        // Reads still see the real store only
        assert_eq!(graph_stats(&store).unwrap().facilities, 1);
        assert_eq!(graph_stats(&store).unwrap().waste_items, 0);
    }
}
