// 🧪 In-memory graph store
//
// Same contract as the SQLite store, no I/O. Ordered maps keep query
// results deterministic.

use super::{
    count_row, merge_properties, node_row, non_empty_properties, relationship_row, GraphQuery,
    GraphStore, NodeLabel, Properties, RelType, Row, Upsert,
};
use crate::error::{StoreError, StoreResult};
use crate::identity::Uid;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub name: String,
    pub properties: Properties,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryGraphStore {
    nodes: BTreeMap<(NodeLabel, Uid), StoredNode>,
    relationships: BTreeSet<(RelType, Uid, Uid)>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, label: NodeLabel, uid: &Uid) -> Option<&StoredNode> {
        self.nodes.get(&(label, uid.clone()))
    }

    pub fn contains_node(&self, label: NodeLabel, uid: &Uid) -> bool {
        self.nodes.contains_key(&(label, uid.clone()))
    }

    pub fn contains_relationship(&self, rel_type: RelType, source: &Uid, target: &Uid) -> bool {
        self.relationships
            .contains(&(rel_type, source.clone(), target.clone()))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.relationships.clear();
    }

    fn node_rows<'s>(&'s self, rows: impl Iterator<Item = (&'s (NodeLabel, Uid), &'s StoredNode)>) -> Vec<Row> {
        rows.map(|((label, uid), node)| node_row(*label, uid, &node.name, &node.properties))
            .collect()
    }
}

impl GraphStore for MemoryGraphStore {
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        uid: &Uid,
        name: &str,
        properties: &Properties,
    ) -> StoreResult<Upsert> {
        match self.nodes.get_mut(&(label, uid.clone())) {
            Some(stored) => {
                merge_properties(&mut stored.properties, properties);
                Ok(Upsert::Matched)
            }
            None => {
                debug!(%label, %uid, name, "memory store: node created");
                self.nodes.insert(
                    (label, uid.clone()),
                    StoredNode {
                        name: name.to_string(),
                        properties: non_empty_properties(properties),
                    },
                );
                Ok(Upsert::Created)
            }
        }
    }

    fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert> {
        if !self.contains_node(rel_type.source_label(), source)
            || !self.contains_node(rel_type.target_label(), target)
        {
            return Err(StoreError::DanglingRelationship {
                rel_type: rel_type.as_str(),
                source_uid: source.to_string(),
                target_uid: target.to_string(),
            });
        }

        if self
            .relationships
            .insert((rel_type, source.clone(), target.clone()))
        {
            Ok(Upsert::Created)
        } else {
            Ok(Upsert::Matched)
        }
    }

    fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>> {
        let rows = match query {
            GraphQuery::CountNodes(label) => {
                let n = self
                    .nodes
                    .keys()
                    .filter(|(l, _)| label.map_or(true, |wanted| *l == wanted))
                    .count();
                vec![count_row(n)]
            }
            GraphQuery::CountRelationships(rel_type) => {
                let n = self
                    .relationships
                    .iter()
                    .filter(|(r, _, _)| rel_type.map_or(true, |wanted| *r == wanted))
                    .count();
                vec![count_row(n)]
            }
            GraphQuery::Nodes(label) => {
                self.node_rows(self.nodes.iter().filter(|((l, _), _)| l == label))
            }
            GraphQuery::NodeByUid(label, uid) => self
                .node(*label, uid)
                .map(|node| node_row(*label, uid, &node.name, &node.properties))
                .into_iter()
                .collect(),
            GraphQuery::Relationships(rel_type) => self
                .relationships
                .iter()
                .filter(|(r, _, _)| r == rel_type)
                .map(|(r, source, target)| relationship_row(*r, source, target))
                .collect(),
            GraphQuery::Relationship {
                rel_type,
                source,
                target,
            } => {
                if self.contains_relationship(*rel_type, source, target) {
                    vec![relationship_row(*rel_type, source, target)]
                } else {
                    Vec::new()
                }
            }
            GraphQuery::NodesWithoutOutgoing(label) => {
                let with_outgoing: BTreeSet<&Uid> = self
                    .relationships
                    .iter()
                    .filter(|(r, _, _)| r.source_label() == *label)
                    .map(|(_, source, _)| source)
                    .collect();

                self.node_rows(
                    self.nodes
                        .iter()
                        .filter(|((l, uid), _)| l == label && !with_outgoing.contains(uid)),
                )
            }
        };

        Ok(rows)
    }
}
