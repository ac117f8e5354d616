// 🕸️ Graph - Store interface and merge semantics
//
// Schema (fixed):
//   (:WasteItem)-[:DISPOSED_AT]->(:Facility)
//   (:WasteItem)-[:DISPOSED_IN]->(:WasteStream)
//
// Every write is an upsert keyed by (label, uid) for nodes and
// (rel_type, source_uid, target_uid) for relationships, so a run can be
// repeated from scratch at any point.

pub mod dry_run;
pub mod memory;
pub mod sqlite;

pub use dry_run::DryRunStore;
pub use memory::MemoryGraphStore;
pub use sqlite::{Event, SqliteGraphStore};

use crate::error::StoreResult;
use crate::identity::Uid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Node properties (everything except `name`)
pub type Properties = serde_json::Map<String, Value>;

/// One query result row
pub type Row = serde_json::Map<String, Value>;

// ============================================================================
// SCHEMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Facility,
    WasteItem,
    WasteStream,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 3] = [NodeLabel::Facility, NodeLabel::WasteItem, NodeLabel::WasteStream];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Facility => "Facility",
            NodeLabel::WasteItem => "WasteItem",
            NodeLabel::WasteStream => "WasteStream",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        NodeLabel::ALL.into_iter().find(|label| label.as_str() == value)
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelType {
    DisposedAt,
    DisposedIn,
}

impl RelType {
    pub const ALL: [RelType; 2] = [RelType::DisposedAt, RelType::DisposedIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::DisposedAt => "DISPOSED_AT",
            RelType::DisposedIn => "DISPOSED_IN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        RelType::ALL.into_iter().find(|rel| rel.as_str() == value)
    }

    pub fn source_label(&self) -> NodeLabel {
        NodeLabel::WasteItem
    }

    pub fn target_label(&self) -> NodeLabel {
        match self {
            RelType::DisposedAt => NodeLabel::Facility,
            RelType::DisposedIn => NodeLabel::WasteStream,
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upsert {
    Created,
    Matched,
}

// ============================================================================
// QUERIES
// ============================================================================

/// The read operations the pipeline and CLI need.
///
/// Row shapes:
/// - counts: `{"count": n}`
/// - nodes: `{"label", "uid", "name", "properties"}`
/// - relationships: `{"rel_type", "source_uid", "target_uid"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphQuery {
    CountNodes(Option<NodeLabel>),
    CountRelationships(Option<RelType>),
    Nodes(NodeLabel),
    NodeByUid(NodeLabel, Uid),
    Relationships(RelType),
    Relationship {
        rel_type: RelType,
        source: Uid,
        target: Uid,
    },
    /// Nodes of a label with no outgoing relationship (items without a target)
    NodesWithoutOutgoing(NodeLabel),
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

pub trait GraphStore {
    /// Insert the node, or merge `properties` into the stored one.
    ///
    /// `name` is only written on creation. A non-empty incoming property
    /// overwrites; empty or missing properties keep the stored value.
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        uid: &Uid,
        name: &str,
        properties: &Properties,
    ) -> StoreResult<Upsert>;

    /// Insert the relationship unless it already exists. Both endpoints
    /// must already be stored.
    fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert>;

    fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>>;
}

impl<S: GraphStore + ?Sized> GraphStore for Box<S> {
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        uid: &Uid,
        name: &str,
        properties: &Properties,
    ) -> StoreResult<Upsert> {
        (**self).upsert_node(label, uid, name, properties)
    }

    fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert> {
        (**self).upsert_relationship(rel_type, source, target)
    }

    fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>> {
        (**self).query(query)
    }
}

// ============================================================================
// MERGE RULES (shared by every store)
// ============================================================================

/// Empty values never overwrite
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Merge `incoming` into `stored`. Returns true if anything changed.
pub fn merge_properties(stored: &mut Properties, incoming: &Properties) -> bool {
    let mut changed = false;

    for (key, value) in incoming {
        if is_empty_value(value) {
            continue;
        }
        if stored.get(key) != Some(value) {
            stored.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    changed
}

/// Incoming properties with empty values dropped (used on insert)
pub fn non_empty_properties(properties: &Properties) -> Properties {
    properties
        .iter()
        .filter(|(_, value)| !is_empty_value(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

// ============================================================================
// ROW HELPERS
// ============================================================================

pub fn count_row(count: usize) -> Row {
    let mut row = Row::new();
    row.insert("count".to_string(), Value::from(count));
    row
}

pub fn node_row(label: NodeLabel, uid: &Uid, name: &str, properties: &Properties) -> Row {
    let mut row = Row::new();
    row.insert("label".to_string(), Value::from(label.as_str()));
    row.insert("uid".to_string(), Value::from(uid.as_str()));
    row.insert("name".to_string(), Value::from(name));
    row.insert("properties".to_string(), Value::Object(properties.clone()));
    row
}

pub fn relationship_row(rel_type: RelType, source: &Uid, target: &Uid) -> Row {
    let mut row = Row::new();
    row.insert("rel_type".to_string(), Value::from(rel_type.as_str()));
    row.insert("source_uid".to_string(), Value::from(source.as_str()));
    row.insert("target_uid".to_string(), Value::from(target.as_str()));
    row
}

/// Run a count query and read the `count` column
pub fn count<S: GraphStore + ?Sized>(store: &S, query: &GraphQuery) -> StoreResult<usize> {
    let rows = store.query(query)?;
    Ok(rows
        .first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize)
}

/// Display names of every node with `label`
pub fn node_names<S: GraphStore + ?Sized>(store: &S, label: NodeLabel) -> StoreResult<Vec<String>> {
    let rows = store.query(&GraphQuery::Nodes(label))?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

// ============================================================================
// STATS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub facilities: usize,
    pub waste_items: usize,
    pub waste_streams: usize,
    pub disposed_at: usize,
    pub disposed_in: usize,

    /// WasteItems with no outgoing relationship
    pub items_without_target: usize,
}

impl GraphStats {
    pub fn nodes(&self) -> usize {
        self.facilities + self.waste_items + self.waste_streams
    }

    pub fn relationships(&self) -> usize {
        self.disposed_at + self.disposed_in
    }
}

pub fn graph_stats<S: GraphStore + ?Sized>(store: &S) -> StoreResult<GraphStats> {
    let items_without_target = store
        .query(&GraphQuery::NodesWithoutOutgoing(NodeLabel::WasteItem))?
        .len();

    Ok(GraphStats {
        facilities: count(store, &GraphQuery::CountNodes(Some(NodeLabel::Facility)))?,
        waste_items: count(store, &GraphQuery::CountNodes(Some(NodeLabel::WasteItem)))?,
        waste_streams: count(store, &GraphQuery::CountNodes(Some(NodeLabel::WasteStream)))?,
        disposed_at: count(store, &GraphQuery::CountRelationships(Some(RelType::DisposedAt)))?,
        disposed_in: count(store, &GraphQuery::CountRelationships(Some(RelType::DisposedIn)))?,
        items_without_target,
    })
}
