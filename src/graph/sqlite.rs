// 🗄️ SQLite graph store
//
// Nodes and relationships as two tables plus the events audit trail:
//
//   nodes(label, uid, name, properties, created_at, updated_at)   PK (label, uid)
//   relationships(rel_type, source_uid, target_uid, created_at)   PK (all three)
//   events(event_id, timestamp, event_type, entity_type, entity_id, data, actor)
//
// Every import run leaves one `import_run` event ("Every change is an event").

use super::{
    count_row, graph_stats, merge_properties, node_row, non_empty_properties, relationship_row,
    GraphQuery, GraphStats, GraphStore, NodeLabel, Properties, RelType, Row, Upsert,
};
use crate::error::{StoreError, StoreResult};
use crate::identity::Uid;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Actor recorded on events written by the importer
pub const IMPORT_ACTOR: &str = "fessi-import";

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

/// One row of the import audit trail: `import_run` after each committed
/// run, `graph_reset` after `clear_all`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    /// Fresh event id, stamped now
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened graph database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteGraphStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Node counts by label and relationship counts by type
    pub fn stats(&self) -> StoreResult<GraphStats> {
        graph_stats(self)
    }

    /// Delete every node and relationship. The events table is kept and
    /// gets a `graph_reset` entry. Returns the number of deleted nodes.
    pub fn clear_all(&mut self) -> StoreResult<usize> {
        let tx = self.conn.transaction()?;
        let relationships = tx.execute("DELETE FROM relationships", [])?;
        let nodes = tx.execute("DELETE FROM nodes", [])?;
        tx.commit()?;

        let event = Event::new(
            "graph_reset",
            "graph",
            "all",
            serde_json::json!({ "nodes": nodes, "relationships": relationships }),
            IMPORT_ACTOR,
        );
        self.insert_event(&event)?;

        info!(nodes, relationships, "graph cleared");
        Ok(nodes)
    }

    /// Record a committed import run
    pub fn record_run(&self, run_id: &str, data: serde_json::Value) -> StoreResult<Event> {
        let event = Event::new("import_run", "import", run_id, data, IMPORT_ACTOR);
        self.insert_event(&event)?;
        Ok(event)
    }

    pub fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    /// Events for one entity, newest first
    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> StoreResult<Vec<Event>> {
        self.select_events(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
            params![entity_type, entity_id],
        )
    }

    /// Most recent events of a type, newest first
    pub fn recent_events(&self, event_type: &str, limit: usize) -> StoreResult<Vec<Event>> {
        self.select_events(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE event_type = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
            params![event_type, limit as i64],
        )
    }

    fn select_events(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(sql)?;

        let raw = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(raw.len());
        for (event_id, timestamp, event_type, entity_type, entity_id, data, actor) in raw {
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                })?
                .with_timezone(&Utc);

            events.push(Event {
                event_id,
                timestamp,
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data)?,
                actor,
            });
        }

        Ok(events)
    }

    fn node_exists(&self, label: NodeLabel, uid: &Uid) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM nodes WHERE label = ?1 AND uid = ?2",
                params![label.as_str(), uid.as_str()],
                |_| Ok(()),
            )
            .optional()?;

        Ok(found.is_some())
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Row>> {
        let n: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(vec![count_row(n.max(0) as usize)])
    }

    fn select_nodes(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;

        let raw = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (label, uid, name, properties) in raw {
            let Some(label) = NodeLabel::parse(&label) else {
                continue;
            };
            let properties: Properties = serde_json::from_str(&properties)?;
            rows.push(node_row(label, &Uid::from_stored(uid), &name, &properties));
        }

        Ok(rows)
    }

    fn select_relationships(&self, sql: &str, params: impl rusqlite::Params) -> StoreResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;

        let raw = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(raw
            .into_iter()
            .filter_map(|(rel_type, source, target)| {
                RelType::parse(&rel_type).map(|rel_type| {
                    relationship_row(rel_type, &Uid::from_stored(source), &Uid::from_stored(target))
                })
            })
            .collect())
    }
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

    // ==========================================================================
    // Nodes
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS nodes (
            label TEXT NOT NULL,
            uid TEXT NOT NULL,
            name TEXT NOT NULL,
            properties TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (label, uid)
        )",
        [],
    )?;

    // ==========================================================================
    // Relationships
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS relationships (
            rel_type TEXT NOT NULL,
            source_uid TEXT NOT NULL,
            target_uid TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (rel_type, source_uid, target_uid)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(label, name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_uid)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

impl GraphStore for SqliteGraphStore {
    fn upsert_node(
        &mut self,
        label: NodeLabel,
        uid: &Uid,
        name: &str,
        properties: &Properties,
    ) -> StoreResult<Upsert> {
        let now = Utc::now().to_rfc3339();

        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT properties FROM nodes WHERE label = ?1 AND uid = ?2",
                params![label.as_str(), uid.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            None => {
                let properties_json = serde_json::to_string(&non_empty_properties(properties))?;
                self.conn.execute(
                    "INSERT INTO nodes (label, uid, name, properties, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![label.as_str(), uid.as_str(), name, properties_json, now],
                )?;
                debug!(%label, %uid, name, "node created");
                Ok(Upsert::Created)
            }
            Some(stored_json) => {
                let mut merged: Properties = serde_json::from_str(&stored_json)?;
                if merge_properties(&mut merged, properties) {
                    self.conn.execute(
                        "UPDATE nodes SET properties = ?1, updated_at = ?2
                         WHERE label = ?3 AND uid = ?4",
                        params![serde_json::to_string(&merged)?, now, label.as_str(), uid.as_str()],
                    )?;
                    debug!(%label, %uid, name, "node properties updated");
                }
                Ok(Upsert::Matched)
            }
        }
    }

    fn upsert_relationship(&mut self, rel_type: RelType, source: &Uid, target: &Uid) -> StoreResult<Upsert> {
        if !self.node_exists(rel_type.source_label(), source)?
            || !self.node_exists(rel_type.target_label(), target)?
        {
            return Err(StoreError::DanglingRelationship {
                rel_type: rel_type.as_str(),
                source_uid: source.to_string(),
                target_uid: target.to_string(),
            });
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO relationships (rel_type, source_uid, target_uid, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![rel_type.as_str(), source.as_str(), target.as_str(), Utc::now().to_rfc3339()],
        )?;

        if inserted == 1 {
            debug!(%rel_type, %source, %target, "relationship created");
            Ok(Upsert::Created)
        } else {
            Ok(Upsert::Matched)
        }
    }

    fn query(&self, query: &GraphQuery) -> StoreResult<Vec<Row>> {
        match query {
            GraphQuery::CountNodes(None) => self.count("SELECT COUNT(*) FROM nodes", []),
            GraphQuery::CountNodes(Some(label)) => self.count(
                "SELECT COUNT(*) FROM nodes WHERE label = ?1",
                params![label.as_str()],
            ),
            GraphQuery::CountRelationships(None) => {
                self.count("SELECT COUNT(*) FROM relationships", [])
            }
            GraphQuery::CountRelationships(Some(rel_type)) => self.count(
                "SELECT COUNT(*) FROM relationships WHERE rel_type = ?1",
                params![rel_type.as_str()],
            ),
            GraphQuery::Nodes(label) => self.select_nodes(
                "SELECT label, uid, name, properties FROM nodes
                 WHERE label = ?1
                 ORDER BY uid",
                params![label.as_str()],
            ),
            GraphQuery::NodeByUid(label, uid) => self.select_nodes(
                "SELECT label, uid, name, properties FROM nodes
                 WHERE label = ?1 AND uid = ?2",
                params![label.as_str(), uid.as_str()],
            ),
            GraphQuery::Relationships(rel_type) => self.select_relationships(
                "SELECT rel_type, source_uid, target_uid FROM relationships
                 WHERE rel_type = ?1
                 ORDER BY source_uid, target_uid",
                params![rel_type.as_str()],
            ),
            GraphQuery::Relationship {
                rel_type,
                source,
                target,
            } => self.select_relationships(
                "SELECT rel_type, source_uid, target_uid FROM relationships
                 WHERE rel_type = ?1 AND source_uid = ?2 AND target_uid = ?3",
                params![rel_type.as_str(), source.as_str(), target.as_str()],
            ),
            // Only WasteItems have outgoing relationships
            GraphQuery::NodesWithoutOutgoing(label) if *label != NodeLabel::WasteItem => {
                self.query(&GraphQuery::Nodes(*label))
            }
            GraphQuery::NodesWithoutOutgoing(label) => self.select_nodes(
                "SELECT n.label, n.uid, n.name, n.properties FROM nodes n
                 WHERE n.label = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM relationships r WHERE r.source_uid = n.uid
                   )
                 ORDER BY n.uid",
                params![label.as_str()],
            ),
        }
    }
}
