//! In-Memory Versioned Store
//!
//! `MemoryStore` keeps a draft table, a live table and an append-only archive
//! of every version written. It is the backend for tests, benchmarks and the
//! `tree-dump` binary, and the reference for how a `NodeStore` should treat
//! versions and soft deletion.
//!
//! Snapshots (`StoreSnapshot`) serialise both tables to JSON so a hierarchy
//! can be loaded from disk.

use super::error::DatabaseError;
use super::node_store::{ChildrenQuery, NodeStore, StoreResult};
use crate::models::{Node, NodeFilter, NodeId, NodePredicate, Stage, VersionScope};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Serialisable content of both version tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub draft: Vec<Node>,
    #[serde(default)]
    pub live: Vec<Node>,
}

#[derive(Debug, Default)]
struct Tables {
    draft: BTreeMap<NodeId, Node>,
    live: BTreeMap<NodeId, Node>,
    /// Every version ever written, oldest first
    archive: Vec<Node>,
    /// When set, every operation fails with this context
    failure: Option<String>,
}

impl Tables {
    fn check_failure(&self) -> StoreResult<()> {
        match &self.failure {
            Some(context) => Err(DatabaseError::backend(context.clone())),
            None => Ok(()),
        }
    }

    fn table(&self, stage: Stage) -> &BTreeMap<NodeId, Node> {
        match stage {
            Stage::Draft => &self.draft,
            Stage::Live => &self.live,
        }
    }

    /// Version number for the next draft write of `id`
    ///
    /// A record coming back from the archive continues its history.
    fn next_version(&self, id: NodeId) -> i64 {
        let archived = self.archive.iter().filter(|n| n.id == id).map(|n| n.version);
        self.draft
            .get(&id)
            .map(|n| n.version)
            .into_iter()
            .chain(archived)
            .max()
            .map(|v| v + 1)
            .unwrap_or(1)
    }

    /// Clone a row, flagging live rows without a draft counterpart
    fn read(&self, node: &Node, stage: Stage) -> Node {
        let mut node = node.clone();
        node.deleted_from_stage = stage == Stage::Live && !self.draft.contains_key(&node.id);
        node
    }

    /// Rows visible in `scope`, unordered
    fn rows(&self, scope: VersionScope) -> Vec<Node> {
        match scope {
            VersionScope::Draft => self.draft.values().map(|n| self.read(n, Stage::Draft)).collect(),
            VersionScope::Live => self.live.values().map(|n| self.read(n, Stage::Live)).collect(),
            VersionScope::Both => {
                let mut rows: Vec<Node> =
                    self.draft.values().map(|n| self.read(n, Stage::Draft)).collect();
                rows.extend(
                    self.live
                        .values()
                        .filter(|n| !self.draft.contains_key(&n.id))
                        .map(|n| self.read(n, Stage::Live)),
                );
                rows
            }
        }
    }
}

fn sort_siblings(nodes: &mut [Node]) {
    nodes.sort_by(|a, b| a.sort.cmp(&b.sort).then(a.id.cmp(&b.id)));
}

/// Versioned in-memory `NodeStore`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot
    ///
    /// Rows are inserted as-is (versions are not bumped) and archived in
    /// snapshot order, drafts first.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut tables = Tables::default();
        for (stage, rows) in [(Stage::Draft, snapshot.draft), (Stage::Live, snapshot.live)] {
            for mut node in rows {
                node.validate()
                    .map_err(|e| DatabaseError::backend(format!("invalid snapshot row: {}", e)))?;
                node.deleted_from_stage = false;
                let table = match stage {
                    Stage::Draft => &mut tables.draft,
                    Stage::Live => &mut tables.live,
                };
                if table.contains_key(&node.id) {
                    return Err(DatabaseError::duplicate_id(node.id, stage));
                }
                tables.archive.push(node.clone());
                table.insert(node.id, node);
            }
        }
        tracing::debug!(
            "Loaded snapshot: {} draft rows, {} live rows",
            tables.draft.len(),
            tables.live.len()
        );
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Load a JSON snapshot from disk
    pub fn load_snapshot(path: impl AsRef<Path>) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
        Self::from_snapshot(snapshot)
    }

    /// Current content of both tables
    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read();
        StoreSnapshot {
            draft: tables.draft.values().cloned().collect(),
            live: tables.live.values().cloned().collect(),
        }
    }

    /// Make every subsequent operation fail (`None` restores normal operation)
    ///
    /// Used to exercise store-failure propagation.
    pub fn set_failure(&self, context: Option<String>) {
        self.tables.write().failure = context;
    }

    /// Overwrite a row without validation or archiving
    ///
    /// Lets tests plant states the hierarchy services would refuse to write,
    /// such as a pre-existing parent loop.
    pub fn force_row(&self, stage: Stage, node: Node) {
        let mut tables = self.tables.write();
        match stage {
            Stage::Draft => tables.draft.insert(node.id, node),
            Stage::Live => tables.live.insert(node.id, node),
        };
    }

    /// Number of archived versions for a record
    pub fn version_count(&self, id: NodeId) -> usize {
        self.tables
            .read()
            .archive
            .iter()
            .filter(|n| n.id == id)
            .count()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get_node(&self, id: NodeId, stage: Stage) -> StoreResult<Option<Node>> {
        let tables = self.tables.read();
        tables.check_failure()?;
        Ok(tables.table(stage).get(&id).map(|n| tables.read(n, stage)))
    }

    async fn get_children(
        &self,
        parent_id: NodeId,
        query: ChildrenQuery,
    ) -> StoreResult<Vec<Node>> {
        let tables = self.tables.read();
        tables.check_failure()?;
        let mut children: Vec<Node> = tables
            .rows(query.effective_scope())
            .into_iter()
            .filter(|n| n.parent_id == Some(parent_id) && n.id != parent_id)
            .filter(|n| query.show_all || n.show_in_menus)
            .collect();
        sort_siblings(&mut children);
        Ok(children)
    }

    async fn get_including_deleted(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        let tables = self.tables.read();
        tables.check_failure()?;

        let mut latest: HashMap<NodeId, &Node> = HashMap::new();
        for version in &tables.archive {
            latest.insert(version.id, version);
        }

        let mut nodes: Vec<Node> = latest
            .into_values()
            .filter(|n| filter.matches(n))
            .map(|n| {
                let mut node = n.clone();
                node.deleted_from_stage = !tables.draft.contains_key(&node.id);
                node
            })
            .collect();
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn filter_nodes(
        &self,
        scope: VersionScope,
        predicate: &dyn NodePredicate,
    ) -> StoreResult<Vec<Node>> {
        let tables = self.tables.read();
        tables.check_failure()?;
        let mut nodes: Vec<Node> = tables
            .rows(scope)
            .into_iter()
            .filter(|n| predicate.matches(n))
            .collect();
        sort_siblings(&mut nodes);
        Ok(nodes)
    }

    async fn query_nodes(&self, scope: VersionScope, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        self.filter_nodes(scope, filter).await
    }

    async fn save_node(&self, mut node: Node) -> StoreResult<Node> {
        let mut tables = self.tables.write();
        tables.check_failure()?;

        node.version = tables.next_version(node.id);
        if let Some(existing) = tables.draft.get(&node.id) {
            node.created_at = existing.created_at;
        }
        node.modified_at = Utc::now();
        node.deleted_from_stage = false;

        tables.archive.push(node.clone());
        tables.draft.insert(node.id, node.clone());
        Ok(node)
    }

    async fn delete_node(&self, id: NodeId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        tables.check_failure()?;
        Ok(tables.draft.remove(&id).is_some())
    }

    async fn publish_node(&self, id: NodeId, from: Stage, to: Stage) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.check_failure()?;
        if from == to {
            return Ok(());
        }

        let mut row = tables
            .table(from)
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::missing_version(id, from))?;
        row.deleted_from_stage = false;

        if to == Stage::Draft {
            // Reverting is a new draft version
            row.version = tables.next_version(id);
            row.modified_at = Utc::now();
        }
        tables.archive.push(row.clone());
        match to {
            Stage::Live => tables.live.insert(id, row),
            Stage::Draft => tables.draft.insert(id, row),
        };
        Ok(())
    }

    async fn unpublish_node(&self, id: NodeId) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        tables.check_failure()?;
        Ok(tables.live.remove(&id).is_some())
    }
}
