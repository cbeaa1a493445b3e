//! NodeStore Trait - Record Store Abstraction
//!
//! This module defines the `NodeStore` trait, the contract the hierarchy
//! services consume. The store owns persisted records; the services only keep
//! request-scoped caches and marking state on top of it.
//!
//! # Versioning Model
//!
//! - **Draft table**: the working copy. Saves always land here.
//! - **Live table**: the published copy, written by `publish_node`.
//! - **Archive**: every version ever written, including deleted ones. Backs
//!   `get_including_deleted`.
//!
//! A record whose draft row was deleted but whose live row remains is
//! "deleted from stage"; reads that surface such a row set
//! `Node::deleted_from_stage`.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends fit behind the same trait
//! 2. **Explicit version context**: every read names the `Stage` or
//!    `VersionScope` it reads; there is no ambient reading mode
//! 3. **Absent is not an error**: lookups return `Option`/empty collections
//!    for missing records; `DatabaseError` is reserved for real failures
//!
//! # Examples
//!
//! ```rust
//! use nodespace_hierarchy::db::{ChildrenQuery, MemoryStore, NodeStore};
//! use nodespace_hierarchy::models::{Node, NodeId, Stage};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     store.save_node(Node::new(NodeId(1), "Page", "Home", None)).await?;
//!     store.save_node(Node::new(NodeId(2), "Page", "About", Some(NodeId(1)))).await?;
//!
//!     let children = store.get_children(NodeId(1), ChildrenQuery::stage(true)).await?;
//!     assert_eq!(children.len(), 1);
//!     assert!(store.get_node(NodeId(2), Stage::Live).await?.is_none());
//!     Ok(())
//! }
//! ```

use super::error::DatabaseError;
use crate::models::{Node, NodeFilter, NodeId, NodePredicate, Stage, VersionScope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, DatabaseError>;

/// Parameters of a direct-children lookup
///
/// Doubles as the cache key for resolved child lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenQuery {
    /// Which version table(s) to read
    pub scope: VersionScope,

    /// With `VersionScope::Draft`, also return live rows deleted from stage
    pub include_deleted: bool,

    /// Ignore `show_in_menus`
    pub show_all: bool,
}

impl ChildrenQuery {
    /// Draft children
    pub fn stage(show_all: bool) -> Self {
        Self {
            scope: VersionScope::Draft,
            include_deleted: false,
            show_all,
        }
    }

    /// Published children
    pub fn live(show_all: bool) -> Self {
        Self {
            scope: VersionScope::Live,
            include_deleted: false,
            show_all,
        }
    }

    /// Draft children plus live children deleted from stage
    pub fn including_deleted() -> Self {
        Self {
            scope: VersionScope::Draft,
            include_deleted: true,
            show_all: true,
        }
    }

    /// Effective scope once `include_deleted` is applied
    pub fn effective_scope(&self) -> VersionScope {
        match (self.scope, self.include_deleted) {
            (VersionScope::Draft, true) => VersionScope::Both,
            (scope, _) => scope,
        }
    }
}

impl Default for ChildrenQuery {
    fn default() -> Self {
        Self::stage(true)
    }
}

/// Abstraction layer for versioned record persistence
///
/// # Ordering
///
/// Child and filter queries return nodes ordered by `(sort, id)`.
/// `get_including_deleted` returns ascending id order.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so services holding an
/// `Arc<dyn NodeStore>` can be shared across tasks.
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // READS
    //

    /// Fetch one version of a record
    ///
    /// Returns `Ok(None)` when the record has no row in that table.
    async fn get_node(&self, id: NodeId, stage: Stage) -> StoreResult<Option<Node>>;

    /// Fetch the direct children of `parent_id`
    ///
    /// Never returns the parent itself, even if its own row points at itself.
    async fn get_children(&self, parent_id: NodeId, query: ChildrenQuery)
        -> StoreResult<Vec<Node>>;

    /// Latest archived version of every record ever written, matching `filter`
    ///
    /// Includes records deleted from both tables. `deleted_from_stage` is set
    /// when the record has no draft row.
    async fn get_including_deleted(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>>;

    /// Evaluate an arbitrary predicate against every record in `scope`
    async fn filter_nodes(
        &self,
        scope: VersionScope,
        predicate: &dyn NodePredicate,
    ) -> StoreResult<Vec<Node>>;

    /// Declarative filter query against `scope`
    async fn query_nodes(&self, scope: VersionScope, filter: &NodeFilter) -> StoreResult<Vec<Node>>;

    //
    // WRITES
    //

    /// Insert or replace the draft row of a record
    ///
    /// Bumps `version`, appends to the archive and returns the stored node.
    async fn save_node(&self, node: Node) -> StoreResult<Node>;

    /// Soft-delete the draft row; the live row and archive are untouched
    ///
    /// Returns whether a draft row existed.
    async fn delete_node(&self, id: NodeId) -> StoreResult<bool>;

    /// Copy a record from one table to the other
    ///
    /// The copy is archived. Copying into the draft table writes a new
    /// version, the same as `save_node` would.
    async fn publish_node(&self, id: NodeId, from: Stage, to: Stage) -> StoreResult<()>;

    /// Remove the live row; returns whether one existed
    async fn unpublish_node(&self, id: NodeId) -> StoreResult<bool>;
}
