//! Children / Descendant Resolver
//!
//! `ChildrenResolver` answers every "who hangs under whom" question the
//! hierarchy needs: direct children in each version context, child counts,
//! descendant id sets, historical children and ancestor chains.
//!
//! # Caching
//!
//! Child lists are cached per `(parent id, ChildrenQuery)` and counts per
//! parent id for the lifetime of the resolver (one request scope). There is
//! no time-based expiry: `flush` is the only invalidation, and the
//! `HierarchyService` calls it after each write it performs.
//!
//! # Cycle tolerance
//!
//! Writes go through the cycle guard, but rows written by other processes
//! may still form loops. Every traversal here keeps a visited set and is
//! bounded by `max_depth`, so a loop ends the walk instead of hanging it.

use crate::db::{ChildrenQuery, NodeStore};
use crate::models::{Node, NodeFilter, NodeId, Stage, VersionScope};
use crate::services::error::HierarchyError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Children accessor used by partial-tree marking and rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ChildrenSource {
    /// Draft children, including ones hidden from menus
    AllChildren,
    /// Draft children shown in menus
    Children,
    /// Draft children plus live children deleted from stage
    #[default]
    AllChildrenIncludingDeleted,
    /// Published children, including ones hidden from menus
    LiveChildren,
    /// Every record whose draft, live or latest archived version points here
    HistoricalChildren,
}

impl ChildrenSource {
    /// Version context in which records reachable through this accessor live
    pub fn scope(&self) -> VersionScope {
        match self {
            ChildrenSource::AllChildren | ChildrenSource::Children => VersionScope::Draft,
            ChildrenSource::LiveChildren => VersionScope::Live,
            ChildrenSource::AllChildrenIncludingDeleted | ChildrenSource::HistoricalChildren => {
                VersionScope::Both
            }
        }
    }
}

/// Count accessor used to decide whether a marked node has children to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CountSource {
    #[default]
    NumChildren,
    NumHistoricalChildren,
}

type ChildrenKey = (NodeId, ChildrenQuery);

pub struct ChildrenResolver {
    store: Arc<dyn NodeStore>,
    max_depth: usize,
    children_cache: RwLock<HashMap<ChildrenKey, Vec<Node>>>,
    count_cache: RwLock<HashMap<NodeId, usize>>,
}

impl ChildrenResolver {
    pub fn new(store: Arc<dyn NodeStore>, max_depth: usize) -> Self {
        Self {
            store,
            max_depth,
            children_cache: RwLock::new(HashMap::new()),
            count_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Drop every cached child list and count
    pub fn flush(&self) {
        self.children_cache.write().clear();
        self.count_cache.write().clear();
        tracing::debug!("Flushed hierarchy caches");
    }

    /// Direct children of `node` for one query
    ///
    /// `use_cache = false` always hits the store and refreshes the cached
    /// entry with the result.
    pub async fn direct_children(
        &self,
        node: &Node,
        query: ChildrenQuery,
        use_cache: bool,
    ) -> Result<Vec<Node>, HierarchyError> {
        let key = (node.id, query);
        if use_cache {
            if let Some(children) = self.children_cache.read().get(&key) {
                return Ok(children.clone());
            }
        }

        tracing::debug!("Children cache miss for {} ({:?})", node.id, query);
        let children = self.store.get_children(node.id, query).await?;
        self.children_cache.write().insert(key, children.clone());
        Ok(children)
    }

    /// Draft children; `show_all` includes children hidden from menus
    pub async fn stage_children(&self, node: &Node, show_all: bool) -> Result<Vec<Node>, HierarchyError> {
        self.direct_children(node, ChildrenQuery::stage(show_all), true)
            .await
    }

    /// Every draft child
    pub async fn all_children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.stage_children(node, true).await
    }

    /// Draft children shown in menus
    pub async fn children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.stage_children(node, false).await
    }

    /// Draft children plus published children that were deleted from stage
    pub async fn all_children_including_deleted(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.direct_children(node, ChildrenQuery::including_deleted(), true)
            .await
    }

    /// Published children of `node`
    ///
    /// With `only_deleted_from_stage`, a live child is kept only when it has
    /// no draft row at all. A child whose draft row sits under another parent
    /// was moved, not deleted, and is left out.
    pub async fn live_children(
        &self,
        node: &Node,
        show_all: bool,
        only_deleted_from_stage: bool,
    ) -> Result<Vec<Node>, HierarchyError> {
        let live = self
            .direct_children(node, ChildrenQuery::live(show_all), true)
            .await?;
        if !only_deleted_from_stage {
            return Ok(live);
        }

        let mut deleted = Vec::with_capacity(live.len());
        for child in live {
            match self.store.get_node(child.id, Stage::Draft).await? {
                None => deleted.push(child),
                Some(draft) if draft.parent_id != Some(node.id) => {
                    tracing::debug!(
                        "Live child {} of {} was moved on stage to {:?}",
                        child.id,
                        node.id,
                        draft.parent_id
                    );
                }
                Some(_) => {}
            }
        }
        Ok(deleted)
    }

    /// Number of draft children (hidden ones included)
    ///
    /// `use_cache = false` always recomputes from the store.
    pub async fn num_children(&self, node: &Node, use_cache: bool) -> Result<usize, HierarchyError> {
        if use_cache {
            if let Some(count) = self.count_cache.read().get(&node.id) {
                return Ok(*count);
            }
        }

        let count = self
            .direct_children(node, ChildrenQuery::stage(true), use_cache)
            .await?
            .len();
        self.count_cache.write().insert(node.id, count);
        Ok(count)
    }

    /// Ids of every descendant reachable through draft children
    ///
    /// Depth-first, each id at most once, never the node itself.
    pub async fn descendant_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        let mut ids = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::from([node.id]);
        let mut stack = vec![node.clone()];

        while let Some(current) = stack.pop() {
            if current.id != node.id {
                if !seen.insert(current.id) {
                    continue;
                }
                ids.push(current.id);
            }

            let children = self.all_children(&current).await?;
            // Reverse so the first child is visited first
            for child in children.into_iter().rev() {
                if child.id == node.id {
                    tracing::warn!("Node {} is its own descendant; stopping there", node.id);
                } else if !seen.contains(&child.id) {
                    stack.push(child);
                }
            }
        }
        Ok(ids)
    }

    /// Every record that is, was, or is published as a direct child of `node`
    ///
    /// Union of draft children, live children and the latest archived version
    /// of every record, deduplicated by id in first-seen order.
    pub async fn historical_children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let stage = self.all_children(node).await?;
        let live = self.live_children(node, true, false).await?;
        let archived = self
            .store
            .get_including_deleted(&NodeFilter::new().with_parent_id(Some(node.id)))
            .await?;

        let mut seen = HashSet::new();
        Ok(stage
            .into_iter()
            .chain(live)
            .chain(archived)
            .filter(|child| child.id != node.id && seen.insert(child.id))
            .collect())
    }

    pub async fn num_historical_children(&self, node: &Node) -> Result<usize, HierarchyError> {
        Ok(self.historical_children(node).await?.len())
    }

    /// Children through a configurable accessor
    pub async fn children_for(
        &self,
        node: &Node,
        source: ChildrenSource,
    ) -> Result<Vec<Node>, HierarchyError> {
        match source {
            ChildrenSource::AllChildren => self.all_children(node).await,
            ChildrenSource::Children => self.children(node).await,
            ChildrenSource::AllChildrenIncludingDeleted => {
                self.all_children_including_deleted(node).await
            }
            ChildrenSource::LiveChildren => self.live_children(node, true, false).await,
            ChildrenSource::HistoricalChildren => self.historical_children(node).await,
        }
    }

    /// Child count through a configurable accessor
    pub async fn count_for(&self, node: &Node, source: CountSource) -> Result<usize, HierarchyError> {
        match source {
            CountSource::NumChildren => self.num_children(node, true).await,
            CountSource::NumHistoricalChildren => self.num_historical_children(node).await,
        }
    }

    /// Look a record up in the draft table, falling back to live
    pub async fn find_node(&self, id: NodeId) -> Result<Option<Node>, HierarchyError> {
        if let Some(node) = self.store.get_node(id, Stage::Draft).await? {
            return Ok(Some(node));
        }
        Ok(self.store.get_node(id, Stage::Live).await?)
    }

    /// Parent of `node` as seen from `stage`
    ///
    /// A dangling parent id yields `None`.
    pub async fn parent(&self, node: &Node, stage: Stage) -> Result<Option<Node>, HierarchyError> {
        match node.parent_id {
            Some(parent_id) if parent_id != node.id => {
                Ok(self.store.get_node(parent_id, stage).await?)
            }
            _ => Ok(None),
        }
    }

    /// Look a record up in the tables of one version context
    ///
    /// `Both` reads the draft table and falls back to live.
    pub async fn find_node_in(
        &self,
        id: NodeId,
        scope: VersionScope,
    ) -> Result<Option<Node>, HierarchyError> {
        match scope {
            VersionScope::Draft => Ok(self.store.get_node(id, Stage::Draft).await?),
            VersionScope::Live => Ok(self.store.get_node(id, Stage::Live).await?),
            VersionScope::Both => self.find_node(id).await,
        }
    }

    /// Ancestors of `node`, nearest first
    ///
    /// Parents are read from the draft table, falling back to live for
    /// parents deleted from stage. The walk stops at a root, a missing
    /// record, a repeated id or after `max_depth` hops.
    pub async fn ancestors(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.ancestors_in(node, VersionScope::Both).await
    }

    /// Ancestors of `node` as seen from one version context, nearest first
    ///
    /// Each parent row is read from the same context as the child, so a
    /// record moved on stage only keeps its published chain under `Live`.
    pub async fn ancestors_in(
        &self,
        node: &Node,
        scope: VersionScope,
    ) -> Result<Vec<Node>, HierarchyError> {
        let mut ancestors = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::from([node.id]);
        let mut next = node.parent_id;

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                tracing::warn!("Parent loop detected above node {} at {}", node.id, parent_id);
                break;
            }
            if ancestors.len() >= self.max_depth {
                tracing::warn!(
                    "Ancestor walk from {} exceeded {} levels",
                    node.id,
                    self.max_depth
                );
                break;
            }
            match self.find_node_in(parent_id, scope).await? {
                Some(parent) => {
                    next = parent.parent_id;
                    ancestors.push(parent);
                }
                None => break,
            }
        }
        Ok(ancestors)
    }

    /// `node` followed by its ancestors, nearest first
    pub async fn parent_stack(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let mut stack = vec![node.clone()];
        stack.extend(self.ancestors(node).await?);
        Ok(stack)
    }
}
