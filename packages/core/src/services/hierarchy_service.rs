//! Hierarchy Service
//!
//! Facade tying the hierarchy components to one record store:
//!
//! - Writes (save, move, delete, publish) guarded against parent loops
//! - Child, descendant, historical and ancestor queries with request-scoped caching
//! - Partial-tree marking and rendering
//! - Breadcrumbs
//!
//! One `HierarchyService` is one request scope. Writes made through it flush
//! its caches; writes made elsewhere are only seen after `flush_cache`.
//! Every successful write is broadcast as a `HierarchyEvent`.

use crate::config::HierarchyConfig;
use crate::db::events::{HierarchyEvent, ParentChange};
use crate::db::NodeStore;
use crate::models::{Node, NodeId, NodePredicate, NodeUpdate, Stage};
use crate::services::breadcrumbs::BreadcrumbBuilder;
use crate::services::cycle_guard::CycleGuard;
use crate::services::error::HierarchyError;
use crate::services::marking::{MarkingEngine, MarkingOptions};
use crate::services::partial_tree::{PartialTreeBuilder, RenderOptions, TreeEntry, TreeFormatter};
use crate::services::resolver::ChildrenResolver;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lag instead of blocking writes
const EVENT_CHANNEL_CAPACITY: usize = 128;

pub struct HierarchyService {
    store: Arc<dyn NodeStore>,
    config: HierarchyConfig,
    guard: CycleGuard,
    resolver: Arc<ChildrenResolver>,
    marking: Arc<MarkingEngine>,
    tree: PartialTreeBuilder,
    breadcrumbs: BreadcrumbBuilder,
    event_tx: broadcast::Sender<HierarchyEvent>,
}

impl HierarchyService {
    /// Create a service with default configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use nodespace_hierarchy::db::MemoryStore;
    /// # use nodespace_hierarchy::services::HierarchyService;
    /// # use std::sync::Arc;
    /// let service = HierarchyService::new(Arc::new(MemoryStore::new()));
    /// assert_eq!(service.config().node_count_threshold, 30);
    /// ```
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_config(store, HierarchyConfig::default())
    }

    pub fn with_config(store: Arc<dyn NodeStore>, config: HierarchyConfig) -> Self {
        let resolver = Arc::new(ChildrenResolver::new(store.clone(), config.max_depth));
        let marking = Arc::new(MarkingEngine::new(resolver.clone()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            guard: CycleGuard::new(store.clone(), config.max_depth),
            tree: PartialTreeBuilder::new(marking.clone()),
            breadcrumbs: BreadcrumbBuilder::new(resolver.clone(), config.breadcrumb_separator.clone()),
            store,
            config,
            resolver,
            marking,
            event_tx,
        }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ChildrenResolver> {
        &self.resolver
    }

    pub fn marking(&self) -> &Arc<MarkingEngine> {
        &self.marking
    }

    /// Subscribe to hierarchy events
    pub fn subscribe(&self) -> broadcast::Receiver<HierarchyEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscribers is normal
    fn emit_event(&self, event: HierarchyEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Drop cached child lists and counts
    pub fn flush_cache(&self) {
        self.resolver.flush();
    }

    /// Default marking options from config
    pub fn marking_options(&self) -> MarkingOptions {
        MarkingOptions {
            children: self.config.default_children,
            count: self.config.default_count,
        }
    }

    //
    // WRITES
    //

    /// Write `node` to stage
    ///
    /// New nodes and nodes whose parent changes go through the cycle guard
    /// first; a rejected parent aborts the write and nothing is persisted.
    ///
    /// # Returns
    /// The node as stored (with its bumped version)
    pub async fn save_node(&self, node: Node) -> Result<Node, HierarchyError> {
        node.validate()?;

        let existing = self.store.get_node(node.id, Stage::Draft).await?;
        let old_parent = existing.as_ref().and_then(|e| e.parent_id);
        let parent_changed = existing.is_none() || old_parent != node.parent_id;
        if parent_changed {
            self.guard.validate(&node, node.parent_id).await?;
        }

        let saved = self.store.save_node(node).await?;
        self.flush_cache();

        match existing {
            None => {
                tracing::debug!("Created {} {}", saved.record_type, saved.id);
                self.emit_event(HierarchyEvent::NodeCreated {
                    node: saved.clone(),
                });
            }
            Some(_) => {
                self.emit_event(HierarchyEvent::NodeUpdated {
                    node: saved.clone(),
                });
                if parent_changed {
                    tracing::debug!(
                        "Moved {} from {:?} to {:?}",
                        saved.id,
                        old_parent,
                        saved.parent_id
                    );
                    self.emit_event(HierarchyEvent::NodeMoved(ParentChange {
                        node_id: saved.id,
                        old_parent_id: old_parent,
                        new_parent_id: saved.parent_id,
                    }));
                }
            }
        }
        Ok(saved)
    }

    /// Apply a partial update to the stage row of `id`
    pub async fn update_node(&self, id: NodeId, update: NodeUpdate) -> Result<Node, HierarchyError> {
        let mut node = self
            .store
            .get_node(id, Stage::Draft)
            .await?
            .ok_or_else(|| HierarchyError::node_not_found(id))?;
        if update.is_empty() {
            return Ok(node);
        }
        node.apply_update(update);
        self.save_node(node).await
    }

    /// Re-parent `id` under `new_parent` (`None` makes it a root)
    pub async fn move_node(&self, id: NodeId, new_parent: Option<NodeId>) -> Result<Node, HierarchyError> {
        self.update_node(id, NodeUpdate::new().with_parent(new_parent))
            .await
    }

    /// Soft-delete the stage row of `id`; the live row and history remain
    pub async fn delete_node(&self, id: NodeId) -> Result<bool, HierarchyError> {
        let deleted = self.store.delete_node(id).await?;
        if deleted {
            self.flush_cache();
            self.emit_event(HierarchyEvent::NodeDeleted { id });
        }
        Ok(deleted)
    }

    /// Copy the stage row of `id` to live
    pub async fn publish_node(&self, id: NodeId) -> Result<(), HierarchyError> {
        self.copy_version(id, Stage::Draft, Stage::Live).await
    }

    /// Restore the stage row of `id` from live, undoing a stage deletion or move
    pub async fn revert_to_live(&self, id: NodeId) -> Result<(), HierarchyError> {
        let Some(live) = self.store.get_node(id, Stage::Live).await? else {
            return Err(HierarchyError::node_not_found(id));
        };
        let staged = self.store.get_node(id, Stage::Draft).await?;
        let parent_changes = staged.map(|s| s.parent_id) != Some(live.parent_id);
        if parent_changes {
            self.guard.validate(&live, live.parent_id).await?;
        }
        self.copy_version(id, Stage::Live, Stage::Draft).await
    }

    async fn copy_version(&self, id: NodeId, from: Stage, to: Stage) -> Result<(), HierarchyError> {
        if self.store.get_node(id, from).await?.is_none() {
            return Err(HierarchyError::node_not_found(id));
        }
        self.store.publish_node(id, from, to).await?;
        self.flush_cache();
        self.emit_event(HierarchyEvent::NodePublished { id, from, to });
        Ok(())
    }

    /// Remove the live row of `id`
    pub async fn unpublish_node(&self, id: NodeId) -> Result<bool, HierarchyError> {
        let removed = self.store.unpublish_node(id).await?;
        if removed {
            self.flush_cache();
            self.emit_event(HierarchyEvent::NodeUnpublished { id });
        }
        Ok(removed)
    }

    //
    // READS
    //

    /// Stage row, falling back to live for records deleted from stage
    pub async fn get_node(&self, id: NodeId) -> Result<Option<Node>, HierarchyError> {
        self.resolver.find_node(id).await
    }

    pub async fn get_children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.resolver.all_children(node).await
    }

    pub async fn num_children(&self, node: &Node, use_cache: bool) -> Result<usize, HierarchyError> {
        self.resolver.num_children(node, use_cache).await
    }

    pub async fn descendant_ids(&self, node: &Node) -> Result<Vec<NodeId>, HierarchyError> {
        self.resolver.descendant_ids(node).await
    }

    /// Whether `candidate` sits anywhere below `ancestor` on stage
    pub async fn is_descendant(&self, ancestor: &Node, candidate: NodeId) -> Result<bool, HierarchyError> {
        Ok(self.resolver.descendant_ids(ancestor).await?.contains(&candidate))
    }

    pub async fn live_children(
        &self,
        node: &Node,
        show_all: bool,
        only_deleted_from_stage: bool,
    ) -> Result<Vec<Node>, HierarchyError> {
        self.resolver
            .live_children(node, show_all, only_deleted_from_stage)
            .await
    }

    pub async fn historical_children(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.resolver.historical_children(node).await
    }

    pub async fn num_historical_children(&self, node: &Node) -> Result<usize, HierarchyError> {
        self.resolver.num_historical_children(node).await
    }

    pub async fn ancestors(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.resolver.ancestors(node).await
    }

    pub async fn breadcrumbs(&self, node: &Node) -> Result<Vec<String>, HierarchyError> {
        self.breadcrumbs.breadcrumbs(node).await
    }

    pub async fn breadcrumb_trail(&self, node: &Node) -> Result<String, HierarchyError> {
        self.breadcrumbs.breadcrumb_trail(node, None).await
    }

    //
    // PARTIAL TREES
    //

    pub fn set_marking_filter(&self, predicate: Arc<dyn NodePredicate>) {
        self.marking.set_marking_filter(predicate);
    }

    pub fn clear_marking_filter(&self) {
        self.marking.clear_marking_filter();
    }

    /// Force `node` into every partial tree built later by this service
    pub async fn mark_to_expose(&self, node: &Node) -> Result<(), HierarchyError> {
        self.marking
            .mark_to_expose(node, self.marking_options())
            .await
    }

    /// Mark a partial tree with an explicit threshold (`0` = unbounded)
    pub async fn mark_partial_tree(&self, root: &Node, threshold: usize) -> Result<usize, HierarchyError> {
        self.tree
            .mark_partial_tree(root, threshold, self.marking_options())
            .await
    }

    /// Mark a partial tree with the configured threshold
    pub async fn mark_partial_tree_default(&self, root: &Node) -> Result<usize, HierarchyError> {
        self.mark_partial_tree(root, self.config.node_count_threshold)
            .await
    }

    pub async fn children_to_render(
        &self,
        parent: &Node,
        limit_to_marked: bool,
    ) -> Result<Vec<Node>, HierarchyError> {
        self.tree
            .children_to_render(parent, limit_to_marked, self.config.default_children)
            .await
    }

    pub async fn marked_tree(&self, root: &Node) -> Result<TreeEntry, HierarchyError> {
        self.tree
            .marked_tree(root, RenderOptions::from(self.marking_options()))
            .await
    }

    pub async fn render_tree(
        &self,
        root: &Node,
        formatter: &dyn TreeFormatter,
        options: RenderOptions,
    ) -> Result<String, HierarchyError> {
        self.tree.render_tree(root, formatter, options).await
    }
}
