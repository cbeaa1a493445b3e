//! Marking Engine
//!
//! Transient per-node state for building a partial tree:
//!
//! - **marked**: the node takes part in the partial tree
//! - **expanded**: its children have been loaded (and marked)
//! - **opened**: the tree widget should show it open
//! - **exposed**: it was explicitly asked for and must stay reachable
//! - **tree_complete**: everything below it is marked, no lazy loading needed
//!
//! State is kept in a registry keyed by `NodeId`, never on the `Node`
//! value, so marks set through one handle are visible through any other
//! handle to the same record.
//!
//! # Lifecycle
//!
//! `reset` (called at the start of every partial-tree run) clears all flags
//! except `exposed`; exposure requests outlive the reset and are re-applied
//! when the run finishes. `unmark_all` clears everything.
//!
//! # State machine
//!
//! ```text
//! Unseen --mark--> Marked --mark_children / mark_expanded--> Expanded
//!                    ^                                          |
//!                    +-------------- mark_unexpanded -----------+
//! exposed: independent flag, survives unmarking
//! ```

use crate::models::{Node, NodeId, NodePredicate};
use crate::services::error::HierarchyError;
use crate::services::resolver::{ChildrenResolver, ChildrenSource, CountSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Flags attached to one node id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMarks {
    pub marked: bool,
    pub expanded: bool,
    pub opened: bool,
    pub exposed: bool,
    pub tree_complete: bool,
}

/// Accessors the engine uses to load and count children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkingOptions {
    pub children: ChildrenSource,
    pub count: CountSource,
}

#[derive(Default)]
struct MarkState {
    marks: HashMap<NodeId, NodeMarks>,
    /// Marked ids in the order they were first marked
    order: Vec<NodeId>,
    /// Latest value seen for every marked or exposed id
    nodes: HashMap<NodeId, Node>,
    /// Exposure requests, oldest first
    exposed: Vec<NodeId>,
    /// Matches of the installed filter plus their ancestors, once computed
    filter_scope: Option<HashSet<NodeId>>,
}

impl MarkState {
    fn entry(&mut self, node: &Node) -> &mut NodeMarks {
        self.nodes.insert(node.id, node.clone());
        self.marks.entry(node.id).or_default()
    }

    fn mark(&mut self, node: &Node) -> &mut NodeMarks {
        let newly_marked = !self.marks.get(&node.id).map(|m| m.marked).unwrap_or(false);
        if newly_marked {
            self.order.push(node.id);
        }
        let marks = self.entry(node);
        marks.marked = true;
        marks
    }
}

pub struct MarkingEngine {
    resolver: Arc<ChildrenResolver>,
    state: RwLock<MarkState>,
    filter: RwLock<Option<Arc<dyn NodePredicate>>>,
}

impl MarkingEngine {
    pub fn new(resolver: Arc<ChildrenResolver>) -> Self {
        Self {
            resolver,
            state: RwLock::new(MarkState::default()),
            filter: RwLock::new(None),
        }
    }

    pub fn resolver(&self) -> &Arc<ChildrenResolver> {
        &self.resolver
    }

    //
    // FILTER
    //

    /// Install a predicate; partial trees then mark only its matches and
    /// their ancestors
    pub fn set_marking_filter(&self, predicate: Arc<dyn NodePredicate>) {
        tracing::debug!("Installed marking filter: {}", predicate.describe());
        *self.filter.write() = Some(predicate);
        self.state.write().filter_scope = None;
    }

    /// Install a filter matching `properties[name] == value`, or any of the
    /// values when `value` is an array
    pub fn set_marking_filter_property(&self, name: impl Into<String>, value: serde_json::Value) {
        use crate::models::{FilterOperator, PropertyFilter};
        let name = name.into();
        let filter = if value.is_array() {
            PropertyFilter {
                name,
                operator: FilterOperator::In,
                value,
            }
        } else {
            PropertyFilter::equals(name, value)
        };
        self.set_marking_filter(Arc::new(filter));
    }

    pub fn clear_marking_filter(&self) {
        *self.filter.write() = None;
        self.state.write().filter_scope = None;
    }

    pub fn marking_filter(&self) -> Option<Arc<dyn NodePredicate>> {
        self.filter.read().clone()
    }

    /// Whether `node` matches the installed filter (true when none is installed)
    pub fn marking_filter_matches(&self, node: &Node) -> bool {
        self.filter
            .read()
            .as_ref()
            .map(|f| f.matches(node))
            .unwrap_or(true)
    }

    pub(crate) fn set_filter_scope(&self, scope: Option<HashSet<NodeId>>) {
        self.state.write().filter_scope = scope;
    }

    /// Whether a child may be marked when its parent is expanded
    fn admits(&self, child: &Node) -> bool {
        if self.marking_filter_matches(child) {
            return true;
        }
        self.state
            .read()
            .filter_scope
            .as_ref()
            .map(|scope| scope.contains(&child.id))
            .unwrap_or(false)
    }

    //
    // SYNCHRONOUS STATE TRANSITIONS
    //

    /// Mark `node` without touching its expanded flag
    pub fn mark(&self, node: &Node) {
        self.state.write().mark(node);
    }

    /// Marked + expanded
    pub fn mark_expanded(&self, node: &Node) {
        self.state.write().mark(node).expanded = true;
    }

    /// Clear the expanded flag only
    pub fn mark_unexpanded(&self, node: &Node) {
        if let Some(marks) = self.state.write().marks.get_mut(&node.id) {
            marks.expanded = false;
            marks.tree_complete = false;
        }
    }

    /// Show the node open in the tree widget
    pub fn mark_opened(&self, node: &Node) {
        self.state.write().mark(node).opened = true;
    }

    pub fn mark_closed(&self, node: &Node) {
        if let Some(marks) = self.state.write().marks.get_mut(&node.id) {
            marks.opened = false;
        }
    }

    /// Record an exposure request without marking anything yet
    pub fn mark_exposed(&self, node: &Node) {
        let mut state = self.state.write();
        state.entry(node).exposed = true;
        if !state.exposed.contains(&node.id) {
            state.exposed.push(node.id);
        }
    }

    /// Clear marked, expanded, opened and tree-complete for one node;
    /// `exposed` stays
    pub fn unmark(&self, node: &Node) {
        let mut state = self.state.write();
        if let Some(marks) = state.marks.get_mut(&node.id) {
            *marks = NodeMarks {
                exposed: marks.exposed,
                ..NodeMarks::default()
            };
        }
        state.order.retain(|id| *id != node.id);
    }

    /// Start a new partial-tree run: clear every flag except exposure
    pub fn reset(&self) {
        let mut state = self.state.write();
        let exposed: HashSet<NodeId> = state.exposed.iter().copied().collect();
        state.marks.retain(|id, _| exposed.contains(id));
        for marks in state.marks.values_mut() {
            *marks = NodeMarks {
                exposed: true,
                ..NodeMarks::default()
            };
        }
        state.order.clear();
        state.nodes.retain(|id, _| exposed.contains(id));
        state.filter_scope = None;
    }

    /// Forget every mark, exposure included
    pub fn unmark_all(&self) {
        *self.state.write() = MarkState::default();
    }

    pub(crate) fn set_tree_complete(&self, id: NodeId, complete: bool) {
        if let Some(marks) = self.state.write().marks.get_mut(&id) {
            marks.tree_complete = complete;
        }
    }

    //
    // QUERIES
    //

    pub fn marks(&self, id: NodeId) -> NodeMarks {
        self.state.read().marks.get(&id).copied().unwrap_or_default()
    }

    pub fn is_marked(&self, node: &Node) -> bool {
        self.marks(node.id).marked
    }

    pub fn is_expanded(&self, node: &Node) -> bool {
        self.marks(node.id).expanded
    }

    pub fn is_tree_opened(&self, node: &Node) -> bool {
        self.marks(node.id).opened
    }

    pub fn is_exposed(&self, node: &Node) -> bool {
        self.marks(node.id).exposed
    }

    pub fn is_tree_complete(&self, node: &Node) -> bool {
        self.marks(node.id).tree_complete
    }

    /// Marked ids in marking order
    pub fn marked_ids(&self) -> Vec<NodeId> {
        self.state.read().order.clone()
    }

    pub fn marked_count(&self) -> usize {
        self.state.read().order.len()
    }

    /// Marked id at `index` in marking order, with its last seen value
    pub(crate) fn marked_at(&self, index: usize) -> Option<Node> {
        let state = self.state.read();
        state
            .order
            .get(index)
            .and_then(|id| state.nodes.get(id))
            .cloned()
    }

    /// Pending exposure requests, oldest first
    pub fn exposed_ids(&self) -> Vec<NodeId> {
        self.state.read().exposed.clone()
    }

    /// Class list the tree widget uses for a node
    ///
    /// `unexpanded jstree-closed` for marked nodes whose children are not
    /// loaded, then `jstree-open` or `closed` depending on the opened flag.
    pub fn marking_classes(&self, node: &Node) -> String {
        let marks = self.marks(node.id);
        let mut classes = Vec::new();
        if !marks.expanded {
            classes.push("unexpanded jstree-closed");
        }
        if marks.opened {
            classes.push("jstree-open");
        } else {
            classes.push("closed");
        }
        classes.join(" ")
    }

    //
    // STORE-BACKED TRANSITIONS
    //

    /// Load `node`'s children, mark the ones the filter admits and mark
    /// `node` expanded
    ///
    /// Children without children of their own are marked expanded, the rest
    /// marked unexpanded unless already expanded. Returns the loaded children.
    pub async fn mark_children(
        &self,
        node: &Node,
        options: MarkingOptions,
    ) -> Result<Vec<Node>, HierarchyError> {
        let children = self.resolver.children_for(node, options.children).await?;
        self.mark_expanded(node);

        for child in &children {
            if !self.admits(child) {
                continue;
            }
            let has_children = self.resolver.count_for(child, options.count).await? > 0;
            let mut state = self.state.write();
            let marks = state.mark(child);
            if !has_children {
                marks.expanded = true;
            }
        }
        Ok(children)
    }

    /// Expand an already marked node; false when it is not marked
    pub async fn mark_by_id(
        &self,
        id: NodeId,
        open: bool,
        options: MarkingOptions,
    ) -> Result<bool, HierarchyError> {
        let node = self.state.read().nodes.get(&id).cloned();
        let Some(node) = node.filter(|n| self.is_marked(n)) else {
            return Ok(false);
        };
        self.mark_children(&node, options).await?;
        if open {
            self.mark_opened(&node);
        }
        Ok(true)
    }

    /// Mark and expand every node of `chain` (nearest first, so walked in
    /// reverse), then `node`
    ///
    /// With `expand_self`, `node`'s own children are loaded too; otherwise
    /// it is only marked (expanded when it has no children).
    async fn open_chain(
        &self,
        node: &Node,
        chain: &[Node],
        expand_self: bool,
        options: MarkingOptions,
    ) -> Result<(), HierarchyError> {
        for ancestor in chain.iter().rev() {
            self.mark(ancestor);
            self.mark_children(ancestor, options).await?;
            self.mark_opened(ancestor);
        }

        if expand_self {
            self.mark(node);
            self.mark_children(node, options).await?;
            self.mark_opened(node);
        } else {
            let has_children = self.resolver.count_for(node, options.count).await? > 0;
            let mut state = self.state.write();
            let marks = state.mark(node);
            if !has_children {
                marks.expanded = true;
            }
        }
        Ok(())
    }

    /// Mark `node` and every ancestor up to the root as marked and expanded
    ///
    /// Ancestors are read from the version context of `options.children`.
    pub async fn mark_open(&self, node: &Node, options: MarkingOptions) -> Result<(), HierarchyError> {
        let chain = self
            .resolver
            .ancestors_in(node, options.children.scope())
            .await?;
        self.open_chain(node, &chain, true, options).await
    }

    /// Force `node` into the partial tree
    ///
    /// Sets `exposed` and marks the ancestor chain expanded so the node stays
    /// reachable from the root. The request survives `reset`, so it holds for
    /// partial trees built later in the same scope.
    pub async fn mark_to_expose(
        &self,
        node: &Node,
        options: MarkingOptions,
    ) -> Result<(), HierarchyError> {
        self.mark_exposed(node);
        let chain = self
            .resolver
            .ancestors_in(node, options.children.scope())
            .await?;
        self.open_chain(node, &chain, false, options).await
    }

    /// Re-apply pending exposure requests inside the tree below `root`
    ///
    /// Requests for nodes outside that tree are kept but not applied, and
    /// chains stop at `root` so nothing above it gets marked.
    pub(crate) async fn apply_exposures(
        &self,
        root: &Node,
        options: MarkingOptions,
    ) -> Result<(), HierarchyError> {
        let scope = options.children.scope();
        for id in self.exposed_ids() {
            if id == root.id {
                continue;
            }
            let Some(node) = self.resolver.find_node_in(id, scope).await? else {
                tracing::debug!("Exposed node {} not found in {:?}", id, scope);
                continue;
            };
            let ancestors = self.resolver.ancestors_in(&node, scope).await?;
            if !ancestors.iter().any(|a| a.id == root.id) {
                tracing::debug!("Exposed node {} is outside the tree below {}", id, root.id);
                continue;
            }
            let mut chain: Vec<Node> = ancestors
                .into_iter()
                .take_while(|a| a.id != root.id)
                .collect();
            chain.push(root.clone());
            self.open_chain(&node, &chain, false, options).await?;
        }
        Ok(())
    }
}
