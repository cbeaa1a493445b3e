//! Partial Tree Materializer
//!
//! Marks a bounded, breadth-first slice of a hierarchy for display and turns
//! the marked slice into nested `TreeEntry` values for a rendering layer.
//!
//! The node-count threshold is a soft cap for lazy loading: once the number
//! of marked nodes reaches it, expansion stops and the remaining nodes are
//! rendered with a "load more" placeholder. Filter matches and exposed nodes
//! are marked regardless of the threshold.

use crate::models::{Node, NodeId};
use crate::services::error::HierarchyError;
use crate::services::marking::{MarkingEngine, MarkingOptions, NodeMarks};
use crate::services::resolver::{ChildrenSource, CountSource};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// How `marked_tree` and `render_tree` walk the marked slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Only list marked children; otherwise every persisted child is listed
    pub limit_to_marked: bool,
    pub children: ChildrenSource,
    pub count: CountSource,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            limit_to_marked: true,
            children: ChildrenSource::default(),
            count: CountSource::default(),
        }
    }
}

impl From<MarkingOptions> for RenderOptions {
    fn from(options: MarkingOptions) -> Self {
        Self {
            limit_to_marked: true,
            children: options.children,
            count: options.count,
        }
    }
}

/// One rendered node and the entries nested under it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub node: Node,
    pub marks: NodeMarks,
    pub num_children: usize,
    /// Children exist but were not loaded; render a lazy-load placeholder
    pub has_more: bool,
    pub classes: String,
    pub children: Vec<TreeEntry>,
}

impl TreeEntry {
    /// Number of entries in this subtree, this one included
    pub fn entry_count(&self) -> usize {
        1 + self.children.iter().map(TreeEntry::entry_count).sum::<usize>()
    }

    /// Depth-first search by id
    pub fn find(&self, id: NodeId) -> Option<&TreeEntry> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids in depth-first pre-order
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.node.id];
        for child in &self.children {
            ids.extend(child.ids());
        }
        ids
    }
}

/// Formats one entry of a nested list
///
/// The tree walk decides what is rendered and in which order; formatters
/// only turn entries into text.
pub trait TreeFormatter {
    /// Format `entry`; `children` holds its already formatted child list,
    /// `None` when nothing is rendered below it
    fn format_entry(&self, entry: &TreeEntry, children: Option<String>) -> String;

    /// Join formatted siblings into a list
    fn format_list(&self, items: Vec<String>) -> String {
        items.join("\n")
    }
}

/// Indented plain-text outline, `+` marking nodes with unloaded children
#[derive(Debug, Clone)]
pub struct OutlineFormatter {
    pub indent: String,
}

impl Default for OutlineFormatter {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
        }
    }
}

impl TreeFormatter for OutlineFormatter {
    fn format_entry(&self, entry: &TreeEntry, children: Option<String>) -> String {
        let mut line = format!("- {}", entry.node.title);
        if entry.has_more {
            line.push_str(" [+]");
        }
        if let Some(children) = children {
            for child_line in children.lines() {
                line.push('\n');
                line.push_str(&self.indent);
                line.push_str(child_line);
            }
        }
        line
    }
}

pub struct PartialTreeBuilder {
    marking: Arc<MarkingEngine>,
}

impl PartialTreeBuilder {
    pub fn new(marking: Arc<MarkingEngine>) -> Self {
        Self { marking }
    }

    pub fn marking(&self) -> &Arc<MarkingEngine> {
        &self.marking
    }

    /// Mark a partial tree below `root`
    ///
    /// Clears previous marks (exposure requests excepted), expands `root`
    /// and keeps expanding breadth-first until the marked count reaches
    /// `threshold` (`0` = unbounded), so the root is always expanded. With a
    /// marking filter installed only matches and their ancestors are marked
    /// and the threshold is ignored. Pending exposures are applied last.
    ///
    /// # Returns
    /// The number of marked nodes
    pub async fn mark_partial_tree(
        &self,
        root: &Node,
        threshold: usize,
        options: MarkingOptions,
    ) -> Result<usize, HierarchyError> {
        let marking = &self.marking;
        marking.reset();
        marking.mark(root);
        marking.mark_opened(root);

        if marking.marking_filter().is_some() {
            self.mark_filter_matches(root, options).await?;
        } else {
            self.mark_breadth_first(threshold, options).await?;
        }

        marking.apply_exposures(root, options).await?;
        self.compute_tree_complete(options).await?;

        let count = marking.marked_count();
        tracing::debug!(
            "Marked {} nodes below {} (threshold {})",
            count,
            root.id,
            threshold
        );
        Ok(count)
    }

    async fn mark_breadth_first(
        &self,
        threshold: usize,
        options: MarkingOptions,
    ) -> Result<(), HierarchyError> {
        let marking = &self.marking;
        let mut index = 0;

        while let Some(node) = marking.marked_at(index) {
            if !marking.is_expanded(&node) {
                marking.mark_children(&node, options).await?;
            }
            index += 1;

            if threshold > 0 && marking.marked_count() >= threshold {
                // Everything still queued keeps its lazy-load placeholder
                while let Some(rest) = marking.marked_at(index) {
                    if !marking.is_expanded(&rest) {
                        marking.mark_closed(&rest);
                    }
                    index += 1;
                }
                break;
            }
        }
        Ok(())
    }

    async fn mark_filter_matches(
        &self,
        root: &Node,
        options: MarkingOptions,
    ) -> Result<(), HierarchyError> {
        let marking = &self.marking;
        let resolver = marking.resolver();
        let Some(filter) = marking.marking_filter() else {
            return Ok(());
        };

        let matches = resolver
            .store()
            .filter_nodes(options.children.scope(), filter.as_ref())
            .await?;

        let mut chains = Vec::new();
        let mut scope: HashSet<NodeId> = HashSet::from([root.id]);
        for candidate in matches {
            if candidate.id == root.id {
                continue;
            }
            let ancestors = resolver
                .ancestors_in(&candidate, options.children.scope())
                .await?;
            if !ancestors.iter().any(|a| a.id == root.id) {
                continue;
            }
            // Only the part of the chain below the root belongs to this tree
            let below_root: Vec<Node> = ancestors
                .into_iter()
                .take_while(|a| a.id != root.id)
                .collect();
            scope.insert(candidate.id);
            scope.extend(below_root.iter().map(|a| a.id));
            chains.push((candidate, below_root));
        }
        tracing::debug!(
            "Marking filter \"{}\" matched {} nodes below {}",
            filter.describe(),
            chains.len(),
            root.id
        );
        marking.set_filter_scope(Some(scope));

        marking.mark_expanded(root);
        for (candidate, ancestors) in chains {
            for ancestor in ancestors.iter().rev() {
                marking.mark_expanded(ancestor);
                marking.mark_opened(ancestor);
            }
            let has_children = resolver.count_for(&candidate, options.count).await? > 0;
            if has_children {
                if !marking.is_expanded(&candidate) {
                    marking.mark(&candidate);
                    marking.mark_unexpanded(&candidate);
                }
            } else {
                marking.mark_expanded(&candidate);
            }
        }
        Ok(())
    }

    /// A node is tree-complete when it is expanded and every child is marked
    /// and tree-complete itself. Walking the marking order backwards visits
    /// children before their parents.
    async fn compute_tree_complete(&self, options: MarkingOptions) -> Result<(), HierarchyError> {
        let marking = &self.marking;
        let mut complete: HashMap<NodeId, bool> = HashMap::new();

        for index in (0..marking.marked_count()).rev() {
            let Some(node) = marking.marked_at(index) else {
                continue;
            };
            let is_complete = if marking.is_expanded(&node) {
                let children = marking.resolver().children_for(&node, options.children).await?;
                children.iter().all(|child| {
                    marking.is_marked(child) && complete.get(&child.id).copied().unwrap_or(false)
                })
            } else {
                false
            };
            complete.insert(node.id, is_complete);
            marking.set_tree_complete(node.id, is_complete);
        }
        Ok(())
    }

    /// Children the renderer lists under `parent`
    ///
    /// With `limit_to_marked` only marked children are returned, otherwise
    /// every child the accessor yields.
    pub async fn children_to_render(
        &self,
        parent: &Node,
        limit_to_marked: bool,
        source: ChildrenSource,
    ) -> Result<Vec<Node>, HierarchyError> {
        let children = self.marking.resolver().children_for(parent, source).await?;
        if !limit_to_marked {
            return Ok(children);
        }
        Ok(children
            .into_iter()
            .filter(|child| self.marking.is_marked(child))
            .collect())
    }

    /// Nested entries for the marked slice below `root`
    ///
    /// Recurses only into children that are marked and expanded; unexpanded
    /// nodes with children get `has_more` set.
    pub async fn marked_tree(
        &self,
        root: &Node,
        options: RenderOptions,
    ) -> Result<TreeEntry, HierarchyError> {
        let mut listed: HashMap<NodeId, Vec<Node>> = HashMap::new();
        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        let mut visited: HashSet<NodeId> = HashSet::from([root.id]);
        let mut queue = VecDeque::from([root.clone()]);

        while let Some(node) = queue.pop_front() {
            counts.insert(
                node.id,
                self.marking.resolver().count_for(&node, options.count).await?,
            );
            if !self.marking.is_expanded(&node) {
                continue;
            }
            let children = self
                .children_to_render(&node, options.limit_to_marked, options.children)
                .await?;
            for child in &children {
                if visited.insert(child.id) {
                    queue.push_back(child.clone());
                } else {
                    tracing::warn!("Node {} listed twice while rendering; skipping", child.id);
                }
            }
            listed.insert(node.id, children);
        }

        Ok(self.assemble(root, &mut listed, &counts))
    }

    fn assemble(
        &self,
        node: &Node,
        listed: &mut HashMap<NodeId, Vec<Node>>,
        counts: &HashMap<NodeId, usize>,
    ) -> TreeEntry {
        let marks = self.marking.marks(node.id);
        let num_children = counts.get(&node.id).copied().unwrap_or(0);
        let children = listed
            .remove(&node.id)
            .unwrap_or_default()
            .iter()
            .filter(|child| counts.contains_key(&child.id))
            .map(|child| self.assemble(child, listed, counts))
            .collect();

        TreeEntry {
            node: node.clone(),
            marks,
            num_children,
            has_more: num_children > 0 && !marks.expanded,
            classes: self.marking.marking_classes(node),
            children,
        }
    }

    /// Format the marked slice below `root` with `formatter`
    pub async fn render_tree(
        &self,
        root: &Node,
        formatter: &dyn TreeFormatter,
        options: RenderOptions,
    ) -> Result<String, HierarchyError> {
        let tree = self.marked_tree(root, options).await?;
        Ok(format_entry(&tree, formatter))
    }

    /// Re-read `root` from the store and render it
    pub async fn render_by_id(
        &self,
        root_id: NodeId,
        formatter: &dyn TreeFormatter,
        options: RenderOptions,
    ) -> Result<Option<String>, HierarchyError> {
        let Some(root) = self.marking.resolver().find_node(root_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.render_tree(&root, formatter, options).await?))
    }
}

fn format_entry(entry: &TreeEntry, formatter: &dyn TreeFormatter) -> String {
    let children = if entry.children.is_empty() {
        None
    } else {
        Some(
            formatter.format_list(
                entry
                    .children
                    .iter()
                    .map(|child| format_entry(child, formatter))
                    .collect(),
            ),
        )
    };
    formatter.format_entry(entry, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NodeStore};
    use crate::services::resolver::ChildrenResolver;

    fn page(id: u64, title: &str, parent: Option<u64>) -> Node {
        Node::new(NodeId(id), "Page", title, parent.map(NodeId)).with_sort(id as i64)
    }

    /// R(1) { A(2) { A1(4), A2(5) }, B(3) }
    async fn builder() -> (PartialTreeBuilder, Node) {
        let store = Arc::new(MemoryStore::new());
        for node in [
            page(1, "R", None),
            page(2, "A", Some(1)),
            page(3, "B", Some(1)),
            page(4, "A1", Some(2)),
            page(5, "A2", Some(2)),
        ] {
            store.save_node(node).await.unwrap();
        }
        let resolver = Arc::new(ChildrenResolver::new(store, 100));
        let marking = Arc::new(MarkingEngine::new(resolver));
        (PartialTreeBuilder::new(marking), page(1, "R", None))
    }

    #[tokio::test]
    async fn test_render_by_id_looks_root_up() {
        let (builder, root) = builder().await;
        builder
            .mark_partial_tree(&root, 3, MarkingOptions::default())
            .await
            .unwrap();

        let outline = builder
            .render_by_id(NodeId(1), &OutlineFormatter::default(), RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(outline.as_deref(), Some("- R\n  - A [+]\n  - B"));

        let missing = builder
            .render_by_id(NodeId(99), &OutlineFormatter::default(), RenderOptions::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_threshold_stops_after_root_level() {
        let (builder, root) = builder().await;
        let count = builder
            .mark_partial_tree(&root, 3, MarkingOptions::default())
            .await
            .unwrap();

        assert_eq!(count, 3);
        let marking = builder.marking();
        assert_eq!(marking.marked_ids(), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(!marking.is_expanded(&page(2, "A", Some(1))));
        assert!(!marking.is_marked(&page(4, "A1", Some(2))));
        assert!(!marking.is_tree_complete(&root));
    }

    #[tokio::test]
    async fn test_outline_shows_placeholder() {
        let (builder, root) = builder().await;
        builder
            .mark_partial_tree(&root, 3, MarkingOptions::default())
            .await
            .unwrap();

        let outline = builder
            .render_tree(&root, &OutlineFormatter::default(), RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(outline, "- R\n  - A [+]\n  - B");
    }

    #[tokio::test]
    async fn test_unbounded_marks_everything() {
        let (builder, root) = builder().await;
        let count = builder
            .mark_partial_tree(&root, 0, MarkingOptions::default())
            .await
            .unwrap();

        assert_eq!(count, 5);
        assert!(builder.marking().is_tree_complete(&root));

        let tree = builder
            .marked_tree(&root, RenderOptions::default())
            .await
            .unwrap();
        assert_eq!(tree.entry_count(), 5);
        assert_eq!(
            tree.ids(),
            vec![NodeId(1), NodeId(2), NodeId(4), NodeId(5), NodeId(3)]
        );
        assert!(!tree.find(NodeId(2)).unwrap().has_more);
    }

    #[tokio::test]
    async fn test_unmarked_children_listed_without_limit() {
        let (builder, root) = builder().await;
        builder
            .mark_partial_tree(&root, 3, MarkingOptions::default())
            .await
            .unwrap();

        let a = page(2, "A", Some(1));
        let marked = builder
            .children_to_render(&a, true, ChildrenSource::AllChildren)
            .await
            .unwrap();
        let all = builder
            .children_to_render(&a, false, ChildrenSource::AllChildren)
            .await
            .unwrap();
        assert!(marked.is_empty());
        assert_eq!(all.len(), 2);
    }
}
