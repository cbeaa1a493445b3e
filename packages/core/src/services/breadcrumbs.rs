//! Breadcrumb / path builder

use crate::models::Node;
use crate::services::error::HierarchyError;
use crate::services::resolver::ChildrenResolver;
use std::sync::Arc;

pub struct BreadcrumbBuilder {
    resolver: Arc<ChildrenResolver>,
    separator: String,
}

impl BreadcrumbBuilder {
    pub fn new(resolver: Arc<ChildrenResolver>, separator: impl Into<String>) -> Self {
        Self {
            resolver,
            separator: separator.into(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Titles from the root down to `node`
    ///
    /// The walk uses the resolver's ancestor chain, so it stops at a missing
    /// parent, a repeated id or `max_depth` hops.
    pub async fn breadcrumbs(&self, node: &Node) -> Result<Vec<String>, HierarchyError> {
        let stack = self.resolver.parent_stack(node).await?;
        Ok(stack.into_iter().rev().map(|n| n.title).collect())
    }

    /// Breadcrumbs joined with `separator`, or the configured one when `None`
    pub async fn breadcrumb_trail(
        &self,
        node: &Node,
        separator: Option<&str>,
    ) -> Result<String, HierarchyError> {
        let crumbs = self.breadcrumbs(node).await?;
        Ok(crumbs.join(separator.unwrap_or(&self.separator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NodeStore};
    use crate::models::{NodeId, Stage};

    fn page(id: u64, title: &str, parent: Option<u64>) -> Node {
        Node::new(NodeId(id), "Page", title, parent.map(NodeId))
    }

    #[tokio::test]
    async fn test_trail_is_root_first() {
        let store = Arc::new(MemoryStore::new());
        for node in [
            page(1, "Home", None),
            page(2, "About", Some(1)),
            page(3, "Team", Some(2)),
        ] {
            store.save_node(node).await.unwrap();
        }
        let builder = BreadcrumbBuilder::new(Arc::new(ChildrenResolver::new(store, 100)), " » ");
        let team = page(3, "Team", Some(2));

        assert_eq!(
            builder.breadcrumbs(&team).await.unwrap(),
            vec!["Home", "About", "Team"]
        );
        assert_eq!(
            builder.breadcrumb_trail(&team, None).await.unwrap(),
            "Home » About » Team"
        );
        assert_eq!(
            builder.breadcrumb_trail(&team, Some(" / ")).await.unwrap(),
            "Home / About / Team"
        );
    }

    #[tokio::test]
    async fn test_planted_loop_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        store.force_row(Stage::Draft, page(1, "X", Some(2)));
        store.force_row(Stage::Draft, page(2, "Y", Some(1)));
        let builder = BreadcrumbBuilder::new(Arc::new(ChildrenResolver::new(store, 100)), " » ");

        let crumbs = builder.breadcrumbs(&page(1, "X", Some(2))).await.unwrap();
        assert_eq!(crumbs, vec!["Y", "X"]);
    }
}
