//! Descendant Resolver Tests
//!
//! Live vs stage reconciliation, historical children and cache behaviour.

#[cfg(test)]
mod resolver_tests {
    use anyhow::Result;
    use nodespace_hierarchy::db::{MemoryStore, NodeStore};
    use nodespace_hierarchy::models::{Node, NodeId};
    use nodespace_hierarchy::services::HierarchyService;
    use std::sync::Arc;

    fn page(id: u64, title: &str, parent: Option<u64>) -> Node {
        Node::new(NodeId(id), "Page", title, parent.map(NodeId)).with_sort(id as i64)
    }

    fn ids(nodes: &[Node]) -> Vec<u64> {
        nodes.iter().map(|n| n.id.0).collect()
    }

    async fn create_service() -> (HierarchyService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (HierarchyService::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_live_children_only_deleted_excludes_moves() -> Result<()> {
        let (service, _store) = create_service().await;
        for node in [
            page(1, "Root", None),
            page(2, "Deleted", Some(1)),
            page(3, "Moved", Some(1)),
            page(4, "Kept", Some(1)),
        ] {
            let saved = service.save_node(node).await?;
            service.publish_node(saved.id).await?;
        }

        service.delete_node(NodeId(2)).await?;
        service.move_node(NodeId(3), Some(NodeId(4))).await?;

        let root = service.get_node(NodeId(1)).await?.unwrap();
        let all_live = service.live_children(&root, true, false).await?;
        assert_eq!(ids(&all_live), vec![2, 3, 4]);

        let deleted = service.live_children(&root, true, true).await?;
        assert_eq!(ids(&deleted), vec![2]);
        assert!(deleted[0].deleted_from_stage);
        Ok(())
    }

    #[tokio::test]
    async fn test_historical_children_union() -> Result<()> {
        let (service, _store) = create_service().await;
        service.save_node(page(1, "Root", None)).await?;
        service.save_node(page(9, "Elsewhere", None)).await?;

        // A: published under Root, then moved away on stage
        service.save_node(page(2, "A", Some(1))).await?;
        service.publish_node(NodeId(2)).await?;
        service.move_node(NodeId(2), Some(NodeId(9))).await?;

        // B: stage-only child
        service.save_node(page(3, "B", Some(1))).await?;

        // C: created under Root, then deleted before publishing
        service.save_node(page(4, "C", Some(1))).await?;
        service.delete_node(NodeId(4)).await?;

        let root = service.get_node(NodeId(1)).await?.unwrap();
        assert_eq!(ids(&service.get_children(&root).await?), vec![3]);

        let historical = service.historical_children(&root).await?;
        assert_eq!(ids(&historical), vec![3, 2, 4]);
        assert_eq!(service.num_historical_children(&root).await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_descendant_ids_stable_and_exclude_self() -> Result<()> {
        let (service, _store) = create_service().await;
        for node in [
            page(1, "R", None),
            page(2, "A", Some(1)),
            page(3, "B", Some(1)),
            page(4, "A1", Some(2)),
            page(5, "A1a", Some(4)),
        ] {
            service.save_node(node).await?;
        }
        let root = service.get_node(NodeId(1)).await?.unwrap();

        let first = service.descendant_ids(&root).await?;
        let second = service.descendant_ids(&root).await?;
        assert_eq!(first, second);
        assert_eq!(first, vec![NodeId(2), NodeId(4), NodeId(5), NodeId(3)]);
        assert!(!first.contains(&root.id));

        assert!(service.is_descendant(&root, NodeId(5)).await?);
        let b = service.get_node(NodeId(3)).await?.unwrap();
        assert!(service.descendant_ids(&b).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_external_writes_need_flush() -> Result<()> {
        let (service, store) = create_service().await;
        let root = service.save_node(page(1, "R", None)).await?;
        assert_eq!(service.num_children(&root, true).await?, 0);

        // Written behind the service's back
        store.save_node(page(2, "A", Some(1))).await?;
        assert_eq!(service.num_children(&root, true).await?, 0);
        assert_eq!(service.num_children(&root, false).await?, 1);

        service.flush_cache();
        assert_eq!(service.get_children(&root).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_hidden_children_and_menu_children() -> Result<()> {
        let (service, _store) = create_service().await;
        service.save_node(page(1, "R", None)).await?;
        service.save_node(page(2, "Visible", Some(1))).await?;
        service
            .save_node(page(3, "Hidden", Some(1)).hidden_from_menus())
            .await?;

        let root = service.get_node(NodeId(1)).await?.unwrap();
        let resolver = service.resolver();
        assert_eq!(ids(&resolver.all_children(&root).await?), vec![2, 3]);
        assert_eq!(ids(&resolver.children(&root).await?), vec![2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_passes_through() -> Result<()> {
        let (service, store) = create_service().await;
        let root = service.save_node(page(1, "R", None)).await?;

        store.set_failure(Some("disk unplugged".to_string()));
        let err = service.num_children(&root, false).await.unwrap_err();
        assert_eq!(err.code(), "STORE_FAILURE");
        assert!(err.to_string().contains("disk unplugged"));
        Ok(())
    }
}
