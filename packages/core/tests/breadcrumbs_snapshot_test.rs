//! Breadcrumb and Snapshot Tests
//!
//! Loads a hierarchy from a JSON snapshot on disk, the way `tree-dump` does,
//! and checks breadcrumbs and configuration against it.

#[cfg(test)]
mod breadcrumbs_snapshot_tests {
    use anyhow::Result;
    use nodespace_hierarchy::db::{MemoryStore, StoreSnapshot};
    use nodespace_hierarchy::models::NodeId;
    use nodespace_hierarchy::services::HierarchyService;
    use nodespace_hierarchy::HierarchyConfig;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::{NamedTempFile, TempDir};

    fn site_snapshot() -> serde_json::Value {
        json!({
            "draft": [
                { "id": 1, "recordType": "Page", "title": "Home", "parentId": 0 },
                { "id": 2, "recordType": "Page", "title": "About", "parentId": 1, "sort": 1 },
                { "id": 3, "recordType": "Page", "title": "Team", "parentId": 2 },
                { "id": 4, "recordType": "Page", "title": "Contact", "parentId": 1, "sort": 2,
                  "showInMenus": false }
            ],
            "live": [
                { "id": 1, "recordType": "Page", "title": "Home" },
                { "id": 5, "recordType": "Page", "title": "Old news", "parentId": 1, "sort": 3 }
            ]
        })
    }

    fn write_snapshot(dir: &TempDir) -> Result<std::path::PathBuf> {
        let path = dir.path().join("site.json");
        std::fs::write(&path, serde_json::to_string_pretty(&site_snapshot())?)?;
        Ok(path)
    }

    #[tokio::test]
    async fn test_breadcrumbs_from_snapshot() -> Result<()> {
        let dir = TempDir::new()?;
        let store = Arc::new(MemoryStore::load_snapshot(write_snapshot(&dir)?)?);
        let service = HierarchyService::new(store);

        let team = service.get_node(NodeId(3)).await?.unwrap();
        assert_eq!(service.breadcrumbs(&team).await?, vec!["Home", "About", "Team"]);
        assert_eq!(service.breadcrumb_trail(&team).await?, "Home » About » Team");

        let home = service.get_node(NodeId(1)).await?.unwrap();
        assert!(home.is_root());
        assert_eq!(service.breadcrumbs(&home).await?, vec!["Home"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_live_only_rows_from_snapshot() -> Result<()> {
        let dir = TempDir::new()?;
        let store = Arc::new(MemoryStore::load_snapshot(write_snapshot(&dir)?)?);
        let service = HierarchyService::new(store);

        let old_news = service.get_node(NodeId(5)).await?.unwrap();
        assert!(old_news.deleted_from_stage);

        let home = service.get_node(NodeId(1)).await?.unwrap();
        let deleted = service.live_children(&home, true, true).await?;
        assert_eq!(deleted.iter().map(|n| n.id).collect::<Vec<_>>(), vec![NodeId(5)]);

        // Unbounded partial tree includes the live-only child
        assert_eq!(service.mark_partial_tree(&home, 0).await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_configured_separator_and_threshold() -> Result<()> {
        let dir = TempDir::new()?;
        let store = Arc::new(MemoryStore::load_snapshot(write_snapshot(&dir)?)?);

        let mut config_file = NamedTempFile::new()?;
        write!(
            config_file,
            r#"{{"breadcrumbSeparator": " / ", "nodeCountThreshold": 2, "defaultChildren": "allChildren"}}"#
        )?;
        let config = HierarchyConfig::load(config_file.path())?;
        let service = HierarchyService::with_config(store, config);

        let team = service.get_node(NodeId(3)).await?.unwrap();
        assert_eq!(service.breadcrumb_trail(&team).await?, "Home / About / Team");

        // Root expansion alone passes the threshold of 2
        let home = service.get_node(NodeId(1)).await?.unwrap();
        assert_eq!(service.mark_partial_tree_default(&home).await?, 3);
        assert!(!service.marking().is_expanded(&team));
        Ok(())
    }

    #[test]
    fn test_snapshot_round_trips_through_store() -> Result<()> {
        let snapshot: StoreSnapshot = serde_json::from_value(site_snapshot())?;
        let store = MemoryStore::from_snapshot(snapshot)?;

        let exported = store.snapshot();
        assert_eq!(exported.draft.len(), 4);
        assert_eq!(exported.live.len(), 2);
        assert_eq!(exported.draft[0].parent_id, None);
        Ok(())
    }

    #[test]
    fn test_snapshot_with_self_parent_is_rejected() {
        let snapshot: StoreSnapshot = serde_json::from_value(json!({
            "draft": [{ "id": 7, "recordType": "Page", "title": "Loop", "parentId": 7 }]
        }))
        .unwrap();
        assert!(MemoryStore::from_snapshot(snapshot).is_err());
    }
}
