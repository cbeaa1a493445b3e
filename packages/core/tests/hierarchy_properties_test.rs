//! Property tests for descendant sets and cycle validation
//!
//! Random forests are built with every parent id smaller than its child's
//! id, so the generated graph is acyclic and the reference descendant set
//! can be computed from the parent vector alone.

use nodespace_hierarchy::db::{MemoryStore, NodeStore};
use nodespace_hierarchy::models::{Node, NodeId};
use nodespace_hierarchy::services::{CycleGuard, HierarchyService};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// `parents[i]` is the parent of node `i + 1`
fn forest_strategy() -> impl Strategy<Value = Vec<Option<u64>>> {
    prop::collection::vec(prop::option::weighted(0.8, any::<u64>()), 1..40).prop_map(|seeds| {
        seeds
            .into_iter()
            .enumerate()
            .map(|(index, seed)| match (index, seed) {
                (0, _) | (_, None) => None,
                (index, Some(seed)) => Some(seed % index as u64 + 1),
            })
            .collect()
    })
}

fn reference_descendants(parents: &[Option<u64>], id: u64) -> HashSet<u64> {
    let mut found = HashSet::new();
    let mut frontier = vec![id];
    while let Some(current) = frontier.pop() {
        for (index, parent) in parents.iter().enumerate() {
            let child = index as u64 + 1;
            if *parent == Some(current) && found.insert(child) {
                frontier.push(child);
            }
        }
    }
    found
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

async fn build_store(parents: &[Option<u64>]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (index, parent) in parents.iter().enumerate() {
        let id = index as u64 + 1;
        let node = Node::new(NodeId(id), "Page", format!("Page {}", id), parent.map(NodeId));
        store.save_node(node).await.expect("save");
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn descendant_ids_match_reference(parents in forest_strategy(), pick in any::<prop::sample::Index>()) {
        let id = pick.index(parents.len()) as u64 + 1;
        let (first, second) = runtime().block_on(async {
            let store = build_store(&parents).await;
            let service = HierarchyService::new(store);
            let node = service.get_node(NodeId(id)).await.expect("read").expect("exists");
            let first = service.descendant_ids(&node).await.expect("descendants");
            service.flush_cache();
            let second = service.descendant_ids(&node).await.expect("descendants");
            (first, second)
        });

        let expected = reference_descendants(&parents, id);
        let actual: HashSet<u64> = first.iter().map(|n| n.0).collect();

        prop_assert!(!actual.contains(&id));
        prop_assert_eq!(actual.len(), first.len());
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn validate_fails_iff_parent_is_self_or_descendant(
        parents in forest_strategy(),
        node_pick in any::<prop::sample::Index>(),
        parent_pick in any::<prop::sample::Index>(),
    ) {
        let node_id = node_pick.index(parents.len()) as u64 + 1;
        let parent_id = parent_pick.index(parents.len()) as u64 + 1;

        let rejected = runtime().block_on(async {
            let store = build_store(&parents).await;
            let node = store
                .get_node(NodeId(node_id), nodespace_hierarchy::Stage::Draft)
                .await
                .expect("read")
                .expect("exists");
            let guard = CycleGuard::new(store, 1000);
            guard.validate(&node, Some(NodeId(parent_id))).await.is_err()
        });

        let expected = parent_id == node_id
            || reference_descendants(&parents, node_id).contains(&parent_id);
        prop_assert_eq!(rejected, expected);
    }
}
