//! Cycle Guard
//!
//! Rejects parent assignments that would make a record its own ancestor.
//! `HierarchyService` runs it before persisting any new node or parent
//! change; a failure aborts the write.

use crate::db::NodeStore;
use crate::models::{Node, NodeId, Stage};
use crate::services::error::HierarchyError;
use std::collections::HashSet;
use std::sync::Arc;

pub struct CycleGuard {
    store: Arc<dyn NodeStore>,
    max_depth: usize,
}

impl CycleGuard {
    pub fn new(store: Arc<dyn NodeStore>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Check that `node` may hang under `proposed_parent`
    ///
    /// Walks the draft ancestor chain of `proposed_parent` up to a root. Fails
    /// with `CycleDetected` when the chain reaches `node`, when an id repeats
    /// (the stored graph already loops) or when the walk exceeds `max_depth`.
    /// A missing ancestor ends the walk successfully.
    pub async fn validate(
        &self,
        node: &Node,
        proposed_parent: Option<NodeId>,
    ) -> Result<(), HierarchyError> {
        let Some(parent_id) = proposed_parent.filter(|p| !p.is_zero()) else {
            return Ok(());
        };
        let cycle = || HierarchyError::cycle_detected(&node.record_type, node.id, parent_id);

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut current = parent_id;
        loop {
            if current == node.id {
                tracing::debug!(
                    "Rejected parent {} for {} {}: it is the node or one of its descendants",
                    parent_id,
                    node.record_type,
                    node.id
                );
                return Err(cycle());
            }
            if !visited.insert(current) {
                tracing::warn!(
                    "Existing parent loop through {} found while validating {}",
                    current,
                    node.id
                );
                return Err(cycle());
            }
            if visited.len() > self.max_depth {
                tracing::warn!(
                    "Ancestor chain of {} exceeds {} levels",
                    parent_id,
                    self.max_depth
                );
                return Err(cycle());
            }

            match self.store.get_node(current, Stage::Draft).await? {
                Some(ancestor) => match ancestor.parent_id {
                    Some(next) => current = next,
                    None => return Ok(()),
                },
                None => return Ok(()),
            }
        }
    }
}
