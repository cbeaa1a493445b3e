//! Service Layer Error Types
//!
//! This module defines error types for hierarchy operations. Store failures
//! are wrapped without modification; "record not found" during reads is not
//! an error and surfaces as `None` or an empty collection instead.

use crate::db::DatabaseError;
use crate::models::{NodeId, ValidationError};
use thiserror::Error;

/// Hierarchy operation errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// The proposed parent would make the record its own ancestor
    #[error("Infinite loop found within the \"{record_type}\" hierarchy. Please change the parent to resolve this")]
    CycleDetected {
        record_type: String,
        node_id: NodeId,
        parent_id: NodeId,
    },

    /// A mutation targeted a record that does not exist
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Validation failed for node
    #[error("Node validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Store operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HierarchyError {
    /// Create a cycle error naming the record type of the hierarchy
    pub fn cycle_detected(record_type: impl Into<String>, node_id: NodeId, parent_id: NodeId) -> Self {
        Self::CycleDetected {
            record_type: record_type.into(),
            node_id,
            parent_id,
        }
    }

    /// Create a node not found error
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Machine-readable code, matching the validation result code callers show
    pub fn code(&self) -> &'static str {
        match self {
            HierarchyError::CycleDetected { .. } => "INFINITE_LOOP",
            HierarchyError::NodeNotFound { .. } => "NOT_FOUND",
            HierarchyError::Validation(_) => "VALIDATION",
            HierarchyError::Database(_) => "STORE_FAILURE",
            HierarchyError::Config(_) => "CONFIG",
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, HierarchyError::CycleDetected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_record_type() {
        let err = HierarchyError::cycle_detected("Page", NodeId(1), NodeId(5));
        assert_eq!(
            err.to_string(),
            "Infinite loop found within the \"Page\" hierarchy. Please change the parent to resolve this"
        );
        assert_eq!(err.code(), "INFINITE_LOOP");
        assert!(err.is_cycle());
    }

    #[test]
    fn test_database_errors_pass_through() {
        let err: HierarchyError = DatabaseError::backend("connection reset").into();
        assert!(err.to_string().contains("connection reset"));
        assert!(matches!(err, HierarchyError::Database(DatabaseError::Backend { .. })));
    }
}
