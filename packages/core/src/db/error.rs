//! Database Error Types
//!
//! This module defines error types for record-store operations. Store errors
//! reach callers of the hierarchy services unmodified; retry policy belongs to
//! the store implementation.

use crate::models::{NodeId, Stage};
use thiserror::Error;

/// Record store operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// A record with this id already exists in the target table
    #[error("Duplicate node id {id} in {stage} table")]
    DuplicateId { id: NodeId, stage: Stage },

    /// The record to publish or delete has no row in the source table
    #[error("Node {id} has no {stage} version")]
    MissingVersion { id: NodeId, stage: Stage },

    /// Backend-specific failure with context
    #[error("Store operation failed: {context}")]
    Backend { context: String },

    /// Snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    pub fn duplicate_id(id: NodeId, stage: Stage) -> Self {
        Self::DuplicateId { id, stage }
    }

    pub fn missing_version(id: NodeId, stage: Stage) -> Self {
        Self::MissingVersion { id, stage }
    }

    /// Create a backend error
    pub fn backend(context: impl Into<String>) -> Self {
        Self::Backend {
            context: context.into(),
        }
    }
}
