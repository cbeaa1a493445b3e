//! Database Layer
//!
//! This module holds the record-store side of the hierarchy engine:
//!
//! - `NodeStore` - the async trait every backend implements
//! - `MemoryStore` - versioned in-memory backend (draft, live, archive)
//! - `DatabaseError` - store failures, passed through to callers unmodified
//! - `HierarchyEvent` - domain events emitted after successful writes
//!
//! The hierarchy services never assume a concrete backend; they hold an
//! `Arc<dyn NodeStore>`.

mod error;
pub mod events;
mod memory_store;
mod node_store;

pub use error::DatabaseError;
pub use events::{HierarchyEvent, ParentChange};
pub use memory_store::{MemoryStore, StoreSnapshot};
pub use node_store::{ChildrenQuery, NodeStore, StoreResult};
