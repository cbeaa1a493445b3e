//! NodeSpace Hierarchy Engine
//!
//! Lets arbitrary records form a parent/child tree on top of a versioned
//! record store (draft and live versions, soft deletion).
//!
//! # Architecture
//!
//! - **Store-agnostic**: every service holds an `Arc<dyn NodeStore>`
//! - **Version-aware**: `Stage` / `VersionScope` are threaded through every query
//! - **Request-scoped caches**: flushed explicitly or by writes through `HierarchyService`
//! - **Id-keyed marks**: marking state never lives on a `Node` value
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeId, filters, predicates)
//! - [`db`] - `NodeStore` trait, `MemoryStore` backend, domain events
//! - [`services`] - Cycle guard, resolver, marking, partial trees, breadcrumbs
//! - [`config`] - `HierarchyConfig`

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::HierarchyConfig;
pub use db::{MemoryStore, NodeStore};
pub use models::*;
pub use services::*;
