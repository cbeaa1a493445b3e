//! Hierarchy Services
//!
//! This module contains the tree engine built on top of a `NodeStore`:
//!
//! - `CycleGuard` - Rejects parent assignments that would create a loop
//! - `ChildrenResolver` - Children, descendants, historical children and ancestors
//! - `MarkingEngine` - Per-id marking state for partial trees
//! - `PartialTreeBuilder` - Bounded partial-tree marking and nested rendering
//! - `BreadcrumbBuilder` - Root-first title paths
//! - `HierarchyService` - Facade owning all of the above for one request scope

pub mod breadcrumbs;
pub mod cycle_guard;
pub mod error;
pub mod hierarchy_service;
pub mod marking;
pub mod partial_tree;
pub mod resolver;

pub use breadcrumbs::BreadcrumbBuilder;
pub use cycle_guard::CycleGuard;
pub use error::HierarchyError;
pub use hierarchy_service::HierarchyService;
pub use marking::{MarkingEngine, MarkingOptions, NodeMarks};
pub use partial_tree::{
    OutlineFormatter, PartialTreeBuilder, RenderOptions, TreeEntry, TreeFormatter,
};
pub use resolver::{ChildrenResolver, ChildrenSource, CountSource};
