//! Data Models
//!
//! This module contains the data structures shared by the store and the
//! hierarchy services:
//!
//! - `Node` - A record taking part in a parent/child hierarchy
//! - `Stage` / `VersionScope` - Which version of a record a query reads
//! - `NodeFilter` - Declarative filter evaluated against persisted fields
//! - `NodePredicate` - Trait for arbitrary match predicates (closures, filters, regexes)

mod node;
mod predicate;

pub use node::{
    FilterOperator, Node, NodeFilter, NodeId, NodeUpdate, PropertyFilter, Stage,
    ValidationError, VersionScope,
};
pub use predicate::{NodePredicate, TitlePattern};
