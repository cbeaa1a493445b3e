//! Node Predicates
//!
//! A `NodePredicate` decides whether a record matches over its persisted
//! fields. Predicates are installed as marking filters and handed to the
//! store for filtered lookups, so they must be shareable across tasks.
//!
//! Implemented for closures, `NodeFilter`, `PropertyFilter` and
//! `TitlePattern`.

use super::node::{Node, NodeFilter, PropertyFilter};
use regex::Regex;

/// Polymorphic predicate over a node's persisted fields
pub trait NodePredicate: Send + Sync {
    fn matches(&self, node: &Node) -> bool;

    /// Short label for logs
    fn describe(&self) -> String {
        "custom predicate".to_string()
    }
}

impl<F> NodePredicate for F
where
    F: Fn(&Node) -> bool + Send + Sync,
{
    fn matches(&self, node: &Node) -> bool {
        self(node)
    }
}

impl NodePredicate for NodeFilter {
    fn matches(&self, node: &Node) -> bool {
        NodeFilter::matches(self, node)
    }

    fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "node filter".to_string())
    }
}

impl NodePredicate for PropertyFilter {
    fn matches(&self, node: &Node) -> bool {
        PropertyFilter::matches(self, node)
    }

    fn describe(&self) -> String {
        format!("{} {:?} {}", self.name, self.operator, self.value)
    }
}

/// Matches titles against a regular expression
///
/// # Examples
///
/// ```rust
/// # use nodespace_hierarchy::models::{Node, NodeId, NodePredicate, TitlePattern};
/// let pattern = TitlePattern::new(r"(?i)^about").unwrap();
/// assert!(pattern.matches(&Node::new(NodeId(1), "Page", "About us", None)));
/// assert!(!pattern.matches(&Node::new(NodeId(2), "Page", "Contact", None)));
/// ```
#[derive(Debug, Clone)]
pub struct TitlePattern {
    pattern: Regex,
}

impl TitlePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }
}

impl NodePredicate for TitlePattern {
    fn matches(&self, node: &Node) -> bool {
        self.pattern.is_match(&node.title)
    }

    fn describe(&self) -> String {
        format!("title =~ /{}/", self.pattern.as_str())
    }
}
