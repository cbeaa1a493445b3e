//! Node Data Structures
//!
//! This module defines the `Node` record that takes part in a hierarchy, the
//! version context types threaded through every store query, and the
//! declarative `NodeFilter` used for filtered lookups.
//!
//! # Architecture
//!
//! - **Stable identity**: `NodeId` is shared by every version of a record
//! - **Two versions**: a record has a draft (stage) row and optionally a live row
//! - **Soft delete**: removing the draft row keeps the live row and the archive
//! - **Pure JSON properties**: arbitrary persisted fields live in `properties`
//!
//! # Examples
//!
//! ```rust
//! use nodespace_hierarchy::models::{Node, NodeId};
//! use serde_json::json;
//!
//! let root = Node::new(NodeId(1), "Page", "Home", None);
//! let child = Node::new(NodeId(2), "Page", "About", Some(root.id))
//!     .with_sort(10)
//!     .with_properties(json!({ "status": "draft" }));
//!
//! assert!(root.is_root());
//! assert_eq!(child.parent_id, Some(NodeId(1)));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

/// Default version value for serde deserialization (version 1)
fn default_version() -> i64 {
    1
}

fn default_show_in_menus() -> bool {
    true
}

fn default_properties() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Validation errors for Node operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node ID: {0}")]
    InvalidId(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),
}

/// Identifier shared by every version of a record.
///
/// Id `0` is reserved: it never names a record and a parent of `0` means
/// "no parent" when deserialising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

/// The version table a row belongs to.
///
/// `Draft` is the working ("stage") copy edited by authors; `Live` is the
/// published copy visitors see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Draft,
    Live,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Draft => write!(f, "Stage"),
            Stage::Live => write!(f, "Live"),
        }
    }
}

/// Version context for read queries.
///
/// `Both` reads the draft table and adds live rows whose id has no draft row,
/// which is how records deleted from stage stay visible to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum VersionScope {
    #[default]
    Draft,
    Live,
    Both,
}

impl From<Stage> for VersionScope {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Draft => VersionScope::Draft,
            Stage::Live => VersionScope::Live,
        }
    }
}

/// Maps a missing, `null` or `0` parent to `None`
fn deserialize_parent_id<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let parent = Option::<NodeId>::deserialize(deserializer)?;
    Ok(parent.filter(|id| !id.is_zero()))
}

/// One hierarchical record.
///
/// # Fields
///
/// - `id`: Stable identifier shared by the draft and live versions
/// - `record_type`: Type name of the record (e.g. "Page"); names the hierarchy in errors
/// - `title`: Display label, used for breadcrumbs
/// - `parent_id`: Parent record, `None` for a root. May differ between versions
/// - `show_in_menus`: Menu visibility; "show all" child queries ignore it
/// - `sort`: Sibling order, children are returned ordered by `(sort, id)`
/// - `properties`: Arbitrary persisted fields, matched by filters
/// - `deleted_from_stage`: Set on reads when the row only exists on live
///
/// A `Node` value is a *handle*: two values with the same `id` refer to the
/// same logical record, and every piece of transient hierarchy state (caches,
/// marks) is keyed by the id rather than stored on the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    pub record_type: String,

    pub title: String,

    #[serde(default, deserialize_with = "deserialize_parent_id")]
    pub parent_id: Option<NodeId>,

    #[serde(default = "default_show_in_menus")]
    pub show_in_menus: bool,

    #[serde(default)]
    pub sort: i64,

    #[serde(default = "default_properties")]
    pub properties: serde_json::Value,

    /// Not persisted; filled in by the store when the draft row is gone
    #[serde(default)]
    pub deleted_from_stage: bool,

    /// Incremented by the store on each draft write
    #[serde(default = "default_version")]
    pub version: i64,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Create a new node with empty properties
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use nodespace_hierarchy::models::{Node, NodeId};
    /// let page = Node::new(NodeId(7), "Page", "Contact", Some(NodeId(1)));
    /// assert_eq!(page.version, 1);
    /// assert!(page.show_in_menus);
    /// ```
    pub fn new(
        id: NodeId,
        record_type: impl Into<String>,
        title: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            record_type: record_type.into(),
            title: title.into(),
            parent_id: parent_id.filter(|p| !p.is_zero()),
            show_in_menus: true,
            sort: 0,
            properties: default_properties(),
            deleted_from_stage: false,
            version: 1,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn hidden_from_menus(mut self) -> Self {
        self.show_in_menus = false;
        self
    }

    /// Validate node structure
    ///
    /// Self-parenting is rejected here; deeper loops are the cycle guard's job
    /// because they need store access.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_zero() {
            return Err(ValidationError::InvalidId(
                "id 0 is reserved for \"no parent\"".to_string(),
            ));
        }

        if self.record_type.trim().is_empty() {
            return Err(ValidationError::MissingField("record_type".to_string()));
        }

        if !self.properties.is_object() {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }

        if self.parent_id == Some(self.id) {
            return Err(ValidationError::InvalidParent(
                "Node cannot be its own parent".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if this node is a root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Read a top-level property
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.modified_at = Utc::now();
    }

    pub fn set_parent(&mut self, parent_id: Option<NodeId>) {
        self.parent_id = parent_id.filter(|p| !p.is_zero());
        self.modified_at = Utc::now();
    }

    /// Merge properties with existing properties (shallow merge)
    pub fn merge_properties(&mut self, updates: serde_json::Value) {
        if let (Some(existing), Some(new)) = (self.properties.as_object_mut(), updates.as_object())
        {
            for (key, value) in new {
                existing.insert(key.clone(), value.clone());
            }
            self.modified_at = Utc::now();
        }
    }

    /// Apply a partial update in place
    pub fn apply_update(&mut self, update: NodeUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(parent_id) = update.parent_id {
            self.parent_id = parent_id.filter(|p| !p.is_zero());
        }
        if let Some(sort) = update.sort {
            self.sort = sort;
        }
        if let Some(show_in_menus) = update.show_in_menus {
            self.show_in_menus = show_in_menus;
        }
        if let Some(properties) = update.properties {
            self.merge_properties(properties);
        }
        self.modified_at = Utc::now();
    }
}

/// Custom deserializer for Option<Option<T>> fields
///
/// Distinguishes between a missing field (`None`) and an explicit `null`
/// (`Some(None)`). Missing fields are handled by `#[serde(default)]`.
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update
///
/// `parent_id` uses the double-Option pattern:
/// - `None`: Don't change the parent
/// - `Some(None)`: Make the node a root
/// - `Some(Some(id))`: Move the node under `id`
///
/// # Examples
///
/// ```rust
/// # use nodespace_hierarchy::models::{NodeId, NodeUpdate};
/// let update = NodeUpdate::new()
///     .with_title("Renamed")
///     .with_parent(Some(NodeId(3)));
/// assert!(!update.is_empty());
/// assert!(update.changes_parent());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<NodeId>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_menus: Option<bool>,

    /// Shallow-merged into the existing properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<NodeId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn changes_parent(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.parent_id.is_none()
            && self.sort.is_none()
            && self.show_in_menus.is_none()
            && self.properties.is_none()
    }
}

/// Comparison operator for property filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterOperator {
    /// Equality (=)
    Equals,
    /// Inequality (!=)
    NotEquals,
    /// Value is one of an array of candidates
    In,
    /// String contains
    Contains,
    /// Property is present and not null
    Exists,
}

/// Property filter over a top-level key of `properties`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyFilter {
    pub name: String,
    pub operator: FilterOperator,
    pub value: serde_json::Value,
}

impl PropertyFilter {
    /// Create a new property filter
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidProperties` when the name is empty or
    /// when `In` is used with a non-array value.
    pub fn new(
        name: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidProperties(
                "property name cannot be empty".to_string(),
            ));
        }
        if operator == FilterOperator::In && !value.is_array() {
            return Err(ValidationError::InvalidProperties(format!(
                "operator In on '{}' needs an array of candidates",
                name
            )));
        }
        Ok(Self {
            name,
            operator,
            value,
        })
    }

    /// Shorthand for an equality filter
    pub fn equals(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            operator: FilterOperator::Equals,
            value,
        }
    }

    pub fn matches(&self, node: &Node) -> bool {
        let actual = node.property(&self.name);
        match self.operator {
            FilterOperator::Equals => actual == Some(&self.value),
            FilterOperator::NotEquals => actual != Some(&self.value),
            FilterOperator::In => match (actual, self.value.as_array()) {
                (Some(actual), Some(candidates)) => candidates.contains(actual),
                _ => false,
            },
            FilterOperator::Contains => match (actual.and_then(|v| v.as_str()), self.value.as_str())
            {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            FilterOperator::Exists => actual.map(|v| !v.is_null()).unwrap_or(false),
        }
    }
}

/// Declarative filter for store queries
///
/// Every populated criterion must hold (logical AND). An empty filter
/// matches every node.
///
/// # Examples
///
/// ```rust
/// # use nodespace_hierarchy::models::{Node, NodeFilter, NodeId, PropertyFilter};
/// # use serde_json::json;
/// let filter = NodeFilter::new()
///     .with_record_type("Page")
///     .with_property_filter(PropertyFilter::equals("status", json!("published")));
///
/// let page = Node::new(NodeId(1), "Page", "Home", None)
///     .with_properties(json!({ "status": "published" }));
/// assert!(filter.matches(&page));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,

    /// `Some(None)` selects roots
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<NodeId>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<NodeId>>,

    /// Case-insensitive substring match on the title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_contains: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_menus: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_filters: Option<Vec<PropertyFilter>>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: Option<NodeId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_ids(mut self, ids: Vec<NodeId>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_title_contains(mut self, needle: impl Into<String>) -> Self {
        self.title_contains = Some(needle.into());
        self
    }

    pub fn with_show_in_menus(mut self, show_in_menus: bool) -> Self {
        self.show_in_menus = Some(show_in_menus);
        self
    }

    /// Add a property filter (can be called multiple times)
    pub fn with_property_filter(mut self, filter: PropertyFilter) -> Self {
        self.property_filters.get_or_insert_with(Vec::new).push(filter);
        self
    }

    /// Evaluate the filter against a node's persisted fields
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(record_type) = &self.record_type {
            if &node.record_type != record_type {
                return false;
            }
        }

        if let Some(parent_id) = &self.parent_id {
            if &node.parent_id != parent_id {
                return false;
            }
        }

        if let Some(ids) = &self.ids {
            if !ids.contains(&node.id) {
                return false;
            }
        }

        if let Some(needle) = &self.title_contains {
            if !node.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }

        if let Some(show_in_menus) = self.show_in_menus {
            if node.show_in_menus != show_in_menus {
                return false;
            }
        }

        self.property_filters
            .as_ref()
            .map(|filters| filters.iter().all(|f| f.matches(node)))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_creation() {
        let node = Node::new(NodeId(1), "Page", "Home", None);

        assert_eq!(node.id, NodeId(1));
        assert_eq!(node.record_type, "Page");
        assert_eq!(node.title, "Home");
        assert!(node.is_root());
        assert!(node.show_in_menus);
        assert!(!node.deleted_from_stage);
    }

    #[test]
    fn test_zero_parent_means_root() {
        let node = Node::new(NodeId(4), "Page", "Orphan", Some(NodeId(0)));
        assert!(node.is_root());

        let parsed: Node =
            serde_json::from_value(json!({"id": 5, "recordType": "Page", "title": "T", "parentId": 0}))
                .unwrap();
        assert!(parsed.is_root());
        assert!(parsed.show_in_menus);
        assert_eq!(parsed.properties, json!({}));
    }

    #[test]
    fn test_validate_rejects_self_parent() {
        let mut node = Node::new(NodeId(3), "Page", "Loop", None);
        node.parent_id = Some(NodeId(3));

        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_type_and_reserved_id() {
        let node = Node::new(NodeId(3), "  ", "No type", None);
        assert!(matches!(node.validate(), Err(ValidationError::MissingField(_))));

        let node = Node::new(NodeId(0), "Page", "Zero", None);
        assert!(matches!(node.validate(), Err(ValidationError::InvalidId(_))));
    }

    #[test]
    fn test_apply_update_merges_properties() {
        let mut node = Node::new(NodeId(2), "Page", "Old", Some(NodeId(1)))
            .with_properties(json!({"a": 1, "b": 2}));

        node.apply_update(
            NodeUpdate::new()
                .with_title("New")
                .with_parent(None)
                .with_properties(json!({"b": 3})),
        );

        assert_eq!(node.title, "New");
        assert!(node.is_root());
        assert_eq!(node.properties, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn test_update_double_option_deserialization() {
        let update: NodeUpdate = serde_json::from_value(json!({"title": "x"})).unwrap();
        assert!(update.parent_id.is_none());

        let update: NodeUpdate = serde_json::from_value(json!({"parentId": null})).unwrap();
        assert_eq!(update.parent_id, Some(None));

        let update: NodeUpdate = serde_json::from_value(json!({"parentId": 9})).unwrap();
        assert_eq!(update.parent_id, Some(Some(NodeId(9))));
    }

    #[test]
    fn test_filter_matches() {
        let node = Node::new(NodeId(2), "Page", "Contact Us", Some(NodeId(1)))
            .with_properties(json!({"status": "live", "tags": "news,events"}));

        assert!(NodeFilter::new().matches(&node));
        assert!(NodeFilter::new().with_title_contains("contact").matches(&node));
        assert!(NodeFilter::new()
            .with_parent_id(Some(NodeId(1)))
            .matches(&node));
        assert!(!NodeFilter::new().with_parent_id(None).matches(&node));
        assert!(!NodeFilter::new().with_record_type("File").matches(&node));
        assert!(NodeFilter::new()
            .with_property_filter(
                PropertyFilter::new("status", FilterOperator::In, json!(["live", "draft"])).unwrap()
            )
            .with_property_filter(
                PropertyFilter::new("tags", FilterOperator::Contains, json!("events")).unwrap()
            )
            .matches(&node));
        assert!(!NodeFilter::new()
            .with_property_filter(PropertyFilter::equals("status", json!("draft")))
            .matches(&node));
    }

    #[test]
    fn test_property_filter_validation() {
        assert!(PropertyFilter::new("", FilterOperator::Equals, json!(1)).is_err());
        assert!(PropertyFilter::new("status", FilterOperator::In, json!("live")).is_err());
        assert!(PropertyFilter::new("status", FilterOperator::Exists, json!(null)).is_ok());
    }
}
