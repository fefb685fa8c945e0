//! Stored record types.
//!
//! This module defines the [`StoredRecord`] type: one row of a resource table
//! with its attributes in column-declaration order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted row.
///
/// `attributes` holds every column except the primary key, including columns
/// that are hidden from clients (such as a password hash). Filtering those out
/// is the caller's concern.
///
/// # Examples
///
/// ```
/// use storefront_persistence::types::StoredRecord;
/// use serde_json::{json, Map};
///
/// let mut attributes = Map::new();
/// attributes.insert("name".to_string(), json!("Acme"));
/// let record = StoredRecord::new("brands", "1", attributes);
///
/// assert_eq!(record.url(), "brands/1");
/// assert_eq!(record.attribute("name"), Some(&json!("Acme")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The resource type (e.g., "shops", "shop-types").
    resource_type: String,

    /// The primary key, rendered as a string.
    id: String,

    /// Column values keyed by column name.
    attributes: Map<String, Value>,
}

impl StoredRecord {
    /// Creates a stored record.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes,
        }
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns all column values.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Returns a single column value.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Returns `{type}/{id}`.
    pub fn url(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Returns true if the row carries a non-null `deleted_at`.
    pub fn is_deleted(&self) -> bool {
        matches!(self.attributes.get("deleted_at"), Some(v) if !v.is_null())
    }

    /// Consumes the record and returns its attributes.
    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_deleted() {
        let mut attributes = Map::new();
        attributes.insert("deleted_at".to_string(), Value::Null);
        let record = StoredRecord::new("shops", "1", attributes.clone());
        assert!(!record.is_deleted());

        attributes.insert("deleted_at".to_string(), json!("2024-01-01T00:00:00.000000Z"));
        let record = StoredRecord::new("shops", "1", attributes);
        assert!(record.is_deleted());
    }

    #[test]
    fn test_attribute_order_preserved() {
        let mut attributes = Map::new();
        attributes.insert("name".to_string(), json!("a"));
        attributes.insert("created_at".to_string(), json!(null));
        attributes.insert("updated_at".to_string(), json!(null));
        let record = StoredRecord::new("shops", "1", attributes);
        let keys: Vec<_> = record.attributes().keys().cloned().collect();
        assert_eq!(keys, ["name", "created_at", "updated_at"]);
    }
}
