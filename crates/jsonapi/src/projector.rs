//! Attribute projection.
//!
//! Turns a stored record into the `attributes` member of a resource object:
//! every persisted column except the primary key and the schema's hidden
//! attributes, in column-declaration order, optionally narrowed by a sparse
//! fieldset.

use serde_json::{Map, Value};
use storefront_persistence::types::StoredRecord;

use crate::registry::ResourceSchema;

/// Projects a record's attributes.
pub fn project(
    record: &StoredRecord,
    schema: &ResourceSchema,
    fields: Option<&[String]>,
) -> Map<String, Value> {
    record
        .attributes()
        .iter()
        .filter(|(name, _)| name.as_str() != "id" && !schema.is_hidden(name))
        .filter(|(name, _)| fields.is_none_or(|f| f.iter().any(|field| field == *name)))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    fn user_record() -> StoredRecord {
        let attributes = json!({
            "name": "Ann",
            "email": "ann@example.com",
            "password": "secret-hash",
            "created_at": "2024-01-01T00:00:00.000000Z",
            "updated_at": "2024-01-01T00:00:00.000000Z",
            "deleted_at": null
        });
        StoredRecord::new("users", "1", attributes.as_object().cloned().unwrap())
    }

    #[test]
    fn test_hidden_attributes_removed() {
        let registry = SchemaRegistry::storefront().unwrap();
        let attributes = project(&user_record(), registry.get("users").unwrap(), None);
        let keys: Vec<_> = attributes.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["name", "email", "created_at", "updated_at", "deleted_at"]
        );
    }

    #[test]
    fn test_sparse_fieldset_keeps_declaration_order() {
        let registry = SchemaRegistry::storefront().unwrap();
        let fields = vec!["email".to_string(), "name".to_string(), "password".to_string()];
        let attributes = project(
            &user_record(),
            registry.get("users").unwrap(),
            Some(&fields),
        );
        let keys: Vec<_> = attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "email"]);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let registry = SchemaRegistry::storefront().unwrap();
        let schema = registry.get("users").unwrap();
        let first = serde_json::to_string(&project(&user_record(), schema, None)).unwrap();
        let second = serde_json::to_string(&project(&user_record(), schema, None)).unwrap();
        assert_eq!(first, second);
    }
}
