//! Resource schema registry.
//!
//! The registry maps every resource type to an immutable [`ResourceSchema`]:
//! which fields may be sorted and filtered on, which relationships may be
//! included, how request documents are validated and which attributes are
//! never exposed. It is built once at startup and shared read-only.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::error::{JsonApiError, JsonApiResult};
use crate::validation::{FieldRules, Rule, RuleParseError};

/// Whether a relationship points at one resource or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::ToOne => write!(f, "to-one"),
            Cardinality::ToMany => write!(f, "to-many"),
        }
    }
}

/// A relationship declared on a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDef {
    /// Name used in URLs, `include` and the `relationships` member.
    pub name: String,
    pub cardinality: Cardinality,
    /// Resource type of the related records.
    pub related_type: String,
    /// Name of the storage relation that resolves it.
    pub accessor: String,
    /// Route parameter naming the owning record (`seller` in `/sellers/{seller}/shops`).
    pub route_param: String,
    /// Owner column holding the related id. Set for to-one relationships only.
    pub foreign_key: Option<String>,
}

/// Everything the engine knows about one resource type.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub allowed_sorts: Vec<String>,
    pub allowed_filters: Vec<String>,
    pub allowed_includes: Vec<String>,
    /// Attribute rules for create, keyed by attribute name.
    pub create_rules: Vec<FieldRules>,
    /// Attribute rules for update, keyed by attribute name.
    pub update_rules: Vec<FieldRules>,
    /// Relationships in declaration order.
    pub relationships: Vec<RelationshipDef>,
    /// Attributes never exposed to clients.
    pub hidden: Vec<String>,
}

impl ResourceSchema {
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Attributes a request may write: the keys of the rule set.
    pub fn writable_attributes(&self, update: bool) -> impl Iterator<Item = &str> {
        let rules = if update {
            &self.update_rules
        } else {
            &self.create_rules
        };
        rules.iter().map(|r| r.path.as_str())
    }

    pub fn is_hidden(&self, attribute: &str) -> bool {
        self.hidden.iter().any(|h| h == attribute)
    }
}

/// Errors raised while building the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid rule for {resource_type}.{field}: {source}")]
    InvalidRule {
        resource_type: String,
        field: String,
        #[source]
        source: RuleParseError,
    },

    #[error("resource type registered twice: {0}")]
    DuplicateType(String),

    #[error("{resource_type} includes '{include}' which is not one of its relationships")]
    UnknownInclude {
        resource_type: String,
        include: String,
    },
}

/// Builder for a [`ResourceSchema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    resource_type: String,
    route_param: String,
    sorts: Vec<String>,
    filters: Vec<String>,
    includes: Vec<String>,
    rules: Vec<(String, String)>,
    relationships: Vec<(String, Cardinality, String, Option<String>)>,
    hidden: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SchemaBuilder {
    /// Starts a schema. `route_param` names the record in nested routes.
    pub fn new(resource_type: &str, route_param: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            route_param: route_param.to_string(),
            sorts: Vec::new(),
            filters: Vec::new(),
            includes: Vec::new(),
            rules: Vec::new(),
            relationships: Vec::new(),
            hidden: Vec::new(),
        }
    }

    pub fn sorts(mut self, fields: &[&str]) -> Self {
        self.sorts = owned(fields);
        self
    }

    pub fn filters(mut self, fields: &[&str]) -> Self {
        self.filters = owned(fields);
        self
    }

    pub fn includes(mut self, relationships: &[&str]) -> Self {
        self.includes = owned(relationships);
        self
    }

    /// Adds a create rule; the update rule is the same prefixed with `sometimes`.
    pub fn rule(mut self, field: &str, expression: &str) -> Self {
        self.rules.push((field.to_string(), expression.to_string()));
        self
    }

    /// Declares a to-one relationship stored in the owner's `foreign_key` column.
    pub fn to_one(mut self, name: &str, related_type: &str, foreign_key: &str) -> Self {
        self.relationships.push((
            name.to_string(),
            Cardinality::ToOne,
            related_type.to_string(),
            Some(foreign_key.to_string()),
        ));
        self
    }

    pub fn to_many(mut self, name: &str, related_type: &str) -> Self {
        self.relationships.push((
            name.to_string(),
            Cardinality::ToMany,
            related_type.to_string(),
            None,
        ));
        self
    }

    pub fn hidden(mut self, attributes: &[&str]) -> Self {
        self.hidden = owned(attributes);
        self
    }

    pub fn build(self) -> Result<ResourceSchema, RegistryError> {
        let mut create_rules = Vec::with_capacity(self.rules.len());
        let mut update_rules = Vec::with_capacity(self.rules.len());
        for (field, expression) in &self.rules {
            let invalid = |source| RegistryError::InvalidRule {
                resource_type: self.resource_type.clone(),
                field: field.clone(),
                source,
            };
            let create = FieldRules::parse(field.as_str(), expression).map_err(invalid)?;
            let mut update = create.clone();
            update.rules.insert(0, Rule::Sometimes);
            create_rules.push(create);
            update_rules.push(update);
        }

        let relationships: Vec<RelationshipDef> = self
            .relationships
            .into_iter()
            .map(|(name, cardinality, related_type, foreign_key)| RelationshipDef {
                accessor: name.clone(),
                name,
                cardinality,
                related_type,
                route_param: self.route_param.clone(),
                foreign_key,
            })
            .collect();

        if let Some(include) = self
            .includes
            .iter()
            .find(|i| !relationships.iter().any(|r| &r.name == *i))
        {
            return Err(RegistryError::UnknownInclude {
                resource_type: self.resource_type,
                include: include.clone(),
            });
        }

        Ok(ResourceSchema {
            resource_type: self.resource_type,
            allowed_sorts: self.sorts,
            allowed_filters: self.filters,
            allowed_includes: self.includes,
            create_rules,
            update_rules,
            relationships,
            hidden: self.hidden,
        })
    }
}

/// All registered resource schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: ResourceSchema) -> Result<(), RegistryError> {
        if self.schemas.contains_key(&schema.resource_type) {
            return Err(RegistryError::DuplicateType(schema.resource_type));
        }
        self.schemas.insert(schema.resource_type.clone(), schema);
        Ok(())
    }

    /// Builds the storefront catalogue.
    pub fn storefront() -> Result<Self, RegistryError> {
        let schemas = [
            SchemaBuilder::new("users", "user")
                .sorts(&["name", "email", "created_at", "updated_at"])
                .filters(&["name", "email"])
                .rule("name", "required|string|max:255")
                .rule("email", "required|email|unique")
                .rule("password", "required|string|min:8|max:255|confirmed")
                .hidden(&["password"]),
            SchemaBuilder::new("sellers", "seller")
                .sorts(&["created_at", "updated_at"])
                .filters(&["user_id"])
                .includes(&["shops", "users"])
                .rule("user_id", "required|integer|unique")
                .to_many("shops", "shops")
                .to_one("users", "users", "user_id"),
            SchemaBuilder::new("shops", "shop")
                .sorts(&["name", "created_at", "updated_at"])
                .filters(&["name"])
                .includes(&["sellers", "shop-types", "employees", "products"])
                .rule("name", "required|string|max:50")
                .to_many("sellers", "sellers")
                .to_many("shop-types", "shop-types")
                .to_many("employees", "employees")
                .to_many("products", "products")
                .hidden(&["deleted_at"]),
            SchemaBuilder::new("shop-types", "shop_type")
                .sorts(&["name", "created_at", "updated_at"])
                .filters(&["name"])
                .includes(&["shops"])
                .rule("name", "required|unique|string|max:100")
                .rule("image", "string")
                .rule("description", "string")
                .to_many("shops", "shops"),
            SchemaBuilder::new("brands", "brand")
                .sorts(&["name"])
                .filters(&["name"])
                .rule("name", "required|unique|string|max:100"),
            SchemaBuilder::new("product-units", "product_unit")
                .sorts(&["name"])
                .filters(&["name"])
                .rule("name", "required|unique|string|max:100")
                .rule("multiplier", "integer"),
            SchemaBuilder::new("products", "product")
                .sorts(&["name", "created_at", "updated_at"])
                .filters(&["name", "brand_id", "product_unit_id"])
                .includes(&["brands", "product-units", "shops"])
                .rule("name", "required|string|max:255")
                .rule("model_number", "string")
                .rule("brand_id", "integer")
                .rule("product_unit_id", "integer")
                .to_one("brands", "brands", "brand_id")
                .to_one("product-units", "product-units", "product_unit_id")
                .to_many("shops", "shops"),
            SchemaBuilder::new("employees", "employee")
                .sorts(&["created_at", "updated_at"])
                .filters(&["is_active", "user_id"])
                .includes(&["users", "shops"])
                .rule("user_id", "required|integer")
                .rule("is_active", "boolean")
                .rule("manager_id", "integer")
                .to_one("users", "users", "user_id")
                .to_many("shops", "shops"),
            SchemaBuilder::new("transactions", "transaction")
                .sorts(&["created_at", "updated_at"])
                .filters(&["shop_id", "employee_id", "user_id"])
                .includes(&["shops", "employees", "users"])
                .rule("shop_id", "required|integer")
                .rule("employee_id", "integer")
                .rule("user_id", "integer")
                .to_one("shops", "shops", "shop_id")
                .to_one("employees", "employees", "employee_id")
                .to_one("users", "users", "user_id"),
        ];

        let mut registry = Self::new();
        for builder in schemas {
            registry.register(builder.build()?)?;
        }
        Ok(registry)
    }

    /// Looks up a schema.
    pub fn get(&self, resource_type: &str) -> JsonApiResult<&ResourceSchema> {
        self.schemas
            .get(resource_type)
            .ok_or_else(|| JsonApiError::UnknownResourceType(resource_type.to_string()))
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.schemas.contains_key(resource_type)
    }

    /// Looks up a relationship of a resource type.
    pub fn relationship(
        &self,
        resource_type: &str,
        name: &str,
    ) -> JsonApiResult<&RelationshipDef> {
        self.get(resource_type)?
            .relationship(name)
            .ok_or_else(|| JsonApiError::UnregisteredRelationship {
                resource_type: resource_type.to_string(),
                relationship: name.to_string(),
            })
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storefront_registry_builds() {
        let registry = SchemaRegistry::storefront().unwrap();
        assert_eq!(registry.resource_types().len(), 9);
        assert!(registry.contains("shop-types"));
        assert!(!registry.contains("orders"));
    }

    #[test]
    fn test_unknown_type() {
        let registry = SchemaRegistry::storefront().unwrap();
        assert!(matches!(
            registry.get("orders"),
            Err(JsonApiError::UnknownResourceType(_))
        ));
    }

    #[test]
    fn test_relationship_lookup() {
        let registry = SchemaRegistry::storefront().unwrap();
        let users = registry.relationship("sellers", "users").unwrap();
        assert_eq!(users.cardinality, Cardinality::ToOne);
        assert_eq!(users.route_param, "seller");
        assert_eq!(users.foreign_key.as_deref(), Some("user_id"));
        let shops = registry.relationship("sellers", "shops").unwrap();
        assert_eq!(shops.foreign_key, None);
        assert!(matches!(
            registry.relationship("brands", "shops"),
            Err(JsonApiError::UnregisteredRelationship { .. })
        ));
    }

    #[test]
    fn test_update_rules_are_sometimes() {
        let registry = SchemaRegistry::storefront().unwrap();
        let shops = registry.get("shops").unwrap();
        assert_eq!(shops.create_rules[0].rules[0], Rule::Required);
        assert_eq!(shops.update_rules[0].rules[0], Rule::Sometimes);
        assert_eq!(shops.update_rules[0].rules[1], Rule::Required);
    }

    #[test]
    fn test_writable_attributes() {
        let registry = SchemaRegistry::storefront().unwrap();
        let users = registry.get("users").unwrap();
        let writable: Vec<_> = users.writable_attributes(false).collect();
        assert_eq!(writable, ["name", "email", "password"]);
        assert!(users.is_hidden("password"));
    }

    #[test]
    fn test_invalid_rule_is_startup_error() {
        let err = SchemaBuilder::new("widgets", "widget")
            .rule("name", "required|strng")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRule { .. }));
        assert!(err.to_string().contains("widgets.name"));
    }

    #[test]
    fn test_include_must_be_relationship() {
        let err = SchemaBuilder::new("widgets", "widget")
            .includes(&["parts"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownInclude { .. }));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(SchemaBuilder::new("brands", "brand").build().unwrap())
            .unwrap();
        let err = registry
            .register(SchemaBuilder::new("brands", "brand").build().unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType(_)));
    }
}
