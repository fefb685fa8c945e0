//! Resource operation façade.
//!
//! [`JsonApiService`] is the single entry point the transport calls. Each
//! operation resolves the schema, interprets query parameters, validates the
//! request document, talks to storage and renders the response document.

use std::sync::Arc;

use serde_json::{Map, Value};
use storefront_persistence::core::ResourceStorage;
use storefront_persistence::error::{ResourceError, StorageError, ValidationError};
use storefront_persistence::types::StoredRecord;

use crate::document::{Document, DocumentBuilder, PageInfo};
use crate::error::{ErrorObject, JsonApiError, JsonApiResult};
use crate::mutator::RelationshipMutator;
use crate::query::{PageLimits, QueryPlan};
use crate::registry::{RelationshipDef, ResourceSchema, SchemaRegistry};
use crate::validation::{FieldRules, Rule, UniqueScope, Validator, lookup};

/// Raw query string pairs, in request order.
pub type QueryPairs = [(String, String)];

/// Settings of the façade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonApiConfig {
    /// Absolute API root used in links, including any route prefix.
    pub base_url: String,
    pub page_limits: PageLimits,
}

impl Default for JsonApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            page_limits: PageLimits::default(),
        }
    }
}

/// A freshly created resource.
#[derive(Debug, Clone)]
pub struct Created {
    pub document: Document,
    /// Absolute URL of the new resource.
    pub location: String,
}

fn rules(path: &str, rules: Vec<Rule>) -> FieldRules {
    FieldRules::new(path, rules)
}

/// Rules every create or update document must satisfy before the schema's
/// attribute rules run.
fn document_rules(resource_type: &str, update_id: Option<&str>) -> Vec<FieldRules> {
    let mut fields = vec![
        rules("data", vec![Rule::Required, Rule::Array]),
        rules(
            "data.type",
            vec![Rule::Required, Rule::In(vec![resource_type.to_string()])],
        ),
    ];
    match update_id {
        None => fields.push(rules("data.attributes", vec![Rule::Required, Rule::Array])),
        Some(id) => {
            fields.push(rules(
                "data.attributes",
                vec![Rule::Sometimes, Rule::Required, Rule::Array],
            ));
            fields.push(rules(
                "data.id",
                vec![Rule::Required, Rule::String, Rule::In(vec![id.to_string()])],
            ));
        }
    }
    fields
}

fn to_one_rules(related_type: &str) -> Vec<FieldRules> {
    vec![
        rules("data", vec![Rule::Required, Rule::Array]),
        rules("data.id", vec![Rule::Required, Rule::Identifier]),
        rules(
            "data.type",
            vec![Rule::Required, Rule::In(vec![related_type.to_string()])],
        ),
    ]
}

fn to_many_rules(related_type: &str) -> Vec<FieldRules> {
    vec![
        rules("data", vec![Rule::Present, Rule::List]),
        rules("data.*.id", vec![Rule::Required, Rule::Identifier]),
        rules(
            "data.*.type",
            vec![Rule::Required, Rule::In(vec![related_type.to_string()])],
        ),
    ]
}

/// The owner column of a to-one relationship, when the owner's rules make it unique.
fn unique_foreign_key<'a>(schema: &ResourceSchema, relationship: &'a RelationshipDef) -> Option<&'a str> {
    let column = relationship.foreign_key.as_deref()?;
    schema
        .create_rules
        .iter()
        .any(|field| field.path == column && field.rules.contains(&Rule::Unique))
        .then_some(column)
}

/// Identifier value as a string. Integers are accepted.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// An attribute the store could not hold becomes a field error on that attribute.
fn attribute_error(err: StorageError) -> JsonApiError {
    match err {
        StorageError::Validation(ValidationError::InvalidValue { column, .. }) => {
            let path = format!("data.attributes.{}", column);
            let details = format!("The {} is invalid.", path.replace('_', " "));
            JsonApiError::Validation(vec![ErrorObject::field(&path, details)])
        }
        other => other.into(),
    }
}

/// A filter value the column cannot compare against is a bad query parameter.
fn filter_error(plan: &QueryPlan, err: StorageError) -> JsonApiError {
    match err {
        StorageError::Validation(ValidationError::InvalidValue { column, .. }) => {
            JsonApiError::InvalidQuery(vec![ErrorObject::parameter(
                plan.filter_parameter(&column),
                format!("Filter value for `{}` does not match the field type.", column),
            )])
        }
        other => other.into(),
    }
}

/// The attributes of `body` the schema allows writing, in request order.
fn writable_attributes(body: &Value, schema: &ResourceSchema, update: bool) -> Map<String, Value> {
    let Some(attributes) = lookup(body, "data.attributes").and_then(Value::as_object) else {
        return Map::new();
    };
    let writable: Vec<&str> = schema.writable_attributes(update).collect();
    attributes
        .iter()
        .filter(|(name, _)| writable.contains(&name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// The JSON:API engine over a storage backend.
pub struct JsonApiService<S: ?Sized> {
    storage: Arc<S>,
    registry: Arc<SchemaRegistry>,
    config: JsonApiConfig,
}

impl<S: ?Sized> Clone for JsonApiService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl<S> JsonApiService<S>
where
    S: ResourceStorage + ?Sized,
{
    pub fn new(storage: Arc<S>, registry: Arc<SchemaRegistry>, config: JsonApiConfig) -> Self {
        Self {
            storage,
            registry,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &JsonApiConfig {
        &self.config
    }

    fn builder(&self) -> DocumentBuilder<'_, S> {
        DocumentBuilder::new(&*self.storage, &self.registry, &self.config.base_url)
    }

    fn parse_query(&self, schema: &ResourceSchema, query: &QueryPairs) -> JsonApiResult<QueryPlan> {
        QueryPlan::parse(query, schema, &self.registry, self.config.page_limits)
    }

    async fn find(&self, resource_type: &str, id: &str) -> JsonApiResult<StoredRecord> {
        self.storage
            .find(resource_type, id)
            .await?
            .ok_or_else(|| JsonApiError::not_found(resource_type, id))
    }

    async fn validate(
        &self,
        body: &Value,
        scope: UniqueScope<'_>,
        fields: &[FieldRules],
    ) -> JsonApiResult<()> {
        let errors = Validator::new(&*self.storage, scope)
            .validate(body, fields)
            .await?;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(JsonApiError::Validation(errors))
        }
    }

    /// `GET /{type}/{id}`
    pub async fn fetch_resource(
        &self,
        resource_type: &str,
        id: &str,
        query: &QueryPairs,
    ) -> JsonApiResult<Document> {
        let schema = self.registry.get(resource_type)?;
        let plan = self.parse_query(schema, query)?;
        let record = self.find(resource_type, id).await?;
        self.builder()
            .build_single(&record, &plan.include, &plan.fields)
            .await
    }

    /// `GET /{type}`
    pub async fn fetch_resources(
        &self,
        resource_type: &str,
        query: &QueryPairs,
    ) -> JsonApiResult<Document> {
        let schema = self.registry.get(resource_type)?;
        let plan = self.parse_query(schema, query)?;
        let page = self
            .storage
            .list(resource_type, &plan.to_list_query())
            .await
            .map_err(|err| filter_error(&plan, err))?;
        let info = plan.page.map(|request| PageInfo {
            request,
            total: page.total,
        });
        self.builder()
            .build_collection(resource_type, &page.records, &plan.include, &plan.fields, info)
            .await
    }

    /// `POST /{type}`
    pub async fn create_resource(&self, resource_type: &str, body: &Value) -> JsonApiResult<Created> {
        let schema = self.registry.get(resource_type)?;

        let mut fields = document_rules(resource_type, None);
        fields.extend(schema.create_rules.iter().map(|r| r.prefixed("data.attributes")));
        let scope = UniqueScope {
            resource_type,
            except_id: None,
        };
        self.validate(body, scope, &fields).await?;

        let record = self
            .storage
            .create(resource_type, writable_attributes(body, schema, false))
            .await
            .map_err(attribute_error)?;
        tracing::debug!(resource_type = %resource_type, id = %record.id(), "Created resource");

        let document = self.builder().build_single(&record, &[], &Default::default()).await?;
        let location = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            record.url()
        );
        Ok(Created { document, location })
    }

    /// `PATCH /{type}/{id}`. A missing record is reported before any
    /// validation error.
    pub async fn update_resource(
        &self,
        resource_type: &str,
        id: &str,
        body: &Value,
    ) -> JsonApiResult<Document> {
        let schema = self.registry.get(resource_type)?;
        let current = self.find(resource_type, id).await?;

        let mut fields = document_rules(resource_type, Some(id));
        fields.extend(schema.update_rules.iter().map(|r| r.prefixed("data.attributes")));
        let scope = UniqueScope {
            resource_type,
            except_id: Some(id),
        };
        self.validate(body, scope, &fields).await?;

        let record = self
            .storage
            .update(&current, writable_attributes(body, schema, true))
            .await
            .map_err(attribute_error)?;
        tracing::debug!(resource_type = %resource_type, id = %id, "Updated resource");

        self.builder().build_single(&record, &[], &Default::default()).await
    }

    /// `DELETE /{type}/{id}`
    pub async fn delete_resource(&self, resource_type: &str, id: &str) -> JsonApiResult<()> {
        self.registry.get(resource_type)?;
        let current = self.find(resource_type, id).await?;
        self.storage.delete(&current).await?;
        tracing::debug!(resource_type = %resource_type, id = %id, "Deleted resource");
        Ok(())
    }

    /// Restores a soft-deleted record together with everything its delete
    /// cascaded to. Records that are not deleted are not found.
    pub async fn restore_resource(&self, resource_type: &str, id: &str) -> JsonApiResult<Document> {
        self.registry.get(resource_type)?;
        let record = match self.storage.restore(resource_type, id).await {
            Ok(record) => record,
            Err(StorageError::Resource(ResourceError::NotDeleted { .. })) => {
                return Err(JsonApiError::not_found(resource_type, id));
            }
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(resource_type = %resource_type, id = %id, "Restored resource");
        self.builder().build_single(&record, &[], &Default::default()).await
    }

    /// `GET /{type}/{id}/{rel}`. Only `fields` applies to related resources.
    pub async fn fetch_related(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        query: &QueryPairs,
    ) -> JsonApiResult<Document> {
        let relationship = self.registry.relationship(resource_type, relationship)?;
        let related_schema = self.registry.get(&relationship.related_type)?;
        let plan = self.parse_query(related_schema, query)?;
        let owner = self.find(resource_type, id).await?;
        self.builder()
            .build_related_document(&owner, relationship, &plan.fields)
            .await
    }

    /// `GET /{type}/{id}/relationships/{rel}`
    pub async fn fetch_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
    ) -> JsonApiResult<Document> {
        let relationship = self.registry.relationship(resource_type, relationship)?;
        let owner = self.find(resource_type, id).await?;
        self.builder()
            .build_relationship_document(&owner, relationship)
            .await
    }

    async fn relationship_owner(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
    ) -> JsonApiResult<(StoredRecord, &RelationshipDef)> {
        let relationship = self.registry.relationship(resource_type, relationship)?;
        let owner = self.find(resource_type, id).await?;
        Ok((owner, relationship))
    }

    /// `PATCH /{type}/{id}/relationships/{rel}` on a to-one relationship.
    ///
    /// A foreign key the owner declares `unique` may not point at a record
    /// another owner already points at.
    pub async fn update_to_one_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &Value,
    ) -> JsonApiResult<()> {
        let (owner, relationship) = self.relationship_owner(resource_type, id, relationship).await?;
        let scope = UniqueScope {
            resource_type: &relationship.related_type,
            except_id: None,
        };
        self.validate(body, scope, &to_one_rules(&relationship.related_type))
            .await?;

        let Some(target) = lookup(body, "data.id").and_then(identifier) else {
            return Err(JsonApiError::Validation(vec![ErrorObject::field(
                "data.id",
                "The data.id field is required.",
            )]));
        };

        let schema = self.registry.get(resource_type)?;
        if let Some(column) = unique_foreign_key(schema, relationship) {
            let taken = self
                .storage
                .is_taken(resource_type, column, &Value::String(target.clone()), Some(owner.id()))
                .await?;
            if taken {
                return Err(JsonApiError::Validation(vec![ErrorObject::field(
                    "data.id",
                    "The data.id has already been taken.",
                )]));
            }
        }

        RelationshipMutator::new(&*self.storage)
            .update_to_one(&owner, relationship, &target)
            .await
    }

    /// `PATCH /{type}/{id}/relationships/{rel}` on a to-many relationship:
    /// the payload replaces the full link set.
    pub async fn update_to_many_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &Value,
    ) -> JsonApiResult<()> {
        let (owner, relationship) = self.relationship_owner(resource_type, id, relationship).await?;
        let scope = UniqueScope {
            resource_type: &relationship.related_type,
            except_id: None,
        };
        self.validate(body, scope, &to_many_rules(&relationship.related_type))
            .await?;

        let targets: Vec<String> = lookup(body, "data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("id").and_then(identifier))
                    .collect()
            })
            .unwrap_or_default();
        RelationshipMutator::new(&*self.storage)
            .update_to_many(&owner, relationship, &targets)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_rules_for_update() {
        let fields = document_rules("shops", Some("4"));
        let paths: Vec<_> = fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["data", "data.type", "data.attributes", "data.id"]);
        assert_eq!(fields[2].rules[0], Rule::Sometimes);
    }

    #[test]
    fn test_identifier_accepts_integers() {
        assert_eq!(identifier(&json!("3")), Some("3".to_string()));
        assert_eq!(identifier(&json!(3)), Some("3".to_string()));
        assert_eq!(identifier(&json!(null)), None);
    }

    #[test]
    fn test_writable_attributes_filters_unknown_keys() {
        let registry = SchemaRegistry::storefront().unwrap();
        let schema = registry.get("users").unwrap();
        let body = json!({"data": {"attributes": {
            "name": "Ann",
            "is_admin": true,
            "password": "secret123",
            "password_confirmation": "secret123"
        }}});
        let attributes = writable_attributes(&body, schema, false);
        let keys: Vec<_> = attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "password"]);
    }

    #[test]
    fn test_unique_foreign_key() {
        let registry = SchemaRegistry::storefront().unwrap();
        let sellers = registry.get("sellers").unwrap();
        let users = sellers.relationship("users").unwrap();
        assert_eq!(unique_foreign_key(sellers, users), Some("user_id"));
        assert_eq!(unique_foreign_key(sellers, sellers.relationship("shops").unwrap()), None);

        let employees = registry.get("employees").unwrap();
        let users = employees.relationship("users").unwrap();
        assert_eq!(unique_foreign_key(employees, users), None);
    }

    #[test]
    fn test_invalid_value_maps_to_client_errors() {
        let invalid = || {
            StorageError::from(ValidationError::InvalidValue {
                column: "user_id".to_string(),
                message: "'abc' is not an integer".to_string(),
            })
        };

        let err = attribute_error(invalid());
        assert_eq!(err.status_code(), 422);
        let objects = err.error_objects();
        assert_eq!(objects[0].pointer(), Some("/data/attributes/user_id"));
        assert_eq!(objects[0].details, "The data.attributes.user id is invalid.");

        let registry = SchemaRegistry::storefront().unwrap();
        let query = [("filter[user_id]".to_string(), "abc".to_string())];
        let plan =
            QueryPlan::parse(&query, registry.get("sellers").unwrap(), &registry, PageLimits::default())
                .unwrap();
        let err = filter_error(&plan, invalid());
        assert_eq!(err.status_code(), 400);
        let source = err.error_objects()[0].source.clone().unwrap();
        assert_eq!(source.parameter.as_deref(), Some("filter[user_id]"));
    }

    #[test]
    fn test_config_default() {
        let config = JsonApiConfig::default();
        assert_eq!(config.page_limits.default_size, 15);
        assert!(config.base_url.ends_with("/api/v1"));
    }
}
