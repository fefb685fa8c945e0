//! Relationship updates.
//!
//! To-one updates point the owner's foreign key at a new target. To-many
//! updates replace the full link set; the storage applies them in one
//! transaction, so a missing target leaves the existing links unchanged.

use storefront_persistence::core::ResourceStorage;
use storefront_persistence::types::StoredRecord;

use crate::error::{JsonApiError, JsonApiResult};
use crate::registry::{Cardinality, RelationshipDef};

pub struct RelationshipMutator<'a, S: ?Sized> {
    storage: &'a S,
}

impl<'a, S> RelationshipMutator<'a, S>
where
    S: ResourceStorage + ?Sized,
{
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Points a to-one relationship at `target_id`.
    pub async fn update_to_one(
        &self,
        owner: &StoredRecord,
        relationship: &RelationshipDef,
        target_id: &str,
    ) -> JsonApiResult<()> {
        expect_cardinality(owner, relationship, Cardinality::ToOne)?;
        self.storage
            .set_to_one(owner, &relationship.accessor, Some(target_id))
            .await?;
        tracing::debug!(
            resource_type = %owner.resource_type(),
            id = %owner.id(),
            relationship = %relationship.name,
            target = %target_id,
            "Updated to-one relationship"
        );
        Ok(())
    }

    /// Replaces the members of a to-many relationship with `target_ids`.
    /// Duplicate ids collapse; an empty list detaches everything.
    pub async fn update_to_many(
        &self,
        owner: &StoredRecord,
        relationship: &RelationshipDef,
        target_ids: &[String],
    ) -> JsonApiResult<()> {
        expect_cardinality(owner, relationship, Cardinality::ToMany)?;

        let mut unique: Vec<String> = Vec::with_capacity(target_ids.len());
        for id in target_ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        self.storage
            .sync_to_many(owner, &relationship.accessor, &unique)
            .await?;
        tracing::debug!(
            resource_type = %owner.resource_type(),
            id = %owner.id(),
            relationship = %relationship.name,
            count = unique.len(),
            "Synced to-many relationship"
        );
        Ok(())
    }
}

fn expect_cardinality(
    owner: &StoredRecord,
    relationship: &RelationshipDef,
    expected: Cardinality,
) -> JsonApiResult<()> {
    if relationship.cardinality == expected {
        Ok(())
    } else {
        Err(JsonApiError::CardinalityMismatch {
            resource_type: owner.resource_type().to_string(),
            relationship: relationship.name.clone(),
            expected,
            actual: relationship.cardinality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::{Map, json};
    use storefront_persistence::backends::sqlite::SqliteBackend;

    fn seller() -> StoredRecord {
        StoredRecord::new("sellers", "1", Map::new())
    }

    #[test]
    fn test_cardinality_check() {
        let registry = SchemaRegistry::storefront().unwrap();
        let shops = registry.relationship("sellers", "shops").unwrap();
        assert!(expect_cardinality(&seller(), shops, Cardinality::ToMany).is_ok());

        let err = expect_cardinality(&seller(), shops, Cardinality::ToOne).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(
            err.to_string(),
            "relationship 'shops' on sellers is to-many, not to-one"
        );
    }

    #[test]
    fn test_to_many_duplicates_collapse() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let registry = SchemaRegistry::storefront().unwrap();
        let shops = registry.relationship("sellers", "shops").unwrap();

        tokio_test::block_on(async {
            let seller = backend
                .create("sellers", json!({"user_id": 1}).as_object().cloned().unwrap())
                .await
                .unwrap();
            for name in ["A", "B"] {
                backend
                    .create("shops", json!({"name": name}).as_object().cloned().unwrap())
                    .await
                    .unwrap();
            }

            let ids = ["2".to_string(), "1".to_string(), "2".to_string()];
            RelationshipMutator::new(&backend)
                .update_to_many(&seller, shops, &ids)
                .await
                .unwrap();

            let related = backend.related(&seller, "shops").await.unwrap();
            let related: Vec<_> = related.iter().map(|r| r.id()).collect();
            assert_eq!(related, ["1", "2"]);
        });
    }
}
