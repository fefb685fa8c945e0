//! Core resource storage trait.
//!
//! This module defines the [`ResourceStorage`] trait, which provides the CRUD
//! and relationship operations the JSON:API layer is built on.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ResourceError, StorageError, StorageResult};
use crate::types::{ListQuery, RecordPage, StoredRecord};

/// Core storage trait for storefront records.
///
/// # Soft Deletes
///
/// Tables that carry a `deleted_at` column are soft-deleted: `delete` stamps
/// the column and the row disappears from `find`, `list`, `related` and from
/// relationship target resolution. Soft deletes cascade into the relations
/// the table declares as cascading, and `restore` undoes the cascade.
/// Tables without the column are deleted outright.
///
/// # Atomicity
///
/// `sync_to_many`, `delete` and `restore` run inside a single transaction.
/// When any target of a sync cannot be resolved, nothing is written.
///
/// # Example
///
/// ```ignore
/// use storefront_persistence::core::ResourceStorage;
/// use serde_json::{json, Map};
///
/// async fn example<S: ResourceStorage>(storage: &S) -> StorageResult<()> {
///     let mut attributes = Map::new();
///     attributes.insert("name".to_string(), json!("Corner Store"));
///     let shop = storage.create("shops", attributes).await?;
///
///     storage
///         .sync_to_many(&shop, "sellers", &["1".to_string(), "2".to_string()])
///         .await?;
///     let sellers = storage.related(&shop, "sellers").await?;
///     assert_eq!(sellers.len(), 2);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Reads a non-deleted record by type and id.
    async fn find(&self, resource_type: &str, id: &str) -> StorageResult<Option<StoredRecord>>;

    /// Reads a record, failing with `ResourceError::NotFound` when absent.
    async fn find_or_fail(&self, resource_type: &str, id: &str) -> StorageResult<StoredRecord> {
        self.find(resource_type, id).await?.ok_or_else(|| {
            StorageError::Resource(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })
    }

    /// Lists non-deleted records matching the query.
    ///
    /// Sort directives are applied in order with the primary key ascending as
    /// the final tiebreak. `RecordPage::total` counts all matches, ignoring the
    /// page window.
    async fn list(&self, resource_type: &str, query: &ListQuery) -> StorageResult<RecordPage>;

    /// Inserts a record. Timestamps are set when the table carries them.
    ///
    /// Keys that are not columns of the table are ignored.
    async fn create(
        &self,
        resource_type: &str,
        attributes: Map<String, Value>,
    ) -> StorageResult<StoredRecord>;

    /// Updates the given columns of an existing record and refreshes `updated_at`.
    ///
    /// Keys that are not columns of the table are ignored.
    async fn update(
        &self,
        current: &StoredRecord,
        attributes: Map<String, Value>,
    ) -> StorageResult<StoredRecord>;

    /// Deletes a record (soft or hard depending on the table), cascading
    /// soft deletes with one shared `deleted_at` value.
    async fn delete(&self, current: &StoredRecord) -> StorageResult<()>;

    /// Restores a soft-deleted record and every cascade child deleted with it.
    async fn restore(&self, resource_type: &str, id: &str) -> StorageResult<StoredRecord>;

    /// Returns the non-deleted records reachable through a relation, ordered by id.
    async fn related(&self, owner: &StoredRecord, relation: &str)
    -> StorageResult<Vec<StoredRecord>>;

    /// Points a belongs-to relation at `target_id`, or clears it with `None`.
    async fn set_to_one(
        &self,
        owner: &StoredRecord,
        relation: &str,
        target_id: Option<&str>,
    ) -> StorageResult<()>;

    /// Replaces the link set of a belongs-to-many relation.
    ///
    /// Links to ids not in `target_ids` are removed, missing links are added
    /// (pivot timestamps are set on insert only) and shared links are left
    /// untouched. Duplicate ids collapse.
    async fn sync_to_many(
        &self,
        owner: &StoredRecord,
        relation: &str,
        target_ids: &[String],
    ) -> StorageResult<()>;

    /// Returns true if another row (optionally excluding `except_id`) already
    /// holds `value` in `column`.
    async fn is_taken(
        &self,
        resource_type: &str,
        column: &str,
        value: &Value,
        except_id: Option<&str>,
    ) -> StorageResult<bool>;
}
