//! ResourceStorage implementation for SQLite.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};

use crate::catalog::{RelationDef, RelationKind, TableDef};
use crate::core::ResourceStorage;
use crate::error::{BackendError, ResourceError, StorageError, StorageResult, ValidationError};
use crate::types::{ListQuery, RecordPage, StoredRecord};

use super::SqliteBackend;
use super::query::{
    now_timestamp, order_clause, parse_id, row_to_record, select_list, to_sql, where_clause,
};

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn not_found(resource_type: &str, id: &str) -> StorageError {
    StorageError::Resource(ResourceError::NotFound {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
    })
}

fn kind_mismatch(table: &TableDef, relation: &RelationDef, expected: &'static str) -> StorageError {
    StorageError::Validation(ValidationError::RelationKindMismatch {
        resource_type: table.resource_type.to_string(),
        relation: relation.name.to_string(),
        expected,
    })
}

impl SqliteBackend {
    /// Reads a row by id. Soft-deleted rows are skipped unless `with_deleted`.
    fn find_in(
        &self,
        conn: &Connection,
        table: &TableDef,
        id: i64,
        with_deleted: bool,
    ) -> StorageResult<Option<StoredRecord>> {
        let deleted = if table.soft_deletes && !with_deleted {
            " AND deleted_at IS NULL"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1{}",
            select_list(table, None),
            table.table,
            deleted
        );
        conn.query_row(&sql, [id], |row| row_to_record(table, row))
            .optional()
            .map_err(|e| internal_error(format!("Failed to read {}/{}: {}", table.resource_type, id, e)))
    }

    /// Returns true if a non-deleted row with this id exists.
    fn exists_in(&self, conn: &Connection, table: &TableDef, id: i64) -> StorageResult<bool> {
        let deleted = if table.soft_deletes {
            " AND deleted_at IS NULL"
        } else {
            ""
        };
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1{}", table.table, deleted);
        conn.query_row(&sql, [id], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| internal_error(format!("Failed to probe {}: {}", table.table, e)))
    }

    /// Resolves a relation target, failing with `NotFound` for unknown or deleted ids.
    fn resolve_target(&self, conn: &Connection, related: &TableDef, id: &str) -> StorageResult<i64> {
        match parse_id(id) {
            Some(rowid) if self.exists_in(conn, related, rowid)? => Ok(rowid),
            _ => Err(not_found(related.resource_type, id)),
        }
    }

    /// Converts attributes into `(column, value)` pairs, skipping unknown keys.
    fn writable_columns(
        &self,
        table: &TableDef,
        attributes: &Map<String, Value>,
    ) -> StorageResult<Vec<(&'static str, SqlValue)>> {
        let mut pairs = Vec::new();
        for column in &table.columns {
            if matches!(column.name, "created_at" | "updated_at" | "deleted_at") {
                continue;
            }
            if let Some(value) = attributes.get(column.name) {
                pairs.push((column.name, to_sql(column.name, column.kind, value)?));
            }
        }
        Ok(pairs)
    }

    /// Ids linked to `owner_id` through a join table, optionally limited by
    /// the related rows' `deleted_at`.
    fn pivot_targets(
        &self,
        conn: &Connection,
        relation: &RelationDef,
        related: &TableDef,
        owner_id: i64,
        deleted_at: DeletedState<'_>,
    ) -> StorageResult<Vec<i64>> {
        let RelationKind::BelongsToMany {
            pivot,
            owner_key,
            related_key,
            ..
        } = &relation.kind
        else {
            return Ok(Vec::new());
        };

        let mut sql = format!(
            "SELECT r.id FROM {related} r JOIN {pivot} p ON p.{related_key} = r.id WHERE p.{owner_key} = ?1",
            related = related.table,
        );
        let mut args: Vec<SqlValue> = vec![SqlValue::Integer(owner_id)];
        if related.soft_deletes {
            match deleted_at {
                DeletedState::Live => sql.push_str(" AND r.deleted_at IS NULL"),
                DeletedState::At(stamp) => {
                    sql.push_str(" AND r.deleted_at = ?2");
                    args.push(SqlValue::Text(stamp.to_string()));
                }
            }
        }
        sql.push_str(" ORDER BY r.id");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare pivot query: {}", e)))?;
        let ids = stmt
            .query_map(params_from_iter(args), |row| row.get::<_, i64>(0))
            .map_err(|e| internal_error(format!("Failed to query {}: {}", pivot, e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read {}: {}", pivot, e)))?;
        Ok(ids)
    }

    /// Stamps `deleted_at` on every live cascade child of the row, recursively.
    fn cascade_soft_delete(
        &self,
        conn: &Connection,
        table: &TableDef,
        id: i64,
        stamp: &str,
    ) -> StorageResult<()> {
        for name in &table.cascades {
            let relation = table.relation(name)?;
            let related = self.catalog().table(relation.related)?;
            if !related.soft_deletes {
                continue;
            }
            let children =
                self.pivot_targets(conn, relation, related, id, DeletedState::Live)?;
            for child in children {
                conn.execute(
                    &format!(
                        "UPDATE {} SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                        related.table
                    ),
                    params![stamp, child],
                )
                .map_err(|e| internal_error(format!("Failed to cascade delete: {}", e)))?;
                tracing::debug!(
                    parent = %format!("{}/{}", table.resource_type, id),
                    child = %format!("{}/{}", related.resource_type, child),
                    "Cascaded soft delete"
                );
                self.cascade_soft_delete(conn, related, child, stamp)?;
            }
        }
        Ok(())
    }

    /// Clears `deleted_at` on every cascade child that carries `stamp`, recursively.
    fn cascade_restore(
        &self,
        conn: &Connection,
        table: &TableDef,
        id: i64,
        stamp: &str,
    ) -> StorageResult<()> {
        for name in &table.cascades {
            let relation = table.relation(name)?;
            let related = self.catalog().table(relation.related)?;
            if !related.soft_deletes {
                continue;
            }
            let children =
                self.pivot_targets(conn, relation, related, id, DeletedState::At(stamp))?;
            for child in children {
                conn.execute(
                    &format!(
                        "UPDATE {} SET deleted_at = NULL WHERE id = ?1",
                        related.table
                    ),
                    [child],
                )
                .map_err(|e| internal_error(format!("Failed to cascade restore: {}", e)))?;
                self.cascade_restore(conn, related, child, stamp)?;
            }
        }
        Ok(())
    }
}

/// Which related rows a pivot lookup returns.
#[derive(Clone, Copy)]
enum DeletedState<'a> {
    Live,
    At(&'a str),
}

#[async_trait]
impl ResourceStorage for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn find(&self, resource_type: &str, id: &str) -> StorageResult<Option<StoredRecord>> {
        let table = self.catalog().table(resource_type)?;
        let Some(rowid) = parse_id(id) else {
            return Ok(None);
        };
        let conn = self.get_connection()?;
        self.find_in(&conn, table, rowid, false)
    }

    async fn list(&self, resource_type: &str, query: &ListQuery) -> StorageResult<RecordPage> {
        let table = self.catalog().table(resource_type)?;
        let (filter_sql, mut args) = where_clause(table, query)?;
        let order_sql = order_clause(table, query)?;
        let conn = self.get_connection()?;

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table.table, filter_sql);
        let total: i64 = conn
            .query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed to count {}: {}", table.table, e)))?;

        let mut sql = format!(
            "SELECT {} FROM {}{}{}",
            select_list(table, None),
            table.table,
            filter_sql,
            order_sql
        );
        if let Some(window) = query.page {
            args.push(SqlValue::Integer(window.limit as i64));
            args.push(SqlValue::Integer(window.offset as i64));
            sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", args.len() - 1, args.len()));
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare list query: {}", e)))?;
        let records = stmt
            .query_map(params_from_iter(args.iter()), |row| row_to_record(table, row))
            .map_err(|e| internal_error(format!("Failed to list {}: {}", table.table, e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read {} row: {}", table.table, e)))?;

        tracing::debug!(
            resource_type = %resource_type,
            total = total,
            returned = records.len(),
            "Listed records"
        );

        Ok(RecordPage {
            records,
            total: total as usize,
        })
    }

    async fn create(
        &self,
        resource_type: &str,
        attributes: Map<String, Value>,
    ) -> StorageResult<StoredRecord> {
        let table = self.catalog().table(resource_type)?;
        let mut pairs = self.writable_columns(table, &attributes)?;
        if table.timestamps {
            let now = now_timestamp();
            pairs.push(("created_at", SqlValue::Text(now.clone())));
            pairs.push(("updated_at", SqlValue::Text(now)));
        }

        let sql = if pairs.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table.table)
        } else {
            let columns: Vec<&str> = pairs.iter().map(|(c, _)| *c).collect();
            let placeholders: Vec<String> = (1..=pairs.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let conn = self.get_connection()?;
        conn.execute(&sql, params_from_iter(pairs.into_iter().map(|(_, v)| v)))
            .map_err(|e| internal_error(format!("Failed to insert {}: {}", resource_type, e)))?;
        let id = conn.last_insert_rowid();

        tracing::debug!(resource_type = %resource_type, id = id, "Created record");

        self.find_in(&conn, table, id, true)?
            .ok_or_else(|| internal_error(format!("Inserted {}/{} could not be read", resource_type, id)))
    }

    async fn update(
        &self,
        current: &StoredRecord,
        attributes: Map<String, Value>,
    ) -> StorageResult<StoredRecord> {
        let table = self.catalog().table(current.resource_type())?;
        let id = parse_id(current.id())
            .ok_or_else(|| not_found(current.resource_type(), current.id()))?;
        let mut pairs = self.writable_columns(table, &attributes)?;
        let conn = self.get_connection()?;

        if !pairs.is_empty() {
            if table.timestamps {
                pairs.push(("updated_at", SqlValue::Text(now_timestamp())));
            }
            let assignments: Vec<String> = pairs
                .iter()
                .enumerate()
                .map(|(i, (c, _))| format!("{} = ?{}", c, i + 1))
                .collect();
            let deleted = if table.soft_deletes {
                " AND deleted_at IS NULL"
            } else {
                ""
            };
            let sql = format!(
                "UPDATE {} SET {} WHERE id = ?{}{}",
                table.table,
                assignments.join(", "),
                pairs.len() + 1,
                deleted
            );
            let mut args: Vec<SqlValue> = pairs.into_iter().map(|(_, v)| v).collect();
            args.push(SqlValue::Integer(id));

            let changed = conn
                .execute(&sql, params_from_iter(args))
                .map_err(|e| internal_error(format!("Failed to update {}: {}", current.url(), e)))?;
            if changed == 0 {
                return Err(not_found(current.resource_type(), current.id()));
            }
        }

        self.find_in(&conn, table, id, false)?
            .ok_or_else(|| not_found(current.resource_type(), current.id()))
    }

    async fn delete(&self, current: &StoredRecord) -> StorageResult<()> {
        let table = self.catalog().table(current.resource_type())?;
        let id = parse_id(current.id())
            .ok_or_else(|| not_found(current.resource_type(), current.id()))?;
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        if table.soft_deletes {
            let stamp = now_timestamp();
            let changed = tx
                .execute(
                    &format!(
                        "UPDATE {} SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                        table.table
                    ),
                    params![stamp, id],
                )
                .map_err(|e| internal_error(format!("Failed to delete {}: {}", current.url(), e)))?;
            if changed == 0 {
                return Err(not_found(current.resource_type(), current.id()));
            }
            self.cascade_soft_delete(&tx, table, id, &stamp)?;
        } else {
            let changed = tx
                .execute(&format!("DELETE FROM {} WHERE id = ?1", table.table), [id])
                .map_err(|e| internal_error(format!("Failed to delete {}: {}", current.url(), e)))?;
            if changed == 0 {
                return Err(not_found(current.resource_type(), current.id()));
            }
        }

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit delete: {}", e)))?;

        tracing::debug!(
            resource = %current.url(),
            soft = table.soft_deletes,
            "Deleted record"
        );
        Ok(())
    }

    async fn restore(&self, resource_type: &str, id: &str) -> StorageResult<StoredRecord> {
        let table = self.catalog().table(resource_type)?;
        let rowid = parse_id(id).ok_or_else(|| not_found(resource_type, id))?;
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let record = self
            .find_in(&tx, table, rowid, true)?
            .ok_or_else(|| not_found(resource_type, id))?;
        let stamp = match record.attribute("deleted_at") {
            Some(Value::String(stamp)) if table.soft_deletes => stamp.clone(),
            _ => {
                return Err(StorageError::Resource(ResourceError::NotDeleted {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                }));
            }
        };

        tx.execute(
            &format!("UPDATE {} SET deleted_at = NULL WHERE id = ?1", table.table),
            [rowid],
        )
        .map_err(|e| internal_error(format!("Failed to restore {}/{}: {}", resource_type, id, e)))?;
        self.cascade_restore(&tx, table, rowid, &stamp)?;

        let restored = self
            .find_in(&tx, table, rowid, false)?
            .ok_or_else(|| not_found(resource_type, id))?;
        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit restore: {}", e)))?;

        tracing::debug!(resource = %restored.url(), "Restored record");
        Ok(restored)
    }

    async fn related(
        &self,
        owner: &StoredRecord,
        relation: &str,
    ) -> StorageResult<Vec<StoredRecord>> {
        let table = self.catalog().table(owner.resource_type())?;
        let relation = table.relation(relation)?;
        let related = self.catalog().table(relation.related)?;
        let Some(owner_id) = parse_id(owner.id()) else {
            return Ok(Vec::new());
        };
        let conn = self.get_connection()?;

        let deleted = if related.soft_deletes {
            " AND r.deleted_at IS NULL"
        } else {
            ""
        };
        let sql = match &relation.kind {
            RelationKind::BelongsTo { foreign_key } => format!(
                "SELECT {cols} FROM {related} r JOIN {owner} o ON o.{foreign_key} = r.id WHERE o.id = ?1{deleted}",
                cols = select_list(related, Some("r")),
                related = related.table,
                owner = table.table,
            ),
            RelationKind::BelongsToMany {
                pivot,
                owner_key,
                related_key,
                ..
            } => format!(
                "SELECT {cols} FROM {related} r JOIN {pivot} p ON p.{related_key} = r.id WHERE p.{owner_key} = ?1{deleted} ORDER BY r.id",
                cols = select_list(related, Some("r")),
                related = related.table,
            ),
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare relation query: {}", e)))?;
        let records = stmt
            .query_map([owner_id], |row| row_to_record(related, row))
            .map_err(|e| internal_error(format!("Failed to load {}: {}", relation.name, e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| internal_error(format!("Failed to read {} row: {}", relation.name, e)))?;
        Ok(records)
    }

    async fn set_to_one(
        &self,
        owner: &StoredRecord,
        relation: &str,
        target_id: Option<&str>,
    ) -> StorageResult<()> {
        let table = self.catalog().table(owner.resource_type())?;
        let relation = table.relation(relation)?;
        let RelationKind::BelongsTo { foreign_key } = &relation.kind else {
            return Err(kind_mismatch(table, relation, "to-one"));
        };
        let related = self.catalog().table(relation.related)?;
        let owner_id =
            parse_id(owner.id()).ok_or_else(|| not_found(owner.resource_type(), owner.id()))?;
        let conn = self.get_connection()?;

        let target = match target_id {
            Some(id) => SqlValue::Integer(self.resolve_target(&conn, related, id)?),
            None => SqlValue::Null,
        };

        let touch = if table.timestamps {
            ", updated_at = ?3"
        } else {
            ""
        };
        let sql = format!(
            "UPDATE {} SET {} = ?1{} WHERE id = ?2",
            table.table, foreign_key, touch
        );
        let mut args = vec![target, SqlValue::Integer(owner_id)];
        if table.timestamps {
            args.push(SqlValue::Text(now_timestamp()));
        }
        conn.execute(&sql, params_from_iter(args))
            .map_err(|e| internal_error(format!("Failed to set {}: {}", relation.name, e)))?;

        tracing::debug!(
            owner = %owner.url(),
            relation = %relation.name,
            target = ?target_id,
            "Updated to-one relationship"
        );
        Ok(())
    }

    async fn sync_to_many(
        &self,
        owner: &StoredRecord,
        relation: &str,
        target_ids: &[String],
    ) -> StorageResult<()> {
        let table = self.catalog().table(owner.resource_type())?;
        let relation = table.relation(relation)?;
        let RelationKind::BelongsToMany {
            pivot,
            owner_key,
            related_key,
            timestamps,
        } = &relation.kind
        else {
            return Err(kind_mismatch(table, relation, "to-many"));
        };
        let related = self.catalog().table(relation.related)?;
        let owner_id =
            parse_id(owner.id()).ok_or_else(|| not_found(owner.resource_type(), owner.id()))?;

        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        // Resolve every target before touching the join table.
        let mut desired: Vec<i64> = Vec::with_capacity(target_ids.len());
        for id in target_ids {
            let rowid = self.resolve_target(&tx, related, id)?;
            if !desired.contains(&rowid) {
                desired.push(rowid);
            }
        }

        let current: Vec<i64> = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {} FROM {} WHERE {} = ?1",
                    related_key, pivot, owner_key
                ))
                .map_err(|e| internal_error(format!("Failed to prepare link query: {}", e)))?;
            stmt.query_map([owner_id], |row| row.get::<_, i64>(0))
                .map_err(|e| internal_error(format!("Failed to query {}: {}", pivot, e)))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| internal_error(format!("Failed to read {}: {}", pivot, e)))?
        };

        let mut detached = 0usize;
        for existing in current.iter().filter(|id| !desired.contains(id)) {
            tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                    pivot, owner_key, related_key
                ),
                params![owner_id, existing],
            )
            .map_err(|e| internal_error(format!("Failed to detach from {}: {}", pivot, e)))?;
            detached += 1;
        }

        let mut attached = 0usize;
        for target in desired.iter().filter(|id| !current.contains(id)) {
            let inserted = if *timestamps {
                let now = now_timestamp();
                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                        pivot, owner_key, related_key
                    ),
                    params![owner_id, target, now],
                )
            } else {
                tx.execute(
                    &format!(
                        "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                        pivot, owner_key, related_key
                    ),
                    params![owner_id, target],
                )
            };
            inserted.map_err(|e| internal_error(format!("Failed to attach to {}: {}", pivot, e)))?;
            attached += 1;
        }

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit sync: {}", e)))?;

        tracing::debug!(
            owner = %owner.url(),
            relation = %relation.name,
            attached = attached,
            detached = detached,
            "Synced to-many relationship"
        );
        Ok(())
    }

    async fn is_taken(
        &self,
        resource_type: &str,
        column: &str,
        value: &Value,
        except_id: Option<&str>,
    ) -> StorageResult<bool> {
        let table = self.catalog().table(resource_type)?;
        let column_def = table.column_def(column)?;
        let probe = match to_sql(column, column_def.kind, value) {
            Ok(SqlValue::Null) | Err(_) => return Ok(false),
            Ok(v) => v,
        };

        let mut sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = ?1",
            table.table, column_def.name
        );
        let mut args = vec![probe];
        if let Some(except) = except_id.and_then(parse_id) {
            sql.push_str(" AND id <> ?2");
            args.push(SqlValue::Integer(except));
        }
        sql.push(')');

        let conn = self.get_connection()?;
        let taken: bool = conn
            .query_row(&sql, params_from_iter(args), |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed uniqueness probe on {}: {}", table.table, e)))?;
        Ok(taken)
    }
}
