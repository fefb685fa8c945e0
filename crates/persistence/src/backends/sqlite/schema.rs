//! SQLite schema definitions.

use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn migration_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::MigrationError { message })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection, catalog: &Catalog) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        // Fresh database
        create_schema_v1(conn, catalog)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(migration_error(format!(
            "database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1): one table per resource type, then
/// the join tables that reference them.
fn create_schema_v1(conn: &Connection, catalog: &Catalog) -> StorageResult<()> {
    for table in catalog.tables() {
        conn.execute(&table.create_table_sql(), [])
            .map_err(|e| {
                migration_error(format!("Failed to create {} table: {}", table.table, e))
            })?;

        if table.soft_deletes {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{0}_deleted_at ON {0} (deleted_at)",
                    table.table
                ),
                [],
            )
            .map_err(|e| {
                migration_error(format!("Failed to index {}.deleted_at: {}", table.table, e))
            })?;
        }
    }

    for statement in catalog.pivot_tables_sql() {
        conn.execute(&statement, [])
            .map_err(|e| migration_error(format!("Failed to create join table: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_initialize_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn, &Catalog::storefront()).unwrap();

        let names = table_names(&conn);
        for expected in [
            "brands",
            "employee_shop",
            "employees",
            "product_shop",
            "product_units",
            "products",
            "seller_shop",
            "sellers",
            "shop_shop_type",
            "shop_types",
            "shops",
            "transactions",
            "users",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let catalog = Catalog::storefront();
        initialize_schema(&conn, &catalog).unwrap();
        initialize_schema(&conn, &catalog).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        set_schema_version(&conn, SCHEMA_VERSION + 1).unwrap();
        let err = initialize_schema(&conn, &Catalog::storefront()).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
