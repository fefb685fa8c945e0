//! SQL building and value conversion for the SQLite backend.
//!
//! Column names reach SQL only after a catalogue lookup; values always go
//! through bound parameters.

use rusqlite::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value};

use crate::catalog::{ColumnKind, TableDef};
use crate::error::{StorageResult, ValidationError};
use crate::types::{FilterOperator, ListQuery, StoredRecord};

/// Current time as stored in timestamp columns.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

/// Parses a string id into a rowid. Non-numeric ids match nothing.
pub(crate) fn parse_id(id: &str) -> Option<i64> {
    id.parse::<i64>().ok().filter(|v| *v > 0)
}

/// `id, col1, col2, ...` optionally qualified with a table alias.
pub(crate) fn select_list(table: &TableDef, alias: Option<&str>) -> String {
    let prefix = alias.map(|a| format!("{}.", a)).unwrap_or_default();
    let mut columns = vec![format!("{}id", prefix)];
    columns.extend(
        table
            .columns
            .iter()
            .map(|c| format!("{}{}", prefix, c.name)),
    );
    columns.join(", ")
}

/// Maps a row selected with [`select_list`] to a record.
pub(crate) fn row_to_record(table: &TableDef, row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let id: i64 = row.get(0)?;
    let mut attributes = Map::new();
    for (index, column) in table.columns.iter().enumerate() {
        let value = from_sql(column.kind, row.get_ref(index + 1)?);
        attributes.insert(column.name.to_string(), value);
    }
    Ok(StoredRecord::new(
        table.resource_type,
        id.to_string(),
        attributes,
    ))
}

fn from_sql(kind: ColumnKind, value: ValueRef<'_>) -> Value {
    match (kind, value) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnKind::Boolean, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (_, ValueRef::Integer(i)) => Value::from(i),
        (_, ValueRef::Real(f)) => Value::from(f),
        (_, ValueRef::Text(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        (_, ValueRef::Blob(bytes)) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn invalid(column: &str, message: impl Into<String>) -> crate::error::StorageError {
    ValidationError::InvalidValue {
        column: column.to_string(),
        message: message.into(),
    }
    .into()
}

/// Converts a JSON attribute into the storage class of its column.
pub(crate) fn to_sql(column: &str, kind: ColumnKind, value: &Value) -> StorageResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Array(_) | Value::Object(_) => Err(invalid(column, "structured values cannot be stored")),
        _ => match kind {
            ColumnKind::Integer => integer_value(column, value),
            ColumnKind::Boolean => boolean_value(column, value),
            ColumnKind::Text | ColumnKind::Timestamp => Ok(SqlValue::Text(match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })),
        },
    }
}

fn integer_value(column: &str, value: &Value) -> StorageResult<SqlValue> {
    match value {
        // `as` would saturate out-of-range floats, so they are rejected first.
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .map(SqlValue::Integer)
            .ok_or_else(|| invalid(column, format!("{} is not a 64-bit integer", n))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| invalid(column, format!("'{}' is not an integer", s))),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        _ => Err(invalid(column, "expected an integer")),
    }
}

fn boolean_value(column: &str, value: &Value) -> StorageResult<SqlValue> {
    let flag = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    flag.map(|b| SqlValue::Integer(i64::from(b)))
        .ok_or_else(|| invalid(column, format!("{} is not a boolean", value)))
}

/// Storage class of a filterable or sortable column, including `id`.
fn column_kind(table: &TableDef, column: &str) -> StorageResult<ColumnKind> {
    if column == "id" {
        return Ok(ColumnKind::Integer);
    }
    Ok(table.column_def(column)?.kind)
}

/// `WHERE` clause and parameters for the non-deleted rows matching `query`.
pub(crate) fn where_clause(
    table: &TableDef,
    query: &ListQuery,
) -> StorageResult<(String, Vec<SqlValue>)> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if table.soft_deletes {
        conditions.push("deleted_at IS NULL".to_string());
    }

    for filter in &query.filters {
        let kind = column_kind(table, &filter.column)?;
        match filter.operator {
            FilterOperator::In => {
                if filter.values.is_empty() {
                    conditions.push("0".to_string());
                    continue;
                }
                let mut placeholders = Vec::with_capacity(filter.values.len());
                for raw in &filter.values {
                    params.push(filter_value(&filter.column, kind, raw)?);
                    placeholders.push(format!("?{}", params.len()));
                }
                conditions.push(format!("{} IN ({})", filter.column, placeholders.join(", ")));
            }
            FilterOperator::Like => {
                let raw = filter.values.first().map(String::as_str).unwrap_or_default();
                params.push(SqlValue::Text(raw.to_string()));
                conditions.push(format!("{} LIKE ?{}", filter.column, params.len()));
            }
            op => {
                let raw = filter.values.first().map(String::as_str).unwrap_or_default();
                params.push(filter_value(&filter.column, kind, raw)?);
                conditions.push(format!("{} {} ?{}", filter.column, op.as_sql(), params.len()));
            }
        }
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    Ok((clause, params))
}

fn filter_value(column: &str, kind: ColumnKind, raw: &str) -> StorageResult<SqlValue> {
    to_sql(column, kind, &Value::String(raw.to_string()))
}

/// `ORDER BY` clause with the primary key as final tiebreak.
pub(crate) fn order_clause(table: &TableDef, query: &ListQuery) -> StorageResult<String> {
    let mut keys = Vec::with_capacity(query.sort.len() + 1);
    let mut has_id = false;
    for directive in &query.sort {
        column_kind(table, &directive.column)?;
        has_id |= directive.column == "id";
        keys.push(format!("{} {}", directive.column, directive.direction.as_sql()));
    }
    if !has_id {
        keys.push("id ASC".to_string());
    }
    Ok(format!(" ORDER BY {}", keys.join(", ")))
}
