//! Core types for the persistence layer.
//!
//! - [`StoredRecord`] - A row with its attributes in declaration order
//! - [`ListQuery`], [`SortDirective`], [`FilterClause`] - Listing requests
//! - [`RecordPage`] - A page of records plus the total match count

mod list_query;
mod stored_record;

pub use list_query::{
    FilterClause, FilterOperator, ListQuery, PageWindow, RecordPage, SortDirection, SortDirective,
};
pub use stored_record::StoredRecord;
