//! Listing query types.
//!
//! A [`ListQuery`] is the storage-level form of a collection request: sort
//! directives, filter clauses and an optional offset window. Column names are
//! checked against the catalogue by the backend before use.

use serde::{Deserialize, Serialize};

use super::StoredRecord;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl SortDirection {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A sort directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDirective {
    /// The column to sort by.
    pub column: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl SortDirective {
    /// Parses a sort value (e.g., "-name" for descending).
    pub fn parse(s: &str) -> Self {
        if let Some(stripped) = s.strip_prefix('-') {
            Self {
                column: stripped.to_string(),
                direction: SortDirection::Descending,
            }
        } else {
            Self {
                column: s.to_string(),
                direction: SortDirection::Ascending,
            }
        }
    }

    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
}

impl FilterOperator {
    /// Parses an operator keyword.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "like" => Some(Self::Like),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::In => "IN",
        }
    }
}

/// A single filter clause. `values` has one element except for `In`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            values: vec![value.into()],
        }
    }

    pub fn any_of(column: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            column: column.into(),
            operator: FilterOperator::In,
            values,
        }
    }
}

/// Offset window of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub limit: usize,
    pub offset: usize,
}

/// A listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub sort: Vec<SortDirective>,
    pub filters: Vec<FilterClause>,
    pub page: Option<PageWindow>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: SortDirective) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_filter(mut self, filter: FilterClause) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.page = Some(PageWindow { limit, offset });
        self
    }
}

/// One page of a listing together with the unpaginated match count.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<StoredRecord>,
    pub total: usize,
}
