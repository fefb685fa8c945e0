//! Query parameter interpretation.
//!
//! Parses the JSON:API query parameters of a request into a [`QueryPlan`]:
//!
//! - `sort=name,-created_at` - keys in order, `-` for descending
//! - `include=sellers,shop-types` - relationships to embed
//! - `filter[name]=x`, `filter[id]=1,2`, `filter[name][like]=Corner%`
//! - `fields[shops]=name` - sparse fieldsets
//! - `page[size]=5&page[number]=2` - page-based pagination
//!
//! Unknown sort, include and filter names are rejected rather than ignored.
//! Parameters outside this vocabulary are ignored.

use std::collections::BTreeMap;

use storefront_persistence::types::{
    FilterClause as StorageFilter, FilterOperator, ListQuery, SortDirection, SortDirective,
};

use crate::error::{ErrorObject, JsonApiError, JsonApiResult};
use crate::registry::{ResourceSchema, SchemaRegistry};

/// Default and maximum page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 15,
            max_size: 100,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// One filter clause. `values` has more than one element only for `In`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    /// Query parameter the clause came from, e.g. `filter[brand_id][gte]`.
    pub parameter: String,
    pub field: String,
    pub op: FilterOperator,
    pub values: Vec<String>,
}

/// Requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub size: usize,
    pub number: usize,
}

impl PageRequest {
    /// Offset of the first record on this page.
    pub fn offset(&self) -> usize {
        self.size.saturating_mul(self.number.saturating_sub(1))
    }
}

/// Parsed query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub sort: Vec<SortKey>,
    pub filters: Vec<FilterClause>,
    pub include: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
    pub page: Option<PageRequest>,
}

/// Splits `outer[a][b]` into `("outer", ["a", "b"])`.
fn bracketed(key: &str) -> Option<(&str, Vec<&str>)> {
    let open = key.find('[')?;
    let (name, mut rest) = key.split_at(open);
    let mut segments = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    rest.is_empty().then_some((name, segments))
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn allowed_list(allowed: &[String]) -> String {
    allowed.join(", ")
}

impl QueryPlan {
    /// Parses raw `(key, value)` query pairs against a schema.
    ///
    /// All problems are collected and returned together as
    /// [`JsonApiError::InvalidQuery`].
    pub fn parse(
        raw: &[(String, String)],
        schema: &ResourceSchema,
        registry: &SchemaRegistry,
        limits: PageLimits,
    ) -> JsonApiResult<Self> {
        let mut plan = QueryPlan::default();
        let mut errors = Vec::new();
        let mut page_size: Option<&str> = None;
        let mut page_number: Option<&str> = None;

        for (key, value) in raw {
            match key.as_str() {
                "sort" => plan.parse_sort(value, schema, &mut errors),
                "include" => plan.parse_include(value, schema, &mut errors),
                _ => match bracketed(key) {
                    Some(("filter", segments)) => {
                        plan.parse_filter(key, &segments, value, schema, &mut errors)
                    }
                    Some(("fields", segments)) if segments.len() == 1 => {
                        let resource_type = segments[0];
                        if registry.contains(resource_type) {
                            plan.fields.insert(
                                resource_type.to_string(),
                                split_list(value).map(str::to_string).collect(),
                            );
                        } else {
                            errors.push(ErrorObject::parameter(
                                key.as_str(),
                                format!(
                                    "Requested fieldset type `{}` is not a known resource type.",
                                    resource_type
                                ),
                            ));
                        }
                    }
                    Some(("page", segments)) if segments == ["size"] => {
                        page_size = Some(value.as_str())
                    }
                    Some(("page", segments)) if segments == ["number"] => {
                        page_number = Some(value.as_str())
                    }
                    _ => {}
                },
            }
        }

        if page_size.is_some() || page_number.is_some() {
            let size = positive("page[size]", page_size, limits.default_size, &mut errors);
            let number = positive("page[number]", page_number, 1, &mut errors);
            plan.page = Some(PageRequest {
                size: size.min(limits.max_size),
                number,
            });
        }

        if errors.is_empty() {
            Ok(plan)
        } else {
            tracing::debug!(
                resource_type = %schema.resource_type,
                errors = errors.len(),
                "Rejected query parameters"
            );
            Err(JsonApiError::InvalidQuery(errors))
        }
    }

    fn parse_sort(&mut self, value: &str, schema: &ResourceSchema, errors: &mut Vec<ErrorObject>) {
        let mut unknown = Vec::new();
        for token in split_list(value) {
            let directive = SortDirective::parse(token);
            if schema.allowed_sorts.contains(&directive.column) {
                self.sort.push(SortKey {
                    field: directive.column,
                    direction: directive.direction,
                });
            } else {
                unknown.push(directive.column);
            }
        }
        if !unknown.is_empty() {
            errors.push(ErrorObject::parameter(
                "sort",
                format!(
                    "Requested sort(s) `{}` is not allowed. Allowed sort(s) are `{}`.",
                    unknown.join(", "),
                    allowed_list(&schema.allowed_sorts)
                ),
            ));
        }
    }

    fn parse_include(
        &mut self,
        value: &str,
        schema: &ResourceSchema,
        errors: &mut Vec<ErrorObject>,
    ) {
        let mut unknown = Vec::new();
        for name in split_list(value) {
            if !schema.allowed_includes.iter().any(|i| i == name) {
                unknown.push(name);
            } else if !self.include.iter().any(|i| i == name) {
                self.include.push(name.to_string());
            }
        }
        if !unknown.is_empty() {
            errors.push(ErrorObject::parameter(
                "include",
                format!(
                    "Requested include(s) `{}` are not allowed. Allowed include(s) are `{}`.",
                    unknown.join(", "),
                    allowed_list(&schema.allowed_includes)
                ),
            ));
        }
    }

    fn parse_filter(
        &mut self,
        key: &str,
        segments: &[&str],
        value: &str,
        schema: &ResourceSchema,
        errors: &mut Vec<ErrorObject>,
    ) {
        let (field, op) = match segments {
            [field] => (*field, None),
            [field, op] => (*field, Some(*op)),
            _ => {
                errors.push(ErrorObject::parameter(
                    key,
                    "Filters take the form filter[field] or filter[field][operator].",
                ));
                return;
            }
        };

        if !schema.allowed_filters.iter().any(|f| f == field) {
            errors.push(ErrorObject::parameter(
                key,
                format!(
                    "Requested filter(s) `{}` are not allowed. Allowed filter(s) are `{}`.",
                    field,
                    allowed_list(&schema.allowed_filters)
                ),
            ));
            return;
        }

        let clause = match op {
            None => {
                let values: Vec<String> = split_list(value).map(str::to_string).collect();
                if values.len() > 1 {
                    FilterClause {
                        parameter: key.to_string(),
                        field: field.to_string(),
                        op: FilterOperator::In,
                        values,
                    }
                } else {
                    FilterClause {
                        parameter: key.to_string(),
                        field: field.to_string(),
                        op: FilterOperator::Eq,
                        values: vec![value.trim().to_string()],
                    }
                }
            }
            Some(op) => match FilterOperator::parse(op) {
                Some(FilterOperator::In) | None => {
                    errors.push(ErrorObject::parameter(
                        key,
                        format!(
                            "Filter operator `{}` is not supported. Supported operators are `eq, ne, lt, lte, gt, gte, like`.",
                            op
                        ),
                    ));
                    return;
                }
                Some(FilterOperator::Like) => {
                    let pattern = if value.contains('%') {
                        value.to_string()
                    } else {
                        format!("%{}%", value)
                    };
                    FilterClause {
                        parameter: key.to_string(),
                        field: field.to_string(),
                        op: FilterOperator::Like,
                        values: vec![pattern],
                    }
                }
                Some(op) => FilterClause {
                    parameter: key.to_string(),
                    field: field.to_string(),
                    op,
                    values: vec![value.to_string()],
                },
            },
        };
        self.filters.push(clause);
    }

    /// Sparse fieldset for a resource type, if one was requested.
    pub fn fields_for(&self, resource_type: &str) -> Option<&[String]> {
        self.fields.get(resource_type).map(Vec::as_slice)
    }

    /// Returns true if the relationship was requested with `include`.
    pub fn includes(&self, relationship: &str) -> bool {
        self.include.iter().any(|i| i == relationship)
    }

    /// Query parameter that filtered on `column`, for error sources.
    pub fn filter_parameter(&self, column: &str) -> String {
        self.filters
            .iter()
            .find(|clause| clause.field == column)
            .map(|clause| clause.parameter.clone())
            .unwrap_or_else(|| format!("filter[{}]", column))
    }

    /// Storage-level form of this plan.
    pub fn to_list_query(&self) -> ListQuery {
        let mut query = ListQuery::new();
        for key in &self.sort {
            query = query.with_sort(SortDirective {
                column: key.field.clone(),
                direction: key.direction,
            });
        }
        for clause in &self.filters {
            query = query.with_filter(StorageFilter {
                column: clause.field.clone(),
                operator: clause.op,
                values: clause.values.clone(),
            });
        }
        match self.page {
            Some(page) => query.with_page(page.size, page.offset()),
            None => query,
        }
    }
}

/// Parses an optional positive integer parameter, recording an error on failure.
fn positive(
    parameter: &str,
    raw: Option<&str>,
    default: usize,
    errors: &mut Vec<ErrorObject>,
) -> usize {
    match raw.map(|v| v.trim().parse::<usize>()) {
        None => default,
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            errors.push(ErrorObject::parameter(
                parameter,
                format!("The {} must be a positive integer.", parameter),
            ));
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(type_: &str, items: &[(&str, &str)]) -> JsonApiResult<QueryPlan> {
        let registry = SchemaRegistry::storefront().unwrap();
        let schema = registry.get(type_).unwrap();
        QueryPlan::parse(&pairs(items), schema, &registry, PageLimits::default())
    }

    fn query_errors(result: JsonApiResult<QueryPlan>) -> Vec<ErrorObject> {
        match result {
            Err(JsonApiError::InvalidQuery(errors)) => errors,
            other => panic!("expected invalid query, got {:?}", other),
        }
    }

    #[test]
    fn test_bracketed() {
        assert_eq!(bracketed("filter[name]"), Some(("filter", vec!["name"])));
        assert_eq!(
            bracketed("filter[name][like]"),
            Some(("filter", vec!["name", "like"]))
        );
        assert_eq!(bracketed("sort"), None);
        assert_eq!(bracketed("filter[name"), None);
        assert_eq!(bracketed("filter[name]x"), None);
    }

    #[test]
    fn test_empty_query() {
        let plan = parse("shops", &[]).unwrap();
        assert_eq!(plan, QueryPlan::default());
    }

    #[test]
    fn test_multi_key_sort() {
        let plan = parse("shops", &[("sort", "-created_at,name")]).unwrap();
        assert_eq!(
            plan.sort,
            vec![
                SortKey {
                    field: "created_at".into(),
                    direction: SortDirection::Descending
                },
                SortKey {
                    field: "name".into(),
                    direction: SortDirection::Ascending
                },
            ]
        );
    }

    #[test]
    fn test_unknown_sort_rejected() {
        let errors = query_errors(parse("brands", &[("sort", "name,-created_at")]));
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].source.as_ref().unwrap().parameter.as_deref(),
            Some("sort")
        );
        assert!(errors[0].details.contains("`created_at`"));
    }

    #[test]
    fn test_include_dedup_and_validation() {
        let plan = parse("shops", &[("include", "sellers,shop-types,sellers")]).unwrap();
        assert_eq!(plan.include, ["sellers", "shop-types"]);
        assert!(plan.includes("sellers"));

        let errors = query_errors(parse("shops", &[("include", "owners")]));
        assert_eq!(errors[0].title, "Validation Error");
    }

    #[test]
    fn test_filters() {
        let plan = parse(
            "products",
            &[
                ("filter[name]", "Widget"),
                ("filter[brand_id]", "1,2"),
                ("filter[product_unit_id][gte]", "3"),
            ],
        )
        .unwrap();
        assert_eq!(plan.filters.len(), 3);
        assert_eq!(plan.filters[0].op, FilterOperator::Eq);
        assert_eq!(plan.filters[1].op, FilterOperator::In);
        assert_eq!(plan.filters[1].values, ["1", "2"]);
        assert_eq!(plan.filters[2].op, FilterOperator::Gte);
        assert_eq!(plan.filters[2].parameter, "filter[product_unit_id][gte]");
        assert_eq!(plan.filter_parameter("product_unit_id"), "filter[product_unit_id][gte]");
        assert_eq!(plan.filter_parameter("model_number"), "filter[model_number]");
    }

    #[test]
    fn test_like_filter_wraps_plain_values() {
        let plan = parse("shops", &[("filter[name][like]", "corner")]).unwrap();
        assert_eq!(plan.filters[0].values, ["%corner%"]);
        let plan = parse("shops", &[("filter[name][like]", "corner%")]).unwrap();
        assert_eq!(plan.filters[0].values, ["corner%"]);
    }

    #[test]
    fn test_filter_errors_accumulate() {
        let errors = query_errors(parse(
            "shops",
            &[("filter[color]", "red"), ("filter[name][between]", "a")],
        ));
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[1].source.as_ref().unwrap().parameter.as_deref(),
            Some("filter[name][between]")
        );
    }

    #[test]
    fn test_fields() {
        let plan = parse("shops", &[("fields[sellers]", "user_id")]).unwrap();
        assert_eq!(plan.fields_for("sellers"), Some(&["user_id".to_string()][..]));
        assert_eq!(plan.fields_for("shops"), None);

        assert!(parse("shops", &[("fields[orders]", "x")]).is_err());
    }

    #[test]
    fn test_page_defaults_and_cap() {
        let plan = parse("shops", &[("page[number]", "3")]).unwrap();
        assert_eq!(plan.page, Some(PageRequest { size: 15, number: 3 }));

        let plan = parse("shops", &[("page[size]", "500")]).unwrap();
        assert_eq!(plan.page, Some(PageRequest { size: 100, number: 1 }));

        assert!(parse("shops", &[("page[size]", "0")]).is_err());
        assert!(parse("shops", &[("page[number]", "x")]).is_err());
    }

    #[test]
    fn test_unknown_parameters_ignored() {
        let plan = parse("shops", &[("utm_source", "mail"), ("page[cursor]", "x")]).unwrap();
        assert_eq!(plan, QueryPlan::default());
    }

    #[test]
    fn test_to_list_query() {
        let plan = parse(
            "shops",
            &[("sort", "-name"), ("page[size]", "5"), ("page[number]", "2")],
        )
        .unwrap();
        let query = plan.to_list_query();
        assert_eq!(query.sort, vec![SortDirective::descending("name")]);
        assert_eq!(query.page.map(|p| (p.limit, p.offset)), Some((5, 5)));
    }
}
