//! Request document validation.
//!
//! Rules are written in the compact pipe syntax (`"required|string|max:50"`)
//! and parsed once into [`Rule`] values when the registry is built. At request
//! time a [`Validator`] walks the request document field by field:
//!
//! - rules of one field run in order and stop at the field's first failure,
//! - every field is checked, so errors of different fields accumulate,
//! - rules other than `required`/`present` are skipped for absent fields,
//! - `sometimes` skips the whole field when it is absent.
//!
//! Paths are dotted (`data.attributes.name`); a `*` segment expands over the
//! elements of an array (`data.*.id` becomes `data.0.id`, `data.1.id`, ...).

use std::str::FromStr;

use serde_json::Value;
use storefront_persistence::core::ResourceStorage;
use thiserror::Error;

use crate::error::{ErrorObject, JsonApiResult};

/// A single validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Present and not empty.
    Required,
    /// Present, possibly empty.
    Present,
    /// Skip the field entirely when it is absent.
    Sometimes,
    String,
    Integer,
    Boolean,
    Email,
    /// A JSON object or array.
    Array,
    /// A JSON array.
    List,
    /// A string or an integer, used for resource identifiers.
    Identifier,
    Min(usize),
    Max(usize),
    In(Vec<String>),
    /// No other row of the validated type holds the value in this column.
    Unique,
    /// Equal to the sibling `{field}_confirmation`.
    Confirmed,
}

/// A rule expression that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid rule '{rule}': {message}")]
pub struct RuleParseError {
    pub rule: String,
    pub message: String,
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match s.split_once(':') {
            Some((name, argument)) => (name, Some(argument)),
            None => (s, None),
        };
        let error = |message: &str| RuleParseError {
            rule: s.to_string(),
            message: message.to_string(),
        };
        let size = || {
            argument
                .ok_or_else(|| error("missing size argument"))?
                .parse::<usize>()
                .map_err(|_| error("size argument must be a non-negative integer"))
        };

        let rule = match name {
            "required" => Rule::Required,
            "present" => Rule::Present,
            "sometimes" => Rule::Sometimes,
            "string" => Rule::String,
            "integer" => Rule::Integer,
            "boolean" => Rule::Boolean,
            "email" => Rule::Email,
            "array" => Rule::Array,
            "list" => Rule::List,
            "identifier" => Rule::Identifier,
            "unique" => Rule::Unique,
            "confirmed" => Rule::Confirmed,
            "min" => Rule::Min(size()?),
            "max" => Rule::Max(size()?),
            "in" => {
                let values = argument.ok_or_else(|| error("missing value list"))?;
                Rule::In(values.split(',').map(str::to_string).collect())
            }
            _ => return Err(error("unknown rule")),
        };

        if argument.is_some() && !matches!(rule, Rule::Min(_) | Rule::Max(_) | Rule::In(_)) {
            return Err(error("rule takes no argument"));
        }
        Ok(rule)
    }
}

/// Parses a pipe-separated rule expression.
pub fn parse_rules(expression: &str) -> Result<Vec<Rule>, RuleParseError> {
    expression
        .split('|')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// The rules of one (possibly wildcard) path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRules {
    pub path: String,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn new(path: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            path: path.into(),
            rules,
        }
    }

    /// Parses `expression` for `path`.
    pub fn parse(path: impl Into<String>, expression: &str) -> Result<Self, RuleParseError> {
        Ok(Self::new(path, parse_rules(expression)?))
    }

    /// The same rules under a path prefix (`name` -> `data.attributes.name`).
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self::new(format!("{}.{}", prefix, self.path), self.rules.clone())
    }
}

/// Scope of `unique` checks.
#[derive(Debug, Clone, Copy)]
pub struct UniqueScope<'a> {
    pub resource_type: &'a str,
    /// Row to ignore (the record being updated).
    pub except_id: Option<&'a str>,
}

/// Looks up a dotted path inside a document.
pub fn lookup<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Expands `*` segments against the document. Paths without wildcards are
/// returned unchanged.
fn expand(document: &Value, path: &str) -> Vec<String> {
    let Some((head, tail)) = path.split_once(".*") else {
        return vec![path.to_string()];
    };
    let tail = tail.strip_prefix('.').unwrap_or(tail);

    let keys: Vec<String> = match lookup(document, head) {
        Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    };

    keys.into_iter()
        .flat_map(|key| {
            let concrete = if tail.is_empty() {
                format!("{}.{}", head, key)
            } else {
                format!("{}.{}.{}", head, key, tail)
            };
            expand(document, &concrete)
        })
        .collect()
}

/// Field name as shown in messages: underscores become spaces.
fn display_name(path: &str) -> String {
    path.replace('_', " ")
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        // Storage columns are 64-bit signed.
        Value::Number(n) => n.is_i64(),
        Value::String(s) => s.parse::<i64>().is_ok(),
        _ => false,
    }
}

fn is_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::Number(n) => matches!(n.as_i64(), Some(0) | Some(1)),
        Value::String(s) => matches!(s.as_str(), "0" | "1"),
        _ => false,
    }
}

fn is_email(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.split('.').all(|label| !label.is_empty())
}

/// Kind of size a value has, which decides the wording of min/max messages.
enum Size {
    Numeric(f64),
    Characters(usize),
    Items(usize),
}

fn size_of(value: &Value, numeric: bool) -> Option<Size> {
    match value {
        Value::Number(n) => n.as_f64().map(Size::Numeric),
        Value::String(s) if numeric => s.parse::<f64>().ok().map(Size::Numeric),
        Value::String(s) => Some(Size::Characters(s.chars().count())),
        Value::Array(items) => Some(Size::Items(items.len())),
        Value::Object(map) => Some(Size::Items(map.len())),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        _ => None,
    }
}

/// Validates request documents against field rules.
pub struct Validator<'a, S: ?Sized> {
    storage: &'a S,
    scope: UniqueScope<'a>,
}

impl<'a, S> Validator<'a, S>
where
    S: ResourceStorage + ?Sized,
{
    pub fn new(storage: &'a S, scope: UniqueScope<'a>) -> Self {
        Self { storage, scope }
    }

    /// Checks every field and returns the accumulated errors.
    ///
    /// Only storage failures (from `unique` probes) are returned as `Err`.
    pub async fn validate(
        &self,
        document: &Value,
        fields: &[FieldRules],
    ) -> JsonApiResult<Vec<ErrorObject>> {
        let mut errors = Vec::new();
        for field in fields {
            for path in expand(document, &field.path) {
                if let Some(error) = self.check_field(document, &path, &field.rules).await? {
                    errors.push(error);
                }
            }
        }
        if !errors.is_empty() {
            tracing::debug!(
                resource_type = %self.scope.resource_type,
                errors = errors.len(),
                "Request document failed validation"
            );
        }
        Ok(errors)
    }

    async fn check_field(
        &self,
        document: &Value,
        path: &str,
        rules: &[Rule],
    ) -> JsonApiResult<Option<ErrorObject>> {
        let value = lookup(document, path);
        let name = display_name(path);
        let numeric = rules.contains(&Rule::Integer);

        if value.is_none() && rules.contains(&Rule::Sometimes) {
            return Ok(None);
        }

        for rule in rules {
            let details = match (rule, value) {
                (Rule::Required, v) if v.is_none_or(is_empty) => {
                    Some(format!("The {} field is required.", name))
                }
                (Rule::Present, None) => Some(format!("The {} field must be present.", name)),
                (Rule::Required | Rule::Present | Rule::Sometimes, _) => None,
                // Remaining rules only apply to fields that are there.
                (_, None) => return Ok(None),
                (rule, Some(v)) => self.check_rule(document, path, &name, rule, v, numeric).await?,
            };
            if let Some(details) = details {
                return Ok(Some(ErrorObject::field(path, details)));
            }
        }
        Ok(None)
    }

    async fn check_rule(
        &self,
        document: &Value,
        path: &str,
        name: &str,
        rule: &Rule,
        value: &Value,
        numeric: bool,
    ) -> JsonApiResult<Option<String>> {
        let failed = match rule {
            Rule::String => (!value.is_string()).then(|| format!("The {} must be a string.", name)),
            Rule::Integer => {
                (!is_integer(value)).then(|| format!("The {} must be an integer.", name))
            }
            Rule::Boolean => {
                (!is_boolean(value)).then(|| format!("The {} field must be true or false.", name))
            }
            Rule::Email => {
                (!is_email(value)).then(|| format!("The {} must be a valid email address.", name))
            }
            Rule::Array => (!(value.is_object() || value.is_array()))
                .then(|| format!("The {} must be an array.", name)),
            Rule::List => (!value.is_array()).then(|| format!("The {} must be an array.", name)),
            Rule::Identifier => (!(value.is_string() || is_integer(value)))
                .then(|| format!("The {} must be a string.", name)),
            Rule::Min(n) => match size_of(value, numeric) {
                Some(Size::Numeric(v)) if v < *n as f64 => {
                    Some(format!("The {} must be at least {}.", name, n))
                }
                Some(Size::Characters(len)) if len < *n => {
                    Some(format!("The {} must be at least {} characters.", name, n))
                }
                Some(Size::Items(len)) if len < *n => {
                    Some(format!("The {} must have at least {} items.", name, n))
                }
                _ => None,
            },
            Rule::Max(n) => match size_of(value, numeric) {
                Some(Size::Numeric(v)) if v > *n as f64 => {
                    Some(format!("The {} may not be greater than {}.", name, n))
                }
                Some(Size::Characters(len)) if len > *n => Some(format!(
                    "The {} may not be greater than {} characters.",
                    name, n
                )),
                Some(Size::Items(len)) if len > *n => {
                    Some(format!("The {} may not have more than {} items.", name, n))
                }
                _ => None,
            },
            Rule::In(allowed) => {
                let matches = scalar_string(value).is_some_and(|s| allowed.contains(&s));
                (!matches).then(|| format!("The selected {} is invalid.", name))
            }
            Rule::Confirmed => {
                let confirmation = lookup(document, &format!("{}_confirmation", path));
                (confirmation != Some(value))
                    .then(|| format!("The {} confirmation does not match.", name))
            }
            Rule::Unique => {
                let column = path.rsplit('.').next().unwrap_or(path);
                let taken = self
                    .storage
                    .is_taken(
                        self.scope.resource_type,
                        column,
                        value,
                        self.scope.except_id,
                    )
                    .await?;
                taken.then(|| format!("The {} has already been taken.", name))
            }
            Rule::Required | Rule::Present | Rule::Sometimes => None,
        };
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rules() {
        let rules = parse_rules("required|string|max:50").unwrap();
        assert_eq!(rules, vec![Rule::Required, Rule::String, Rule::Max(50)]);

        let rules = parse_rules("required|in:shops").unwrap();
        assert_eq!(rules[1], Rule::In(vec!["shops".to_string()]));
    }

    #[test]
    fn test_parse_rules_rejects_garbage() {
        assert!(parse_rules("required|strng").is_err());
        assert!(parse_rules("max:abc").is_err());
        assert!(parse_rules("max").is_err());
        assert!(parse_rules("string:5").is_err());
    }

    #[test]
    fn test_rule_parse_error_display() {
        let err = parse_rules("required|strng").unwrap_err();
        assert_eq!(err.rule, "strng");
        assert_eq!(err.to_string(), "invalid rule 'strng': unknown rule");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_lookup() {
        let doc = json!({"data": [{"id": "1"}, {"id": "2"}]});
        assert_eq!(lookup(&doc, "data.1.id"), Some(&json!("2")));
        assert_eq!(lookup(&doc, "data.2.id"), None);
        assert_eq!(lookup(&doc, "data.x"), None);
    }

    #[test]
    fn test_expand_wildcards() {
        let doc = json!({"data": [{"id": "1"}, {"id": "2"}]});
        assert_eq!(expand(&doc, "data.*.id"), ["data.0.id", "data.1.id"]);
        assert_eq!(expand(&doc, "data.type"), ["data.type"]);
        assert!(expand(&json!({}), "data.*.id").is_empty());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name("data.attributes.user_id"),
            "data.attributes.user id"
        );
    }

    #[test]
    fn test_value_predicates() {
        assert!(is_email(&json!("ann@example.com")));
        assert!(!is_email(&json!("ann@")));
        assert!(!is_email(&json!("ann example@x.y")));
        assert!(is_integer(&json!("12")));
        assert!(!is_integer(&json!(1.5)));
        assert!(is_integer(&json!(i64::MIN)));
        assert!(!is_integer(&json!(u64::MAX)));
        assert!(!is_integer(&json!("18446744073709551615")));
        assert!(is_boolean(&json!(0)));
        assert!(!is_boolean(&json!("yes")));
        assert!(is_empty(&json!("  ")));
        assert!(!is_empty(&json!(0)));
    }
}
