//! Row-level evaluation of conditions and sort directives
//!
//! Rows are JSON objects. Conditions are compiled once per call into a
//! [`Filter`] (LIKE patterns become regexes) and then run against each row.

use std::cmp::Ordering;

use baserepo_domain::{CompareOp, Condition};
use regex::Regex;
use serde_json::{Map, Value};
use shared::{RepositoryError, Result};

pub type Row = Map<String, Value>;

/// Compiled condition
#[derive(Debug)]
pub enum Filter {
    All,
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
    Like {
        field: String,
        regex: Regex,
    },
    IsNull {
        field: String,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn compile(condition: &Condition) -> Result<Self> {
        Ok(match condition {
            Condition::All => Filter::All,
            Condition::Compare { field, op, value } => Filter::Compare {
                field: field.clone(),
                op: *op,
                value: value.clone(),
            },
            Condition::In { field, values } => Filter::In {
                field: field.clone(),
                values: values.clone(),
            },
            Condition::Like { field, pattern } => Filter::Like {
                field: field.clone(),
                regex: like_to_regex(pattern)?,
            },
            Condition::IsNull { field } => Filter::IsNull {
                field: field.clone(),
            },
            Condition::And(items) => Filter::And(
                items.iter().map(Filter::compile).collect::<Result<_>>()?,
            ),
            Condition::Or(items) => Filter::Or(
                items.iter().map(Filter::compile).collect::<Result<_>>()?,
            ),
            Condition::Not(inner) => Filter::Not(Box::new(Filter::compile(inner)?)),
        })
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::All => true,
            Filter::Compare { field, op, value } => {
                let Some(actual) = row.get(field) else {
                    return false;
                };
                let Some(ordering) = compare_values(actual, value) else {
                    return *op == CompareOp::Ne;
                };
                match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                }
            }
            Filter::In { field, values } => row.get(field).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| compare_values(actual, v) == Some(Ordering::Equal))
            }),
            Filter::Like { field, regex } => row
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Filter::IsNull { field } => row.get(field).map_or(true, Value::is_null),
            Filter::And(items) => items.iter().all(|f| f.matches(row)),
            Filter::Or(items) => items.iter().any(|f| f.matches(row)),
            Filter::Not(inner) => !inner.matches(row),
        }
    }
}

/// SQL LIKE → anchored, case-insensitive regex
fn like_to_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::from("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| RepositoryError::query(format!("invalid LIKE pattern: {}", e)))
}

/// Compare two JSON scalars of the same kind; `None` when incomparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: nulls, booleans, numbers, strings, rest
fn sort_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    sort_rank(a).cmp(&sort_rank(b)).then_with(|| match (a, b) {
        (Some(a), Some(b)) => {
            compare_values(a, b).unwrap_or_else(|| a.to_string().cmp(&b.to_string()))
        }
        _ => Ordering::Equal,
    })
}

/// One `field [asc|desc]` term of a sort directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Parse `"name asc, id desc"`; an empty directive yields no keys
pub fn parse_sort(sort: &str) -> Result<Vec<SortKey>> {
    let mut keys = Vec::new();
    for term in sort.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut parts = term.split_whitespace();
        let field = parts.next().unwrap_or_default().to_string();
        let descending = match parts.next().map(|d| d.to_ascii_lowercase()) {
            None => false,
            Some(d) if d == "asc" => false,
            Some(d) if d == "desc" => true,
            Some(d) => {
                return Err(RepositoryError::query(format!(
                    "invalid sort direction '{}' in '{}'",
                    d, sort
                )))
            }
        };
        if parts.next().is_some() {
            return Err(RepositoryError::query(format!(
                "invalid sort expression '{}'",
                sort
            )));
        }
        keys.push(SortKey { field, descending });
    }
    Ok(keys)
}

/// Stable sort of `rows` by `keys`
pub fn sort_rows(rows: &mut [&Row], keys: &[SortKey]) {
    rows.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |acc, key| {
            acc.then_with(|| {
                let ord = sort_cmp(a.get(&key.field), b.get(&key.field));
                if key.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_compare_and_logic() {
        let alice = row(json!({"id": 1, "name": "Alice", "age": 30, "email": null}));
        let cond = Condition::eq("name", "Alice")
            .and(Condition::ge("age", 30))
            .and(Condition::is_null("email"));

        assert!(Filter::compile(&cond).unwrap().matches(&alice));
        assert!(!Filter::compile(&Condition::gt("age", 30.5)).unwrap().matches(&alice));
        assert!(Filter::compile(&Condition::ne("name", "Bob")).unwrap().matches(&alice));
        assert!(Filter::compile(&Condition::is_in("id", [3, 1])).unwrap().matches(&alice));
        assert!(!Filter::compile(&Condition::eq("age", "30")).unwrap().matches(&alice));
    }

    #[test]
    fn test_like_is_anchored_and_case_insensitive() {
        let r = row(json!({"email": "Alice@Test.io"}));
        let matches = |p: &str| {
            Filter::compile(&Condition::like("email", p))
                .unwrap()
                .matches(&r)
        };

        assert!(matches("alice@%"));
        assert!(matches("%.io"));
        assert!(matches("Alic_@Test.io"));
        assert!(!matches("alice"));
        assert!(!matches("%.com"));
    }

    #[test]
    fn test_like_escapes_regex_metacharacters() {
        let r = row(json!({"path": "a+b(c)"}));
        let filter = Filter::compile(&Condition::like("path", "a+b(c)")).unwrap();
        assert!(filter.matches(&r));
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!(parse_sort("").unwrap(), vec![]);
        assert_eq!(
            parse_sort("name, id DESC").unwrap(),
            vec![
                SortKey { field: "name".into(), descending: false },
                SortKey { field: "id".into(), descending: true },
            ]
        );
        assert!(parse_sort("id sideways").is_err());
        assert!(parse_sort("id desc nulls").is_err());
    }

    #[test]
    fn test_sort_rows_multi_key() {
        let a = row(json!({"id": 1, "team": "b"}));
        let b = row(json!({"id": 2, "team": "a"}));
        let c = row(json!({"id": 3, "team": "b"}));
        let mut rows = vec![&a, &b, &c];

        sort_rows(&mut rows, &parse_sort("team asc, id desc").unwrap());

        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
