//! Condition - Filter criteria forwarded to the persistence port
//!
//! A small expression tree instead of an untyped blob. The repository layer
//! never evaluates it; it only forwards it and renders it for span events.

use core::fmt;

pub use serde_json::Value;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

/// Filter expression
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Condition {
    /// Matches every row
    #[default]
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
    /// SQL-style pattern: `%` any run, `_` one character
    Like {
        field: String,
        pattern: String,
    },
    IsNull {
        field: String,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn all() -> Self {
        Condition::All
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::IsNull {
            field: field.into(),
        }
    }

    /// Builder: conjunction, flattening nested `And`s
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::All, other) => other,
            (this, Condition::All) => this,
            (Condition::And(mut items), Condition::And(more)) => {
                items.extend(more);
                Condition::And(items)
            }
            (Condition::And(mut items), other) => {
                items.push(other);
                Condition::And(items)
            }
            (this, other) => Condition::And(vec![this, other]),
        }
    }

    /// Builder: disjunction, flattening nested `Or`s
    pub fn or(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::Or(mut items), Condition::Or(more)) => {
                items.extend(more);
                Condition::Or(items)
            }
            (Condition::Or(mut items), other) => {
                items.push(other);
                Condition::Or(items)
            }
            (this, other) => Condition::Or(vec![this, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Condition::All)
    }

    /// Every field name referenced anywhere in the expression
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::All => {}
            Condition::Compare { field, .. }
            | Condition::In { field, .. }
            | Condition::Like { field, .. }
            | Condition::IsNull { field } => out.push(field),
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
            Condition::Not(inner) => inner.collect_fields(out),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::All => f.write_str("TRUE"),
            Condition::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.as_str(), value)
            }
            Condition::In { field, values } => {
                write!(f, "{} IN (", field)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
            Condition::Like { field, pattern } => write!(f, "{} LIKE {:?}", field, pattern),
            Condition::IsNull { field } => write!(f, "{} IS NULL", field),
            Condition::And(items) => write_joined(f, items, " AND "),
            Condition::Or(items) => write_joined(f, items, " OR "),
            Condition::Not(inner) => write!(f, "NOT ({})", inner),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Condition], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(")")
}
