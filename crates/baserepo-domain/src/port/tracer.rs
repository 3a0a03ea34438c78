//! Tracer Port - Span creation and annotation
//!
//! The tracer handle is built once at process start and passed into every
//! repository constructor. Nothing in this crate looks a tracer up from
//! global state.

use std::borrow::Cow;
use std::fmt;

use shared::{Context, RepositoryError, SpanContext};

/// Attribute value attached to a span event
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::I64(n) => write!(f, "{}", n),
            AttributeValue::U64(n) => write!(f, "{}", n),
            AttributeValue::F64(n) => write!(f, "{}", n),
            AttributeValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Structured key/value attribute
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: Cow<'static, str>,
    pub value: AttributeValue,
}

impl KeyValue {
    pub fn new(key: impl Into<Cow<'static, str>>, value: AttributeValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        Self::new(key, AttributeValue::String(value.into()))
    }

    /// Attribute holding the `Display` rendering of `value`
    pub fn display(key: impl Into<Cow<'static, str>>, value: &dyn fmt::Display) -> Self {
        Self::new(key, AttributeValue::String(value.to_string()))
    }

    pub fn i64(key: impl Into<Cow<'static, str>>, value: i64) -> Self {
        Self::new(key, AttributeValue::I64(value))
    }

    pub fn u64(key: impl Into<Cow<'static, str>>, value: u64) -> Self {
        Self::new(key, AttributeValue::U64(value))
    }

    pub fn bool(key: impl Into<Cow<'static, str>>, value: bool) -> Self {
        Self::new(key, AttributeValue::Bool(value))
    }
}

/// `key=value` rendering of an attribute list, space separated
pub struct Attributes<'a>(pub &'a [KeyValue]);

impl fmt::Display for Attributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kv) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", kv.key, kv.value)?;
        }
        Ok(())
    }
}

/// One open span
///
/// Annotation methods are infallible: a backend that cannot record
/// something drops it.
pub trait Span: Send + Sync {
    fn context(&self) -> SpanContext;

    fn add_event(&self, name: &str, attributes: &[KeyValue]);

    fn record_error(&self, error: &RepositoryError);

    /// Terminate the span. Callers invoke this exactly once.
    fn end(&self);
}

/// Tracer Port Trait
pub trait Tracer: Send + Sync {
    /// Open a span named `name` under `parent`, returning a child context
    /// that carries it
    fn start_span(&self, parent: &Context, name: &str) -> (Context, Box<dyn Span>);
}

/// Tracer that records nothing
#[derive(Debug, Clone, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, parent: &Context, _name: &str) -> (Context, Box<dyn Span>) {
        let span = NoopSpan::under(parent);
        (parent.clone(), Box::new(span))
    }
}

/// Span that records nothing
#[derive(Debug, Clone)]
pub struct NoopSpan {
    context: SpanContext,
}

impl NoopSpan {
    /// A no-op span reporting the parent's identity (or an empty one)
    pub fn under(parent: &Context) -> Self {
        let context = parent.span().cloned().unwrap_or(SpanContext {
            trace_id: String::new(),
            span_id: 0,
        });
        Self { context }
    }
}

impl Span for NoopSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn add_event(&self, _name: &str, _attributes: &[KeyValue]) {}

    fn record_error(&self, _error: &RepositoryError) {}

    fn end(&self) {}
}
