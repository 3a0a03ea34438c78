//! Span helpers shared by every traced repository
//!
//! [`start_span`] returns a [`SpanGuard`] that ends the span when dropped,
//! so early returns, panics and dropped futures all close it. Every call
//! into the tracer goes through [`contain`]: a misbehaving backend loses
//! telemetry, never the operation's result.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

use shared::{Context, RepositoryError, Result};

use crate::port::tracer::{KeyValue, NoopSpan, Span, Tracer};

/// Repository operation, as named in spans and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    UpdateBy,
    Save,
    GetFirstById,
    GetFirstBy,
    GetAll,
    GetAllBy,
    Delete,
}

impl Operation {
    /// Suffix of the span name (`repository.GetAll`)
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "Create",
            Operation::Update => "Update",
            Operation::UpdateBy => "UpdateBy",
            Operation::Save => "Save",
            Operation::GetFirstById => "GetFirstByID",
            Operation::GetFirstBy => "GetFirstBy",
            Operation::GetAll => "GetAll",
            Operation::GetAllBy => "GetAllBy",
            Operation::Delete => "Delete",
        }
    }

    pub fn starting_event(&self) -> &'static str {
        match self {
            Operation::Create => "Creating entity",
            Operation::Update => "Updating entity",
            Operation::UpdateBy => "Updating entities by condition",
            Operation::Save => "Saving entity",
            Operation::GetFirstById => "Getting entity by ID",
            Operation::GetFirstBy => "Getting first entity by condition",
            Operation::GetAll => "Listing entities",
            Operation::GetAllBy => "Listing entities by condition",
            Operation::Delete => "Deleting entity",
        }
    }

    pub fn completed_event(&self) -> &'static str {
        match self {
            Operation::Create => "Entity created",
            Operation::Update | Operation::UpdateBy => "Entity updated",
            Operation::Save => "Entity saved",
            Operation::GetFirstById | Operation::GetFirstBy => "Entity retrieved",
            Operation::GetAll | Operation::GetAllBy => "Entities retrieved",
            Operation::Delete => "Entity deleted",
        }
    }
}

/// Run a tracer callback, swallowing any panic it raises
pub fn contain<R>(hook: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(hook, "tracer backend panicked; telemetry dropped");
            None
        }
    }
}

/// Open span that ends itself on drop
pub struct SpanGuard {
    span: Option<Box<dyn Span>>,
}

impl SpanGuard {
    pub fn new(span: Box<dyn Span>) -> Self {
        Self { span: Some(span) }
    }

    pub fn add_event(&self, name: &str, attributes: &[KeyValue]) {
        if let Some(span) = &self.span {
            contain("add_event", || span.add_event(name, attributes));
        }
    }

    pub fn record_error(&self, error: &RepositoryError) {
        if let Some(span) = &self.span {
            contain("record_error", || span.record_error(error));
        }
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            contain("end", || span.end());
        }
    }
}

/// Open `name` under `parent`, returning the child context and its guard
///
/// If the tracer itself fails to open a span, the call proceeds under the
/// parent context with a no-op span.
pub fn start_span(tracer: &dyn Tracer, parent: &Context, name: &str) -> (Context, SpanGuard) {
    match contain("start_span", || tracer.start_span(parent, name)) {
        Some((ctx, span)) => (ctx, SpanGuard::new(span)),
        None => (parent.clone(), SpanGuard::new(Box::new(NoopSpan::under(parent)))),
    }
}

/// Start and completion event names of a traced call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanEvents<'a> {
    pub starting: &'a str,
    pub completed: &'a str,
}

impl From<Operation> for SpanEvents<'static> {
    fn from(op: Operation) -> Self {
        Self {
            starting: op.starting_event(),
            completed: op.completed_event(),
        }
    }
}

/// Run `call` inside span `name`
///
/// Adds the starting event with `attributes`, runs `call` once under the
/// span's context, then adds the completed event (with `completed`'s
/// attributes) on success or records the error. The span ends on every
/// exit path and the result is returned unchanged.
pub async fn in_span<O, F, Fut>(
    tracer: &dyn Tracer,
    ctx: &Context,
    name: &str,
    events: SpanEvents<'_>,
    attributes: Vec<KeyValue>,
    call: F,
    completed: impl FnOnce(&O) -> Vec<KeyValue>,
) -> Result<O>
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    let (ctx, span) = start_span(tracer, ctx, name);
    span.add_event(events.starting, &attributes);

    let result = call(ctx).await;
    match &result {
        Ok(value) => span.add_event(events.completed, &completed(value)),
        Err(err) => span.record_error(err),
    }
    result
}
