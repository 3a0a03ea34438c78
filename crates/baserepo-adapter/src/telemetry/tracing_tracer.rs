//! `Tracer` backed by the `tracing` crate
//!
//! Each repository span becomes a `tracing` span carrying OpenTelemetry-style
//! fields (`otel.name`, `otel.status_code`, ...), so whatever subscriber the
//! binary installs decides where spans go.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use baserepo_domain::{Attributes, KeyValue, Span, Tracer};
use shared::{Context, RepositoryError, SpanContext};
use tracing::field::Empty;
use uuid::Uuid;

/// Tracer emitting `tracing` spans and events
#[derive(Debug)]
pub struct TracingTracer {
    service_name: String,
    next_span_id: AtomicU64,
}

impl TracingTracer {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            next_span_id: AtomicU64::new(1),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Default for TracingTracer {
    fn default() -> Self {
        Self::new("baserepo")
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, parent: &Context, name: &str) -> (Context, Box<dyn Span>) {
        let span_id = self.next_span_id.fetch_add(1, Ordering::Relaxed);
        let (trace_id, parent_span_id) = match parent.span() {
            Some(p) => (p.trace_id.clone(), Some(p.span_id)),
            None => (Uuid::new_v4().simple().to_string(), None),
        };

        let span = tracing::info_span!(
            "repository",
            otel.name = %name,
            service.name = %self.service_name,
            trace_id = %trace_id,
            span_id,
            parent_span_id,
            otel.status_code = Empty,
            error.kind = Empty,
            error.message = Empty,
            elapsed_ms = Empty,
        );

        let context = SpanContext { trace_id, span_id };
        let ctx = parent.with_span(context.clone());
        let span = TracingSpan {
            span: Mutex::new(Some(span)),
            context,
            started: Instant::now(),
        };
        (ctx, Box::new(span))
    }
}

/// Open `tracing` span; `end` drops it
#[derive(Debug)]
pub struct TracingSpan {
    span: Mutex<Option<tracing::Span>>,
    context: SpanContext,
    started: Instant,
}

impl TracingSpan {
    fn with_span(&self, f: impl FnOnce(&tracing::Span)) {
        if let Ok(guard) = self.span.lock() {
            if let Some(span) = guard.as_ref() {
                f(span);
            }
        }
    }
}

impl Span for TracingSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn add_event(&self, name: &str, attributes: &[KeyValue]) {
        self.with_span(|span| {
            tracing::info!(parent: span, attributes = %Attributes(attributes), "{}", name);
        });
    }

    fn record_error(&self, error: &RepositoryError) {
        self.with_span(|span| {
            span.record("otel.status_code", "ERROR");
            span.record("error.kind", error.kind().as_str());
            span.record("error.message", tracing::field::display(error));
            tracing::error!(parent: span, error.kind = error.kind().as_str(), "{}", error);
        });
    }

    fn end(&self) {
        let span = match self.span.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(span) = span {
            span.record("elapsed_ms", self.started.elapsed().as_millis() as u64);
        }
    }
}
