//! In-memory span recorder
//!
//! Keeps every span, event and error so tests (and the demo binary) can
//! inspect exactly what the repository layer reported.

use std::sync::{Arc, Mutex, MutexGuard};

use baserepo_domain::{KeyValue, Span, Tracer};
use chrono::{DateTime, Utc};
use shared::{Context, RepositoryError, SpanContext};
use uuid::Uuid;

/// One event added to a span
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub name: String,
    pub attributes: Vec<KeyValue>,
    pub at: DateTime<Utc>,
}

impl EventRecord {
    pub fn attribute(&self, key: &str) -> Option<&KeyValue> {
        self.attributes.iter().find(|kv| kv.key == key)
    }
}

/// Everything recorded for one span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub span_id: u64,
    pub trace_id: String,
    pub parent_span_id: Option<u64>,
    pub name: String,
    pub events: Vec<EventRecord>,
    pub error: Option<RepositoryError>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Number of times `end` was called
    pub end_calls: usize,
}

impl SpanRecord {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn event(&self, name: &str) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    spans: Vec<SpanRecord>,
    next_span_id: u64,
}

fn lock(recorded: &Mutex<Recorded>) -> MutexGuard<'_, Recorded> {
    match recorded.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Tracer that stores spans in memory; clones share the same store
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all spans, in start order
    pub fn spans(&self) -> Vec<SpanRecord> {
        lock(&self.recorded).spans.clone()
    }

    pub fn spans_named(&self, name: &str) -> Vec<SpanRecord> {
        lock(&self.recorded)
            .spans
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    pub fn span_names(&self) -> Vec<String> {
        lock(&self.recorded)
            .spans
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn last_span(&self) -> Option<SpanRecord> {
        lock(&self.recorded).spans.last().cloned()
    }

    /// Spans started but not yet ended
    pub fn open_spans(&self) -> usize {
        lock(&self.recorded)
            .spans
            .iter()
            .filter(|s| !s.is_ended())
            .count()
    }

    pub fn clear(&self) {
        lock(&self.recorded).spans.clear();
    }

    fn update(&self, span_id: u64, f: impl FnOnce(&mut SpanRecord)) {
        let mut recorded = lock(&self.recorded);
        if let Some(span) = recorded.spans.iter_mut().find(|s| s.span_id == span_id) {
            f(span);
        }
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, parent: &Context, name: &str) -> (Context, Box<dyn Span>) {
        let (trace_id, parent_span_id) = match parent.span() {
            Some(p) => (p.trace_id.clone(), Some(p.span_id)),
            None => (Uuid::new_v4().simple().to_string(), None),
        };

        let span_id = {
            let mut recorded = lock(&self.recorded);
            recorded.next_span_id += 1;
            let span_id = recorded.next_span_id;
            recorded.spans.push(SpanRecord {
                span_id,
                trace_id: trace_id.clone(),
                parent_span_id,
                name: name.to_string(),
                events: Vec::new(),
                error: None,
                started_at: Utc::now(),
                ended_at: None,
                end_calls: 0,
            });
            span_id
        };

        let context = SpanContext { trace_id, span_id };
        let ctx = parent.with_span(context.clone());
        let span = RecordingSpan {
            tracer: self.clone(),
            context,
        };
        (ctx, Box::new(span))
    }
}

struct RecordingSpan {
    tracer: RecordingTracer,
    context: SpanContext,
}

impl Span for RecordingSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn add_event(&self, name: &str, attributes: &[KeyValue]) {
        let event = EventRecord {
            name: name.to_string(),
            attributes: attributes.to_vec(),
            at: Utc::now(),
        };
        self.tracer
            .update(self.context.span_id, |span| span.events.push(event));
    }

    fn record_error(&self, error: &RepositoryError) {
        self.tracer
            .update(self.context.span_id, |span| span.error = Some(error.clone()));
    }

    fn end(&self) {
        self.tracer.update(self.context.span_id, |span| {
            span.end_calls += 1;
            span.ended_at.get_or_insert_with(Utc::now);
        });
    }
}
