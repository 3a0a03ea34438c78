//! # baserepo Domain Layer
//!
//! One generic persistence contract for any entity type, plus a tracing
//! decorator that wraps every call in a span.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (This Crate)                     │
//! │  ┌─────────────────────────────────────────────────────────────┐│
//! │  │  model/      - Entity, Condition, UpdatePayload, Page       ││
//! │  │  port/       - PersistencePort, Tracer (not implementations)││
//! │  │  repository/ - Repository contract, generic + traced impls  ││
//! │  └─────────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Storage engines and tracer backends live in `baserepo-adapter`; this
//! crate only knows their traits.

pub mod model;
pub mod port;
pub mod repository;

// Re-export commonly used types
pub use model::{
    condition::{CompareOp, Condition, Value},
    entity::{Entity, Identity},
    page::{Page, PageRequest},
    update::UpdatePayload,
};

pub use port::{
    persistence::PersistencePort,
    tracer::{AttributeValue, Attributes, KeyValue, NoopSpan, NoopTracer, Span, Tracer},
};

pub use repository::{
    generic::{GenericRepository, Repository},
    span::{in_span, start_span, Operation, SpanEvents, SpanGuard},
    traced::{new_repository, BaseRepository, TracedRepository, DEFAULT_COMPONENT},
};

pub use shared::{Context, RepositoryError, Result, SpanContext};
