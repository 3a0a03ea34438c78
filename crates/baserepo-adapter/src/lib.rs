//! # baserepo Adapter Layer
//!
//! External system integrations (Hexagonal Architecture adapters).
//!
//! ## Structure
//!
//! - `persistence/` - Storage engines behind `PersistencePort`
//! - `telemetry/` - Tracer backends behind `Tracer`

pub mod persistence;
pub mod telemetry;


pub use persistence::{Constraint, InMemoryStore};
pub use telemetry::{EventRecord, RecordingTracer, SpanRecord, Telemetry, TracingTracer};
