//! Ports - What the repository layer needs from the outside world
//!
//! ```text
//! Domain Layer              │  Adapter Layer
//! ──────────────────────────┼──────────────────────────
//! trait PersistencePort<T>  │  InMemoryStore<T>
//! trait Tracer              │  TracingTracer
//!                           │  RecordingTracer
//! ```

pub mod persistence;
pub mod tracer;
