//! Repositories - The contract callers program against
//!
//! ```text
//! caller ──▶ TracedRepository ──▶ GenericRepository ──▶ PersistencePort
//!               │ span per call
//!               ▼
//!             Tracer
//! ```

pub mod generic;
pub mod span;
pub mod traced;
