//! Persistence Adapters - `PersistencePort` implementations
//!
//! These implement the persistence port from baserepo-domain.

pub mod in_memory;
pub mod query;

pub use in_memory::{Constraint, InMemoryStore};
