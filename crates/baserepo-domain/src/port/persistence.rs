//! Persistence Port - Abstract storage engine
//!
//! This trait defines what the repository needs from a backing store.
//! How it is done (SQL, key-value, memory) is the adapter's concern.

use async_trait::async_trait;
use shared::{Context, Result};

use crate::model::condition::Condition;
use crate::model::entity::Entity;
use crate::model::update::UpdatePayload;

/// Persistence Port Trait
///
/// This is a PORT in hexagonal architecture. Implementations are expected
/// to observe `ctx` for cancellation and to do their own locking or
/// connection pooling; callers may share one instance across tasks.
#[async_trait]
pub trait PersistencePort<T: Entity>: Send + Sync {
    /// Insert `entity`, writing store-assigned fields back into it
    async fn create(&self, ctx: &Context, entity: &mut T) -> Result<()>;

    /// Apply `payload` to the row identified by `entity`'s identity
    ///
    /// The overrides are applied to `entity` as well.
    async fn update_model(&self, ctx: &Context, entity: &mut T, payload: &UpdatePayload)
        -> Result<()>;

    /// Apply `payload` to every row matching `condition`, returning rows affected
    async fn update_where(
        &self,
        ctx: &Context,
        entity: &mut T,
        condition: &Condition,
        payload: &UpdatePayload,
    ) -> Result<u64>;

    /// Insert when the identity is absent, replace otherwise
    async fn save(&self, ctx: &Context, entity: &mut T) -> Result<()>;

    /// Point lookup; `NotFound` when no row matches
    async fn find_by_id(&self, ctx: &Context, id: &T::Id) -> Result<T>;

    /// First row matching `condition` under `sort`; `NotFound` when none
    async fn find_one(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<T>;

    async fn find_many(
        &self,
        ctx: &Context,
        condition: &Condition,
        limit: Option<usize>,
        offset: usize,
        sort: &str,
    ) -> Result<Vec<T>>;

    async fn count(&self, ctx: &Context, condition: &Condition) -> Result<u64>;

    /// Delete the row identified by `id`, returning rows affected
    async fn delete(&self, ctx: &Context, entity: &T, id: &T::Id) -> Result<u64>;
}
