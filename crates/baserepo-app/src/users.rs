//! Example domain repository
//!
//! `UserRepository` is the generic contract for [`User`] plus one bespoke
//! query. The generic operations are forwarded to a [`BaseRepository`];
//! `find_by_email` runs inside its own span (via `in_span`) so the inner
//! `GetFirstBy` span nests under it.

use std::sync::Arc;

use async_trait::async_trait;
use baserepo_adapter::{Constraint, InMemoryStore, Telemetry};
use baserepo_domain::{
    in_span, new_repository, BaseRepository, Condition, Entity, KeyValue, Page, PageRequest,
    Repository, SpanEvents, Tracer, UpdatePayload,
};
use serde::{Deserialize, Serialize};
use shared::{Context, Result, StoreConfig};

pub const USERS_COMPONENT: &str = "users";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl Entity for User {
    type Id = u64;
    const TABLE: &'static str = "users";

    fn id(&self) -> Option<u64> {
        (self.id != 0).then_some(self.id)
    }
}

/// User Repository Trait
#[async_trait]
pub trait UserRepository: Repository<User> {
    /// Look a user up by e-mail address
    async fn find_by_email(&self, ctx: &Context, email: &str) -> Result<User>;
}

/// `UserRepository` over any persistence port
pub struct UserStore {
    base: BaseRepository<User>,
    tracer: Arc<dyn Tracer>,
}

impl UserStore {
    pub fn new(base: BaseRepository<User>, tracer: Arc<dyn Tracer>) -> Self {
        Self { base, tracer }
    }

    /// Users table in memory: non-empty name, unique e-mail
    pub fn in_memory(store: &StoreConfig, telemetry: &Telemetry) -> Self {
        let port = InMemoryStore::<User>::new()
            .with_config(store)
            .with_constraint(Constraint::not_empty("name"))
            .with_constraint(Constraint::not_empty("email"))
            .with_constraint(Constraint::unique("email"));
        let base = new_repository(Arc::new(port), telemetry.tracer())
            .with_component(telemetry.component().to_string());
        Self::new(base, telemetry.tracer())
    }
}

#[async_trait]
impl Repository<User> for UserStore {
    async fn create(&self, ctx: &Context, entity: User) -> Result<User> {
        self.base.create(ctx, entity).await
    }

    async fn update(&self, ctx: &Context, entity: User, params: &UpdatePayload) -> Result<User> {
        self.base.update(ctx, entity, params).await
    }

    async fn update_by(
        &self,
        ctx: &Context,
        entity: User,
        condition: &Condition,
        params: &UpdatePayload,
    ) -> Result<User> {
        self.base.update_by(ctx, entity, condition, params).await
    }

    async fn save(&self, ctx: &Context, entity: User) -> Result<User> {
        self.base.save(ctx, entity).await
    }

    async fn get_first_by_id(&self, ctx: &Context, id: &u64) -> Result<User> {
        self.base.get_first_by_id(ctx, id).await
    }

    async fn get_first_by(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<User> {
        self.base.get_first_by(ctx, condition, sort).await
    }

    async fn get_all(&self, ctx: &Context, page: &PageRequest) -> Result<Page<User>> {
        self.base.get_all(ctx, page).await
    }

    async fn get_all_by(
        &self,
        ctx: &Context,
        page: &PageRequest,
        condition: &Condition,
    ) -> Result<Page<User>> {
        self.base.get_all_by(ctx, page, condition).await
    }

    async fn delete(&self, ctx: &Context, entity: &User, id: &u64) -> Result<()> {
        self.base.delete(ctx, entity, id).await
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_email(&self, ctx: &Context, email: &str) -> Result<User> {
        let name = format!("{}.FindByEmail", USERS_COMPONENT);
        in_span(
            self.tracer.as_ref(),
            ctx,
            &name,
            SpanEvents {
                starting: "Finding user by email",
                completed: "User found",
            },
            vec![KeyValue::string("user.email", email)],
            |ctx| async move {
                self.base
                    .get_first_by(&ctx, &Condition::eq("email", email), "")
                    .await
            },
            |user: &User| vec![KeyValue::u64("entity.id", user.id)],
        )
        .await
    }
}
