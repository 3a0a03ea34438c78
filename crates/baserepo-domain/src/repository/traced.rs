//! Traced Repository - Span-per-call decorator
//!
//! Wraps any `Repository<T>` and implements the same trait. Each call:
//!
//! ```text
//! start span "<component>.<Operation>"
//!   ├── event: starting (entity.id / query.* / page.* attributes)
//!   ├── inner operation, exactly once, under the span's context
//!   ├── Ok  → event: completed (total/items for listings)
//!   └── Err → record error on span
//! end span (drop guard)
//! ```
//!
//! The inner result is returned untouched.

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use shared::{Context, Result};

use super::generic::{GenericRepository, Repository};
use super::span::{in_span, Operation};
use crate::model::condition::Condition;
use crate::model::entity::Entity;
use crate::model::page::{Page, PageRequest};
use crate::model::update::UpdatePayload;
use crate::port::persistence::PersistencePort;
use crate::port::tracer::{KeyValue, Tracer};

pub const DEFAULT_COMPONENT: &str = "repository";

/// The generic repository wrapped in tracing, as handed out by [`new_repository`]
pub type BaseRepository<T> = TracedRepository<T, GenericRepository<T>>;

/// Build the traced generic repository for `T` in one step
pub fn new_repository<T: Entity>(
    port: Arc<dyn PersistencePort<T>>,
    tracer: Arc<dyn Tracer>,
) -> BaseRepository<T> {
    TracedRepository::new(GenericRepository::new(port), tracer)
}

/// Tracing decorator
pub struct TracedRepository<T: Entity, R: Repository<T>> {
    inner: R,
    tracer: Arc<dyn Tracer>,
    component: Cow<'static, str>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: Repository<T>> TracedRepository<T, R> {
    pub fn new(inner: R, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            inner,
            tracer,
            component: Cow::Borrowed(DEFAULT_COMPONENT),
            _entity: PhantomData,
        }
    }

    /// Builder: span name prefix
    pub fn with_component(mut self, component: impl Into<Cow<'static, str>>) -> Self {
        self.component = component.into();
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    async fn instrument<O, F, Fut>(
        &self,
        ctx: &Context,
        op: Operation,
        attributes: Vec<KeyValue>,
        call: F,
        completed: impl FnOnce(&O) -> Vec<KeyValue>,
    ) -> Result<O>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        let name = format!("{}.{}", self.component, op.name());
        in_span(
            self.tracer.as_ref(),
            ctx,
            &name,
            op.into(),
            attributes,
            call,
            completed,
        )
        .await
    }
}

impl<T: Entity, R: Repository<T> + Clone> Clone for TracedRepository<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            tracer: self.tracer.clone(),
            component: self.component.clone(),
            _entity: PhantomData,
        }
    }
}

fn entity_id<T: Entity>(entity: &T) -> Vec<KeyValue> {
    entity
        .id()
        .map(|id| vec![KeyValue::display("entity.id", &id)])
        .unwrap_or_default()
}

fn page_attributes(page: &PageRequest) -> Vec<KeyValue> {
    let mut attrs = Vec::with_capacity(3);
    if let Some(limit) = page.limit {
        attrs.push(KeyValue::u64("page.limit", limit as u64));
    }
    attrs.push(KeyValue::u64("page.offset", page.offset as u64));
    attrs.push(KeyValue::string("query.sort", page.sort.clone()));
    attrs
}

fn listed<T>(page: &Page<T>) -> Vec<KeyValue> {
    vec![
        KeyValue::u64("total", page.total),
        KeyValue::u64("items", page.items.len() as u64),
    ]
}

fn nothing<O>(_: &O) -> Vec<KeyValue> {
    Vec::new()
}

#[async_trait]
impl<T: Entity, R: Repository<T>> Repository<T> for TracedRepository<T, R> {
    async fn create(&self, ctx: &Context, entity: T) -> Result<T> {
        self.instrument(
            ctx,
            Operation::Create,
            Vec::new(),
            |ctx| async move { self.inner.create(&ctx, entity).await },
            |created: &T| entity_id(created),
        )
        .await
    }

    async fn update(&self, ctx: &Context, entity: T, params: &UpdatePayload) -> Result<T> {
        let mut attrs = entity_id(&entity);
        attrs.push(KeyValue::u64("update.fields", params.len() as u64));
        self.instrument(
            ctx,
            Operation::Update,
            attrs,
            |ctx| async move { self.inner.update(&ctx, entity, params).await },
            nothing,
        )
        .await
    }

    async fn update_by(
        &self,
        ctx: &Context,
        entity: T,
        condition: &Condition,
        params: &UpdatePayload,
    ) -> Result<T> {
        let attrs = vec![
            KeyValue::display("query.condition", condition),
            KeyValue::u64("update.fields", params.len() as u64),
        ];
        self.instrument(
            ctx,
            Operation::UpdateBy,
            attrs,
            |ctx| async move { self.inner.update_by(&ctx, entity, condition, params).await },
            nothing,
        )
        .await
    }

    async fn save(&self, ctx: &Context, entity: T) -> Result<T> {
        let attrs = entity_id(&entity);
        self.instrument(
            ctx,
            Operation::Save,
            attrs,
            |ctx| async move { self.inner.save(&ctx, entity).await },
            |saved: &T| entity_id(saved),
        )
        .await
    }

    async fn get_first_by_id(&self, ctx: &Context, id: &T::Id) -> Result<T> {
        self.instrument(
            ctx,
            Operation::GetFirstById,
            vec![KeyValue::display("entity.id", id)],
            |ctx| async move { self.inner.get_first_by_id(&ctx, id).await },
            nothing,
        )
        .await
    }

    async fn get_first_by(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<T> {
        let attrs = vec![
            KeyValue::display("query.condition", condition),
            KeyValue::string("query.sort", sort),
        ];
        self.instrument(
            ctx,
            Operation::GetFirstBy,
            attrs,
            |ctx| async move { self.inner.get_first_by(&ctx, condition, sort).await },
            |found: &T| entity_id(found),
        )
        .await
    }

    async fn get_all(&self, ctx: &Context, page: &PageRequest) -> Result<Page<T>> {
        self.instrument(
            ctx,
            Operation::GetAll,
            page_attributes(page),
            |ctx| async move { self.inner.get_all(&ctx, page).await },
            listed,
        )
        .await
    }

    async fn get_all_by(
        &self,
        ctx: &Context,
        page: &PageRequest,
        condition: &Condition,
    ) -> Result<Page<T>> {
        let mut attrs = page_attributes(page);
        attrs.push(KeyValue::display("query.condition", condition));
        self.instrument(
            ctx,
            Operation::GetAllBy,
            attrs,
            |ctx| async move { self.inner.get_all_by(&ctx, page, condition).await },
            listed,
        )
        .await
    }

    async fn delete(&self, ctx: &Context, entity: &T, id: &T::Id) -> Result<()> {
        self.instrument(
            ctx,
            Operation::Delete,
            vec![KeyValue::display("entity.id", id)],
            |ctx| async move { self.inner.delete(&ctx, entity, id).await },
            nothing,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::tracer::Span;
    use shared::{RepositoryError, SpanContext};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Item {
        id: u64,
        name: String,
    }

    impl Entity for Item {
        type Id = u64;
        const TABLE: &'static str = "items";

        fn id(&self) -> Option<u64> {
            (self.id != 0).then_some(self.id)
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Captured {
        name: String,
        span_id: u64,
        events: Vec<(String, Vec<KeyValue>)>,
        error: Option<RepositoryError>,
        ended: usize,
    }

    /// In-memory tracer for assertions
    #[derive(Default)]
    struct CapturingTracer {
        next_id: AtomicU64,
        spans: Arc<Mutex<Vec<Captured>>>,
    }

    impl CapturingTracer {
        fn spans(&self) -> Vec<Captured> {
            self.spans.lock().unwrap().clone()
        }
    }

    struct CapturedSpan {
        index: usize,
        context: SpanContext,
        spans: Arc<Mutex<Vec<Captured>>>,
    }

    impl Span for CapturedSpan {
        fn context(&self) -> SpanContext {
            self.context.clone()
        }
        fn add_event(&self, name: &str, attributes: &[KeyValue]) {
            self.spans.lock().unwrap()[self.index]
                .events
                .push((name.to_string(), attributes.to_vec()));
        }
        fn record_error(&self, error: &RepositoryError) {
            self.spans.lock().unwrap()[self.index].error = Some(error.clone());
        }
        fn end(&self) {
            self.spans.lock().unwrap()[self.index].ended += 1;
        }
    }

    impl Tracer for CapturingTracer {
        fn start_span(&self, parent: &Context, name: &str) -> (Context, Box<dyn Span>) {
            let span_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let mut spans = self.spans.lock().unwrap();
            spans.push(Captured {
                name: name.to_string(),
                span_id,
                ..Default::default()
            });
            let context = SpanContext {
                trace_id: "trace".to_string(),
                span_id,
            };
            let span = CapturedSpan {
                index: spans.len() - 1,
                context: context.clone(),
                spans: self.spans.clone(),
            };
            (parent.with_span(context), Box::new(span))
        }
    }

    /// Inner repository that counts calls and remembers the context it saw
    #[derive(Default)]
    struct StubRepository {
        calls: AtomicUsize,
        seen_span: Mutex<Option<u64>>,
        fail: Option<RepositoryError>,
        hang: bool,
        panic: bool,
    }

    impl StubRepository {
        async fn enter<O>(&self, ctx: &Context, value: O) -> Result<O> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_span.lock().unwrap() = ctx.span().map(|s| s.span_id);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.panic {
                panic!("driver bug");
            }
            match &self.fail {
                Some(err) => Err(err.clone()),
                None => Ok(value),
            }
        }
    }

    #[async_trait]
    impl Repository<Item> for StubRepository {
        async fn create(&self, ctx: &Context, mut entity: Item) -> Result<Item> {
            entity.id = 42;
            self.enter(ctx, entity).await
        }
        async fn update(&self, ctx: &Context, entity: Item, _p: &UpdatePayload) -> Result<Item> {
            self.enter(ctx, entity).await
        }
        async fn update_by(
            &self,
            ctx: &Context,
            entity: Item,
            _c: &Condition,
            _p: &UpdatePayload,
        ) -> Result<Item> {
            self.enter(ctx, entity).await
        }
        async fn save(&self, ctx: &Context, entity: Item) -> Result<Item> {
            self.enter(ctx, entity).await
        }
        async fn get_first_by_id(&self, ctx: &Context, id: &u64) -> Result<Item> {
            self.enter(ctx, Item { id: *id, name: "found".into() }).await
        }
        async fn get_first_by(&self, ctx: &Context, _c: &Condition, _s: &str) -> Result<Item> {
            self.enter(ctx, Item::default()).await
        }
        async fn get_all(&self, ctx: &Context, _page: &PageRequest) -> Result<Page<Item>> {
            self.enter(ctx, Page::new(vec![Item::default()], 12)).await
        }
        async fn get_all_by(
            &self,
            ctx: &Context,
            _page: &PageRequest,
            _c: &Condition,
        ) -> Result<Page<Item>> {
            self.enter(ctx, Page::new(Vec::new(), 0)).await
        }
        async fn delete(&self, ctx: &Context, _entity: &Item, _id: &u64) -> Result<()> {
            self.enter(ctx, ()).await
        }
    }

    fn traced(
        stub: StubRepository,
    ) -> (TracedRepository<Item, StubRepository>, Arc<CapturingTracer>) {
        let tracer = Arc::new(CapturingTracer::default());
        (TracedRepository::new(stub, tracer.clone()), tracer)
    }

    #[tokio::test]
    async fn test_success_emits_start_and_completed_and_ends_once() {
        let (repo, tracer) = traced(StubRepository::default());

        let item = repo
            .create(&Context::background(), Item { id: 0, name: "Alice".into() })
            .await
            .unwrap();
        assert_eq!(item.id, 42);

        let spans = tracer.spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "repository.Create");
        assert_eq!(span.ended, 1);
        assert!(span.error.is_none());
        assert_eq!(span.events[0].0, "Creating entity");
        assert_eq!(span.events[1].0, "Entity created");
        assert_eq!(span.events[1].1, vec![KeyValue::display("entity.id", &42)]);
        assert_eq!(repo.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_is_recorded_and_returned_unchanged() {
        let failure = RepositoryError::query("no such column: nope");
        let (repo, tracer) = traced(StubRepository {
            fail: Some(failure.clone()),
            ..Default::default()
        });

        let err = repo
            .get_all(&Context::background(), &PageRequest::new(10, 0, "nope"))
            .await
            .unwrap_err();
        assert_eq!(err, failure);

        let span = &tracer.spans()[0];
        assert_eq!(span.name, "repository.GetAll");
        assert_eq!(span.error, Some(failure));
        assert_eq!(span.ended, 1);
        assert_eq!(span.events.len(), 1, "no completed event on failure");
        assert_eq!(repo.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inner_runs_under_span_context() {
        let (repo, tracer) = traced(StubRepository::default());

        repo.get_first_by_id(&Context::background(), &7).await.unwrap();

        let span = &tracer.spans()[0];
        assert_eq!(*repo.inner().seen_span.lock().unwrap(), Some(span.span_id));
        assert_eq!(span.events[0].1, vec![KeyValue::display("entity.id", &7)]);
    }

    #[tokio::test]
    async fn test_listing_completed_event_carries_total() {
        let (repo, tracer) = traced(StubRepository::default());

        let page = repo
            .get_all(&Context::background(), &PageRequest::new(10, 0, "id desc"))
            .await
            .unwrap();
        assert_eq!(page.total, 12);

        let span = &tracer.spans()[0];
        assert_eq!(
            span.events[0].1,
            vec![
                KeyValue::u64("page.limit", 10),
                KeyValue::u64("page.offset", 0),
                KeyValue::string("query.sort", "id desc"),
            ]
        );
        assert_eq!(
            span.events[1].1,
            vec![KeyValue::u64("total", 12), KeyValue::u64("items", 1)]
        );
    }

    #[tokio::test]
    async fn test_every_operation_opens_one_span() {
        let (repo, tracer) = traced(StubRepository::default());
        let ctx = Context::background();
        let item = Item { id: 1, name: "x".into() };
        let params = UpdatePayload::new().set("name", "y");
        let cond = Condition::eq("name", "x");
        let page = PageRequest::unbounded();

        repo.create(&ctx, item.clone()).await.unwrap();
        repo.update(&ctx, item.clone(), &params).await.unwrap();
        repo.update_by(&ctx, item.clone(), &cond, &params).await.unwrap();
        repo.save(&ctx, item.clone()).await.unwrap();
        repo.get_first_by_id(&ctx, &1).await.unwrap();
        repo.get_first_by(&ctx, &cond, "id").await.unwrap();
        repo.get_all(&ctx, &page).await.unwrap();
        repo.get_all_by(&ctx, &page, &cond).await.unwrap();
        repo.delete(&ctx, &item, &1).await.unwrap();

        let names: Vec<String> = tracer.spans().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "repository.Create",
                "repository.Update",
                "repository.UpdateBy",
                "repository.Save",
                "repository.GetFirstByID",
                "repository.GetFirstBy",
                "repository.GetAll",
                "repository.GetAllBy",
                "repository.Delete",
            ]
        );
        assert!(tracer.spans().iter().all(|s| s.ended == 1));
        assert_eq!(repo.inner().calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_component_prefix() {
        let (repo, tracer) = traced(StubRepository::default());
        let repo = repo.with_component("users");

        repo.save(&Context::background(), Item { id: 3, name: "z".into() })
            .await
            .unwrap();

        assert_eq!(tracer.spans()[0].name, "users.Save");
    }

    #[tokio::test]
    async fn test_span_ends_when_future_is_dropped() {
        let (repo, tracer) = traced(StubRepository {
            hang: true,
            ..Default::default()
        });

        let outcome = tokio::time::timeout(
            Duration::from_millis(20),
            repo.get_first_by_id(&Context::background(), &1),
        )
        .await;
        assert!(outcome.is_err());

        let span = &tracer.spans()[0];
        assert_eq!(span.ended, 1);
        assert_eq!(span.events.len(), 1);
    }

    #[tokio::test]
    async fn test_span_ends_when_inner_panics() {
        let (repo, tracer) = traced(StubRepository {
            panic: true,
            ..Default::default()
        });
        let repo = Arc::new(repo);

        let task = {
            let repo = repo.clone();
            tokio::spawn(async move { repo.delete(&Context::background(), &Item::default(), &5).await })
        };
        let joined = task.await;
        assert!(joined.unwrap_err().is_panic());

        let span = &tracer.spans()[0];
        assert_eq!(span.name, "repository.Delete");
        assert_eq!(span.ended, 1);
    }

    struct PanickingTracer;

    struct PanickingSpan;

    impl Span for PanickingSpan {
        fn context(&self) -> SpanContext {
            SpanContext {
                trace_id: String::new(),
                span_id: 0,
            }
        }
        fn add_event(&self, _name: &str, _attributes: &[KeyValue]) {
            panic!("collector gone");
        }
        fn record_error(&self, _error: &RepositoryError) {
            panic!("collector gone");
        }
        fn end(&self) {
            panic!("collector gone");
        }
    }

    impl Tracer for PanickingTracer {
        fn start_span(&self, parent: &Context, _name: &str) -> (Context, Box<dyn Span>) {
            (parent.clone(), Box::new(PanickingSpan))
        }
    }

    #[tokio::test]
    async fn test_tracer_faults_never_change_the_outcome() {
        let ok: TracedRepository<Item, _> =
            TracedRepository::new(StubRepository::default(), Arc::new(PanickingTracer));
        let created = ok
            .create(&Context::background(), Item::default())
            .await
            .unwrap();
        assert_eq!(created.id, 42);

        let failing: TracedRepository<Item, _> = TracedRepository::new(
            StubRepository {
                fail: Some(RepositoryError::not_found("items", 1)),
                ..Default::default()
            },
            Arc::new(PanickingTracer),
        );
        let err = failing
            .get_first_by_id(&Context::background(), &1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
