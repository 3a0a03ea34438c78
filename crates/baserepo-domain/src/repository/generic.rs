//! Generic Repository - One persistence contract for every entity type
//!
//! `Repository<T>` is what callers program against. `GenericRepository`
//! implements it by handing each operation to a [`PersistencePort`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use shared::{Context, RepositoryError, Result};

use crate::model::condition::Condition;
use crate::model::entity::Entity;
use crate::model::page::{Page, PageRequest};
use crate::model::update::UpdatePayload;
use crate::port::persistence::PersistencePort;

/// Repository Trait
///
/// Mutating operations take the entity by value and hand it back, so the
/// caller keeps sole ownership across the call.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Insert; the returned entity carries store-assigned fields
    async fn create(&self, ctx: &Context, entity: T) -> Result<T>;

    /// Apply `params` to the row identified by `entity`'s identity
    async fn update(&self, ctx: &Context, entity: T, params: &UpdatePayload) -> Result<T>;

    /// Apply `params` to every row matching `condition`
    async fn update_by(
        &self,
        ctx: &Context,
        entity: T,
        condition: &Condition,
        params: &UpdatePayload,
    ) -> Result<T>;

    /// Insert or update depending on whether the identity is set
    async fn save(&self, ctx: &Context, entity: T) -> Result<T>;

    async fn get_first_by_id(&self, ctx: &Context, id: &T::Id) -> Result<T>;

    async fn get_first_by(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<T>;

    /// One page of all rows; `total` is the unfiltered row count
    async fn get_all(&self, ctx: &Context, page: &PageRequest) -> Result<Page<T>>;

    /// One page of matching rows; `total` is the filtered row count
    async fn get_all_by(
        &self,
        ctx: &Context,
        page: &PageRequest,
        condition: &Condition,
    ) -> Result<Page<T>>;

    /// Delete the row identified by `id`
    ///
    /// Removing nothing is `NotFound`, for every entity type and backend.
    async fn delete(&self, ctx: &Context, entity: &T, id: &T::Id) -> Result<()>;
}

/// Repository backed directly by a persistence port
pub struct GenericRepository<T: Entity, P: ?Sized + PersistencePort<T> = dyn PersistencePort<T>> {
    port: Arc<P>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, P: ?Sized + PersistencePort<T>> GenericRepository<T, P> {
    pub fn new(port: Arc<P>) -> Self {
        Self {
            port,
            _entity: PhantomData,
        }
    }

    pub fn port(&self) -> &Arc<P> {
        &self.port
    }
}

impl<T: Entity, P: ?Sized + PersistencePort<T>> Clone for GenericRepository<T, P> {
    fn clone(&self) -> Self {
        Self::new(self.port.clone())
    }
}

#[async_trait]
impl<T: Entity, P: ?Sized + PersistencePort<T>> Repository<T> for GenericRepository<T, P> {
    async fn create(&self, ctx: &Context, mut entity: T) -> Result<T> {
        self.port.create(ctx, &mut entity).await?;
        Ok(entity)
    }

    async fn update(&self, ctx: &Context, mut entity: T, params: &UpdatePayload) -> Result<T> {
        self.port.update_model(ctx, &mut entity, params).await?;
        Ok(entity)
    }

    async fn update_by(
        &self,
        ctx: &Context,
        mut entity: T,
        condition: &Condition,
        params: &UpdatePayload,
    ) -> Result<T> {
        let affected = self
            .port
            .update_where(ctx, &mut entity, condition, params)
            .await?;
        tracing::debug!(table = T::TABLE, affected, "update_by applied");
        Ok(entity)
    }

    async fn save(&self, ctx: &Context, mut entity: T) -> Result<T> {
        if entity.is_zero() {
            return Err(RepositoryError::argument(format!(
                "cannot save an empty {} entity",
                T::TABLE
            )));
        }
        self.port.save(ctx, &mut entity).await?;
        Ok(entity)
    }

    async fn get_first_by_id(&self, ctx: &Context, id: &T::Id) -> Result<T> {
        self.port.find_by_id(ctx, id).await
    }

    async fn get_first_by(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<T> {
        self.port.find_one(ctx, condition, sort).await
    }

    async fn get_all(&self, ctx: &Context, page: &PageRequest) -> Result<Page<T>> {
        self.get_all_by(ctx, page, &Condition::All).await
    }

    async fn get_all_by(
        &self,
        ctx: &Context,
        page: &PageRequest,
        condition: &Condition,
    ) -> Result<Page<T>> {
        let total = self.port.count(ctx, condition).await?;
        let items = self
            .port
            .find_many(ctx, condition, page.limit, page.offset, &page.sort)
            .await?;
        Ok(Page::new(items, total))
    }

    async fn delete(&self, ctx: &Context, entity: &T, id: &T::Id) -> Result<()> {
        match self.port.delete(ctx, entity, id).await? {
            0 => Err(RepositoryError::not_found(T::TABLE, id)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        id: u64,
        body: String,
    }

    impl Entity for Note {
        type Id = u64;
        const TABLE: &'static str = "notes";

        fn id(&self) -> Option<u64> {
            (self.id != 0).then_some(self.id)
        }
    }

    /// Port that records calls and answers from a fixed script
    #[derive(Default)]
    struct ScriptedPort {
        calls: Mutex<Vec<String>>,
        total: u64,
        rows: Vec<Note>,
        deleted: u64,
        fail_with: Option<RepositoryError>,
    }

    impl ScriptedPort {
        fn log(&self, call: &str) -> Result<()> {
            self.calls.lock().unwrap().push(call.to_string());
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PersistencePort<Note> for ScriptedPort {
        async fn create(&self, _ctx: &Context, entity: &mut Note) -> Result<()> {
            self.log("create")?;
            entity.id = 1;
            Ok(())
        }

        async fn update_model(
            &self,
            _ctx: &Context,
            entity: &mut Note,
            payload: &UpdatePayload,
        ) -> Result<()> {
            self.log("update_model")?;
            if let Some(body) = payload.get("body").and_then(|v| v.as_str()) {
                entity.body = body.to_string();
            }
            Ok(())
        }

        async fn update_where(
            &self,
            _ctx: &Context,
            _entity: &mut Note,
            _condition: &Condition,
            _payload: &UpdatePayload,
        ) -> Result<u64> {
            self.log("update_where")?;
            Ok(2)
        }

        async fn save(&self, _ctx: &Context, _entity: &mut Note) -> Result<()> {
            self.log("save")
        }

        async fn find_by_id(&self, _ctx: &Context, id: &u64) -> Result<Note> {
            self.log("find_by_id")?;
            self.rows
                .iter()
                .find(|n| n.id == *id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("notes", id))
        }

        async fn find_one(&self, _ctx: &Context, _condition: &Condition, sort: &str) -> Result<Note> {
            self.log(&format!("find_one:{}", sort))?;
            self.rows
                .first()
                .cloned()
                .ok_or_else(|| RepositoryError::not_found("notes", "condition"))
        }

        async fn find_many(
            &self,
            _ctx: &Context,
            condition: &Condition,
            limit: Option<usize>,
            offset: usize,
            sort: &str,
        ) -> Result<Vec<Note>> {
            self.log(&format!(
                "find_many:{}:{:?}:{}:{}",
                condition, limit, offset, sort
            ))?;
            Ok(self.rows.clone())
        }

        async fn count(&self, _ctx: &Context, condition: &Condition) -> Result<u64> {
            self.log(&format!("count:{}", condition))?;
            Ok(self.total)
        }

        async fn delete(&self, _ctx: &Context, _entity: &Note, _id: &u64) -> Result<u64> {
            self.log("delete")?;
            Ok(self.deleted)
        }
    }

    fn repo(port: ScriptedPort) -> (GenericRepository<Note, ScriptedPort>, Arc<ScriptedPort>) {
        let port = Arc::new(port);
        (GenericRepository::new(port.clone()), port)
    }

    #[tokio::test]
    async fn test_create_returns_store_assigned_fields() {
        let (repo, port) = repo(ScriptedPort::default());
        let ctx = Context::background();

        let note = repo
            .create(&ctx, Note { id: 0, body: "hello".into() })
            .await
            .unwrap();

        assert_eq!(note.id, 1);
        assert_eq!(note.body, "hello");
        assert_eq!(port.calls(), vec!["create"]);
    }

    #[tokio::test]
    async fn test_update_returns_overridden_entity() {
        let (repo, _) = repo(ScriptedPort::default());
        let params = UpdatePayload::new().set("body", "edited");

        let note = repo
            .update(&Context::background(), Note { id: 4, body: "draft".into() }, &params)
            .await
            .unwrap();

        assert_eq!(note, Note { id: 4, body: "edited".into() });
    }

    #[tokio::test]
    async fn test_save_rejects_zero_value_without_touching_port() {
        let (repo, port) = repo(ScriptedPort::default());

        let err = repo
            .save(&Context::background(), Note::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::ArgumentError { .. }));
        assert!(port.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_counts_unfiltered_then_pages() {
        let (repo, port) = repo(ScriptedPort {
            total: 5,
            rows: vec![Note { id: 5, body: "e".into() }],
            ..Default::default()
        });

        let page = repo
            .get_all(&Context::background(), &PageRequest::new(1, 4, "id desc"))
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.len(), 1);
        assert_eq!(
            port.calls(),
            vec!["count:TRUE", "find_many:TRUE:Some(1):4:id desc"]
        );
    }

    #[tokio::test]
    async fn test_get_all_by_forwards_condition_to_count_and_find() {
        let (repo, port) = repo(ScriptedPort {
            total: 2,
            ..Default::default()
        });
        let cond = Condition::eq("body", "x");

        let page = repo
            .get_all_by(&Context::background(), &PageRequest::unbounded(), &cond)
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert!(page.is_empty());
        assert_eq!(
            port.calls(),
            vec![r#"count:body = "x""#, r#"find_many:body = "x":None:0:"#]
        );
    }

    #[tokio::test]
    async fn test_delete_zero_rows_is_not_found() {
        let (repo, _) = repo(ScriptedPort::default());
        let note = Note { id: 9, body: String::new() };

        let err = repo
            .delete(&Context::background(), &note, &9)
            .await
            .unwrap_err();

        assert_eq!(err, RepositoryError::not_found("notes", 9));
    }

    #[tokio::test]
    async fn test_delete_one_row_succeeds() {
        let (repo, port) = repo(ScriptedPort {
            deleted: 1,
            ..Default::default()
        });

        repo.delete(&Context::background(), &Note::default(), &1)
            .await
            .unwrap();
        assert_eq!(port.calls(), vec!["delete"]);
    }

    #[tokio::test]
    async fn test_port_errors_are_forwarded_verbatim() {
        let failure = RepositoryError::persistence("connection reset");
        let (repo, _) = repo(ScriptedPort {
            fail_with: Some(failure.clone()),
            ..Default::default()
        });
        let ctx = Context::background();

        assert_eq!(repo.create(&ctx, Note::default()).await.unwrap_err(), failure);
        assert_eq!(repo.get_first_by_id(&ctx, &1).await.unwrap_err(), failure);
        assert_eq!(
            repo.get_first_by(&ctx, &Condition::All, "").await.unwrap_err(),
            failure
        );
        assert_eq!(
            repo.get_all(&ctx, &PageRequest::unbounded()).await.unwrap_err(),
            failure
        );
    }

    #[tokio::test]
    async fn test_works_behind_dyn_port() {
        let port: Arc<dyn PersistencePort<Note>> = Arc::new(ScriptedPort {
            rows: vec![Note { id: 3, body: "c".into() }],
            ..Default::default()
        });
        let repo: GenericRepository<Note> = GenericRepository::new(port);

        let note = repo.get_first_by_id(&Context::background(), &3).await.unwrap();
        assert_eq!(note.body, "c");
    }
}
