//! In-Memory Persistence Engine
//!
//! Generic `PersistencePort<T>` over JSON rows. Any entity that serializes
//! to a JSON object can be stored: columns are discovered from
//! `T::default()`, missing integer keys are assigned from a sequence, and
//! simple column constraints reproduce the failures a SQL backend raises.
//! Useful for testing, development and the demo binary.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use baserepo_domain::{Condition, Entity, PersistencePort, UpdatePayload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::{Context, RepositoryError, Result, StoreConfig};
use tracing::debug;

use super::query::{compare_values, parse_sort, sort_rows, Filter, Row, SortKey};

/// Column constraint checked on every insert and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Column must be present, non-null and not `""`
    NotEmpty(String),
    /// Column must be present and non-null
    NotNull(String),
    /// No two rows share the same non-null value
    Unique(String),
}

impl Constraint {
    pub fn not_empty(field: impl Into<String>) -> Self {
        Constraint::NotEmpty(field.into())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Constraint::NotNull(field.into())
    }

    pub fn unique(field: impl Into<String>) -> Self {
        Constraint::Unique(field.into())
    }

    fn field(&self) -> &str {
        match self {
            Constraint::NotEmpty(f) | Constraint::NotNull(f) | Constraint::Unique(f) => f,
        }
    }
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    last_id: u64,
}

/// In-memory store for one entity type
///
/// Thread-safe implementation using RwLock; clones share the same table.
#[derive(Debug, Clone)]
pub struct InMemoryStore<T> {
    table: Arc<RwLock<Table>>,
    columns: Arc<BTreeSet<String>>,
    constraints: Arc<Vec<Constraint>>,
    latency: Option<Duration>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> InMemoryStore<T>
where
    T: Entity + Serialize + DeserializeOwned,
    T::Id: Serialize,
{
    pub fn new() -> Self {
        let columns = match serde_json::to_value(T::default()) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            _ => BTreeSet::new(),
        };

        Self {
            table: Arc::new(RwLock::new(Table::default())),
            columns: Arc::new(columns),
            constraints: Arc::new(Vec::new()),
            latency: None,
            _entity: PhantomData,
        }
    }

    /// Apply `store` settings from the configuration file
    pub fn with_config(self, store: &StoreConfig) -> Self {
        match store.latency() {
            Some(latency) => self.with_latency(latency),
            None => self,
        }
    }

    /// Builder: add a column constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        Arc::make_mut(&mut self.constraints).push(constraint);
        self
    }

    /// Builder: simulated latency for every operation
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Column names known for `T`
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.as_str())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ========== Plumbing ==========

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>> {
        self.table
            .read()
            .map_err(|_| RepositoryError::persistence("Failed to acquire read lock"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>> {
        self.table
            .write()
            .map_err(|_| RepositoryError::persistence("Failed to acquire write lock"))
    }

    /// Honour the context, waiting out the simulated latency
    async fn begin(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;
        if let Some(latency) = self.latency {
            ctx.run(async {
                tokio::time::sleep(latency).await;
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    fn to_row(entity: &T) -> Result<Row> {
        match serde_json::to_value(entity) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RepositoryError::persistence(format!(
                "{} entity does not serialize to an object",
                T::TABLE
            ))),
            Err(e) => Err(RepositoryError::persistence(e.to_string())),
        }
    }

    fn from_row(row: &Row) -> Result<T> {
        serde_json::from_value(Value::Object(row.clone()))
            .map_err(|e| RepositoryError::persistence(format!("decode {}: {}", T::TABLE, e)))
    }

    fn id_value(id: &T::Id) -> Result<Value> {
        serde_json::to_value(id).map_err(|e| RepositoryError::argument(e.to_string()))
    }

    /// Primary key of `row`, unless it is missing or a zero value
    fn key_of(row: &Row) -> Option<Value> {
        match row.get(T::PRIMARY_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(key) => Some(key.clone()),
        }
    }

    fn position(table: &Table, key: &Value) -> Option<usize> {
        table.rows.iter().position(|row| {
            row.get(T::PRIMARY_KEY)
                .and_then(|k| compare_values(k, key))
                .is_some_and(|o| o.is_eq())
        })
    }

    fn check_columns<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a str>,
        err: fn(String) -> RepositoryError,
    ) -> Result<()> {
        for field in fields {
            if !self.columns.contains(field) {
                return Err(err(format!("no such column: {}.{}", T::TABLE, field)));
            }
        }
        Ok(())
    }

    fn compile(&self, condition: &Condition) -> Result<Filter> {
        self.check_columns(condition.fields(), |m| RepositoryError::query(m))?;
        Filter::compile(condition)
    }

    fn sort_keys(&self, sort: &str) -> Result<Vec<SortKey>> {
        let mut keys = parse_sort(sort)?;
        self.check_columns(keys.iter().map(|k| k.field.as_str()), |m| {
            RepositoryError::query(m)
        })?;
        if keys.is_empty() {
            keys.push(SortKey {
                field: T::PRIMARY_KEY.to_string(),
                descending: false,
            });
        }
        Ok(keys)
    }

    fn check_payload(&self, payload: &UpdatePayload) -> Result<()> {
        if payload.is_empty() {
            return Err(RepositoryError::persistence(format!(
                "no fields to update on {}",
                T::TABLE
            )));
        }
        if payload.get(T::PRIMARY_KEY).is_some() {
            return Err(RepositoryError::persistence(format!(
                "primary key {}.{} cannot be updated",
                T::TABLE,
                T::PRIMARY_KEY
            )));
        }
        self.check_columns(payload.field_names(), |m| RepositoryError::persistence(m))
    }

    /// Verify constraints for `row`, which sits (or will sit) at `slot`
    fn check_constraints(&self, row: &Row, rows: &[Row], slot: Option<usize>) -> Result<()> {
        for constraint in self.constraints.iter() {
            let field = constraint.field();
            let value = row.get(field).unwrap_or(&Value::Null);
            let violated = match constraint {
                Constraint::NotEmpty(_) => {
                    value.is_null() || value.as_str().is_some_and(str::is_empty)
                }
                Constraint::NotNull(_) => value.is_null(),
                Constraint::Unique(_) => {
                    !value.is_null()
                        && rows.iter().enumerate().any(|(i, other)| {
                            Some(i) != slot
                                && other
                                    .get(field)
                                    .and_then(|v| compare_values(v, value))
                                    .is_some_and(|o| o.is_eq())
                        })
                }
            };
            if violated {
                let kind = match constraint {
                    Constraint::NotEmpty(_) => "CHECK",
                    Constraint::NotNull(_) => "NOT NULL",
                    Constraint::Unique(_) => "UNIQUE",
                };
                return Err(RepositoryError::persistence(format!(
                    "{} constraint failed: {}.{}",
                    kind,
                    T::TABLE,
                    field
                )));
            }
        }
        Ok(())
    }

    /// Insert `row`, assigning the next key when it has none
    ///
    /// Nothing is written unless the stored row decodes back into `T`.
    fn insert(&self, table: &mut Table, mut row: Row) -> Result<T> {
        let next_id = match Self::key_of(&row) {
            Some(key) => {
                if Self::position(table, &key).is_some() {
                    return Err(RepositoryError::persistence(format!(
                        "UNIQUE constraint failed: {}.{}",
                        T::TABLE,
                        T::PRIMARY_KEY
                    )));
                }
                key.as_u64().map_or(table.last_id, |n| n.max(table.last_id))
            }
            None => {
                if row.get(T::PRIMARY_KEY).is_some_and(Value::is_string) {
                    return Err(RepositoryError::argument(format!(
                        "{}.{} must be set: only integer keys are generated",
                        T::TABLE,
                        T::PRIMARY_KEY
                    )));
                }
                let next = table.last_id.checked_add(1).ok_or_else(|| {
                    RepositoryError::persistence(format!(
                        "{}.{} sequence exhausted",
                        T::TABLE,
                        T::PRIMARY_KEY
                    ))
                })?;
                row.insert(T::PRIMARY_KEY.to_string(), Value::from(next));
                next
            }
        };

        self.check_constraints(&row, &table.rows, None)?;
        let stored = Self::from_row(&row)?;
        table.last_id = next_id;
        table.rows.push(row);
        Ok(stored)
    }

    fn select<'t>(
        &self,
        table: &'t Table,
        condition: &Condition,
        sort: &str,
    ) -> Result<Vec<&'t Row>> {
        let filter = self.compile(condition)?;
        let keys = self.sort_keys(sort)?;
        let mut rows: Vec<&Row> = table.rows.iter().filter(|r| filter.matches(r)).collect();
        sort_rows(&mut rows, &keys);
        Ok(rows)
    }
}

impl<T> Default for InMemoryStore<T>
where
    T: Entity + Serialize + DeserializeOwned,
    T::Id: Serialize,
{
    fn default() -> Self {
        Self::new()
    }
}

fn apply(payload: &UpdatePayload, row: &mut Row) {
    for (field, value) in payload.iter() {
        row.insert(field.to_string(), value.clone());
    }
}

#[async_trait]
impl<T> PersistencePort<T> for InMemoryStore<T>
where
    T: Entity + Serialize + DeserializeOwned,
    T::Id: Serialize,
{
    async fn create(&self, ctx: &Context, entity: &mut T) -> Result<()> {
        self.begin(ctx).await?;
        let row = Self::to_row(entity)?;

        let mut table = self.write()?;
        *entity = self.insert(&mut table, row)?;

        debug!(table = T::TABLE, rows = table.rows.len(), "row inserted");
        Ok(())
    }

    async fn update_model(
        &self,
        ctx: &Context,
        entity: &mut T,
        payload: &UpdatePayload,
    ) -> Result<()> {
        self.begin(ctx).await?;
        self.check_payload(payload)?;

        let mut row = Self::to_row(entity)?;
        let key = Self::key_of(&row).ok_or_else(|| {
            RepositoryError::persistence(format!(
                "WHERE conditions required: {} has no primary key value",
                T::TABLE
            ))
        })?;

        let mut table = self.write()?;
        let slot = Self::position(&table, &key)
            .ok_or_else(|| RepositoryError::not_found(T::TABLE, &key))?;

        let mut updated = table.rows[slot].clone();
        apply(payload, &mut updated);
        self.check_constraints(&updated, &table.rows, Some(slot))?;
        Self::from_row(&updated)?;

        apply(payload, &mut row);
        let patched = Self::from_row(&row)?;

        table.rows[slot] = updated;
        *entity = patched;

        debug!(table = T::TABLE, key = %key, fields = payload.len(), "row updated");
        Ok(())
    }

    async fn update_where(
        &self,
        ctx: &Context,
        entity: &mut T,
        condition: &Condition,
        payload: &UpdatePayload,
    ) -> Result<u64> {
        self.begin(ctx).await?;
        self.check_payload(payload)?;
        let filter = self.compile(condition)?;

        let mut table = self.write()?;
        let slots: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.matches(row))
            .map(|(i, _)| i)
            .collect();

        // All rows change or none do.
        let mut staged = table.rows.clone();
        for &slot in &slots {
            apply(payload, &mut staged[slot]);
        }
        for &slot in &slots {
            self.check_constraints(&staged[slot], &staged, Some(slot))?;
            Self::from_row(&staged[slot])?;
        }

        let mut row = Self::to_row(entity)?;
        apply(payload, &mut row);
        let patched = Self::from_row(&row)?;

        table.rows = staged;
        *entity = patched;

        debug!(table = T::TABLE, condition = %condition, affected = slots.len(), "rows updated");
        Ok(slots.len() as u64)
    }

    async fn save(&self, ctx: &Context, entity: &mut T) -> Result<()> {
        self.begin(ctx).await?;
        let row = Self::to_row(entity)?;

        let mut table = self.write()?;
        *entity = match Self::key_of(&row) {
            Some(key) => match Self::position(&table, &key) {
                Some(slot) => {
                    self.check_constraints(&row, &table.rows, Some(slot))?;
                    let stored = Self::from_row(&row)?;
                    table.rows[slot] = row;
                    stored
                }
                None => self.insert(&mut table, row)?,
            },
            None => self.insert(&mut table, row)?,
        };

        debug!(table = T::TABLE, "row saved");
        Ok(())
    }

    async fn find_by_id(&self, ctx: &Context, id: &T::Id) -> Result<T> {
        self.begin(ctx).await?;
        let key = Self::id_value(id)?;

        let table = self.read()?;
        match Self::position(&table, &key) {
            Some(slot) => Self::from_row(&table.rows[slot]),
            None => Err(RepositoryError::not_found(T::TABLE, id)),
        }
    }

    async fn find_one(&self, ctx: &Context, condition: &Condition, sort: &str) -> Result<T> {
        self.begin(ctx).await?;

        let table = self.read()?;
        let rows = self.select(&table, condition, sort)?;
        match rows.first() {
            Some(row) => Self::from_row(row),
            None => Err(RepositoryError::not_found(
                T::TABLE,
                format!("record matching {}", condition),
            )),
        }
    }

    async fn find_many(
        &self,
        ctx: &Context,
        condition: &Condition,
        limit: Option<usize>,
        offset: usize,
        sort: &str,
    ) -> Result<Vec<T>> {
        self.begin(ctx).await?;

        let table = self.read()?;
        let rows = self.select(&table, condition, sort)?;
        rows.into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(Self::from_row)
            .collect()
    }

    async fn count(&self, ctx: &Context, condition: &Condition) -> Result<u64> {
        self.begin(ctx).await?;
        let filter = self.compile(condition)?;

        let table = self.read()?;
        Ok(table.rows.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn delete(&self, ctx: &Context, _entity: &T, id: &T::Id) -> Result<u64> {
        self.begin(ctx).await?;
        let key = Self::id_value(id)?;

        let mut table = self.write()?;
        match Self::position(&table, &key) {
            Some(slot) => {
                table.rows.remove(slot);
                debug!(table = T::TABLE, key = %key, "row deleted");
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
