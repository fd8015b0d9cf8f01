//! Persistence context abstraction.
//!
//! A context is a unit of work over one store: it owns the store handle,
//! the change tracker and the procedure registry. Store technologies
//! implement the primitives; find/add/remove/mark-modified/save are
//! provided on top of the tracker.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::entity::{Entity, EntitySet};
use crate::procedure::ProcedureOutcome;
use crate::result::AppResult;
use crate::tracker::{ChangeTracker, EntityState, PendingChange};
use crate::types::filter::Filter;
use crate::types::query::QuerySpec;
use crate::types::value::SqlValue;

/// A unit of work over a relational store.
///
/// Not safe for concurrent use: every mutating method takes `&mut self`.
#[async_trait]
pub trait PersistenceContext: Send + Sync + 'static {
    /// The entity set for `E` within this context.
    fn set<E: Entity>(&self) -> EntitySet<E>;

    /// The change tracker.
    fn tracker(&self) -> &ChangeTracker;

    /// The change tracker, mutably.
    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    /// Read one row by key from the store, bypassing the tracker.
    async fn load(&self, table: &str, key_column: &str, key: &Value) -> AppResult<Option<Value>>;

    /// Run a filtered, projected, ordered and paged query.
    async fn query(&self, table: &str, spec: &QuerySpec) -> AppResult<Vec<Value>>;

    /// Count the rows matching `filter` with a single aggregate.
    async fn count(&self, table: &str, filter: Option<&Filter>) -> AppResult<u64>;

    /// Apply every change atomically: all of them or none.
    async fn commit(&mut self, changes: &[PendingChange]) -> AppResult<()>;

    /// Invoke a registered stored procedure.
    async fn call_procedure(
        &self,
        name: &str,
        params: Vec<SqlValue>,
    ) -> AppResult<ProcedureOutcome<Value>>;

    /// Release the store handle. Must be idempotent.
    fn release(&mut self);

    /// Release the store handle, waiting for a graceful shutdown where the
    /// store supports one.
    async fn close(&mut self) {
        self.release();
    }

    /// Find an entity by key.
    ///
    /// Tracked entities are answered from the tracker (an entity staged for
    /// deletion is not found); otherwise the store is read and the result is
    /// tracked as unchanged.
    async fn find<E: Entity>(
        &mut self,
        set: &EntitySet<E>,
        key: &E::Key,
    ) -> AppResult<Option<E>> {
        let (entity_key, key_value) = set.key_entry(key)?;
        match self.tracker().state(&entity_key) {
            EntityState::Deleted => return Ok(None),
            EntityState::Detached => {}
            _ => {
                if let Some(values) = self.tracker().values(&entity_key) {
                    return set.decode(values.clone()).map(Some);
                }
            }
        }

        let Some(values) = self.load(set.table(), set.key_column(), &key_value).await? else {
            debug!(table = set.table(), key = %key_value, "Entity not found");
            return Ok(None);
        };

        let entity = set.decode(values)?;
        let row = set.row(&entity)?;
        self.tracker_mut().track_loaded(row);
        Ok(Some(entity))
    }

    /// Stage an insert.
    fn add<E: Entity>(&mut self, set: &EntitySet<E>, entity: &E) -> AppResult<EntityState> {
        let row = set.row(entity)?;
        Ok(self.tracker_mut().add(row))
    }

    /// Track a detached entity as unchanged.
    fn attach<E: Entity>(&mut self, set: &EntitySet<E>, entity: &E) -> AppResult<EntityState> {
        let row = set.row(entity)?;
        Ok(self.tracker_mut().attach(row))
    }

    /// Stage a delete of a tracked entity.
    fn remove<E: Entity>(&mut self, set: &EntitySet<E>, entity: &E) -> AppResult<EntityState> {
        let (entity_key, _) = set.key_entry(&entity.key())?;
        self.tracker_mut().remove(&entity_key)
    }

    /// Mark every column of an entity dirty.
    fn mark_modified<E: Entity>(
        &mut self,
        set: &EntitySet<E>,
        entity: &E,
    ) -> AppResult<EntityState> {
        let row = set.row(entity)?;
        Ok(self.tracker_mut().mark_modified(row))
    }

    /// Tracking state of an entity.
    fn entry_state<E: Entity>(&self, set: &EntitySet<E>, entity: &E) -> AppResult<EntityState> {
        let (entity_key, _) = set.key_entry(&entity.key())?;
        Ok(self.tracker().state(&entity_key))
    }

    /// Commit every pending change and return how many were written.
    async fn save_changes(&mut self) -> AppResult<usize> {
        let pending = self.tracker().pending();
        if pending.is_empty() {
            return Ok(0);
        }

        self.commit(&pending).await?;
        self.tracker_mut().accept_all();
        Ok(pending.len())
    }
}
