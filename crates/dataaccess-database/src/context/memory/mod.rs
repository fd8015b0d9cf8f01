//! In-memory persistence context.
//!
//! Behaves like [`PgContext`](super::postgres::PgContext) against a
//! [`MemoryStore`]: same filter semantics, same atomic commit, same
//! stored-procedure dispatch. Used by tests and by callers that need a
//! throwaway unit of work.

pub mod eval;
pub mod store;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub use store::MemoryStore;

use dataaccess_core::error::AppError;
use dataaccess_core::procedure::{ProcedureOutcome, ProcedureRegistry};
use dataaccess_core::result::AppResult;
use dataaccess_core::tracker::{ChangeTracker, PendingChange};
use dataaccess_core::traits::{Entity, EntitySet, PersistenceContext};
use dataaccess_core::types::{Filter, QuerySpec, SqlValue};

/// Unit of work over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryContext {
    store: Option<MemoryStore>,
    tracker: ChangeTracker,
    procedures: ProcedureRegistry<MemoryStore>,
}

impl MemoryContext {
    /// Open a context over `store`.
    pub fn new(store: &MemoryStore) -> Self {
        store.acquire();
        Self {
            store: Some(store.clone()),
            tracker: ChangeTracker::new(),
            procedures: ProcedureRegistry::new(),
        }
    }

    /// Use `procedures` for stored-procedure dispatch.
    pub fn with_procedures(mut self, procedures: ProcedureRegistry<MemoryStore>) -> Self {
        self.procedures = procedures;
        self
    }

    /// Whether the store handle has been released.
    pub fn is_released(&self) -> bool {
        self.store.is_none()
    }

    fn store(&self) -> AppResult<&MemoryStore> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::disposed("In-memory context has been released"))
    }

    async fn matching_rows(&self, table: &str, filter: Option<&Filter>) -> AppResult<Vec<Value>> {
        let rows = self.store()?.rows(table).await?;
        let Some(filter) = filter else {
            return Ok(rows);
        };

        let mut matching = Vec::with_capacity(rows.len());
        for row in rows {
            if eval::matches(filter, &row)? {
                matching.push(row);
            }
        }
        Ok(matching)
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl PersistenceContext for MemoryContext {
    fn set<E: Entity>(&self) -> EntitySet<E> {
        EntitySet::new(E::TABLE)
    }

    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    async fn load(&self, table: &str, key_column: &str, key: &Value) -> AppResult<Option<Value>> {
        let rows = self.store()?.rows(table).await?;
        Ok(rows.into_iter().find(|row| row.get(key_column) == Some(key)))
    }

    async fn query(&self, table: &str, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        spec.validate()?;

        let mut rows = self
            .matching_rows(table, spec.filter.as_ref())
            .await?
            .iter()
            .map(|row| eval::project(row, &spec.projection))
            .collect::<AppResult<Vec<_>>>()?;

        if !spec.order_by.is_empty() {
            eval::check_sort_columns(&rows, &spec.order_by)?;
            rows.sort_by(|a, b| eval::compare_rows(a, b, &spec.order_by));
        }

        if let Some(page) = spec.page {
            rows = rows
                .into_iter()
                .skip(to_usize(page.offset()))
                .take(to_usize(page.limit()))
                .collect();
        }

        debug!(table, rows = rows.len(), "In-memory query");
        Ok(rows)
    }

    async fn count(&self, table: &str, filter: Option<&Filter>) -> AppResult<u64> {
        let rows = self.matching_rows(table, filter).await?;
        Ok(rows.len() as u64)
    }

    async fn commit(&mut self, changes: &[PendingChange]) -> AppResult<()> {
        self.store()?.apply(changes).await?;
        debug!(changes = changes.len(), "Committed in-memory changes");
        Ok(())
    }

    async fn call_procedure(
        &self,
        name: &str,
        params: Vec<SqlValue>,
    ) -> AppResult<ProcedureOutcome<Value>> {
        let store = self.store()?.clone();
        let handler = self.procedures.resolve(name)?;
        handler(store, params).await
    }

    fn release(&mut self) {
        if let Some(store) = self.store.take() {
            store.release();
            self.tracker.clear();
            debug!(open_contexts = store.open_contexts(), "Released in-memory context");
        }
    }
}

impl Drop for MemoryContext {
    fn drop(&mut self) {
        self.release();
    }
}
