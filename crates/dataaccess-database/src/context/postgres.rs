//! PostgreSQL persistence context.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use dataaccess_core::config::DatabaseConfig;
use dataaccess_core::error::{AppError, ErrorKind};
use dataaccess_core::procedure::{ProcedureOutcome, ProcedureRegistry};
use dataaccess_core::result::AppResult;
use dataaccess_core::tracker::{ChangeKind, ChangeTracker, PendingChange};
use dataaccess_core::traits::{Entity, EntitySet, PersistenceContext};
use dataaccess_core::types::{Filter, QuerySpec, SqlValue};

use crate::connection::DatabasePool;
use crate::sql;

/// Unit of work over a PostgreSQL database.
///
/// A context built with [`PgContext::connect`] owns its pool and closes it
/// on release; one built with [`PgContext::new`] only drops its handle.
#[derive(Debug)]
pub struct PgContext {
    pool: Option<PgPool>,
    owns_pool: bool,
    schema: Option<String>,
    tracker: ChangeTracker,
    procedures: ProcedureRegistry<PgPool>,
}

impl PgContext {
    /// Create a context over a shared pool.
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: Some(pool.pool().clone()),
            owns_pool: false,
            schema: pool.schema().map(str::to_string),
            tracker: ChangeTracker::new(),
            procedures: ProcedureRegistry::new(),
        }
    }

    /// Connect a pool dedicated to this context.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let pool = DatabasePool::connect(config).await?;
        let mut context = Self::new(&pool);
        context.owns_pool = true;
        Ok(context)
    }

    /// Use `procedures` for stored-procedure dispatch.
    pub fn with_procedures(mut self, procedures: ProcedureRegistry<PgPool>) -> Self {
        self.procedures = procedures;
        self
    }

    /// Qualify entity tables with `schema`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// The registered procedures.
    pub fn procedures(&self) -> &ProcedureRegistry<PgPool> {
        &self.procedures
    }

    fn pool(&self) -> AppResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::disposed("PostgreSQL context has been released"))
    }
}

fn database_error(message: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| AppError::with_source(ErrorKind::Database, format!("{message}: {e}"), e)
}

#[async_trait]
impl PersistenceContext for PgContext {
    fn set<E: Entity>(&self) -> EntitySet<E> {
        match &self.schema {
            Some(schema) => EntitySet::new(format!("{schema}.{}", E::TABLE)),
            None => EntitySet::new(E::TABLE),
        }
    }

    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    async fn load(&self, table: &str, key_column: &str, key: &Value) -> AppResult<Option<Value>> {
        let pool = self.pool()?;
        let mut builder = sql::find_query(table, key_column, key)?;
        debug!(table, key = %key, "Loading row by key");

        builder
            .build_query_scalar::<Value>()
            .fetch_optional(pool)
            .await
            .map_err(database_error("Failed to load row"))
    }

    async fn query(&self, table: &str, spec: &QuerySpec) -> AppResult<Vec<Value>> {
        let pool = self.pool()?;
        let mut builder = sql::select_query(table, spec)?;
        debug!(table, sql = builder.sql(), "Running query");

        builder
            .build_query_scalar::<Value>()
            .fetch_all(pool)
            .await
            .map_err(database_error("Failed to run query"))
    }

    async fn count(&self, table: &str, filter: Option<&Filter>) -> AppResult<u64> {
        let pool = self.pool()?;
        let mut builder = sql::count_query(table, filter)?;

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .map_err(database_error("Failed to count rows"))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn commit(&mut self, changes: &[PendingChange]) -> AppResult<()> {
        let pool = self.pool()?;
        let mut tx = pool
            .begin()
            .await
            .map_err(database_error("Failed to begin transaction"))?;

        for change in changes {
            let mut builder = match change.kind {
                ChangeKind::Insert => sql::insert_query(&change.row)?,
                ChangeKind::Update => sql::update_query(&change.row)?,
                ChangeKind::Delete => sql::delete_query(&change.row)?,
            };

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(database_error("Failed to apply change"))?;

            if change.kind != ChangeKind::Insert && result.rows_affected() == 0 {
                warn!(
                    table = %change.row.table,
                    key = %change.row.key,
                    kind = ?change.kind,
                    "Change matched no row, rolling back"
                );
                tx.rollback()
                    .await
                    .map_err(database_error("Failed to roll back transaction"))?;
                return Err(AppError::conflict(format!(
                    "{:?} on '{}' matched no row for key {}",
                    change.kind, change.row.table, change.row.key
                )));
            }
        }

        tx.commit()
            .await
            .map_err(database_error("Failed to commit transaction"))?;
        info!(changes = changes.len(), "Committed transaction");
        Ok(())
    }

    async fn call_procedure(
        &self,
        name: &str,
        params: Vec<SqlValue>,
    ) -> AppResult<ProcedureOutcome<Value>> {
        let pool = self.pool()?.clone();
        let handler = self.procedures.resolve(name)?;
        debug!(procedure = name, params = params.len(), "Calling procedure");
        handler(pool, params).await
    }

    fn release(&mut self) {
        if self.pool.take().is_some() {
            self.tracker.clear();
            debug!(owns_pool = self.owns_pool, "Released PostgreSQL context");
        }
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            self.tracker.clear();
            if self.owns_pool {
                pool.close().await;
                info!("Closed context-owned pool");
            }
        }
    }
}
