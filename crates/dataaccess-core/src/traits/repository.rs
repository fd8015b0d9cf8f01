//! Generic repository contract.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::entity::Entity;
use crate::procedure::ProcedureOutcome;
use crate::result::AppResult;
use crate::types::filter::Filter;
use crate::types::projection::Projection;
use crate::types::query::QueryOptions;
use crate::types::value::SqlValue;

/// CRUD, query and procedure access to one entity type.
///
/// Staging methods (`insert`, `delete`, `update`) only touch the change
/// tracker; nothing reaches the store until `save`/`save_async`.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Fetch by primary key. `None` is not an error.
    async fn get_by_id(&mut self, id: &E::Key) -> AppResult<Option<E>>;

    /// Stage an insert.
    fn insert(&mut self, entity: E) -> AppResult<()>;

    /// Fetch by key, then stage a delete. Fails with `NotFound` when the key
    /// does not resolve.
    async fn delete_by_id(&mut self, id: &E::Key) -> AppResult<()>;

    /// Stage a delete, attaching a detached entity first.
    fn delete(&mut self, entity: E) -> AppResult<()>;

    /// Mark the entity modified. Every column is written on save, changed
    /// or not.
    fn update(&mut self, entity: E) -> AppResult<()>;

    /// Commit all staged changes, blocking the calling thread.
    fn save(&mut self) -> AppResult<usize>;

    /// Commit all staged changes.
    async fn save_async(&mut self) -> AppResult<usize>;

    /// Filter, project, order and page the entity set.
    async fn get<R>(&self, projection: Projection, options: QueryOptions) -> AppResult<Vec<R>>
    where
        R: DeserializeOwned + Send + 'static;

    /// Number of entities matching `filter`.
    async fn get_count(&self, filter: Option<&Filter>) -> AppResult<u64>;

    /// Run the procedure named after `E`, decode its rows as `E`, and apply
    /// `transform` eagerly. `NoResult` is passed through untouched.
    async fn execute_stored_proc<R, F, I>(
        &self,
        transform: F,
        params: Vec<SqlValue>,
    ) -> AppResult<ProcedureOutcome<R>>
    where
        F: FnOnce(Vec<E>) -> I + Send + 'static,
        I: IntoIterator<Item = R>,
        R: Send + 'static;
}
