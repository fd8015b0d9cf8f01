//! Generic repository over any persistence context.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use dataaccess_core::error::AppError;
use dataaccess_core::procedure::{ProcedureOutcome, procedure_name_for};
use dataaccess_core::result::AppResult;
use dataaccess_core::tracker::EntityState;
use dataaccess_core::traits::{Entity, EntitySet, PersistenceContext, Repository};
use dataaccess_core::types::{
    Filter, PageRequest, PageResponse, Projection, QueryOptions, QuerySpec, SqlValue,
};

/// Repository for entity type `E` over a persistence context `C`.
///
/// The repository owns its context. Dropping the repository disposes it;
/// [`dispose`](Self::dispose) and [`dispose_async`](Self::dispose_async) do
/// so explicitly and may be called any number of times. Every operation
/// after disposal fails with `ErrorKind::Disposed`.
pub struct GenericRepository<E: Entity, C: PersistenceContext> {
    context: Option<C>,
    set: EntitySet<E>,
}

impl<E: Entity, C: PersistenceContext> GenericRepository<E, C> {
    /// Create a repository owning `context`.
    pub fn new(context: C) -> Self {
        let set = context.set::<E>();
        debug!(entity = E::NAME, table = set.table(), "Created repository");
        Self {
            context: Some(context),
            set,
        }
    }

    /// The entity set this repository works on.
    pub fn entity_set(&self) -> &EntitySet<E> {
        &self.set
    }

    /// Whether the context has been released.
    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// The underlying context.
    pub fn context(&self) -> AppResult<&C> {
        self.context.as_ref().ok_or_else(|| disposed::<E>())
    }

    fn parts_mut(&mut self) -> AppResult<(&mut C, &EntitySet<E>)> {
        let context = self.context.as_mut().ok_or_else(|| disposed::<E>())?;
        Ok((context, &self.set))
    }

    /// Tracking state of `entity` in this repository's context.
    pub fn entry_state(&self, entity: &E) -> AppResult<EntityState> {
        self.context()?.entry_state(&self.set, entity)
    }

    /// Fetch one page together with the total match count.
    ///
    /// Any paging already present in `options` is replaced by `page`.
    pub async fn get_page<R>(
        &self,
        projection: Projection,
        options: QueryOptions,
        page: PageRequest,
    ) -> AppResult<PageResponse<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let total = self.get_count(options.filter.as_ref()).await?;
        let options = QueryOptions {
            page: Some(page),
            ..options
        };
        let items = self.get(projection, options).await?;
        Ok(PageResponse::new(
            items,
            page.effective_page(),
            page.page_size,
            total,
        ))
    }

    /// Release the context. Unsaved changes are discarded.
    pub fn dispose(&mut self) {
        if let Some(mut context) = self.context.take() {
            warn_unsaved::<E, C>(&context);
            context.release();
            debug!(entity = E::NAME, "Disposed repository");
        }
    }

    /// Release the context, waiting for the store to shut down gracefully.
    pub async fn dispose_async(&mut self) {
        if let Some(mut context) = self.context.take() {
            warn_unsaved::<E, C>(&context);
            context.close().await;
            debug!(entity = E::NAME, "Disposed repository");
        }
    }
}

impl<E: Entity, C: PersistenceContext> Drop for GenericRepository<E, C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<E: Entity, C: PersistenceContext> std::fmt::Debug for GenericRepository<E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericRepository")
            .field("entity", &E::NAME)
            .field("table", &self.set.table())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn disposed<E: Entity>() -> AppError {
    AppError::disposed(format!("Repository for {} has been disposed", E::NAME))
}

fn warn_unsaved<E: Entity, C: PersistenceContext>(context: &C) {
    if context.tracker().has_changes() {
        warn!(
            entity = E::NAME,
            pending = context.tracker().pending().len(),
            "Disposing repository with unsaved changes"
        );
    }
}

#[async_trait]
impl<E: Entity, C: PersistenceContext> Repository<E> for GenericRepository<E, C> {
    async fn get_by_id(&mut self, id: &E::Key) -> AppResult<Option<E>> {
        let (context, set) = self.parts_mut()?;
        context.find(set, id).await
    }

    fn insert(&mut self, entity: E) -> AppResult<()> {
        let (context, set) = self.parts_mut()?;
        let state = context.add(set, &entity)?;
        debug!(entity = E::NAME, key = ?entity.key(), ?state, "Staged insert");
        Ok(())
    }

    async fn delete_by_id(&mut self, id: &E::Key) -> AppResult<()> {
        let (context, set) = self.parts_mut()?;
        let Some(entity) = context.find(set, id).await? else {
            warn!(entity = E::NAME, key = ?id, "Delete target not found");
            return Err(AppError::not_found(format!(
                "{} with key {id:?} not found",
                E::NAME
            )));
        };

        context.remove(set, &entity)?;
        debug!(entity = E::NAME, key = ?id, "Staged delete");
        Ok(())
    }

    fn delete(&mut self, entity: E) -> AppResult<()> {
        let (context, set) = self.parts_mut()?;
        if context.entry_state(set, &entity)? == EntityState::Detached {
            context.attach(set, &entity)?;
        }

        let state = context.remove(set, &entity)?;
        debug!(entity = E::NAME, key = ?entity.key(), ?state, "Staged delete");
        Ok(())
    }

    fn update(&mut self, entity: E) -> AppResult<()> {
        let (context, set) = self.parts_mut()?;
        let state = context.mark_modified(set, &entity)?;
        debug!(entity = E::NAME, key = ?entity.key(), ?state, "Staged update");
        Ok(())
    }

    fn save(&mut self) -> AppResult<usize> {
        match Handle::try_current() {
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(AppError::internal(
                    "save() cannot block a current-thread runtime; use save_async()",
                )),
                _ => tokio::task::block_in_place(|| handle.block_on(self.save_async())),
            },
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(self.save_async())
            }
        }
    }

    async fn save_async(&mut self) -> AppResult<usize> {
        let (context, _) = self.parts_mut()?;
        let written = context.save_changes().await?;
        if written > 0 {
            info!(entity = E::NAME, written, "Saved changes");
        }
        Ok(written)
    }

    async fn get<R>(&self, projection: Projection, options: QueryOptions) -> AppResult<Vec<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let context = self.context()?;
        let spec = QuerySpec::new(projection, options);
        spec.validate()?;

        let rows = context.query(self.set.table(), &spec).await?;
        debug!(entity = E::NAME, rows = rows.len(), "Fetched rows");
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .collect()
    }

    async fn get_count(&self, filter: Option<&Filter>) -> AppResult<u64> {
        self.context()?.count(self.set.table(), filter).await
    }

    async fn execute_stored_proc<R, F, I>(
        &self,
        transform: F,
        params: Vec<SqlValue>,
    ) -> AppResult<ProcedureOutcome<R>>
    where
        F: FnOnce(Vec<E>) -> I + Send + 'static,
        I: IntoIterator<Item = R>,
        R: Send + 'static,
    {
        let context = self.context()?;
        let name = procedure_name_for::<E>();
        debug!(entity = E::NAME, procedure = name, "Executing stored procedure");

        let outcome = context.call_procedure(name, params).await?.decode::<E>()?;
        Ok(outcome.map_rows(|rows| transform(rows).into_iter().collect()))
    }
}
