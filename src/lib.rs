//! # dataaccess
//!
//! Generic repository over a unit-of-work persistence context.
//!
//! [`GenericRepository`] implements the [`Repository`] contract (lookup by
//! key, staged insert/update/delete, atomic save, projected and paged
//! queries, counts and stored-procedure calls) on top of any
//! [`PersistenceContext`]. Two contexts ship with the crate: [`PgContext`]
//! for PostgreSQL and [`MemoryContext`] for an in-process store.
//!
//! ```no_run
//! use dataaccess::prelude::*;
//!
//! # async fn run() -> AppResult<()> {
//! let config = AppConfig::load("development")?;
//! init_logging(&config.logging)?;
//!
//! let pool = DatabasePool::connect(&config.database).await?;
//! let context = PgContext::new(&pool);
//! # let _ = context;
//! # Ok(())
//! # }
//! ```

pub use dataaccess_core::{config, tracker, types};

pub use dataaccess_core::{
    AppError, AppResult, ChangeTracker, Entity, EntitySet, EntityState, ErrorKind,
    PersistenceContext, Repository,
};
pub use dataaccess_database::{
    DatabasePool, GenericRepository, MemoryContext, MemoryStore, PgContext,
};

/// Everything needed to define entities and work with repositories.
pub mod prelude {
    pub use dataaccess_core::config::{AppConfig, DatabaseConfig, LoggingConfig};
    pub use dataaccess_core::logging::init_logging;
    pub use dataaccess_core::procedure::{ProcedureOutcome, ProcedureRegistry};
    pub use dataaccess_core::types::{
        Filter, PageRequest, PageResponse, Projection, QueryOptions, SortField, SqlValue,
    };
    pub use dataaccess_core::{
        AppError, AppResult, Entity, EntityState, ErrorKind, PersistenceContext, Repository,
    };
    pub use dataaccess_database::procedure::{set_returning_function, stored_procedure};
    pub use dataaccess_database::{
        DatabasePool, GenericRepository, MemoryContext, MemoryStore, PgContext,
    };
}
