//! # dataaccess-database
//!
//! Persistence contexts (PostgreSQL via sqlx, and an in-memory store) and
//! the [`GenericRepository`] that implements the repository contract on top
//! of any of them.

pub mod connection;
pub mod context;
pub mod procedure;
pub mod repository;
pub mod sql;

pub use connection::DatabasePool;
pub use context::memory::{MemoryContext, MemoryStore};
pub use context::postgres::PgContext;
pub use repository::GenericRepository;
