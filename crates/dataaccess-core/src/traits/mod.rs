//! Core traits defined in `dataaccess-core` and implemented by store crates.

pub mod context;
pub mod entity;
pub mod repository;

pub use context::PersistenceContext;
pub use entity::{Entity, EntitySet};
pub use repository::Repository;
