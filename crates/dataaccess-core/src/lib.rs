//! # dataaccess-core
//!
//! Core crate for the data-access layer. Contains the repository and
//! persistence-context traits, the change tracker, query value types
//! (filters, sorting, paging, projections, procedure outcomes),
//! configuration schemas, logging bootstrap, and the unified error system.
//!
//! This crate has **no** dependency on a concrete store technology.

pub mod config;
pub mod error;
pub mod logging;
pub mod procedure;
pub mod result;
pub mod tracker;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
pub use tracker::{ChangeTracker, EntityState};
pub use traits::{Entity, EntitySet, PersistenceContext, Repository};
