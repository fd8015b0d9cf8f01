//! Stored-procedure registry and outcomes.
//!
//! Procedures are registered at startup under a name. A repository over a
//! procedure result entity derives that name from the entity's `NAME` by
//! stripping [`RESULT_SUFFIX`], so `CustomerOrders_Result` dispatches to the
//! handler registered as `CustomerOrders`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::result::AppResult;
use crate::traits::entity::Entity;
use crate::types::value::SqlValue;

/// Suffix stripped from a result entity's name to get its procedure name.
pub const RESULT_SUFFIX: &str = "_Result";

/// The result of a procedure invocation.
///
/// `NoResult` means the procedure produced no result set at all; it is
/// distinct from `Rows(vec![])`, a result set that happens to be empty.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureOutcome<T> {
    /// The call produced no result set.
    NoResult,
    /// The call produced a result set (possibly empty).
    Rows(Vec<T>),
}

impl<T> ProcedureOutcome<T> {
    /// Whether the call produced no result set.
    pub fn is_no_result(&self) -> bool {
        matches!(self, Self::NoResult)
    }

    /// The rows, or `None` when there was no result set.
    pub fn into_rows(self) -> Option<Vec<T>> {
        match self {
            Self::NoResult => None,
            Self::Rows(rows) => Some(rows),
        }
    }

    /// Apply `f` to the row set, leaving `NoResult` untouched.
    pub fn map_rows<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> ProcedureOutcome<U> {
        match self {
            Self::NoResult => ProcedureOutcome::NoResult,
            Self::Rows(rows) => ProcedureOutcome::Rows(f(rows)),
        }
    }

    /// Fallible version of [`map_rows`](Self::map_rows).
    pub fn try_map_rows<U>(
        self,
        f: impl FnOnce(Vec<T>) -> AppResult<Vec<U>>,
    ) -> AppResult<ProcedureOutcome<U>> {
        match self {
            Self::NoResult => Ok(ProcedureOutcome::NoResult),
            Self::Rows(rows) => f(rows).map(ProcedureOutcome::Rows),
        }
    }
}

impl ProcedureOutcome<serde_json::Value> {
    /// Decode JSON rows into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> AppResult<ProcedureOutcome<T>> {
        self.try_map_rows(|rows| {
            rows.into_iter()
                .map(|row| serde_json::from_value(row).map_err(AppError::from))
                .collect()
        })
    }
}

/// The procedure name for a result entity.
pub fn procedure_name_for<E: Entity>() -> &'static str {
    E::NAME.strip_suffix(RESULT_SUFFIX).unwrap_or(E::NAME)
}

/// Future returned by a procedure handler.
pub type ProcedureFuture = BoxFuture<'static, AppResult<ProcedureOutcome<serde_json::Value>>>;

/// A typed procedure invocation bound to a store handle `C`.
pub type ProcedureHandler<C> = Arc<dyn Fn(C, Vec<SqlValue>) -> ProcedureFuture + Send + Sync>;

/// Startup-time mapping from procedure name to handler.
pub struct ProcedureRegistry<C> {
    handlers: HashMap<String, ProcedureHandler<C>>,
}

impl<C> ProcedureRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a prepared handler under `name`.
    ///
    /// Fails with `ProcedureDispatch` when the name is already taken.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: ProcedureHandler<C>,
    ) -> AppResult<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(AppError::procedure_dispatch(format!(
                "Procedure '{name}' is already registered"
            )));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Register an async function under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> AppResult<()>
    where
        F: Fn(C, Vec<SqlValue>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<ProcedureOutcome<serde_json::Value>>> + Send + 'static,
    {
        let handler: ProcedureHandler<C> = Arc::new(move |conn, params| Box::pin(f(conn, params)));
        self.register(name, handler)
    }

    /// Register a handler under the procedure name derived from `E`.
    pub fn register_for<E: Entity>(&mut self, handler: ProcedureHandler<C>) -> AppResult<()> {
        self.register(procedure_name_for::<E>(), handler)
    }

    /// Look up the handler registered under `name`.
    pub fn resolve(&self, name: &str) -> AppResult<&ProcedureHandler<C>> {
        self.handlers.get(name).ok_or_else(|| {
            AppError::procedure_dispatch(format!("No procedure registered under '{name}'"))
        })
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered procedure names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered procedures.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no procedures are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<C> Default for ProcedureRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for ProcedureRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<C> fmt::Debug for ProcedureRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureRegistry")
            .field("procedures", &self.names())
            .finish()
    }
}
