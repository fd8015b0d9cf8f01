//! PostgreSQL handlers for the procedure registry.
//!
//! A set-returning function yields rows; a `CALL`ed procedure yields
//! [`ProcedureOutcome::NoResult`].

use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use dataaccess_core::error::{AppError, ErrorKind};
use dataaccess_core::procedure::{ProcedureHandler, ProcedureOutcome};
use dataaccess_core::result::AppResult;
use dataaccess_core::types::SqlValue;

use crate::sql;

/// SQLSTATE `undefined_function`.
const UNDEFINED_FUNCTION: &str = "42883";

fn call_error(name: &str, error: sqlx::Error) -> AppError {
    let undefined = error
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNDEFINED_FUNCTION);

    if undefined {
        warn!(procedure = name, "Procedure does not exist in the database");
        AppError::with_source(
            ErrorKind::ProcedureDispatch,
            format!("Procedure '{name}' does not exist: {error}"),
            error,
        )
    } else {
        AppError::with_source(
            ErrorKind::Database,
            format!("Procedure '{name}' failed: {error}"),
            error,
        )
    }
}

/// Handler that runs `SELECT to_jsonb(r) FROM <function>(...) r`.
///
/// Fails immediately if `function` is not a valid (optionally
/// schema-qualified) identifier.
pub fn set_returning_function(function: impl Into<String>) -> AppResult<ProcedureHandler<PgPool>> {
    let function = function.into();
    sql::quote_qualified(&function)?;

    Ok(Arc::new(move |pool: PgPool, params: Vec<SqlValue>| {
        let function = function.clone();
        async move {
            let mut builder = sql::function_call(&function, &params)?;
            debug!(function = %function, params = params.len(), "Calling set-returning function");

            let rows = builder
                .build_query_scalar::<Value>()
                .fetch_all(&pool)
                .await
                .map_err(|e| call_error(&function, e))?;
            Ok(ProcedureOutcome::Rows(rows))
        }
        .boxed()
    }))
}

/// Handler that runs `CALL <procedure>(...)` and reports no result set.
pub fn stored_procedure(procedure: impl Into<String>) -> AppResult<ProcedureHandler<PgPool>> {
    let procedure = procedure.into();
    sql::quote_qualified(&procedure)?;

    Ok(Arc::new(move |pool: PgPool, params: Vec<SqlValue>| {
        let procedure = procedure.clone();
        async move {
            let mut builder = sql::procedure_call(&procedure, &params)?;
            debug!(procedure = %procedure, params = params.len(), "Calling stored procedure");

            builder
                .build()
                .execute(&pool)
                .await
                .map_err(|e| call_error(&procedure, e))?;
            Ok(ProcedureOutcome::NoResult)
        }
        .boxed()
    }))
}
