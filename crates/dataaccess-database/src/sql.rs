//! SQL rendering for the PostgreSQL context.
//!
//! Every statement is built with `sqlx::QueryBuilder` and carries values
//! as bound parameters. Identifiers are validated and double-quoted.
//! Rows travel as JSONB: reads go through `to_jsonb`, writes through
//! `jsonb_populate_record(NULL::<table>, $n)`, so no per-entity SQL is
//! needed.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use dataaccess_core::error::AppError;
use dataaccess_core::result::AppResult;
use dataaccess_core::tracker::TrackedRow;
use dataaccess_core::types::{Filter, FilterField, FilterOp, QuerySpec, SqlValue};

/// Builder type produced by every function in this module.
pub type PgQueryBuilder = QueryBuilder<'static, Postgres>;

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote a column name.
pub fn quote_column(name: &str) -> AppResult<String> {
    if !is_identifier(name) {
        return Err(AppError::validation(format!(
            "Invalid column identifier '{name}'"
        )));
    }
    Ok(format!("\"{name}\""))
}

/// Quote a table or routine name, optionally schema-qualified.
pub fn quote_qualified(name: &str) -> AppResult<String> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| is_identifier(p)) {
        return Err(AppError::validation(format!(
            "Invalid qualified identifier '{name}'"
        )));
    }
    Ok(parts
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join("."))
}

/// Bind a scalar value. `NULL` is emitted as a literal.
pub fn push_value(builder: &mut PgQueryBuilder, value: &SqlValue) {
    match value.clone() {
        SqlValue::Null => builder.push("NULL"),
        SqlValue::Boolean(v) => builder.push_bind(v),
        SqlValue::Integer(v) => builder.push_bind(v),
        SqlValue::Float(v) => builder.push_bind(v),
        SqlValue::Uuid(v) => builder.push_bind(v),
        SqlValue::Timestamp(v) => builder.push_bind(v),
        SqlValue::String(v) => builder.push_bind(v),
        SqlValue::StringList(v) => builder.push_bind(v),
        SqlValue::IntegerList(v) => builder.push_bind(v),
    };
}

/// Render a predicate with columns qualified by `alias`.
pub fn push_filter(builder: &mut PgQueryBuilder, filter: &Filter, alias: &str) -> AppResult<()> {
    match filter {
        Filter::Field(field) => push_condition(builder, field, alias),
        Filter::And(items) => push_group(builder, items, " AND ", "TRUE", alias),
        Filter::Or(items) => push_group(builder, items, " OR ", "FALSE", alias),
        Filter::Not(inner) => {
            builder.push("NOT (");
            push_filter(builder, inner, alias)?;
            builder.push(")");
            Ok(())
        }
    }
}

fn push_group(
    builder: &mut PgQueryBuilder,
    items: &[Filter],
    separator: &str,
    empty: &str,
    alias: &str,
) -> AppResult<()> {
    if items.is_empty() {
        builder.push(empty);
        return Ok(());
    }
    builder.push("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        push_filter(builder, item, alias)?;
    }
    builder.push(")");
    Ok(())
}

fn push_condition(builder: &mut PgQueryBuilder, field: &FilterField, alias: &str) -> AppResult<()> {
    let column = format!("{alias}.{}", quote_column(&field.field)?);

    match (field.op, &field.value) {
        (FilterOp::IsNull, _) | (FilterOp::Eq, SqlValue::Null) => {
            builder.push(format!("{column} IS NULL"));
        }
        (FilterOp::IsNotNull, _) | (FilterOp::Ne, SqlValue::Null) => {
            builder.push(format!("{column} IS NOT NULL"));
        }
        (op, SqlValue::Null) => {
            return Err(AppError::validation(format!(
                "Operator {op:?} on '{}' cannot compare with NULL",
                field.field
            )));
        }
        (FilterOp::In, list) if list.is_list() => {
            builder.push(format!("{column} = ANY("));
            push_value(builder, &field.value);
            builder.push(")");
        }
        (FilterOp::In, _) => {
            return Err(AppError::validation(format!(
                "IN on '{}' requires a list value",
                field.field
            )));
        }
        (_, list) if list.is_list() => {
            return Err(AppError::validation(format!(
                "A list value on '{}' is only valid with IN",
                field.field
            )));
        }
        (FilterOp::Like | FilterOp::ILike, SqlValue::String(_)) => {
            builder.push(format!("{column} {} ", field.op.as_sql()));
            push_value(builder, &field.value);
        }
        (FilterOp::Like | FilterOp::ILike, _) => {
            return Err(AppError::validation(format!(
                "Pattern match on '{}' requires a string pattern",
                field.field
            )));
        }
        (op, value) => {
            builder.push(format!("{column} {} ", op.as_sql()));
            push_value(builder, value);
        }
    }
    Ok(())
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// `SELECT to_jsonb(p) FROM (SELECT <projection> FROM <table> t WHERE …) p
/// ORDER BY … LIMIT … OFFSET …`.
///
/// Ordering and paging run on the projected subquery `p`.
pub fn select_query(table: &str, spec: &QuerySpec) -> AppResult<PgQueryBuilder> {
    spec.validate()?;
    let table = quote_qualified(table)?;

    let mut builder = QueryBuilder::new("SELECT to_jsonb(p) FROM (SELECT ");
    match spec.projection.selected() {
        None => {
            builder.push("t.*");
        }
        Some(columns) => {
            let rendered = columns
                .iter()
                .map(|c| {
                    Ok(format!(
                        "t.{} AS {}",
                        quote_column(&c.source)?,
                        quote_column(c.output_name())?
                    ))
                })
                .collect::<AppResult<Vec<_>>>()?;
            builder.push(rendered.join(", "));
        }
    }
    builder.push(format!(" FROM {table} t"));

    if let Some(filter) = &spec.filter {
        builder.push(" WHERE ");
        push_filter(&mut builder, filter, "t")?;
    }
    builder.push(") p");

    if !spec.order_by.is_empty() {
        let rendered = spec
            .order_by
            .iter()
            .map(|s| Ok(format!("p.{} {}", quote_column(&s.field)?, s.direction.as_sql())))
            .collect::<AppResult<Vec<_>>>()?;
        builder.push(" ORDER BY ");
        builder.push(rendered.join(", "));
    }

    if let Some(page) = spec.page {
        builder.push(" LIMIT ");
        builder.push_bind(to_i64(page.limit()));
        builder.push(" OFFSET ");
        builder.push_bind(to_i64(page.offset()));
    }

    Ok(builder)
}

/// `SELECT COUNT(*) FROM <table> t WHERE …`.
pub fn count_query(table: &str, filter: Option<&Filter>) -> AppResult<PgQueryBuilder> {
    let table = quote_qualified(table)?;
    let mut builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table} t"));
    if let Some(filter) = filter {
        builder.push(" WHERE ");
        push_filter(&mut builder, filter, "t")?;
    }
    Ok(builder)
}

/// Single row by key, as JSONB.
pub fn find_query(table: &str, key_column: &str, key: &Value) -> AppResult<PgQueryBuilder> {
    let table = quote_qualified(table)?;
    let column = quote_column(key_column)?;

    let mut builder = QueryBuilder::new(format!(
        "SELECT to_jsonb(t) FROM {table} t \
         WHERE t.{column} = (jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(key_document(key_column, key));
    builder.push(format!(")).{column}"));
    Ok(builder)
}

/// Insert every column present in the row.
pub fn insert_query(row: &TrackedRow) -> AppResult<PgQueryBuilder> {
    let table = quote_qualified(&row.table)?;
    let columns = row_columns(row)?;

    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} ({}) SELECT {} FROM jsonb_populate_record(NULL::{table}, ",
        columns.join(", "),
        prefixed(&columns, "r").join(", ")
    ));
    builder.push_bind(row.values.clone());
    builder.push(") r");
    Ok(builder)
}

/// Overwrite every non-key column of the row.
pub fn update_query(row: &TrackedRow) -> AppResult<PgQueryBuilder> {
    let table = quote_qualified(&row.table)?;
    let key = quote_column(&row.key_column)?;
    let mut columns = row_columns(row)?;
    columns.retain(|c| *c != key);
    if columns.is_empty() {
        columns.push(key.clone());
    }

    let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = r.{c}")).collect();
    let mut builder = QueryBuilder::new(format!(
        "UPDATE {table} AS t SET {} FROM jsonb_populate_record(NULL::{table}, ",
        assignments.join(", ")
    ));
    builder.push_bind(row.values.clone());
    builder.push(format!(") r WHERE t.{key} = r.{key}"));
    Ok(builder)
}

/// Delete the row by key.
pub fn delete_query(row: &TrackedRow) -> AppResult<PgQueryBuilder> {
    let table = quote_qualified(&row.table)?;
    let key = quote_column(&row.key_column)?;

    let mut builder = QueryBuilder::new(format!(
        "DELETE FROM {table} AS t USING jsonb_populate_record(NULL::{table}, "
    ));
    builder.push_bind(key_document(&row.key_column, &row.key));
    builder.push(format!(") r WHERE t.{key} = r.{key}"));
    Ok(builder)
}

/// `SELECT to_jsonb(r) FROM <function>($1, …) r`.
pub fn function_call(function: &str, params: &[SqlValue]) -> AppResult<PgQueryBuilder> {
    let function = quote_qualified(function)?;
    let mut builder = QueryBuilder::new(format!("SELECT to_jsonb(r) FROM {function}("));
    push_arguments(&mut builder, params);
    builder.push(") r");
    Ok(builder)
}

/// `CALL <procedure>($1, …)`.
pub fn procedure_call(procedure: &str, params: &[SqlValue]) -> AppResult<PgQueryBuilder> {
    let procedure = quote_qualified(procedure)?;
    let mut builder = QueryBuilder::new(format!("CALL {procedure}("));
    push_arguments(&mut builder, params);
    builder.push(")");
    Ok(builder)
}

fn push_arguments(builder: &mut PgQueryBuilder, params: &[SqlValue]) {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(builder, param);
    }
}

fn key_document(key_column: &str, key: &Value) -> Value {
    let mut document = serde_json::Map::new();
    document.insert(key_column.to_string(), key.clone());
    Value::Object(document)
}

fn row_columns(row: &TrackedRow) -> AppResult<Vec<String>> {
    let object = row.values.as_object().ok_or_else(|| {
        AppError::validation(format!("Row for '{}' is not an object", row.table))
    })?;
    let mut names: Vec<&String> = object.keys().collect();
    names.sort();
    names.into_iter().map(|k| quote_column(k)).collect()
}

fn prefixed(columns: &[String], alias: &str) -> Vec<String> {
    columns.iter().map(|c| format!("{alias}.{c}")).collect()
}
