//! Filter, projection and ordering evaluation over JSON rows.
//!
//! Semantics follow the SQL rendering in [`crate::sql`]: comparisons
//! involving `NULL` are unknown, `NOT unknown` is unknown, and only rows
//! whose predicate is definitely true match. `NULL` sorts after every other
//! value in ascending order.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use dataaccess_core::error::AppError;
use dataaccess_core::result::AppResult;
use dataaccess_core::types::{
    Filter, FilterField, FilterOp, Projection, SortDirection, SortField, SqlValue,
};

fn column<'a>(row: &'a Value, name: &str) -> AppResult<&'a Value> {
    row.get(name)
        .ok_or_else(|| AppError::database(format!("column \"{name}\" does not exist")))
}

/// Whether `row` satisfies `filter`.
pub fn matches(filter: &Filter, row: &Value) -> AppResult<bool> {
    Ok(evaluate(filter, row)? == Some(true))
}

fn evaluate(filter: &Filter, row: &Value) -> AppResult<Option<bool>> {
    match filter {
        Filter::Field(field) => condition(field, row),
        Filter::And(items) => {
            let mut result = Some(true);
            for item in items {
                match evaluate(item, row)? {
                    Some(false) => return Ok(Some(false)),
                    None => result = None,
                    Some(true) => {}
                }
            }
            Ok(result)
        }
        Filter::Or(items) => {
            let mut result = Some(false);
            for item in items {
                match evaluate(item, row)? {
                    Some(true) => return Ok(Some(true)),
                    None => result = None,
                    Some(false) => {}
                }
            }
            Ok(result)
        }
        Filter::Not(inner) => Ok(evaluate(inner, row)?.map(|v| !v)),
    }
}

fn condition(field: &FilterField, row: &Value) -> AppResult<Option<bool>> {
    let value = column(row, &field.field)?;

    let outcome = match (field.op, &field.value) {
        (FilterOp::IsNull, _) | (FilterOp::Eq, SqlValue::Null) => Some(value.is_null()),
        (FilterOp::IsNotNull, _) | (FilterOp::Ne, SqlValue::Null) => Some(!value.is_null()),
        (op, SqlValue::Null) => {
            return Err(AppError::validation(format!(
                "Operator {op:?} on '{}' cannot compare with NULL",
                field.field
            )));
        }
        (FilterOp::In, SqlValue::StringList(list)) => match value {
            Value::Null => None,
            Value::String(s) => Some(list.iter().any(|item| item == s)),
            other => return Err(operand_mismatch(other, "text[]")),
        },
        (FilterOp::In, SqlValue::IntegerList(list)) => match value {
            Value::Null => None,
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => list.contains(&i),
                None => n.as_f64().is_some_and(|f| list.iter().any(|i| *i as f64 == f)),
            }),
            other => return Err(operand_mismatch(other, "bigint[]")),
        },
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
        (op @ (FilterOp::Like | FilterOp::ILike), SqlValue::String(pattern)) => match value {
            Value::String(s) => Some(like(s, pattern, op == FilterOp::ILike)?),
            _ => None,
        },
        (FilterOp::Like | FilterOp::ILike, _) => {
            return Err(AppError::validation(format!(
                "Pattern match on '{}' requires a string pattern",
                field.field
            )));
        }
        (op, wanted) => wanted.compare_json(value).map(|ordering| match op {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Ne => ordering != Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            _ => ordering != Ordering::Greater,
        }),
    };
    Ok(outcome)
}

/// PostgreSQL's error for an `IN` list whose element type does not fit the column.
fn operand_mismatch(column: &Value, list_type: &str) -> AppError {
    let column_type = match column {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "numeric",
        Value::String(_) => "text",
        _ => "jsonb",
    };
    AppError::database(format!("operator does not exist: {column_type} = ANY({list_type})"))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Run,
    One,
    Char(char),
}

fn tokenize(pattern: &str) -> AppResult<Vec<Token>> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Run,
            '_' => Token::One,
            '\\' => match chars.next() {
                Some(escaped) => Token::Char(escaped),
                None => {
                    return Err(AppError::database(
                        "LIKE pattern must not end with escape character",
                    ));
                }
            },
            c => Token::Char(c),
        });
    }
    Ok(tokens)
}

/// SQL `LIKE`: `%` matches any run, `_` any single character and `\` makes
/// the next character literal.
pub fn like(value: &str, pattern: &str, case_insensitive: bool) -> AppResult<bool> {
    let (text, pattern): (Vec<char>, _) = if case_insensitive {
        (value.to_lowercase().chars().collect(), tokenize(&pattern.to_lowercase())?)
    } else {
        (value.chars().collect(), tokenize(pattern)?)
    };

    // Greedy match with backtracking to the last `%`.
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some(Token::One) => {
                t += 1;
                p += 1;
            }
            Some(Token::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(Token::Run) => {
                star = Some((p, t));
                p += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return Ok(false),
            },
        }
    }
    Ok(pattern[p..].iter().all(|token| *token == Token::Run))
}

/// Shape `row` according to `projection`.
pub fn project(row: &Value, projection: &Projection) -> AppResult<Value> {
    let Some(columns) = projection.selected() else {
        return Ok(row.clone());
    };

    let mut projected = Map::new();
    for c in columns {
        projected.insert(c.output_name().to_string(), column(row, &c.source)?.clone());
    }
    Ok(Value::Object(projected))
}

/// Fail like PostgreSQL when a sort key names a column the rows lack.
pub fn check_sort_columns(rows: &[Value], order_by: &[SortField]) -> AppResult<()> {
    for row in rows {
        for sort in order_by {
            column(row, &sort.field)?;
        }
    }
    Ok(())
}

/// Compare two projected rows by the given sort keys.
pub fn compare_rows(a: &Value, b: &Value, order_by: &[SortField]) -> Ordering {
    for sort in order_by {
        let left = a.get(&sort.field).unwrap_or(&Value::Null);
        let right = b.get(&sort.field).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right);
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
