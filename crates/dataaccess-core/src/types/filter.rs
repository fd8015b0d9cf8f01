//! Filter predicates applied to an entity set before projection.

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// Filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Exact equality. Against `NULL` this becomes `IS NULL`.
    Eq,
    /// Not equal. Against `NULL` this becomes `IS NOT NULL`.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// SQL `LIKE` pattern match.
    Like,
    /// SQL `ILIKE` case-insensitive pattern match.
    ILike,
    /// SQL `IN` list membership.
    In,
    /// SQL `IS NULL` check.
    IsNull,
    /// SQL `IS NOT NULL` check.
    IsNotNull,
}

impl FilterOp {
    /// The SQL comparison operator for binary operators.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::ILike => "ILIKE",
            Self::In => "= ANY",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// A single condition on a named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    /// The column name to filter on.
    pub field: String,
    /// The comparison operator.
    pub op: FilterOp,
    /// The value to compare against.
    pub value: SqlValue,
}

impl FilterField {
    /// Create a new filter field.
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<SqlValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

/// A boolean predicate over the columns of one entity set.
///
/// An empty `And` is always true and an empty `Or` is always false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// A single column condition.
    Field(FilterField),
    /// All nested predicates hold.
    And(Vec<Filter>),
    /// At least one nested predicate holds.
    Or(Vec<Filter>),
    /// The nested predicate does not hold.
    Not(Box<Filter>),
}

impl Filter {
    /// Condition `field <op> value`.
    pub fn field(field: impl Into<String>, op: FilterOp, value: impl Into<SqlValue>) -> Self {
        Self::Field(FilterField::new(field, op, value))
    }

    /// Shorthand for an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Eq, value)
    }

    /// Shorthand for an inequality filter.
    pub fn ne(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Ne, value)
    }

    /// Shorthand for `field > value`.
    pub fn gt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Gt, value)
    }

    /// Shorthand for `field >= value`.
    pub fn gte(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Gte, value)
    }

    /// Shorthand for `field < value`.
    pub fn lt(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Lt, value)
    }

    /// Shorthand for `field <= value`.
    pub fn lte(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::field(field, FilterOp::Lte, value)
    }

    /// Shorthand for a case-insensitive LIKE filter.
    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::field(field, FilterOp::ILike, SqlValue::String(pattern.into()))
    }

    /// Shorthand for a LIKE filter.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::field(field, FilterOp::Like, SqlValue::String(pattern.into()))
    }

    /// Shorthand for list membership on a text column.
    ///
    /// The list binds as `text[]`; use [`Filter::is_in_integers`] for
    /// numeric columns.
    pub fn is_in<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        Self::field(field, FilterOp::In, SqlValue::StringList(values))
    }

    /// Shorthand for list membership on an integer column.
    pub fn is_in_integers(field: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Self::field(field, FilterOp::In, SqlValue::IntegerList(values.into_iter().collect()))
    }

    /// Shorthand for `field IS NULL`.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::field(field, FilterOp::IsNull, SqlValue::Null)
    }

    /// Shorthand for `field IS NOT NULL`.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::field(field, FilterOp::IsNotNull, SqlValue::Null)
    }

    /// Combine with another predicate using `AND`, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Combine with another predicate using `OR`, flattening nested `Or`s.
    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negate this predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Every column condition in this predicate, depth first.
    pub fn fields(&self) -> Vec<&FilterField> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FilterField>) {
        match self {
            Self::Field(field) => out.push(field),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
        }
    }
}

impl From<FilterField> for Filter {
    fn from(field: FilterField) -> Self {
        Self::Field(field)
    }
}
