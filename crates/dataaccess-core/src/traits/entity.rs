//! Entity mapping and the per-type entity set handle.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::result::AppResult;
use crate::tracker::{EntityKey, TrackedRow};

/// A store-backed record type with identity.
///
/// The entity's serde representation is its row: field names are column
/// names, and the field named by `KEY_COLUMN` must serialize to the same
/// value as [`Entity::key`].
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Primary key type.
    type Key: Clone + fmt::Debug + Send + Sync + Serialize + 'static;

    /// Type name. Procedure result entities end in `_Result`.
    const NAME: &'static str;

    /// Table (or view) the entity maps to.
    const TABLE: &'static str;

    /// Primary key column.
    const KEY_COLUMN: &'static str;

    /// The primary key of this instance.
    fn key(&self) -> Self::Key;
}

/// Queryable view of one entity type within a persistence context.
///
/// Obtained from [`PersistenceContext::set`](super::PersistenceContext::set);
/// the table name may be schema-qualified by the context.
pub struct EntitySet<E> {
    table: String,
    key_column: &'static str,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntitySet<E> {
    /// Create an entity set over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: E::KEY_COLUMN,
            _entity: PhantomData,
        }
    }

    /// The (possibly qualified) table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The primary key column.
    pub fn key_column(&self) -> &'static str {
        self.key_column
    }

    /// The tracker identity and the JSON key value for `key`.
    pub fn key_entry(&self, key: &E::Key) -> AppResult<(EntityKey, Value)> {
        let key_value = serde_json::to_value(key)?;
        Ok((EntityKey::new(&self.table, &key_value), key_value))
    }

    /// Encode an entity as a tracked row.
    pub fn row(&self, entity: &E) -> AppResult<TrackedRow> {
        let values = serde_json::to_value(entity)?;
        let (_, key) = self.key_entry(&entity.key())?;

        match values.get(self.key_column) {
            Some(column) if *column == key => {}
            Some(_) => {
                return Err(AppError::validation(format!(
                    "{}: column '{}' does not match the entity key",
                    E::NAME,
                    self.key_column
                )));
            }
            None if values.is_object() => {
                return Err(AppError::validation(format!(
                    "{}: key column '{}' is missing from the serialized entity",
                    E::NAME,
                    self.key_column
                )));
            }
            None => {
                return Err(AppError::validation(format!(
                    "{} must serialize to an object",
                    E::NAME
                )));
            }
        }

        Ok(TrackedRow {
            table: self.table.clone(),
            key_column: self.key_column.to_string(),
            key,
            values,
        })
    }

    /// Decode a row into an entity.
    pub fn decode(&self, row: Value) -> AppResult<E> {
        serde_json::from_value(row).map_err(|e| {
            AppError::with_source(
                crate::error::ErrorKind::Serialization,
                format!("Failed to decode {} row from '{}'", E::NAME, self.table),
                e,
            )
        })
    }
}

impl<E> Clone for EntitySet<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            key_column: self.key_column,
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for EntitySet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySet")
            .field("table", &self.table)
            .field("key_column", &self.key_column)
            .finish()
    }
}
