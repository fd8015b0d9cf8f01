//! Shared in-memory table storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use dataaccess_core::error::AppError;
use dataaccess_core::result::AppResult;
use dataaccess_core::tracker::{ChangeKind, PendingChange, TrackedRow};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    rows: Vec<Value>,
}

impl MemoryTable {
    fn position(&self, row: &TrackedRow) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.get(&row.key_column) == Some(&row.key))
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: RwLock<HashMap<String, MemoryTable>>,
    open_contexts: AtomicUsize,
}

/// In-memory relational store shared by any number of [`MemoryContext`]s.
///
/// Rows keep insertion order, which is the "store order" of unordered
/// queries. Cloning is cheap; clones share the same tables.
///
/// [`MemoryContext`]: super::MemoryContext
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to `table`, creating it if needed.
    pub async fn insert_rows<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut tables = self.inner.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        entry.rows.extend(rows);
        debug!(table, rows = entry.rows.len(), "Seeded in-memory table");
    }

    /// Create `table` if it does not exist yet.
    pub async fn create_table(&self, table: &str) {
        self.inner
            .tables
            .write()
            .await
            .entry(table.to_string())
            .or_default();
    }

    /// A snapshot of the rows of `table` in store order.
    pub async fn rows(&self, table: &str) -> AppResult<Vec<Value>> {
        self.inner
            .tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.clone())
            .ok_or_else(|| missing_table(table))
    }

    /// Number of contexts currently holding this store.
    pub fn open_contexts(&self) -> usize {
        self.inner.open_contexts.load(Ordering::SeqCst)
    }

    pub(crate) fn acquire(&self) {
        self.inner.open_contexts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.inner.open_contexts.fetch_sub(1, Ordering::SeqCst);
    }

    /// Apply `changes` atomically.
    ///
    /// The changes are applied to a working copy that replaces the tables
    /// only if every change succeeds.
    pub async fn apply(&self, changes: &[PendingChange]) -> AppResult<()> {
        let mut tables = self.inner.tables.write().await;
        let mut working = tables.clone();

        for change in changes {
            let row = &change.row;
            let table = working
                .get_mut(&row.table)
                .ok_or_else(|| missing_table(&row.table))?;

            match (change.kind, table.position(row)) {
                (ChangeKind::Insert, None) => table.rows.push(row.values.clone()),
                (ChangeKind::Insert, Some(_)) => {
                    return Err(AppError::conflict(format!(
                        "Duplicate key {} in '{}'",
                        row.key, row.table
                    )));
                }
                (ChangeKind::Update, Some(i)) => table.rows[i] = row.values.clone(),
                (ChangeKind::Delete, Some(i)) => {
                    table.rows.remove(i);
                }
                (kind, None) => {
                    return Err(AppError::conflict(format!(
                        "{kind:?} on '{}' matched no row for key {}",
                        row.table, row.key
                    )));
                }
            }
        }

        *tables = working;
        Ok(())
    }
}

fn missing_table(table: &str) -> AppError {
    AppError::database(format!("relation \"{table}\" does not exist"))
}
