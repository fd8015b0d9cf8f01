//! Change tracking for a unit of work.
//!
//! The tracker is type-erased: entities of every type staged on one context
//! share it, keyed by table and canonical key. Values are kept as JSON rows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::result::AppResult;

/// Tracking state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Not known to the context.
    Detached,
    /// Tracked and identical to the store as far as the context knows.
    Unchanged,
    /// Staged for insertion.
    Added,
    /// Staged for a full-row update.
    Modified,
    /// Staged for deletion.
    Deleted,
}

/// Tracker identity: table plus canonical JSON key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    table: String,
    key: String,
}

impl EntityKey {
    /// Build an identity from a table name and a JSON key value.
    pub fn new(table: &str, key: &Value) -> Self {
        Self {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// The table part.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// An entity encoded as a row, ready to be tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRow {
    /// Table the row belongs to.
    pub table: String,
    /// Primary key column.
    pub key_column: String,
    /// Primary key value.
    pub key: Value,
    /// Every column of the row.
    pub values: Value,
}

impl TrackedRow {
    /// The tracker identity of this row.
    pub fn entity_key(&self) -> EntityKey {
        EntityKey::new(&self.table, &self.key)
    }
}

/// What a pending change will do to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Insert the row.
    Insert,
    /// Overwrite every column of the row.
    Update,
    /// Delete the row by key.
    Delete,
}

/// A change waiting for the next commit.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    /// Operation to perform.
    pub kind: ChangeKind,
    /// The row it applies to.
    pub row: TrackedRow,
}

#[derive(Debug, Clone)]
struct Entry {
    state: EntityState,
    row: TrackedRow,
    seq: u64,
}

/// Records pending inserts, updates and deletes until they are committed.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    entries: HashMap<EntityKey, Entry>,
    next_seq: u64,
}

impl ChangeTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the entity with this identity.
    pub fn state(&self, key: &EntityKey) -> EntityState {
        self.entries
            .get(key)
            .map_or(EntityState::Detached, |entry| entry.state)
    }

    /// Tracked values, unless the entity is detached or staged for deletion.
    pub fn values(&self, key: &EntityKey) -> Option<&Value> {
        self.entries
            .get(key)
            .filter(|entry| entry.state != EntityState::Deleted)
            .map(|entry| &entry.row.values)
    }

    /// Record a row freshly read from the store.
    ///
    /// An entity that is already tracked keeps its tracked state and values.
    pub fn track_loaded(&mut self, row: TrackedRow) {
        let key = row.entity_key();
        if !self.entries.contains_key(&key) {
            let seq = self.bump();
            self.entries.insert(
                key,
                Entry {
                    state: EntityState::Unchanged,
                    row,
                    seq,
                },
            );
        }
    }

    /// Stage an insert. Re-adding a deleted entity turns it into an update.
    pub fn add(&mut self, row: TrackedRow) -> EntityState {
        let key = row.entity_key();
        let state = match self.state(&key) {
            EntityState::Deleted => EntityState::Modified,
            _ => EntityState::Added,
        };
        self.put(key, state, row);
        state
    }

    /// Start tracking a detached entity as unchanged. No-op otherwise.
    pub fn attach(&mut self, row: TrackedRow) -> EntityState {
        let key = row.entity_key();
        match self.state(&key) {
            EntityState::Detached => {
                self.put(key, EntityState::Unchanged, row);
                EntityState::Unchanged
            }
            state => state,
        }
    }

    /// Stage a delete.
    ///
    /// A pending insert is simply forgotten. Removing a detached entity is a
    /// `TrackingState` error: it has to be attached first.
    pub fn remove(&mut self, key: &EntityKey) -> AppResult<EntityState> {
        match self.state(key) {
            EntityState::Detached => Err(AppError::tracking_state(format!(
                "Cannot remove an untracked entity from '{}'; attach it first",
                key.table
            ))),
            EntityState::Added => {
                self.entries.remove(key);
                Ok(EntityState::Detached)
            }
            EntityState::Deleted => Ok(EntityState::Deleted),
            EntityState::Unchanged | EntityState::Modified => {
                let seq = self.bump();
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.state = EntityState::Deleted;
                    entry.seq = seq;
                }
                Ok(EntityState::Deleted)
            }
        }
    }

    /// Mark every column of the entity dirty, whatever changed.
    ///
    /// A pending insert stays an insert carrying the new values; anything
    /// else (including a detached or deleted entity) becomes `Modified`.
    pub fn mark_modified(&mut self, row: TrackedRow) -> EntityState {
        let key = row.entity_key();
        let state = match self.state(&key) {
            EntityState::Added => EntityState::Added,
            _ => EntityState::Modified,
        };
        self.put(key, state, row);
        state
    }

    /// Stop tracking an entity, discarding any pending change.
    pub fn detach(&mut self, key: &EntityKey) {
        self.entries.remove(key);
    }

    /// Pending changes in staging order.
    pub fn pending(&self) -> Vec<PendingChange> {
        let mut staged: Vec<&Entry> = self
            .entries
            .values()
            .filter(|entry| entry.state != EntityState::Unchanged)
            .collect();
        staged.sort_by_key(|entry| entry.seq);

        staged
            .into_iter()
            .map(|entry| PendingChange {
                kind: match entry.state {
                    EntityState::Added => ChangeKind::Insert,
                    EntityState::Deleted => ChangeKind::Delete,
                    _ => ChangeKind::Update,
                },
                row: entry.row.clone(),
            })
            .collect()
    }

    /// Whether any change is waiting for a commit.
    pub fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state != EntityState::Unchanged)
    }

    /// Mark everything as committed.
    pub fn accept_all(&mut self) {
        self.entries.retain(|_, entry| entry.state != EntityState::Deleted);
        for entry in self.entries.values_mut() {
            entry.state = EntityState::Unchanged;
        }
        debug!(tracked = self.entries.len(), "Accepted all tracked changes");
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn put(&mut self, key: EntityKey, state: EntityState, row: TrackedRow) {
        let seq = self.bump();
        self.entries.insert(key, Entry { state, row, seq });
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}
