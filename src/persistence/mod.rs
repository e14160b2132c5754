use crate::entry::{ClassEntry, Day, EntryDraft, EntryId, EntryPatch, Period};
use crate::setting::Setting;
use chrono::NaiveDateTime;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{table} row {id} already exists")]
    Conflict { table: &'static str, id: i64 },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Table-level capabilities the timetable service needs from an embedded
/// store: an `entries` table keyed by an auto-assigned id and queried by
/// cell, plus an opaque `settings` table.
///
/// Ids are assigned in increasing order and are not reused after a delete or
/// a clear.
pub trait TimetableStore {
    fn add_entry(
        &self,
        draft: &EntryDraft,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<EntryId>;

    fn get_entry(&self, id: EntryId) -> PersistenceResult<Option<ClassEntry>>;

    /// Returns the number of rows changed: 0 when `id` is unknown.
    fn update_entry(
        &self,
        id: EntryId,
        patch: &EntryPatch,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<usize>;

    /// Deleting an unknown id is not an error.
    fn delete_entry(&self, id: EntryId) -> PersistenceResult<()>;

    fn list_entries(&self) -> PersistenceResult<Vec<ClassEntry>>;

    fn find_entry_by_cell(&self, day: Day, period: Period)
    -> PersistenceResult<Option<ClassEntry>>;

    fn find_entries_by_cell(&self, day: Day, period: Period) -> PersistenceResult<Vec<ClassEntry>>;

    fn clear_entries(&self) -> PersistenceResult<()>;

    /// Inserts records with their ids preserved. Fails with
    /// [`PersistenceError::Conflict`] and inserts nothing if any id is taken.
    fn bulk_add_entries(&self, entries: Vec<ClassEntry>) -> PersistenceResult<()>;

    fn list_settings(&self) -> PersistenceResult<Vec<Setting>>;

    fn find_setting(&self, key: &str) -> PersistenceResult<Option<Setting>>;

    /// Replaces the value of the row with the same key, or inserts one.
    fn put_setting(&self, setting: Setting) -> PersistenceResult<()>;

    fn clear_settings(&self) -> PersistenceResult<()>;

    /// Same contract as [`TimetableStore::bulk_add_entries`]; settings
    /// without an id get a fresh one.
    fn bulk_add_settings(&self, settings: Vec<Setting>) -> PersistenceResult<()>;
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{Snapshot, load_snapshot_from_json, save_entries_to_csv, save_snapshot_to_json};
pub use memory::MemoryTimetableStore;
