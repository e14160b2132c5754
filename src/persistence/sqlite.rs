use super::{PersistenceError, PersistenceResult, TimetableStore};
use crate::entry::{ClassEntry, Day, EntryDraft, EntryId, EntryPatch, Period};
use crate::setting::Setting;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::Value;

/// SQLite-backed store. Each entry row carries its indexed cell columns plus
/// the full record as JSON; the `id` column is authoritative over the JSON.
pub struct SqliteTimetableStore {
    connection: Mutex<Connection>,
}

impl SqliteTimetableStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        // AUTOINCREMENT keeps ids from being reused after deletes and clears.
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                day INTEGER NOT NULL,
                period TEXT NOT NULL,
                entry_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entries_cell ON entries (day, period);
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                value_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_settings_key ON settings (key);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn decode_entry(id: EntryId, json: &str) -> PersistenceResult<ClassEntry> {
        let mut entry: ClassEntry = serde_json::from_str(json)?;
        entry.id = id;
        Ok(entry)
    }

    fn decode_setting(id: i64, key: String, value_json: &str) -> PersistenceResult<Setting> {
        let value: Value = serde_json::from_str(value_json)?;
        Ok(Setting {
            id: Some(id),
            key,
            value,
        })
    }

    fn query_entries(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> PersistenceResult<Vec<ClassEntry>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((row.get::<_, EntryId>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, json) = row?;
            entries.push(Self::decode_entry(id, &json)?);
        }
        Ok(entries)
    }

    fn entry_exists(tx: &Transaction, id: EntryId) -> PersistenceResult<bool> {
        let found: Option<i64> = tx
            .query_row("SELECT 1 FROM entries WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    fn setting_exists(tx: &Transaction, id: i64) -> PersistenceResult<bool> {
        let found: Option<i64> = tx
            .query_row("SELECT 1 FROM settings WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

impl TimetableStore for SqliteTimetableStore {
    fn add_entry(
        &self,
        draft: &EntryDraft,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<EntryId> {
        let conn = self.connection.lock();
        let record = ClassEntry::from_draft(0, draft.clone(), created_at, updated_at);
        let json = serde_json::to_string(&record)?;
        conn.execute(
            "INSERT INTO entries (day, period, entry_json) VALUES (?1, ?2, ?3)",
            params![draft.day.index(), draft.period.to_string(), json],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_entry(&self, id: EntryId) -> PersistenceResult<Option<ClassEntry>> {
        let conn = self.connection.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT entry_json FROM entries WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| Self::decode_entry(id, &json)).transpose()
    }

    fn update_entry(
        &self,
        id: EntryId,
        patch: &EntryPatch,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<usize> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let json: Option<String> = tx
            .query_row(
                "SELECT entry_json FROM entries WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(0);
        };

        let mut entry = Self::decode_entry(id, &json)?;
        patch.apply_to(&mut entry, updated_at);
        let json = serde_json::to_string(&entry)?;
        let changed = tx.execute(
            "UPDATE entries SET day = ?1, period = ?2, entry_json = ?3 WHERE id = ?4",
            params![entry.day.index(), entry.period.to_string(), json, id],
        )?;
        tx.commit()?;
        Ok(changed)
    }

    fn delete_entry(&self, id: EntryId) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn list_entries(&self) -> PersistenceResult<Vec<ClassEntry>> {
        let conn = self.connection.lock();
        Self::query_entries(&conn, "SELECT id, entry_json FROM entries ORDER BY id ASC", [])
    }

    fn find_entry_by_cell(
        &self,
        day: Day,
        period: Period,
    ) -> PersistenceResult<Option<ClassEntry>> {
        let conn = self.connection.lock();
        let entries = Self::query_entries(
            &conn,
            "SELECT id, entry_json FROM entries WHERE day = ?1 AND period = ?2
             ORDER BY id ASC LIMIT 1",
            params![day.index(), period.to_string()],
        )?;
        Ok(entries.into_iter().next())
    }

    fn find_entries_by_cell(&self, day: Day, period: Period) -> PersistenceResult<Vec<ClassEntry>> {
        let conn = self.connection.lock();
        Self::query_entries(
            &conn,
            "SELECT id, entry_json FROM entries WHERE day = ?1 AND period = ?2 ORDER BY id ASC",
            params![day.index(), period.to_string()],
        )
    }

    fn clear_entries(&self) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }

    fn bulk_add_entries(&self, entries: Vec<ClassEntry>) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (id, day, period, entry_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in &entries {
                if Self::entry_exists(&tx, entry.id)? {
                    return Err(PersistenceError::Conflict {
                        table: "entries",
                        id: entry.id,
                    });
                }
                let json = serde_json::to_string(entry)?;
                stmt.execute(params![
                    entry.id,
                    entry.day.index(),
                    entry.period.to_string(),
                    json
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_settings(&self) -> PersistenceResult<Vec<Setting>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT id, key, value_json FROM settings ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            let (id, key, value_json) = row?;
            settings.push(Self::decode_setting(id, key, &value_json)?);
        }
        Ok(settings)
    }

    fn find_setting(&self, key: &str) -> PersistenceResult<Option<Setting>> {
        let conn = self.connection.lock();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, value_json FROM settings WHERE key = ?1 ORDER BY id ASC LIMIT 1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(id, value_json)| Self::decode_setting(id, key.to_string(), &value_json))
            .transpose()
    }

    fn put_setting(&self, setting: Setting) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let value_json = serde_json::to_string(&setting.value)?;
        let changed = tx.execute(
            "UPDATE settings SET value_json = ?1 WHERE key = ?2",
            params![value_json, setting.key],
        )?;
        if changed == 0 {
            tx.execute(
                "INSERT INTO settings (key, value_json) VALUES (?1, ?2)",
                params![setting.key, value_json],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_settings(&self) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM settings", [])?;
        Ok(())
    }

    fn bulk_add_settings(&self, settings: Vec<Setting>) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        for setting in &settings {
            let value_json = serde_json::to_string(&setting.value)?;
            match setting.id {
                Some(id) => {
                    if Self::setting_exists(&tx, id)? {
                        return Err(PersistenceError::Conflict {
                            table: "settings",
                            id,
                        });
                    }
                    tx.execute(
                        "INSERT INTO settings (id, key, value_json) VALUES (?1, ?2, ?3)",
                        params![id, setting.key, value_json],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO settings (key, value_json) VALUES (?1, ?2)",
                        params![setting.key, value_json],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
