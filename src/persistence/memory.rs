use super::{PersistenceError, PersistenceResult, TimetableStore};
use crate::entry::{ClassEntry, Day, EntryDraft, EntryId, EntryPatch, Period};
use crate::setting::Setting;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::BTreeMap;

struct Tables {
    entries: BTreeMap<EntryId, ClassEntry>,
    settings: BTreeMap<i64, Setting>,
    next_entry_id: EntryId,
    next_setting_id: i64,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            settings: BTreeMap::new(),
            next_entry_id: 1,
            next_setting_id: 1,
        }
    }
}

impl Tables {
    fn cell_entries(&self, day: Day, period: Period) -> impl Iterator<Item = &ClassEntry> {
        self.entries
            .values()
            .filter(move |entry| entry.day == day && entry.period == period)
    }

    fn insert_setting(&mut self, mut setting: Setting) {
        let id = match setting.id {
            Some(id) => id,
            None => self.next_setting_id,
        };
        self.next_setting_id = self.next_setting_id.max(id + 1);
        setting.id = Some(id);
        self.settings.insert(id, setting);
    }
}

/// In-process store. Entries are listed in id order.
#[derive(Default)]
pub struct MemoryTimetableStore {
    tables: Mutex<Tables>,
}

impl MemoryTimetableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimetableStore for MemoryTimetableStore {
    fn add_entry(
        &self,
        draft: &EntryDraft,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<EntryId> {
        let mut tables = self.tables.lock();
        let id = tables.next_entry_id;
        tables.next_entry_id += 1;
        let entry = ClassEntry::from_draft(id, draft.clone(), created_at, updated_at);
        tables.entries.insert(id, entry);
        Ok(id)
    }

    fn get_entry(&self, id: EntryId) -> PersistenceResult<Option<ClassEntry>> {
        Ok(self.tables.lock().entries.get(&id).cloned())
    }

    fn update_entry(
        &self,
        id: EntryId,
        patch: &EntryPatch,
        updated_at: NaiveDateTime,
    ) -> PersistenceResult<usize> {
        let mut tables = self.tables.lock();
        match tables.entries.get_mut(&id) {
            Some(entry) => {
                patch.apply_to(entry, updated_at);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_entry(&self, id: EntryId) -> PersistenceResult<()> {
        self.tables.lock().entries.remove(&id);
        Ok(())
    }

    fn list_entries(&self) -> PersistenceResult<Vec<ClassEntry>> {
        Ok(self.tables.lock().entries.values().cloned().collect())
    }

    fn find_entry_by_cell(
        &self,
        day: Day,
        period: Period,
    ) -> PersistenceResult<Option<ClassEntry>> {
        Ok(self.tables.lock().cell_entries(day, period).next().cloned())
    }

    fn find_entries_by_cell(&self, day: Day, period: Period) -> PersistenceResult<Vec<ClassEntry>> {
        Ok(self
            .tables
            .lock()
            .cell_entries(day, period)
            .cloned()
            .collect())
    }

    fn clear_entries(&self) -> PersistenceResult<()> {
        self.tables.lock().entries.clear();
        Ok(())
    }

    fn bulk_add_entries(&self, entries: Vec<ClassEntry>) -> PersistenceResult<()> {
        let mut tables = self.tables.lock();
        let mut incoming = BTreeMap::new();
        for entry in entries {
            if tables.entries.contains_key(&entry.id) || incoming.contains_key(&entry.id) {
                return Err(PersistenceError::Conflict {
                    table: "entries",
                    id: entry.id,
                });
            }
            incoming.insert(entry.id, entry);
        }
        if let Some(max_id) = incoming.keys().next_back() {
            tables.next_entry_id = tables.next_entry_id.max(max_id + 1);
        }
        tables.entries.append(&mut incoming);
        Ok(())
    }

    fn list_settings(&self) -> PersistenceResult<Vec<Setting>> {
        Ok(self.tables.lock().settings.values().cloned().collect())
    }

    fn find_setting(&self, key: &str) -> PersistenceResult<Option<Setting>> {
        Ok(self
            .tables
            .lock()
            .settings
            .values()
            .find(|setting| setting.key == key)
            .cloned())
    }

    fn put_setting(&self, setting: Setting) -> PersistenceResult<()> {
        let mut tables = self.tables.lock();
        if let Some(stored) = tables
            .settings
            .values_mut()
            .find(|stored| stored.key == setting.key)
        {
            stored.value = setting.value;
            return Ok(());
        }
        tables.insert_setting(Setting { id: None, ..setting });
        Ok(())
    }

    fn clear_settings(&self) -> PersistenceResult<()> {
        self.tables.lock().settings.clear();
        Ok(())
    }

    fn bulk_add_settings(&self, settings: Vec<Setting>) -> PersistenceResult<()> {
        let mut tables = self.tables.lock();
        let mut seen = Vec::with_capacity(settings.len());
        for id in settings.iter().filter_map(|setting| setting.id) {
            if tables.settings.contains_key(&id) || seen.contains(&id) {
                return Err(PersistenceError::Conflict {
                    table: "settings",
                    id,
                });
            }
            seen.push(id);
        }
        for setting in settings {
            tables.insert_setting(setting);
        }
        Ok(())
    }
}
