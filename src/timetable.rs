use crate::calendar::{Clock, SystemClock, anchored_date, week_start};
use crate::entry::{ClassEntry, Day, EntryDraft, EntryId, EntryPatch, Period};
use crate::persistence::{PersistenceError, PersistenceResult, Snapshot, TimetableStore};
use crate::recurrence::should_show_in_week;
use crate::setting::Setting;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info};

/// Grid position, rendered as `mon-1`, `wed-lunch`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CellKey {
    pub day: Day,
    pub period: Period,
}

impl CellKey {
    pub fn new(day: Day, period: Period) -> Self {
        Self { day, period }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day.label(), self.period)
    }
}

impl FromStr for CellKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, period) = s
            .split_once('-')
            .ok_or_else(|| format!("cell key '{s}' is not <day>-<period>"))?;
        Ok(Self {
            day: day.parse()?,
            period: period.parse()?,
        })
    }
}

impl From<CellKey> for String {
    fn from(key: CellKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for CellKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// What the grid shows for an occupied cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDisplay {
    pub id: EntryId,
    pub name: String,
    pub room: String,
    pub color: String,
    pub teacher: String,
    pub note: String,
}

impl From<&ClassEntry> for CellDisplay {
    fn from(entry: &ClassEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
            room: entry.room.clone(),
            color: entry.color.clone(),
            teacher: entry.teacher.clone(),
            note: entry.note.clone(),
        }
    }
}

/// Occupants of every visible cell for one displayed week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub cells: BTreeMap<CellKey, CellDisplay>,
}

impl WeekView {
    /// Keeps, per cell, the visible entry with the largest id.
    pub fn build(week_start: NaiveDate, entries: &[ClassEntry]) -> Self {
        let mut winners: BTreeMap<CellKey, &ClassEntry> = BTreeMap::new();
        for entry in entries {
            if !should_show_in_week(entry, week_start) {
                continue;
            }
            let key = CellKey::new(entry.day, entry.period);
            winners
                .entry(key)
                .and_modify(|current| {
                    if entry.id > current.id {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }

        Self {
            week_start,
            cells: winners
                .into_iter()
                .map(|(key, entry)| (key, CellDisplay::from(entry)))
                .collect(),
        }
    }

    pub fn get(&self, day: Day, period: Period) -> Option<&CellDisplay> {
        self.cells.get(&CellKey::new(day, period))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Distinct periods with at least one occupied cell, in grid order.
    pub fn periods(&self) -> Vec<Period> {
        let mut periods: Vec<Period> = self.cells.keys().map(|key| key.period).collect();
        periods.sort();
        periods.dedup();
        periods
    }
}

/// Timetable operations over an injected store and clock.
pub struct TimetableService<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: TimetableStore> TimetableService<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: TimetableStore, C: Clock> TimetableService<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Stores a new entry and evicts every current occupant of its cell.
    ///
    /// With `week_start`, `created_at` is pinned to midnight of `draft.day`
    /// in that week, so the entry's week zero is the week being viewed. The
    /// eviction and the insert are separate store calls.
    pub fn add_entry(
        &self,
        draft: EntryDraft,
        week_start: Option<NaiveDate>,
    ) -> PersistenceResult<EntryId> {
        let now = self.clock.now();
        let created_at = match week_start {
            Some(week) => anchored_date(week, draft.day).and_time(NaiveTime::MIN),
            None => now,
        };

        let occupants = self.store.find_entries_by_cell(draft.day, draft.period)?;
        if !occupants.is_empty() {
            let evicted: Vec<EntryId> = occupants.iter().map(|entry| entry.id).collect();
            info!(
                cell = %CellKey::new(draft.day, draft.period),
                ?evicted,
                "replacing existing occupants of cell"
            );
            for id in evicted {
                self.store.delete_entry(id)?;
            }
        }

        let id = self.store.add_entry(&draft, created_at, now)?;
        debug!(id, %created_at, "entry added");
        Ok(id)
    }

    /// Returns the number of rows changed; an unknown id yields 0.
    pub fn update_entry(&self, id: EntryId, patch: &EntryPatch) -> PersistenceResult<usize> {
        let changed = self.store.update_entry(id, patch, self.clock.now())?;
        if changed == 0 {
            debug!(id, "update matched no entry");
        }
        Ok(changed)
    }

    pub fn delete_entry(&self, id: EntryId) -> PersistenceResult<()> {
        self.store.delete_entry(id)
    }

    pub fn get_entry(&self, id: EntryId) -> PersistenceResult<Option<ClassEntry>> {
        self.store.get_entry(id)
    }

    pub fn list_all(&self) -> PersistenceResult<Vec<ClassEntry>> {
        self.store.list_entries()
    }

    /// Static lookup, not recurrence-aware.
    pub fn find_by_cell(&self, day: Day, period: Period) -> PersistenceResult<Option<ClassEntry>> {
        self.store.find_entry_by_cell(day, period)
    }

    pub fn find_all_by_cell(&self, day: Day, period: Period) -> PersistenceResult<Vec<ClassEntry>> {
        self.store.find_entries_by_cell(day, period)
    }

    /// Builds the grid for the week containing `target`, or the current week.
    pub fn week_view(&self, target: Option<NaiveDate>) -> PersistenceResult<WeekView> {
        let target = match target {
            Some(date) => week_start(date),
            None => self.clock.current_week_start(),
        };
        let entries = self.store.list_entries()?;
        let view = WeekView::build(target, &entries);
        debug!(
            week_start = %target,
            stored = entries.len(),
            visible = view.len(),
            "week view built"
        );
        Ok(view)
    }

    /// Deletes all but the largest-id entry of every `(day, period)` group,
    /// regardless of display week. Returns how many were removed.
    pub fn cleanup_duplicates(&self) -> PersistenceResult<usize> {
        let entries = self.store.list_entries()?;
        let mut keep: HashMap<CellKey, EntryId> = HashMap::new();
        for entry in &entries {
            let key = CellKey::new(entry.day, entry.period);
            keep.entry(key)
                .and_modify(|id| *id = (*id).max(entry.id))
                .or_insert(entry.id);
        }

        let duplicates: Vec<EntryId> = entries
            .iter()
            .filter(|entry| keep.get(&CellKey::new(entry.day, entry.period)) != Some(&entry.id))
            .map(|entry| entry.id)
            .collect();

        if !duplicates.is_empty() {
            info!(?duplicates, "removing duplicate cell entries");
            for id in &duplicates {
                self.store.delete_entry(*id)?;
            }
        }
        Ok(duplicates.len())
    }

    pub fn export_snapshot(&self) -> PersistenceResult<Snapshot> {
        Ok(Snapshot {
            entries: self.store.list_entries()?,
            settings: self.store.list_settings()?,
            exported_at: Some(self.clock.now_utc()),
        })
    }

    /// Replaces both tables with the snapshot contents. Failures are logged
    /// and reported as `false`; tables cleared before the failure stay
    /// cleared.
    pub fn import_snapshot(&self, snapshot: Snapshot) -> bool {
        let entries = snapshot.entries.len();
        let settings = snapshot.settings.len();
        match self.replace_tables(snapshot) {
            Ok(()) => {
                info!(entries, settings, "snapshot imported");
                true
            }
            Err(err) => {
                error!(error = %err, "snapshot import failed");
                false
            }
        }
    }

    fn replace_tables(&self, snapshot: Snapshot) -> Result<(), PersistenceError> {
        self.store.clear_entries()?;
        self.store.clear_settings()?;
        if !snapshot.entries.is_empty() {
            self.store.bulk_add_entries(snapshot.entries)?;
        }
        if !snapshot.settings.is_empty() {
            self.store.bulk_add_settings(snapshot.settings)?;
        }
        Ok(())
    }

    pub fn setting(&self, key: &str) -> PersistenceResult<Option<Setting>> {
        self.store.find_setting(key)
    }

    pub fn put_setting(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> PersistenceResult<()> {
        self.store.put_setting(Setting::new(key, value))
    }
}
