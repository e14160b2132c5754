pub mod calendar;
pub mod config;
pub mod entry;
#[cfg(feature = "cli")]
pub mod logging;
pub mod persistence;
pub mod recurrence;
pub mod setting;
pub mod timetable;

pub use calendar::{Clock, FixedClock, SystemClock, anchored_date, week_diff, week_start};
pub use config::TimetableConfig;
pub use entry::{ClassEntry, Day, EntryDraft, EntryId, EntryPatch, Period, Repeat, RepeatEndType};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteTimetableStore;
pub use persistence::{
    MemoryTimetableStore, PersistenceError, PersistenceResult, Snapshot, TimetableStore,
    load_snapshot_from_json, save_entries_to_csv, save_snapshot_to_json,
};
pub use recurrence::{Recurrence, RepeatUntil, should_show_in_week};
pub use setting::Setting;
pub use timetable::{CellDisplay, CellKey, TimetableService, WeekView};
