use super::PersistenceResult;
use crate::entry::{ClassEntry, Repeat, RepeatEndType};
use crate::setting::Setting;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Full export of both tables. Missing arrays read as empty; the pre-rename
/// key names `classes` and `exportDate` are still accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, alias = "classes")]
    pub entries: Vec<ClassEntry>,
    #[serde(default)]
    pub settings: Vec<Setting>,
    #[serde(
        rename = "exportedAtISO8601",
        alias = "exportDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exported_at: Option<DateTime<Utc>>,
}

pub fn save_snapshot_to_json<P: AsRef<Path>>(
    snapshot: &Snapshot,
    path: P,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<Snapshot> {
    let file = File::open(path)?;
    let snapshot: Snapshot = serde_json::from_reader(file)?;
    Ok(snapshot)
}

#[derive(Serialize)]
struct EntryCsvRecord<'a> {
    id: i64,
    name: &'a str,
    room: &'a str,
    teacher: &'a str,
    note: &'a str,
    color: &'a str,
    day: &'static str,
    period: String,
    repeat: &'static str,
    repeat_end_type: &'static str,
    repeat_end_date: String,
    repeat_count: String,
    created_at: String,
    updated_at: String,
}

impl<'a> From<&'a ClassEntry> for EntryCsvRecord<'a> {
    fn from(entry: &'a ClassEntry) -> Self {
        let repeat = match entry.repeat {
            Repeat::None => "none",
            Repeat::Weekly => "weekly",
        };
        let repeat_end_type = match entry.repeat_end_type {
            None => "",
            Some(RepeatEndType::Never) => "never",
            Some(RepeatEndType::Date) => "date",
            Some(RepeatEndType::Count) => "count",
        };
        Self {
            id: entry.id,
            name: &entry.name,
            room: &entry.room,
            teacher: &entry.teacher,
            note: &entry.note,
            color: &entry.color,
            day: entry.day.label(),
            period: entry.period.to_string(),
            repeat,
            repeat_end_type,
            repeat_end_date: entry
                .repeat_end_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            repeat_count: entry
                .repeat_count
                .map(|c| c.to_string())
                .unwrap_or_default(),
            created_at: entry.created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            updated_at: entry.updated_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

/// Flat spreadsheet export, one row per stored entry.
pub fn save_entries_to_csv<P: AsRef<Path>>(
    entries: &[ClassEntry],
    path: P,
) -> PersistenceResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(EntryCsvRecord::from(entry))?;
    }
    writer.flush()?;
    Ok(())
}
