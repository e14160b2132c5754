use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub type EntryId = i64;

/// School day of the weekly grid. Serialized as its index, Monday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Day {
    pub const ALL: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Three-letter label used in cell keys.
    pub fn label(self) -> &'static str {
        match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
        }
    }
}

impl TryFrom<u8> for Day {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Day::from_index(value).ok_or_else(|| format!("day index {value} is outside 0..=4"))
    }
}

impl From<Day> for u8 {
    fn from(day: Day) -> Self {
        day.index()
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Day {
    type Err = String;

    /// Accepts either the index (`0`..`4`) or the label (`mon`..`fri`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Day::try_from(index);
        }
        Day::ALL
            .into_iter()
            .find(|day| day.label() == trimmed)
            .ok_or_else(|| format!("unknown day '{s}'"))
    }
}

/// Slot within a day: a numbered period or the lunch break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr", into = "PeriodRepr")]
pub enum Period {
    Numbered(u8),
    Lunch,
}

const LUNCH: &str = "lunch";

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PeriodRepr {
    Number(u8),
    Text(String),
}

impl TryFrom<PeriodRepr> for Period {
    type Error = String;

    fn try_from(value: PeriodRepr) -> Result<Self, Self::Error> {
        match value {
            PeriodRepr::Number(n) => Ok(Period::Numbered(n)),
            PeriodRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Period> for PeriodRepr {
    fn from(period: Period) -> Self {
        match period {
            Period::Numbered(n) => PeriodRepr::Number(n),
            Period::Lunch => PeriodRepr::Text(LUNCH.to_string()),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Numbered(n) => write!(f, "{n}"),
            Period::Lunch => f.write_str(LUNCH),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(LUNCH) {
            return Ok(Period::Lunch);
        }
        trimmed
            .parse::<u8>()
            .map(Period::Numbered)
            .map_err(|_| format!("unknown period '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    None,
    Weekly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatEndType {
    Never,
    Date,
    Count,
}

impl FromStr for Repeat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Repeat::None),
            "weekly" => Ok(Repeat::Weekly),
            other => Err(format!("unknown repeat '{other}' (expected none|weekly)")),
        }
    }
}

impl FromStr for RepeatEndType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(RepeatEndType::Never),
            "date" => Ok(RepeatEndType::Date),
            "count" => Ok(RepeatEndType::Count),
            other => Err(format!(
                "unknown repeat end '{other}' (expected never|date|count)"
            )),
        }
    }
}

/// One scheduled class as it is stored. The flat `repeat*` fields mirror the
/// export format; [`ClassEntry::recurrence`] gives the typed reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntry {
    pub id: EntryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub color: String,
    pub day: Day,
    pub period: Period,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_type: Option<RepeatEndType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

/// Accepts RFC 3339 with an offset (`2025-04-07T08:00:00.000Z`), converted to
/// local time, as well as the naive `2025-04-07T08:00:00` form.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(with_offset.with_timezone(&Local).naive_local());
    }
    raw.parse::<NaiveDateTime>().map_err(serde::de::Error::custom)
}

impl ClassEntry {
    pub fn from_draft(
        id: EntryId,
        draft: EntryDraft,
        created_at: NaiveDateTime,
        updated_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            name: draft.name,
            room: draft.room,
            teacher: draft.teacher,
            note: draft.note,
            color: draft.color,
            day: draft.day,
            period: draft.period,
            repeat: draft.repeat,
            repeat_end_type: draft.repeat_end_type,
            repeat_end_date: draft.repeat_end_date,
            repeat_count: draft.repeat_count,
            created_at,
            updated_at,
        }
    }
}

/// Form input for a new entry: everything but the id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub color: String,
    pub day: Day,
    pub period: Period,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_type: Option<RepeatEndType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
}

impl EntryDraft {
    pub fn new(name: impl Into<String>, day: Day, period: Period) -> Self {
        Self {
            name: name.into(),
            room: String::new(),
            teacher: String::new(),
            note: String::new(),
            color: String::new(),
            day,
            period,
            repeat: Repeat::None,
            repeat_end_type: None,
            repeat_end_date: None,
            repeat_count: None,
        }
    }

    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn teacher(mut self, teacher: impl Into<String>) -> Self {
        self.teacher = teacher.into();
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Partial update. `Some` overwrites the stored value, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_type: Option<RepeatEndType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
}

impl EntryPatch {
    /// Merges the patch into `entry` and stamps `updated_at`. `id` and
    /// `created_at` are never touched.
    pub fn apply_to(&self, entry: &mut ClassEntry, updated_at: NaiveDateTime) {
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(room) = &self.room {
            entry.room = room.clone();
        }
        if let Some(teacher) = &self.teacher {
            entry.teacher = teacher.clone();
        }
        if let Some(note) = &self.note {
            entry.note = note.clone();
        }
        if let Some(color) = &self.color {
            entry.color = color.clone();
        }
        if let Some(day) = self.day {
            entry.day = day;
        }
        if let Some(period) = self.period {
            entry.period = period;
        }
        if let Some(repeat) = self.repeat {
            entry.repeat = repeat;
        }
        if let Some(end_type) = self.repeat_end_type {
            entry.repeat_end_type = Some(end_type);
        }
        if let Some(end_date) = self.repeat_end_date {
            entry.repeat_end_date = Some(end_date);
        }
        if let Some(count) = self.repeat_count {
            entry.repeat_count = Some(count);
        }
        entry.updated_at = updated_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn period_accepts_numbers_and_lunch() {
        let numbered: Period = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(numbered, Period::Numbered(3));
        let lunch: Period = serde_json::from_value(json!("lunch")).unwrap();
        assert_eq!(lunch, Period::Lunch);
        let text_number: Period = serde_json::from_value(json!("2")).unwrap();
        assert_eq!(text_number, Period::Numbered(2));
        assert!(serde_json::from_value::<Period>(json!("brunch")).is_err());

        assert_eq!(serde_json::to_value(Period::Lunch).unwrap(), json!("lunch"));
        assert_eq!(serde_json::to_value(Period::Numbered(4)).unwrap(), json!(4));
    }

    #[test]
    fn day_round_trips_as_index_and_rejects_weekend() {
        assert_eq!(serde_json::to_value(Day::Thu).unwrap(), json!(3));
        assert_eq!(serde_json::from_value::<Day>(json!(0)).unwrap(), Day::Mon);
        assert!(serde_json::from_value::<Day>(json!(5)).is_err());
        assert_eq!("fri".parse::<Day>().unwrap(), Day::Fri);
        assert_eq!("1".parse::<Day>().unwrap(), Day::Tue);
    }

    #[test]
    fn entry_uses_camel_case_field_names() {
        let value = json!({
            "id": 7,
            "name": "Math",
            "day": 0,
            "period": 1,
            "repeat": "weekly",
            "repeatEndType": "count",
            "repeatCount": 3,
            "createdAt": "2025-01-06T09:00:00",
            "updatedAt": "2025-01-06T09:00:00"
        });
        let entry: ClassEntry = serde_json::from_value(value).unwrap();
        assert_eq!(entry.repeat, Repeat::Weekly);
        assert_eq!(entry.repeat_end_type, Some(RepeatEndType::Count));
        assert_eq!(entry.repeat_count, Some(3));
        assert_eq!(entry.room, "");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["repeatEndType"], json!("count"));
        assert!(back.get("repeatEndDate").is_none());
    }

    #[test]
    fn timestamps_accept_utc_offset_and_naive_forms() {
        let mut value = json!({
            "id": 4,
            "day": 0,
            "period": 1,
            "createdAt": "2025-04-07T08:00:00.000Z",
            "updatedAt": "2025-04-07T08:00:00.250"
        });
        let entry: ClassEntry = serde_json::from_value(value.clone()).unwrap();
        let expected = DateTime::parse_from_rfc3339("2025-04-07T08:00:00Z")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(entry.created_at, expected);
        assert_eq!(
            entry.updated_at,
            NaiveDate::from_ymd_opt(2025, 4, 7)
                .unwrap()
                .and_hms_milli_opt(8, 0, 0, 250)
                .unwrap()
        );

        value["createdAt"] = json!("last tuesday");
        assert!(serde_json::from_value::<ClassEntry>(value).is_err());
    }

    #[test]
    fn patch_keeps_identity_and_creation_time() {
        let created = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let later = created + chrono::Duration::days(2);
        let mut entry = ClassEntry::from_draft(
            4,
            EntryDraft::new("Math", Day::Mon, Period::Numbered(1)),
            created,
            created,
        );
        let patch = EntryPatch {
            name: Some("Algebra".into()),
            room: Some("204".into()),
            ..EntryPatch::default()
        };
        patch.apply_to(&mut entry, later);

        assert_eq!(entry.id, 4);
        assert_eq!(entry.name, "Algebra");
        assert_eq!(entry.room, "204");
        assert_eq!(entry.created_at, created);
        assert_eq!(entry.updated_at, later);
    }
}
