use chrono::NaiveDate;

use crate::calendar::{week_diff, week_start};
use crate::entry::{ClassEntry, EntryDraft, Repeat, RepeatEndType};

/// Typed reading of an entry's flat repeat fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    /// Shown only in the week it was created.
    Once,
    Weekly(RepeatUntil),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatUntil {
    Never,
    /// Last week whose Monday is on or before this date.
    Date(NaiveDate),
    /// Number of weekly occurrences, counting the creation week.
    Count(u32),
}

impl Recurrence {
    /// A `date`/`count` end type with its value missing reads as `Never`.
    pub fn from_fields(
        repeat: Repeat,
        end_type: Option<RepeatEndType>,
        end_date: Option<NaiveDate>,
        count: Option<u32>,
    ) -> Self {
        match repeat {
            Repeat::None => Recurrence::Once,
            Repeat::Weekly => {
                let until = match (end_type, end_date, count) {
                    (Some(RepeatEndType::Date), Some(date), _) => RepeatUntil::Date(date),
                    (Some(RepeatEndType::Count), _, Some(count)) => RepeatUntil::Count(count),
                    _ => RepeatUntil::Never,
                };
                Recurrence::Weekly(until)
            }
        }
    }

    /// Whether an occurrence falls `weeks` after the creation week, with
    /// `target_week_start` the Monday being displayed.
    pub fn occurs(&self, weeks: i64, target_week_start: NaiveDate) -> bool {
        match self {
            Recurrence::Once => weeks == 0,
            Recurrence::Weekly(_) if weeks < 0 => false,
            Recurrence::Weekly(RepeatUntil::Never) => true,
            Recurrence::Weekly(RepeatUntil::Date(end)) => target_week_start <= *end,
            Recurrence::Weekly(RepeatUntil::Count(count)) => weeks < i64::from(*count),
        }
    }
}

impl ClassEntry {
    pub fn recurrence(&self) -> Recurrence {
        Recurrence::from_fields(
            self.repeat,
            self.repeat_end_type,
            self.repeat_end_date,
            self.repeat_count,
        )
    }
}

impl EntryDraft {
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        let (repeat, end_type, end_date, count) = match recurrence {
            Recurrence::Once => (Repeat::None, None, None, None),
            Recurrence::Weekly(RepeatUntil::Never) => {
                (Repeat::Weekly, Some(RepeatEndType::Never), None, None)
            }
            Recurrence::Weekly(RepeatUntil::Date(date)) => {
                (Repeat::Weekly, Some(RepeatEndType::Date), Some(date), None)
            }
            Recurrence::Weekly(RepeatUntil::Count(count)) => {
                (Repeat::Weekly, Some(RepeatEndType::Count), None, Some(count))
            }
        };
        self.repeat = repeat;
        self.repeat_end_type = end_type;
        self.repeat_end_date = end_date;
        self.repeat_count = count;
        self
    }
}

/// Whether `entry` is visible in the week starting `target_week_start`.
///
/// Week zero is the Monday-based week containing `entry.created_at`. The
/// target is compared as given; callers pass a Monday.
pub fn should_show_in_week(entry: &ClassEntry, target_week_start: NaiveDate) -> bool {
    let created_week_start = week_start(entry.created_at.date());
    let weeks = week_diff(created_week_start, target_week_start);
    entry.recurrence().occurs(weeks, target_week_start)
}
