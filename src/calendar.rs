use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use parking_lot::Mutex;

use crate::entry::Day;

/// Monday of the week containing `date`. Sunday belongs to the week that
/// started six days earlier.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Whole weeks from `from` to `to`, floored. Negative when `to` is earlier.
pub fn week_diff(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days().div_euclid(7)
}

/// Calendar date of `day` within the week that contains `week`.
pub fn anchored_date(week: NaiveDate, day: Day) -> NaiveDate {
    week_start(week) + Duration::days(i64::from(day.index()))
}

/// Source of "now" for timestamps and the default displayed week.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn current_week_start(&self) -> NaiveDate {
        week_start(self.today())
    }

    /// `now` read as local time and converted to UTC. A local time skipped
    /// by a DST jump is taken as UTC unchanged.
    fn now_utc(&self) -> DateTime<Utc> {
        let now = self.now();
        match now.and_local_timezone(Local).earliest() {
            Some(local) => local.with_timezone(&Utc),
            None => now.and_utc(),
        }
    }
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
