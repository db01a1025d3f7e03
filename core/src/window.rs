use chrono::{DateTime, Days, NaiveDate, TimeZone};
use serde::Serialize;

/// Number of calendar days covered by a planning window.
pub const WINDOW_DAYS: u64 = 7;

/// The rolling planning window: today through today + 6, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanningWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PlanningWindow {
    /// The window starting on the local calendar date of `now`.
    ///
    /// Truncation to midnight happens in `now`'s own time zone, so callers pass
    /// `Local::now()` for the user's notion of "today".
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        Self::starting(now.date_naive())
    }

    #[must_use]
    pub fn starting(start: NaiveDate) -> Self {
        let end = start
            .checked_add_days(Days::new(WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MAX);
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Shorthand used by the aggregator and the scorer so both agree on "this week".
pub fn compute_window<Tz: TimeZone>(now: &DateTime<Tz>) -> PlanningWindow {
    PlanningWindow::containing(now)
}
