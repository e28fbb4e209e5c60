use chrono::{Datelike, Duration, NaiveDate};

/// One unit of a scrape range: a single day, or an N-day span ending on `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }
}

/// Reverse-chronological walk over a date range.
///
/// Yields periods ending on `end`, `end - step`, `end - 2*step`, and so on.
/// The sequence has `ceil(days / step) + 1` entries where
/// `days = end - start`, so for steps larger than one day the final period
/// may end at or before `start`; consumers clamp what they do with it, the
/// iterator never does. Restart by constructing a fresh iterator.
#[derive(Debug, Clone)]
pub struct DateWindow {
    end: NaiveDate,
    step_days: i64,
    count: i64,
    emitted: i64,
}

impl DateWindow {
    /// Day granularity: one period per calendar day, newest first.
    pub fn daily(start: NaiveDate, end: NaiveDate) -> Self {
        Self::stepping(start, end, 1)
    }

    /// N-day chunks, newest first; each period spans `step_days` days
    /// ending on its `end` date.
    pub fn chunked(start: NaiveDate, end: NaiveDate, step_days: u32) -> Self {
        Self::stepping(start, end, i64::from(step_days.max(1)))
    }

    fn stepping(start: NaiveDate, end: NaiveDate, step_days: i64) -> Self {
        let days = (end - start).num_days().max(0);
        // integer ceiling; days is clamped non-negative and step_days is
        // at least 1
        let count = (days + step_days - 1) / step_days + 1;
        Self {
            end,
            step_days,
            count,
            emitted: 0,
        }
    }
}

impl Iterator for DateWindow {
    type Item = Period;

    fn next(&mut self) -> Option<Period> {
        if self.emitted >= self.count {
            return None;
        }
        let end = self.end - Duration::days(self.step_days * self.emitted);
        self.emitted += 1;
        Some(Period {
            start: end - Duration::days(self.step_days - 1),
            end,
        })
    }
}

/// Whole-month distance between two dates, ignoring the day component.
/// `low` is the earlier date.
pub fn month_distance(low: NaiveDate, high: NaiveDate) -> i32 {
    (high.year() - low.year()) * 12 + (high.month() as i32 - low.month() as i32)
}

/// Tracks which month a calendar widget currently shows.
///
/// The picker keeps whatever month was last rendered, so the backward
/// transition count for the next target has to be computed against the live
/// cursor, not against the month the run started on.
#[derive(Debug, Clone, Copy)]
pub struct CalendarCursor {
    showing: NaiveDate,
}

impl CalendarCursor {
    pub fn new(showing: NaiveDate) -> Self {
        Self { showing }
    }

    pub fn showing(&self) -> NaiveDate {
        self.showing
    }

    /// Number of backward month-transitions needed to reach `target`,
    /// recording `target` as the month shown afterwards.
    pub fn steps_back_to(&mut self, target: NaiveDate) -> u32 {
        let steps = month_distance(target, self.showing).max(0) as u32;
        self.showing = target;
        steps
    }
}
