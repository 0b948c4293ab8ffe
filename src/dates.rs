use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Returned when a stay does not end strictly after it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl std::fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "check-out {} must be after check-in {}",
            self.check_out, self.check_in
        )
    }
}

impl std::error::Error for InvalidRange {}

/// Number of nights between two calendar dates.
pub fn night_count(check_in: NaiveDate, check_out: NaiveDate) -> Result<i64, InvalidRange> {
    if check_out <= check_in {
        return Err(InvalidRange { check_in, check_out });
    }
    Ok(check_out.signed_duration_since(check_in).num_days())
}

/// Half-open overlap: a check-out on day X never conflicts with a check-in on day X.
pub fn ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Day-granularity comparison against the reference instant (UTC).
pub fn is_past_date(date: NaiveDate, now: DateTime<Utc>) -> bool {
    date < now.date_naive()
}

/// The single time source for every eligibility and staleness check.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Midnight UTC of the given day.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::default()).and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance_days(&self, days: i64) {
        let mut guard = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *guard += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}
