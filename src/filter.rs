use crate::model::{ReservationInfo, ReservationStatus};

/// Predicates applied to query rows. An unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    /// Case-insensitive substring of the room name.
    pub room_name: Option<String>,
}

impl ReservationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Blank search text is ignored.
    pub fn with_room_name(mut self, needle: &str) -> Self {
        let needle = needle.trim();
        self.room_name = (!needle.is_empty()).then(|| needle.to_lowercase());
        self
    }

    pub fn matches(&self, row: &ReservationInfo) -> bool {
        if let Some(status) = self.status
            && row.status != status
        {
            return false;
        }
        match &self.room_name {
            Some(needle) => row.room_name.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }

    /// Keeps the input order.
    pub fn apply(&self, rows: Vec<ReservationInfo>) -> Vec<ReservationInfo> {
        rows.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Totals shown above a booking list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationSummary {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub cancelled: usize,
    pub completed: usize,
    /// Nights booked by PENDING and CONFIRMED stays.
    pub active_nights: i64,
}

impl ReservationSummary {
    pub fn active(&self) -> usize {
        self.pending + self.confirmed
    }

    pub fn count(&self, status: ReservationStatus) -> usize {
        match status {
            ReservationStatus::Pending => self.pending,
            ReservationStatus::Confirmed => self.confirmed,
            ReservationStatus::Cancelled => self.cancelled,
            ReservationStatus::Completed => self.completed,
        }
    }
}

pub fn summarize<'a>(rows: impl IntoIterator<Item = &'a ReservationInfo>) -> ReservationSummary {
    let mut summary = ReservationSummary::default();
    for row in rows {
        summary.total += 1;
        match row.status {
            ReservationStatus::Pending => summary.pending += 1,
            ReservationStatus::Confirmed => summary.confirmed += 1,
            ReservationStatus::Cancelled => summary.cancelled += 1,
            ReservationStatus::Completed => summary.completed += 1,
        }
        if row.status.is_active() {
            summary.active_nights += row.nights;
        }
    }
    summary
}
