use chrono::NaiveDate;

use crate::dates::InvalidRange;
use crate::model::*;

/// Why a candidate stay cannot be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    RoomDisabled,
    InvalidRange(InvalidRange),
    PastCheckIn,
    Conflict(ReservationId),
}

// ── Availability check ────────────────────────────────────────────

/// Linear scan over `existing`: only active reservations of `room` other than
/// `excluding` can block the candidate stay.
pub fn check_availability<'a>(
    room: &Room,
    check_in: NaiveDate,
    check_out: NaiveDate,
    excluding: Option<ReservationId>,
    existing: impl IntoIterator<Item = &'a Reservation>,
    today: NaiveDate,
) -> Result<DateRange, Refusal> {
    if !room.is_available {
        return Err(Refusal::RoomDisabled);
    }
    let candidate = DateRange::new(check_in, check_out).map_err(Refusal::InvalidRange)?;
    if check_in < today {
        return Err(Refusal::PastCheckIn);
    }
    for other in existing {
        if other.room_id != room.id || !other.is_active() || Some(other.id) == excluding {
            continue;
        }
        if other.stay.overlaps(&candidate) {
            return Err(Refusal::Conflict(other.id));
        }
    }
    Ok(candidate)
}

pub fn is_available<'a>(
    room: &Room,
    check_in: NaiveDate,
    check_out: NaiveDate,
    excluding: Option<ReservationId>,
    existing: impl IntoIterator<Item = &'a Reservation>,
    today: NaiveDate,
) -> bool {
    check_availability(room, check_in, check_out, excluding, existing, today).is_ok()
}

// ── Free calendar ─────────────────────────────────────────────────

/// Maximal bookable sub-ranges of `window` for one room. Days before `today`
/// are never free.
pub fn free_ranges(state: &RoomState, window: &DateRange, today: NaiveDate) -> Vec<DateRange> {
    if !state.room.is_available {
        return Vec::new();
    }
    let start = window.check_in().max(today);
    if start >= window.check_out() {
        return Vec::new();
    }
    let base = [DateRange::from_ordered(start, window.check_out())];

    let mut booked: Vec<DateRange> = state
        .active_overlapping(&base[0])
        .map(|r| r.stay)
        .collect();
    booked.sort_by_key(|s| s.check_in());
    let booked = merge_overlapping(&booked);

    subtract_ranges(&base, &booked)
}

/// Merge sorted overlapping or touching ranges into disjoint ranges.
pub fn merge_overlapping(sorted: &[DateRange]) -> Vec<DateRange> {
    let mut merged: Vec<DateRange> = Vec::new();
    for &range in sorted {
        if let Some(last) = merged.last_mut()
            && range.check_in() <= last.check_out()
        {
            let end = last.check_out().max(range.check_out());
            *last = DateRange::from_ordered(last.check_in(), end);
            continue;
        }
        merged.push(range);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by check-in, `to_remove` disjoint.
pub fn subtract_ranges(base: &[DateRange], to_remove: &[DateRange]) -> Vec<DateRange> {
    let mut result = Vec::new();
    let mut ri = 0;

    for b in base {
        let mut current = b.check_in();
        let end = b.check_out();

        while ri < to_remove.len() && to_remove[ri].check_out() <= current {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].check_in() < end {
            let r = &to_remove[j];
            if r.check_in() > current {
                result.push(DateRange::from_ordered(current, r.check_in()));
            }
            current = current.max(r.check_out());
            j += 1;
        }

        if current < end {
            result.push(DateRange::from_ordered(current, end));
        }
    }

    result
}
