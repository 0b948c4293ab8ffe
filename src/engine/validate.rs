use chrono::{DateTime, Utc};

use crate::dates;
use crate::limits::*;
use crate::model::*;

use super::EngineError;
use super::availability::Refusal;

pub(crate) fn validate_user_id(user_id: &str) -> Result<(), EngineError> {
    if user_id.trim().is_empty() {
        return Err(EngineError::Validation("user id is required".into()));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(EngineError::LimitExceeded("user id too long"));
    }
    Ok(())
}

/// Trim, drop empty notes, cap the length, reject control characters
/// other than line breaks and tabs.
pub(crate) fn sanitize_notes(notes: Option<String>) -> Result<Option<String>, EngineError> {
    let Some(raw) = notes else { return Ok(None) };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTES_LEN {
        return Err(EngineError::Validation(format!(
            "notes cannot exceed {MAX_NOTES_LEN} characters"
        )));
    }
    if trimmed
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(EngineError::Validation(
            "notes contain control characters".into(),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

pub(crate) fn validate_guests(guests: u32, room: &Room) -> Result<(), EngineError> {
    if guests == 0 {
        return Err(EngineError::Validation("at least one guest is required".into()));
    }
    if guests > MAX_GUESTS {
        return Err(EngineError::Validation(format!(
            "number of guests cannot exceed {MAX_GUESTS}"
        )));
    }
    if guests > room.max_occupancy {
        return Err(EngineError::Validation(format!(
            "{} sleeps at most {} guests, requested {guests}",
            room.name, room.max_occupancy
        )));
    }
    Ok(())
}

/// Structural checks on a stay that do not depend on other bookings.
pub(crate) fn validate_stay(stay: &DateRange, now: DateTime<Utc>) -> Result<(), EngineError> {
    if dates::is_past_date(stay.check_in(), now) {
        return Err(EngineError::Validation(format!(
            "check-in date {} is in the past",
            stay.check_in()
        )));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub(crate) fn validate_room_fields(
    name: &str,
    description: Option<&str>,
    max_occupancy: u32,
) -> Result<(), EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::Validation("room name is required".into()));
    }
    if name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(EngineError::Validation(format!(
            "room name cannot exceed {MAX_ROOM_NAME_LEN} characters"
        )));
    }
    if let Some(d) = description
        && d.chars().count() > MAX_DESCRIPTION_LEN
    {
        return Err(EngineError::Validation(format!(
            "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if max_occupancy == 0 || max_occupancy > MAX_OCCUPANCY {
        return Err(EngineError::Validation(format!(
            "max occupancy must be between 1 and {MAX_OCCUPANCY}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_owner(reservation: &Reservation, user_id: &str) -> Result<(), EngineError> {
    if reservation.user_id != user_id {
        return Err(EngineError::Unauthorized {
            reservation_id: reservation.id,
        });
    }
    Ok(())
}

/// Guests may only touch active reservations whose check-in is still ahead.
/// On the check-in day itself the stay is frozen.
pub(crate) fn ensure_mutable(
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    if reservation.status.is_terminal() {
        return Err(EngineError::InvalidState {
            reservation_id: reservation.id,
            status: reservation.status,
            reason: "reservation is closed",
        });
    }
    if reservation.check_in() <= now.date_naive() {
        return Err(EngineError::InvalidState {
            reservation_id: reservation.id,
            status: reservation.status,
            reason: "check-in date has been reached",
        });
    }
    Ok(())
}

pub(crate) fn refusal_to_error(refusal: Refusal, room_id: RoomId) -> EngineError {
    match refusal {
        Refusal::RoomDisabled => EngineError::RoomUnavailable {
            room_id,
            conflict: None,
        },
        Refusal::Conflict(other) => EngineError::RoomUnavailable {
            room_id,
            conflict: Some(other),
        },
        Refusal::InvalidRange(e) => e.into(),
        Refusal::PastCheckIn => EngineError::Validation("check-in date is in the past".into()),
    }
}
