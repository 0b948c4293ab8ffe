use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::dates::{self, InvalidRange};

pub type RoomId = Ulid;
pub type ReservationId = Ulid;
/// Opaque identity supplied by the caller's identity provider.
pub type UserId = String;

/// Half-open stay `[check_in, check_out)`. Always at least one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, InvalidRange> {
        dates::night_count(check_in, check_out)?;
        Ok(Self { check_in, check_out })
    }

    /// Caller guarantees `check_in < check_out`.
    pub(crate) fn from_ordered(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "DateRange check_in must be before check_out");
        Self { check_in, check_out }
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    pub fn nights(&self) -> i64 {
        self.check_out.signed_duration_since(self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        dates::ranges_overlap(self.check_in, self.check_out, other.check_in, other.check_out)
    }

    /// True if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &DateRange) -> bool {
        self.check_in <= other.check_in && other.check_out <= self.check_out
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    /// Active reservations block their dates.
    pub fn is_active(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(ReservationStatus::Pending),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "COMPLETED" => Ok(ReservationStatus::Completed),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub max_occupancy: u32,
    /// Operator switch, independent of bookings.
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub stay: DateRange,
    pub guests: u32,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn check_in(&self) -> NaiveDate {
        self.stay.check_in()
    }

    pub fn check_out(&self) -> NaiveDate {
        self.stay.check_out()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// A room plus every reservation ever made for it, sorted by check-in.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            reservations: Vec::new(),
        }
    }

    /// Insert keeping check-in order; equal check-ins keep insertion order.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.check_in() <= reservation.check_in());
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn reservation_mut(&mut self, id: ReservationId) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| r.is_active())
    }

    /// Active reservations overlapping `query`. Anything at or past the
    /// partition point checks in on or after `query.check_out` and cannot overlap.
    pub fn active_overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.check_in() < query.check_out());
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.is_active() && r.check_out() > query.check_in())
    }
}

/// Flat event records. This is also the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomAvailabilitySet {
        room_id: RoomId,
        is_available: bool,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    /// Full snapshot after an edit. `previous_room_id` differs from
    /// `reservation.room_id` when the stay moved rooms.
    ReservationUpdated {
        previous_room_id: RoomId,
        reservation: Reservation,
    },
    ReservationStatusChanged {
        id: ReservationId,
        room_id: RoomId,
        status: ReservationStatus,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Rooms whose state this event changes.
    pub fn room_ids(&self) -> Vec<RoomId> {
        match self {
            Event::RoomCreated { room } => vec![room.id],
            Event::RoomAvailabilitySet { room_id, .. } => vec![*room_id],
            Event::ReservationCreated { reservation } => vec![reservation.room_id],
            Event::ReservationUpdated {
                previous_room_id,
                reservation,
            } => {
                if *previous_room_id == reservation.room_id {
                    vec![reservation.room_id]
                } else {
                    vec![*previous_room_id, reservation.room_id]
                }
            }
            Event::ReservationStatusChanged { room_id, .. } => vec![*room_id],
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationInfo {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub user_id: UserId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub guests: u32,
    pub notes: Option<String>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationInfo {
    pub fn from_reservation(reservation: &Reservation, room_name: &str) -> Self {
        Self {
            id: reservation.id,
            room_id: reservation.room_id,
            room_name: room_name.to_string(),
            user_id: reservation.user_id.clone(),
            check_in: reservation.check_in(),
            check_out: reservation.check_out(),
            nights: reservation.stay.nights(),
            guests: reservation.guests,
            notes: reservation.notes.clone(),
            status: reservation.status,
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}
