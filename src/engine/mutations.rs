use std::future::Future;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::check_availability;
use super::validate::*;
use super::{Engine, EngineError};

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub description: Option<String>,
    pub max_occupancy: u32,
    pub is_available: bool,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
    pub notes: Option<String>,
}

/// Fields left as `None` keep their current value. `notes: Some("")` clears the notes.
#[derive(Debug, Clone, Default)]
pub struct ReservationChanges {
    pub room_id: Option<RoomId>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub notes: Option<String>,
}

async fn timed<T>(
    op: &'static str,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    let started = Instant::now();
    let result = fut.await;
    observability::record_operation(op, started, &result);
    if let Err(e) = &result {
        debug!("{op} rejected: {e}");
    }
    result
}

impl Engine {
    // ── Rooms (operator) ────────────────────────────────────────

    pub async fn create_room(&self, new: NewRoom) -> Result<Room, EngineError> {
        timed("create_room", self.create_room_inner(new)).await
    }

    async fn create_room_inner(&self, new: NewRoom) -> Result<Room, EngineError> {
        validate_room_fields(&new.name, new.description.as_deref(), new.max_occupancy)?;
        let name = new.name.trim().to_string();
        let description = new
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let catalog = self.lock_catalog().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        let folded = name.to_lowercase();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            if rs.read().await.room.name.to_lowercase() == folded {
                return Err(EngineError::AlreadyExists(name));
            }
        }

        let room = Room {
            id: Ulid::new(),
            name,
            description,
            max_occupancy: new.max_occupancy,
            is_available: new.is_available,
        };
        self.commit_room(catalog, room.clone()).await?;
        info!("room {} created: {}", room.id, room.name);
        Ok(room)
    }

    pub async fn set_room_available(
        &self,
        room_id: RoomId,
        is_available: bool,
    ) -> Result<Room, EngineError> {
        timed(
            "set_room_available",
            self.set_room_available_inner(room_id, is_available),
        )
        .await
    }

    async fn set_room_available_inner(
        &self,
        room_id: RoomId,
        is_available: bool,
    ) -> Result<Room, EngineError> {
        let guard = self.lock_room(room_id).await?;
        let mut room = guard.room.clone();
        if room.is_available == is_available {
            return Ok(room);
        }
        room.is_available = is_available;
        let event = Event::RoomAvailabilitySet {
            room_id,
            is_available,
        };
        self.commit(vec![guard], event).await?;
        info!("room {room_id} availability set to {is_available}");
        Ok(room)
    }

    // ── Reservation lifecycle ───────────────────────────────────

    /// Book `req.room_id` for `user_id`.
    ///
    /// `Unavailable` is the only retryable error, but it does not mean nothing
    /// was written: a commit that outlives `write_timeout` still completes in
    /// the background. Re-read with `list_for_user` before retrying, or the
    /// retry may be refused with `RoomUnavailable` by the caller's own booking.
    pub async fn create_reservation(
        &self,
        user_id: &str,
        req: NewReservation,
    ) -> Result<Reservation, EngineError> {
        timed("create_reservation", self.create_reservation_inner(user_id, req)).await
    }

    async fn create_reservation_inner(
        &self,
        user_id: &str,
        req: NewReservation,
    ) -> Result<Reservation, EngineError> {
        validate_user_id(user_id)?;
        let now = self.now();
        let stay = DateRange::new(req.check_in, req.check_out)?;
        validate_stay(&stay, now)?;
        let notes = sanitize_notes(req.notes)?;

        let guard = self.lock_room(req.room_id).await?;
        validate_guests(req.guests, &guard.room)?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }
        check_availability(
            &guard.room,
            stay.check_in(),
            stay.check_out(),
            None,
            guard.active_overlapping(&stay),
            now.date_naive(),
        )
        .map_err(|r| refusal_to_error(r, req.room_id))?;

        let reservation = Reservation {
            id: Ulid::new(),
            room_id: req.room_id,
            user_id: user_id.to_string(),
            stay,
            guests: req.guests,
            notes,
            status: self.default_status,
            created_at: now,
            updated_at: now,
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
        };
        self.commit(vec![guard], event).await?;
        info!(
            "reservation {} created: room {} {} for {user_id}",
            reservation.id, reservation.room_id, reservation.stay
        );
        Ok(reservation)
    }

    pub async fn edit_reservation(
        &self,
        id: ReservationId,
        user_id: &str,
        changes: ReservationChanges,
    ) -> Result<Reservation, EngineError> {
        timed("edit_reservation", self.edit_reservation_inner(id, user_id, changes)).await
    }

    async fn edit_reservation_inner(
        &self,
        id: ReservationId,
        user_id: &str,
        changes: ReservationChanges,
    ) -> Result<Reservation, EngineError> {
        validate_user_id(user_id)?;
        let now = self.now();
        let (source, target) = self.lock_reservation(id, changes.room_id).await?;
        let current = source
            .reservation(id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        ensure_owner(&current, user_id)?;
        ensure_mutable(&current, now)?;

        let stay = DateRange::new(
            changes.check_in.unwrap_or(current.check_in()),
            changes.check_out.unwrap_or(current.check_out()),
        )?;
        validate_stay(&stay, now)?;
        let notes = match changes.notes {
            Some(n) => sanitize_notes(Some(n))?,
            None => current.notes.clone(),
        };
        let guests = changes.guests.unwrap_or(current.guests);

        let dest: &RoomState = target.as_deref().unwrap_or(&*source);
        validate_guests(guests, &dest.room)?;
        check_availability(
            &dest.room,
            stay.check_in(),
            stay.check_out(),
            Some(id),
            dest.active_overlapping(&stay),
            now.date_naive(),
        )
        .map_err(|r| refusal_to_error(r, dest.room.id))?;

        let previous_room_id = current.room_id;
        let updated = Reservation {
            room_id: dest.room.id,
            stay,
            guests,
            notes,
            updated_at: now,
            ..current
        };
        let guards = match target {
            Some(t) => vec![source, t],
            None => vec![source],
        };
        let event = Event::ReservationUpdated {
            previous_room_id,
            reservation: updated.clone(),
        };
        self.commit(guards, event).await?;
        info!(
            "reservation {id} updated: room {} {} guests {}",
            updated.room_id, updated.stay, updated.guests
        );
        Ok(updated)
    }

    /// Cancelling twice is an error, never a silent success.
    pub async fn cancel_reservation(
        &self,
        id: ReservationId,
        user_id: &str,
    ) -> Result<Reservation, EngineError> {
        timed("cancel_reservation", self.cancel_reservation_inner(id, user_id)).await
    }

    async fn cancel_reservation_inner(
        &self,
        id: ReservationId,
        user_id: &str,
    ) -> Result<Reservation, EngineError> {
        validate_user_id(user_id)?;
        let now = self.now();
        let (guard, _) = self.lock_reservation(id, None).await?;
        let current = guard
            .reservation(id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        ensure_owner(&current, user_id)?;
        ensure_mutable(&current, now)?;

        let updated = self
            .transition(guard, current, ReservationStatus::Cancelled)
            .await?;
        info!("reservation {id} cancelled by {user_id}");
        Ok(updated)
    }

    // ── Reservation status (operator / sweep) ───────────────────

    /// Operator adjustment between PENDING and CONFIRMED. Setting the current
    /// status again is a no-op.
    pub async fn set_reservation_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        timed("set_reservation_status", self.set_reservation_status_inner(id, status)).await
    }

    async fn set_reservation_status_inner(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        let (guard, _) = self.lock_reservation(id, None).await?;
        let current = guard
            .reservation(id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        if !current.status.is_active() || !status.is_active() {
            return Err(EngineError::InvalidState {
                reservation_id: id,
                status: current.status,
                reason: "only PENDING and CONFIRMED can be exchanged",
            });
        }
        if current.status == status {
            return Ok(current);
        }
        let updated = self.transition(guard, current, status).await?;
        info!("reservation {id} is now {status}");
        Ok(updated)
    }

    /// Close an active reservation whose check-out date has been reached.
    pub async fn complete_reservation(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        timed("complete_reservation", self.complete_reservation_inner(id)).await
    }

    async fn complete_reservation_inner(
        &self,
        id: ReservationId,
    ) -> Result<Reservation, EngineError> {
        let today = self.today();
        let (guard, _) = self.lock_reservation(id, None).await?;
        let current = guard
            .reservation(id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        if current.status.is_terminal() {
            return Err(EngineError::InvalidState {
                reservation_id: id,
                status: current.status,
                reason: "reservation is closed",
            });
        }
        if current.check_out() > today {
            return Err(EngineError::InvalidState {
                reservation_id: id,
                status: current.status,
                reason: "stay has not ended",
            });
        }
        self.transition(guard, current, ReservationStatus::Completed)
            .await
    }

    /// Active reservations whose check-out is on or before `today`.
    pub async fn collect_completable(&self, today: NaiveDate) -> Vec<ReservationId> {
        let mut due = Vec::new();
        for room_id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = rs.read().await;
            due.extend(
                guard
                    .active()
                    .filter(|r| r.check_out() <= today)
                    .map(|r| r.id),
            );
        }
        due
    }

    async fn transition(
        &self,
        guard: super::RoomGuard,
        current: Reservation,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        let at = self.now();
        let event = Event::ReservationStatusChanged {
            id: current.id,
            room_id: current.room_id,
            status,
            at,
        };
        self.commit(vec![guard], event).await?;
        Ok(Reservation {
            status,
            updated_at: at,
            ..current
        })
    }

    // ── Log maintenance ─────────────────────────────────────────

    /// Rewrite the log as a snapshot of the current state. Room creation is
    /// held off and every room is read-locked until the swap is done.
    pub async fn compact_wal(&self) -> Result<usize, EngineError> {
        let _catalog = self.lock_catalog().await;
        let mut guards = Vec::new();
        for room_id in self.store.room_ids() {
            if let Some(rs) = self.store.get_room(&room_id) {
                guards.push(rs.read_owned().await);
            }
        }

        let mut snapshot = Vec::new();
        for guard in &guards {
            snapshot.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            snapshot.extend(guard.reservations.iter().map(|r| Event::ReservationCreated {
                reservation: r.clone(),
            }));
        }
        let count = snapshot.len();

        self.wal
            .compact(snapshot)
            .await
            .map_err(|e| EngineError::Unavailable(format!("compaction failed: {e}")))?;
        drop(guards);
        Ok(count)
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.wal.appends_since_compact().await
    }
}
