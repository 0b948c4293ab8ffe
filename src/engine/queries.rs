use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::availability::{free_ranges, is_available};
use super::{Engine, EngineError};

/// Check-in ascending; ties by creation time, then id.
fn sort_rows(rows: &mut [ReservationInfo]) {
    rows.sort_by(|a, b| {
        a.check_in
            .cmp(&b.check_in)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

fn query_window(start: NaiveDate, end: NaiveDate) -> Result<DateRange, EngineError> {
    let window = DateRange::new(start, end)?;
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(window)
}

impl Engine {
    /// Every reservation matching `pred`, across all rooms, sorted.
    async fn collect_rows(&self, pred: impl Fn(&Reservation) -> bool) -> Vec<ReservationInfo> {
        let mut rows = Vec::new();
        for room_id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = rs.read().await;
            rows.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|&r| pred(r))
                    .map(|r| ReservationInfo::from_reservation(r, &guard.room.name)),
            );
        }
        sort_rows(&mut rows);
        rows
    }

    // ── Reservations ────────────────────────────────────────────

    pub async fn get_reservation(&self, id: ReservationId) -> Result<ReservationInfo, EngineError> {
        let room_id = self
            .store
            .room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self.room_state(&room_id)?;
        let guard = rs.read().await;
        guard
            .reservation(id)
            .map(|r| ReservationInfo::from_reservation(r, &guard.room.name))
            .ok_or(EngineError::NotFound(id))
    }

    /// PENDING and CONFIRMED reservations of one room, by check-in.
    pub async fn find_active_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let rs = self.room_state(&room_id)?;
        let guard = rs.read().await;
        let mut rows: Vec<_> = guard
            .active()
            .map(|r| ReservationInfo::from_reservation(r, &guard.room.name))
            .collect();
        sort_rows(&mut rows);
        Ok(rows)
    }

    /// All of a user's reservations, whatever their status.
    pub async fn list_for_user(&self, user_id: &str) -> Vec<ReservationInfo> {
        self.collect_rows(|r| r.user_id == user_id).await
    }

    /// A user's active reservations that have not checked out yet.
    pub async fn upcoming_for_user(&self, user_id: &str) -> Vec<ReservationInfo> {
        let today = self.today();
        self.collect_rows(|r| r.user_id == user_id && r.is_active() && r.check_out() > today)
            .await
    }

    /// Every reservation that is not CANCELLED, across all users.
    pub async fn list_all_active(&self) -> Vec<ReservationInfo> {
        self.collect_rows(|r| r.status != ReservationStatus::Cancelled)
            .await
    }

    /// Reservations whose whole stay lies inside `[start, end)`.
    pub async fn reservations_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let window = query_window(start, end)?;
        Ok(self.collect_rows(|r| window.contains(&r.stay)).await)
    }

    // ── Rooms ───────────────────────────────────────────────────

    /// All rooms, enabled or not, sorted by name.
    pub async fn list_rooms(&self) -> Vec<Room> {
        let mut rooms = Vec::with_capacity(self.store.room_count());
        for room_id in self.store.room_ids() {
            if let Some(rs) = self.store.get_room(&room_id) {
                rooms.push(rs.read().await.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        rooms
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, EngineError> {
        let rs = self.room_state(&room_id)?;
        let room = rs.read().await.room.clone();
        Ok(room)
    }

    /// Rooms that could take a new booking for `[check_in, check_out)` right now.
    pub async fn available_rooms(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<Room>, EngineError> {
        let stay = DateRange::new(check_in, check_out)?;
        let today = self.today();
        let mut rooms = Vec::new();
        for room_id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&room_id) else {
                continue;
            };
            let guard = rs.read().await;
            if is_available(
                &guard.room,
                check_in,
                check_out,
                None,
                guard.active_overlapping(&stay),
                today,
            ) {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rooms)
    }

    /// Maximal bookable sub-ranges of `[start, end)` for one room.
    pub async fn room_free_ranges(
        &self,
        room_id: RoomId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DateRange>, EngineError> {
        let window = query_window(start, end)?;
        let rs = self.room_state(&room_id)?;
        let guard = rs.read().await;
        Ok(free_ranges(&guard, &window, self.today()))
    }
}
