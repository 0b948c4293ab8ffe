use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Rooms keyed by id, each behind its own lock, plus a reservation → room index.
pub struct InMemoryStore {
    rooms: DashMap<RoomId, SharedRoomState>,
    reservation_to_room: DashMap<ReservationId, RoomId>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room(&self, id: &RoomId) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn insert_room(&self, room: Room) -> SharedRoomState {
        let id = room.id;
        let shared = Arc::new(RwLock::new(RoomState::new(room)));
        self.rooms.insert(id, shared.clone());
        shared
    }

    /// Sorted, so callers locking several rooms always lock in the same order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Reservation index ────────────────────────────────────

    pub fn room_for_reservation(&self, id: &ReservationId) -> Option<RoomId> {
        self.reservation_to_room.get(id).map(|e| *e.value())
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_to_room.len()
    }

    // ── Event application ────────────────────────────────────

    /// Apply `event` to one locked room. Events spanning two rooms
    /// (a move) are applied once per room; each call only touches
    /// the half belonging to `rs`.
    pub fn apply_event(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomAvailabilitySet {
                room_id,
                is_available,
            } if *room_id == rs.room.id => {
                rs.room.is_available = *is_available;
            }
            Event::ReservationCreated { reservation } if reservation.room_id == rs.room.id => {
                rs.remove_reservation(reservation.id);
                rs.insert_reservation(reservation.clone());
                self.reservation_to_room
                    .insert(reservation.id, reservation.room_id);
            }
            Event::ReservationUpdated {
                previous_room_id,
                reservation,
            } => {
                if *previous_room_id == rs.room.id {
                    rs.remove_reservation(reservation.id);
                }
                if reservation.room_id == rs.room.id {
                    rs.remove_reservation(reservation.id);
                    rs.insert_reservation(reservation.clone());
                    self.reservation_to_room
                        .insert(reservation.id, reservation.room_id);
                }
            }
            Event::ReservationStatusChanged {
                id,
                room_id,
                status,
                at,
            } if *room_id == rs.room.id => {
                if let Some(r) = rs.reservation_mut(*id) {
                    r.status = *status;
                    r.updated_at = *at;
                }
            }
            // RoomCreated is handled at the map level, not here
            _ => {}
        }
    }
}
