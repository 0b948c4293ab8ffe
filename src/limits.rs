//! Hard limits enforced by the engine.

pub const MAX_ROOMS: usize = 256;
pub const MAX_RESERVATIONS_PER_ROOM: usize = 100_000;

/// Absolute guest cap per reservation, independent of room occupancy.
pub const MAX_GUESTS: u32 = 20;
pub const MAX_OCCUPANCY: u32 = 50;

pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_ROOM_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_USER_ID_LEN: usize = 256;

pub const MAX_STAY_NIGHTS: i64 = 365;
/// Widest window accepted by calendar queries (about ten years).
pub const MAX_QUERY_WINDOW_DAYS: i64 = 3660;

/// How many times a lifecycle call re-resolves a reservation that moved
/// rooms between lookup and lock acquisition.
pub const MAX_RELOCK_ATTEMPTS: usize = 8;
