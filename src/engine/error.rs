use ulid::Ulid;

use crate::dates::InvalidRange;
use crate::model::{ReservationId, ReservationStatus, RoomId};

#[derive(Debug)]
pub enum EngineError {
    Validation(String),
    LimitExceeded(&'static str),
    /// Overlap with `conflict`, or the room is switched off when `conflict` is `None`.
    RoomUnavailable {
        room_id: RoomId,
        conflict: Option<ReservationId>,
    },
    NotFound(Ulid),
    AlreadyExists(String),
    Unauthorized {
        reservation_id: ReservationId,
    },
    InvalidState {
        reservation_id: ReservationId,
        status: ReservationStatus,
        reason: &'static str,
    },
    /// Transient infrastructure failure: WAL writer gone or a write timed out.
    Unavailable(String),
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    RoomUnavailable,
    NotFound,
    Authorization,
    InvalidState,
    Unavailable,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::RoomUnavailable => "room_unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authorization => "authorization",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_)
            | EngineError::LimitExceeded(_)
            | EngineError::AlreadyExists(_) => ErrorKind::Validation,
            EngineError::RoomUnavailable { .. } => ErrorKind::RoomUnavailable,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Unauthorized { .. } => ErrorKind::Authorization,
            EngineError::InvalidState { .. } => ErrorKind::InvalidState,
            EngineError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Only infrastructure failures are worth retrying; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RoomUnavailable | ErrorKind::InvalidState => 409,
            ErrorKind::Unavailable => 503,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::RoomUnavailable {
                room_id,
                conflict: Some(other),
            } => write!(f, "room {room_id} is already booked (conflicts with {other})"),
            EngineError::RoomUnavailable {
                room_id,
                conflict: None,
            } => write!(f, "room {room_id} is not available for booking"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(name) => write!(f, "already exists: {name}"),
            EngineError::Unauthorized { reservation_id } => {
                write!(f, "reservation {reservation_id} belongs to another user")
            }
            EngineError::InvalidState {
                reservation_id,
                status,
                reason,
            } => write!(f, "reservation {reservation_id} is {status}: {reason}"),
            EngineError::Unavailable(e) => write!(f, "temporarily unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<InvalidRange> for EngineError {
    fn from(e: InvalidRange) -> Self {
        EngineError::Validation(e.to_string())
    }
}
