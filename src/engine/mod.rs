mod availability;
mod error;
mod mutations;
mod queries;
mod store;
mod validate;

pub use availability::{
    Refusal, check_availability, free_ranges, is_available, merge_overlapping, subtract_ranges,
};
pub use error::{EngineError, ErrorKind};
pub use mutations::{NewReservation, NewRoom, ReservationChanges};
pub use store::{InMemoryStore, SharedRoomState};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockWriteGuard};
use tracing::{info, warn};

use crate::dates::Clock;
use crate::limits::MAX_RELOCK_ATTEMPTS;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::{Wal, WalWriter};

pub type RoomGuard = OwnedRwLockWriteGuard<RoomState>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub wal_path: PathBuf,
    /// Status given to new reservations: PENDING or CONFIRMED.
    pub default_status: ReservationStatus,
    /// Upper bound on a single durable write.
    pub write_timeout: Duration,
}

impl EngineConfig {
    pub fn new(wal_path: PathBuf) -> Self {
        Self {
            wal_path,
            default_status: ReservationStatus::Pending,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Reservation lifecycle manager: owns every room's state and serializes
/// read-modify-write per room.
pub struct Engine {
    store: Arc<InMemoryStore>,
    wal: WalWriter,
    notify: Arc<NotifyHub>,
    clock: Arc<dyn Clock>,
    /// Room creation and compaction both need a stable room set.
    catalog: Arc<Mutex<()>>,
    default_status: ReservationStatus,
    write_timeout: Duration,
}

impl Engine {
    /// Replay the log at `config.wal_path` and start the writer task.
    /// Must be called inside a Tokio runtime.
    pub fn open(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        if !config.default_status.is_active() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "default status must be PENDING or CONFIRMED, got {}",
                    config.default_status
                ),
            ));
        }

        let events = Wal::replay(&config.wal_path)?;
        let store = Arc::new(InMemoryStore::new());
        let replayed = events.len();
        for event in &events {
            replay_event(&store, event)?;
        }

        let wal = WalWriter::spawn(Wal::open(&config.wal_path)?);
        info!(
            "opened {}: {replayed} events, {} rooms, {} reservations",
            config.wal_path.display(),
            store.room_count(),
            store.reservation_count()
        );
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(store.room_count() as f64);

        Ok(Self {
            store,
            wal,
            notify,
            clock,
            catalog: Arc::new(Mutex::new(())),
            default_status: config.default_status,
            write_timeout: config.write_timeout,
        })
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    pub fn default_status(&self) -> ReservationStatus {
        self.default_status
    }

    pub fn room_count(&self) -> usize {
        self.store.room_count()
    }

    pub(super) fn room_state(&self, id: &RoomId) -> Result<SharedRoomState, EngineError> {
        self.store.get_room(id).ok_or(EngineError::NotFound(*id))
    }

    async fn lock_room(&self, room_id: RoomId) -> Result<RoomGuard, EngineError> {
        Ok(self.room_state(&room_id)?.write_owned().await)
    }

    /// Lock the room holding reservation `id`, plus `target` when it names a
    /// different room. Both locks are taken in ascending room-id order. If the
    /// reservation moved while we waited, the lookup is retried.
    pub(super) async fn lock_reservation(
        &self,
        id: ReservationId,
        target: Option<RoomId>,
    ) -> Result<(RoomGuard, Option<RoomGuard>), EngineError> {
        for _ in 0..MAX_RELOCK_ATTEMPTS {
            let source = self
                .store
                .room_for_reservation(&id)
                .ok_or(EngineError::NotFound(id))?;

            let (holder, other) = match target {
                Some(target) if target != source => {
                    if self.store.get_room(&target).is_none() {
                        return Err(EngineError::NotFound(target));
                    }
                    if source < target {
                        let s = self.lock_room(source).await?;
                        let t = self.lock_room(target).await?;
                        (s, Some(t))
                    } else {
                        let t = self.lock_room(target).await?;
                        let s = self.lock_room(source).await?;
                        (s, Some(t))
                    }
                }
                _ => (self.lock_room(source).await?, None),
            };

            if holder.reservation(id).is_some() {
                return Ok((holder, other));
            }
        }
        warn!("reservation {id} kept moving while being locked");
        Err(EngineError::Unavailable(format!(
            "reservation {id} is being modified concurrently"
        )))
    }

    /// Durably append `event`, then apply it to the locked rooms and publish it.
    ///
    /// The work runs in its own task that owns the guards, so a caller that
    /// gives up (timeout or cancellation) never leaves a half-applied change:
    /// the task still finishes and memory stays in step with the log.
    pub(super) async fn commit(
        &self,
        mut guards: Vec<RoomGuard>,
        event: Event,
    ) -> Result<(), EngineError> {
        let wal = self.wal.clone();
        let store = self.store.clone();
        let notify = self.notify.clone();
        let task = tokio::spawn(async move {
            wal.append(event.clone())
                .await
                .map_err(|e| EngineError::Unavailable(format!("WAL append failed: {e}")))?;
            for guard in guards.iter_mut() {
                store.apply_event(guard, &event);
            }
            drop(guards);
            notify.publish(&event);
            Ok::<(), EngineError>(())
        });
        self.await_commit(task).await
    }

    pub(super) async fn lock_catalog(&self) -> OwnedMutexGuard<()> {
        self.catalog.clone().lock_owned().await
    }

    /// Commit a `RoomCreated` event. The catalog guard travels with the write.
    pub(super) async fn commit_room(
        &self,
        catalog: OwnedMutexGuard<()>,
        room: Room,
    ) -> Result<(), EngineError> {
        let wal = self.wal.clone();
        let store = self.store.clone();
        let notify = self.notify.clone();
        let task = tokio::spawn(async move {
            let event = Event::RoomCreated { room: room.clone() };
            wal.append(event.clone())
                .await
                .map_err(|e| EngineError::Unavailable(format!("WAL append failed: {e}")))?;
            store.insert_room(room);
            drop(catalog);
            metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(store.room_count() as f64);
            notify.publish(&event);
            Ok::<(), EngineError>(())
        });
        self.await_commit(task).await
    }

    async fn await_commit(
        &self,
        task: tokio::task::JoinHandle<Result<(), EngineError>>,
    ) -> Result<(), EngineError> {
        match tokio::time::timeout(self.write_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(EngineError::Unavailable(format!("commit task failed: {e}"))),
            Err(_) => {
                warn!("write did not finish within {:?}", self.write_timeout);
                Err(EngineError::Unavailable("write timed out".into()))
            }
        }
    }
}

/// Rebuild in-memory state from one logged event. Nothing else holds the
/// locks during startup, so `try_write` always succeeds.
fn replay_event(store: &InMemoryStore, event: &Event) -> io::Result<()> {
    if let Event::RoomCreated { room } = event {
        store.insert_room(room.clone());
        return Ok(());
    }
    for room_id in event.room_ids() {
        let Some(rs) = store.get_room(&room_id) else {
            warn!("replay: event for unknown room {room_id} skipped");
            continue;
        };
        let mut guard = rs
            .try_write()
            .map_err(|_| io::Error::other("replay: room state unexpectedly locked"))?;
        store.apply_event(&mut guard, event);
    }
    Ok(())
}
