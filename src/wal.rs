use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::model::Event;
use crate::observability;

/// First bytes of every log file: 6-byte tag plus a 2-byte format version.
const MAGIC: &[u8; 8] = b"CTGWAL\x00\x01";

/// Upper bound for a single frame payload; anything larger is treated as corruption.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const WRITER_QUEUE: usize = 4096;

/// Write one frame: `[u32 len][u32 crc32][bincode payload]`, little endian.
fn write_frame(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    writer.write_all(&payload)
}

/// Read one frame. `Ok(None)` means a clean end, a torn tail or a bad checksum:
/// everything from that point on is discarded.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut header = [0u8; 8];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let stored_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    if crc32fast::hash(&payload) != stored_crc {
        return Ok(None);
    }
    Ok(bincode::deserialize::<Event>(&payload).ok())
}

fn open_for_append(path: &Path) -> io::Result<BufWriter<File>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        file.write_all(MAGIC)?;
        file.sync_all()?;
    }
    Ok(BufWriter::new(file))
}

/// Append-only event log backing the in-memory store.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            writer: open_for_append(path)?,
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer an event; nothing is durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        write_frame(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the log with `snapshot`: write a sibling temp file, fsync,
    /// rename over the log, reopen for appends.
    pub fn compact(&mut self, snapshot: &[Event]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            tmp.write_all(MAGIC)?;
            for event in snapshot {
                write_frame(&mut tmp, event)?;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.writer = open_for_append(&self.path)?;
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Every intact event on disk, in append order. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        match reader.read_exact(&mut magic) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        if &magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a reservation log", path.display()),
            ));
        }

        let mut events = Vec::new();
        while let Some(event) = read_frame(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}

// ── Group-commit writer ──────────────────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        done: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        snapshot: Vec<Event>,
        done: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        reply: oneshot::Sender<u64>,
    },
}

/// Cloneable handle to the task that owns the `Wal`.
#[derive(Clone)]
pub struct WalWriter {
    tx: mpsc::Sender<WalCommand>,
}

impl WalWriter {
    /// Move `wal` into a background task. Must be called inside a Tokio runtime.
    pub fn spawn(wal: Wal) -> Self {
        let (tx, rx) = mpsc::channel(WRITER_QUEUE);
        tokio::spawn(writer_loop(wal, rx));
        Self { tx }
    }

    /// Resolves once the event is fsynced.
    pub async fn append(&self, event: Event) -> io::Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(WalCommand::Append { event, done })
            .await
            .map_err(|_| io::Error::other("WAL writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("WAL writer dropped response"))?
    }

    pub async fn compact(&self, snapshot: Vec<Event>) -> io::Result<()> {
        let (done, rx) = oneshot::channel();
        self.tx
            .send(WalCommand::Compact { snapshot, done })
            .await
            .map_err(|_| io::Error::other("WAL writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("WAL writer dropped response"))?
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(WalCommand::AppendsSinceCompact { reply })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

type Pending = Vec<oneshot::Sender<io::Result<()>>>;

/// Wait for one command; if it is an append, drain every append already
/// queued behind it and cover the whole batch with a single fsync.
async fn writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let mut waiting: Pending = Vec::new();
        let mut deferred = None;
        let mut result = Ok(());

        match cmd {
            WalCommand::Append { event, done } => {
                result = wal.append_buffered(&event);
                waiting.push(done);
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WalCommand::Append { event, done } => {
                            if result.is_ok() {
                                result = wal.append_buffered(&event);
                            }
                            waiting.push(done);
                        }
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
            }
            other => deferred = Some(other),
        }

        if !waiting.is_empty() {
            flush_batch(&mut wal, waiting, result);
        }
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut Wal, waiting: Pending, append_result: io::Result<()>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(waiting.len() as f64);
    let started = Instant::now();
    // Flush even after a failed append so half-written bytes do not ride
    // along with the next batch.
    let flush_result = wal.flush_sync();
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    let outcome = append_result.and(flush_result);
    if let Err(e) = &outcome {
        tracing::warn!("WAL flush failed for {} events: {e}", waiting.len());
    }
    for done in waiting {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = done.send(reply);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { snapshot, done } => {
            let result = wal.compact(&snapshot);
            match &result {
                Ok(()) => tracing::info!(
                    "compacted {} to {} events",
                    wal.path().display(),
                    snapshot.len()
                ),
                Err(e) => tracing::warn!("compaction of {} failed: {e}", wal.path().display()),
            }
            let _ = done.send(result);
        }
        WalCommand::AppendsSinceCompact { reply } => {
            let _ = reply.send(wal.appends_since_compact());
        }
        WalCommand::Append { done, .. } => {
            let _ = done.send(Err(io::Error::other("append routed to control path")));
        }
    }
}
