use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use engine::{read_envelope, write_envelope, StorageError};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_SLOT: &str = "quicksave";

/// How long drop waits for in-flight requests before detaching the thread.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid save slot name '{0}'")]
    InvalidSlot(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("spawn persistence worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("persistence worker is not running")]
    WorkerGone,
}

/// Blocking snapshot storage. Called only from the persistence worker thread.
pub trait SnapshotStore: Send {
    fn save(&self, slot: &str, payload: String) -> Result<(), PersistenceError>;

    /// `Ok(None)` means nothing has been saved in `slot`.
    fn load(&self, slot: &str) -> Result<Option<String>, PersistenceError>;
}

/// Checksummed envelopes at `<saves_dir>/<slot>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    saves_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(saves_dir: PathBuf) -> Self {
        Self { saves_dir }
    }

    pub fn slot_path(&self, slot: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !slot.is_empty()
            && slot
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !valid {
            return Err(PersistenceError::InvalidSlot(slot.to_string()));
        }
        Ok(self.saves_dir.join(format!("{slot}.json")))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, slot: &str, payload: String) -> Result<(), PersistenceError> {
        let path = self.slot_path(slot)?;
        write_envelope(&path, payload)?;
        Ok(())
    }

    fn load(&self, slot: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.slot_path(slot)?;
        Ok(read_envelope(&path)?)
    }
}

/// What a finished (or abandoned) request turned into.
#[derive(Debug)]
pub enum PersistenceOutcome {
    Saved { slot: String },
    SaveFailed { slot: String, error: PersistenceError },
    Loaded { slot: String, payload: String },
    NothingSaved { slot: String },
    LoadFailed { slot: String, error: PersistenceError },
    SaveTimedOut { slot: String },
    LoadTimedOut { slot: String },
}

/// How many polled ticks a request may stay unanswered before it is
/// reported as timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub save_ticks: u64,
    pub load_ticks: u64,
}

impl RequestTimeouts {
    pub const NEVER: Self = Self {
        save_ticks: u64::MAX,
        load_ticks: u64::MAX,
    };

    pub fn both(ticks: u64) -> Self {
        Self {
            save_ticks: ticks,
            load_ticks: ticks,
        }
    }
}

enum Request {
    Save { id: u64, slot: String, payload: String },
    Load { id: u64, slot: String },
    Shutdown,
}

enum Reply {
    Saved {
        id: u64,
        slot: String,
        result: Result<(), PersistenceError>,
    },
    Loaded {
        id: u64,
        slot: String,
        result: Result<Option<String>, PersistenceError>,
    },
}

#[derive(Debug, Clone)]
struct Pending {
    id: u64,
    slot: String,
    requested_at: u64,
}

impl Pending {
    fn waited(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.requested_at)
    }
}

/// Runs store calls on a background thread. The host polls it once per tick;
/// nothing here blocks the caller, including drop: a worker stuck inside the
/// store is detached rather than joined.
pub struct PersistenceWorker {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
    next_request_id: u64,
    pending_saves: VecDeque<Pending>,
    pending_load: Option<Pending>,
    /// Requests sent whose reply has not been received, abandoned ones included.
    in_flight: u64,
    stale_replies: u64,
}

impl PersistenceWorker {
    pub fn spawn(store: Box<dyn SnapshotStore>) -> Result<Self, PersistenceError> {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("persistence".to_string())
            .spawn(move || worker_loop(store, request_rx, reply_tx))
            .map_err(PersistenceError::Spawn)?;

        Ok(Self {
            requests: request_tx,
            replies: reply_rx,
            handle: Some(handle),
            next_request_id: 0,
            pending_saves: VecDeque::new(),
            pending_load: None,
            in_flight: 0,
            stale_replies: 0,
        })
    }

    /// Queues a save; the result shows up in a later [`poll`](Self::poll).
    pub fn request_save(
        &mut self,
        slot: &str,
        payload: String,
        tick: u64,
    ) -> Result<(), PersistenceError> {
        let id = self.next_id();
        self.send(Request::Save {
            id,
            slot: slot.to_string(),
            payload,
        })?;
        self.pending_saves.push_back(Pending {
            id,
            slot: slot.to_string(),
            requested_at: tick,
        });
        Ok(())
    }

    /// Starts a load. A newer request supersedes an unanswered one.
    pub fn request_load(&mut self, slot: &str, tick: u64) -> Result<(), PersistenceError> {
        let id = self.next_id();
        self.send(Request::Load {
            id,
            slot: slot.to_string(),
        })?;
        if let Some(previous) = self.pending_load.take() {
            debug!(slot = %previous.slot, "load_superseded");
        }
        self.pending_load = Some(Pending {
            id,
            slot: slot.to_string(),
            requested_at: tick,
        });
        Ok(())
    }

    pub fn load_pending(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn saves_pending(&self) -> usize {
        self.pending_saves.len()
    }

    /// Replies that arrived after their request was superseded or timed out.
    pub fn stale_replies(&self) -> u64 {
        self.stale_replies
    }

    /// Collects finished requests and expires any that have waited their
    /// timeout or more.
    pub fn poll(&mut self, tick: u64, timeouts: RequestTimeouts) -> Vec<PersistenceOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.replies.try_recv() {
                Ok(reply) => self.accept_reply(reply, &mut outcomes),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.fail_all_pending(&mut outcomes);
                    break;
                }
            }
        }

        while let Some(pending) = self.pending_saves.front() {
            if pending.waited(tick) < timeouts.save_ticks {
                break;
            }
            if let Some(pending) = self.pending_saves.pop_front() {
                warn!(slot = %pending.slot, waited_ticks = pending.waited(tick), "save_timed_out");
                outcomes.push(PersistenceOutcome::SaveTimedOut { slot: pending.slot });
            }
        }

        let expired = self
            .pending_load
            .as_ref()
            .is_some_and(|pending| pending.waited(tick) >= timeouts.load_ticks);
        if expired {
            if let Some(pending) = self.pending_load.take() {
                warn!(slot = %pending.slot, waited_ticks = pending.waited(tick), "load_timed_out");
                outcomes.push(PersistenceOutcome::LoadTimedOut { slot: pending.slot });
            }
        }
        outcomes
    }

    fn next_id(&mut self) -> u64 {
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.next_request_id
    }

    fn send(&mut self, request: Request) -> Result<(), PersistenceError> {
        self.requests
            .send(request)
            .map_err(|_| PersistenceError::WorkerGone)?;
        self.in_flight = self.in_flight.saturating_add(1);
        Ok(())
    }

    fn fail_all_pending(&mut self, outcomes: &mut Vec<PersistenceOutcome>) {
        for pending in self.pending_saves.drain(..) {
            outcomes.push(PersistenceOutcome::SaveFailed {
                slot: pending.slot,
                error: PersistenceError::WorkerGone,
            });
        }
        if let Some(pending) = self.pending_load.take() {
            outcomes.push(PersistenceOutcome::LoadFailed {
                slot: pending.slot,
                error: PersistenceError::WorkerGone,
            });
        }
        self.in_flight = 0;
    }

    fn accept_reply(&mut self, reply: Reply, outcomes: &mut Vec<PersistenceOutcome>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match reply {
            Reply::Saved { id, slot, result } => {
                let Some(index) = self.pending_saves.iter().position(|pending| pending.id == id)
                else {
                    self.stale_replies = self.stale_replies.saturating_add(1);
                    debug!(slot = %slot, "stale_save_reply_dropped");
                    return;
                };
                self.pending_saves.remove(index);
                outcomes.push(match result {
                    Ok(()) => PersistenceOutcome::Saved { slot },
                    Err(error) => PersistenceOutcome::SaveFailed { slot, error },
                });
            }
            Reply::Loaded { id, slot, result } => {
                if self.pending_load.as_ref().map(|pending| pending.id) != Some(id) {
                    self.stale_replies = self.stale_replies.saturating_add(1);
                    debug!(slot = %slot, "stale_load_reply_dropped");
                    return;
                }
                self.pending_load = None;
                outcomes.push(match result {
                    Ok(Some(payload)) => PersistenceOutcome::Loaded { slot, payload },
                    Ok(None) => PersistenceOutcome::NothingSaved { slot },
                    Err(error) => PersistenceOutcome::LoadFailed { slot, error },
                });
            }
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(_) => self.in_flight = self.in_flight.saturating_sub(1),
                Err(RecvTimeoutError::Disconnected) => self.in_flight = 0,
                Err(RecvTimeoutError::Timeout) => break,
            }
        }
        let Some(handle) = self.handle.take() else {
            return;
        };
        if self.in_flight > 0 {
            // The thread exits on its own once the store call returns and its
            // reply hits the closed channel.
            warn!(in_flight = self.in_flight, "persistence_worker_detached");
            return;
        }
        if handle.join().is_err() {
            warn!("persistence_worker_panicked");
        }
    }
}

fn worker_loop(store: Box<dyn SnapshotStore>, requests: Receiver<Request>, replies: Sender<Reply>) {
    while let Ok(request) = requests.recv() {
        let reply = match request {
            Request::Shutdown => break,
            Request::Save { id, slot, payload } => {
                let bytes = payload.len();
                let result = store.save(&slot, payload);
                match &result {
                    Ok(()) => info!(slot = %slot, bytes, "snapshot_saved"),
                    Err(error) => warn!(slot = %slot, error = %error, "snapshot_save_failed"),
                }
                Reply::Saved { id, slot, result }
            }
            Request::Load { id, slot } => {
                let result = store.load(&slot);
                if let Err(error) = &result {
                    warn!(slot = %slot, error = %error, "snapshot_load_failed");
                }
                Reply::Loaded { id, slot, result }
            }
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    debug!("persistence_worker_stopped");
}
