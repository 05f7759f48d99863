//! Rollback engine: buffered durable recording plus batched reverse replay.
//!
//! The engine owns the log files' lifecycle (create/append/read/delete) and
//! the in-flight replay cursors. It never touches player lifecycle state;
//! the match tracker decides *when* to record and replay, the engine decides
//! *how*.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::RollbackError;
use crate::record::{is_liquid, ActionKind, MutationRecord};
use crate::replay::{BlockStore, ReplayQueue};
use crate::{log, unix_timestamp};

/// Flush the in-memory buffer once it reaches this many records, bounding
/// both memory and the worst-case loss window of a crash between flushes.
const FLUSH_THRESHOLD: usize = 50;

/// Unflushed recording state for one player currently in a match.
#[derive(Debug)]
struct Tracking {
    buffer: Vec<MutationRecord>,
    /// Positions around recorded fluid edits, swept to air as a trailing
    /// best-effort cleanup pass. In-memory only; lost across a restart.
    affected: HashSet<(i32, i32, i32)>,
    path: PathBuf,
    last_flush: f64,
}

/// An in-flight replay for one player.
#[derive(Debug)]
struct ActiveReplay {
    queue: ReplayQueue,
    path: PathBuf,
}

/// Outcome of [`RollbackEngine::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A replay is already in flight for this player; the call was a no-op.
    AlreadyRunning,
    /// Nothing to roll back. The log (if any) was deleted and tracking cleared.
    Empty,
    /// Replay queue built; caller should schedule a repeating batch task.
    Started { backlog: usize },
}

/// Outcome of one [`RollbackEngine::process_batch`] invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// `n` ops applied; more remain.
    Applied(usize),
    /// Queue drained: log deleted, bookkeeping cleared. Caller cancels the
    /// batch task and transitions the player out of rollback.
    Finished,
}

/// Durable recorder and reverse-replay scheduler state, keyed by player uuid.
pub struct RollbackEngine {
    dir: PathBuf,
    tracking: HashMap<String, Tracking>,
    active: HashMap<String, ActiveReplay>,
}

impl RollbackEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tracking: HashMap::new(),
            active: HashMap::new(),
        }
    }

    /// Start recording for a player entering a match: truncate/create the
    /// durable log and clear any stale buffer.
    pub fn begin_tracking(&mut self, uuid: &str) -> Result<(), RollbackError> {
        let path = log::create(&self.dir, uuid)?;
        self.tracking.insert(
            uuid.to_string(),
            Tracking {
                buffer: Vec::new(),
                affected: HashSet::new(),
                path,
                last_flush: unix_timestamp(),
            },
        );
        Ok(())
    }

    /// Whether mutations are currently being recorded for this player.
    pub fn is_tracking(&self, uuid: &str) -> bool {
        self.tracking.contains_key(uuid)
    }

    /// Whether a replay is in flight for this player.
    pub fn is_active(&self, uuid: &str) -> bool {
        self.active.contains_key(uuid)
    }

    /// Remaining replay ops for this player, 0 when idle.
    pub fn backlog(&self, uuid: &str) -> usize {
        self.active.get(uuid).map_or(0, |a| a.queue.remaining())
    }

    /// Append one mutation to the player's in-memory buffer. No disk I/O on
    /// the hot path, except an immediate flush when the buffer fills. No-op
    /// when the player is not being tracked.
    pub fn record(&mut self, uuid: &str, kind: ActionKind, x: i32, y: i32, z: i32, block_type: &str) {
        let Some(tracking) = self.tracking.get_mut(uuid) else {
            return;
        };
        if is_liquid(block_type) {
            // Fluids spread beyond the logged cell; sweep the neighborhood
            // to air after the exact-inverse pass.
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        tracking.affected.insert((x + dx, y + dy, z + dz));
                    }
                }
            }
        }
        tracking.buffer.push(MutationRecord {
            timestamp: unix_timestamp(),
            kind,
            x,
            y,
            z,
            block_type: block_type.to_string(),
        });
        if tracking.buffer.len() >= FLUSH_THRESHOLD {
            self.flush(uuid);
        }
    }

    /// Append the player's whole buffer to the durable log in one write, then
    /// clear it. On an append failure the buffer is kept for the next flush.
    pub fn flush(&mut self, uuid: &str) {
        let Some(tracking) = self.tracking.get_mut(uuid) else {
            return;
        };
        if tracking.buffer.is_empty() {
            return;
        }
        match log::append(&tracking.path, &tracking.buffer) {
            Ok(()) => {
                info!("flushed {} actions for {uuid}", tracking.buffer.len());
                tracking.buffer.clear();
                tracking.last_flush = unix_timestamp();
            }
            Err(e) => error!("failed to flush rollback buffer for {uuid}: {e}"),
        }
    }

    /// Flush every tracked buffer. Driven by the periodic flush task and by
    /// shutdown (flush-then-stop, so crash resumption sees accurate data).
    pub fn flush_all(&mut self) {
        let uuids: Vec<String> = self.tracking.keys().cloned().collect();
        for uuid in uuids {
            self.flush(&uuid);
        }
    }

    /// Begin replaying a player's log in reverse. Idempotent: a second call
    /// while a replay is in flight is a no-op.
    pub fn start(&mut self, uuid: &str) -> StartOutcome {
        if self.active.contains_key(uuid) {
            return StartOutcome::AlreadyRunning;
        }
        self.flush(uuid);

        let tracking = self.tracking.remove(uuid);
        let path = tracking
            .as_ref()
            .map(|t| t.path.clone())
            .unwrap_or_else(|| log::log_path(&self.dir, uuid));

        // A read failure means "nothing to roll back": a safe, if lossy,
        // default.
        let records = match log::read_all(&path) {
            Ok(records) => records,
            Err(e) => {
                warn!("cannot read rollback log for {uuid}: {e}");
                Vec::new()
            }
        };
        if records.is_empty() {
            self.remove_log(uuid, &path);
            return StartOutcome::Empty;
        }

        let cleanup = tracking.map(|t| t.affected).unwrap_or_default();
        let queue = ReplayQueue::build(records, cleanup);
        let backlog = queue.remaining();
        info!("starting rollback for {uuid}: {backlog} ops");
        self.active
            .insert(uuid.to_string(), ActiveReplay { queue, path });
        StartOutcome::Started { backlog }
    }

    /// Drop a player's log without replaying. Used when another participant
    /// still occupies the arena, so destructive restoration must not run.
    pub fn discard(&mut self, uuid: &str) {
        let path = self
            .tracking
            .remove(uuid)
            .map(|t| t.path)
            .unwrap_or_else(|| log::log_path(&self.dir, uuid));
        self.active.remove(uuid);
        self.remove_log(uuid, &path);
    }

    /// Apply one bounded batch of replay work for a player. Returns
    /// [`BatchOutcome::Finished`] (after deleting the log and clearing
    /// bookkeeping) once the queue drains; also when no replay is in flight,
    /// so a stray task fire settles cleanly.
    pub fn process_batch(&mut self, uuid: &str, store: &mut dyn BlockStore) -> BatchOutcome {
        let Some(active) = self.active.get_mut(uuid) else {
            return BatchOutcome::Finished;
        };
        let applied = active.queue.apply_batch(store);
        if active.queue.is_empty() {
            let path = active.path.clone();
            self.active.remove(uuid);
            self.remove_log(uuid, &path);
            info!("rollback complete for {uuid}");
            BatchOutcome::Finished
        } else {
            BatchOutcome::Applied(applied)
        }
    }

    /// Startup scan: every log file on disk is a rollback owed from before
    /// the restart. Header-only files are stale and deleted; files with
    /// records get a replay queue exactly as if triggered live. Returns the
    /// uuids that now owe a rollback (their owners may be offline).
    pub fn resume_pending(&mut self) -> Vec<String> {
        let mut owed = Vec::new();
        for (uuid, path) in log::scan(&self.dir) {
            if self.active.contains_key(&uuid) {
                continue;
            }
            let records = match log::read_all(&path) {
                Ok(records) => records,
                Err(e) => {
                    warn!("cannot read abandoned log {path:?}: {e}");
                    continue;
                }
            };
            if records.is_empty() {
                self.remove_log(&uuid, &path);
                continue;
            }
            let queue = ReplayQueue::build(records, []);
            info!("resuming rollback for {uuid}: {} ops", queue.remaining());
            self.active
                .insert(uuid.clone(), ActiveReplay { queue, path });
            owed.push(uuid);
        }
        owed
    }

    fn remove_log(&mut self, uuid: &str, path: &std::path::Path) {
        if !path.exists() {
            return;
        }
        // A failed delete is self-healing: the file is picked up by
        // resume_pending on next startup.
        if let Err(e) = log::delete(path) {
            error!("failed to delete rollback log for {uuid}: {e}");
        }
    }
}
