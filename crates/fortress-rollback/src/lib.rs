//! Durable rollback engine for arena block mutations.
//!
//! Records every block change a player makes during a match into a buffered,
//! append-only per-player log file, then replays the log in reverse
//! (newest-first) in bounded batches to restore the arena. The log file's
//! presence on disk at startup is the recovery signal: a non-empty log means
//! that player's match ended abnormally and still owes a rollback.
//!
//! The crate is host-agnostic. World writes go through the [`BlockStore`]
//! trait and all timing (flush intervals, batch cadence) is driven by the
//! caller's scheduler.

pub mod engine;
pub mod error;
pub mod log;
pub mod record;
pub mod replay;

pub use engine::{BatchOutcome, RollbackEngine, StartOutcome};
pub use error::RollbackError;
pub use record::{is_liquid, ActionKind, MutationRecord};
pub use replay::{batch_size, BlockStore, ReplayQueue};

/// The block type written when undoing a placement or sweeping cleanup.
pub const AIR: &str = "minecraft:air";

/// Seconds since the Unix epoch, as used in record timestamps.
pub fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
