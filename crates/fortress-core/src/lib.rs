//! Fortress core: a PvP match plugin with durable arena rollback.
//!
//! Players pick a kit from the compass menu, fight on the paired arena, and
//! every block they break or place is journaled to an append-only per-player
//! log. When the match ends (death, disconnect, `/out`) the log is replayed
//! in reverse in bounded batches until the arena is pristine again; a log
//! that survives a server crash is picked up and replayed on next startup.

pub mod config;
pub mod plugin;
pub mod state;

#[cfg(test)]
mod testhost;

pub use config::Config;
pub use plugin::FortressCore;
pub use state::GameState;
