//! Per-player match lifecycle state.
//!
//! All lifecycle bookkeeping lives in one owned [`PlayerRegistry`] rather
//! than ad hoc maps scattered across callback sites. Entries are created
//! lazily on first reference and are never removed while a player is in a
//! match or owes a rollback, so rollbacks survive the owning player going
//! offline.

use std::collections::HashMap;

/// Where a player is in the lobby/match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Lobby,
    /// Kit selected, teleport scheduled but not yet executed.
    Teleporting,
    Match,
    /// Match over; block restoration in flight.
    Rollback,
}

#[derive(Debug)]
pub struct PlayerEntry {
    pub state: GameState,
    /// Kit name keying the match this player occupies, `Some` only in
    /// [`GameState::Match`].
    pub current_match: Option<String>,
}

impl PlayerEntry {
    fn new() -> Self {
        Self {
            state: GameState::Lobby,
            current_match: None,
        }
    }
}

/// The single owned map from player uuid to lifecycle state.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<String, PlayerEntry>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create a player's entry.
    pub fn entry(&mut self, uuid: &str) -> &mut PlayerEntry {
        self.players
            .entry(uuid.to_string())
            .or_insert_with(PlayerEntry::new)
    }

    pub fn get(&self, uuid: &str) -> Option<&PlayerEntry> {
        self.players.get(uuid)
    }

    /// A player with no entry is in the lobby.
    pub fn state(&self, uuid: &str) -> GameState {
        self.players
            .get(uuid)
            .map_or(GameState::Lobby, |e| e.state)
    }

    /// Live occupancy of a match key, computed by fresh scan at decision
    /// time. Never cached: players join and leave within the same tick
    /// window and a maintained counter would go stale.
    pub fn occupancy(&self, match_key: &str) -> usize {
        self.players
            .values()
            .filter(|e| e.state == GameState::Match && e.current_match.as_deref() == Some(match_key))
            .count()
    }

    /// Drop a player's entry on disconnect, but only when nothing is owed:
    /// `Match` and `Rollback` entries must survive the player going offline.
    pub fn evict_if_idle(&mut self, uuid: &str) -> bool {
        match self.state(uuid) {
            GameState::Lobby | GameState::Teleporting => self.players.remove(uuid).is_some(),
            GameState::Match | GameState::Rollback => false,
        }
    }
}
