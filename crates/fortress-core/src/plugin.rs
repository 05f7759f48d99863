//! The plugin: match lifecycle tracking wired to the rollback engine.
//!
//! Everything here runs inside host callbacks on the single tick thread.
//! The registry owns state transitions, the engine owns log files and replay
//! cursors; this module is the traffic between them. No failure is allowed
//! to escape a callback: an uncaught error there would silently stop the
//! scheduler from ever firing that handle again.

use std::collections::HashMap;
use std::path::PathBuf;

use fortress_plugin_api::{Plugin, PluginEvent, PluginInfo, ServerApi};
use fortress_rollback::{ActionKind, BatchOutcome, BlockStore, RollbackEngine, StartOutcome};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::state::{GameState, PlayerRegistry};

// Fixed task ids.
const TASK_FLUSH: u32 = 1;
const TASK_RESUME: u32 = 2;
/// Dynamically allocated task ids start here.
const TASK_DYNAMIC_BASE: u32 = 16;

/// Buffer flush cadence: 1200 ticks = 60 s.
const FLUSH_PERIOD_TICKS: u64 = 1200;
/// Grace delay before the crash-resumption scan, letting the world load.
const RESUME_DELAY_TICKS: u64 = 100;
/// Join handling is delayed until the player is fully spawned.
const JOIN_DELAY_TICKS: u64 = 10;
const TELEPORT_DELAY_TICKS: u64 = 1;
/// Replay batch cadence; batch sizing scales with the backlog.
const REPLAY_PERIOD_TICKS: u64 = 1;
/// Per-kit flat cooldown between teleports, throttling spawn collisions.
const TELEPORT_COOLDOWN_SECS: f64 = 5.0;

const MENU_ITEM: &str = "minecraft:lodestone_compass";
const MENU_SLOT: u32 = 8;
const KIT_FORM_ID: u32 = 1;

/// What a dynamically allocated task id does when it fires.
#[derive(Debug, Clone)]
enum TaskTarget {
    JoinReset { uuid: String },
    Teleport { uuid: String, kit_index: usize },
    Replay { uuid: String },
}

/// PvP match core: lobby/match lifecycle plus durable arena rollback.
pub struct FortressCore {
    config: Config,
    registry: PlayerRegistry,
    engine: RollbackEngine,
    /// Per-kit global cooldown stamps (unix seconds of the last teleport).
    teleport_cooldown: HashMap<String, f64>,
    tasks: HashMap<u32, TaskTarget>,
    /// uuid -> repeating replay task id, for cancellation on completion.
    replay_tasks: HashMap<String, u32>,
    next_task_id: u32,
}

/// Adapts the host world API to the engine's [`BlockStore`] seam.
struct ApiBlockStore<'a> {
    api: &'a mut dyn ServerApi,
}

impl BlockStore for ApiBlockStore<'_> {
    fn set_block(&mut self, x: i32, y: i32, z: i32, block_type: &str) -> bool {
        self.api.set_block_type(x, y, z, block_type)
    }
}

impl FortressCore {
    /// Build the plugin with its data directory. Loads `config.toml`
    /// (writing the default one on first run); rollback logs live under
    /// `<data_dir>/rollbacks`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = data_dir.into();
        let config = Config::load_or_create(data_dir.join("config.toml"))?;
        let engine = RollbackEngine::new(data_dir.join("rollbacks"));
        Ok(Self {
            config,
            registry: PlayerRegistry::new(),
            engine,
            teleport_cooldown: HashMap::new(),
            tasks: HashMap::new(),
            replay_tasks: HashMap::new(),
            next_task_id: TASK_DYNAMIC_BASE,
        })
    }

    /// Lifecycle state of a player, `Lobby` when unknown.
    pub fn player_state(&self, uuid: &str) -> GameState {
        self.registry.state(uuid)
    }

    fn alloc_task(&mut self, target: TaskTarget) -> u32 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        self.tasks.insert(id, target);
        id
    }

    /// Full player reset: survival, no effects, empty inventory, lobby
    /// spawn, menu compass, permanent weakness. Used on join and after
    /// rollback.
    fn reset_player(&self, api: &mut dyn ServerApi, uuid: &str) {
        api.set_gamemode(uuid, 0);
        api.clear_effects(uuid);
        api.clear_inventory(uuid);
        let lobby = self.config.lobby_spawn;
        api.teleport_player(uuid, lobby.x, lobby.y, lobby.z);
        api.set_inventory_item(uuid, MENU_SLOT, MENU_ITEM);
        api.apply_effect(uuid, "minecraft:weakness", 255, -1);
    }

    fn handle_join(&mut self, api: &mut dyn ServerApi, uuid: &str) {
        if api.get_player(uuid).is_none() {
            return; // left again before the delayed reset fired
        }
        self.reset_player(api, uuid);

        let entry = self.registry.entry(uuid);
        if entry.state == GameState::Rollback {
            // Their previous match is still being rolled back; the reset
            // above already put them in the lobby, but the state must not
            // be clobbered or the rollback would be forgotten.
            api.send_message(uuid, "§eYour last arena is still being restored...§r");
        } else {
            entry.state = GameState::Lobby;
        }
        api.send_message(uuid, "§6=== Fortress ===§r");
        api.send_message(uuid, "§eRight-click the compass to join a match!§r");
    }

    fn open_kit_menu(&mut self, api: &mut dyn ServerApi, uuid: &str) {
        let buttons: Vec<String> = self
            .config
            .kits
            .iter()
            .map(|kit| {
                format!(
                    "{} [{}/{}]",
                    kit.name,
                    self.registry.occupancy(&kit.name),
                    kit.max_players
                )
            })
            .collect();
        api.show_form(uuid, "Fortress", &buttons, KIT_FORM_ID);
    }

    fn handle_kit_select(&mut self, api: &mut dyn ServerApi, uuid: &str, kit_index: usize) {
        match self.registry.state(uuid) {
            GameState::Match | GameState::Teleporting => {
                api.send_message(uuid, "§cYou are already in a match!§r");
                return;
            }
            GameState::Rollback => {
                api.send_message(uuid, "§cWait for your rollback to finish!§r");
                return;
            }
            GameState::Lobby => {}
        }

        let (Some(kit), Some(_map)) = (
            self.config.kits.get(kit_index),
            self.config.maps.get(kit_index),
        ) else {
            api.send_message(uuid, "§cInvalid selection!§r");
            return;
        };

        if self.registry.occupancy(&kit.name) >= kit.max_players as usize {
            api.send_message(uuid, "§cThis match is full!§r");
            return;
        }

        let now = fortress_rollback::unix_timestamp();
        let last = self.teleport_cooldown.get(&kit.name).copied().unwrap_or(0.0);
        if now - last < TELEPORT_COOLDOWN_SECS {
            api.send_message(uuid, "§cSomeone just teleported! Wait a moment...§r");
            return;
        }

        self.teleport_cooldown.insert(kit.name.clone(), now);
        self.registry.entry(uuid).state = GameState::Teleporting;
        let task = self.alloc_task(TaskTarget::Teleport {
            uuid: uuid.to_string(),
            kit_index,
        });
        api.schedule_delayed(TELEPORT_DELAY_TICKS, task);
    }

    /// The scheduled teleport. Any failure here reverts the player to the
    /// lobby; a player must never be left stuck in `Teleporting`.
    fn complete_teleport(&mut self, api: &mut dyn ServerApi, uuid: &str, kit_index: usize) {
        if self.registry.state(uuid) != GameState::Teleporting {
            return;
        }
        let (Some(kit), Some(map)) = (
            self.config.kits.get(kit_index).cloned(),
            self.config.maps.get(kit_index).cloned(),
        ) else {
            self.registry.entry(uuid).state = GameState::Lobby;
            return;
        };
        if api.get_player(uuid).is_none() {
            // Logged off between selection and teleport.
            self.registry.entry(uuid).state = GameState::Lobby;
            return;
        }

        if let Err(e) = self.engine.begin_tracking(uuid) {
            // Without a log the arena could never be restored; abort the
            // whole transition instead.
            error!("cannot initialize rollback log for {uuid}: {e}");
            api.send_message(uuid, "§cCould not start the match, try again.§r");
            self.registry.entry(uuid).state = GameState::Lobby;
            return;
        }

        api.clear_inventory(uuid);
        api.teleport_player(uuid, map.spawn.x, map.spawn.y, map.spawn.z);

        let entry = self.registry.entry(uuid);
        entry.state = GameState::Match;
        entry.current_match = Some(kit.name.clone());

        api.send_message(uuid, "§6=== Fortress ===§r");
        api.send_message(uuid, &format!("§b{} §7— By: {}§r", map.name, map.creator));
        api.send_message(uuid, &format!("§e{} §7— By: {}§r", kit.name, kit.creator));
    }

    /// Match exit on death, quit, or `/out`. Idempotent: a second trigger
    /// while already rolling back is a no-op.
    fn begin_rollback(&mut self, api: &mut dyn ServerApi, uuid: &str) {
        if self.registry.state(uuid) == GameState::Rollback {
            return;
        }
        let match_key = self.registry.entry(uuid).current_match.take();

        // Occupant guard: only the last participant leaving restores the
        // arena. The departing player's own entry no longer counts (its
        // match key was just taken), so a fresh scan gives the others.
        if let Some(key) = &match_key {
            if self.registry.occupancy(key) > 0 {
                info!("skipping rollback for {uuid}: {key} still occupied");
                self.engine.discard(uuid);
                self.registry.entry(uuid).state = GameState::Lobby;
                if api.get_player(uuid).is_some() {
                    self.reset_player(api, uuid);
                }
                return;
            }
        }

        self.registry.entry(uuid).state = GameState::Rollback;
        match self.engine.start(uuid) {
            StartOutcome::AlreadyRunning => {}
            StartOutcome::Empty => self.finish_rollback(api, uuid),
            StartOutcome::Started { backlog } => {
                if backlog > 500 && api.get_player(uuid).is_some() {
                    api.send_message(uuid, &format!("§eRestoring map... ({backlog} blocks)§r"));
                }
                self.schedule_replay(api, uuid);
            }
        }
    }

    fn schedule_replay(&mut self, api: &mut dyn ServerApi, uuid: &str) {
        let task = self.alloc_task(TaskTarget::Replay {
            uuid: uuid.to_string(),
        });
        self.replay_tasks.insert(uuid.to_string(), task);
        api.schedule_repeating(REPLAY_PERIOD_TICKS, REPLAY_PERIOD_TICKS, task);
    }

    /// One bounded slice of replay work, fired by the repeating task.
    fn run_replay_batch(&mut self, api: &mut dyn ServerApi, uuid: &str, task_id: u32) {
        if self.registry.state(uuid) != GameState::Rollback {
            warn!("replay task fired for {uuid} outside rollback state, cancelling");
            api.cancel_task(task_id);
            self.tasks.remove(&task_id);
            self.replay_tasks.remove(uuid);
            return;
        }
        let mut store = ApiBlockStore { api: &mut *api };
        match self.engine.process_batch(uuid, &mut store) {
            BatchOutcome::Applied(_) => {}
            BatchOutcome::Finished => self.finish_rollback(api, uuid),
        }
    }

    /// Queue drained: cancel the task, reset the player if they are online,
    /// and return the record to the lobby. An offline player keeps the
    /// `Lobby` record and is reset lazily on their next join; a completed
    /// record never re-triggers a rollback.
    fn finish_rollback(&mut self, api: &mut dyn ServerApi, uuid: &str) {
        if let Some(task) = self.replay_tasks.remove(uuid) {
            api.cancel_task(task);
            self.tasks.remove(&task);
        }
        let entry = self.registry.entry(uuid);
        entry.current_match = None;
        entry.state = GameState::Lobby;
        if api.get_player(uuid).is_some() {
            self.reset_player(api, uuid);
            api.send_message(uuid, "§aMap restored!§r");
        }
    }

    /// Startup scan: every surviving log file owes a rollback, whether or
    /// not its owner is online.
    fn resume_abandoned_rollbacks(&mut self, api: &mut dyn ServerApi) {
        let owed = self.engine.resume_pending();
        if owed.is_empty() {
            return;
        }
        info!("resuming {} abandoned rollback(s)", owed.len());
        for uuid in owed {
            let entry = self.registry.entry(&uuid);
            entry.state = GameState::Rollback;
            entry.current_match = None;
            self.schedule_replay(api, &uuid);
        }
    }
}

impl Plugin for FortressCore {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: "FortressCore".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: "PvP match core with durable arena rollback".into(),
            author: "Fortress".into(),
        }
    }

    fn on_enable(&mut self, api: &mut dyn ServerApi) {
        info!(
            "FortressCore enabled: {} map(s), {} kit(s)",
            self.config.maps.len(),
            self.config.kits.len()
        );
        api.register_command("out", "Leave the current match and return to lobby");
        api.schedule_repeating(FLUSH_PERIOD_TICKS, FLUSH_PERIOD_TICKS, TASK_FLUSH);
        api.schedule_delayed(RESUME_DELAY_TICKS, TASK_RESUME);
    }

    fn on_disable(&mut self, api: &mut dyn ServerApi) {
        let _ = api;
        // Flush-then-stop: whatever is buffered must reach disk so the
        // startup scan resumes from accurate data.
        self.engine.flush_all();
        info!("FortressCore disabled");
    }

    fn on_event(&mut self, event: &PluginEvent, api: &mut dyn ServerApi) {
        match event {
            PluginEvent::PlayerJoin { player } => {
                let task = self.alloc_task(TaskTarget::JoinReset {
                    uuid: player.uuid.clone(),
                });
                api.schedule_delayed(JOIN_DELAY_TICKS, task);
            }
            PluginEvent::PlayerQuit { player } => {
                if self.registry.state(&player.uuid) == GameState::Match {
                    self.begin_rollback(api, &player.uuid);
                } else {
                    self.registry.evict_if_idle(&player.uuid);
                }
            }
            PluginEvent::PlayerDeath { player } => {
                if self.registry.state(&player.uuid) == GameState::Match {
                    let (x, y, z) = player.position;
                    api.strike_lightning(x, y, z);
                    api.clear_inventory(&player.uuid);
                    self.begin_rollback(api, &player.uuid);
                }
            }
            PluginEvent::PlayerInteract { player, item } => {
                if item == MENU_ITEM {
                    match self.registry.state(&player.uuid) {
                        GameState::Lobby => self.open_kit_menu(api, &player.uuid),
                        GameState::Rollback => {
                            api.send_message(&player.uuid, "§cWait for your rollback to finish!§r")
                        }
                        GameState::Teleporting | GameState::Match => {}
                    }
                }
            }
            PluginEvent::BlockBreak {
                player,
                position,
                block_type,
            } => {
                if self.registry.state(&player.uuid) == GameState::Match {
                    // block_type is the pre-break type: what to restore.
                    self.engine.record(
                        &player.uuid,
                        ActionKind::Break,
                        position.x,
                        position.y,
                        position.z,
                        block_type,
                    );
                }
            }
            PluginEvent::BlockPlace {
                player,
                position,
                block_type,
            } => {
                if self.registry.state(&player.uuid) == GameState::Match {
                    self.engine.record(
                        &player.uuid,
                        ActionKind::Place,
                        position.x,
                        position.y,
                        position.z,
                        block_type,
                    );
                }
            }
            PluginEvent::FormResponse {
                player,
                form_id,
                button,
            } => {
                if *form_id == KIT_FORM_ID {
                    if let Some(index) = button {
                        self.handle_kit_select(api, &player.uuid, *index);
                    }
                }
            }
            PluginEvent::ServerStarted | PluginEvent::ServerStopping => {}
        }
    }

    fn on_task(&mut self, task_id: u32, api: &mut dyn ServerApi) {
        match task_id {
            TASK_FLUSH => self.engine.flush_all(),
            TASK_RESUME => self.resume_abandoned_rollbacks(api),
            _ => {
                let Some(target) = self.tasks.get(&task_id).cloned() else {
                    return; // cancelled or already consumed
                };
                match target {
                    TaskTarget::JoinReset { uuid } => {
                        self.tasks.remove(&task_id);
                        self.handle_join(api, &uuid);
                    }
                    TaskTarget::Teleport { uuid, kit_index } => {
                        self.tasks.remove(&task_id);
                        self.complete_teleport(api, &uuid, kit_index);
                    }
                    // Repeating: stays registered until completion cancels it.
                    TaskTarget::Replay { uuid } => self.run_replay_batch(api, &uuid, task_id),
                }
            }
        }
    }

    fn on_command(
        &mut self,
        command: &str,
        _args: &[String],
        player_uuid: &str,
        api: &mut dyn ServerApi,
    ) -> bool {
        if command != "out" {
            return false;
        }
        if self.registry.state(player_uuid) != GameState::Match {
            api.send_message(player_uuid, "§cYou are not in a match!§r");
        } else {
            api.send_message(player_uuid, "§eLeaving match...§r");
            self.begin_rollback(api, player_uuid);
        }
        true
    }
}
