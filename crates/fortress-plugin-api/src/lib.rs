//! Plugin API: traits, events, and host server API for plugin authors.
//!
//! This crate defines the boundary between a plugin and the hosting Bedrock
//! server runtime. The host owns the event loop, the world, and the tick
//! scheduler; plugins receive events and call back into the host through
//! [`ServerApi`]. It has no dependency on any other fortress crate.

// ─── Types ───────────────────────────────────────────────────────────────────

/// Information about an online player, passed to plugins in events.
#[derive(Debug, Clone)]
pub struct ApiPlayer {
    pub name: String,
    pub uuid: String,
    pub position: (f32, f32, f32),
    pub gamemode: i32,
}

/// Block position for plugin events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// All events the host dispatches to plugins.
#[derive(Debug, Clone)]
pub enum PluginEvent {
    PlayerJoin {
        player: ApiPlayer,
    },
    PlayerQuit {
        player: ApiPlayer,
    },
    PlayerDeath {
        player: ApiPlayer,
    },
    /// Right-click / use-item interaction. `item` is the held item identifier.
    PlayerInteract {
        player: ApiPlayer,
        item: String,
    },
    /// A block is being broken. `block_type` is the type that existed before
    /// the break (the host reads it out of the world before applying).
    BlockBreak {
        player: ApiPlayer,
        position: BlockPos,
        block_type: String,
    },
    /// A block was placed. `block_type` is the type that was placed.
    BlockPlace {
        player: ApiPlayer,
        position: BlockPos,
        block_type: String,
    },
    /// A player answered (or dismissed) a form shown via [`ServerApi::show_form`].
    /// `button` is `None` when the form was closed without a selection.
    FormResponse {
        player: ApiPlayer,
        form_id: u32,
        button: Option<usize>,
    },
    ServerStarted,
    ServerStopping,
}

// ─── Plugin trait ────────────────────────────────────────────────────────────

/// Metadata about a plugin.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
}

/// The Plugin trait, implemented by in-process plugins loaded by the host.
pub trait Plugin: Send {
    /// Return plugin metadata.
    fn info(&self) -> PluginInfo;

    /// Called once when the plugin is loaded. Use `api` to register commands
    /// and schedule tasks.
    fn on_enable(&mut self, api: &mut dyn ServerApi);

    /// Called when the server shuts down or the plugin is unloaded.
    fn on_disable(&mut self, api: &mut dyn ServerApi) {
        let _ = api;
    }

    /// Called for every dispatched event.
    fn on_event(&mut self, event: &PluginEvent, api: &mut dyn ServerApi) {
        let _ = (event, api);
    }

    /// Called when a scheduled task fires. `task_id` is the id the plugin
    /// passed to [`ServerApi::schedule_delayed`] / [`ServerApi::schedule_repeating`].
    fn on_task(&mut self, task_id: u32, api: &mut dyn ServerApi) {
        let _ = (task_id, api);
    }

    /// Called when a plugin-registered command is executed by a player.
    /// Return `true` if the command was handled.
    fn on_command(
        &mut self,
        command: &str,
        args: &[String],
        player_uuid: &str,
        api: &mut dyn ServerApi,
    ) -> bool {
        let _ = (command, args, player_uuid, api);
        false
    }
}

// ─── Server API ──────────────────────────────────────────────────────────────

/// Read/write access to host state, passed to plugins during callbacks.
///
/// Everything runs on the host's single tick thread; calls apply immediately
/// and never block on I/O.
pub trait ServerApi {
    // --- Players ---
    fn get_player(&self, uuid: &str) -> Option<ApiPlayer>;
    fn online_players(&self) -> Vec<ApiPlayer>;
    fn send_message(&mut self, uuid: &str, message: &str);
    fn teleport_player(&mut self, uuid: &str, x: f32, y: f32, z: f32);
    fn clear_inventory(&mut self, uuid: &str);
    fn set_inventory_item(&mut self, uuid: &str, slot: u32, item: &str);
    fn clear_effects(&mut self, uuid: &str);
    /// Apply a status effect. `duration_ticks < 0` means infinite.
    fn apply_effect(&mut self, uuid: &str, effect: &str, amplifier: i32, duration_ticks: i32);
    fn set_gamemode(&mut self, uuid: &str, gamemode: i32);
    fn strike_lightning(&mut self, x: f32, y: f32, z: f32);

    // --- World ---
    /// Read a block type. `None` when the position is in an unloaded region.
    fn get_block_type(&self, x: i32, y: i32, z: i32) -> Option<String>;
    /// Write a block type. Returns `false` when the write could not be applied.
    fn set_block_type(&mut self, x: i32, y: i32, z: i32, block_type: &str) -> bool;

    // --- Scheduler ---
    fn schedule_delayed(&mut self, delay_ticks: u64, task_id: u32);
    fn schedule_repeating(&mut self, delay_ticks: u64, interval_ticks: u64, task_id: u32);
    fn cancel_task(&mut self, task_id: u32);

    // --- Forms ---
    /// Show a button menu to a player. The answer arrives later as
    /// [`PluginEvent::FormResponse`] carrying the same `form_id`.
    fn show_form(&mut self, uuid: &str, title: &str, buttons: &[String], form_id: u32);

    // --- Commands ---
    fn register_command(&mut self, name: &str, description: &str);
}

// ─── Tests ───────────────────────────────────────────────────────────────────
