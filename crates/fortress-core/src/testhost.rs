//! In-memory host runtime for integration tests: a `ServerApi` over a
//! `HashMap` world plus a tick-driving scheduler, so the real plugin can be
//! exercised end to end without a server.

use std::collections::HashMap;

use fortress_plugin_api::{ApiPlayer, Plugin, ServerApi};

struct HostTask {
    id: u32,
    remaining: u64,
    /// `None` = one-shot.
    interval: Option<u64>,
    cancelled: bool,
}

#[derive(Default)]
pub struct TestHost {
    players: HashMap<String, ApiPlayer>,
    blocks: HashMap<(i32, i32, i32), String>,
    pub messages: Vec<(String, String)>,
    pub forms: Vec<(String, Vec<String>, u32)>,
    pub commands: Vec<(String, String)>,
    pub teleports: Vec<(String, f32, f32, f32)>,
    pub lightning: Vec<(f32, f32, f32)>,
    tasks: Vec<HostTask>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, name: &str, uuid: &str) -> ApiPlayer {
        let player = ApiPlayer {
            name: name.to_string(),
            uuid: uuid.to_string(),
            position: (0.5, 100.0, 0.5),
            gamemode: 0,
        };
        self.players.insert(uuid.to_string(), player.clone());
        player
    }

    pub fn quit(&mut self, uuid: &str) -> ApiPlayer {
        self.players.remove(uuid).expect("player not online")
    }

    pub fn block(&self, x: i32, y: i32, z: i32) -> &str {
        self.blocks
            .get(&(x, y, z))
            .map(String::as_str)
            .unwrap_or("minecraft:air")
    }

    pub fn put_block(&mut self, x: i32, y: i32, z: i32, block_type: &str) {
        self.blocks.insert((x, y, z), block_type.to_string());
    }

    pub fn messages_for(&self, uuid: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(to, _)| to == uuid)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    pub fn repeating_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !t.cancelled && t.interval.is_some())
            .count()
    }

    /// Advance one tick: fire every due task into the plugin.
    pub fn tick(&mut self, plugin: &mut dyn Plugin) {
        let mut due = Vec::new();
        for task in &mut self.tasks {
            if task.cancelled {
                continue;
            }
            task.remaining = task.remaining.saturating_sub(1);
            if task.remaining == 0 {
                due.push(task.id);
                match task.interval {
                    Some(interval) => task.remaining = interval,
                    None => task.cancelled = true, // consumed
                }
            }
        }
        for id in due {
            plugin.on_task(id, self);
        }
        self.tasks.retain(|t| !t.cancelled);
    }

    pub fn run_ticks(&mut self, plugin: &mut dyn Plugin, ticks: u64) {
        for _ in 0..ticks {
            self.tick(plugin);
        }
    }
}

impl ServerApi for TestHost {
    fn get_player(&self, uuid: &str) -> Option<ApiPlayer> {
        self.players.get(uuid).cloned()
    }
    fn online_players(&self) -> Vec<ApiPlayer> {
        self.players.values().cloned().collect()
    }
    fn send_message(&mut self, uuid: &str, message: &str) {
        self.messages.push((uuid.to_string(), message.to_string()));
    }
    fn teleport_player(&mut self, uuid: &str, x: f32, y: f32, z: f32) {
        if let Some(player) = self.players.get_mut(uuid) {
            player.position = (x, y, z);
        }
        self.teleports.push((uuid.to_string(), x, y, z));
    }
    fn clear_inventory(&mut self, _uuid: &str) {}
    fn set_inventory_item(&mut self, _uuid: &str, _slot: u32, _item: &str) {}
    fn clear_effects(&mut self, _uuid: &str) {}
    fn apply_effect(&mut self, _uuid: &str, _effect: &str, _amplifier: i32, _duration: i32) {}
    fn set_gamemode(&mut self, _uuid: &str, _gamemode: i32) {}
    fn strike_lightning(&mut self, x: f32, y: f32, z: f32) {
        self.lightning.push((x, y, z));
    }
    fn get_block_type(&self, x: i32, y: i32, z: i32) -> Option<String> {
        Some(self.block(x, y, z).to_string())
    }
    fn set_block_type(&mut self, x: i32, y: i32, z: i32, block_type: &str) -> bool {
        self.blocks.insert((x, y, z), block_type.to_string());
        true
    }
    fn schedule_delayed(&mut self, delay_ticks: u64, task_id: u32) {
        self.tasks.push(HostTask {
            id: task_id,
            remaining: delay_ticks.max(1),
            interval: None,
            cancelled: false,
        });
    }
    fn schedule_repeating(&mut self, delay_ticks: u64, interval_ticks: u64, task_id: u32) {
        self.tasks.push(HostTask {
            id: task_id,
            remaining: delay_ticks.max(1),
            interval: Some(interval_ticks.max(1)),
            cancelled: false,
        });
    }
    fn cancel_task(&mut self, task_id: u32) {
        for task in &mut self.tasks {
            if task.id == task_id {
                task.cancelled = true;
            }
        }
    }
    fn show_form(&mut self, uuid: &str, _title: &str, buttons: &[String], form_id: u32) {
        self.forms.push((uuid.to_string(), buttons.to_vec(), form_id));
    }
    fn register_command(&mut self, name: &str, description: &str) {
        self.commands
            .push((name.to_string(), description.to_string()));
    }
}
