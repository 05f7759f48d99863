//! Plugin configuration: lobby spawn, arenas, and kits.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub lobby_spawn: SpawnPoint,
    #[serde(default)]
    pub maps: Vec<MapEntry>,
    #[serde(default)]
    pub kits: Vec<KitEntry>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// An arena map. `maps[i]` pairs with `kits[i]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MapEntry {
    pub name: String,
    pub creator: String,
    pub spawn: SpawnPoint,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KitEntry {
    pub name: String,
    pub creator: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
}

fn default_max_players() -> u32 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lobby_spawn: SpawnPoint {
                x: 0.5,
                y: 100.0,
                z: 0.5,
            },
            maps: vec![MapEntry {
                name: "Diamond Arena".into(),
                creator: "Admin".into(),
                spawn: SpawnPoint {
                    x: 100.5,
                    y: 64.0,
                    z: 100.5,
                },
            }],
            kits: vec![KitEntry {
                name: "Diamond SMP".into(),
                creator: "Admin".into(),
                max_players: default_max_players(),
            }],
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load the config, writing the default one first when the file is
    /// missing (first run).
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&config)?)?;
            return Ok(config);
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config() {
        let toml_str = r#"
            [lobby_spawn]
            x = 0.5
            y = 100.0
            z = 0.5

            [[maps]]
            name = "Obsidian Pit"
            creator = "Staff"
            spawn = { x = 200.0, y = 70.0, z = -40.0 }

            [[kits]]
            name = "Netherite Duel"
            creator = "Staff"
            max_players = 2

            [[kits]]
            name = "Open Brawl"
            creator = "Staff"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.maps.len(), 1);
        assert_eq!(config.maps[0].name, "Obsidian Pit");
        assert_eq!(config.maps[0].spawn.z, -40.0);
        assert_eq!(config.kits[0].max_players, 2);
        assert_eq!(config.kits[1].max_players, 8); // default
    }

    #[test]
    fn parse_minimal_config() {
        let config: Config = toml::from_str("[lobby_spawn]\nx = 0.0\ny = 64.0\nz = 0.0\n").unwrap();
        assert!(config.maps.is_empty());
        assert!(config.kits.is_empty());
    }

    #[test]
    fn load_or_create_writes_default() {
        let dir =
            std::env::temp_dir().join(format!("fortress_config_test_{}", rand::random::<u64>()));
        let path = dir.join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.kits.len(), 1);

        // Second load reads the written file back.
        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded.maps[0].name, created.maps[0].name);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
