//! Server configuration.
//!
//! Parsed from `server_config.toml` with environment-variable overrides
//! applied afterwards, so deployments tweak single values without editing
//! the file. A missing file yields the documented defaults.

use std::env;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub websocket_path: String,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: "0.0.0.0".to_string(),
            port: 8000,
            websocket_path: "/ws".to_string(),
            log_level: "info".to_string(),
            log_file: Some("server.log".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameSection {
    /// Client-side tile size in pixels; carried in the config for parity
    /// with the client's file, unused by server logic.
    pub tile_size: u32,
    pub chunk_size: u32,
    /// Seconds between accepted moves per session.
    pub move_cooldown: f64,
    /// Client-side interpolation duration in seconds.
    pub move_duration: f64,
}

impl Default for GameSection {
    fn default() -> Self {
        GameSection {
            tile_size: 32,
            chunk_size: 16,
            move_cooldown: 0.15,
            move_duration: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickSection {
    pub hot_hz: u32,
    pub warm_hz: u32,
}

impl Default for TickSection {
    fn default() -> Self {
        TickSection {
            hot_hz: 20,
            warm_hz: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub enabled: bool,
    /// Minimum ticks between wander steps.
    pub wander_interval: u64,
    /// Minimum ticks between chase steps.
    pub chase_interval: u64,
    /// Minimum ticks between entity attacks.
    pub attack_interval: u64,
    /// Idle duration is rolled uniformly from [idle_min, idle_max] ticks.
    pub idle_min: u64,
    pub idle_max: u64,
    /// Ticks without line of sight before a combat entity gives up.
    pub los_timeout: u64,
    pub max_pathfinding_distance: u32,
}

impl Default for AiSection {
    fn default() -> Self {
        AiSection {
            enabled: true,
            wander_interval: 10,
            chase_interval: 5,
            attack_interval: 40,
            idle_min: 40,
            idle_max: 200,
            los_timeout: 100,
            max_pathfinding_distance: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub global_enabled: bool,
    pub global_allowed_roles: Vec<String>,
    pub max_message_length_local: usize,
    pub max_message_length_global: usize,
    pub max_message_length_dm: usize,
    /// Local chat reaches players within `local_chunk_radius * 16` tiles.
    pub local_chunk_radius: i32,
}

impl Default for ChatSection {
    fn default() -> Self {
        ChatSection {
            global_enabled: true,
            global_allowed_roles: vec![
                "player".to_string(),
                "moderator".to_string(),
                "admin".to_string(),
            ],
            max_message_length_local: 280,
            max_message_length_global: 200,
            max_message_length_dm: 500,
            local_chunk_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: "game.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotStoreSection {
    pub url: String,
}

impl Default for HotStoreSection {
    fn default() -> Self {
        HotStoreSection {
            url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapsSection {
    pub dir: String,
    /// Interest-management radius in chunks; the visible range is
    /// `(chunk_radius + 1) * 16` tiles on each axis.
    pub chunk_radius: i32,
}

impl Default for MapsSection {
    fn default() -> Self {
        MapsSection {
            dir: "maps".to_string(),
            chunk_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub game: GameSection,
    pub tick: TickSection,
    pub ai: AiSection,
    pub chat: ChatSection,
    pub database: DatabaseSection,
    pub hot_store: HotStoreSection,
    pub maps: MapsSection,
}

impl ServerConfig {
    /// Load from a TOML file, then apply environment overrides. A missing
    /// file is not an error; a malformed one is.
    pub fn load(path: &Path) -> Result<ServerConfig, String> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("read config {}: {e}", path.display()))?;
            toml::from_str(&raw).map_err(|e| format!("parse config {}: {e}", path.display()))?
        } else {
            ServerConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("RPG_SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("RPG_SERVER_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = env::var("RPG_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = env::var("RPG_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Ok(v) = env::var("RPG_KEYDB_URL") {
            self.hot_store.url = v;
        }
        if let Ok(v) = env::var("RPG_MAPS_DIR") {
            self.maps.dir = v;
        }
        if let Ok(v) = env::var("RPG_AI_ENABLED") {
            self.ai.enabled = matches!(v.to_lowercase().as_str(), "true" | "1" | "yes");
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.tick.hot_hz == 0 || self.tick.warm_hz == 0 {
            return Err("tick rates must be non-zero".to_string());
        }
        if self.tick.warm_hz > self.tick.hot_hz {
            return Err("warm_hz cannot exceed hot_hz".to_string());
        }
        if self.ai.idle_min > self.ai.idle_max {
            return Err("ai.idle_min cannot exceed ai.idle_max".to_string());
        }
        Ok(())
    }

    /// Move cooldown expressed in hot ticks, rounded up so a cooldown can
    /// never be shorter than configured.
    pub fn move_cooldown_ticks(&self) -> u64 {
        (self.game.move_cooldown * f64::from(self.tick.hot_hz)).ceil() as u64
    }

    /// Hot ticks per warm tick.
    pub fn warm_tick_divisor(&self) -> u64 {
        u64::from(self.tick.hot_hz / self.tick.warm_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.tick.hot_hz, 20);
        assert_eq!(config.tick.warm_hz, 5);
        assert_eq!(config.game.chunk_size, 16);
        assert_eq!(config.chat.max_message_length_local, 280);
        assert_eq!(config.chat.max_message_length_global, 200);
        assert_eq!(config.chat.max_message_length_dm, 500);
    }

    #[test]
    fn test_parse_partial_toml() {
        let raw = r#"
            [server]
            port = 9001

            [ai]
            enabled = false
            wander_interval = 25
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9001);
        assert!(!config.ai.enabled);
        assert_eq!(config.ai.wander_interval, 25);
        // Untouched sections keep defaults.
        assert_eq!(config.tick.hot_hz, 20);
    }

    #[test]
    fn test_cooldown_ticks_round_up() {
        let config = ServerConfig::default();
        // 0.15s at 20 Hz is 3 ticks.
        assert_eq!(config.move_cooldown_ticks(), 3);
    }

    #[test]
    fn test_warm_divisor() {
        let config = ServerConfig::default();
        assert_eq!(config.warm_tick_divisor(), 4);
    }
}
