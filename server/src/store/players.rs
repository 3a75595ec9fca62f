//! Player runtime records and the online/per-map membership sets.

use std::collections::HashMap;

use common::direction::Direction;
use redis::Commands;

use super::{
    hash_bool, hash_i32, hash_i64, hash_str, map_players_key, player_key, StateStore,
    HOT_TTL_SECS, ONLINE_PLAYERS_KEY,
};

/// Hot-tier copy of a player's runtime state. The previous position is kept
/// for delta computation by the broadcast pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRuntime {
    pub player_id: i64,
    pub username: String,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
    pub current_hp: i32,
    pub max_hp: i32,
    pub auto_retaliate: bool,
    pub prev_x: i32,
    pub prev_y: i32,
}

impl PlayerRuntime {
    fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("player_id", self.player_id.to_string()),
            ("username", self.username.clone()),
            ("map_id", self.map_id.clone()),
            ("x", self.x.to_string()),
            ("y", self.y.to_string()),
            ("facing", self.facing.as_str().to_string()),
            ("current_hp", self.current_hp.to_string()),
            ("max_hp", self.max_hp.to_string()),
            ("auto_retaliate", if self.auto_retaliate { "1" } else { "0" }.to_string()),
            ("prev_x", self.prev_x.to_string()),
            ("prev_y", self.prev_y.to_string()),
        ]
    }

    fn from_hash(map: &HashMap<String, String>) -> Option<PlayerRuntime> {
        if map.is_empty() {
            return None;
        }
        Some(PlayerRuntime {
            player_id: hash_i64(map, "player_id")?,
            username: hash_str(map, "username")?,
            map_id: hash_str(map, "map_id")?,
            x: hash_i32(map, "x")?,
            y: hash_i32(map, "y")?,
            facing: hash_str(map, "facing")
                .and_then(|s| Direction::from_str(&s))
                .unwrap_or(Direction::South),
            current_hp: hash_i32(map, "current_hp")?,
            max_hp: hash_i32(map, "max_hp")?,
            auto_retaliate: hash_bool(map, "auto_retaliate").unwrap_or(true),
            prev_x: hash_i32(map, "prev_x").unwrap_or(0),
            prev_y: hash_i32(map, "prev_y").unwrap_or(0),
        })
    }
}

impl StateStore {
    /// Add a player to the online set and write their runtime record.
    /// Idempotent: returns `false` when the player was already online, and
    /// leaves the existing record untouched in that case.
    pub fn register_online(&self, player: &PlayerRuntime) -> Result<bool, String> {
        self.with_conn(|con| {
            let newly_added: i64 = con.sadd(ONLINE_PLAYERS_KEY, player.player_id)?;
            if newly_added == 0 {
                return Ok(false);
            }
            let key = player_key(player.player_id);
            let mut pipeline = redis::pipe();
            pipeline
                .hset_multiple(&key, &player.to_fields())
                .ignore()
                .expire(&key, HOT_TTL_SECS)
                .ignore()
                .sadd(map_players_key(&player.map_id), player.player_id)
                .ignore()
                .expire(map_players_key(&player.map_id), HOT_TTL_SECS)
                .ignore();
            pipeline.query::<()>(con)?;
            Ok(true)
        })
    }

    /// Remove a player from the online set and drop their runtime record.
    /// Idempotent; returns the final runtime state if one existed.
    pub fn unregister_online(&self, player_id: i64) -> Result<Option<PlayerRuntime>, String> {
        let runtime = self.get_player(player_id)?;
        self.with_conn(|con| {
            let mut pipeline = redis::pipe();
            pipeline
                .srem(ONLINE_PLAYERS_KEY, player_id)
                .ignore()
                .del(player_key(player_id))
                .ignore();
            if let Some(ref rt) = runtime {
                pipeline.srem(map_players_key(&rt.map_id), player_id).ignore();
            }
            pipeline.query::<()>(con)
        })?;
        Ok(runtime)
    }

    pub fn get_player(&self, player_id: i64) -> Result<Option<PlayerRuntime>, String> {
        let map: HashMap<String, String> =
            self.with_conn(|con| con.hgetall(player_key(player_id)))?;
        Ok(PlayerRuntime::from_hash(&map))
    }

    /// Write position and facing, recording the previous position and
    /// moving per-map membership when the map changed.
    pub fn set_player_position(
        &self,
        player_id: i64,
        x: i32,
        y: i32,
        map_id: &str,
        facing: Direction,
    ) -> Result<(), String> {
        let Some(current) = self.get_player(player_id)? else {
            return Err(format!("player {player_id} has no runtime record"));
        };
        let key = player_key(player_id);
        self.with_conn(|con| {
            let mut pipeline = redis::pipe();
            pipeline
                .hset_multiple(
                    &key,
                    &[
                        ("x", x.to_string()),
                        ("y", y.to_string()),
                        ("map_id", map_id.to_string()),
                        ("facing", facing.as_str().to_string()),
                        ("prev_x", current.x.to_string()),
                        ("prev_y", current.y.to_string()),
                    ],
                )
                .ignore()
                .expire(&key, HOT_TTL_SECS)
                .ignore();
            if current.map_id != map_id {
                pipeline
                    .srem(map_players_key(&current.map_id), player_id)
                    .ignore()
                    .sadd(map_players_key(map_id), player_id)
                    .ignore()
                    .expire(map_players_key(map_id), HOT_TTL_SECS)
                    .ignore();
            }
            pipeline.query::<()>(con)
        })
    }

    pub fn set_player_hp(&self, player_id: i64, current_hp: i32, max_hp: i32) -> Result<(), String> {
        let key = player_key(player_id);
        self.with_conn(|con| {
            redis::pipe()
                .hset_multiple(
                    &key,
                    &[
                        ("current_hp", current_hp.to_string()),
                        ("max_hp", max_hp.to_string()),
                    ],
                )
                .ignore()
                .expire(&key, HOT_TTL_SECS)
                .ignore()
                .query::<()>(con)
        })
    }

    pub fn set_auto_retaliate(&self, player_id: i64, enabled: bool) -> Result<(), String> {
        let key = player_key(player_id);
        self.with_conn(|con| {
            redis::pipe()
                .hset(&key, "auto_retaliate", if enabled { "1" } else { "0" })
                .ignore()
                .expire(&key, HOT_TTL_SECS)
                .ignore()
                .query::<()>(con)
        })
    }

    /// All online players on a map. Stale membership entries (expired
    /// record) are pruned as they are discovered.
    pub fn players_on_map(&self, map_id: &str) -> Result<Vec<PlayerRuntime>, String> {
        let ids: Vec<i64> = self.with_conn(|con| con.smembers(map_players_key(map_id)))?;
        let mut players = Vec::with_capacity(ids.len());
        for player_id in ids {
            match self.get_player(player_id)? {
                Some(rt) if rt.map_id == map_id => players.push(rt),
                _ => {
                    self.with_conn(|con| con.srem(map_players_key(map_id), player_id))
                        .map(|_: i64| ())?;
                }
            }
        }
        Ok(players)
    }

    /// Players within `range` tiles of the given player on both axes,
    /// excluding the player themselves.
    pub fn nearby_players(
        &self,
        player_id: i64,
        range: i32,
    ) -> Result<Vec<PlayerRuntime>, String> {
        let Some(center) = self.get_player(player_id)? else {
            return Ok(Vec::new());
        };
        let mut nearby = self.players_on_map(&center.map_id)?;
        nearby.retain(|p| {
            p.player_id != player_id
                && (p.x - center.x).abs() <= range
                && (p.y - center.y).abs() <= range
        });
        Ok(nearby)
    }
}
