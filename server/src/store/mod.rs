//! Hot-tier state store over Redis/KeyDB.
//!
//! Owns all cross-session runtime state: positions, vitals, the online set,
//! entity instances, ground items, the respawn queue, and auth tokens.
//! Records are Redis hashes written whole (hash-set semantics), so readers
//! never observe torn writes; small immutable sidecar records are
//! bincode-encoded blobs. Every write refreshes the record TTL.
//!
//! Key namespaces:
//! - `player:{id}`               — player runtime hash
//! - `online_players`            — set of online player ids
//! - `map_players:{map_id}`      — per-map player membership set
//! - `entity_instance:{id}`      — entity instance hash (incl. AI pacing)
//! - `map_entities:{map_id}`     — per-map entity membership set
//! - `entity_instance_counter`   — atomic instance id counter
//! - `entity_respawn_queue`      — zset scored by respawn-due tick
//! - `entity_respawn:{id}`       — bincode respawn sidecar
//! - `ground_item:{id}`          — bincode ground item
//! - `map_ground_items:{map_id}` — per-map ground item set
//! - `ground_item_counter`       — atomic ground item id counter
//! - `auth_token:{token}`        — bearer token -> player id

pub mod entities;
pub mod ground;
pub mod players;
pub mod tokens;

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

/// TTL for hot keys. Long enough that a quiescent session is never evicted;
/// refreshed on every write.
pub const HOT_TTL_SECS: i64 = 1800;

/// Per-call socket timeout on store operations.
const STORE_TIMEOUT: Duration = Duration::from_secs(2);

pub const ONLINE_PLAYERS_KEY: &str = "online_players";
pub const ENTITY_COUNTER_KEY: &str = "entity_instance_counter";
pub const RESPAWN_QUEUE_KEY: &str = "entity_respawn_queue";
pub const GROUND_COUNTER_KEY: &str = "ground_item_counter";

pub fn player_key(player_id: i64) -> String {
    format!("player:{player_id}")
}

pub fn map_players_key(map_id: &str) -> String {
    format!("map_players:{map_id}")
}

pub fn entity_key(instance_id: u64) -> String {
    format!("entity_instance:{instance_id}")
}

pub fn map_entities_key(map_id: &str) -> String {
    format!("map_entities:{map_id}")
}

pub fn respawn_key(instance_id: u64) -> String {
    format!("entity_respawn:{instance_id}")
}

pub fn ground_item_key(ground_item_id: u64) -> String {
    format!("ground_item:{ground_item_id}")
}

pub fn map_ground_items_key(map_id: &str) -> String {
    format!("map_ground_items:{map_id}")
}

pub fn auth_token_key(token: &str) -> String {
    format!("auth_token:{token}")
}

/// Synchronous Redis connection shared across worker threads.
pub struct StateStore {
    conn: Mutex<redis::Connection>,
}

impl StateStore {
    /// Open a connection with per-call timeouts applied.
    pub fn connect(url: &str) -> Result<StateStore, String> {
        let client = redis::Client::open(url)
            .map_err(|e| format!("Failed to open hot store client: {e}"))?;
        let conn = client
            .get_connection()
            .map_err(|e| format!("Failed to connect to hot store: {e}"))?;
        conn.set_read_timeout(Some(STORE_TIMEOUT))
            .map_err(|e| format!("Failed to set hot store read timeout: {e}"))?;
        conn.set_write_timeout(Some(STORE_TIMEOUT))
            .map_err(|e| format!("Failed to set hot store write timeout: {e}"))?;
        Ok(StateStore {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against the shared connection, mapping driver errors into the
    /// store's string error space.
    pub(crate) fn with_conn<R>(
        &self,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<R>,
    ) -> Result<R, String> {
        let mut guard = self.conn.lock();
        f(&mut guard).map_err(|e| format!("hot store: {e}"))
    }
}

// ---------------------------------------------------------------------------
//  Hash record helpers
// ---------------------------------------------------------------------------

pub(crate) fn hash_str(map: &HashMap<String, String>, field: &str) -> Option<String> {
    map.get(field).cloned()
}

pub(crate) fn hash_i32(map: &HashMap<String, String>, field: &str) -> Option<i32> {
    map.get(field).and_then(|v| v.parse().ok())
}

pub(crate) fn hash_i64(map: &HashMap<String, String>, field: &str) -> Option<i64> {
    map.get(field).and_then(|v| v.parse().ok())
}

pub(crate) fn hash_u32(map: &HashMap<String, String>, field: &str) -> Option<u32> {
    map.get(field).and_then(|v| v.parse().ok())
}

pub(crate) fn hash_u64(map: &HashMap<String, String>, field: &str) -> Option<u64> {
    map.get(field).and_then(|v| v.parse().ok())
}

pub(crate) fn hash_bool(map: &HashMap<String, String>, field: &str) -> Option<bool> {
    map.get(field).map(|v| v == "1" || v == "true")
}

/// Encode an optional value as a hash field: empty string means absent.
pub(crate) fn opt_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn hash_opt_i64(map: &HashMap<String, String>, field: &str) -> Option<i64> {
    map.get(field)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}

pub(crate) fn hash_opt_u64(map: &HashMap<String, String>, field: &str) -> Option<u64> {
    map.get(field)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
}
