//! Entity instance records, per-map membership, and the respawn queue.
//!
//! AI pacing state (idle timer, wander target, last-action ticks) lives in
//! the instance record itself, so its lifecycle mirrors the entity's and
//! there is no side table to keep in sync.

use std::collections::HashMap;

use bincode::{Decode, Encode};
use redis::Commands;

use crate::entities::EntityState;

use super::{
    entity_key, hash_i32, hash_opt_i64, hash_opt_u64, hash_str, hash_u32, hash_u64,
    map_entities_key, opt_field, respawn_key, StateStore, ENTITY_COUNTER_KEY, HOT_TTL_SECS,
    RESPAWN_QUEUE_KEY,
};

/// One live entity on a map. Ephemeral: exists only in the hot store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInstance {
    pub instance_id: u64,
    pub template_name: String,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub state: EntityState,
    pub target_player_id: Option<i64>,
    pub wander_radius: i32,
    pub aggro_radius: i32,
    pub disengage_radius: i32,
    pub spawn_point_id: u32,
    /// Seconds until respawn after death.
    pub respawn_time: u32,
    pub los_lost_at_tick: Option<u64>,
    /// Tick at which the entity entered `dying`.
    pub death_tick: Option<u64>,

    // AI pacing state.
    pub idle_timer: u64,
    pub wander_target: Option<(i32, i32)>,
    pub last_move_tick: u64,
    pub last_attack_tick: u64,
    pub last_aggro_check_tick: u64,
}

impl EntityInstance {
    fn to_fields(&self) -> Vec<(&'static str, String)> {
        let (wander_x, wander_y) = match self.wander_target {
            Some((x, y)) => (x.to_string(), y.to_string()),
            None => (String::new(), String::new()),
        };
        vec![
            ("instance_id", self.instance_id.to_string()),
            ("template_name", self.template_name.clone()),
            ("map_id", self.map_id.clone()),
            ("x", self.x.to_string()),
            ("y", self.y.to_string()),
            ("spawn_x", self.spawn_x.to_string()),
            ("spawn_y", self.spawn_y.to_string()),
            ("current_hp", self.current_hp.to_string()),
            ("max_hp", self.max_hp.to_string()),
            ("state", self.state.as_str().to_string()),
            ("target_player_id", opt_field(self.target_player_id)),
            ("wander_radius", self.wander_radius.to_string()),
            ("aggro_radius", self.aggro_radius.to_string()),
            ("disengage_radius", self.disengage_radius.to_string()),
            ("spawn_point_id", self.spawn_point_id.to_string()),
            ("respawn_time", self.respawn_time.to_string()),
            ("los_lost_at_tick", opt_field(self.los_lost_at_tick)),
            ("death_tick", opt_field(self.death_tick)),
            ("idle_timer", self.idle_timer.to_string()),
            ("wander_x", wander_x),
            ("wander_y", wander_y),
            ("last_move_tick", self.last_move_tick.to_string()),
            ("last_attack_tick", self.last_attack_tick.to_string()),
            ("last_aggro_check_tick", self.last_aggro_check_tick.to_string()),
        ]
    }

    fn from_hash(map: &HashMap<String, String>) -> Option<EntityInstance> {
        if map.is_empty() {
            return None;
        }
        let wander_target = match (
            map.get("wander_x").filter(|v| !v.is_empty()),
            map.get("wander_y").filter(|v| !v.is_empty()),
        ) {
            (Some(x), Some(y)) => Some((x.parse().ok()?, y.parse().ok()?)),
            _ => None,
        };
        Some(EntityInstance {
            instance_id: hash_u64(map, "instance_id")?,
            template_name: hash_str(map, "template_name")?,
            map_id: hash_str(map, "map_id")?,
            x: hash_i32(map, "x")?,
            y: hash_i32(map, "y")?,
            spawn_x: hash_i32(map, "spawn_x")?,
            spawn_y: hash_i32(map, "spawn_y")?,
            current_hp: hash_i32(map, "current_hp")?,
            max_hp: hash_i32(map, "max_hp")?,
            state: hash_str(map, "state")
                .and_then(|s| EntityState::from_str(&s))
                .unwrap_or(EntityState::Idle),
            target_player_id: hash_opt_i64(map, "target_player_id"),
            wander_radius: hash_i32(map, "wander_radius").unwrap_or(0),
            aggro_radius: hash_i32(map, "aggro_radius").unwrap_or(0),
            disengage_radius: hash_i32(map, "disengage_radius").unwrap_or(0),
            spawn_point_id: hash_u32(map, "spawn_point_id").unwrap_or(0),
            respawn_time: hash_u32(map, "respawn_time").unwrap_or(30),
            los_lost_at_tick: hash_opt_u64(map, "los_lost_at_tick"),
            death_tick: hash_opt_u64(map, "death_tick"),
            idle_timer: hash_u64(map, "idle_timer").unwrap_or(0),
            wander_target,
            last_move_tick: hash_u64(map, "last_move_tick").unwrap_or(0),
            last_attack_tick: hash_u64(map, "last_attack_tick").unwrap_or(0),
            last_aggro_check_tick: hash_u64(map, "last_aggro_check_tick").unwrap_or(0),
        })
    }
}

/// Everything needed to re-materialize an entity after death. Stored as a
/// bincode blob alongside the respawn queue entry.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct RespawnRecord {
    pub instance_id: u64,
    pub template_name: String,
    pub map_id: String,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub spawn_point_id: u32,
    pub wander_radius: i32,
    pub aggro_radius: i32,
    pub disengage_radius: i32,
    pub respawn_time: u32,
    pub max_hp: i32,
    pub death_tick: u64,
}

impl StateStore {
    /// Allocate a new instance id and write the record. Ids are monotonic
    /// via the atomic counter.
    pub fn spawn_entity_instance(
        &self,
        mut instance: EntityInstance,
    ) -> Result<EntityInstance, String> {
        let instance_id: u64 = self.with_conn(|con| con.incr(ENTITY_COUNTER_KEY, 1u64))?;
        instance.instance_id = instance_id;
        self.write_entity(&instance)?;
        Ok(instance)
    }

    /// Full-record write plus membership and TTL refresh.
    pub fn write_entity(&self, instance: &EntityInstance) -> Result<(), String> {
        let key = entity_key(instance.instance_id);
        let map_key = map_entities_key(&instance.map_id);
        let fields = instance.to_fields();
        self.with_conn(|con| {
            redis::pipe()
                .hset_multiple(&key, &fields)
                .ignore()
                .expire(&key, HOT_TTL_SECS)
                .ignore()
                .sadd(&map_key, instance.instance_id)
                .ignore()
                .expire(&map_key, HOT_TTL_SECS)
                .ignore()
                .query::<()>(con)
        })
    }

    pub fn get_entity(&self, instance_id: u64) -> Result<Option<EntityInstance>, String> {
        let map: HashMap<String, String> =
            self.with_conn(|con| con.hgetall(entity_key(instance_id)))?;
        Ok(EntityInstance::from_hash(&map))
    }

    /// All live entity records on a map, pruning stale membership entries.
    pub fn map_entities(&self, map_id: &str) -> Result<Vec<EntityInstance>, String> {
        let ids: Vec<u64> = self.with_conn(|con| con.smembers(map_entities_key(map_id)))?;
        let mut entities = Vec::with_capacity(ids.len());
        for instance_id in ids {
            match self.get_entity(instance_id)? {
                Some(e) => entities.push(e),
                None => {
                    self.with_conn(|con| con.srem(map_entities_key(map_id), instance_id))
                        .map(|_: i64| ())?;
                }
            }
        }
        entities.sort_by_key(|e| e.instance_id);
        Ok(entities)
    }

    /// Move a dead entity out of the active set and into the respawn queue,
    /// scored by the tick at which it becomes due.
    pub fn despawn_entity(
        &self,
        instance: &EntityInstance,
        death_tick: u64,
        respawn_at_tick: u64,
    ) -> Result<(), String> {
        let record = RespawnRecord {
            instance_id: instance.instance_id,
            template_name: instance.template_name.clone(),
            map_id: instance.map_id.clone(),
            spawn_x: instance.spawn_x,
            spawn_y: instance.spawn_y,
            spawn_point_id: instance.spawn_point_id,
            wander_radius: instance.wander_radius,
            aggro_radius: instance.aggro_radius,
            disengage_radius: instance.disengage_radius,
            respawn_time: instance.respawn_time,
            max_hp: instance.max_hp,
            death_tick,
        };
        let blob = bincode::encode_to_vec(&record, bincode::config::standard())
            .map_err(|e| format!("encode respawn record: {e}"))?;

        let key = entity_key(instance.instance_id);
        let map_key = map_entities_key(&instance.map_id);
        let sidecar = respawn_key(instance.instance_id);
        self.with_conn(|con| {
            redis::pipe()
                .del(&key)
                .ignore()
                .srem(&map_key, instance.instance_id)
                .ignore()
                .zadd(RESPAWN_QUEUE_KEY, instance.instance_id, respawn_at_tick)
                .ignore()
                .set_ex(&sidecar, blob.as_slice(), HOT_TTL_SECS as u64)
                .ignore()
                .query::<()>(con)
        })
    }

    /// Range query on the respawn queue: entries due at or before `now_tick`
    /// for the given map are removed from the queue and returned. Entries
    /// whose sidecar record has vanished are dropped.
    pub fn pop_ready_respawns(
        &self,
        map_id: &str,
        now_tick: u64,
    ) -> Result<Vec<RespawnRecord>, String> {
        let due: Vec<u64> = self.with_conn(|con| {
            con.zrangebyscore(RESPAWN_QUEUE_KEY, 0u64, now_tick)
        })?;

        let mut ready = Vec::new();
        for instance_id in due {
            let sidecar = respawn_key(instance_id);
            let blob: Option<Vec<u8>> = self.with_conn(|con| con.get(&sidecar))?;
            let Some(blob) = blob else {
                log::warn!("Respawn entry {instance_id} has no sidecar record; dropping");
                self.with_conn(|con| con.zrem(RESPAWN_QUEUE_KEY, instance_id))
                    .map(|_: i64| ())?;
                continue;
            };
            let (record, _): (RespawnRecord, usize) =
                bincode::decode_from_slice(&blob, bincode::config::standard())
                    .map_err(|e| format!("decode respawn record {instance_id}: {e}"))?;
            if record.map_id != map_id {
                continue;
            }
            self.with_conn(|con| {
                redis::pipe()
                    .zrem(RESPAWN_QUEUE_KEY, instance_id)
                    .ignore()
                    .del(&sidecar)
                    .ignore()
                    .query::<()>(con)
            })?;
            ready.push(record);
        }
        Ok(ready)
    }

    /// Entities currently targeting a player, across the given maps.
    pub fn entities_targeting_player(
        &self,
        map_ids: &[String],
        player_id: i64,
    ) -> Result<Vec<EntityInstance>, String> {
        let mut targeting = Vec::new();
        for map_id in map_ids {
            for entity in self.map_entities(map_id)? {
                if entity.target_player_id == Some(player_id) {
                    targeting.push(entity);
                }
            }
        }
        Ok(targeting)
    }

    /// Drop all entity state (instances, membership, respawn queue). Used on
    /// startup so spawn points repopulate from a clean slate, and on
    /// shutdown.
    pub fn clear_all_entities(&self, map_ids: &[String]) -> Result<(), String> {
        for map_id in map_ids {
            let ids: Vec<u64> =
                self.with_conn(|con| con.smembers(map_entities_key(map_id)))?;
            self.with_conn(|con| {
                let mut pipeline = redis::pipe();
                for instance_id in &ids {
                    pipeline.del(entity_key(*instance_id)).ignore();
                    pipeline.del(respawn_key(*instance_id)).ignore();
                }
                pipeline.del(map_entities_key(map_id)).ignore();
                pipeline.query::<()>(con)
            })?;
        }
        self.with_conn(|con| con.del::<_, ()>(RESPAWN_QUEUE_KEY))?;
        Ok(())
    }
}
