//! Ground items: dropped stacks with a loot-protection window and a TTL
//! despawn. Records are bincode blobs with a per-map membership set.

use bincode::{Decode, Encode};
use redis::Commands;

use super::{
    ground_item_key, map_ground_items_key, StateStore, GROUND_COUNTER_KEY, HOT_TTL_SECS,
};

/// Seconds before a dropped item despawns.
pub const GROUND_ITEM_TTL_SECS: u64 = 300;

/// Seconds during which only the dropper may pick an item back up.
pub const LOOT_PROTECTION_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct GroundItem {
    pub ground_item_id: u64,
    pub item_name: String,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub quantity: u32,
    pub dropper_player_id: Option<i64>,
    pub drop_tick: u64,
    /// Tick after which anyone may pick the item up.
    pub protection_expires_tick: u64,
}

impl GroundItem {
    pub fn is_protected_at(&self, tick: u64) -> bool {
        tick < self.protection_expires_tick
    }

    /// Whether `player_id` may pick this item up at `tick`.
    pub fn can_pickup(&self, player_id: i64, tick: u64) -> bool {
        !self.is_protected_at(tick) || self.dropper_player_id == Some(player_id)
    }
}

impl StateStore {
    /// Write a new ground item and return it with its allocated id.
    pub fn drop_ground_item(&self, mut item: GroundItem) -> Result<GroundItem, String> {
        let ground_item_id: u64 = self.with_conn(|con| con.incr(GROUND_COUNTER_KEY, 1u64))?;
        item.ground_item_id = ground_item_id;

        let blob = bincode::encode_to_vec(&item, bincode::config::standard())
            .map_err(|e| format!("encode ground item: {e}"))?;
        let key = ground_item_key(ground_item_id);
        let map_key = map_ground_items_key(&item.map_id);
        self.with_conn(|con| {
            redis::pipe()
                .set_ex(&key, blob.as_slice(), GROUND_ITEM_TTL_SECS)
                .ignore()
                .sadd(&map_key, ground_item_id)
                .ignore()
                .expire(&map_key, HOT_TTL_SECS)
                .ignore()
                .query::<()>(con)
        })?;
        Ok(item)
    }

    pub fn get_ground_item(&self, ground_item_id: u64) -> Result<Option<GroundItem>, String> {
        let blob: Option<Vec<u8>> =
            self.with_conn(|con| con.get(ground_item_key(ground_item_id)))?;
        match blob {
            None => Ok(None),
            Some(blob) => {
                let (item, _): (GroundItem, usize) =
                    bincode::decode_from_slice(&blob, bincode::config::standard())
                        .map_err(|e| format!("decode ground item {ground_item_id}: {e}"))?;
                Ok(Some(item))
            }
        }
    }

    /// Remove a ground item (picked up or despawned).
    pub fn remove_ground_item(&self, ground_item_id: u64, map_id: &str) -> Result<(), String> {
        self.with_conn(|con| {
            redis::pipe()
                .del(ground_item_key(ground_item_id))
                .ignore()
                .srem(map_ground_items_key(map_id), ground_item_id)
                .ignore()
                .query::<()>(con)
        })
    }

    /// All live ground items on a map. TTL-expired blobs are pruned from the
    /// membership set as they are discovered.
    pub fn ground_items_on_map(&self, map_id: &str) -> Result<Vec<GroundItem>, String> {
        let ids: Vec<u64> =
            self.with_conn(|con| con.smembers(map_ground_items_key(map_id)))?;
        let mut items = Vec::with_capacity(ids.len());
        for ground_item_id in ids {
            match self.get_ground_item(ground_item_id)? {
                Some(item) => items.push(item),
                None => {
                    self.with_conn(|con| {
                        con.srem(map_ground_items_key(map_id), ground_item_id)
                    })
                    .map(|_: i64| ())?;
                }
            }
        }
        items.sort_by_key(|i| i.ground_item_id);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(dropper: Option<i64>, protection_expires_tick: u64) -> GroundItem {
        GroundItem {
            ground_item_id: 1,
            item_name: "copper_ore".to_string(),
            map_id: "overworld".to_string(),
            x: 5,
            y: 5,
            quantity: 3,
            dropper_player_id: dropper,
            drop_tick: 100,
            protection_expires_tick,
        }
    }

    #[test]
    fn test_protection_window() {
        let gi = item(Some(7), 1300);
        assert!(gi.is_protected_at(100));
        assert!(gi.is_protected_at(1299));
        assert!(!gi.is_protected_at(1300));
    }

    #[test]
    fn test_dropper_bypasses_protection() {
        let gi = item(Some(7), 1300);
        assert!(gi.can_pickup(7, 200));
        assert!(!gi.can_pickup(8, 200));
        assert!(gi.can_pickup(8, 1300));
    }

    #[test]
    fn test_unowned_drop_has_no_owner_privilege() {
        let gi = item(None, 1300);
        assert!(!gi.can_pickup(7, 200));
        assert!(gi.can_pickup(7, 1301));
    }
}
