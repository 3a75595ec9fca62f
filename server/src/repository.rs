//! Durable tier: SQLite.
//!
//! Holds only permanent records: accounts, progression, inventory,
//! equipment, appearance, and the reference tables mirrored from code on
//! startup. Runtime state (positions, HP, instances) lives in the hot store
//! and is flushed back here on logout and on the periodic drain.

use std::path::Path;

use chrono::{DateTime, Utc};
use common::appearance::AppearanceData;
use common::direction::Direction;
use common::protocol::PlayerRole;
use common::skills::SkillType;
use common::visual::EquipSlot;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::entities::{self, EntityTemplate};
use crate::items;

/// One durable player row.
#[derive(Debug, Clone)]
pub struct PlayerRow {
    pub player_id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: PlayerRole,
    pub banned: bool,
    pub timeout_until: Option<DateTime<Utc>>,
    pub map_id: String,
    pub x: i32,
    pub y: i32,
    pub facing: Direction,
    pub current_hp: i32,
    pub max_hp: i32,
    pub appearance: AppearanceData,
    pub auto_retaliate: bool,
    pub deleted: bool,
}

impl PlayerRow {
    /// Whether a login timeout is still in force.
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.timeout_until.map_or(false, |until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRow {
    pub slot_index: u8,
    pub item_name: String,
    pub quantity: u32,
    pub current_durability: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRow {
    pub slot: EquipSlot,
    pub item_name: String,
    pub current_durability: Option<i32>,
}

pub struct Repository {
    conn: Mutex<Connection>,
}

impl Repository {
    /// Open (or create) the database and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Repository, String> {
        let conn = Connection::open(path)
            .map_err(|e| format!("open database {}: {e}", path.display()))?;
        let repo = Repository {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Repository, String> {
        let conn =
            Connection::open_in_memory().map_err(|e| format!("open in-memory database: {e}"))?;
        let repo = Repository {
            conn: Mutex::new(conn),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    fn create_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                role            TEXT NOT NULL DEFAULT 'player',
                banned          INTEGER NOT NULL DEFAULT 0,
                timeout_until   TEXT,
                map_id          TEXT NOT NULL DEFAULT 'overworld',
                x               INTEGER NOT NULL DEFAULT 0,
                y               INTEGER NOT NULL DEFAULT 0,
                facing          TEXT NOT NULL DEFAULT 'south',
                current_hp      INTEGER NOT NULL DEFAULT 10,
                max_hp          INTEGER NOT NULL DEFAULT 10,
                appearance      TEXT NOT NULL DEFAULT '{}',
                auto_retaliate  INTEGER NOT NULL DEFAULT 1,
                deleted         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS items (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL,
                category        TEXT NOT NULL,
                rarity          TEXT NOT NULL,
                rarity_color    TEXT NOT NULL,
                equipment_slot  TEXT,
                max_stack_size  INTEGER NOT NULL,
                is_two_handed   INTEGER NOT NULL,
                max_durability  INTEGER,
                required_skill  TEXT,
                required_level  INTEGER NOT NULL,
                is_tradeable    INTEGER NOT NULL,
                base_value      INTEGER NOT NULL,
                stats           TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entities (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                name            TEXT NOT NULL UNIQUE,
                entity_type     TEXT NOT NULL,
                display_name    TEXT NOT NULL,
                behavior        TEXT NOT NULL,
                is_attackable   INTEGER NOT NULL,
                level           INTEGER NOT NULL,
                max_hp          INTEGER NOT NULL,
                xp_reward       INTEGER NOT NULL,
                aggro_radius    INTEGER NOT NULL,
                disengage_radius INTEGER NOT NULL,
                respawn_time    INTEGER NOT NULL,
                skills          TEXT NOT NULL,
                stats           TEXT NOT NULL,
                sprite_sheet_id TEXT,
                appearance      TEXT,
                equipped_items  TEXT,
                dialogue        TEXT,
                shop_id         TEXT
            );

            CREATE TABLE IF NOT EXISTS player_inventory (
                player_id           INTEGER NOT NULL,
                slot_index          INTEGER NOT NULL,
                item_name           TEXT NOT NULL,
                quantity            INTEGER NOT NULL,
                current_durability  INTEGER,
                PRIMARY KEY (player_id, slot_index)
            );

            CREATE TABLE IF NOT EXISTS player_equipment (
                player_id           INTEGER NOT NULL,
                slot_name           TEXT NOT NULL,
                item_name           TEXT NOT NULL,
                current_durability  INTEGER,
                PRIMARY KEY (player_id, slot_name)
            );

            CREATE TABLE IF NOT EXISTS player_skills (
                player_id   INTEGER NOT NULL,
                skill       TEXT NOT NULL,
                xp          INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (player_id, skill)
            );

            CREATE INDEX IF NOT EXISTS idx_players_username ON players(username);
            ",
        )
        .map_err(|e| format!("create schema: {e}"))
    }

    // -----------------------------------------------------------------------
    //  Reference sync
    // -----------------------------------------------------------------------

    /// Mirror the compile-time item table into the `items` table.
    pub fn sync_items(&self) -> Result<(), String> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| format!("sync items tx: {e}"))?;
        for (idx, item) in items::ITEMS.iter().enumerate() {
            let stats =
                serde_json::to_string(&item.stats).map_err(|e| format!("encode stats: {e}"))?;
            tx.execute(
                "INSERT INTO items (id, name, display_name, category, rarity, rarity_color,
                                    equipment_slot, max_stack_size, is_two_handed, max_durability,
                                    required_skill, required_level, is_tradeable, base_value, stats)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(name) DO UPDATE SET
                    display_name = excluded.display_name,
                    category = excluded.category,
                    rarity = excluded.rarity,
                    rarity_color = excluded.rarity_color,
                    equipment_slot = excluded.equipment_slot,
                    max_stack_size = excluded.max_stack_size,
                    is_two_handed = excluded.is_two_handed,
                    max_durability = excluded.max_durability,
                    required_skill = excluded.required_skill,
                    required_level = excluded.required_level,
                    is_tradeable = excluded.is_tradeable,
                    base_value = excluded.base_value,
                    stats = excluded.stats",
                params![
                    idx as i64 + 1,
                    item.name,
                    item.display_name,
                    item.category.as_str(),
                    item.rarity.as_str(),
                    item.rarity.color(),
                    item.equipment_slot.map(|s| s.as_str()),
                    item.max_stack_size,
                    item.is_two_handed,
                    item.max_durability,
                    item.required_skill.map(|s| s.as_str()),
                    item.required_level,
                    item.is_tradeable,
                    item.base_value,
                    stats,
                ],
            )
            .map_err(|e| format!("sync item {}: {e}", item.name))?;
        }
        tx.commit().map_err(|e| format!("sync items commit: {e}"))?;
        log::info!("Synced {} items to database", items::ITEMS.len());
        Ok(())
    }

    /// Mirror the entity template tables into the `entities` table. Humanoid
    /// rows carry appearance/equipped-items JSON and zeroed stat bonuses;
    /// their stats derive from equipment at runtime.
    pub fn sync_entities(&self) -> Result<(), String> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| format!("sync entities tx: {e}"))?;
        let mut count = 0usize;
        for template in entities::all_templates() {
            let skills: serde_json::Value = template
                .skills()
                .iter()
                .map(|(skill, lvl)| (skill.as_str().to_string(), serde_json::json!(lvl)))
                .collect::<serde_json::Map<String, serde_json::Value>>()
                .into();

            let (entity_type, stats, appearance, equipped, dialogue, shop_id) = match template {
                EntityTemplate::Monster(m) => (
                    "monster",
                    serde_json::to_string(&m.bonuses)
                        .map_err(|e| format!("encode bonuses: {e}"))?,
                    None,
                    None,
                    None,
                    None,
                ),
                EntityTemplate::Humanoid(h) => {
                    let equipped: serde_json::Value = h
                        .equipped_items
                        .iter()
                        .map(|(slot, item)| {
                            (slot.as_str().to_string(), serde_json::json!(item))
                        })
                        .collect::<serde_json::Map<String, serde_json::Value>>()
                        .into();
                    (
                        "humanoid_npc",
                        serde_json::to_string(&common::stats::ItemStats::default())
                            .map_err(|e| format!("encode bonuses: {e}"))?,
                        Some((h.appearance)().to_json().to_string()),
                        Some(equipped.to_string()),
                        Some(
                            serde_json::to_string(h.dialogue)
                                .map_err(|e| format!("encode dialogue: {e}"))?,
                        ),
                        h.shop_id,
                    )
                }
            };

            tx.execute(
                "INSERT INTO entities (name, entity_type, display_name, behavior, is_attackable,
                                       level, max_hp, xp_reward, aggro_radius, disengage_radius,
                                       respawn_time, skills, stats, sprite_sheet_id, appearance,
                                       equipped_items, dialogue, shop_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(name) DO UPDATE SET
                    entity_type = excluded.entity_type,
                    display_name = excluded.display_name,
                    behavior = excluded.behavior,
                    is_attackable = excluded.is_attackable,
                    level = excluded.level,
                    max_hp = excluded.max_hp,
                    xp_reward = excluded.xp_reward,
                    aggro_radius = excluded.aggro_radius,
                    disengage_radius = excluded.disengage_radius,
                    respawn_time = excluded.respawn_time,
                    skills = excluded.skills,
                    stats = excluded.stats,
                    sprite_sheet_id = excluded.sprite_sheet_id,
                    appearance = excluded.appearance,
                    equipped_items = excluded.equipped_items,
                    dialogue = excluded.dialogue,
                    shop_id = excluded.shop_id",
                params![
                    template.name(),
                    entity_type,
                    template.display_name(),
                    template.behavior().as_str(),
                    template.is_attackable(),
                    template.level(),
                    template.max_hp(),
                    template.xp_reward() as i64,
                    template.aggro_radius(),
                    template.disengage_radius(),
                    template.respawn_time(),
                    skills.to_string(),
                    stats,
                    template.sprite_sheet_id(),
                    appearance,
                    equipped,
                    dialogue,
                    shop_id,
                ],
            )
            .map_err(|e| format!("sync entity {}: {e}", template.name()))?;
            count += 1;
        }
        tx.commit()
            .map_err(|e| format!("sync entities commit: {e}"))?;
        log::info!("Synced {count} entity templates to database");
        Ok(())
    }

    // -----------------------------------------------------------------------
    //  Players
    // -----------------------------------------------------------------------

    fn row_to_player(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlayerRow> {
        let role_raw: String = row.get("role")?;
        let facing_raw: String = row.get("facing")?;
        let timeout_raw: Option<String> = row.get("timeout_until")?;
        let appearance_raw: String = row.get("appearance")?;
        let appearance_json: serde_json::Value =
            serde_json::from_str(&appearance_raw).unwrap_or(serde_json::Value::Null);
        Ok(PlayerRow {
            player_id: row.get("id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            role: PlayerRole::from_str(&role_raw).unwrap_or(PlayerRole::Player),
            banned: row.get("banned")?,
            timeout_until: timeout_raw
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            map_id: row.get("map_id")?,
            x: row.get("x")?,
            y: row.get("y")?,
            facing: Direction::from_str(&facing_raw).unwrap_or(Direction::South),
            current_hp: row.get("current_hp")?,
            max_hp: row.get("max_hp")?,
            appearance: AppearanceData::from_json(&appearance_json),
            auto_retaliate: row.get("auto_retaliate")?,
            deleted: row.get("deleted")?,
        })
    }

    pub fn get_player(&self, player_id: i64) -> Result<Option<PlayerRow>, String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM players WHERE id = ?1 AND deleted = 0",
            params![player_id],
            Self::row_to_player,
        )
        .optional()
        .map_err(|e| format!("get player {player_id}: {e}"))
    }

    pub fn get_player_by_username(&self, username: &str) -> Result<Option<PlayerRow>, String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM players WHERE username = ?1 COLLATE NOCASE AND deleted = 0",
            params![username],
            Self::row_to_player,
        )
        .optional()
        .map_err(|e| format!("get player '{username}': {e}"))
    }

    /// Create a player with defaults. Registration normally happens in the
    /// external auth service against the same database; this exists for
    /// seeding and tests.
    pub fn create_player(
        &self,
        username: &str,
        password_hash: &str,
        map_id: &str,
        x: i32,
        y: i32,
    ) -> Result<i64, String> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO players (username, password_hash, map_id, x, y)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, password_hash, map_id, x, y],
        )
        .map_err(|e| format!("create player '{username}': {e}"))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_player_role(&self, player_id: i64, role: PlayerRole) -> Result<(), String> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE players SET role = ?1 WHERE id = ?2",
            params![role.as_str(), player_id],
        )
        .map_err(|e| format!("set role for {player_id}: {e}"))?;
        Ok(())
    }

    /// Flush a player's runtime position and vitals back to the durable row.
    pub fn save_player_runtime(
        &self,
        player_id: i64,
        map_id: &str,
        x: i32,
        y: i32,
        facing: Direction,
        current_hp: i32,
        max_hp: i32,
        auto_retaliate: bool,
    ) -> Result<(), String> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE players
             SET map_id = ?1, x = ?2, y = ?3, facing = ?4,
                 current_hp = ?5, max_hp = ?6, auto_retaliate = ?7
             WHERE id = ?8",
            params![
                map_id,
                x,
                y,
                facing.as_str(),
                current_hp,
                max_hp,
                auto_retaliate,
                player_id
            ],
        )
        .map_err(|e| format!("save runtime for {player_id}: {e}"))?;
        Ok(())
    }

    pub fn save_player_appearance(
        &self,
        player_id: i64,
        appearance: &AppearanceData,
    ) -> Result<(), String> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE players SET appearance = ?1 WHERE id = ?2",
            params![appearance.to_json().to_string(), player_id],
        )
        .map_err(|e| format!("save appearance for {player_id}: {e}"))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    //  Inventory / equipment / skills
    // -----------------------------------------------------------------------

    pub fn load_inventory(&self, player_id: i64) -> Result<Vec<InventoryRow>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT slot_index, item_name, quantity, current_durability
                 FROM player_inventory WHERE player_id = ?1 ORDER BY slot_index",
            )
            .map_err(|e| format!("prepare load inventory: {e}"))?;
        let rows = stmt
            .query_map(params![player_id], |row| {
                Ok(InventoryRow {
                    slot_index: row.get::<_, i64>(0)? as u8,
                    item_name: row.get(1)?,
                    quantity: row.get::<_, i64>(2)? as u32,
                    current_durability: row.get(3)?,
                })
            })
            .map_err(|e| format!("load inventory for {player_id}: {e}"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("load inventory rows for {player_id}: {e}"))
    }

    /// Replace the player's entire inventory in one transaction.
    pub fn save_inventory(&self, player_id: i64, rows: &[InventoryRow]) -> Result<(), String> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| format!("save inventory tx: {e}"))?;
        tx.execute(
            "DELETE FROM player_inventory WHERE player_id = ?1",
            params![player_id],
        )
        .map_err(|e| format!("clear inventory for {player_id}: {e}"))?;
        for row in rows {
            tx.execute(
                "INSERT INTO player_inventory (player_id, slot_index, item_name, quantity, current_durability)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    player_id,
                    row.slot_index,
                    row.item_name,
                    row.quantity,
                    row.current_durability
                ],
            )
            .map_err(|e| format!("save inventory slot {}: {e}", row.slot_index))?;
        }
        tx.commit()
            .map_err(|e| format!("save inventory commit: {e}"))
    }

    pub fn load_equipment(&self, player_id: i64) -> Result<Vec<EquipmentRow>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT slot_name, item_name, current_durability
                 FROM player_equipment WHERE player_id = ?1",
            )
            .map_err(|e| format!("prepare load equipment: {e}"))?;
        let rows = stmt
            .query_map(params![player_id], |row| {
                let slot_raw: String = row.get(0)?;
                Ok((slot_raw, row.get::<_, String>(1)?, row.get::<_, Option<i32>>(2)?))
            })
            .map_err(|e| format!("load equipment for {player_id}: {e}"))?;
        let mut out = Vec::new();
        for row in rows {
            let (slot_raw, item_name, current_durability) =
                row.map_err(|e| format!("load equipment row: {e}"))?;
            if let Some(slot) = EquipSlot::from_str(&slot_raw) {
                out.push(EquipmentRow {
                    slot,
                    item_name,
                    current_durability,
                });
            }
        }
        Ok(out)
    }

    /// Replace the player's entire equipment set in one transaction.
    pub fn save_equipment(&self, player_id: i64, rows: &[EquipmentRow]) -> Result<(), String> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| format!("save equipment tx: {e}"))?;
        tx.execute(
            "DELETE FROM player_equipment WHERE player_id = ?1",
            params![player_id],
        )
        .map_err(|e| format!("clear equipment for {player_id}: {e}"))?;
        for row in rows {
            tx.execute(
                "INSERT INTO player_equipment (player_id, slot_name, item_name, current_durability)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    player_id,
                    row.slot.as_str(),
                    row.item_name,
                    row.current_durability
                ],
            )
            .map_err(|e| format!("save equipment slot {}: {e}", row.slot.as_str()))?;
        }
        tx.commit()
            .map_err(|e| format!("save equipment commit: {e}"))
    }

    pub fn load_skills(&self, player_id: i64) -> Result<Vec<(SkillType, u64)>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT skill, xp FROM player_skills WHERE player_id = ?1")
            .map_err(|e| format!("prepare load skills: {e}"))?;
        let rows = stmt
            .query_map(params![player_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| format!("load skills for {player_id}: {e}"))?;
        let mut out = Vec::new();
        for row in rows {
            let (skill_raw, xp) = row.map_err(|e| format!("load skill row: {e}"))?;
            if let Some(skill) = SkillType::from_str(&skill_raw) {
                out.push((skill, xp));
            }
        }
        Ok(out)
    }

    pub fn add_skill_xp(&self, player_id: i64, skill: SkillType, xp: u64) -> Result<u64, String> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO player_skills (player_id, skill, xp) VALUES (?1, ?2, ?3)
             ON CONFLICT(player_id, skill) DO UPDATE SET xp = xp + excluded.xp",
            params![player_id, skill.as_str(), xp as i64],
        )
        .map_err(|e| format!("add xp for {player_id}: {e}"))?;
        conn.query_row(
            "SELECT xp FROM player_skills WHERE player_id = ?1 AND skill = ?2",
            params![player_id, skill.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .map(|xp| xp as u64)
        .map_err(|e| format!("read xp for {player_id}: {e}"))
    }

    pub fn get_skill_xp(&self, player_id: i64, skill: SkillType) -> Result<u64, String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT xp FROM player_skills WHERE player_id = ?1 AND skill = ?2",
            params![player_id, skill.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|xp| xp.unwrap_or(0) as u64)
        .map_err(|e| format!("get xp for {player_id}: {e}"))
    }

    /// `hitpoints` level for a player, floor 10 so fresh accounts are viable.
    pub fn hitpoints_level(&self, player_id: i64) -> Result<u32, String> {
        let xp = self.get_skill_xp(player_id, SkillType::Hitpoints)?;
        Ok(SkillType::level_for_xp(xp).max(10))
    }

    /// Reference row lookup used by tooling; runtime code reads the static
    /// tables directly.
    pub fn item_count(&self) -> Result<usize, String> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM items", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(|e| format!("count items: {e}"))
    }

    pub fn entity_count(&self) -> Result<usize, String> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM entities", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|n| n as usize)
        .map_err(|e| format!("count entities: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        Repository::open_in_memory().unwrap()
    }

    #[test]
    fn test_schema_and_reference_sync() {
        let repo = repo();
        repo.sync_items().unwrap();
        repo.sync_entities().unwrap();
        assert_eq!(repo.item_count().unwrap(), items::ITEMS.len());
        assert_eq!(
            repo.entity_count().unwrap(),
            entities::all_templates().count()
        );
        // Sync is idempotent.
        repo.sync_items().unwrap();
        assert_eq!(repo.item_count().unwrap(), items::ITEMS.len());
    }

    #[test]
    fn test_create_and_fetch_player() {
        let repo = repo();
        let id = repo
            .create_player("alice", "not-a-real-hash", "overworld", 50, 50)
            .unwrap();
        let row = repo.get_player(id).unwrap().unwrap();
        assert_eq!(row.username, "alice");
        assert_eq!(row.role, PlayerRole::Player);
        assert!(!row.banned);
        assert_eq!((row.x, row.y), (50, 50));

        let by_name = repo.get_player_by_username("ALICE").unwrap().unwrap();
        assert_eq!(by_name.player_id, id);
        assert!(repo.get_player_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn test_runtime_flush_round_trip() {
        let repo = repo();
        let id = repo
            .create_player("bob", "hash", "overworld", 1, 1)
            .unwrap();
        repo.save_player_runtime(id, "dungeon", 9, 12, Direction::East, 7, 20, false)
            .unwrap();
        let row = repo.get_player(id).unwrap().unwrap();
        assert_eq!(row.map_id, "dungeon");
        assert_eq!((row.x, row.y), (9, 12));
        assert_eq!(row.facing, Direction::East);
        assert_eq!(row.current_hp, 7);
        assert!(!row.auto_retaliate);
    }

    #[test]
    fn test_inventory_replace_semantics() {
        let repo = repo();
        let id = repo.create_player("carol", "hash", "m", 0, 0).unwrap();
        let rows = vec![
            InventoryRow {
                slot_index: 0,
                item_name: "copper_ore".to_string(),
                quantity: 5,
                current_durability: None,
            },
            InventoryRow {
                slot_index: 3,
                item_name: "bronze_shortsword".to_string(),
                quantity: 1,
                current_durability: Some(80),
            },
        ];
        repo.save_inventory(id, &rows).unwrap();
        assert_eq!(repo.load_inventory(id).unwrap(), rows);

        // Saving a smaller set removes stale rows.
        repo.save_inventory(id, &rows[..1]).unwrap();
        assert_eq!(repo.load_inventory(id).unwrap().len(), 1);
    }

    #[test]
    fn test_equipment_round_trip() {
        let repo = repo();
        let id = repo.create_player("dave", "hash", "m", 0, 0).unwrap();
        let rows = vec![EquipmentRow {
            slot: EquipSlot::MainHand,
            item_name: "bronze_shortsword".to_string(),
            current_durability: Some(79),
        }];
        repo.save_equipment(id, &rows).unwrap();
        assert_eq!(repo.load_equipment(id).unwrap(), rows);
    }

    #[test]
    fn test_skill_xp_accumulates() {
        let repo = repo();
        let id = repo.create_player("erin", "hash", "m", 0, 0).unwrap();
        assert_eq!(repo.get_skill_xp(id, SkillType::Attack).unwrap(), 0);
        repo.add_skill_xp(id, SkillType::Attack, 40).unwrap();
        let total = repo.add_skill_xp(id, SkillType::Attack, 60).unwrap();
        assert_eq!(total, 100);
        assert_eq!(repo.get_skill_xp(id, SkillType::Attack).unwrap(), 100);
    }

    #[test]
    fn test_appearance_column_round_trip() {
        let repo = repo();
        let id = repo.create_player("faye", "hash", "m", 0, 0).unwrap();
        let appearance = common::appearance::presets::elder();
        repo.save_player_appearance(id, &appearance).unwrap();
        let row = repo.get_player(id).unwrap().unwrap();
        assert_eq!(row.appearance, appearance);
    }

    #[test]
    fn test_timeout_check() {
        let repo = repo();
        let id = repo.create_player("gus", "hash", "m", 0, 0).unwrap();
        let mut row = repo.get_player(id).unwrap().unwrap();
        assert!(!row.is_timed_out(Utc::now()));
        row.timeout_until = Some(Utc::now() + chrono::Duration::minutes(5));
        assert!(row.is_timed_out(Utc::now()));
    }
}
