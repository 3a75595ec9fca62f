//! Shared server context.
//!
//! All services are constructed once in `main` and handed out behind an
//! `Arc<ServerContext>`; nothing in the crate reaches for process-level
//! globals. The context also hosts the cross-cutting orchestration that
//! touches several services at once: login/logout, player death, and the
//! composition of personal state views.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use common::direction::Direction;
use common::protocol::{
    EquipmentView, Frame, HitSplat, InventoryView, MessageType, PlayerDiedPayload,
    PlayerLeftPayload, PlayerRespawnPayload, SkillEntry, StatsView, WelcomePayload,
};
use common::skills::SkillType;
use common::visual::VisualState;
use parking_lot::Mutex;

use crate::chat::ChatService;
use crate::combat::CombatantStats;
use crate::config::ServerConfig;
use crate::inventory::{self, InventoryLocks};
use crate::map::MapManager;
use crate::repository::{PlayerRow, Repository};
use crate::session::SessionRegistry;
use crate::store::ground::{GroundItem, LOOT_PROTECTION_SECS};
use crate::store::players::PlayerRuntime;
use crate::store::StateStore;
use crate::visibility;
use crate::visual_registry::VisualRegistry;

/// Why a login was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    NotFound,
    Banned,
    TimedOut,
    System(String),
}

pub struct ServerContext {
    pub config: ServerConfig,
    pub repo: Repository,
    pub store: StateStore,
    pub maps: MapManager,
    pub visuals: VisualRegistry,
    pub sessions: SessionRegistry,
    pub chat: ChatService,
    pub inv_locks: InventoryLocks,
    pub shutdown: AtomicBool,
    started: Instant,
    /// Hit splats queued by command handlers for the next hot broadcast,
    /// keyed by map.
    pending_splats: Mutex<HashMap<String, Vec<HitSplat>>>,
}

impl ServerContext {
    pub fn new(
        config: ServerConfig,
        repo: Repository,
        store: StateStore,
        maps: MapManager,
    ) -> ServerContext {
        ServerContext {
            config,
            repo,
            store,
            maps,
            visuals: VisualRegistry::new(),
            sessions: SessionRegistry::new(),
            chat: ChatService::new(),
            inv_locks: InventoryLocks::new(),
            shutdown: AtomicBool::new(false),
            started: Instant::now(),
            pending_splats: Mutex::new(HashMap::new()),
        }
    }

    /// Monotonic hot-tick counter shared by every subsystem.
    pub fn current_tick(&self) -> u64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        (elapsed * f64::from(self.config.tick.hot_hz)) as u64
    }

    pub fn visible_range(&self) -> i32 {
        visibility::visible_range(self.config.maps.chunk_radius)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    // -----------------------------------------------------------------------
    //  Login / logout
    // -----------------------------------------------------------------------

    /// Bring a durable player row online: gate on ban/timeout, recompute max
    /// HP from skills and equipment, and write the runtime record.
    /// Idempotent at the store level.
    pub fn register_online(&self, player_id: i64) -> Result<(PlayerRow, PlayerRuntime), RegisterError> {
        let row = self
            .repo
            .get_player(player_id)
            .map_err(RegisterError::System)?
            .ok_or(RegisterError::NotFound)?;

        if row.banned {
            return Err(RegisterError::Banned);
        }
        if row.is_timed_out(chrono::Utc::now()) {
            return Err(RegisterError::TimedOut);
        }

        let equipment = self
            .repo
            .load_equipment(player_id)
            .map_err(RegisterError::System)?;
        let stats = inventory::total_stats(&equipment);
        let hitpoints = self
            .repo
            .hitpoints_level(player_id)
            .map_err(RegisterError::System)?;
        let max_hp = inventory::player_max_hp(hitpoints, &stats);
        let current_hp = row.current_hp.clamp(1, max_hp);

        let runtime = PlayerRuntime {
            player_id,
            username: row.username.clone(),
            map_id: row.map_id.clone(),
            x: row.x,
            y: row.y,
            facing: row.facing,
            current_hp,
            max_hp,
            auto_retaliate: row.auto_retaliate,
            prev_x: row.x,
            prev_y: row.y,
        };
        self.store
            .register_online(&runtime)
            .map_err(RegisterError::System)?;
        Ok((row, runtime))
    }

    /// Take a player fully offline: flush runtime state to the durable row,
    /// clear aggro pointed at them, drop visibility caches, and tell
    /// observers. Safe to call twice.
    pub fn logout_player(&self, player_id: i64, reason: &str) {
        let session = self.sessions.unregister(player_id);
        if let Some(ref session) = session {
            session.mark_disconnected();
        }

        let runtime = match self.store.unregister_online(player_id) {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Logout of {player_id}: {e}");
                None
            }
        };

        let Some(runtime) = runtime else {
            return;
        };
        log::info!(
            "Player {} ({}) logged out: {reason}",
            runtime.username,
            player_id
        );

        if let Err(e) = self.repo.save_player_runtime(
            player_id,
            &runtime.map_id,
            runtime.x,
            runtime.y,
            runtime.facing,
            runtime.current_hp,
            runtime.max_hp,
            runtime.auto_retaliate,
        ) {
            log::error!("Flushing runtime for {player_id}: {e}");
        }

        crate::ai::clear_entities_targeting_player(self, &runtime.map_id, player_id);
        self.visuals.remove_observer(player_id);
        self.visuals.remove_entity(&format!("player:{player_id}"));
        self.inv_locks.forget(player_id);

        let payload = PlayerLeftPayload {
            player_id,
            username: runtime.username.clone(),
        };
        if let Ok(frame) = Frame::event(MessageType::EventPlayerLeft, &payload) {
            self.broadcast_to_observers(&runtime.map_id, (runtime.x, runtime.y), frame, Some(player_id));
        }
    }

    // -----------------------------------------------------------------------
    //  Broadcast helpers
    // -----------------------------------------------------------------------

    /// Send a frame to every session on `map_id` whose player is within the
    /// visible range of `center`. Sessions whose position cannot be read are
    /// skipped. Sends to disconnected sessions drop silently.
    pub fn broadcast_to_observers(
        &self,
        map_id: &str,
        center: (i32, i32),
        frame: Frame,
        exclude: Option<i64>,
    ) {
        let range = self.visible_range();
        for session in self.sessions.on_map(map_id) {
            if Some(session.player_id) == exclude {
                continue;
            }
            let position = match self.store.get_player(session.player_id) {
                Ok(Some(rt)) => (rt.x, rt.y),
                _ => continue,
            };
            if visibility::in_visible_range(position, center, range) {
                session.send(frame.clone());
            }
        }
    }

    pub fn send_to_player(&self, player_id: i64, frame: Frame) -> bool {
        match self.sessions.get(player_id) {
            Some(session) => session.send(frame),
            None => false,
        }
    }

    pub fn queue_hit_splat(&self, map_id: &str, splat: HitSplat) {
        self.pending_splats
            .lock()
            .entry(map_id.to_string())
            .or_default()
            .push(splat);
    }

    pub fn drain_hit_splats(&self, map_id: &str) -> Vec<HitSplat> {
        self.pending_splats
            .lock()
            .get_mut(map_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    //  Player state composition
    // -----------------------------------------------------------------------

    pub fn player_combat_stats(&self, player_id: i64) -> Result<CombatantStats, String> {
        let equipment = self.repo.load_equipment(player_id)?;
        let stats = inventory::total_stats(&equipment);
        let level = |skill: SkillType| -> Result<u32, String> {
            Ok(SkillType::level_for_xp(self.repo.get_skill_xp(player_id, skill)?))
        };
        Ok(CombatantStats {
            attack_level: level(SkillType::Attack)?,
            strength_level: level(SkillType::Strength)?,
            defence_level: level(SkillType::Defence)?,
            attack_bonus: stats.attack_bonus,
            strength_bonus: stats.strength_bonus,
            physical_defence_bonus: stats.physical_defence_bonus,
        })
    }

    /// Current paperdoll state: durable appearance plus equipped visuals.
    pub fn player_visual_state(&self, player_id: i64) -> Result<VisualState, String> {
        let row = self
            .repo
            .get_player(player_id)?
            .ok_or_else(|| format!("player {player_id} not found"))?;
        let equipment = self.repo.load_equipment(player_id)?;
        Ok(VisualState::new(
            row.appearance,
            inventory::equipped_visuals(&equipment),
        ))
    }

    pub fn inventory_view(&self, player_id: i64) -> Result<InventoryView, String> {
        Ok(inventory::inventory_view(&self.repo.load_inventory(player_id)?))
    }

    pub fn equipment_view(&self, player_id: i64) -> Result<EquipmentView, String> {
        Ok(inventory::equipment_view(&self.repo.load_equipment(player_id)?))
    }

    pub fn stats_view(&self, player_id: i64) -> Result<StatsView, String> {
        let equipment = self.repo.load_equipment(player_id)?;
        let totals = inventory::total_stats(&equipment);
        let mut skills = Vec::with_capacity(SkillType::ALL.len());
        for skill in SkillType::ALL {
            let xp = self.repo.get_skill_xp(player_id, skill)?;
            skills.push(SkillEntry {
                skill,
                level: SkillType::level_for_xp(xp),
                xp,
            });
        }
        let (current_hp, max_hp) = match self.store.get_player(player_id)? {
            Some(rt) => (rt.current_hp, rt.max_hp),
            None => {
                let hitpoints = self.repo.hitpoints_level(player_id)?;
                let max = inventory::player_max_hp(hitpoints, &totals);
                (max, max)
            }
        };
        Ok(StatsView {
            skills,
            totals,
            current_hp,
            max_hp,
        })
    }

    /// Initial snapshot for EVENT_WELCOME.
    pub fn welcome_payload(
        &self,
        row: &PlayerRow,
        runtime: &PlayerRuntime,
    ) -> Result<WelcomePayload, String> {
        Ok(WelcomePayload {
            player_id: runtime.player_id,
            username: runtime.username.clone(),
            role: row.role,
            map_id: runtime.map_id.clone(),
            x: runtime.x,
            y: runtime.y,
            facing: runtime.facing,
            current_hp: runtime.current_hp,
            max_hp: runtime.max_hp,
            appearance: row.appearance,
            inventory: self.inventory_view(runtime.player_id)?,
            equipment: self.equipment_view(runtime.player_id)?,
            stats: self.stats_view(runtime.player_id)?,
            tick: self.current_tick(),
            auto_retaliate: runtime.auto_retaliate,
        })
    }

    // -----------------------------------------------------------------------
    //  Player death
    // -----------------------------------------------------------------------

    /// Handle a player reaching zero HP: drop tradeable inventory as ground
    /// items, return every entity hunting them to spawn, respawn the player
    /// at the map spawn with full HP, and notify observers.
    pub fn handle_player_death(&self, player_id: i64) {
        let runtime = match self.store.get_player(player_id) {
            Ok(Some(rt)) => rt,
            _ => return,
        };
        let now_tick = self.current_tick();
        log::info!(
            "Player {} ({}) died at ({}, {}) on {}",
            runtime.username,
            player_id,
            runtime.x,
            runtime.y,
            runtime.map_id
        );

        // Drop the tradeable part of the inventory where they fell.
        let lock = self.inv_locks.lock_for(player_id);
        let _guard = lock.lock();
        match self.repo.load_inventory(player_id) {
            Ok(mut rows) => {
                let hot_hz = u64::from(self.config.tick.hot_hz);
                let mut kept = Vec::new();
                for row in rows.drain(..) {
                    let tradeable = crate::items::item_by_name(&row.item_name)
                        .map(|i| i.is_tradeable)
                        .unwrap_or(false);
                    if !tradeable {
                        kept.push(row);
                        continue;
                    }
                    let drop = GroundItem {
                        ground_item_id: 0,
                        item_name: row.item_name.clone(),
                        map_id: runtime.map_id.clone(),
                        x: runtime.x,
                        y: runtime.y,
                        quantity: row.quantity,
                        dropper_player_id: Some(player_id),
                        drop_tick: now_tick,
                        protection_expires_tick: now_tick + LOOT_PROTECTION_SECS * hot_hz,
                    };
                    if let Err(e) = self.store.drop_ground_item(drop) {
                        log::error!("Dropping death loot for {player_id}: {e}");
                        kept.push(row);
                    }
                }
                if let Err(e) = self.repo.save_inventory(player_id, &kept) {
                    log::error!("Saving post-death inventory for {player_id}: {e}");
                }
            }
            Err(e) => log::error!("Loading inventory for dead player {player_id}: {e}"),
        }
        drop(_guard);

        crate::ai::clear_entities_targeting_player(self, &runtime.map_id, player_id);

        let died = PlayerDiedPayload {
            player_id,
            username: runtime.username.clone(),
            map_id: runtime.map_id.clone(),
            x: runtime.x,
            y: runtime.y,
        };
        if let Ok(frame) = Frame::event(MessageType::EventPlayerDied, &died) {
            self.broadcast_to_observers(&runtime.map_id, (runtime.x, runtime.y), frame.clone(), None);
            self.send_to_player(player_id, frame);
        }

        // Respawn at the map's player spawn with full HP.
        let (spawn_x, spawn_y) = self
            .maps
            .get(&runtime.map_id)
            .map(|m| m.player_spawn())
            .unwrap_or((runtime.x, runtime.y));
        if let Err(e) = self.store.set_player_position(
            player_id,
            spawn_x,
            spawn_y,
            &runtime.map_id,
            Direction::South,
        ) {
            log::error!("Respawning player {player_id}: {e}");
        }
        if let Err(e) = self
            .store
            .set_player_hp(player_id, runtime.max_hp, runtime.max_hp)
        {
            log::error!("Restoring HP for {player_id}: {e}");
        }

        let respawn = PlayerRespawnPayload {
            player_id,
            map_id: runtime.map_id.clone(),
            x: spawn_x,
            y: spawn_y,
            current_hp: runtime.max_hp,
            max_hp: runtime.max_hp,
        };
        if let Ok(frame) = Frame::event(MessageType::EventPlayerRespawn, &respawn) {
            self.broadcast_to_observers(&runtime.map_id, (spawn_x, spawn_y), frame.clone(), None);
            self.send_to_player(player_id, frame);
        }

        if let Some(session) = self.sessions.get(player_id) {
            session.mark_dirty(crate::session::DirtyFlags::INVENTORY | crate::session::DirtyFlags::STATS);
        }
    }
}
