//! Tick scheduler and broadcast pipeline.
//!
//! One worker thread per map, each advancing at `hot_hz`. Per tick, in
//! order: ready respawns, entity AI, combat fallout (including player
//! auto-retaliation), then the interest-filtered EVENT_GAME_UPDATE fan-out.
//! Every `hot_hz / warm_hz` ticks the worker also flushes consolidated
//! personal EVENT_STATE_UPDATEs for dirty sessions. AI mutations for tick N
//! always complete before tick N's broadcast, so clients never observe
//! partial-tick state. A slow component logs a warning; ticks are never
//! coalesced or dropped.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use common::protocol::{
    CombatActionPayload, EntityView, Frame, GameUpdatePayload, GroundItemView, HitSplat,
    MessageType, PlayerView, StateSystems, StateUpdatePayload, TargetKind,
};
use common::visual::VisualState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ai::{self, EntityAttackEvent};
use crate::combat;
use crate::context::ServerContext;
use crate::entities::{template_by_name, EntityState};
use crate::session::{DirtyFlags, Session};
use crate::spawn;
use crate::store::entities::EntityInstance;
use crate::store::players::PlayerRuntime;
use crate::visibility;

/// Soft per-tick budget; exceeding it logs a slow-tick warning.
const TICK_BUDGET: Duration = Duration::from_millis(50);

/// Hot ticks between periodic drains of runtime state to the durable tier.
/// A DB hiccup during gameplay loses at most this much progression; the
/// next drain or the logout flush catches up.
const DB_FLUSH_INTERVAL_TICKS: u64 = 600;

/// Start one tick worker per loaded map. Maps tick independently; a slow
/// tick on one never delays another.
pub fn spawn_tick_workers(ctx: &Arc<ServerContext>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for map_id in ctx.maps.map_ids() {
        let ctx = Arc::clone(ctx);
        let name = format!("tick-{map_id}");
        match std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || map_tick_loop(&ctx, &map_id))
        {
            Ok(handle) => handles.push(handle),
            Err(e) => log::error!("Failed to start tick worker {name}: {e}"),
        }
    }
    handles
}

fn map_tick_loop(ctx: &Arc<ServerContext>, map_id: &str) {
    let interval = Duration::from_secs_f64(1.0 / f64::from(ctx.config.tick.hot_hz));
    let warm_divisor = ctx.config.warm_tick_divisor().max(1);
    let mut rng = StdRng::from_entropy();
    let mut loop_count: u64 = 0;

    log::info!("Tick worker for '{map_id}' running at {} Hz", ctx.config.tick.hot_hz);

    while !ctx.is_shutting_down() {
        let tick_start = Instant::now();
        let now_tick = ctx.current_tick();

        run_respawns(ctx, map_id, now_tick);
        let attack_events = ai::process_entities(ctx, map_id, now_tick, &mut rng);
        handle_entity_attacks(ctx, map_id, now_tick, &attack_events, &mut rng);
        broadcast_game_update(ctx, map_id, now_tick);

        if loop_count % warm_divisor == 0 {
            flush_state_updates(ctx, map_id);
        }
        if loop_count > 0 && loop_count % DB_FLUSH_INTERVAL_TICKS == 0 {
            drain_runtime_to_db(ctx, map_id);
        }
        loop_count += 1;

        let elapsed = tick_start.elapsed();
        if elapsed > TICK_BUDGET {
            log::warn!(
                "Slow tick on '{map_id}': {} ms (budget {} ms)",
                elapsed.as_millis(),
                TICK_BUDGET.as_millis()
            );
        }
        if let Some(remaining) = interval.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }

    log::info!("Tick worker for '{map_id}' stopped");
}

/// Pop due respawn-queue entries for this map and re-materialize them.
fn run_respawns(ctx: &ServerContext, map_id: &str, now_tick: u64) {
    let ready = match ctx.store.pop_ready_respawns(map_id, now_tick) {
        Ok(ready) => ready,
        Err(e) => {
            log::error!("Respawn queue on '{map_id}': {e}");
            return;
        }
    };
    for record in ready {
        if let Err(e) = spawn::respawn_entity(ctx, &record) {
            log::error!("Respawning entity {} on '{map_id}': {e}", record.instance_id);
        }
    }
}

/// Emit combat events for entity attacks resolved by the AI, run player
/// auto-retaliation, and process player deaths.
fn handle_entity_attacks<R: Rng>(
    ctx: &Arc<ServerContext>,
    map_id: &str,
    now_tick: u64,
    events: &[EntityAttackEvent],
    rng: &mut R,
) {
    for event in events {
        let action = CombatActionPayload {
            attacker_kind: TargetKind::Entity,
            attacker_id: event.instance_id,
            target_kind: TargetKind::Player,
            target_id: event.target_player_id as u64,
            damage: event.outcome.damage,
            miss: event.outcome.miss,
            target_hp_remaining: event.outcome.target_hp_remaining,
            target_died: event.outcome.target_died,
        };
        if let Ok(Some(target)) = ctx.store.get_player(event.target_player_id) {
            if let Ok(frame) = Frame::event(MessageType::EventCombatAction, &action) {
                ctx.broadcast_to_observers(map_id, (target.x, target.y), frame, None);
            }
        }
        ctx.queue_hit_splat(
            map_id,
            HitSplat {
                target_kind: TargetKind::Player,
                target_id: event.target_player_id as u64,
                amount: event.outcome.damage,
                miss: event.outcome.miss,
            },
        );
        // The victim's vitals changed; reconcile on the next warm tick.
        if !event.outcome.miss {
            if let Some(victim) = ctx.sessions.get(event.target_player_id) {
                victim.mark_dirty(DirtyFlags::STATS);
            }
        }

        if event.outcome.target_died {
            ctx.handle_player_death(event.target_player_id);
            continue;
        }

        auto_retaliate(ctx, map_id, now_tick, event, rng);
    }
}

/// A player with auto-retaliate enabled answers an adjacent entity's attack
/// with a swing of their own, on the same cadence an explicit attack would
/// use.
fn auto_retaliate<R: Rng>(
    ctx: &Arc<ServerContext>,
    map_id: &str,
    now_tick: u64,
    event: &EntityAttackEvent,
    rng: &mut R,
) {
    let Some(session) = ctx.sessions.get(event.target_player_id) else {
        return;
    };
    let Ok(Some(player)) = ctx.store.get_player(event.target_player_id) else {
        return;
    };
    if !player.auto_retaliate {
        return;
    }
    let last_swing = session.last_attack_tick.load(Ordering::SeqCst);
    if last_swing != 0 && now_tick.saturating_sub(last_swing) < ctx.config.ai.attack_interval {
        return;
    }
    let Ok(Some(mut entity)) = ctx.store.get_entity(event.instance_id) else {
        return;
    };
    if matches!(entity.state, EntityState::Dead | EntityState::Dying)
        || !combat::in_attack_range((player.x, player.y), (entity.x, entity.y))
    {
        return;
    }
    let Some(template) = template_by_name(&entity.template_name) else {
        return;
    };
    let Ok(attacker_stats) = ctx.player_combat_stats(event.target_player_id) else {
        return;
    };

    session.last_attack_tick.store(now_tick, Ordering::SeqCst);
    let outcome = combat::resolve_attack(
        rng,
        &attacker_stats,
        &ai::entity_combat_stats(&template),
        entity.current_hp,
    );
    entity.current_hp = outcome.target_hp_remaining;
    if outcome.target_died {
        entity.state = EntityState::Dying;
        entity.death_tick = Some(now_tick);
        entity.target_player_id = None;
    }
    if let Err(e) = ctx.store.write_entity(&entity) {
        log::error!("Auto-retaliate: writing entity {}: {e}", entity.instance_id);
        return;
    }
    if outcome.damage > 0 {
        for (skill, xp) in combat::xp_awards(outcome.damage) {
            let _ = ctx.repo.add_skill_xp(event.target_player_id, skill, xp);
        }
        session.mark_dirty(DirtyFlags::STATS);
    }

    let action = CombatActionPayload {
        attacker_kind: TargetKind::Player,
        attacker_id: event.target_player_id as u64,
        target_kind: TargetKind::Entity,
        target_id: entity.instance_id,
        damage: outcome.damage,
        miss: outcome.miss,
        target_hp_remaining: outcome.target_hp_remaining,
        target_died: outcome.target_died,
    };
    if let Ok(frame) = Frame::event(MessageType::EventCombatAction, &action) {
        ctx.broadcast_to_observers(map_id, (entity.x, entity.y), frame, None);
    }
    ctx.queue_hit_splat(
        map_id,
        HitSplat {
            target_kind: TargetKind::Entity,
            target_id: entity.instance_id,
            amount: outcome.damage,
            miss: outcome.miss,
        },
    );
}

/// Build and send the per-session EVENT_GAME_UPDATE: interest-filtered
/// views, spawn/despawn deltas, ground items, and hit splats, with visual
/// fingerprints attached (full data only on first sight per observer).
fn broadcast_game_update(ctx: &Arc<ServerContext>, map_id: &str, now_tick: u64) {
    let sessions = ctx.sessions.on_map(map_id);
    if sessions.is_empty() {
        // Nobody listening; still drain splats so they don't pile up.
        ctx.drain_hit_splats(map_id);
        return;
    }

    let players = match ctx.store.players_on_map(map_id) {
        Ok(players) => players,
        Err(e) => {
            log::error!("Broadcast on '{map_id}': listing players: {e}");
            return;
        }
    };
    let entities = match ctx.store.map_entities(map_id) {
        Ok(entities) => entities,
        Err(e) => {
            log::error!("Broadcast on '{map_id}': listing entities: {e}");
            return;
        }
    };
    let ground_items = ctx.store.ground_items_on_map(map_id).unwrap_or_else(|e| {
        log::error!("Broadcast on '{map_id}': listing ground items: {e}");
        Vec::new()
    });
    let splats = ctx.drain_hit_splats(map_id);

    // Player visual states once per tick, shared across observers. The
    // registry binding is the fast path; equip/appearance handlers
    // re-register on change, so a durable-tier read only happens when the
    // binding is missing (first sight after login or LRU eviction).
    let mut player_visuals: HashMap<i64, VisualState> = HashMap::new();
    for player in &players {
        let key = format!("player:{}", player.player_id);
        let cached = ctx
            .visuals
            .entity_hash(&key)
            .and_then(|hash| ctx.visuals.get_visual_state(&hash));
        let state = match cached {
            Some(state) => state,
            None => match ctx.player_visual_state(player.player_id) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("Visual state for player {}: {e}", player.player_id);
                    continue;
                }
            },
        };
        player_visuals.insert(player.player_id, state);
    }

    let range = ctx.visible_range();
    for session in &sessions {
        if let Err(e) = send_game_update_to(
            ctx,
            session,
            now_tick,
            range,
            &players,
            &entities,
            &ground_items,
            &splats,
            &player_visuals,
        ) {
            // One session's failure never affects the others.
            log::error!(
                "Broadcast to player {} on '{map_id}': {e}",
                session.player_id
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn send_game_update_to(
    ctx: &Arc<ServerContext>,
    session: &Arc<Session>,
    now_tick: u64,
    range: i32,
    players: &[PlayerRuntime],
    entities: &[EntityInstance],
    ground_items: &[crate::store::ground::GroundItem],
    splats: &[HitSplat],
    player_visuals: &HashMap<i64, VisualState>,
) -> Result<(), String> {
    let observer_id = session.player_id;
    let Some(observer) = players.iter().find(|p| p.player_id == observer_id) else {
        // Session is mid-login or mid-logout; skip this tick.
        return Ok(());
    };
    let origin = (observer.x, observer.y);

    // Visible sets.
    let mut player_views = Vec::new();
    let mut visible_player_ids = HashSet::new();
    for player in players {
        if player.player_id == observer_id {
            continue;
        }
        if !visibility::in_visible_range(origin, (player.x, player.y), range) {
            continue;
        }
        visible_player_ids.insert(player.player_id);
        let (visual_hash, visual_state) = match player_visuals.get(&player.player_id) {
            Some(state) => {
                let key = format!("player:{}", player.player_id);
                let (hash, full) = ctx.visuals.visual_for_observer(observer_id, &key, state);
                (Some(hash), full)
            }
            None => (None, None),
        };
        player_views.push(PlayerView {
            player_id: player.player_id,
            username: player.username.clone(),
            x: player.x,
            y: player.y,
            facing: player.facing,
            current_hp: player.current_hp,
            max_hp: player.max_hp,
            visual_hash,
            visual_state,
        });
    }

    let mut entity_views = Vec::new();
    let mut visible_entity_ids = HashSet::new();
    for entity in entities {
        if !visibility::entity_observable(entity.state) {
            continue;
        }
        if !visibility::in_visible_range(origin, (entity.x, entity.y), range) {
            continue;
        }
        let Some(template) = template_by_name(&entity.template_name) else {
            continue;
        };
        visible_entity_ids.insert(entity.instance_id);

        let (visual_hash, visual_state) = match template.visual_state() {
            Some(state) => {
                let key = format!("entity:{}", entity.instance_id);
                let (hash, full) = ctx.visuals.visual_for_observer(observer_id, &key, &state);
                (Some(hash), full)
            }
            None => (None, None),
        };
        entity_views.push(EntityView {
            instance_id: entity.instance_id,
            name: entity.template_name.clone(),
            display_name: template.display_name().to_string(),
            x: entity.x,
            y: entity.y,
            state: entity.state.as_str().to_string(),
            current_hp: entity.current_hp,
            max_hp: entity.max_hp,
            level: template.level(),
            sprite_sheet_id: template.sprite_sheet_id().map(str::to_string),
            visual_hash,
            visual_state,
        });
    }

    let ground_views: Vec<GroundItemView> = ground_items
        .iter()
        .filter(|item| visibility::in_visible_range(origin, (item.x, item.y), range))
        .filter_map(|item| {
            let def = crate::items::item_by_name(&item.item_name)?;
            Some(GroundItemView {
                ground_item_id: item.ground_item_id,
                item_name: item.item_name.clone(),
                display_name: def.display_name.to_string(),
                x: item.x,
                y: item.y,
                quantity: item.quantity,
                is_yours: item.dropper_player_id == Some(observer_id),
                is_protected: item.is_protected_at(now_tick),
            })
        })
        .collect();

    // Spawn/despawn deltas against the last update this session received.
    let (removed_players, removed_entities) = {
        let mut state = session.state.lock();
        let (_, removed_players) =
            visibility::diff_visible(&state.last_sent_players, &visible_player_ids);
        let (_, removed_entities) =
            visibility::diff_visible(&state.last_sent_entities, &visible_entity_ids);
        state.last_sent_players = visible_player_ids;
        state.last_sent_entities = visible_entity_ids;
        (removed_players, removed_entities)
    };

    let payload = GameUpdatePayload {
        tick: now_tick,
        players: player_views,
        entities: entity_views,
        removed_players,
        removed_entities,
        ground_items: ground_views,
        hit_splats: splats.to_vec(),
    };

    // Quiet corner of the world: skip fully empty updates.
    if payload.players.is_empty()
        && payload.entities.is_empty()
        && payload.removed_players.is_empty()
        && payload.removed_entities.is_empty()
        && payload.ground_items.is_empty()
        && payload.hit_splats.is_empty()
    {
        return Ok(());
    }

    let frame = Frame::event(MessageType::EventGameUpdate, &payload)?;
    session.send(frame);
    Ok(())
}

/// Periodic drain: copy each online player's runtime record back to the
/// durable row so a crash loses little. Per-player failures are logged and
/// skipped.
fn drain_runtime_to_db(ctx: &Arc<ServerContext>, map_id: &str) {
    let players = match ctx.store.players_on_map(map_id) {
        Ok(players) => players,
        Err(e) => {
            log::error!("Runtime drain on '{map_id}': {e}");
            return;
        }
    };
    for player in players {
        if let Err(e) = ctx.repo.save_player_runtime(
            player.player_id,
            &player.map_id,
            player.x,
            player.y,
            player.facing,
            player.current_hp,
            player.max_hp,
            player.auto_retaliate,
        ) {
            log::error!("Runtime drain for player {}: {e}", player.player_id);
        }
    }
}

/// Warm path: consolidated personal state for sessions with dirty systems.
fn flush_state_updates(ctx: &Arc<ServerContext>, map_id: &str) {
    for session in ctx.sessions.on_map(map_id) {
        let dirty = session.take_dirty();
        if dirty.is_empty() {
            continue;
        }
        let mut systems = StateSystems::default();
        if dirty.contains(DirtyFlags::INVENTORY) {
            match ctx.inventory_view(session.player_id) {
                Ok(view) => systems.inventory = Some(view),
                Err(e) => log::error!("State update inventory for {}: {e}", session.player_id),
            }
        }
        if dirty.contains(DirtyFlags::EQUIPMENT) {
            match ctx.equipment_view(session.player_id) {
                Ok(view) => systems.equipment = Some(view),
                Err(e) => log::error!("State update equipment for {}: {e}", session.player_id),
            }
        }
        if dirty.contains(DirtyFlags::STATS) {
            match ctx.stats_view(session.player_id) {
                Ok(view) => systems.stats = Some(view),
                Err(e) => log::error!("State update stats for {}: {e}", session.player_id),
            }
        }
        let payload = StateUpdatePayload::personal(systems);
        if let Ok(frame) = Frame::event(MessageType::EventStateUpdate, &payload) {
            session.send(frame);
        }
    }
}
