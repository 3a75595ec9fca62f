//! Per-map entity AI.
//!
//! The state machine (idle -> wander -> combat -> returning) is implemented
//! as pure step functions over an [`AiWorld`] snapshot so the transitions
//! are testable without a live store; [`process_entities`] wires them to the
//! hot store and resolves entity attacks. One call per map per hot tick,
//! always before broadcast, so clients never observe partial-tick state.

use std::collections::HashSet;

use common::skills::SkillType;
use rand::Rng;

use crate::combat::{self, AttackOutcome, CombatantStats, DYING_DURATION_TICKS};
use crate::config::AiSection;
use crate::context::ServerContext;
use crate::entities::{template_by_name, EntityState, EntityTemplate};
use crate::map::CollisionGrid;
use crate::pathfinding;
use crate::store::entities::EntityInstance;

/// Minimal player view the AI needs.
#[derive(Debug, Clone)]
pub struct PlayerOnMap {
    pub player_id: i64,
    pub x: i32,
    pub y: i32,
}

/// Read-only world snapshot for one AI step.
pub struct AiWorld<'a> {
    pub config: &'a AiSection,
    pub grid: &'a CollisionGrid,
    pub players: &'a [PlayerOnMap],
    /// Tiles occupied by other entities and players.
    pub blocked: &'a HashSet<(i32, i32)>,
    pub tick: u64,
}

/// An attack the state machine wants resolved this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiAttack {
    pub target_player_id: i64,
}

/// What the AI produced for one map this tick, for the broadcast pipeline.
#[derive(Debug, Clone)]
pub struct EntityAttackEvent {
    pub instance_id: u64,
    pub target_player_id: i64,
    pub outcome: AttackOutcome,
}

fn euclidean_sq(a: (i32, i32), b: (i32, i32)) -> i64 {
    let dx = i64::from(a.0 - b.0);
    let dy = i64::from(a.1 - b.1);
    dx * dx + dy * dy
}

/// Scan players for an aggro target: within the entity's aggro radius
/// (Euclidean), with line of sight, closest first. Zero radius disables
/// aggro entirely.
pub fn check_aggro(
    entity: &EntityInstance,
    world: &AiWorld<'_>,
) -> Option<i64> {
    let radius = entity.aggro_radius;
    if radius <= 0 {
        return None;
    }
    let radius_sq = i64::from(radius) * i64::from(radius);
    let origin = (entity.x, entity.y);

    world
        .players
        .iter()
        .filter(|p| euclidean_sq(origin, (p.x, p.y)) <= radius_sq)
        .filter(|p| pathfinding::has_line_of_sight(world.grid, origin, (p.x, p.y)))
        .min_by_key(|p| euclidean_sq(origin, (p.x, p.y)))
        .map(|p| p.player_id)
}

/// Ticks between aggro scans; LOS walks over every nearby player are not
/// free at 20 Hz.
const AGGRO_CHECK_INTERVAL: u64 = 2;

fn should_check_aggro(entity: &mut EntityInstance, tick: u64) -> bool {
    if entity.last_aggro_check_tick != 0
        && tick.saturating_sub(entity.last_aggro_check_tick) < AGGRO_CHECK_INTERVAL
    {
        return false;
    }
    entity.last_aggro_check_tick = tick;
    true
}

fn enter_combat(entity: &mut EntityInstance, target_player_id: i64) {
    entity.state = EntityState::Combat;
    entity.target_player_id = Some(target_player_id);
    entity.wander_target = None;
    entity.los_lost_at_tick = None;
}

fn enter_returning(entity: &mut EntityInstance) {
    entity.state = EntityState::Returning;
    entity.target_player_id = None;
    entity.wander_target = None;
    entity.los_lost_at_tick = None;
}

fn arrive_home<R: Rng>(entity: &mut EntityInstance, config: &AiSection, rng: &mut R) {
    entity.current_hp = entity.max_hp;
    entity.state = EntityState::Idle;
    entity.idle_timer = rng.gen_range(config.idle_min..=config.idle_max);
}

/// One AI step for a live entity. Returns an attack intent when the entity
/// wants to swing this tick.
pub fn step_entity<R: Rng>(
    entity: &mut EntityInstance,
    template: &EntityTemplate,
    world: &AiWorld<'_>,
    rng: &mut R,
) -> Option<AiAttack> {
    match entity.state {
        EntityState::Idle => {
            handle_idle(entity, template, world, rng);
            None
        }
        EntityState::Wander => {
            handle_wander(entity, template, world, rng);
            None
        }
        EntityState::Combat => handle_combat(entity, world),
        EntityState::Returning => {
            handle_returning(entity, world, rng);
            None
        }
        EntityState::Dying | EntityState::Dead => None,
    }
}

pub fn handle_idle<R: Rng>(
    entity: &mut EntityInstance,
    template: &EntityTemplate,
    world: &AiWorld<'_>,
    rng: &mut R,
) {
    entity.idle_timer = entity.idle_timer.saturating_sub(1);

    if template.behavior().seeks_targets() && should_check_aggro(entity, world.tick) {
        if let Some(target) = check_aggro(entity, world) {
            enter_combat(entity, target);
            return;
        }
    }

    if entity.idle_timer == 0 && entity.wander_radius > 0 {
        let target = (
            rng.gen_range(entity.spawn_x - entity.wander_radius..=entity.spawn_x + entity.wander_radius),
            rng.gen_range(entity.spawn_y - entity.wander_radius..=entity.spawn_y + entity.wander_radius),
        );
        entity.wander_target = Some(target);
        entity.state = EntityState::Wander;
        entity.last_move_tick = world.tick;
    }
}

pub fn handle_wander<R: Rng>(
    entity: &mut EntityInstance,
    template: &EntityTemplate,
    world: &AiWorld<'_>,
    rng: &mut R,
) {
    if template.behavior().seeks_targets() && should_check_aggro(entity, world.tick) {
        if let Some(target) = check_aggro(entity, world) {
            enter_combat(entity, target);
            return;
        }
    }

    if world.tick.saturating_sub(entity.last_move_tick) < world.config.wander_interval {
        return;
    }

    let Some(target) = entity.wander_target else {
        entity.wander_target = None;
        entity.state = EntityState::Idle;
        entity.idle_timer = rng.gen_range(world.config.idle_min..=world.config.idle_max);
        return;
    };

    if (entity.x, entity.y) == target {
        entity.wander_target = None;
        entity.state = EntityState::Idle;
        entity.idle_timer = rng.gen_range(world.config.idle_min..=world.config.idle_max);
        return;
    }

    match pathfinding::next_step(
        world.grid,
        (entity.x, entity.y),
        target,
        world.blocked,
        world.config.max_pathfinding_distance,
    ) {
        Some((nx, ny)) => {
            entity.x = nx;
            entity.y = ny;
            entity.last_move_tick = world.tick;
        }
        None => {
            // Unreachable wander target; give up and idle again.
            entity.wander_target = None;
            entity.state = EntityState::Idle;
            entity.idle_timer = rng.gen_range(world.config.idle_min..=world.config.idle_max);
        }
    }
}

pub fn handle_combat(entity: &mut EntityInstance, world: &AiWorld<'_>) -> Option<AiAttack> {
    let Some(target_id) = entity.target_player_id else {
        enter_returning(entity);
        return None;
    };
    // Offline and off-map targets both vanish from the snapshot.
    let Some(target) = world.players.iter().find(|p| p.player_id == target_id) else {
        enter_returning(entity);
        return None;
    };

    // Leash: target dragged the entity too far from home.
    if entity.disengage_radius > 0 {
        let leash_sq =
            i64::from(entity.disengage_radius) * i64::from(entity.disengage_radius);
        if euclidean_sq((entity.spawn_x, entity.spawn_y), (target.x, target.y)) > leash_sq {
            enter_returning(entity);
            return None;
        }
    }

    let has_los = pathfinding::has_line_of_sight(
        world.grid,
        (entity.x, entity.y),
        (target.x, target.y),
    );
    if has_los {
        entity.los_lost_at_tick = None;
    } else {
        let lost_at = *entity.los_lost_at_tick.get_or_insert(world.tick);
        if world.tick.saturating_sub(lost_at) > world.config.los_timeout {
            enter_returning(entity);
            return None;
        }
    }

    if combat::in_attack_range((entity.x, entity.y), (target.x, target.y)) {
        if world.tick.saturating_sub(entity.last_attack_tick) >= world.config.attack_interval {
            entity.last_attack_tick = world.tick;
            return Some(AiAttack {
                target_player_id: target_id,
            });
        }
        return None;
    }

    if world.tick.saturating_sub(entity.last_move_tick) >= world.config.chase_interval {
        if let Some((nx, ny)) = pathfinding::next_step(
            world.grid,
            (entity.x, entity.y),
            (target.x, target.y),
            world.blocked,
            world.config.max_pathfinding_distance,
        ) {
            // Never step onto the target itself; stop adjacent.
            if (nx, ny) != (target.x, target.y) {
                entity.x = nx;
                entity.y = ny;
            }
            entity.last_move_tick = world.tick;
        }
    }

    None
}

pub fn handle_returning<R: Rng>(
    entity: &mut EntityInstance,
    world: &AiWorld<'_>,
    rng: &mut R,
) {
    let spawn = (entity.spawn_x, entity.spawn_y);
    if (entity.x, entity.y) == spawn {
        arrive_home(entity, world.config, rng);
        return;
    }

    if world.tick.saturating_sub(entity.last_move_tick) < world.config.wander_interval {
        return;
    }

    match pathfinding::next_step(
        world.grid,
        (entity.x, entity.y),
        spawn,
        world.blocked,
        world.config.max_pathfinding_distance,
    ) {
        Some((nx, ny)) => {
            entity.x = nx;
            entity.y = ny;
            entity.last_move_tick = world.tick;
        }
        None => {
            // Grid fully blocked between here and home: teleport rather than
            // leaving the entity stranded.
            entity.x = spawn.0;
            entity.y = spawn.1;
            arrive_home(entity, world.config, rng);
        }
    }
}

/// Combat stats an entity template brings to a roll.
pub fn entity_combat_stats(template: &EntityTemplate) -> CombatantStats {
    let bonuses = template.bonuses();
    CombatantStats {
        attack_level: template.skill_level(SkillType::Attack),
        strength_level: template.skill_level(SkillType::Strength),
        defence_level: template.skill_level(SkillType::Defence),
        attack_bonus: bonuses.attack_bonus,
        strength_bonus: bonuses.strength_bonus,
        physical_defence_bonus: bonuses.physical_defence_bonus,
    }
}

/// Run AI for every live entity on a map. Per-entity failures are logged and
/// skipped; the loop always continues. Returns resolved entity attacks for
/// event emission (player HP is already applied).
pub fn process_entities<R: Rng>(
    ctx: &ServerContext,
    map_id: &str,
    now_tick: u64,
    rng: &mut R,
) -> Vec<EntityAttackEvent> {
    if !ctx.config.ai.enabled {
        return Vec::new();
    }
    let Some(map) = ctx.maps.get(map_id) else {
        return Vec::new();
    };
    let grid = map.collision_grid();

    let entities = match ctx.store.map_entities(map_id) {
        Ok(entities) => entities,
        Err(e) => {
            log::error!("AI: listing entities on {map_id}: {e}");
            return Vec::new();
        }
    };
    let players_runtime = match ctx.store.players_on_map(map_id) {
        Ok(players) => players,
        Err(e) => {
            log::error!("AI: listing players on {map_id}: {e}");
            return Vec::new();
        }
    };
    let players: Vec<PlayerOnMap> = players_runtime
        .iter()
        .filter(|p| p.current_hp > 0)
        .map(|p| PlayerOnMap {
            player_id: p.player_id,
            x: p.x,
            y: p.y,
        })
        .collect();

    let mut occupied: HashSet<(i32, i32)> = entities
        .iter()
        .filter(|e| !matches!(e.state, EntityState::Dead | EntityState::Dying))
        .map(|e| (e.x, e.y))
        .collect();
    for player in &players {
        occupied.insert((player.x, player.y));
    }

    let mut events = Vec::new();

    for mut entity in entities {
        let Some(template) = template_by_name(&entity.template_name) else {
            log::error!(
                "AI: entity {} references unknown template '{}'",
                entity.instance_id,
                entity.template_name
            );
            continue;
        };

        // Dying entities wait out the animation window, then move to the
        // respawn queue.
        if entity.state == EntityState::Dying {
            let death_tick = entity.death_tick.unwrap_or(now_tick);
            if now_tick.saturating_sub(death_tick) >= DYING_DURATION_TICKS {
                entity.state = EntityState::Dead;
                let respawn_at = now_tick
                    + u64::from(entity.respawn_time) * u64::from(ctx.config.tick.hot_hz);
                if let Err(e) = ctx.store.despawn_entity(&entity, death_tick, respawn_at) {
                    log::error!("AI: despawning entity {}: {e}", entity.instance_id);
                }
                ctx.visuals
                    .remove_entity(&format!("entity:{}", entity.instance_id));
            }
            continue;
        }
        if entity.state == EntityState::Dead {
            continue;
        }

        let before = entity.clone();

        // Exclude the entity's own tile from the obstacle set for its step.
        occupied.remove(&(before.x, before.y));
        let world = AiWorld {
            config: &ctx.config.ai,
            grid,
            players: &players,
            blocked: &occupied,
            tick: now_tick,
        };

        let attack = step_entity(&mut entity, &template, &world, rng);
        occupied.insert((entity.x, entity.y));

        if let Some(attack) = attack {
            match resolve_entity_attack(ctx, &entity, &template, attack, rng) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => log::error!(
                    "AI: resolving attack from entity {}: {e}",
                    entity.instance_id
                ),
            }
        }

        if entity != before {
            if let Err(e) = ctx.store.write_entity(&entity) {
                log::error!("AI: writing entity {}: {e}", entity.instance_id);
            }
        }
    }

    events
}

fn resolve_entity_attack<R: Rng>(
    ctx: &ServerContext,
    entity: &EntityInstance,
    template: &EntityTemplate,
    attack: AiAttack,
    rng: &mut R,
) -> Result<Option<EntityAttackEvent>, String> {
    let Some(player) = ctx.store.get_player(attack.target_player_id)? else {
        return Ok(None);
    };
    if player.current_hp <= 0 {
        return Ok(None);
    }

    let attacker = entity_combat_stats(template);
    let defender = ctx.player_combat_stats(attack.target_player_id)?;
    let outcome = combat::resolve_attack(rng, &attacker, &defender, player.current_hp);

    if !outcome.miss {
        ctx.store.set_player_hp(
            attack.target_player_id,
            outcome.target_hp_remaining,
            player.max_hp,
        )?;
    }

    Ok(Some(EntityAttackEvent {
        instance_id: entity.instance_id,
        target_player_id: attack.target_player_id,
        outcome,
    }))
}

/// Return every entity targeting `player_id` on a map to its spawn. Called
/// on player death and logout. Returns how many entities were cleared.
pub fn clear_entities_targeting_player(
    ctx: &ServerContext,
    map_id: &str,
    player_id: i64,
) -> usize {
    let targeting = match ctx
        .store
        .entities_targeting_player(&[map_id.to_string()], player_id)
    {
        Ok(targeting) => targeting,
        Err(e) => {
            log::error!("AI: clearing aggro on {map_id}: {e}");
            return 0;
        }
    };
    let mut cleared = 0;
    for mut entity in targeting {
        enter_returning(&mut entity);
        if let Err(e) = ctx.store.write_entity(&entity) {
            log::error!("AI: writing entity {}: {e}", entity.instance_id);
            continue;
        }
        cleared += 1;
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ai_config() -> AiSection {
        AiSection {
            enabled: true,
            wander_interval: 40,
            chase_interval: 10,
            attack_interval: 60,
            idle_min: 20,
            idle_max: 100,
            los_timeout: 100,
            max_pathfinding_distance: 50,
        }
    }

    fn goblin_at(x: i32, y: i32) -> EntityInstance {
        EntityInstance {
            instance_id: 1,
            template_name: "goblin".to_string(),
            map_id: "overworld".to_string(),
            x,
            y,
            spawn_x: x,
            spawn_y: y,
            current_hp: 10,
            max_hp: 10,
            state: EntityState::Idle,
            target_player_id: None,
            wander_radius: 5,
            aggro_radius: 10,
            disengage_radius: 20,
            spawn_point_id: 1,
            respawn_time: 30,
            los_lost_at_tick: None,
            death_tick: None,
            idle_timer: 0,
            wander_target: None,
            last_move_tick: 0,
            last_attack_tick: 0,
            last_aggro_check_tick: 0,
        }
    }

    fn world<'a>(
        config: &'a AiSection,
        grid: &'a CollisionGrid,
        players: &'a [PlayerOnMap],
        blocked: &'a HashSet<(i32, i32)>,
        tick: u64,
    ) -> AiWorld<'a> {
        AiWorld {
            config,
            grid,
            players,
            blocked,
            tick,
        }
    }

    fn player(id: i64, x: i32, y: i32) -> PlayerOnMap {
        PlayerOnMap {
            player_id: id,
            x,
            y,
        }
    }

    fn goblin_template() -> EntityTemplate {
        template_by_name("goblin").unwrap()
    }

    #[test]
    fn test_aggro_detects_nearby_player() {
        // Grid 100x100 all walkable; goblin at (50,50) aggro 10; players at
        // (55,50) and (100,100). The close one is acquired.
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 55, 50), player(101, 100, 100)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        let w = world(&config, &grid, &players, &blocked, 100);

        let mut rng = StdRng::seed_from_u64(1);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);

        assert_eq!(goblin.state, EntityState::Combat);
        assert_eq!(goblin.target_player_id, Some(100));
    }

    #[test]
    fn test_aggro_ignores_distant_player() {
        let config = ai_config();
        let grid = CollisionGrid::open(200, 200);
        let players = vec![player(100, 100, 100)];
        let blocked = HashSet::new();
        let goblin = goblin_at(50, 50);
        let w = world(&config, &grid, &players, &blocked, 100);
        assert_eq!(check_aggro(&goblin, &w), None);
    }

    #[test]
    fn test_aggro_blocked_by_wall() {
        // Wall across y=55 for x in 45..=60; player behind it at (55,60).
        let config = ai_config();
        let mut grid = CollisionGrid::open(100, 100);
        for x in 45..61 {
            grid.set_blocked(x, 55, true);
        }
        let players = vec![player(100, 55, 60)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.aggro_radius = 15;
        let w = world(&config, &grid, &players, &blocked, 100);

        assert_eq!(check_aggro(&goblin, &w), None);
        let mut rng = StdRng::seed_from_u64(1);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Idle);
    }

    #[test]
    fn test_aggro_selects_closest() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![
            player(101, 58, 50),
            player(100, 52, 50),
            player(102, 55, 50),
        ];
        let blocked = HashSet::new();
        let goblin = goblin_at(50, 50);
        let w = world(&config, &grid, &players, &blocked, 100);
        assert_eq!(check_aggro(&goblin, &w), Some(100));
    }

    #[test]
    fn test_aggro_scan_is_throttled() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 52, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.idle_timer = 50;
        goblin.last_aggro_check_tick = 100;
        let mut rng = StdRng::seed_from_u64(1);

        // One tick after the last scan: gated, stays idle.
        let w = world(&config, &grid, &players, &blocked, 101);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Idle);

        // Interval elapsed: the player is acquired.
        let w = world(&config, &grid, &players, &blocked, 102);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Combat);
        assert_eq!(goblin.last_aggro_check_tick, 102);
    }

    #[test]
    fn test_zero_aggro_radius_never_aggros() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 51, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.aggro_radius = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        assert_eq!(check_aggro(&goblin, &w), None);
    }

    #[test]
    fn test_idle_timer_decrements() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.idle_timer = 50;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.idle_timer, 49);
        assert_eq!(goblin.state, EntityState::Idle);
    }

    #[test]
    fn test_idle_transitions_to_wander_within_radius() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.idle_timer = 1;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(9);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);

        assert_eq!(goblin.state, EntityState::Wander);
        assert_eq!(goblin.last_move_tick, 100);
        let (tx, ty) = goblin.wander_target.unwrap();
        assert!((tx - 50).abs() <= 5);
        assert!((ty - 50).abs() <= 5);
    }

    #[test]
    fn test_idle_without_wander_radius_stays_idle() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.wander_radius = 0;
        goblin.idle_timer = 1;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_idle(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Idle);
        assert!(goblin.wander_target.is_none());
    }

    #[test]
    fn test_wander_respects_interval() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Wander;
        goblin.wander_target = Some((55, 50));
        goblin.last_move_tick = 95;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_wander(&mut goblin, &goblin_template(), &w, &mut rng);
        // Interval 40 not elapsed since tick 95.
        assert_eq!((goblin.x, goblin.y), (50, 50));
    }

    #[test]
    fn test_wander_steps_toward_target() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Wander;
        goblin.wander_target = Some((55, 50));
        goblin.last_move_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_wander(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!((goblin.x, goblin.y), (51, 50));
        assert_eq!(goblin.last_move_tick, 100);
    }

    #[test]
    fn test_wander_at_target_returns_to_idle() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(55, 50);
        goblin.state = EntityState::Wander;
        goblin.wander_target = Some((55, 50));
        goblin.last_move_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_wander(&mut goblin, &goblin_template(), &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Idle);
        assert!(goblin.wander_target.is_none());
        assert!((20..=100).contains(&goblin.idle_timer));
    }

    #[test]
    fn test_combat_without_target_returns() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = None;
        let w = world(&config, &grid, &players, &blocked, 100);
        assert!(handle_combat(&mut goblin, &w).is_none());
        assert_eq!(goblin.state, EntityState::Returning);
    }

    #[test]
    fn test_combat_target_left_map_returns() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(999);
        let w = world(&config, &grid, &players, &blocked, 100);
        handle_combat(&mut goblin, &w);
        assert_eq!(goblin.state, EntityState::Returning);
        assert!(goblin.target_player_id.is_none());
    }

    #[test]
    fn test_combat_disengages_when_target_beyond_leash() {
        let config = ai_config();
        let grid = CollisionGrid::open(200, 100);
        let players = vec![player(100, 100, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(100);
        goblin.disengage_radius = 15;
        let w = world(&config, &grid, &players, &blocked, 100);
        handle_combat(&mut goblin, &w);
        assert_eq!(goblin.state, EntityState::Returning);
    }

    #[test]
    fn test_combat_chases_when_not_adjacent() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 55, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(100);
        goblin.last_move_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let attack = handle_combat(&mut goblin, &w);
        assert!(attack.is_none());
        assert_eq!((goblin.x, goblin.y), (51, 50));
        assert_eq!(goblin.last_move_tick, 100);
    }

    #[test]
    fn test_combat_attacks_when_adjacent_and_cooled_down() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 51, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(100);
        goblin.last_attack_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let attack = handle_combat(&mut goblin, &w);
        assert_eq!(
            attack,
            Some(AiAttack {
                target_player_id: 100
            })
        );
        assert_eq!(goblin.last_attack_tick, 100);

        // Immediately after, the cooldown gates the next swing.
        let w2 = world(&config, &grid, &players, &blocked, 110);
        assert!(handle_combat(&mut goblin, &w2).is_none());
    }

    #[test]
    fn test_combat_los_timeout_triggers_return() {
        let config = ai_config();
        let mut grid = CollisionGrid::open(100, 100);
        for x in 45..61 {
            grid.set_blocked(x, 55, true);
        }
        let players = vec![player(100, 55, 60)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(100);
        goblin.los_lost_at_tick = Some(1);
        let w = world(&config, &grid, &players, &blocked, 200);
        handle_combat(&mut goblin, &w);
        // Lost LOS at tick 1, timeout 100, now 200.
        assert_eq!(goblin.state, EntityState::Returning);
    }

    #[test]
    fn test_combat_los_regained_clears_marker() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players = vec![player(100, 55, 50)];
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Combat;
        goblin.target_player_id = Some(100);
        goblin.los_lost_at_tick = Some(90);
        let w = world(&config, &grid, &players, &blocked, 100);
        handle_combat(&mut goblin, &w);
        assert!(goblin.los_lost_at_tick.is_none());
        assert_eq!(goblin.state, EntityState::Combat);
    }

    #[test]
    fn test_returning_at_spawn_heals_and_idles() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.state = EntityState::Returning;
        goblin.current_hp = 3;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_returning(&mut goblin, &w, &mut rng);
        assert_eq!(goblin.state, EntityState::Idle);
        assert_eq!(goblin.current_hp, goblin.max_hp);
        assert!((20..=100).contains(&goblin.idle_timer));
    }

    #[test]
    fn test_returning_steps_toward_spawn() {
        let config = ai_config();
        let grid = CollisionGrid::open(100, 100);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.x = 55;
        goblin.state = EntityState::Returning;
        goblin.last_move_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_returning(&mut goblin, &w, &mut rng);
        assert_eq!((goblin.x, goblin.y), (54, 50));
    }

    #[test]
    fn test_returning_teleports_when_path_fully_blocked() {
        let config = ai_config();
        // Everything blocked except the entity's own tile.
        let mut grid = CollisionGrid::open(100, 100);
        for y in 0..100 {
            for x in 0..100 {
                grid.set_blocked(x, y, true);
            }
        }
        grid.set_blocked(55, 50, false);
        let players: Vec<PlayerOnMap> = Vec::new();
        let blocked = HashSet::new();
        let mut goblin = goblin_at(50, 50);
        goblin.x = 55;
        goblin.current_hp = 4;
        goblin.state = EntityState::Returning;
        goblin.last_move_tick = 0;
        let w = world(&config, &grid, &players, &blocked, 100);
        let mut rng = StdRng::seed_from_u64(1);
        handle_returning(&mut goblin, &w, &mut rng);
        assert_eq!((goblin.x, goblin.y), (50, 50));
        assert_eq!(goblin.state, EntityState::Idle);
        assert_eq!(goblin.current_hp, goblin.max_hp);
    }

    #[test]
    fn test_entity_combat_stats_from_template() {
        let guard = template_by_name("village_guard").unwrap();
        let stats = entity_combat_stats(&guard);
        assert_eq!(stats.attack_level, 30);
        // Equipment-derived: iron shortsword grants attack 10.
        assert_eq!(stats.attack_bonus, 10);
    }

    // Keep the config type honest: process_entities consults tick.hot_hz
    // through the full ServerConfig.
    #[test]
    fn test_full_config_carries_ai_section() {
        let config = ServerConfig::default();
        assert!(config.ai.enabled);
        assert!(config.ai.idle_min <= config.ai.idle_max);
    }
}
