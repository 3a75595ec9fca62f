//! Entity materialization: initial spawns from Tiled spawn points and
//! re-materialization from the respawn queue, with collision fallback.

use std::collections::HashSet;

use crate::context::ServerContext;
use crate::entities::{template_by_name, EntityState};
use crate::pathfinding;
use crate::store::entities::{EntityInstance, RespawnRecord};

/// Spiral search bound for occupied spawn tiles.
const RESPAWN_SEARCH_RADIUS: i32 = 10;

fn instance_from_template(
    template_name: &str,
    map_id: &str,
    x: i32,
    y: i32,
    spawn_x: i32,
    spawn_y: i32,
    spawn_point_id: u32,
    wander_radius: i32,
    aggro_radius: i32,
    disengage_radius: i32,
    respawn_time: u32,
    max_hp: i32,
) -> EntityInstance {
    EntityInstance {
        instance_id: 0,
        template_name: template_name.to_string(),
        map_id: map_id.to_string(),
        x,
        y,
        spawn_x,
        spawn_y,
        current_hp: max_hp,
        max_hp,
        state: EntityState::Idle,
        target_player_id: None,
        wander_radius,
        aggro_radius,
        disengage_radius,
        spawn_point_id,
        respawn_time,
        los_lost_at_tick: None,
        death_tick: None,
        idle_timer: 0,
        wander_target: None,
        last_move_tick: 0,
        last_attack_tick: 0,
        last_aggro_check_tick: 0,
    }
}

/// Spawn every entity defined by a map's spawn points. Per-spawn failures
/// are logged and skipped. Returns the number spawned.
pub fn spawn_map_entities(ctx: &ServerContext, map_id: &str) -> usize {
    let Some(map) = ctx.maps.get(map_id) else {
        log::warn!("Spawn: map '{map_id}' not loaded");
        return 0;
    };

    let mut spawned = 0;
    for point in &map.spawn_points {
        let Some(template) = template_by_name(&point.template_name) else {
            log::error!(
                "Spawn point {} on '{map_id}' references unknown template '{}'",
                point.id,
                point.template_name
            );
            continue;
        };

        let instance = instance_from_template(
            template.name(),
            map_id,
            point.x,
            point.y,
            point.x,
            point.y,
            point.id,
            point.wander_radius,
            point.aggro_override.unwrap_or_else(|| template.aggro_radius()),
            point
                .disengage_override
                .unwrap_or_else(|| template.disengage_radius()),
            template.respawn_time(),
            template.max_hp(),
        );

        match ctx.store.spawn_entity_instance(instance) {
            Ok(instance) => {
                log::debug!(
                    "Spawned {} #{} at ({}, {}) on '{map_id}'",
                    instance.template_name,
                    instance.instance_id,
                    instance.x,
                    instance.y
                );
                spawned += 1;
            }
            Err(e) => log::error!("Spawning '{}' on '{map_id}': {e}", point.template_name),
        }
    }

    if spawned > 0 {
        log::info!("Spawned {spawned} entities on '{map_id}'");
    }
    spawned
}

/// Find where a respawning entity materializes: the spawn tile, or the
/// nearest open tile when something is standing there.
pub fn find_respawn_position(
    ctx: &ServerContext,
    map_id: &str,
    spawn_x: i32,
    spawn_y: i32,
) -> (i32, i32) {
    let Some(map) = ctx.maps.get(map_id) else {
        return (spawn_x, spawn_y);
    };

    let mut occupied: HashSet<(i32, i32)> = HashSet::new();
    if let Ok(entities) = ctx.store.map_entities(map_id) {
        for entity in entities {
            if !matches!(entity.state, EntityState::Dead) {
                occupied.insert((entity.x, entity.y));
            }
        }
    }
    if let Ok(players) = ctx.store.players_on_map(map_id) {
        for player in players {
            occupied.insert((player.x, player.y));
        }
    }

    pathfinding::find_nearest_open_tile(
        map.collision_grid(),
        (spawn_x, spawn_y),
        &occupied,
        RESPAWN_SEARCH_RADIUS,
    )
    .unwrap_or((spawn_x, spawn_y))
}

/// Re-materialize one entity from its respawn record: full HP, idle state,
/// at the spawn point (with collision fallback). The instance id is reused.
pub fn respawn_entity(ctx: &ServerContext, record: &RespawnRecord) -> Result<(), String> {
    let (x, y) = find_respawn_position(ctx, &record.map_id, record.spawn_x, record.spawn_y);
    if (x, y) != (record.spawn_x, record.spawn_y) {
        log::debug!(
            "Respawn of entity {} moved from ({}, {}) to ({x}, {y})",
            record.instance_id,
            record.spawn_x,
            record.spawn_y
        );
    }

    let mut instance = instance_from_template(
        &record.template_name,
        &record.map_id,
        x,
        y,
        record.spawn_x,
        record.spawn_y,
        record.spawn_point_id,
        record.wander_radius,
        record.aggro_radius,
        record.disengage_radius,
        record.respawn_time,
        record.max_hp,
    );
    instance.instance_id = record.instance_id;
    ctx.store.write_entity(&instance)
}
