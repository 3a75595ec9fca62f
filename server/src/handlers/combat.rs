//! CMD_ATTACK and CMD_TOGGLE_AUTO_RETALIATE.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::protocol::{
    codes, AttackPayload, CombatActionPayload, ErrorCategory, Frame, HitSplat, MessageType,
    TargetKind, ToggleAutoRetaliatePayload,
};

use crate::ai;
use crate::combat::{self, DYING_DURATION_TICKS};
use crate::context::ServerContext;
use crate::entities::{template_by_name, EntityState};
use crate::handlers::{send_error, send_internal_error, send_success};
use crate::pathfinding;
use crate::session::{DirtyFlags, Session};

pub fn handle_attack(ctx: &Arc<ServerContext>, session: &Arc<Session>, frame: &Frame) {
    let payload: AttackPayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::ATTACK_INVALID_TARGET,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    // PvP is out of scope; only entities can be attacked.
    if payload.target_kind != TargetKind::Entity {
        send_error(
            session,
            frame.id.clone(),
            codes::ATTACK_INVALID_TARGET,
            ErrorCategory::Validation,
            "Players cannot be attacked",
        );
        return;
    }

    let attacker = match ctx.store.get_player(session.player_id) {
        Ok(Some(rt)) => rt,
        Ok(None) => {
            send_error(
                session,
                frame.id.clone(),
                codes::PLAYER_NOT_ONLINE,
                ErrorCategory::Conflict,
                "No runtime state for this session",
            );
            return;
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "attack: reading player", &e);
            return;
        }
    };

    let mut entity = match ctx.store.get_entity(payload.target_id) {
        Ok(Some(entity)) => entity,
        Ok(None) => {
            send_error(
                session,
                frame.id.clone(),
                codes::ATTACK_INVALID_TARGET,
                ErrorCategory::Validation,
                "No such target",
            );
            return;
        }
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "attack: reading target", &e);
            return;
        }
    };

    if entity.map_id != attacker.map_id
        || matches!(entity.state, EntityState::Dead | EntityState::Dying)
    {
        send_error(
            session,
            frame.id.clone(),
            codes::ATTACK_INVALID_TARGET,
            ErrorCategory::Conflict,
            "That target is gone",
        );
        return;
    }

    let Some(template) = template_by_name(&entity.template_name) else {
        send_internal_error(
            session,
            frame.id.clone(),
            "attack",
            &format!("unknown template '{}'", entity.template_name),
        );
        return;
    };
    if !template.is_attackable() {
        send_error(
            session,
            frame.id.clone(),
            codes::ATTACK_NOT_ATTACKABLE,
            ErrorCategory::Validation,
            format!("{} cannot be attacked", template.display_name()),
        );
        return;
    }

    if !combat::in_attack_range((attacker.x, attacker.y), (entity.x, entity.y)) {
        send_error(
            session,
            frame.id.clone(),
            codes::ATTACK_OUT_OF_RANGE,
            ErrorCategory::Validation,
            "Target is out of reach",
        );
        return;
    }

    let Some(map) = ctx.maps.get(&attacker.map_id) else {
        send_internal_error(
            session,
            frame.id.clone(),
            "attack",
            &format!("map '{}' not loaded", attacker.map_id),
        );
        return;
    };
    if !pathfinding::has_line_of_sight(
        map.collision_grid(),
        (attacker.x, attacker.y),
        (entity.x, entity.y),
    ) {
        send_error(
            session,
            frame.id.clone(),
            codes::ATTACK_NO_LOS,
            ErrorCategory::Validation,
            "You cannot see the target",
        );
        return;
    }

    let attacker_stats = match ctx.player_combat_stats(session.player_id) {
        Ok(stats) => stats,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "attack: reading stats", &e);
            return;
        }
    };
    let defender_stats = ai::entity_combat_stats(&template);

    let now_tick = ctx.current_tick();
    session.last_attack_tick.store(now_tick, Ordering::SeqCst);
    let outcome = combat::resolve_attack(
        &mut rand::thread_rng(),
        &attacker_stats,
        &defender_stats,
        entity.current_hp,
    );

    entity.current_hp = outcome.target_hp_remaining;
    if outcome.target_died {
        entity.state = EntityState::Dying;
        entity.death_tick = Some(now_tick);
        entity.target_player_id = None;
        log::info!(
            "Entity {} ({}) killed by player {}; dying for {} ticks",
            entity.instance_id,
            entity.template_name,
            session.player_id,
            DYING_DURATION_TICKS
        );
    } else if entity.target_player_id.is_none()
        && template.behavior().retaliates()
        && matches!(entity.state, EntityState::Idle | EntityState::Wander)
    {
        entity.state = EntityState::Combat;
        entity.target_player_id = Some(session.player_id);
        entity.wander_target = None;
        entity.los_lost_at_tick = None;
    }
    if let Err(e) = ctx.store.write_entity(&entity) {
        send_internal_error(session, frame.id.clone(), "attack: writing target", &e);
        return;
    }

    // XP in proportion to damage dealt.
    if outcome.damage > 0 {
        for (skill, xp) in combat::xp_awards(outcome.damage) {
            if let Err(e) = ctx.repo.add_skill_xp(session.player_id, skill, xp) {
                log::error!("Awarding {xp} {} xp to {}: {e}", skill.as_str(), session.player_id);
            }
        }
        session.mark_dirty(DirtyFlags::STATS);
    }
    if outcome.target_died {
        let reward = template.xp_reward();
        if reward > 0 {
            if let Err(e) = ctx
                .repo
                .add_skill_xp(session.player_id, common::skills::SkillType::Hitpoints, reward)
            {
                log::error!("Awarding kill xp to {}: {e}", session.player_id);
            }
        }
    }

    let action = CombatActionPayload {
        attacker_kind: TargetKind::Player,
        attacker_id: session.player_id as u64,
        target_kind: TargetKind::Entity,
        target_id: entity.instance_id,
        damage: outcome.damage,
        miss: outcome.miss,
        target_hp_remaining: outcome.target_hp_remaining,
        target_died: outcome.target_died,
    };
    if let Ok(event) = Frame::event(MessageType::EventCombatAction, &action) {
        ctx.broadcast_to_observers(&attacker.map_id, (entity.x, entity.y), event.clone(), None);
    }
    ctx.queue_hit_splat(
        &attacker.map_id,
        HitSplat {
            target_kind: TargetKind::Entity,
            target_id: entity.instance_id,
            amount: outcome.damage,
            miss: outcome.miss,
        },
    );

    send_success(session, frame.id.clone(), &action);
}

pub fn handle_toggle_auto_retaliate(
    ctx: &Arc<ServerContext>,
    session: &Arc<Session>,
    frame: &Frame,
) {
    let payload: ToggleAutoRetaliatePayload = match frame.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            send_error(
                session,
                frame.id.clone(),
                codes::SYS_INTERNAL_ERROR,
                ErrorCategory::Validation,
                e,
            );
            return;
        }
    };

    let current = match ctx.store.get_player(session.player_id) {
        Ok(Some(rt)) => rt.auto_retaliate,
        Ok(None) => true,
        Err(e) => {
            send_internal_error(session, frame.id.clone(), "toggle retaliate", &e);
            return;
        }
    };
    let enabled = payload.enabled.unwrap_or(!current);
    if let Err(e) = ctx.store.set_auto_retaliate(session.player_id, enabled) {
        send_internal_error(session, frame.id.clone(), "toggle retaliate: write", &e);
        return;
    }

    #[derive(serde::Serialize)]
    struct ToggleResult {
        enabled: bool,
    }
    send_success(session, frame.id.clone(), &ToggleResult { enabled });
}
