//! Fire resolution and hit resolution.
//!
//! Everything here is a pure function of the shooter or target, the clock
//! and an injected RNG, so the rules can be exercised without a world.

use crate::entity::{Player, PlayerId};
use rand::Rng;
use shared::{Capability, GameConfig, Vec2};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

/// A projectile about to enter the world. The world assigns its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpec {
    pub position: Vec2,
    pub angle: f32,
    pub speed: f32,
    pub damage: f32,
    pub owner: PlayerId,
    pub size: f32,
}

/// Result of one projectile striking a ship.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    /// Shield absorbed the whole hit.
    Blocked,
    Damaged { lethal: bool },
    /// The damage value was unusable and nothing was applied.
    Discarded,
}

/// Minimum time between two shots of `player`.
pub fn reload_time(player: &Player, config: &GameConfig) -> Duration {
    if player.has(Capability::FastReload) {
        config.fast_reload()
    } else {
        config.reload()
    }
}

/// Whether the reload since the last shot has elapsed at `now`.
pub fn can_fire(player: &Player, now: Instant, config: &GameConfig) -> bool {
    match player.last_shot {
        Some(last) => now.saturating_duration_since(last) >= reload_time(player, config),
        None => true,
    }
}

/// Damage carried by each projectile of one shot, or `None` when the
/// derivation does not produce a finite number.
pub fn shot_damage(player: &Player, config: &GameConfig) -> Option<f32> {
    let tier_multiplier = 1.0 + config.combat.tier_damage_step * player.tier as f32;
    let trait_multiplier = if player.has(Capability::HeavyBullet) {
        config.combat.heavy_multiplier
    } else {
        1.0
    };
    let raw = player.damage * tier_multiplier * trait_multiplier;
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().max(1.0))
}

/// Headings of every projectile in one shot: the aim angle, the two
/// flanking shots for spread, and the backwards shot for rear fire.
pub fn shot_angles(player: &Player, aim: f32, config: &GameConfig) -> Vec<f32> {
    let mut angles = vec![aim];
    if player.has(Capability::Spread) {
        let spread = config.bullet.spread_degrees.to_radians();
        angles.push(aim - spread);
        angles.push(aim + spread);
    }
    if player.has(Capability::RearShot) {
        angles.push(aim + PI);
    }
    angles
}

/// Attempts a shot. Returns no projectiles while reloading or when the
/// damage derivation fails; otherwise stamps the shot time.
pub fn fire(
    player: &mut Player,
    aim: f32,
    origin: Vec2,
    now: Instant,
    config: &GameConfig,
) -> Vec<ProjectileSpec> {
    if !can_fire(player, now, config) {
        return Vec::new();
    }
    let Some(damage) = shot_damage(player, config) else {
        return Vec::new();
    };
    player.last_shot = Some(now);

    let origin = if origin.is_finite() {
        origin
    } else {
        player.position
    };
    let size = if player.has(Capability::HeavyBullet) {
        config.bullet.heavy_size
    } else {
        config.bullet.size
    };

    shot_angles(player, aim, config)
        .into_iter()
        .map(|angle| ProjectileSpec {
            position: origin,
            angle,
            speed: config.bullet.speed,
            damage,
            owner: player.id,
            size,
        })
        .collect()
}

/// Applies `damage` to the shield pool first and spills the remainder onto
/// health in the same step. Health never drops below zero.
pub fn apply_damage(target: &mut Player, damage: f32, now: Instant) {
    let absorbed = damage.min(target.shield_health).max(0.0);
    target.shield_health -= absorbed;
    let remainder = damage - absorbed;
    target.health = (target.health - remainder).clamp(0.0, target.max_health);
    target.last_damage = Some(now);
}

/// Resolves one projectile striking `target`.
pub fn resolve_hit(
    target: &mut Player,
    damage: f32,
    now: Instant,
    rng: &mut impl Rng,
    config: &GameConfig,
) -> HitOutcome {
    if !damage.is_finite() || damage <= 0.0 {
        return HitOutcome::Discarded;
    }
    if target.has(Capability::Shield) && rng.gen_bool(config.shield.block_chance) {
        return HitOutcome::Blocked;
    }
    apply_damage(target, damage, now);
    HitOutcome::Damaged {
        lethal: !target.is_alive(),
    }
}

/// Tops up the shield of an eligible ship that has gone long enough without
/// taking damage.
pub fn regenerate_shield(player: &mut Player, now: Instant, config: &GameConfig) {
    if !player.has(Capability::Shield) || player.shield_health >= player.shield_capacity {
        return;
    }
    let rested = match player.last_damage {
        Some(last) => now.saturating_duration_since(last) > config.shield_regen_delay(),
        None => true,
    };
    if rested {
        player.shield_health =
            (player.shield_health + config.shield.regen_per_tick).min(player.shield_capacity);
    }
}
