//! The authoritative world: every player, star and bullet, plus the rules
//! that move them. Nothing in here performs I/O; state changes that a client
//! must hear about come back as [`WorldEvent`]s addressed by player identity.

use crate::combat::{self, HitOutcome, ProjectileSpec};
use crate::entity::{Bullet, Player, PlayerId, Star};
use crate::progression::{self, LevelUp};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{BulletState, GameConfig, ServerMessage, StarState, Vec2, MAX_USERNAME_LEN};
use std::collections::BTreeMap;
use std::time::Instant;

/// Point events produced by intents and ticks, each meant for one player.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Hit {
        target: PlayerId,
        health: f32,
        shield_health: f32,
    },
    Died {
        target: PlayerId,
        killer: PlayerId,
    },
    LevelUp(LevelUp),
}

impl WorldEvent {
    /// The player whose connection should receive this event.
    pub fn recipient(&self) -> PlayerId {
        match self {
            WorldEvent::Hit { target, .. } | WorldEvent::Died { target, .. } => *target,
            WorldEvent::LevelUp(level_up) => level_up.player,
        }
    }
}

/// Owns every entity of one match along with the rules that change them.
///
/// Players are keyed by identity in a `BTreeMap`, so collision checks visit
/// them in ascending id order. All randomness (spawns, star values, shield
/// blocks) comes from the world's own RNG.
pub struct World {
    config: GameConfig,
    pub tick: u64,
    players: BTreeMap<PlayerId, Player>,
    stars: Vec<Star>,
    bullets: Vec<Bullet>,
    next_player_id: PlayerId,
    next_star_id: u32,
    next_bullet_id: u32,
    rng: StdRng,
}

impl World {
    /// Creates a world seeded from OS entropy and fills the star field.
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic world for replays and tests.
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        let mut world = Self {
            config,
            tick: 0,
            players: BTreeMap::new(),
            stars: Vec::new(),
            bullets: Vec::new(),
            next_player_id: 1,
            next_star_id: 1,
            next_bullet_id: 1,
            rng,
        };
        while world.stars.len() < world.config.stars.initial {
            world.spawn_star();
        }
        world
    }

    /// The rules this world was built with.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Looks up a living ship by identity.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable access to a living ship, for tests and tooling.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Iterates living ships in ascending identity order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of living ships.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Pickups currently on the map.
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Projectiles currently in flight.
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Creates a tier-0 ship at a random spawn point. Returns `None` when the
    /// name is blank or longer than [`MAX_USERNAME_LEN`] characters.
    pub fn add_player(&mut self, username: &str) -> Option<PlayerId> {
        let position = self.spawn_point();
        self.add_player_at(username, position)
    }

    /// Creates a tier-0 ship at `position`, clamped to the map. The name is
    /// stored exactly as given since clients find their own ship by it.
    pub fn add_player_at(&mut self, username: &str, position: Vec2) -> Option<PlayerId> {
        if username.trim().is_empty() || username.chars().count() > MAX_USERNAME_LEN {
            debug!("Rejecting join with name {:?}", username);
            return None;
        }
        let username = username.to_string();

        let id = self.next_player_id;
        self.next_player_id += 1;
        let position = self.config.bounds().clamp(&position);
        let player = Player::new(id, username, position, &self.config);

        info!(
            "Added player {} ({}) at ({:.0}, {:.0})",
            id, player.username, position.x, position.y
        );
        self.players.insert(id, player);
        Some(id)
    }

    /// Removes a ship immediately. Its bullets stay in flight; a reward they
    /// earn later is dropped because the owner is gone.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    /// Picks a point inside the edge margin, preferring one clear of every
    /// living ship. Falls back to the roomiest candidate tried.
    pub fn spawn_point(&mut self) -> Vec2 {
        let bounds = self.config.bounds();
        let spawn = &self.config.spawn;
        let margin_x = spawn.margin.min(bounds.width / 2.0);
        let margin_y = spawn.margin.min(bounds.height / 2.0);

        let mut best = Vec2::new(bounds.width / 2.0, bounds.height / 2.0);
        let mut best_clearance = f32::NEG_INFINITY;

        for _ in 0..spawn.attempts.max(1) {
            let candidate = Vec2::new(
                self.rng.gen_range(margin_x..=bounds.width - margin_x),
                self.rng.gen_range(margin_y..=bounds.height - margin_y),
            );
            let clearance = self
                .players
                .values()
                .map(|p| p.position.distance(&candidate))
                .fold(f32::INFINITY, f32::min);

            if clearance >= spawn.min_distance {
                return candidate;
            }
            if clearance > best_clearance {
                best = candidate;
                best_clearance = clearance;
            }
        }
        best
    }

    /// Applies a client-reported position. The position is clamped to the
    /// map but never checked against elapsed time. Any star within reach is
    /// collected on the spot.
    pub fn move_player(&mut self, id: PlayerId, x: f32, y: f32, angle: f32) -> Vec<WorldEvent> {
        if !(x.is_finite() && y.is_finite() && angle.is_finite()) {
            return Vec::new();
        }
        let bounds = self.config.bounds();
        let Some(player) = self.players.get_mut(&id) else {
            return Vec::new();
        };
        player.position = bounds.clamp(&Vec2::new(x, y));
        player.angle = angle;

        self.collect_stars(id)
    }

    /// Sets a ship's facing. Returns false for unknown ships and
    /// non-finite angles.
    pub fn rotate_player(&mut self, id: PlayerId, angle: f32) -> bool {
        if !angle.is_finite() {
            return false;
        }
        match self.players.get_mut(&id) {
            Some(player) => {
                player.angle = angle;
                true
            }
            None => false,
        }
    }

    /// Fires for `id` if the reload allows it. Returns the number of
    /// projectiles that entered the world.
    pub fn fire(&mut self, id: PlayerId, aim: f32, origin: Vec2, now: Instant) -> usize {
        if !aim.is_finite() {
            return 0;
        }
        let Some(player) = self.players.get_mut(&id) else {
            return 0;
        };
        let specs = combat::fire(player, aim, origin, now, &self.config);
        specs
            .into_iter()
            .filter_map(|spec| self.insert_bullet(spec))
            .count()
    }

    /// Adds a projectile, refusing one whose damage is not finite and
    /// positive.
    pub fn insert_bullet(&mut self, spec: ProjectileSpec) -> Option<u32> {
        if !spec.damage.is_finite() || spec.damage <= 0.0 {
            debug!("Discarding projectile from {} with damage {}", spec.owner, spec.damage);
            return None;
        }
        let id = self.next_bullet_id;
        self.next_bullet_id = self.next_bullet_id.wrapping_add(1);
        self.bullets.push(Bullet {
            id,
            position: spec.position,
            angle: spec.angle,
            speed: spec.speed,
            damage: spec.damage,
            owner: spec.owner,
            size: spec.size,
        });
        Some(id)
    }

    /// Places a pickup worth `value` experience and returns its identity.
    pub fn insert_star(&mut self, position: Vec2, value: u32) -> u32 {
        let id = self.next_star_id;
        self.next_star_id = self.next_star_id.wrapping_add(1);
        self.stars.push(Star {
            id,
            position,
            value,
        });
        id
    }

    fn spawn_star(&mut self) {
        let bounds = self.config.bounds();
        let position = Vec2::new(
            self.rng.gen_range(0.0..=bounds.width),
            self.rng.gen_range(0.0..=bounds.height),
        );
        let value = self
            .rng
            .gen_range(self.config.stars.min_value..=self.config.stars.max_value);
        self.insert_star(position, value);
    }

    /// Refills the star field to its initial size once it drops below the
    /// floor.
    fn replenish_stars(&mut self) {
        if self.stars.len() >= self.config.stars.minimum {
            return;
        }
        let missing = self.config.stars.initial.saturating_sub(self.stars.len());
        for _ in 0..missing {
            self.spawn_star();
        }
        debug!("Replenished {} stars", missing);
    }

    fn collect_stars(&mut self, id: PlayerId) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        let Some(position) = self.players.get(&id).map(|p| p.position) else {
            return events;
        };
        let radius = self.config.stars.pickup_radius;

        let mut collected = Vec::new();
        self.stars.retain(|star| {
            if star.position.within(&position, radius) {
                collected.push(star.value);
                false
            } else {
                true
            }
        });

        for value in collected {
            self.award(id, value as f32, &mut events);
        }
        self.replenish_stars();
        events
    }

    fn award(&mut self, id: PlayerId, amount: f32, events: &mut Vec<WorldEvent>) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        if let Some(level_up) = progression::apply_experience(player, amount, &self.config) {
            events.push(WorldEvent::LevelUp(level_up));
        }
    }

    /// Advances the simulation one step: moves bullets and culls those that
    /// left the map, resolves bullet/ship collisions, regenerates shields.
    pub fn tick(&mut self, now: Instant) -> Vec<WorldEvent> {
        self.tick += 1;
        let mut events = Vec::new();

        let bounds = self.config.bounds();
        for bullet in &mut self.bullets {
            bullet.advance();
        }
        self.bullets
            .retain(|bullet| bullet.has_valid_damage() && bounds.contains(&bullet.position));

        let radius = self.config.bullet.hit_radius;
        let in_flight = std::mem::take(&mut self.bullets);
        let mut survivors = Vec::with_capacity(in_flight.len());
        for bullet in in_flight {
            let target = self
                .players
                .values()
                .find(|p| p.id != bullet.owner && p.position.within(&bullet.position, radius))
                .map(|p| p.id);
            match target {
                Some(target) => self.resolve_hit(&bullet, target, now, &mut events),
                None => survivors.push(bullet),
            }
        }
        self.bullets = survivors;

        for player in self.players.values_mut() {
            combat::regenerate_shield(player, now, &self.config);
        }

        events
    }

    fn resolve_hit(
        &mut self,
        bullet: &Bullet,
        target_id: PlayerId,
        now: Instant,
        events: &mut Vec<WorldEvent>,
    ) {
        let Some(target) = self.players.get_mut(&target_id) else {
            return;
        };
        let outcome = combat::resolve_hit(target, bullet.damage, now, &mut self.rng, &self.config);
        let (health, shield_health) = (target.health, target.shield_health);

        let lethal = match outcome {
            HitOutcome::Discarded => return,
            HitOutcome::Blocked => {
                events.push(WorldEvent::Hit {
                    target: target_id,
                    health,
                    shield_health,
                });
                return;
            }
            HitOutcome::Damaged { lethal } => lethal,
        };

        events.push(WorldEvent::Hit {
            target: target_id,
            health,
            shield_health,
        });

        let mut reward = self.config.combat.hit_exp;
        if lethal {
            if let Some(dead) = self.players.remove(&target_id) {
                info!(
                    "Player {} ({}) destroyed by player {}",
                    dead.id, dead.username, bullet.owner
                );
            }
            events.push(WorldEvent::Died {
                target: target_id,
                killer: bullet.owner,
            });
            reward += self.config.combat.kill_exp;
        }
        self.award(bullet.owner, reward, events);
    }

    /// Builds the full world view broadcast to every connection each tick.
    pub fn snapshot(&self) -> ServerMessage {
        ServerMessage::GameState {
            players: self.players.values().map(Player::state).collect(),
            stars: self.stars.iter().map(StarState::from).collect(),
            bullets: self.bullets.iter().map(BulletState::from).collect(),
        }
    }
}
