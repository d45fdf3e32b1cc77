//! Server-side entity records. Only the simulation mutates these; clients see
//! the read-only `*State` copies from `shared::protocol`.

use shared::{BulletState, Capability, GameConfig, PlayerState, ShipTrait, StarState, Vec2};
use std::time::Instant;

/// Player identity, allocated by the world and never reused in a process.
pub type PlayerId = u32;

/// A living ship. Stats are derived from the tier table on every tier
/// change and never set directly by clients.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub position: Vec2,
    /// Facing, in radians.
    pub angle: f32,
    pub tier: usize,
    pub exp: f32,
    pub health: f32,
    pub max_health: f32,
    pub shield_health: f32,
    pub shield_capacity: f32,
    /// Tier base damage, cached when the tier is applied.
    pub damage: f32,
    pub ship_trait: ShipTrait,
    pub last_shot: Option<Instant>,
    pub last_damage: Option<Instant>,
}

impl Player {
    /// Creates a fresh tier-0 ship.
    pub fn new(id: PlayerId, username: String, position: Vec2, config: &GameConfig) -> Self {
        let mut player = Self {
            id,
            username,
            position,
            angle: 0.0,
            tier: 0,
            exp: 0.0,
            health: 0.0,
            max_health: 0.0,
            shield_health: 0.0,
            shield_capacity: 0.0,
            damage: 0.0,
            ship_trait: config.tier(0).ship_trait,
            last_shot: None,
            last_damage: None,
        };
        player.apply_tier(0, config);
        player
    }

    /// Resets health, shield, damage and trait to the base values of `tier`.
    pub fn apply_tier(&mut self, tier: usize, config: &GameConfig) {
        let spec = config.tier(tier);
        self.tier = tier.min(config.tiers.len() - 1);
        self.max_health = spec.health;
        self.health = spec.health;
        self.damage = spec.damage;
        self.ship_trait = spec.ship_trait;
        self.shield_capacity = if spec.ship_trait.has(Capability::Shield) {
            config.shield.capacity
        } else {
            0.0
        };
        self.shield_health = self.shield_capacity;
    }

    /// Whether the ship's current trait grants `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        self.ship_trait.has(capability)
    }

    /// A ship with no health left is destroyed.
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Wire view of this ship for snapshots and respawn replies.
    pub fn state(&self) -> PlayerState {
        PlayerState {
            id: self.id,
            username: self.username.clone(),
            x: self.position.x,
            y: self.position.y,
            angle: self.angle,
            tier: self.tier,
            exp: self.exp,
            health: self.health,
            max_health: self.max_health,
            shield_health: self.shield_health,
            damage: self.damage,
            ship_trait: self.ship_trait,
        }
    }
}

/// A collectible that grants experience on contact.
#[derive(Debug, Clone)]
pub struct Star {
    pub id: u32,
    pub position: Vec2,
    pub value: u32,
}

impl From<&Star> for StarState {
    fn from(star: &Star) -> Self {
        StarState {
            id: star.id,
            x: star.position.x,
            y: star.position.y,
            value: star.value,
        }
    }
}

/// A projectile in flight. Damage is fixed when it is fired.
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: u32,
    pub position: Vec2,
    pub angle: f32,
    /// Distance covered per tick.
    pub speed: f32,
    /// Fixed at creation.
    pub damage: f32,
    pub owner: PlayerId,
    pub size: f32,
}

impl Bullet {
    /// Moves the bullet one tick along its heading.
    pub fn advance(&mut self) {
        self.position = self
            .position
            .add(&Vec2::from_angle(self.angle).scale(self.speed));
    }

    /// A bullet carrying anything but a finite positive damage is inert and
    /// gets discarded.
    pub fn has_valid_damage(&self) -> bool {
        self.damage.is_finite() && self.damage > 0.0
    }
}

impl From<&Bullet> for BulletState {
    fn from(bullet: &Bullet) -> Self {
        BulletState {
            id: bullet.id,
            x: bullet.position.x,
            y: bullet.position.y,
            angle: bullet.angle,
            speed: bullet.speed,
            damage: bullet.damage,
            owner_id: bullet.owner,
            size: bullet.size,
        }
    }
}
