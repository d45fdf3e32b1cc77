//! Ship tiers and the combat traits they unlock.

use serde::{Deserialize, Serialize};

/// A single combat modifier a trait can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Halves the reload cooldown.
    FastReload,
    /// Two extra projectiles flanking the aim angle.
    Spread,
    /// Carries a shield pool, may block hits outright, regenerates.
    Shield,
    /// Damage multiplier and a larger projectile.
    HeavyBullet,
    /// One extra projectile fired backwards.
    RearShot,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::FastReload,
        Capability::Spread,
        Capability::Shield,
        Capability::HeavyBullet,
        Capability::RearShot,
    ];
}

/// The trait a tier grants. Serialized with the display names the
/// browser client shows in its HUD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipTrait {
    #[serde(rename = "Fast Reload")]
    FastReload,
    #[serde(rename = "Triple Shot")]
    TripleShot,
    #[serde(rename = "Shield")]
    Shield,
    #[serde(rename = "Heavy Bullet")]
    HeavyBullet,
    #[serde(rename = "Rear Shot")]
    RearShot,
    #[serde(rename = "All Traits")]
    AllTraits,
}

impl ShipTrait {
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            ShipTrait::FastReload => &[Capability::FastReload],
            ShipTrait::TripleShot => &[Capability::Spread],
            ShipTrait::Shield => &[Capability::Shield],
            ShipTrait::HeavyBullet => &[Capability::HeavyBullet],
            ShipTrait::RearShot => &[Capability::RearShot],
            ShipTrait::AllTraits => &Capability::ALL,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// One row of the tier table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSpec {
    pub name: String,
    /// Presentation only.
    pub color: String,
    pub health: f32,
    pub damage: f32,
    /// Cumulative experience needed to leave this tier. `None` marks the
    /// terminal tier.
    pub exp_to_next_level: Option<f32>,
    #[serde(rename = "trait")]
    pub ship_trait: ShipTrait,
}

impl TierSpec {
    pub fn new(
        name: &str,
        color: &str,
        health: f32,
        damage: f32,
        exp_to_next_level: Option<f32>,
        ship_trait: ShipTrait,
    ) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            health,
            damage,
            exp_to_next_level,
            ship_trait,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.exp_to_next_level.is_none()
    }
}

/// The stock six-tier progression.
pub fn default_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::new("Scout", "#fff", 100.0, 10.0, Some(100.0), ShipTrait::FastReload),
        TierSpec::new("Fighter", "#ff0", 150.0, 12.0, Some(250.0), ShipTrait::TripleShot),
        TierSpec::new("Destroyer", "#0ff", 200.0, 15.0, Some(500.0), ShipTrait::Shield),
        TierSpec::new("Battleship", "#f0f", 300.0, 20.0, Some(1000.0), ShipTrait::HeavyBullet),
        TierSpec::new("Dreadnought", "#0f0", 500.0, 25.0, Some(2000.0), ShipTrait::RearShot),
        TierSpec::new("Titan", "#f00", 1000.0, 35.0, None, ShipTrait::AllTraits),
    ]
}
