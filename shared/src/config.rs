//! Game configuration surface.
//!
//! Every balancing constant the simulation consults lives here. The server
//! loads a [`GameConfig`] once at startup, optionally from a JSON file where
//! any omitted field keeps its default, and treats it as immutable afterwards.

use crate::geometry::Bounds;
use crate::tiers::{default_tiers, TierSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 4000.0,
            height: 3000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulletConfig {
    /// Distance travelled per tick.
    pub speed: f32,
    pub size: f32,
    pub heavy_size: f32,
    /// Collision radius around a ship's centre.
    pub hit_radius: f32,
    /// Angle between the centre shot and each flanking shot.
    pub spread_degrees: f32,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            speed: 10.0,
            size: 3.0,
            heavy_size: 5.0,
            hit_radius: 20.0,
            spread_degrees: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CombatConfig {
    pub reload_ms: u64,
    pub fast_reload_ms: u64,
    /// Damage grows by this fraction of the tier base per tier index.
    pub tier_damage_step: f32,
    pub heavy_multiplier: f32,
    pub hit_exp: f32,
    pub kill_exp: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            reload_ms: 500,
            fast_reload_ms: 250,
            tier_damage_step: 0.1,
            heavy_multiplier: 1.5,
            hit_exp: 5.0,
            kill_exp: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShieldConfig {
    pub capacity: f32,
    /// Probability in `[0, 1]` that a hit on a shielded ship is absorbed whole.
    pub block_chance: f64,
    pub regen_per_tick: f32,
    pub regen_delay_ms: u64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            capacity: 50.0,
            block_chance: 0.3,
            regen_per_tick: 0.5,
            regen_delay_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StarConfig {
    pub initial: usize,
    /// Dropping below this count refills the field back to `initial`.
    pub minimum: usize,
    pub pickup_radius: f32,
    pub min_value: u32,
    pub max_value: u32,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            initial: 200,
            minimum: 100,
            pickup_radius: 20.0,
            min_value: 1,
            max_value: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpawnConfig {
    /// Keep spawn points this far from the map edge.
    pub margin: f32,
    /// Preferred clearance from every living ship.
    pub min_distance: f32,
    pub attempts: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            margin: 100.0,
            min_distance: 150.0,
            attempts: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    pub map: MapConfig,
    pub tiers: Vec<TierSpec>,
    pub bullet: BulletConfig,
    pub combat: CombatConfig,
    pub shield: ShieldConfig,
    pub stars: StarConfig,
    pub spawn: SpawnConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            tiers: default_tiers(),
            bullet: BulletConfig::default(),
            combat: CombatConfig::default(),
            shield: ShieldConfig::default(),
            stars: StarConfig::default(),
            spawn: SpawnConfig::default(),
        }
    }
}

impl GameConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates rules from JSON text. Omitted fields keep
    /// their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the rules are internally consistent and that every
    /// tuning value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg.to_string())) };

        if !(self.map.width > 0.0 && self.map.height > 0.0) {
            return invalid("map extents must be positive");
        }
        let Some(last) = self.tiers.last() else {
            return invalid("tier table is empty");
        };
        if !last.is_terminal() {
            return invalid("last tier must be terminal");
        }
        if self.tiers[..self.tiers.len() - 1]
            .iter()
            .any(|tier| tier.is_terminal())
        {
            return invalid("only the last tier may be terminal");
        }
        if self.tiers.iter().any(|tier| !(tier.health > 0.0)) {
            return invalid("tier health must be positive");
        }
        if !(0.0..=1.0).contains(&self.shield.block_chance) {
            return invalid("shield block chance must be within [0, 1]");
        }
        if self.stars.minimum > self.stars.initial {
            return invalid("star minimum exceeds initial star count");
        }
        if self.stars.min_value > self.stars.max_value {
            return invalid("star value range is inverted");
        }
        if !(self.bullet.speed > 0.0) {
            return invalid("bullet speed must be positive");
        }
        if self
            .tiers
            .iter()
            .any(|tier| !(tier.damage >= 0.0 && tier.damage.is_finite()))
        {
            return invalid("tier damage must be non-negative");
        }

        let non_negative = [
            ("bullet.size", self.bullet.size),
            ("bullet.heavySize", self.bullet.heavy_size),
            ("bullet.hitRadius", self.bullet.hit_radius),
            ("combat.tierDamageStep", self.combat.tier_damage_step),
            ("combat.heavyMultiplier", self.combat.heavy_multiplier),
            ("combat.hitExp", self.combat.hit_exp),
            ("combat.killExp", self.combat.kill_exp),
            ("shield.capacity", self.shield.capacity),
            ("shield.regenPerTick", self.shield.regen_per_tick),
            ("stars.pickupRadius", self.stars.pickup_radius),
            ("spawn.margin", self.spawn.margin),
            ("spawn.minDistance", self.spawn.min_distance),
        ];
        for (name, value) in non_negative {
            // NaN fails both comparisons
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number"
                )));
            }
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.map.width, self.map.height)
    }

    pub fn reload(&self) -> Duration {
        Duration::from_millis(self.combat.reload_ms)
    }

    pub fn fast_reload(&self) -> Duration {
        Duration::from_millis(self.combat.fast_reload_ms)
    }

    pub fn shield_regen_delay(&self) -> Duration {
        Duration::from_millis(self.shield.regen_delay_ms)
    }

    /// Tier row for `index`, saturating at the terminal tier.
    pub fn tier(&self, index: usize) -> &TierSpec {
        &self.tiers[index.min(self.tiers.len() - 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bounds(), Bounds::new(4000.0, 3000.0));
        assert_eq!(config.reload(), config.fast_reload() * 2);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            GameConfig::from_json(r#"{ "map": { "width": 800 }, "shield": { "blockChance": 0 } }"#)
                .unwrap();
        assert_eq!(config.map.width, 800.0);
        assert_eq!(config.map.height, 3000.0);
        assert_eq!(config.shield.block_chance, 0.0);
        assert_eq!(config.shield.capacity, 50.0);
        assert_eq!(config.tiers.len(), 6);
    }

    #[test]
    fn test_rejects_non_terminal_last_tier() {
        let mut config = GameConfig::default();
        config.tiers.pop();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_empty_tier_table() {
        let err = GameConfig::from_json(r#"{ "tiers": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_block_chance() {
        let mut config = GameConfig::default();
        config.shield.block_chance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_tuning_values() {
        let mut config = GameConfig::default();
        config.shield.capacity = -10.0;
        match config.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("shield.capacity")),
            other => panic!("unexpected {other:?}"),
        }

        for json in [
            r#"{ "shield": { "regenPerTick": -0.5 } }"#,
            r#"{ "bullet": { "hitRadius": -1 } }"#,
            r#"{ "stars": { "pickupRadius": -20 } }"#,
            r#"{ "combat": { "hitExp": -5 } }"#,
            r#"{ "combat": { "killExp": -50 } }"#,
        ] {
            let err = GameConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "accepted {json}");
        }
    }

    #[test]
    fn test_zero_tuning_values_are_allowed() {
        let config = GameConfig::from_json(
            r#"{ "shield": { "capacity": 0, "regenPerTick": 0 }, "combat": { "hitExp": 0 } }"#,
        )
        .unwrap();
        assert_eq!(config.shield.capacity, 0.0);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = GameConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_tier_lookup_saturates() {
        let config = GameConfig::default();
        assert_eq!(config.tier(0).name, "Scout");
        assert_eq!(config.tier(99).name, "Titan");
    }
}
