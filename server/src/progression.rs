//! Experience and tier advancement.

use crate::entity::{Player, PlayerId};
use log::info;
use shared::GameConfig;

/// A tier advancement, to be reported to the advancing player only.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelUp {
    pub player: PlayerId,
    pub new_tier: usize,
    pub ship_name: String,
}

/// Credits `amount` experience and advances at most one tier.
///
/// Overshooting several thresholds in one award still advances a single
/// tier; the next award re-evaluates. At the terminal tier experience keeps
/// accumulating with no effect.
pub fn apply_experience(player: &mut Player, amount: f32, config: &GameConfig) -> Option<LevelUp> {
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    player.exp += amount;

    let threshold = config.tier(player.tier).exp_to_next_level?;
    if player.exp < threshold || player.tier + 1 >= config.tiers.len() {
        return None;
    }

    player.apply_tier(player.tier + 1, config);
    let ship_name = config.tier(player.tier).name.clone();
    info!(
        "Player {} ({}) advanced to tier {} ({})",
        player.id, player.username, player.tier, ship_name
    );

    Some(LevelUp {
        player: player.id,
        new_tier: player.tier,
        ship_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ShipTrait, Vec2};

    fn scout(config: &GameConfig) -> Player {
        Player::new(1, "ace".to_string(), Vec2::new(100.0, 100.0), config)
    }

    #[test]
    fn test_below_threshold_only_accumulates() {
        let config = GameConfig::default();
        let mut player = scout(&config);
        assert_eq!(apply_experience(&mut player, 40.0, &config), None);
        assert_eq!(player.exp, 40.0);
        assert_eq!(player.tier, 0);
    }

    #[test]
    fn test_reaching_threshold_advances_and_resets_stats() {
        let config = GameConfig::default();
        let mut player = scout(&config);
        player.health = 30.0;

        let level_up = apply_experience(&mut player, 100.0, &config).unwrap();
        assert_eq!(level_up.new_tier, 1);
        assert_eq!(level_up.ship_name, "Fighter");
        assert_eq!(level_up.player, 1);
        assert_eq!(player.tier, 1);
        assert_eq!(player.health, 150.0);
        assert_eq!(player.max_health, 150.0);
        assert_eq!(player.damage, 12.0);
        assert_eq!(player.ship_trait, ShipTrait::TripleShot);
    }

    #[test]
    fn test_large_award_advances_exactly_one_tier() {
        let config = GameConfig::default();
        let mut player = scout(&config);

        let level_up = apply_experience(&mut player, 5000.0, &config).unwrap();
        assert_eq!(level_up.new_tier, 1);
        assert_eq!(player.tier, 1);
        assert_eq!(player.exp, 5000.0);

        // The next award re-evaluates against the new tier's threshold.
        let level_up = apply_experience(&mut player, 1.0, &config).unwrap();
        assert_eq!(level_up.new_tier, 2);
    }

    #[test]
    fn test_terminal_tier_only_accumulates() {
        let config = GameConfig::default();
        let mut player = scout(&config);
        player.apply_tier(5, &config);
        player.exp = 10_000.0;

        assert_eq!(apply_experience(&mut player, 1_000_000.0, &config), None);
        assert_eq!(player.tier, 5);
        assert_eq!(player.exp, 1_010_000.0);
    }

    #[test]
    fn test_rejects_invalid_amounts() {
        let config = GameConfig::default();
        let mut player = scout(&config);
        for amount in [0.0, -10.0, f32::NAN, f32::INFINITY] {
            assert_eq!(apply_experience(&mut player, amount, &config), None);
        }
        assert_eq!(player.exp, 0.0);
    }
}
