//! Engine configuration
//!
//! Static data only: attractor presets keyed by effect name and timing
//! profiles keyed by game type. Loaded from JSON or taken from the built-in
//! defaults; never changed while rounds are running.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::guidance::{AttractorConfig, FalloffCurve};

/// Built-in effect names
pub mod effects {
    pub const DICE_SETTLE: &str = "dice-settle";
    pub const BALL_SETTLE: &str = "ball-settle";
    pub const CARD_SNAP: &str = "card-snap";
}

/// Per-game-type timing and guidance profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameProfile {
    /// Animation must look organic at least this long (ms)
    pub min_animation_ms: f64,
    /// Watchdog bound on total animation (ms)
    pub max_animation_ms: f64,
    /// Whether new rounds must wait for this one to finish
    pub is_animation_blocking: bool,
    /// Attractor preset used during Settle
    pub effect: String,
    /// Force only applies below this height (table-plane Y)
    pub height_gate: Option<f32>,
    /// Minimum Settle time granted to an outcome that arrives late (ms)
    pub late_settle_ms: f64,
    /// How long Reveal is held before the slot returns to Idle (ms)
    pub reveal_hold_ms: Option<f64>,
    /// Fraction of the remaining rotation applied per tick (0-1)
    pub alignment_strength: f32,
}

impl Default for GameProfile {
    fn default() -> Self {
        Self {
            min_animation_ms: 1000.0,
            max_animation_ms: 6000.0,
            is_animation_blocking: true,
            effect: effects::DICE_SETTLE.to_string(),
            height_gate: None,
            late_settle_ms: 1000.0,
            reveal_hold_ms: Some(1500.0),
            alignment_strength: 0.1,
        }
    }
}

impl GameProfile {
    /// Craps: two dice, blocking, guidance only once dice are near the felt
    pub fn craps() -> Self {
        Self {
            min_animation_ms: 1200.0,
            max_animation_ms: 6000.0,
            is_animation_blocking: true,
            effect: effects::DICE_SETTLE.to_string(),
            height_gate: Some(0.25),
            late_settle_ms: 1500.0,
            reveal_hold_ms: Some(2000.0),
            alignment_strength: 0.15,
        }
    }

    /// Roulette: long spin, ball guided once it drops into the pocket ring
    pub fn roulette() -> Self {
        Self {
            min_animation_ms: 4000.0,
            max_animation_ms: 12000.0,
            is_animation_blocking: true,
            effect: effects::BALL_SETTLE.to_string(),
            height_gate: Some(0.1),
            late_settle_ms: 2000.0,
            reveal_hold_ms: Some(3000.0),
            alignment_strength: 0.0,
        }
    }

    /// Card reveals: short and non-blocking
    pub fn blackjack() -> Self {
        Self {
            min_animation_ms: 300.0,
            max_animation_ms: 2500.0,
            is_animation_blocking: false,
            effect: effects::CARD_SNAP.to_string(),
            height_gate: None,
            late_settle_ms: 400.0,
            reveal_hold_ms: None,
            alignment_strength: 0.3,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub effects: BTreeMap<String, AttractorConfig>,
    pub games: BTreeMap<String, GameProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut effects = BTreeMap::new();
        effects.insert(
            effects::DICE_SETTLE.to_string(),
            AttractorConfig {
                falloff: FalloffCurve::Quadratic,
                base_strength: 6.0,
                effective_radius: 0.6,
                velocity_gate: 1.5,
                force_clamp: 8.0,
                noise_amplitude: 0.25,
                noise_frequency: 1.5,
            },
        );
        effects.insert(
            effects::BALL_SETTLE.to_string(),
            AttractorConfig {
                falloff: FalloffCurve::InverseSquare,
                base_strength: 4.0,
                effective_radius: 0.5,
                velocity_gate: 2.0,
                force_clamp: 6.0,
                noise_amplitude: 0.2,
                noise_frequency: 2.0,
            },
        );
        effects.insert(
            effects::CARD_SNAP.to_string(),
            AttractorConfig {
                falloff: FalloffCurve::Linear,
                base_strength: 12.0,
                effective_radius: 1.0,
                velocity_gate: 5.0,
                force_clamp: 20.0,
                noise_amplitude: 0.05,
                noise_frequency: 0.5,
            },
        );

        let mut games = BTreeMap::new();
        games.insert("craps".to_string(), GameProfile::craps());
        games.insert("roulette".to_string(), GameProfile::roulette());
        games.insert("blackjack".to_string(), GameProfile::blackjack());

        Self { effects, games }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config. Omitted tables fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        log::info!(
            "Loaded engine config: {} effects, {} games",
            config.effects.len(),
            config.games.len()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, effect) in &self.effects {
            effect.validate().map_err(|reason| ConfigError::InvalidEffect {
                name: name.clone(),
                reason: reason.to_string(),
            })?;
        }

        for (game, profile) in &self.games {
            if !self.effects.contains_key(&profile.effect) {
                return Err(ConfigError::UnknownEffect {
                    game: game.clone(),
                    effect: profile.effect.clone(),
                });
            }
            if profile.min_animation_ms < 0.0 || profile.min_animation_ms > profile.max_animation_ms {
                return Err(ConfigError::InvalidDurations {
                    game: game.clone(),
                    min_ms: profile.min_animation_ms,
                    max_ms: profile.max_animation_ms,
                });
            }
        }
        Ok(())
    }

    pub fn game(&self, game_type: &str) -> Option<&GameProfile> {
        self.games.get(game_type)
    }

    pub fn effect(&self, name: &str) -> Option<&AttractorConfig> {
        self.effects.get(name)
    }

    /// Attractor preset for a game type (via its profile's effect name)
    pub fn effect_for_game(&self, game_type: &str) -> Option<&AttractorConfig> {
        self.game(game_type).and_then(|p| self.effect(&p.effect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.effect_for_game("craps").is_some());
        assert!(config.effect_for_game("roulette").is_some());
        assert!(config.effect_for_game("blackjack").is_some());
    }

    #[test]
    fn test_presets_differ_in_feel() {
        let config = EngineConfig::default();
        let dice = config.effect(effects::DICE_SETTLE).unwrap();
        let ball = config.effect(effects::BALL_SETTLE).unwrap();
        assert_ne!(dice.falloff, ball.falloff);
    }

    #[test]
    fn test_json_round_trip() {
        let config = EngineConfig::default();
        let json = config.to_json().unwrap();
        let parsed = EngineConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "games": {
                "sicbo": { "min_animation_ms": 900.0, "effect": "dice-settle" }
            }
        }"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.effects.len(), 3);
        let sicbo = config.game("sicbo").unwrap();
        assert_eq!(sicbo.min_animation_ms, 900.0);
        assert_eq!(sicbo.max_animation_ms, GameProfile::default().max_animation_ms);
    }

    #[test]
    fn test_unknown_effect_rejected() {
        let json = r#"{ "games": { "keno": { "effect": "ball-bounce" } } }"#;
        let err = EngineConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEffect { .. }));
    }

    #[test]
    fn test_inverted_durations_rejected() {
        let mut config = EngineConfig::default();
        if let Some(craps) = config.games.get_mut("craps") {
            craps.min_animation_ms = 9000.0;
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDurations { .. })
        ));
    }

    #[test]
    fn test_invalid_effect_rejected() {
        let mut config = EngineConfig::default();
        if let Some(dice) = config.effects.get_mut(effects::DICE_SETTLE) {
            dice.effective_radius = 0.0;
        }
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEffect { .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
