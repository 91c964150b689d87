//! Engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a [`crate::engine::CombatEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Save the character through the repository after every mutation.
    pub persist_after_mutation: bool,

    /// Seed for a reproducible randomizer. `None` uses the thread RNG.
    pub rng_seed: Option<u64>,

    /// How many of the barbarian's turns a rage lasts.
    pub rage_duration_rounds: u32,

    /// Walking speed for characters built from class templates.
    pub default_speed_feet: u32,

    /// Cap on divine smite dice before the undead/fiend bonus.
    pub max_smite_dice: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            persist_after_mutation: true,
            rng_seed: None,
            rage_duration_rounds: 10,
            default_speed_feet: 30,
            max_smite_dice: 5,
        }
    }

    /// Parse from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rage_duration_rounds == 0 {
            return Err(ConfigError::Invalid(
                "rage_duration_rounds must be at least 1".to_string(),
            ));
        }
        if self.max_smite_dice < 2 {
            return Err(ConfigError::Invalid(
                "max_smite_dice must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist_after_mutation = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// At least one round.
    pub fn with_rage_duration(mut self, rounds: u32) -> Self {
        self.rage_duration_rounds = rounds.max(1);
        self
    }

    pub fn with_default_speed(mut self, feet: u32) -> Self {
        self.default_speed_feet = feet;
        self
    }

    /// Never below the two dice a 1st-level slot gives.
    pub fn with_max_smite_dice(mut self, dice: u32) -> Self {
        self.max_smite_dice = dice.max(2);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.persist_after_mutation);
        assert_eq!(config.rage_duration_rounds, 10);
        assert_eq!(config.max_smite_dice, 5);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            rng_seed = 42
            rage_duration_rounds = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.rage_duration_rounds, 3);
        assert_eq!(config.default_speed_feet, 30);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("rage_duration_rounds = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("rage_duration_rounds = \"ten\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_persistence(false)
            .with_seed(7)
            .with_max_smite_dice(6);
        assert!(!config.persist_after_mutation);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.max_smite_dice, 6);
    }

    #[test]
    fn test_builder_clamps_to_valid_values() {
        let config = EngineConfig::new().with_rage_duration(0).with_max_smite_dice(0);
        assert_eq!(config.rage_duration_rounds, 1);
        assert_eq!(config.max_smite_dice, 2);
        assert!(config.validate().is_ok());
    }
}
