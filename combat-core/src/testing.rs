//! Testing utilities for the combat engine.
//!
//! This module provides tools for integration testing:
//! - Sample characters built from the class templates, armed and ready
//! - `FailingRepository` for exercising persistence warnings
//! - `TestHarness` for scripted combat scenarios with known dice

use crate::character::{AbilityScores, Character, CharacterClass, CharacterId};
use crate::class_data::build_character;
use crate::config::EngineConfig;
use crate::dice::ScriptedRandomizer;
use crate::engine::{CombatEngine, EngineError};
use crate::items::get_weapon;
use crate::persist::{CharacterRepository, InMemoryRepository, RepositoryError};
use std::sync::Arc;

fn sample(name: &str, class: CharacterClass, level: u8, scores: AbilityScores) -> Character {
    build_character(name, class, level, scores, &EngineConfig::default())
}

/// Level 1 fighter with a longsword and chain mail: +5 to hit, 1d8+3.
pub fn sample_fighter(name: &str) -> Character {
    let mut character = sample(name, CharacterClass::Fighter, 1, AbilityScores::new(16, 12, 14, 10, 12, 8))
        .with_armor(16, Some(0));
    character.equipment.main_hand = get_weapon("Longsword");
    character
}

/// Level 2 barbarian with a greataxe and two rages.
pub fn sample_barbarian(name: &str) -> Character {
    let mut character = sample(name, CharacterClass::Barbarian, 2, AbilityScores::new(16, 14, 16, 8, 12, 10));
    character.equipment.main_hand = get_weapon("Greataxe");
    character
}

/// Level 3 rogue with a shortsword and an off-hand dagger.
pub fn sample_rogue(name: &str) -> Character {
    let mut character = sample(name, CharacterClass::Rogue, 3, AbilityScores::new(10, 16, 12, 12, 10, 14))
        .with_armor(11, None);
    character.equipment.main_hand = get_weapon("Shortsword");
    character.equipment.off_hand = get_weapon("Dagger");
    character
}

/// Level 5 monk fighting unarmed, with five ki points.
pub fn sample_monk(name: &str) -> Character {
    sample(name, CharacterClass::Monk, 5, AbilityScores::new(10, 16, 14, 10, 16, 8))
}

/// Level 5 paladin with a longsword, chain mail and 2nd-level slots.
pub fn sample_paladin(name: &str) -> Character {
    let mut character = sample(name, CharacterClass::Paladin, 5, AbilityScores::new(16, 10, 14, 8, 12, 16))
        .with_armor(16, Some(0));
    character.equipment.main_hand = get_weapon("Longsword");
    character
}

/// Level 5 bard with a rapier and three inspirations per short rest.
pub fn sample_bard(name: &str) -> Character {
    let mut character = sample(name, CharacterClass::Bard, 5, AbilityScores::new(8, 14, 12, 10, 10, 16))
        .with_armor(11, None);
    character.equipment.main_hand = get_weapon("Rapier");
    character
}

/// A repository that is always down.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRepository;

impl CharacterRepository for FailingRepository {
    fn load(&self, id: CharacterId) -> Result<Character, RepositoryError> {
        Err(RepositoryError::NotFound(id))
    }

    fn save(&self, _character: &Character) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("storage offline".to_string()))
    }
}

/// Test harness for running combat scenarios.
pub struct TestHarness {
    /// The engine under test.
    pub engine: CombatEngine,
    /// Where the engine saves characters, unless built with a failing store.
    pub repository: Arc<InMemoryRepository>,
    dice: Arc<ScriptedRandomizer>,
}

impl TestHarness {
    /// An engine backed by an in-memory repository that rolls `rolls` in
    /// order.
    pub fn new(rolls: impl Into<Vec<u32>>) -> Self {
        Self::with_config(rolls, EngineConfig::default())
    }

    pub fn with_config(rolls: impl Into<Vec<u32>>, config: EngineConfig) -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let dice = Arc::new(ScriptedRandomizer::new(rolls));
        let engine = CombatEngine::new(repository.clone(), config).with_randomizer(dice.clone());
        Self {
            engine,
            repository,
            dice,
        }
    }

    /// An engine whose every save fails.
    pub fn with_failing_repository(rolls: impl Into<Vec<u32>>) -> Self {
        let dice = Arc::new(ScriptedRandomizer::new(rolls));
        let engine =
            CombatEngine::new(Arc::new(FailingRepository), EngineConfig::default()).with_randomizer(dice.clone());
        Self {
            engine,
            repository: Arc::new(InMemoryRepository::new()),
            dice,
        }
    }

    /// Put a character in play.
    pub fn add(&self, character: Character) -> CharacterId {
        self.engine.add_character(character)
    }

    pub fn character(&self, id: CharacterId) -> Result<Character, EngineError> {
        self.engine.character(id)
    }

    /// Scripted rolls handed out so far.
    pub fn rolls_consumed(&self) -> usize {
        self.dice.consumed()
    }

    pub fn rolls_remaining(&self) -> usize {
        self.dice.remaining()
    }

    /// Saved copy of a character, if the engine has persisted it.
    pub fn saved(&self, id: CharacterId) -> Option<Character> {
        self.repository.load(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strike::{strike_profile, StrikeKind};

    #[test]
    fn test_sample_fighter_numbers() {
        let fighter = sample_fighter("Roland");
        let profile = strike_profile(&fighter, StrikeKind::MainHand).unwrap();
        assert_eq!(profile.attack_bonus, 5);
        assert_eq!(profile.damage_bonus, 3);
        assert_eq!(fighter.armor_class(), 16);
    }

    #[test]
    fn test_samples_are_armed() {
        assert!(sample_rogue("Vex").equipment.dual_wields_light());
        assert!(sample_barbarian("Grunk").equipment.main_hand.is_some());
        assert_eq!(sample_monk("Li").martial_arts_die, Some(6));
    }

    #[test]
    fn test_harness_persists() {
        let harness = TestHarness::new(vec![]);
        let id = harness.add(sample_fighter("Roland"));
        harness.engine.heal(id, 1).unwrap();
        assert!(harness.saved(id).is_some());
        assert_eq!(harness.rolls_consumed(), 0);
    }

    #[test]
    fn test_failing_repository_warns() {
        let harness = TestHarness::with_failing_repository(vec![]);
        let id = harness.add(sample_fighter("Roland"));
        let report = harness.engine.heal(id, 1).unwrap();
        assert!(report.persistence_warning.is_some());
        assert!(harness.saved(id).is_none());
    }
}
