//! D&D 5e combat and character-resource rules engine.
//!
//! This crate provides:
//! - Dice rolling behind a swappable randomizer (thread, seeded or scripted)
//! - Attack resolution with critical hits, fumbles and fighting styles
//! - Per-character resources: hit points, hit dice, spell slots, class abilities
//! - An effect ledger for timed modifiers, resistance and concentration
//! - Per-turn action economy with bonus actions unlocked by attacks
//! - Class abilities dispatched through a handler registry, with rollback
//! - Turn-counted durations driven by an event bus
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use combat_core::{
//!     build_character, AbilityInput, AbilityScores, AttackRequest, CharacterClass, CombatEngine,
//!     EngineConfig, EquipSlot, InMemoryRepository,
//! };
//!
//! # fn main() -> Result<(), combat_core::EngineError> {
//! let config = EngineConfig::new().with_seed(7);
//! let engine = CombatEngine::new(Arc::new(InMemoryRepository::new()), config.clone());
//!
//! let grunk = build_character(
//!     "Grunk",
//!     CharacterClass::Barbarian,
//!     3,
//!     AbilityScores::new(16, 14, 16, 8, 12, 10),
//!     &config,
//! );
//! let id = engine.add_character(grunk);
//! engine.equip(id, EquipSlot::MainHand, "Greataxe")?;
//!
//! engine.use_ability(id, "rage", AbilityInput::new())?;
//! let report = engine.attack(id, AttackRequest::new().against_ac(14))?;
//! println!("{}", report.message);
//! # Ok(())
//! # }
//! ```

pub mod abilities;
pub mod attack;
pub mod character;
pub mod class_data;
pub mod config;
pub mod dice;
pub mod economy;
pub mod effects;
pub mod encounter;
pub mod engine;
pub mod events;
pub mod items;
pub mod persist;
pub mod strike;
pub mod testing;

// Primary public API
pub use abilities::{AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome, AbilityRegistry};
pub use attack::{resolve_attack, resolve_attack_with_advantage, AttackOutcome, DamageSpec, DamageType, FightingStyle};
pub use character::{
    Ability, AbilityRecord, AbilityScores, Character, CharacterClass, CharacterId, HitPoints, RestType, SlotSource,
};
pub use class_data::build_character;
pub use config::{ConfigError, EngineConfig};
pub use dice::{
    roll, roll_d20, Advantage, DiceError, DiceExpression, Randomizer, RollOutcome, ScriptedRandomizer,
    SeededRandomizer, ThreadRandomizer,
};
pub use economy::{ActionCost, ActionEconomy, ActionType, BonusActionOption};
pub use effects::{ActiveEffect, EffectDuration, EffectLedger, Modifier, ModifierScope};
pub use encounter::{Encounter, EncounterId, EncounterProvider, EncounterTracker, TurnInfo};
pub use engine::{
    AbilityAvailability, AbilityResult, AttackReport, AttackRequest, CombatEngine, DamageReport, EngineError,
    ExpiryReport, RestReport,
};
pub use events::{CombatEvent, EventBus, EventKind, ListenerControl, Subscription};
pub use items::{get_weapon, EquipSlot, Equipment, Weapon};
pub use persist::{CharacterRepository, InMemoryRepository, PersistError, RepositoryError, SavedRoster};
pub use testing::TestHarness;
