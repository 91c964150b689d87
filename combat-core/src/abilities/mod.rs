//! Ability handlers and the registry the engine dispatches through.
//!
//! The engine owns use consumption, action economy and rollback. A handler
//! only applies what the ability does: effects, healing, damage dice,
//! listener registration and the record's active state.

mod barbarian;
mod bard;
mod fighter;
mod monk;
mod paladin;
mod rogue;

pub use barbarian::{rage_damage_bonus, RageHandler, RAGE};
pub use bard::{inspiration_die, BardicInspirationHandler, BARDIC_INSPIRATION};
pub use fighter::{ActionSurgeHandler, SecondWindHandler, ACTION_SURGE, SECOND_WIND};
pub use monk::{KiHandler, KI};
pub use paladin::{
    DivineSmiteHandler, LayOnHandsHandler, ShieldOfFaithHandler, DIVINE_SMITE, LAY_ON_HANDS, SHIELD_OF_FAITH,
};
pub use rogue::{sneak_attack_dice, SneakAttackHandler, SNEAK_ATTACK};

use crate::attack::AttackOutcome;
use crate::character::{Character, CharacterId};
use crate::config::EngineConfig;
use crate::dice::{Advantage, DiceError, Randomizer, RollOutcome};
use crate::encounter::EncounterId;
use crate::events::EventBus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures inside a handler. The engine rolls the character back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbilityError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not enough {0}")]
    Insufficient(String),

    #[error("Dice error: {0}")]
    Dice(#[from] DiceError),
}

/// Caller-supplied parameters for an ability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityInput {
    pub target: Option<CharacterId>,
    /// Points to spend from a pool, e.g. lay on hands healing.
    pub amount: Option<u32>,
    /// Sub-option, e.g. `flurry_of_blows` for ki.
    pub option: Option<String>,
    /// Minimum spell slot level to spend.
    pub slot_level: Option<u8>,
    pub target_ac: Option<i32>,
    pub advantage: Advantage,
    pub target_is_undead_or_fiend: bool,
    pub encounter: Option<EncounterId>,
}

impl AbilityInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: CharacterId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    pub fn with_slot_level(mut self, level: u8) -> Self {
        self.slot_level = Some(level);
        self
    }

    pub fn with_target_ac(mut self, ac: i32) -> Self {
        self.target_ac = Some(ac);
        self
    }

    pub fn against_undead_or_fiend(mut self) -> Self {
        self.target_is_undead_or_fiend = true;
        self
    }

    pub fn in_encounter(mut self, encounter: EncounterId) -> Self {
        self.encounter = Some(encounter);
        self
    }
}

/// Everything a handler may touch.
pub struct AbilityContext<'a> {
    pub character: &'a mut Character,
    /// Another character the ability is aimed at, locked by the engine.
    pub target: Option<&'a mut Character>,
    pub input: &'a AbilityInput,
    pub rng: &'a dyn Randomizer,
    pub events: &'a EventBus,
    pub config: &'a EngineConfig,
    pub round: u32,
}

impl AbilityContext<'_> {
    /// The target if there is one, otherwise the user.
    pub fn recipient(&mut self) -> &mut Character {
        match self.target.as_deref_mut() {
            Some(target) => target,
            None => &mut *self.character,
        }
    }
}

/// What a handler did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbilityOutcome {
    pub message: String,
    pub effect_applied: Option<String>,
    pub healing_done: Option<i32>,
    pub damage_roll: Option<RollOutcome>,
    pub attacks: Vec<AttackOutcome>,
}

impl AbilityOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_effect(mut self, name: impl Into<String>) -> Self {
        self.effect_applied = Some(name.into());
        self
    }

    pub fn with_healing(mut self, healed: i32) -> Self {
        self.healing_done = Some(healed);
        self
    }

    pub fn with_damage_roll(mut self, roll: RollOutcome) -> Self {
        self.damage_roll = Some(roll);
        self
    }
}

pub trait AbilityHandler: Send + Sync {
    fn key(&self) -> &'static str;

    /// Preconditions checked before anything is spent. An `Err` becomes an
    /// unsuccessful result with the message as its reason.
    fn check(&self, _character: &Character, _target: Option<&Character>, _input: &AbilityInput) -> Result<(), String> {
        Ok(())
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError>;

    /// Using the ability again while it is active ends it instead.
    fn toggles(&self) -> bool {
        false
    }

    fn deactivate(&self, character: &mut Character, events: &EventBus) -> AbilityOutcome {
        let removed = end_ability(character, self.key());
        events.unsubscribe_source(character.id, self.key());
        let mut message = format!("{} ends.", display_name(character, self.key()));
        if !removed.is_empty() {
            message.push_str(&format!(" Removed: {}.", removed.join(", ")));
        }
        AbilityOutcome::new(message)
    }
}

/// Clear an ability's active state and strip the effects it granted.
/// Returns the names of the removed effects.
pub fn end_ability(character: &mut Character, key: &str) -> Vec<String> {
    if let Some(record) = character.ability_mut(key) {
        record.deactivate();
    }
    character
        .effects
        .remove_from_source(key)
        .into_iter()
        .map(|e| e.name)
        .collect()
}

fn display_name(character: &Character, key: &str) -> String {
    character
        .ability(key)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| key.to_string())
}

/// Handlers by ability key.
#[derive(Clone, Default)]
pub struct AbilityRegistry {
    handlers: HashMap<String, Arc<dyn AbilityHandler>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RageHandler);
        registry.register(SecondWindHandler);
        registry.register(ActionSurgeHandler);
        registry.register(LayOnHandsHandler);
        registry.register(DivineSmiteHandler);
        registry.register(ShieldOfFaithHandler);
        registry.register(KiHandler);
        registry.register(SneakAttackHandler);
        registry.register(BardicInspirationHandler);
        registry
    }

    /// Add a handler, replacing any with the same key.
    pub fn register(&mut self, handler: impl AbilityHandler + 'static) {
        self.handlers.insert(handler.key().to_string(), Arc::new(handler));
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn AbilityHandler>> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for AbilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("AbilityRegistry").field("handlers", &keys).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = AbilityRegistry::with_defaults();
        for key in [
            "rage",
            "second_wind",
            "action_surge",
            "lay_on_hands",
            "divine_smite",
            "shield_of_faith",
            "ki",
            "sneak_attack",
            "bardic_inspiration",
        ] {
            assert!(registry.contains(key), "missing {key}");
        }
        assert!(registry.get("wild_shape").is_none());
        assert!(registry.get("rage").unwrap().toggles());
        assert!(!registry.get("second_wind").unwrap().toggles());
    }
}
