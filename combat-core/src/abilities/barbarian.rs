use super::{end_ability, AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome};
use crate::attack::DamageType;
use crate::character::{Character, CharacterClass};
use crate::effects::{ActiveEffect, EffectDuration, Modifier};
use crate::events::{duration_tracker, EventKind, ListenerControl, Subscription};

pub const RAGE: &str = "rage";

/// Rage damage bonus by barbarian level.
pub fn rage_damage_bonus(level: u8) -> i32 {
    match level {
        1..=8 => 2,
        9..=15 => 3,
        _ => 4,
    }
}

/// Resistance to bludgeoning, piercing and slashing, extra damage on
/// strength-based melee hits, for a fixed number of the barbarian's turns.
/// Raging again while raging ends it.
pub struct RageHandler;

impl AbilityHandler for RageHandler {
    fn key(&self) -> &'static str {
        RAGE
    }

    fn toggles(&self) -> bool {
        true
    }

    fn check(&self, character: &Character, _target: Option<&Character>, _input: &AbilityInput) -> Result<(), String> {
        if character.armor.is_some_and(|a| a.max_dex_bonus == Some(0)) {
            return Err("Cannot rage in heavy armor".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let rounds = ctx.config.rage_duration_rounds.max(1);
        let level = if ctx.character.class == CharacterClass::Barbarian {
            ctx.character.level
        } else {
            1
        };
        let bonus = rage_damage_bonus(level);
        let owner = ctx.character.id;

        ctx.character.effects.add(
            ActiveEffect::new("Rage", RAGE, EffectDuration::Rounds(rounds)).with_modifier(Modifier::resistance(vec![
                DamageType::Bludgeoning,
                DamageType::Piercing,
                DamageType::Slashing,
            ])),
        );
        if let Some(record) = ctx.character.ability_mut(RAGE) {
            record.activate(Some(rounds));
        }

        ctx.events.subscribe(Subscription::new(owner, EventKind::DamageRoll, RAGE, move |event, _| {
            if event.strike.melee && event.strike.uses_strength {
                event.add_damage(RAGE, bonus);
            }
            ListenerControl::Continue
        }));
        ctx.events.subscribe(duration_tracker(owner, RAGE, rounds, |character| {
            end_ability(character, RAGE);
        }));

        Ok(AbilityOutcome::new(format!(
            "{} flies into a rage: +{} melee damage and resistance to bludgeoning, piercing and slashing for {} rounds.",
            ctx.character.name, bonus, rounds
        ))
        .with_effect("Rage"))
    }
}
