use super::{AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome};
use crate::character::Character;
use crate::dice;
use crate::effects::{ActiveEffect, EffectDuration, Modifier};

pub const LAY_ON_HANDS: &str = "lay_on_hands";

/// Heal from a pool of hit points, on yourself or someone you touch. Spends
/// the requested amount, or by default whatever the recipient is missing.
pub struct LayOnHandsHandler;

impl AbilityHandler for LayOnHandsHandler {
    fn key(&self) -> &'static str {
        LAY_ON_HANDS
    }

    fn check(&self, character: &Character, target: Option<&Character>, input: &AbilityInput) -> Result<(), String> {
        let pool = character.ability(LAY_ON_HANDS).map_or(0, |r| r.uses_remaining.max(0) as u32);
        match input.amount {
            Some(0) => Err("Must spend at least 1 point".to_string()),
            Some(amount) if amount > pool => Err(format!(
                "Only {pool} points left in the pool, {amount} requested"
            )),
            Some(_) => Ok(()),
            None if target.unwrap_or(character).hit_points.missing() == 0 => {
                Err("Already at full hit points".to_string())
            }
            None => Ok(()),
        }
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let pool = ctx
            .character
            .ability(LAY_ON_HANDS)
            .map_or(0, |r| r.uses_remaining.max(0));
        let amount = match ctx.input.amount {
            Some(amount) => amount as i32,
            None => ctx.recipient().hit_points.missing().min(pool),
        };
        if amount <= 0 || amount > pool {
            return Err(AbilityError::Insufficient("lay on hands points".to_string()));
        }

        let recipient = ctx.recipient();
        let healed = recipient.heal(amount);
        let recipient_name = recipient.name.clone();

        let remaining = match ctx.character.ability_mut(LAY_ON_HANDS) {
            Some(record) => {
                if !record.debit(amount) {
                    return Err(AbilityError::Insufficient("lay on hands points".to_string()));
                }
                record.uses_remaining
            }
            None => return Err(AbilityError::Insufficient("lay on hands points".to_string())),
        };
        Ok(AbilityOutcome::new(format!(
            "{} lays hands on {}, restoring {} HP. {} points remain.",
            ctx.character.name, recipient_name, healed, remaining
        ))
        .with_healing(healed))
    }
}

pub const DIVINE_SMITE: &str = "divine_smite";

/// Radiant damage from a spell slot: 2d8 for a 1st-level slot plus 1d8 per
/// level above, capped, plus 1d8 against undead or fiends.
pub struct DivineSmiteHandler;

impl AbilityHandler for DivineSmiteHandler {
    fn key(&self) -> &'static str {
        DIVINE_SMITE
    }

    fn check(&self, character: &Character, _target: Option<&Character>, input: &AbilityInput) -> Result<(), String> {
        let min_level = input.slot_level.unwrap_or(1).max(1);
        match character.spell_slots.lowest_available(min_level) {
            Some(_) => Ok(()),
            None => Err(format!("No spell slots of level {min_level} or higher")),
        }
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let min_level = ctx.input.slot_level.unwrap_or(1).max(1);
        let level = ctx
            .character
            .spell_slots
            .lowest_available(min_level)
            .ok_or_else(|| AbilityError::Insufficient("spell slots".to_string()))?;
        if !ctx.character.use_spell_slot(level) {
            return Err(AbilityError::Insufficient("spell slots".to_string()));
        }

        let mut count = (1 + level as u32).min(ctx.config.max_smite_dice.max(2));
        if ctx.input.target_is_undead_or_fiend {
            count += 1;
        }
        let roll = dice::roll(ctx.rng, count, 8, 0)?;
        Ok(AbilityOutcome::new(format!(
            "{} smites with a level {} slot for {} radiant damage ({}).",
            ctx.character.name, level, roll.total, roll
        ))
        .with_damage_roll(roll))
    }
}

pub const SHIELD_OF_FAITH: &str = "shield_of_faith";

/// Concentration, ten minutes, +2 AC on the caster or an ally. Costs a
/// 1st-level slot.
pub struct ShieldOfFaithHandler;

impl AbilityHandler for ShieldOfFaithHandler {
    fn key(&self) -> &'static str {
        SHIELD_OF_FAITH
    }

    fn check(&self, character: &Character, _target: Option<&Character>, _input: &AbilityInput) -> Result<(), String> {
        if character.spell_slots.lowest_available(1).is_none() {
            return Err("No spell slots remaining".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let level = ctx
            .character
            .spell_slots
            .lowest_available(1)
            .ok_or_else(|| AbilityError::Insufficient("spell slots".to_string()))?;
        if !ctx.character.use_spell_slot(level) {
            return Err(AbilityError::Insufficient("spell slots".to_string()));
        }

        let recipient = ctx.recipient();
        let evicted = recipient.effects.add(
            ActiveEffect::new("Shield of Faith", SHIELD_OF_FAITH, EffectDuration::Minutes(10))
                .with_concentration()
                .with_modifier(Modifier::ac_bonus(2)),
        );
        let mut message = format!("A shimmering field surrounds {} (+2 AC).", recipient.name);
        if !evicted.is_empty() {
            let names: Vec<_> = evicted.iter().map(|e| e.name.as_str()).collect();
            message.push_str(&format!(" Concentration on {} ends.", names.join(", ")));
        }
        Ok(AbilityOutcome::new(message).with_effect("Shield of Faith"))
    }
}
