use super::{AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome};
use crate::character::{Character, CharacterClass};
use crate::effects::{ActiveEffect, EffectDuration};

pub const BARDIC_INSPIRATION: &str = "bardic_inspiration";

/// Inspiration die size by bard level.
pub fn inspiration_die(level: u8) -> u32 {
    match level {
        0..=4 => 6,
        5..=9 => 8,
        10..=14 => 10,
        _ => 12,
    }
}

/// Gives another creature an inspiration die, held as an effect for ten
/// minutes.
pub struct BardicInspirationHandler;

impl AbilityHandler for BardicInspirationHandler {
    fn key(&self) -> &'static str {
        BARDIC_INSPIRATION
    }

    fn check(&self, character: &Character, target: Option<&Character>, _input: &AbilityInput) -> Result<(), String> {
        match target {
            Some(t) if t.id != character.id => Ok(()),
            _ => Err("Bardic Inspiration needs another creature as the target".to_string()),
        }
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let level = if ctx.character.class == CharacterClass::Bard {
            ctx.character.level
        } else {
            1
        };
        let effect_name = format!("Bardic Inspiration (d{})", inspiration_die(level));
        let bard_name = ctx.character.name.clone();
        let target = ctx
            .target
            .as_deref_mut()
            .ok_or_else(|| AbilityError::InvalidInput("missing target".to_string()))?;

        // A creature holds only one inspiration die at a time.
        target.effects.remove_from_source(BARDIC_INSPIRATION);
        target.effects.add(ActiveEffect::new(
            effect_name.clone(),
            BARDIC_INSPIRATION,
            EffectDuration::Minutes(10),
        ));
        Ok(AbilityOutcome::new(format!("{} inspires {} with {}.", bard_name, target.name, effect_name))
            .with_effect(effect_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::test_support::run;
    use crate::character::AbilityScores;
    use crate::events::EventBus;

    #[test]
    fn test_die_size() {
        assert_eq!(inspiration_die(1), 6);
        assert_eq!(inspiration_die(5), 8);
        assert_eq!(inspiration_die(10), 10);
        assert_eq!(inspiration_die(15), 12);
    }

    #[test]
    fn test_inspires_target() {
        let events = EventBus::new();
        let mut bard = Character::new("Lyra", CharacterClass::Bard, 5, AbilityScores::new(8, 14, 12, 10, 10, 16));
        let mut ally = Character::new("Tam", CharacterClass::Fighter, 5, AbilityScores::default());
        let input = AbilityInput::new().with_target(ally.id);

        run(&BardicInspirationHandler, &mut bard, Some(&mut ally), &input, &[], &events).unwrap();
        run(&BardicInspirationHandler, &mut bard, Some(&mut ally), &input, &[], &events).unwrap();
        assert_eq!(ally.effects.len(), 1);
        assert!(ally.effects.find_named("Bardic Inspiration (d8)").is_some());
        assert!(bard.effects.is_empty());
    }

    #[test]
    fn test_needs_other_target() {
        let bard = Character::new("Lyra", CharacterClass::Bard, 1, AbilityScores::default());
        assert!(BardicInspirationHandler
            .check(&bard, None, &AbilityInput::new())
            .is_err());
        assert!(BardicInspirationHandler
            .check(&bard, Some(&bard), &AbilityInput::new())
            .is_err());
    }
}
