use super::{AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome};
use crate::character::Character;
use crate::dice;
use crate::events::{EventKind, ListenerControl, Subscription};

pub const SNEAK_ATTACK: &str = "sneak_attack";

/// Number of sneak attack d6s at a rogue level.
pub fn sneak_attack_dice(level: u8) -> u32 {
    (level as u32).div_ceil(2).max(1)
}

/// Primes the rogue's next finesse or ranged hit this turn with extra d6s.
/// Unused dice are lost when the turn ends.
pub struct SneakAttackHandler;

impl AbilityHandler for SneakAttackHandler {
    fn key(&self) -> &'static str {
        SNEAK_ATTACK
    }

    fn check(&self, character: &Character, _target: Option<&Character>, _input: &AbilityInput) -> Result<(), String> {
        let used = character
            .economy
            .log()
            .iter()
            .any(|e| e.source_key.as_deref() == Some(SNEAK_ATTACK));
        if used {
            return Err("Sneak Attack already used this turn".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let count = sneak_attack_dice(ctx.character.level);
        let roll = dice::roll(ctx.rng, count, 6, 0)?;
        let extra = roll.total;
        let owner = ctx.character.id;

        ctx.events.subscribe(Subscription::new(owner, EventKind::DamageRoll, SNEAK_ATTACK, move |event, _| {
            if event.strike.precise {
                event.add_damage(SNEAK_ATTACK, extra);
                ListenerControl::Expire
            } else {
                ListenerControl::Continue
            }
        }));
        ctx.events.subscribe(Subscription::new(owner, EventKind::TurnEnd, SNEAK_ATTACK, |_, _| {
            ListenerControl::Expire
        }));

        Ok(AbilityOutcome::new(format!(
            "{} readies a sneak attack: +{} damage on the next finesse or ranged hit this turn.",
            ctx.character.name, extra
        ))
        .with_damage_roll(roll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::test_support::run;
    use crate::attack::DamageType;
    use crate::character::{AbilityScores, CharacterClass};
    use crate::economy::ActionType;
    use crate::events::{CombatEvent, EventBus, StrikeInfo};

    fn rogue() -> Character {
        Character::new("Vex", CharacterClass::Rogue, 3, AbilityScores::new(10, 16, 12, 12, 10, 14))
    }

    #[test]
    fn test_dice_by_level() {
        assert_eq!(sneak_attack_dice(1), 1);
        assert_eq!(sneak_attack_dice(3), 2);
        assert_eq!(sneak_attack_dice(20), 10);
    }

    #[test]
    fn test_applies_once_to_precise_hit() {
        let events = EventBus::new();
        let mut vex = rogue();
        let outcome = run(&SneakAttackHandler, &mut vex, None, &Default::default(), &[4, 5], &events).unwrap();
        assert_eq!(outcome.damage_roll.unwrap().total, 9);

        let blunt = StrikeInfo {
            melee: true,
            uses_strength: true,
            ..Default::default()
        };
        let mut event = CombatEvent::damage_roll(vex.id, 3, DamageType::Bludgeoning, blunt, 1);
        events.publish(&mut event, &mut vex);
        assert_eq!(event.amount, 3);

        let precise = StrikeInfo {
            precise: true,
            ..Default::default()
        };
        let mut event = CombatEvent::damage_roll(vex.id, 5, DamageType::Piercing, precise, 1);
        events.publish(&mut event, &mut vex);
        assert_eq!(event.amount, 14);
        // Both listeners go together
        assert!(events.is_empty());
    }

    #[test]
    fn test_expires_at_turn_end() {
        let events = EventBus::new();
        let mut vex = rogue();
        run(&SneakAttackHandler, &mut vex, None, &Default::default(), &[1, 1], &events).unwrap();
        events.publish(&mut CombatEvent::turn_end(vex.id, 1), &mut vex);
        assert!(events.is_empty());
    }

    #[test]
    fn test_once_per_turn() {
        let mut vex = rogue();
        assert!(SneakAttackHandler.check(&vex, None, &Default::default()).is_ok());
        vex.economy
            .record_action(ActionType::Free, None, Some(SNEAK_ATTACK));
        assert!(SneakAttackHandler.check(&vex, None, &Default::default()).is_err());
    }
}
