use super::{AbilityContext, AbilityError, AbilityHandler, AbilityInput, AbilityOutcome};
use crate::character::Character;
use crate::economy::BonusActionOption;
use crate::effects::{ActiveEffect, EffectDuration, Modifier};
use crate::strike::{self, StrikeKind};

pub const KI: &str = "ki";

const FLURRY_OF_BLOWS: &str = "flurry_of_blows";
const PATIENT_DEFENSE: &str = "patient_defense";
const STEP_OF_THE_WIND: &str = "step_of_the_wind";

/// Spends one ki point on a monk technique chosen by the input option:
/// `flurry_of_blows` (two unarmed strikes after an attack), `patient_defense`
/// (dodge) or `step_of_the_wind` (dash and disengage).
pub struct KiHandler;

impl AbilityHandler for KiHandler {
    fn key(&self) -> &'static str {
        KI
    }

    fn check(&self, character: &Character, _target: Option<&Character>, input: &AbilityInput) -> Result<(), String> {
        let points = character.ability(KI).map_or(0, |r| r.uses_remaining);
        if points < 1 {
            return Err("No ki points remaining".to_string());
        }
        match input.option.as_deref() {
            Some(FLURRY_OF_BLOWS) => {
                if character.economy.is_bonus_action_available(BonusActionOption::FlurryOfBlows) {
                    Ok(())
                } else {
                    Err("Flurry of Blows needs an attack first this turn".to_string())
                }
            }
            Some(PATIENT_DEFENSE) | Some(STEP_OF_THE_WIND) => Ok(()),
            Some(other) => Err(format!("Unknown ki technique: {other}")),
            None => Err(format!(
                "Choose a technique: {FLURRY_OF_BLOWS}, {PATIENT_DEFENSE} or {STEP_OF_THE_WIND}"
            )),
        }
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let option = ctx.input.option.clone().unwrap_or_default();
        let remaining = match ctx.character.ability_mut(KI) {
            Some(record) => {
                if !record.debit(1) {
                    return Err(AbilityError::Insufficient("ki points".to_string()));
                }
                record.uses_remaining
            }
            None => return Err(AbilityError::Insufficient("ki points".to_string())),
        };
        let name = ctx.character.name.clone();

        let outcome = match option.as_str() {
            FLURRY_OF_BLOWS => {
                let profile = strike::strike_profile(ctx.character, StrikeKind::Unarmed)
                    .map_err(|e| AbilityError::InvalidInput(e.to_string()))?;
                let strikes = strike::resolve_strikes(
                    ctx.rng,
                    ctx.events,
                    ctx.character,
                    &profile,
                    2,
                    ctx.input.advantage,
                    ctx.input.target_ac,
                    ctx.round,
                )?;
                let hits = strikes.iter().filter(|s| s.hit).count();
                let attacks = strikes.into_iter().map(|s| s.outcome).collect();
                let mut outcome = AbilityOutcome::new(format!(
                    "{name} unleashes a flurry of blows: {hits} of 2 strikes land."
                ));
                outcome.attacks = attacks;
                outcome
            }
            PATIENT_DEFENSE => {
                ctx.character.effects.add(
                    ActiveEffect::new("Patient Defense", KI, EffectDuration::Rounds(1))
                        .with_modifier(Modifier::dodging()),
                );
                AbilityOutcome::new(format!("{name} takes the Dodge action.")).with_effect("Patient Defense")
            }
            STEP_OF_THE_WIND => {
                // Dash, and stay disengaged until the next turn starts
                ctx.character.economy.grant_dash();
                ctx.character
                    .effects
                    .add(ActiveEffect::new("Step of the Wind", KI, EffectDuration::Rounds(1)));
                let speed = ctx.character.speed;
                AbilityOutcome::new(format!(
                    "{name} moves like the wind: {} ft of movement this turn.",
                    ctx.character.economy.movement_budget(speed)
                ))
                .with_effect("Step of the Wind")
            }
            other => return Err(AbilityError::InvalidInput(format!("Unknown ki technique: {other}"))),
        };

        Ok(AbilityOutcome {
            message: format!("{} ({} ki left)", outcome.message, remaining),
            ..outcome
        })
    }
}
