use super::{AbilityContext, AbilityError, AbilityHandler, AbilityOutcome};
use crate::dice;

pub const SECOND_WIND: &str = "second_wind";
pub const ACTION_SURGE: &str = "action_surge";

/// Bonus action: regain 1d10 + fighter level hit points.
pub struct SecondWindHandler;

impl AbilityHandler for SecondWindHandler {
    fn key(&self) -> &'static str {
        SECOND_WIND
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        let roll = dice::roll(ctx.rng, 1, 10, ctx.character.level as i32)?;
        let healed = ctx.character.heal(roll.total);
        Ok(AbilityOutcome::new(format!(
            "{} catches their breath and regains {} HP ({}).",
            ctx.character.name, healed, roll
        ))
        .with_healing(healed)
        .with_damage_roll(roll))
    }
}

/// One additional action this turn.
pub struct ActionSurgeHandler;

impl AbilityHandler for ActionSurgeHandler {
    fn key(&self) -> &'static str {
        ACTION_SURGE
    }

    fn execute(&self, ctx: &mut AbilityContext<'_>) -> Result<AbilityOutcome, AbilityError> {
        ctx.character.economy.grant_extra_action();
        Ok(AbilityOutcome::new(format!(
            "{} surges forward and gains an additional action.",
            ctx.character.name
        )))
    }
}
