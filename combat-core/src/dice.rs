//! Dice rolling.
//!
//! Every random number in the engine flows through a [`Randomizer`], so a
//! test can swap in a [`ScriptedRandomizer`] and get exact, repeatable
//! results. [`roll`] is the primitive the attack resolver and ability
//! handlers build on.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice spec: {count}d{sides} (count and sides must be at least 1)")]
    InvalidDiceSpec { count: u32, sides: u32 },
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Scripted dice exhausted after {supplied} rolls")]
    ExhaustedSequence { supplied: usize },
    #[error("Scripted value {value} is outside 1..={sides}")]
    OutOfRange { value: u32, sides: u32 },
}

/// Source of uniform die results in `1..=sides`.
pub trait Randomizer: Send + Sync {
    fn roll_die(&self, sides: u32) -> Result<u32, DiceError>;
}

/// Randomizer backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandomizer;

impl Randomizer for ThreadRandomizer {
    fn roll_die(&self, sides: u32) -> Result<u32, DiceError> {
        if sides == 0 {
            return Err(DiceError::InvalidDiceSpec { count: 1, sides });
        }
        Ok(rand::thread_rng().gen_range(1..=sides))
    }
}

/// Reproducible randomizer seeded from a `u64`.
#[derive(Debug)]
pub struct SeededRandomizer {
    rng: Mutex<StdRng>,
}

impl SeededRandomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Randomizer for SeededRandomizer {
    fn roll_die(&self, sides: u32) -> Result<u32, DiceError> {
        if sides == 0 {
            return Err(DiceError::InvalidDiceSpec { count: 1, sides });
        }
        Ok(self.rng.lock().gen_range(1..=sides))
    }
}

/// Replays a fixed list of die results, in order.
///
/// Requesting more rolls than were supplied fails with
/// [`DiceError::ExhaustedSequence`]; a supplied value that cannot appear on
/// the requested die fails with [`DiceError::OutOfRange`].
#[derive(Debug)]
pub struct ScriptedRandomizer {
    values: Vec<u32>,
    cursor: Mutex<usize>,
}

impl ScriptedRandomizer {
    pub fn new(values: impl Into<Vec<u32>>) -> Self {
        Self {
            values: values.into(),
            cursor: Mutex::new(0),
        }
    }

    /// Number of results handed out so far.
    pub fn consumed(&self) -> usize {
        *self.cursor.lock()
    }

    /// Number of results not yet handed out.
    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.consumed())
    }
}

impl Randomizer for ScriptedRandomizer {
    fn roll_die(&self, sides: u32) -> Result<u32, DiceError> {
        let mut cursor = self.cursor.lock();
        let value = *self
            .values
            .get(*cursor)
            .ok_or(DiceError::ExhaustedSequence {
                supplied: self.values.len(),
            })?;
        if value < 1 || value > sides {
            return Err(DiceError::OutOfRange { value, sides });
        }
        *cursor += 1;
        Ok(value)
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// Result of rolling a group of identical dice plus a flat bonus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Individual die results, in the order they were rolled.
    pub rolls: Vec<u32>,
    pub sides: u32,
    pub bonus: i32,
    /// Sum of the dice, without the bonus.
    pub sum: u32,
    pub total: i32,
    pub min: u32,
    pub max: u32,
}

impl RollOutcome {
    /// Build an outcome from already-rolled dice.
    pub fn from_rolls(rolls: Vec<u32>, sides: u32, bonus: i32) -> Self {
        let sum: u32 = rolls.iter().sum();
        Self {
            min: rolls.iter().copied().min().unwrap_or(0),
            max: rolls.iter().copied().max().unwrap_or(0),
            total: sum as i32 + bonus,
            sum,
            rolls,
            sides,
            bonus,
        }
    }

    /// The single die of a one-die roll (e.g. the d20 of an attack).
    pub fn natural(&self) -> Option<u32> {
        match self.rolls.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let dice = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.bonus {
            0 => format!("[{dice}]"),
            b if b > 0 => format!("[{dice}] + {b}"),
            b => format!("[{dice}] - {}", b.abs()),
        }
    }
}

impl fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Roll `count` dice with `sides` sides each and add `bonus`.
pub fn roll(
    rng: &dyn Randomizer,
    count: u32,
    sides: u32,
    bonus: i32,
) -> Result<RollOutcome, DiceError> {
    if count < 1 || sides < 1 {
        return Err(DiceError::InvalidDiceSpec { count, sides });
    }
    let rolls = (0..count)
        .map(|_| rng.roll_die(sides))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RollOutcome::from_rolls(rolls, sides, bonus))
}

/// A d20 rolled under an advantage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    pub kept: u32,
    /// The die that was rolled and dropped under advantage/disadvantage.
    pub discarded: Option<u32>,
}

/// Roll a d20, drawing a second die when `advantage` is not normal.
pub fn roll_d20(rng: &dyn Randomizer, advantage: Advantage) -> Result<D20Roll, DiceError> {
    let first = rng.roll_die(20)?;
    if advantage == Advantage::Normal {
        return Ok(D20Roll {
            kept: first,
            discarded: None,
        });
    }

    let second = rng.roll_die(20)?;
    let (kept, discarded) = match advantage {
        Advantage::Advantage => (first.max(second), first.min(second)),
        _ => (first.min(second), first.max(second)),
    };
    Ok(D20Roll {
        kept,
        discarded: Some(discarded),
    })
}

/// A count of identical dice, e.g. `2d6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
}

impl fmt::Display for DiceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// A complete dice expression (e.g., 2d6+1d4+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            if sign < 0 {
                return Err(DiceError::InvalidNotation(s.to_string()));
            }
            let count_str = &s[..d_pos];
            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };
            let sides: u32 = s[d_pos + 1..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

            DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;
            if count == 0 {
                return Err(DiceError::InvalidDiceSpec { count, sides });
            }

            components.push(DiceComponent { count, sides });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// Roll every component; the modifier is attached to the last group.
    pub fn roll_with(&self, rng: &dyn Randomizer) -> Result<Vec<RollOutcome>, DiceError> {
        let last = self.components.len().saturating_sub(1);
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let bonus = if i == last { self.modifier } else { 0 };
                roll(rng, c.count, c.sides, bonus)
            })
            .collect()
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components, vec![DiceComponent { count: 1, sides: 20 }]);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        assert_eq!(expr.modifier, 5);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);
    }

    #[test]
    fn test_parse_rejects_odd_dice() {
        assert_eq!(
            DiceExpression::parse("1d7").unwrap_err(),
            DiceError::InvalidDieSize(7)
        );
        assert!(DiceExpression::parse("0d6").is_err());
        assert!(DiceExpression::parse("").is_err());
        assert!(DiceExpression::parse("xd6").is_err());
    }

    #[test]
    fn test_roll_rejects_zero_count_or_sides() {
        let rng = ThreadRandomizer;
        assert_eq!(
            roll(&rng, 0, 6, 0).unwrap_err(),
            DiceError::InvalidDiceSpec { count: 0, sides: 6 }
        );
        assert_eq!(
            roll(&rng, 2, 0, 0).unwrap_err(),
            DiceError::InvalidDiceSpec { count: 2, sides: 0 }
        );
    }

    #[test]
    fn test_scripted_values_in_order() {
        let rng = ScriptedRandomizer::new(vec![3, 5, 1]);
        let outcome = roll(&rng, 3, 6, 2).unwrap();
        assert_eq!(outcome.rolls, vec![3, 5, 1]);
        assert_eq!(outcome.sum, 9);
        assert_eq!(outcome.total, 11);
        assert_eq!(outcome.min, 1);
        assert_eq!(outcome.max, 5);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    fn test_scripted_exhaustion() {
        let rng = ScriptedRandomizer::new(vec![4]);
        assert_eq!(
            roll(&rng, 2, 6, 0).unwrap_err(),
            DiceError::ExhaustedSequence { supplied: 1 }
        );
    }

    #[test]
    fn test_scripted_out_of_range() {
        let rng = ScriptedRandomizer::new(vec![9]);
        assert_eq!(
            roll(&rng, 1, 8, 0).unwrap_err(),
            DiceError::OutOfRange { value: 9, sides: 8 }
        );
    }

    #[test]
    fn test_d20_advantage_keeps_higher() {
        let rng = ScriptedRandomizer::new(vec![4, 17, 4, 17]);
        let adv = roll_d20(&rng, Advantage::Advantage).unwrap();
        assert_eq!(adv.kept, 17);
        assert_eq!(adv.discarded, Some(4));

        let dis = roll_d20(&rng, Advantage::Disadvantage).unwrap();
        assert_eq!(dis.kept, 4);
        assert_eq!(dis.discarded, Some(17));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = SeededRandomizer::new(42);
        let b = SeededRandomizer::new(42);
        let ra = roll(&a, 10, 20, 0).unwrap();
        let rb = roll(&b, 10, 20, 0).unwrap();
        assert_eq!(ra.rolls, rb.rolls);
    }

    #[test]
    fn test_expression_roll_with() {
        let rng = ScriptedRandomizer::new(vec![2, 6, 3]);
        let expr = DiceExpression::parse("2d6+1d4+3").unwrap();
        let groups = expr.roll_with(&rng).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].total, 8);
        assert_eq!(groups[1].total, 6);
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
    }

    proptest! {
        #[test]
        fn roll_total_is_sum_plus_bonus(
            count in 1u32..12,
            sides in 1u32..30,
            bonus in -10i32..10,
            seed in any::<u64>(),
        ) {
            let rng = SeededRandomizer::new(seed);
            let outcome = roll(&rng, count, sides, bonus).unwrap();
            prop_assert_eq!(outcome.rolls.len(), count as usize);
            prop_assert_eq!(outcome.total, outcome.rolls.iter().sum::<u32>() as i32 + bonus);
            prop_assert!(outcome.rolls.iter().all(|r| (1..=sides).contains(r)));
            prop_assert!(outcome.min <= outcome.max);
        }
    }
}
