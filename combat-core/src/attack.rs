//! Attack and damage resolution.
//!
//! [`resolve_attack`] turns an attack bonus, a damage bonus and a weapon's
//! damage dice into a finished [`AttackOutcome`]: it rolls the d20, rolls the
//! damage dice (rerolling low dice for Great Weapon Fighting), doubles the
//! dice on a natural 20 and zeroes the attack total on a natural 1.

use crate::dice::{self, Advantage, DiceError, DiceExpression, Randomizer, RollOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common D&D damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }

    /// Bludgeoning, piercing or slashing.
    pub fn is_physical(&self) -> bool {
        matches!(
            self,
            DamageType::Bludgeoning | DamageType::Piercing | DamageType::Slashing
        )
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fighting styles that change attack or damage math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FightingStyle {
    #[default]
    None,
    /// +2 to attack rolls with ranged weapons.
    Archery,
    /// +1 AC while wearing armor.
    Defense,
    /// +2 damage with a one-handed melee weapon and no other weapon.
    Dueling,
    /// Reroll 1s and 2s on damage dice, once per die.
    GreatWeaponFighting,
    /// Add the ability modifier to off-hand damage.
    TwoWeaponFighting,
}

impl FromStr for FightingStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "" | "none" => Ok(FightingStyle::None),
            "archery" => Ok(FightingStyle::Archery),
            "defense" => Ok(FightingStyle::Defense),
            "dueling" => Ok(FightingStyle::Dueling),
            "great-weapon" | "great-weapon-fighting" => Ok(FightingStyle::GreatWeaponFighting),
            "two-weapon" | "two-weapon-fighting" => Ok(FightingStyle::TwoWeaponFighting),
            other => Err(format!("unknown fighting style: {other}")),
        }
    }
}

/// Damage dice for a weapon or effect, e.g. `2d6 slashing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageSpec {
    pub count: u32,
    pub sides: u32,
    pub damage_type: DamageType,
}

impl DamageSpec {
    pub fn new(count: u32, sides: u32, damage_type: DamageType) -> Self {
        Self {
            count,
            sides,
            damage_type,
        }
    }

    /// Parse a single-group notation such as `"1d8"`.
    pub fn parse(notation: &str, damage_type: DamageType) -> Result<Self, DiceError> {
        let expr = DiceExpression::parse(notation)?;
        match (expr.components.as_slice(), expr.modifier) {
            ([component], 0) => Ok(Self::new(component.count, component.sides, damage_type)),
            _ => Err(DiceError::InvalidNotation(notation.to_string())),
        }
    }
}

impl fmt::Display for DamageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{} {}", self.count, self.sides, self.damage_type)
    }
}

/// A damage die replaced under Great Weapon Fighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerollRecord {
    pub original_value: u32,
    pub new_value: u32,
    /// Index into [`AttackOutcome::damage_roll`]'s `rolls`.
    pub dice_position: usize,
}

/// Extra damage added after the dice were rolled (rage, sneak attack, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRider {
    pub source: String,
    pub amount: i32,
}

/// A fully resolved attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// The kept d20, with the attack bonus as its bonus.
    pub attack_roll: RollOutcome,
    /// The d20 dropped under advantage or disadvantage.
    pub discarded_d20: Option<u32>,
    /// Every damage die (both sets on a critical), with the damage bonus.
    pub damage_roll: RollOutcome,
    pub attack_total: i32,
    pub damage_total: i32,
    pub damage_type: DamageType,
    pub is_critical: bool,
    pub is_fumble: bool,
    pub rerolls: Vec<RerollRecord>,
    pub riders: Vec<DamageRider>,
}

impl AttackOutcome {
    /// The raw d20 result.
    pub fn natural(&self) -> u32 {
        self.attack_roll.natural().unwrap_or(0)
    }

    /// Natural 1 always misses, natural 20 always hits.
    pub fn hits(&self, armor_class: i32) -> bool {
        !self.is_fumble && (self.is_critical || self.attack_total >= armor_class)
    }

    /// Attach extra damage; the damage total grows accordingly.
    pub fn with_riders(mut self, riders: impl IntoIterator<Item = DamageRider>) -> Self {
        for rider in riders {
            self.damage_total += rider.amount;
            self.riders.push(rider);
        }
        self
    }
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.is_critical {
            " (critical)"
        } else if self.is_fumble {
            " (fumble)"
        } else {
            ""
        };
        write!(
            f,
            "attack {}{}, damage {} {}",
            self.attack_total, tag, self.damage_total, self.damage_type
        )
    }
}

/// Resolve an attack with a normal d20.
pub fn resolve_attack(
    rng: &dyn Randomizer,
    attack_bonus: i32,
    damage_bonus: i32,
    damage: &DamageSpec,
    style: FightingStyle,
) -> Result<AttackOutcome, DiceError> {
    resolve_attack_with_advantage(rng, attack_bonus, damage_bonus, damage, style, Advantage::Normal)
}

/// Resolve an attack, drawing two d20s under advantage or disadvantage.
///
/// Dice are drawn in a fixed order: the d20(s), the damage dice, any Great
/// Weapon Fighting rerolls for that set, then (on a natural 20) the second
/// damage set and its rerolls.
pub fn resolve_attack_with_advantage(
    rng: &dyn Randomizer,
    attack_bonus: i32,
    damage_bonus: i32,
    damage: &DamageSpec,
    style: FightingStyle,
    advantage: Advantage,
) -> Result<AttackOutcome, DiceError> {
    let d20 = dice::roll_d20(rng, advantage)?;
    let natural = d20.kept;
    let is_critical = natural == 20;
    let is_fumble = natural == 1;

    let mut rerolls = Vec::new();
    let mut damage_dice = roll_damage_set(rng, damage, style, 0, &mut rerolls)?;
    if is_critical {
        let offset = damage_dice.len();
        let extra = roll_damage_set(rng, damage, style, offset, &mut rerolls)?;
        damage_dice.extend(extra);
    }

    let attack_roll = RollOutcome::from_rolls(vec![natural], 20, attack_bonus);
    let damage_roll = RollOutcome::from_rolls(damage_dice, damage.sides, damage_bonus);
    let attack_total = if is_fumble { 0 } else { attack_roll.total };

    Ok(AttackOutcome {
        discarded_d20: d20.discarded,
        attack_total,
        damage_total: damage_roll.total,
        damage_type: damage.damage_type,
        is_critical,
        is_fumble,
        rerolls,
        riders: Vec::new(),
        attack_roll,
        damage_roll,
    })
}

/// Roll one set of damage dice. Under Great Weapon Fighting every 1 or 2 is
/// rerolled exactly once and the new value stands.
fn roll_damage_set(
    rng: &dyn Randomizer,
    damage: &DamageSpec,
    style: FightingStyle,
    position_offset: usize,
    rerolls: &mut Vec<RerollRecord>,
) -> Result<Vec<u32>, DiceError> {
    let mut values = dice::roll(rng, damage.count, damage.sides, 0)?.rolls;
    if style != FightingStyle::GreatWeaponFighting {
        return Ok(values);
    }

    for (i, value) in values.iter_mut().enumerate() {
        if *value <= 2 {
            let new_value = rng.roll_die(damage.sides)?;
            rerolls.push(RerollRecord {
                original_value: *value,
                new_value,
                dice_position: position_offset + i,
            });
            *value = new_value;
        }
    }
    Ok(values)
}
