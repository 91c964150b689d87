//! The character aggregate: hit points, hit dice, spell slots, abilities,
//! effects, turn economy and equipment, plus the rest rules that restore
//! them.

use crate::attack::FightingStyle;
use crate::dice::DieType;
use crate::economy::{ActionCost, ActionEconomy, BonusActionContext};
use crate::effects::EffectLedger;
use crate::items::{EquipError, EquipSlot, Equipment, Weapon, WEAPONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Score 8-9 = -1, 10-11 = 0, 12-13 = +1, and so on.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Classes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Barbarian,
    Bard,
    Cleric,
    Druid,
    Fighter,
    Monk,
    Paladin,
    Ranger,
    Rogue,
    Sorcerer,
    Warlock,
    Wizard,
}

impl CharacterClass {
    pub fn hit_die(&self) -> DieType {
        match self {
            CharacterClass::Barbarian => DieType::D12,
            CharacterClass::Fighter | CharacterClass::Paladin | CharacterClass::Ranger => {
                DieType::D10
            }
            CharacterClass::Bard
            | CharacterClass::Cleric
            | CharacterClass::Druid
            | CharacterClass::Monk
            | CharacterClass::Rogue
            | CharacterClass::Warlock => DieType::D8,
            CharacterClass::Sorcerer | CharacterClass::Wizard => DieType::D6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Barbarian => "Barbarian",
            CharacterClass::Bard => "Bard",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Druid => "Druid",
            CharacterClass::Fighter => "Fighter",
            CharacterClass::Monk => "Monk",
            CharacterClass::Paladin => "Paladin",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Sorcerer => "Sorcerer",
            CharacterClass::Warlock => "Warlock",
            CharacterClass::Wizard => "Wizard",
        }
    }

    pub fn all() -> [CharacterClass; 12] {
        [
            CharacterClass::Barbarian,
            CharacterClass::Bard,
            CharacterClass::Cleric,
            CharacterClass::Druid,
            CharacterClass::Fighter,
            CharacterClass::Monk,
            CharacterClass::Paladin,
            CharacterClass::Ranger,
            CharacterClass::Rogue,
            CharacterClass::Sorcerer,
            CharacterClass::Warlock,
            CharacterClass::Wizard,
        ]
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CharacterClass::all()
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown class: {s}"))
    }
}

// ============================================================================
// Hit Points and Hit Dice
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        let maximum = maximum.max(1);
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    /// Heal up to the maximum; returns the hit points actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = self.current.saturating_add(amount.max(0)).min(self.maximum);
        self.current - old
    }

    /// Temporary hit points soak damage first, then current hit points,
    /// which never drop below zero. Returns the damage processed.
    pub fn damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        let absorbed = self.temporary.min(amount);
        self.temporary -= absorbed;
        self.current = (self.current - (amount - absorbed)).max(0);
        amount
    }

    /// Temporary hit points don't stack; the larger value wins.
    pub fn add_temp_hp(&mut self, amount: i32) {
        self.temporary = self.temporary.max(amount);
    }

    pub fn missing(&self) -> i32 {
        self.maximum - self.current
    }

    pub fn is_unconscious(&self) -> bool {
        self.current <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDice {
    pub die: DieType,
    pub max: u32,
    pub remaining: u32,
}

impl HitDice {
    pub fn new(die: DieType, max: u32) -> Self {
        Self {
            die,
            max,
            remaining: max,
        }
    }

    pub fn spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Long rest recovery: half the maximum (at least one), capped.
    /// Returns how many came back.
    pub fn recover_half(&mut self) -> u32 {
        let before = self.remaining;
        self.remaining = (self.remaining + (self.max / 2).max(1)).min(self.max);
        self.remaining - before
    }
}

// ============================================================================
// Rests and Spell Slots
// ============================================================================

/// What kind of rest restores a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestType {
    Short,
    Long,
    /// Never restored by resting.
    None,
}

impl fmt::Display for RestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestType::Short => "short rest",
            RestType::Long => "long rest",
            RestType::None => "no rest",
        })
    }
}

/// Where a slot pool comes from, which decides when it refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotSource {
    Standard,
    PactMagic,
}

impl SlotSource {
    pub fn recharge(&self) -> RestType {
        match self {
            SlotSource::Standard => RestType::Long,
            SlotSource::PactMagic => RestType::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlotPool {
    pub max: u32,
    pub remaining: u32,
    pub source: SlotSource,
}

/// Spell slots by slot level (1-9).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots {
    pools: BTreeMap<u8, SpellSlotPool>,
}

impl SpellSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) the pool at a slot level, full.
    pub fn set_pool(&mut self, level: u8, max: u32, source: SlotSource) {
        if (1..=9).contains(&level) {
            self.pools.insert(
                level,
                SpellSlotPool {
                    max,
                    remaining: max,
                    source,
                },
            );
        }
    }

    pub fn pool(&self, level: u8) -> Option<&SpellSlotPool> {
        self.pools.get(&level)
    }

    pub fn remaining(&self, level: u8) -> u32 {
        self.pools.get(&level).map_or(0, |p| p.remaining)
    }

    pub fn use_slot(&mut self, level: u8) -> bool {
        match self.pools.get_mut(&level) {
            Some(pool) if pool.remaining > 0 => {
                pool.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Lowest level at or above `min_level` with a slot left.
    pub fn lowest_available(&self, min_level: u8) -> Option<u8> {
        self.pools
            .range(min_level..)
            .find(|(_, p)| p.remaining > 0)
            .map(|(level, _)| *level)
    }

    /// Refill the pools this rest restores. Returns the levels refilled.
    pub fn restore(&mut self, rest: RestType) -> Vec<u8> {
        let mut restored = Vec::new();
        for (level, pool) in &mut self.pools {
            let refills = match rest {
                RestType::Long => true,
                RestType::Short => pool.source.recharge() == RestType::Short,
                RestType::None => false,
            };
            if refills && pool.remaining < pool.max {
                pool.remaining = pool.max;
                restored.push(*level);
            }
        }
        restored
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &SpellSlotPool)> {
        self.pools.iter().map(|(l, p)| (*l, p))
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

// ============================================================================
// Abilities
// ============================================================================

/// Sentinel for `uses_max` meaning no limit.
pub const UNLIMITED_USES: i32 = -1;

/// How uses are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityUsage {
    /// One use per activation, consumed before the handler runs.
    Discrete,
    /// A numeric pool (lay on hands, ki) the handler debits itself.
    Pool,
}

/// A named, limited-use ability and its activation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRecord {
    pub key: String,
    pub name: String,
    pub uses_max: i32,
    pub uses_remaining: i32,
    pub action_cost: ActionCost,
    pub recharge: RestType,
    pub usage: AbilityUsage,
    pub is_active: bool,
    /// `None` while active means "until manually ended".
    pub rounds_remaining: Option<u32>,
}

impl AbilityRecord {
    pub fn new(key: &str, name: &str, uses_max: i32, action_cost: ActionCost, recharge: RestType) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            uses_max,
            uses_remaining: uses_max,
            action_cost,
            recharge,
            usage: AbilityUsage::Discrete,
            is_active: false,
            rounds_remaining: None,
        }
    }

    pub fn unlimited(key: &str, name: &str, action_cost: ActionCost) -> Self {
        Self::new(key, name, UNLIMITED_USES, action_cost, RestType::None)
    }

    pub fn pool(mut self) -> Self {
        self.usage = AbilityUsage::Pool;
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.uses_max == UNLIMITED_USES
    }

    pub fn is_pool(&self) -> bool {
        self.usage == AbilityUsage::Pool
    }

    pub fn can_use(&self) -> bool {
        self.is_unlimited() || self.uses_remaining > 0
    }

    /// Spend one use. Unlimited abilities always succeed.
    pub fn consume(&mut self) -> bool {
        if self.is_unlimited() {
            return true;
        }
        if self.uses_remaining <= 0 {
            return false;
        }
        self.uses_remaining -= 1;
        true
    }

    /// Spend `amount` points from a pool.
    pub fn debit(&mut self, amount: i32) -> bool {
        if self.is_unlimited() {
            return true;
        }
        if amount < 0 || amount > self.uses_remaining {
            return false;
        }
        self.uses_remaining -= amount;
        true
    }

    pub fn restore(&mut self) {
        if !self.is_unlimited() {
            self.uses_remaining = self.uses_max;
        }
    }

    pub fn activate(&mut self, rounds: Option<u32>) {
        self.is_active = true;
        self.rounds_remaining = rounds;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.rounds_remaining = None;
    }
}

/// What a rest changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestSummary {
    pub hp_restored: i32,
    pub hit_dice_recovered: u32,
    pub abilities_restored: Vec<String>,
    pub slot_levels_restored: Vec<u8>,
    pub effects_removed: Vec<String>,
}

// ============================================================================
// Character
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub class: CharacterClass,
    pub level: u8,
    pub ability_scores: AbilityScores,
    pub hit_points: HitPoints,
    pub hit_dice: HitDice,
    pub spell_slots: SpellSlots,
    pub abilities: BTreeMap<String, AbilityRecord>,
    pub effects: EffectLedger,
    pub economy: ActionEconomy,
    pub equipment: Equipment,
    pub fighting_style: FightingStyle,
    /// Armor's AC before the dexterity modifier; `None` when unarmored.
    pub armor: Option<ArmorBase>,
    pub speed: u32,
    /// Martial Arts die for unarmed strikes, if any.
    pub martial_arts_die: Option<u32>,
    pub attacks_per_action: u8,
}

/// Worn armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmorBase {
    pub base: i32,
    /// Cap on the dexterity modifier (2 for medium, 0 for heavy).
    pub max_dex_bonus: Option<i32>,
}

impl Character {
    /// A character with average hit points for its class and level and no
    /// class abilities. See [`crate::class_data::build_character`] for the
    /// full template.
    pub fn new(name: impl Into<String>, class: CharacterClass, level: u8, ability_scores: AbilityScores) -> Self {
        let level = level.clamp(1, 20);
        let die = class.hit_die();
        let con = ability_scores.modifier(Ability::Constitution);
        let per_level = die.sides() as i32 / 2 + 1 + con;
        let max_hp = die.sides() as i32 + con + (level as i32 - 1) * per_level.max(1);

        Self {
            id: CharacterId::new(),
            name: name.into(),
            class,
            level,
            ability_scores,
            hit_points: HitPoints::new(max_hp),
            hit_dice: HitDice::new(die, level as u32),
            spell_slots: SpellSlots::new(),
            abilities: BTreeMap::new(),
            effects: EffectLedger::new(),
            economy: ActionEconomy::new(),
            equipment: Equipment::new(),
            fighting_style: FightingStyle::None,
            armor: None,
            speed: 30,
            martial_arts_die: None,
            attacks_per_action: 1,
        }
    }

    pub fn with_ability(mut self, record: AbilityRecord) -> Self {
        self.add_ability(record);
        self
    }

    pub fn with_fighting_style(mut self, style: FightingStyle) -> Self {
        self.fighting_style = style;
        self
    }

    pub fn with_armor(mut self, base: i32, max_dex_bonus: Option<i32>) -> Self {
        self.armor = Some(ArmorBase { base, max_dex_bonus });
        self
    }

    pub fn add_ability(&mut self, record: AbilityRecord) {
        self.abilities.insert(record.key.clone(), record);
    }

    pub fn ability(&self, key: &str) -> Option<&AbilityRecord> {
        self.abilities.get(key)
    }

    pub fn ability_mut(&mut self, key: &str) -> Option<&mut AbilityRecord> {
        self.abilities.get_mut(key)
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.ability_scores.modifier(ability)
    }

    pub fn proficiency_bonus(&self) -> i32 {
        2 + (self.level as i32 - 1) / 4
    }

    pub fn armor_class(&self) -> i32 {
        let dex = self.modifier(Ability::Dexterity);
        let base = match self.armor {
            Some(armor) => {
                let dex = armor.max_dex_bonus.map_or(dex, |cap| dex.min(cap));
                let defense = if self.fighting_style == FightingStyle::Defense { 1 } else { 0 };
                armor.base + dex + defense
            }
            None => match self.class {
                CharacterClass::Barbarian => 10 + dex + self.modifier(Ability::Constitution),
                CharacterClass::Monk => 10 + dex + self.modifier(Ability::Wisdom),
                _ => 10 + dex,
            },
        };
        base + self.effects.ac_bonus()
    }

    pub fn equip(&mut self, slot: EquipSlot, weapon: Weapon) -> Result<Option<Weapon>, EquipError> {
        self.equipment.equip(slot, weapon)
    }

    pub fn heal(&mut self, amount: i32) -> i32 {
        self.hit_points.heal(amount)
    }

    pub fn damage(&mut self, amount: i32) -> i32 {
        self.hit_points.damage(amount)
    }

    pub fn use_spell_slot(&mut self, level: u8) -> bool {
        self.spell_slots.use_slot(level)
    }

    /// Facts the action economy needs to decide which bonus actions unlock.
    pub fn bonus_action_context(&self) -> BonusActionContext {
        let monk_weapon_keys = if self.martial_arts_die.is_some() {
            WEAPONS
                .iter()
                .filter(|w| w.is_monk_weapon())
                .map(|w| w.key.clone())
                .collect()
        } else {
            Vec::new()
        };
        BonusActionContext {
            main_hand_key: self.equipment.main_hand.as_ref().map(|w| w.key.clone()),
            dual_wields_light: self.equipment.dual_wields_light(),
            has_martial_arts: self.martial_arts_die.is_some(),
            monk_weapon_keys,
            ki_available: self.ability("ki").is_some_and(|k| k.uses_remaining > 0),
        }
    }

    /// Short rest: short-rest abilities and pact slots come back and
    /// until-rest effects end. Hit points are untouched.
    pub fn short_rest(&mut self) -> RestSummary {
        let mut summary = RestSummary::default();
        for record in self.abilities.values_mut() {
            if record.recharge == RestType::Short && !record.is_unlimited() {
                record.restore();
                summary.abilities_restored.push(record.key.clone());
            }
        }
        summary.slot_levels_restored = self.spell_slots.restore(RestType::Short);
        summary.effects_removed = names(self.effects.clear_for_rest(RestType::Short));
        summary
    }

    /// Long rest: everything refills, every ability ends, and only
    /// permanent effects remain.
    pub fn long_rest(&mut self) -> RestSummary {
        let mut summary = RestSummary::default();
        summary.hp_restored = self.hit_points.heal(self.hit_points.maximum);
        self.hit_points.temporary = 0;
        for record in self.abilities.values_mut() {
            record.deactivate();
            if !record.is_unlimited() {
                record.restore();
                summary.abilities_restored.push(record.key.clone());
            }
        }
        summary.slot_levels_restored = self.spell_slots.restore(RestType::Long);
        summary.hit_dice_recovered = self.hit_dice.recover_half();
        summary.effects_removed = names(self.effects.clear_for_rest(RestType::Long));
        summary
    }
}

fn names(effects: Vec<crate::effects::ActiveEffect>) -> Vec<String> {
    effects.into_iter().map(|e| e.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::DamageType;
    use crate::effects::{ActiveEffect, EffectDuration, Modifier, ModifierScope};

    fn fighter() -> Character {
        Character::new("Roland", CharacterClass::Fighter, 3, AbilityScores::new(16, 12, 14, 10, 10, 8))
    }

    #[test]
    fn test_ability_modifier() {
        let scores = AbilityScores::new(8, 9, 10, 11, 12, 20);
        assert_eq!(scores.modifier(Ability::Strength), -1);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
        assert_eq!(scores.modifier(Ability::Constitution), 0);
        assert_eq!(scores.modifier(Ability::Intelligence), 0);
        assert_eq!(scores.modifier(Ability::Wisdom), 1);
        assert_eq!(scores.modifier(Ability::Charisma), 5);
    }

    #[test]
    fn test_average_hit_points() {
        // 10 + 2 at first level, then 6 + 2 for each of two more levels
        assert_eq!(fighter().hit_points.maximum, 28);
    }

    #[test]
    fn test_heal_clamps() {
        let mut hp = HitPoints::new(20);
        hp.damage(5);
        assert_eq!(hp.heal(100), 5);
        assert_eq!(hp.current, 20);
        assert_eq!(hp.heal(3), 0);
    }

    #[test]
    fn test_heal_huge_amount() {
        let mut hp = HitPoints::new(20);
        hp.damage(12);
        assert_eq!(hp.heal(i32::MAX), 12);
        assert_eq!(hp.current, 20);
    }

    #[test]
    fn test_temp_hp_absorbs_first() {
        let mut hp = HitPoints::new(20);
        hp.add_temp_hp(5);
        assert_eq!(hp.damage(8), 8);
        assert_eq!(hp.temporary, 0);
        assert_eq!(hp.current, 17);

        assert_eq!(hp.damage(50), 50);
        assert_eq!(hp.current, 0);
        assert!(hp.is_unconscious());
    }

    #[test]
    fn test_hit_dice_recovery() {
        let mut dice = HitDice::new(DieType::D10, 5);
        dice.remaining = 0;
        assert_eq!(dice.recover_half(), 2);
        assert_eq!(dice.remaining, 2);

        let mut single = HitDice::new(DieType::D8, 1);
        assert!(single.spend());
        assert!(!single.spend());
        assert_eq!(single.recover_half(), 1);
    }

    #[test]
    fn test_short_rest_restores_pact_slots_only() {
        let mut slots = SpellSlots::new();
        slots.set_pool(1, 4, SlotSource::Standard);
        slots.set_pool(2, 2, SlotSource::PactMagic);
        assert!(slots.use_slot(1));
        assert!(slots.use_slot(2));

        assert_eq!(slots.restore(RestType::Short), vec![2]);
        assert_eq!(slots.remaining(1), 3);
        assert_eq!(slots.remaining(2), 2);

        assert_eq!(slots.restore(RestType::Long), vec![1]);
        assert_eq!(slots.remaining(1), 4);
    }

    #[test]
    fn test_lowest_available_slot() {
        let mut slots = SpellSlots::new();
        slots.set_pool(1, 1, SlotSource::Standard);
        slots.set_pool(3, 1, SlotSource::Standard);
        assert_eq!(slots.lowest_available(1), Some(1));
        slots.use_slot(1);
        assert_eq!(slots.lowest_available(1), Some(3));
        assert_eq!(slots.lowest_available(4), None);
    }

    #[test]
    fn test_ability_uses() {
        let mut record = AbilityRecord::new("second_wind", "Second Wind", 1, ActionCost::BonusAction, RestType::Short);
        assert!(record.consume());
        assert!(!record.can_use());
        assert!(!record.consume());
        record.restore();
        assert_eq!(record.uses_remaining, 1);

        let mut unlimited = AbilityRecord::unlimited("sneak_attack", "Sneak Attack", ActionCost::Free);
        assert!(unlimited.consume());
        assert!(unlimited.can_use());

        let mut pool = AbilityRecord::new("lay_on_hands", "Lay on Hands", 10, ActionCost::Action, RestType::Long).pool();
        assert!(pool.debit(7));
        assert!(!pool.debit(4));
        assert_eq!(pool.uses_remaining, 3);
    }

    #[test]
    fn test_long_rest_resets_everything() {
        let mut character = fighter()
            .with_ability(AbilityRecord::new("second_wind", "Second Wind", 1, ActionCost::BonusAction, RestType::Short))
            .with_ability(AbilityRecord::new("rage", "Rage", 2, ActionCost::BonusAction, RestType::Long));
        character.damage(10);
        character.hit_points.add_temp_hp(4);
        character.ability_mut("rage").unwrap().consume();
        character.ability_mut("rage").unwrap().activate(Some(10));
        character.effects.add(ActiveEffect::new("Rage", "rage", EffectDuration::Rounds(10)));
        character
            .effects
            .add(ActiveEffect::new("Blessing", "shrine", EffectDuration::Permanent)
                .with_modifier(Modifier::damage_bonus(1, ModifierScope::All)));
        character.hit_dice.remaining = 0;

        let summary = character.long_rest();
        assert_eq!(summary.hp_restored, 10);
        assert_eq!(character.hit_points.current, character.hit_points.maximum);
        assert_eq!(character.hit_points.temporary, 0);
        assert!(character.abilities.values().all(|a| !a.is_active && a.rounds_remaining.is_none()));
        assert_eq!(character.ability("rage").unwrap().uses_remaining, 2);
        assert_eq!(character.effects.len(), 1);
        assert!(character.effects.iter().all(|e| e.duration.is_permanent()));
        assert_eq!(character.hit_dice.remaining, 1);
        assert_eq!(character.effects.damage_bonus(DamageType::Fire), 1);
    }

    #[test]
    fn test_short_rest_leaves_hit_points() {
        let mut character = fighter()
            .with_ability(AbilityRecord::new("second_wind", "Second Wind", 1, ActionCost::BonusAction, RestType::Short))
            .with_ability(AbilityRecord::new("indomitable", "Indomitable", 1, ActionCost::Free, RestType::Long));
        character.damage(6);
        character.ability_mut("second_wind").unwrap().consume();
        character.ability_mut("indomitable").unwrap().consume();

        let summary = character.short_rest();
        assert_eq!(summary.abilities_restored, vec!["second_wind".to_string()]);
        assert_eq!(character.hit_points.current, character.hit_points.maximum - 6);
        assert_eq!(character.ability("indomitable").unwrap().uses_remaining, 0);
    }

    #[test]
    fn test_armor_class() {
        let mut character = fighter();
        assert_eq!(character.armor_class(), 11);
        character = character.with_armor(16, Some(0)).with_fighting_style(FightingStyle::Defense);
        assert_eq!(character.armor_class(), 17);
        character
            .effects
            .add(ActiveEffect::new("Shield of Faith", "shield_of_faith", EffectDuration::Minutes(10))
                .with_modifier(Modifier::ac_bonus(2)));
        assert_eq!(character.armor_class(), 19);
    }

    #[test]
    fn test_class_from_str() {
        assert_eq!("paladin".parse::<CharacterClass>(), Ok(CharacterClass::Paladin));
        assert!("Necromancer".parse::<CharacterClass>().is_err());
    }
}
