//! Class templates.
//!
//! Per-class resources at a given level: ability records with their use
//! counts, spell slot pools, the number of attacks per action and the monk's
//! martial arts die.

use crate::abilities::{
    ACTION_SURGE, BARDIC_INSPIRATION, DIVINE_SMITE, KI, LAY_ON_HANDS, RAGE, SECOND_WIND, SHIELD_OF_FAITH,
    SNEAK_ATTACK,
};
use crate::character::{Ability, AbilityRecord, AbilityScores, Character, CharacterClass, RestType, SlotSource};
use crate::config::EngineConfig;
use crate::economy::ActionCost;

/// How a class gains spell slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spellcasting {
    None,
    /// Paladin and ranger: the full table at half level, from 2nd level.
    Half,
    Full,
    /// Warlock: a few slots, all of one level, back on a short rest.
    Pact,
}

/// Class-wide data independent of level.
pub struct ClassData {
    pub saving_throws: [Ability; 2],
    pub spellcasting: Spellcasting,
    /// Gets a second attack per action at 5th level.
    pub extra_attack: bool,
}

impl CharacterClass {
    pub fn data(&self) -> ClassData {
        match self {
            CharacterClass::Barbarian => ClassData {
                saving_throws: [Ability::Strength, Ability::Constitution],
                spellcasting: Spellcasting::None,
                extra_attack: true,
            },
            CharacterClass::Bard => ClassData {
                saving_throws: [Ability::Dexterity, Ability::Charisma],
                spellcasting: Spellcasting::Full,
                extra_attack: false,
            },
            CharacterClass::Cleric => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                spellcasting: Spellcasting::Full,
                extra_attack: false,
            },
            CharacterClass::Druid => ClassData {
                saving_throws: [Ability::Intelligence, Ability::Wisdom],
                spellcasting: Spellcasting::Full,
                extra_attack: false,
            },
            CharacterClass::Fighter => ClassData {
                saving_throws: [Ability::Strength, Ability::Constitution],
                spellcasting: Spellcasting::None,
                extra_attack: true,
            },
            CharacterClass::Monk => ClassData {
                saving_throws: [Ability::Strength, Ability::Dexterity],
                spellcasting: Spellcasting::None,
                extra_attack: true,
            },
            CharacterClass::Paladin => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                spellcasting: Spellcasting::Half,
                extra_attack: true,
            },
            CharacterClass::Ranger => ClassData {
                saving_throws: [Ability::Strength, Ability::Dexterity],
                spellcasting: Spellcasting::Half,
                extra_attack: true,
            },
            CharacterClass::Rogue => ClassData {
                saving_throws: [Ability::Dexterity, Ability::Intelligence],
                spellcasting: Spellcasting::None,
                extra_attack: false,
            },
            CharacterClass::Sorcerer => ClassData {
                saving_throws: [Ability::Constitution, Ability::Charisma],
                spellcasting: Spellcasting::Full,
                extra_attack: false,
            },
            CharacterClass::Warlock => ClassData {
                saving_throws: [Ability::Wisdom, Ability::Charisma],
                spellcasting: Spellcasting::Pact,
                extra_attack: false,
            },
            CharacterClass::Wizard => ClassData {
                saving_throws: [Ability::Intelligence, Ability::Wisdom],
                spellcasting: Spellcasting::Full,
                extra_attack: false,
            },
        }
    }
}

/// Slots per spell level (index 0 is 1st level) for a full caster.
const FULL_CASTER_SLOTS: [[u32; 9]; 20] = [
    [2, 0, 0, 0, 0, 0, 0, 0, 0],
    [3, 0, 0, 0, 0, 0, 0, 0, 0],
    [4, 2, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 0, 0, 0, 0, 0, 0, 0],
    [4, 3, 2, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 0, 0, 0, 0, 0, 0],
    [4, 3, 3, 1, 0, 0, 0, 0, 0],
    [4, 3, 3, 2, 0, 0, 0, 0, 0],
    [4, 3, 3, 3, 1, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 0, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 0, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 0, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 0],
    [4, 3, 3, 3, 2, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 1, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 1, 1, 1],
    [4, 3, 3, 3, 3, 2, 2, 1, 1],
];

/// Spell slot pools as `(spell level, count, source)`.
pub fn spell_slots_for(spellcasting: Spellcasting, level: u8) -> Vec<(u8, u32, SlotSource)> {
    let level = level.clamp(1, 20);
    let table_level = match spellcasting {
        Spellcasting::None => return Vec::new(),
        Spellcasting::Pact => {
            let count = match level {
                1 => 1,
                2..=10 => 2,
                11..=16 => 3,
                _ => 4,
            };
            let slot_level = level.div_ceil(2).min(5);
            return vec![(slot_level, count, SlotSource::PactMagic)];
        }
        Spellcasting::Half if level < 2 => return Vec::new(),
        Spellcasting::Half => level.div_ceil(2),
        Spellcasting::Full => level,
    };
    FULL_CASTER_SLOTS[table_level as usize - 1]
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(i, count)| (i as u8 + 1, *count, SlotSource::Standard))
        .collect()
}

/// Rages per long rest. Unlimited at 20th level.
pub fn rage_uses(level: u8) -> i32 {
    match level {
        0..=2 => 2,
        3..=5 => 3,
        6..=11 => 4,
        12..=16 => 5,
        17..=19 => 6,
        _ => crate::character::UNLIMITED_USES,
    }
}

pub fn martial_arts_die(level: u8) -> u32 {
    match level {
        0..=4 => 4,
        5..=10 => 6,
        11..=16 => 8,
        _ => 10,
    }
}

pub fn attacks_per_action(class: CharacterClass, level: u8) -> u8 {
    match class {
        CharacterClass::Fighter if level >= 20 => 4,
        CharacterClass::Fighter if level >= 11 => 3,
        c if level >= 5 && c.data().extra_attack => 2,
        _ => 1,
    }
}

/// Ability records the class has at `level`.
pub fn class_abilities(class: CharacterClass, level: u8, scores: &AbilityScores) -> Vec<AbilityRecord> {
    let mut records = Vec::new();
    match class {
        CharacterClass::Barbarian => {
            let uses = rage_uses(level);
            let rage = if uses == crate::character::UNLIMITED_USES {
                AbilityRecord::unlimited(RAGE, "Rage", ActionCost::BonusAction)
            } else {
                AbilityRecord::new(RAGE, "Rage", uses, ActionCost::BonusAction, RestType::Long)
            };
            records.push(rage);
        }
        CharacterClass::Bard => {
            let uses = scores.modifier(Ability::Charisma).max(1);
            // Font of Inspiration
            let recharge = if level >= 5 { RestType::Short } else { RestType::Long };
            records.push(AbilityRecord::new(
                BARDIC_INSPIRATION,
                "Bardic Inspiration",
                uses,
                ActionCost::BonusAction,
                recharge,
            ));
        }
        CharacterClass::Fighter => {
            records.push(AbilityRecord::new(
                SECOND_WIND,
                "Second Wind",
                1,
                ActionCost::BonusAction,
                RestType::Short,
            ));
            if level >= 2 {
                let uses = if level >= 17 { 2 } else { 1 };
                records.push(AbilityRecord::new(
                    ACTION_SURGE,
                    "Action Surge",
                    uses,
                    ActionCost::Free,
                    RestType::Short,
                ));
            }
        }
        CharacterClass::Monk if level >= 2 => {
            records.push(
                AbilityRecord::new(KI, "Ki", level as i32, ActionCost::BonusAction, RestType::Short).pool(),
            );
        }
        CharacterClass::Paladin => {
            records.push(
                AbilityRecord::new(
                    LAY_ON_HANDS,
                    "Lay on Hands",
                    5 * level as i32,
                    ActionCost::Action,
                    RestType::Long,
                )
                .pool(),
            );
            if level >= 2 {
                records.push(AbilityRecord::unlimited(DIVINE_SMITE, "Divine Smite", ActionCost::Free));
                records.push(AbilityRecord::unlimited(
                    SHIELD_OF_FAITH,
                    "Shield of Faith",
                    ActionCost::BonusAction,
                ));
            }
        }
        CharacterClass::Rogue => {
            records.push(AbilityRecord::unlimited(SNEAK_ATTACK, "Sneak Attack", ActionCost::Free));
        }
        _ => {}
    }
    records
}

/// A character with every class resource for its level filled in.
pub fn build_character(
    name: impl Into<String>,
    class: CharacterClass,
    level: u8,
    scores: AbilityScores,
    config: &EngineConfig,
) -> Character {
    let mut character = Character::new(name, class, level, scores);
    let level = character.level;
    for record in class_abilities(class, level, &scores) {
        character.add_ability(record);
    }
    for (slot_level, count, source) in spell_slots_for(class.data().spellcasting, level) {
        character.spell_slots.set_pool(slot_level, count, source);
    }
    character.attacks_per_action = attacks_per_action(class, level);
    character.speed = config.default_speed_feet;
    if class == CharacterClass::Monk {
        character.martial_arts_die = Some(martial_arts_die(level));
    }
    character
}
