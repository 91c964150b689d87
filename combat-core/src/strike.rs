//! Turning a character and a weapon into attack and damage bonuses, then
//! rolling attacks and letting listeners add damage to the hits.

use crate::attack::{self, AttackOutcome, DamageSpec, FightingStyle};
use crate::character::{Ability, Character};
use crate::dice::{Advantage, DiceError, Randomizer};
use crate::economy::{SUBTYPE_MELEE, SUBTYPE_OFF_HAND, SUBTYPE_RANGED, SUBTYPE_UNARMED};
use crate::events::{CombatEvent, EventBus, StrikeInfo};
use crate::items::{self, Weapon, WeaponProperty};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrikeError {
    #[error("Nothing wielded in the off hand")]
    EmptyOffHand,
}

/// Which hand (or fist) an attack comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrikeKind {
    /// The main-hand weapon, or a plain unarmed strike with nothing there.
    MainHand,
    OffHand,
    Unarmed,
}

/// Everything needed to resolve one attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeProfile {
    pub kind: StrikeKind,
    pub weapon: Weapon,
    pub attack_bonus: i32,
    pub damage_bonus: i32,
    pub damage: DamageSpec,
    /// Style passed to the resolver; only Great Weapon Fighting matters there.
    pub style: FightingStyle,
    pub info: StrikeInfo,
    pub subtype: &'static str,
}

impl StrikeProfile {
    pub fn source_key(&self) -> &str {
        &self.weapon.key
    }
}

/// Work out attack and damage bonuses for `kind`.
pub fn strike_profile(character: &Character, kind: StrikeKind) -> Result<StrikeProfile, StrikeError> {
    let unarmed = || items::unarmed_strike(character.martial_arts_die.unwrap_or(1));
    let weapon = match kind {
        StrikeKind::MainHand => character.equipment.main_hand.clone().unwrap_or_else(unarmed),
        StrikeKind::OffHand => character
            .equipment
            .off_hand
            .clone()
            .ok_or(StrikeError::EmptyOffHand)?,
        StrikeKind::Unarmed => unarmed(),
    };
    let is_unarmed = weapon.key == items::weapon_key("Unarmed Strike");

    let str_mod = character.modifier(Ability::Strength);
    let dex_mod = character.modifier(Ability::Dexterity);
    let dex_allowed = weapon.is_finesse()
        || (character.martial_arts_die.is_some() && (is_unarmed || weapon.is_monk_weapon()));
    let ability_mod = if weapon.is_ranged() {
        dex_mod
    } else if dex_allowed {
        str_mod.max(dex_mod)
    } else {
        str_mod
    };
    let uses_strength = !weapon.is_ranged() && ability_mod == str_mod;

    let style = character.fighting_style;
    let mut attack_bonus = character.proficiency_bonus() + ability_mod + weapon.magic_bonus
        + character.effects.attack_bonus();
    if style == FightingStyle::Archery && weapon.is_ranged() {
        attack_bonus += 2;
    }

    // Off-hand attacks only add a negative modifier, unless the character
    // has Two-Weapon Fighting.
    let mut damage_bonus = if kind == StrikeKind::OffHand && style != FightingStyle::TwoWeaponFighting {
        ability_mod.min(0)
    } else {
        ability_mod
    };
    if style == FightingStyle::Dueling
        && kind == StrikeKind::MainHand
        && character.equipment.wields_single_one_handed()
    {
        damage_bonus += 2;
    }
    damage_bonus += weapon.magic_bonus + character.effects.damage_bonus(weapon.damage.damage_type);

    let gwf_applies = weapon.is_melee()
        && (weapon.is_two_handed()
            || weapon
                .properties
                .iter()
                .any(|p| matches!(p, WeaponProperty::Versatile(_))));
    let resolver_style = if style == FightingStyle::GreatWeaponFighting && gwf_applies {
        style
    } else {
        FightingStyle::None
    };

    let subtype = match kind {
        StrikeKind::OffHand => SUBTYPE_OFF_HAND,
        _ if is_unarmed => SUBTYPE_UNARMED,
        _ if weapon.is_ranged() => SUBTYPE_RANGED,
        _ => SUBTYPE_MELEE,
    };

    Ok(StrikeProfile {
        kind,
        damage: weapon.damage,
        info: StrikeInfo {
            melee: weapon.is_melee(),
            uses_strength,
            precise: weapon.is_finesse() || weapon.is_ranged(),
            critical: false,
        },
        weapon,
        attack_bonus,
        damage_bonus,
        style: resolver_style,
        subtype,
    })
}

/// One attack and whether it landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStrike {
    pub outcome: AttackOutcome,
    pub hit: bool,
}

/// Roll one attack and decide whether it landed (any non-fumble when no AC
/// is given). Listeners are not involved.
pub fn roll_strike(
    rng: &dyn Randomizer,
    profile: &StrikeProfile,
    advantage: Advantage,
    target_ac: Option<i32>,
) -> Result<ResolvedStrike, DiceError> {
    let outcome = attack::resolve_attack_with_advantage(
        rng,
        profile.attack_bonus,
        profile.damage_bonus,
        &profile.damage,
        profile.style,
        advantage,
    )?;
    let hit = match target_ac {
        Some(ac) => outcome.hits(ac),
        None => !outcome.is_fumble,
    };
    Ok(ResolvedStrike { outcome, hit })
}

/// Run the attacker's `DamageRoll` listeners for a hit. The damage total
/// becomes whatever amount the event carries once they are done, so a
/// listener may either call `add_damage` or change the amount directly.
pub fn apply_hit_listeners(
    events: &EventBus,
    attacker: &mut Character,
    profile: &StrikeProfile,
    strike: &mut ResolvedStrike,
    round: u32,
) {
    if !strike.hit {
        return;
    }
    let outcome = &mut strike.outcome;
    let info = StrikeInfo {
        critical: outcome.is_critical,
        ..profile.info
    };
    let mut event = CombatEvent::damage_roll(attacker.id, outcome.damage_total, outcome.damage_type, info, round);
    events.publish(&mut event, attacker);
    outcome.riders.extend(event.riders);
    outcome.damage_total = event.amount.max(0);
}

/// Roll `count` attacks, then run listeners for the hits in order. Nothing
/// reaches the event bus unless every roll succeeded.
#[allow(clippy::too_many_arguments)]
pub fn resolve_strikes(
    rng: &dyn Randomizer,
    events: &EventBus,
    attacker: &mut Character,
    profile: &StrikeProfile,
    count: usize,
    advantage: Advantage,
    target_ac: Option<i32>,
    round: u32,
) -> Result<Vec<ResolvedStrike>, DiceError> {
    let mut strikes = (0..count)
        .map(|_| roll_strike(rng, profile, advantage, target_ac))
        .collect::<Result<Vec<_>, _>>()?;
    for strike in &mut strikes {
        apply_hit_listeners(events, attacker, profile, strike, round);
    }
    Ok(strikes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::DamageType;
    use crate::character::{AbilityScores, CharacterClass};
    use crate::dice::ScriptedRandomizer;
    use crate::effects::{ActiveEffect, EffectDuration, Modifier, ModifierScope};
    use crate::events::{ListenerControl, Subscription, EventKind};
    use crate::items::{get_weapon, EquipSlot};

    fn character(class: CharacterClass, scores: AbilityScores) -> Character {
        Character::new("Test", class, 1, scores)
    }

    #[test]
    fn test_finesse_uses_better_modifier() {
        let mut rogue = character(CharacterClass::Rogue, AbilityScores::new(10, 16, 12, 10, 10, 10));
        rogue.equip(EquipSlot::MainHand, get_weapon("Rapier").unwrap()).unwrap();
        let profile = strike_profile(&rogue, StrikeKind::MainHand).unwrap();
        assert_eq!(profile.attack_bonus, 5);
        assert_eq!(profile.damage_bonus, 3);
        assert!(!profile.info.uses_strength);
        assert!(profile.info.precise);
    }

    #[test]
    fn test_off_hand_drops_positive_modifier() {
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(16, 12, 12, 10, 10, 10));
        fighter.equip(EquipSlot::MainHand, get_weapon("Shortsword").unwrap()).unwrap();
        fighter.equip(EquipSlot::OffHand, get_weapon("Handaxe").unwrap()).unwrap();

        let off = strike_profile(&fighter, StrikeKind::OffHand).unwrap();
        assert_eq!(off.damage_bonus, 0);
        assert_eq!(off.subtype, SUBTYPE_OFF_HAND);

        fighter.fighting_style = FightingStyle::TwoWeaponFighting;
        assert_eq!(strike_profile(&fighter, StrikeKind::OffHand).unwrap().damage_bonus, 3);
    }

    #[test]
    fn test_empty_off_hand() {
        let fighter = character(CharacterClass::Fighter, AbilityScores::default());
        assert_eq!(strike_profile(&fighter, StrikeKind::OffHand), Err(StrikeError::EmptyOffHand));
    }

    #[test]
    fn test_style_bonuses() {
        let mut archer = character(CharacterClass::Ranger, AbilityScores::new(10, 16, 12, 10, 12, 10))
            .with_fighting_style(FightingStyle::Archery);
        archer.equip(EquipSlot::MainHand, get_weapon("Longbow").unwrap()).unwrap();
        let profile = strike_profile(&archer, StrikeKind::MainHand).unwrap();
        assert_eq!(profile.attack_bonus, 2 + 3 + 2);
        assert_eq!(profile.subtype, SUBTYPE_RANGED);

        let mut duelist = character(CharacterClass::Paladin, AbilityScores::new(16, 10, 12, 10, 10, 14))
            .with_fighting_style(FightingStyle::Dueling);
        duelist.equip(EquipSlot::MainHand, get_weapon("Longsword").unwrap()).unwrap();
        assert_eq!(strike_profile(&duelist, StrikeKind::MainHand).unwrap().damage_bonus, 5);
    }

    #[test]
    fn test_great_weapon_fighting_only_with_big_weapons() {
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(16, 10, 12, 10, 10, 10))
            .with_fighting_style(FightingStyle::GreatWeaponFighting);
        fighter.equip(EquipSlot::MainHand, get_weapon("Greatsword").unwrap()).unwrap();
        assert_eq!(
            strike_profile(&fighter, StrikeKind::MainHand).unwrap().style,
            FightingStyle::GreatWeaponFighting
        );

        fighter.equipment.unequip(EquipSlot::MainHand);
        fighter.equip(EquipSlot::MainHand, get_weapon("Dagger").unwrap()).unwrap();
        assert_eq!(strike_profile(&fighter, StrikeKind::MainHand).unwrap().style, FightingStyle::None);
    }

    #[test]
    fn test_effect_bonuses_fold_in() {
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(14, 10, 12, 10, 10, 10));
        fighter.equip(EquipSlot::MainHand, get_weapon("Mace").unwrap()).unwrap();
        fighter.effects.add(
            ActiveEffect::new("Bless", "cleric", EffectDuration::Rounds(10)).with_modifier(Modifier::attack_bonus(1)),
        );
        fighter.effects.add(
            ActiveEffect::new("Fire Brand", "oil", EffectDuration::Minutes(1))
                .with_modifier(Modifier::damage_bonus(2, ModifierScope::Only(vec![DamageType::Bludgeoning]))),
        );
        let profile = strike_profile(&fighter, StrikeKind::MainHand).unwrap();
        assert_eq!(profile.attack_bonus, 2 + 2 + 1);
        assert_eq!(profile.damage_bonus, 2 + 2);
    }

    #[test]
    fn test_listeners_only_run_on_hits() {
        let events = EventBus::new();
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(16, 10, 12, 10, 10, 10));
        fighter.equip(EquipSlot::MainHand, get_weapon("Longsword").unwrap()).unwrap();
        events.subscribe(Subscription::new(fighter.id, EventKind::DamageRoll, "test", |event, _| {
            event.add_damage("test", 4);
            ListenerControl::Continue
        }));
        let profile = strike_profile(&fighter, StrikeKind::MainHand).unwrap();

        // 5 + 5 = 10 misses AC 15
        // 5 + 5 = 10 misses AC 15, then 14 + 5 hits
        let rng = ScriptedRandomizer::new([5, 6, 14, 6]);
        let strikes =
            resolve_strikes(&rng, &events, &mut fighter, &profile, 2, Advantage::Normal, Some(15), 1).unwrap();
        assert!(!strikes[0].hit);
        assert!(strikes[0].outcome.riders.is_empty());
        assert!(strikes[1].hit);
        assert_eq!(strikes[1].outcome.damage_total, 6 + 3 + 4);
        assert_eq!(strikes[1].outcome.riders.len(), 1);
    }

    #[test]
    fn test_listener_can_change_amount_directly() {
        let events = EventBus::new();
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(16, 10, 12, 10, 10, 10));
        fighter.equip(EquipSlot::MainHand, get_weapon("Longsword").unwrap()).unwrap();
        events.subscribe(Subscription::new(fighter.id, EventKind::DamageRoll, "double", |event, _| {
            event.amount *= 2;
            ListenerControl::Continue
        }));
        let profile = strike_profile(&fighter, StrikeKind::MainHand).unwrap();

        let rng = ScriptedRandomizer::new([14, 6]);
        let strikes =
            resolve_strikes(&rng, &events, &mut fighter, &profile, 1, Advantage::Normal, None, 1).unwrap();
        assert_eq!(strikes[0].outcome.damage_total, (6 + 3) * 2);
        assert!(strikes[0].outcome.riders.is_empty());
    }

    #[test]
    fn test_dice_failure_runs_no_listeners() {
        let events = EventBus::new();
        let mut fighter = character(CharacterClass::Fighter, AbilityScores::new(16, 10, 12, 10, 10, 10));
        fighter.equip(EquipSlot::MainHand, get_weapon("Longsword").unwrap()).unwrap();
        events.subscribe(Subscription::new(fighter.id, EventKind::DamageRoll, "once", |event, _| {
            event.add_damage("once", 1);
            ListenerControl::Expire
        }));
        let profile = strike_profile(&fighter, StrikeKind::MainHand).unwrap();

        // The first strike hits, the second runs out of dice
        let rng = ScriptedRandomizer::new([14, 6, 12]);
        assert!(resolve_strikes(&rng, &events, &mut fighter, &profile, 2, Advantage::Normal, None, 1).is_err());
        assert!(events.has_source(fighter.id, "once"));
    }
}
