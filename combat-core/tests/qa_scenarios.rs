//! End-to-end combat scenarios through the engine API.
//!
//! Every scenario runs against scripted dice, so outcomes are exact.
//! Run with: `cargo test -p combat-core --test qa_scenarios`

use combat_core::effects::EffectDuration;
use combat_core::testing::{sample_barbarian, sample_fighter, sample_rogue};
use combat_core::{AbilityInput, AttackRequest, BonusActionOption, TestHarness};

// =============================================================================
// Toggling an ability on and off
// =============================================================================

#[test]
fn test_toggle_ability_on_then_off() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_barbarian("Grunk"));
    assert_eq!(harness.character(id).unwrap().ability("rage").unwrap().uses_remaining, 2);

    let first = harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();
    assert!(first.success, "{}", first.message);
    assert!(!first.deactivated);
    assert_eq!(first.uses_remaining, Some(1));

    let grunk = harness.character(id).unwrap();
    let record = grunk.ability("rage").unwrap();
    assert!(record.is_active);
    let effect = grunk.effects.find_named("Rage").expect("rage effect should be active");
    assert_eq!(effect.duration, EffectDuration::Rounds(harness.engine.config().rage_duration_rounds));

    let second = harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();
    assert!(second.success);
    assert!(second.deactivated);
    assert_eq!(second.uses_remaining, Some(1));

    let grunk = harness.character(id).unwrap();
    assert!(!grunk.ability("rage").unwrap().is_active);
    assert!(grunk.effects.find_named("Rage").is_none());
    assert_eq!(grunk.ability("rage").unwrap().uses_remaining, 1);
    assert!(!harness.engine.events().has_source(id, "rage"));
}

// =============================================================================
// Dual wielding unlocks the off-hand attack
// =============================================================================

#[test]
fn test_dual_wield_bonus_attack() {
    // Main hand: 12 to hit, 4 damage. Off hand: 11 to hit, 3 damage.
    let harness = TestHarness::new(vec![12, 4, 11, 3]);
    let id = harness.add(sample_rogue("Vex"));

    let main = harness
        .engine
        .attack(id, AttackRequest::new().against_ac(12))
        .unwrap();
    assert!(main.success);
    assert_eq!(main.strikes.len(), 1);
    assert_eq!(main.total_damage(), 7);
    assert_eq!(main.available_bonus_actions, vec![BonusActionOption::OffHandAttack]);

    let off = harness
        .engine
        .bonus_attack(id, BonusActionOption::OffHandAttack, AttackRequest::new().against_ac(12))
        .unwrap();
    assert!(off.success, "{}", off.message);
    assert!(off.strikes[0].hit);
    // No ability modifier on off-hand damage
    assert_eq!(off.total_damage(), 3);
    assert!(off.available_bonus_actions.is_empty());

    let vex = harness.character(id).unwrap();
    assert!(vex.economy.bonus_action_used);
    assert!(vex.economy.available_bonus_actions().is_empty());

    let again = harness
        .engine
        .bonus_attack(id, BonusActionOption::OffHandAttack, AttackRequest::new())
        .unwrap();
    assert!(!again.success);
    assert_eq!(harness.rolls_remaining(), 0);
}

#[test]
fn test_off_hand_locked_before_attack() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_rogue("Vex"));
    let report = harness
        .engine
        .bonus_attack(id, BonusActionOption::OffHandAttack, AttackRequest::new())
        .unwrap();
    assert!(!report.success);
    assert!(!harness.character(id).unwrap().economy.bonus_action_used);
}

// =============================================================================
// Fixed dice give fixed totals
// =============================================================================

#[test]
fn test_fixed_roll_attack_totals() {
    // +5 to hit and 1d8+3 damage
    let harness = TestHarness::new(vec![15, 6]);
    let id = harness.add(sample_fighter("Roland"));

    let report = harness.engine.attack(id, AttackRequest::new()).unwrap();
    let outcome = &report.strikes[0].outcome;
    assert_eq!(outcome.attack_total, 20);
    assert_eq!(outcome.damage_total, 9);
    assert!(!outcome.is_critical);
    assert!(report.strikes[0].hit);
    assert!(harness.character(id).unwrap().economy.action_used);
}

#[test]
fn test_fixed_roll_miss_still_reports_damage() {
    let harness = TestHarness::new(vec![4, 6]);
    let id = harness.add(sample_fighter("Roland"));

    let report = harness.engine.attack(id, AttackRequest::new().against_ac(15)).unwrap();
    assert!(report.success);
    assert!(!report.strikes[0].hit);
    assert_eq!(report.strikes[0].outcome.attack_total, 9);
    assert_eq!(report.strikes[0].outcome.damage_total, 9);
    assert_eq!(report.total_damage(), 0);
}
