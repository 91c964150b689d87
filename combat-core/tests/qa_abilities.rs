//! QA tests for ability dispatch: uses, action economy, rollback, listeners
//! and persistence.
//!
//! Run with: `cargo test -p combat-core --test qa_abilities`

use combat_core::testing::{
    sample_bard, sample_barbarian, sample_fighter, sample_monk, sample_paladin, sample_rogue,
};
use combat_core::{
    build_character, AbilityInput, Advantage, AbilityScores, AttackRequest, BonusActionOption, CharacterClass, DamageType,
    EngineConfig, EngineError, EquipSlot, TestHarness,
};

// =============================================================================
// Dispatcher outcomes
// =============================================================================

#[test]
fn test_handler_failure_rolls_back() {
    // Second Wind needs a d10 and none is scripted.
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_fighter("Roland"));
    let before = harness.character(id).unwrap();

    let err = harness
        .engine
        .use_ability(id, "second_wind", AbilityInput::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::ExecutionFailure(_)));

    let after = harness.character(id).unwrap();
    assert_eq!(after, before);
    assert_eq!(after.ability("second_wind").unwrap().uses_remaining, 1);
    assert!(!after.economy.bonus_action_used);
    assert!(after.economy.log().is_empty());
}

#[test]
fn test_out_of_uses_is_unsuccessful() {
    let harness = TestHarness::new(vec![6]);
    let id = harness.add(sample_fighter("Roland"));
    harness.engine.apply_damage(id, 10, DamageType::Slashing, None).unwrap();

    let first = harness
        .engine
        .use_ability(id, "second_wind", AbilityInput::new())
        .unwrap();
    assert!(first.success);
    assert_eq!(first.healing_done, Some(7));
    assert_eq!(first.uses_remaining, Some(0));

    harness.engine.start_new_turn(id, None).unwrap();
    let second = harness
        .engine
        .use_ability(id, "second_wind", AbilityInput::new())
        .unwrap();
    assert!(!second.success);
    assert!(second.message.contains("No uses"));

    harness.engine.short_rest(id).unwrap();
    let record = harness.character(id).unwrap();
    assert_eq!(record.ability("second_wind").unwrap().uses_remaining, 1);
}

#[test]
fn test_spent_bonus_action_is_unsuccessful() {
    let harness = TestHarness::new(vec![]);
    let bard = harness.add(sample_bard("Lyra"));
    let ally = harness.add(sample_fighter("Roland"));
    let input = AbilityInput::new().with_target(ally);

    let first = harness
        .engine
        .use_ability(bard, "bardic_inspiration", input.clone())
        .unwrap();
    assert!(first.success);
    assert_eq!(first.target, Some(ally));
    assert!(harness
        .character(ally)
        .unwrap()
        .effects
        .find_named("Bardic Inspiration (d8)")
        .is_some());

    let second = harness
        .engine
        .use_ability(bard, "bardic_inspiration", input)
        .unwrap();
    assert!(!second.success);
    assert_eq!(second.uses_remaining, Some(2));
    assert_eq!(
        harness.character(bard).unwrap().ability("bardic_inspiration").unwrap().uses_remaining,
        2
    );
}

#[test]
fn test_missing_ability_and_character() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_fighter("Roland"));
    assert!(matches!(
        harness.engine.use_ability(id, "rage", AbilityInput::new()),
        Err(EngineError::NotFound(_))
    ));

    let stranger = sample_rogue("Nobody").id;
    assert!(matches!(
        harness.engine.use_ability(stranger, "sneak_attack", AbilityInput::new()),
        Err(EngineError::NotFound(_))
    ));
}

#[test]
fn test_persistence_failure_is_a_warning() {
    let harness = TestHarness::with_failing_repository(vec![4]);
    let id = harness.add(sample_fighter("Roland"));
    harness.engine.apply_damage(id, 8, DamageType::Piercing, None).unwrap();

    let result = harness
        .engine
        .use_ability(id, "second_wind", AbilityInput::new())
        .unwrap();
    assert!(result.success);
    assert!(result.persistence_warning.is_some());
    // The in-memory change stands
    assert_eq!(harness.character(id).unwrap().ability("second_wind").unwrap().uses_remaining, 0);
}

#[test]
fn test_available_abilities() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_barbarian("Grunk"));
    harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();

    let list = harness.engine.available_abilities(id).unwrap();
    let rage = list.iter().find(|a| a.ability.key == "rage").unwrap();
    assert!(rage.available);
    assert!(rage.reason.is_some());

    let harness = TestHarness::new(vec![5]);
    let id = harness.add(sample_fighter("Roland"));
    harness.engine.use_ability(id, "second_wind", AbilityInput::new()).unwrap();
    let list = harness.engine.available_abilities(id).unwrap();
    let second_wind = list.iter().find(|a| a.ability.key == "second_wind").unwrap();
    assert!(!second_wind.available);
    assert_eq!(second_wind.reason.as_deref(), Some("No uses remaining"));
}

// =============================================================================
// Barbarian
// =============================================================================

#[test]
fn test_rage_adds_damage_and_resists() {
    // Greataxe: 14 to hit, 7 damage
    let harness = TestHarness::new(vec![14, 7]);
    let id = harness.add(sample_barbarian("Grunk"));
    harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();

    let report = harness.engine.attack(id, AttackRequest::new().against_ac(12)).unwrap();
    let outcome = &report.strikes[0].outcome;
    assert_eq!(outcome.riders.len(), 1);
    assert_eq!(outcome.riders[0].source, "rage");
    assert_eq!(outcome.damage_total, 12);

    let slashed = harness.engine.apply_damage(id, 9, DamageType::Slashing, None).unwrap();
    assert!(slashed.resisted);
    assert_eq!(slashed.taken, 4);
    let burned = harness.engine.apply_damage(id, 9, DamageType::Fire, None).unwrap();
    assert!(!burned.resisted);
    assert_eq!(burned.taken, 9);
}

#[test]
fn test_rage_expires_after_its_turns() {
    let config = EngineConfig::new().with_rage_duration(3);
    let harness = TestHarness::with_config(vec![], config);
    let id = harness.add(sample_barbarian("Grunk"));
    harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();

    for left in [2, 1] {
        let report = harness.engine.start_new_turn(id, None).unwrap();
        assert!(report.ended_abilities.is_empty());
        let grunk = harness.character(id).unwrap();
        assert_eq!(grunk.ability("rage").unwrap().rounds_remaining, Some(left));
    }

    let report = harness.engine.start_new_turn(id, None).unwrap();
    assert_eq!(report.ended_abilities, vec!["rage".to_string()]);
    assert_eq!(report.expired_effects, vec!["Rage".to_string()]);

    let grunk = harness.character(id).unwrap();
    assert!(!grunk.ability("rage").unwrap().is_active);
    assert!(grunk.effects.is_empty());
    assert!(!harness.engine.events().has_source(id, "rage"));
}

#[test]
fn test_rage_refused_in_heavy_armor() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_barbarian("Grunk").with_armor(16, Some(0)));
    let result = harness.engine.use_ability(id, "rage", AbilityInput::new()).unwrap();
    assert!(!result.success);
    assert_eq!(result.uses_remaining, Some(2));
}

// =============================================================================
// Fighter
// =============================================================================

#[test]
fn test_action_surge_allows_another_attack() {
    let harness = TestHarness::new(vec![10, 5, 10, 5]);
    let fighter = build_character(
        "Roland",
        CharacterClass::Fighter,
        2,
        AbilityScores::new(16, 12, 14, 10, 12, 8),
        &EngineConfig::default(),
    );
    let id = harness.add(fighter);
    harness.engine.equip(id, EquipSlot::MainHand, "Longsword").unwrap();

    assert!(harness.engine.attack(id, AttackRequest::new()).unwrap().success);
    assert!(!harness.engine.attack(id, AttackRequest::new()).unwrap().success);

    let surge = harness
        .engine
        .use_ability(id, "action_surge", AbilityInput::new())
        .unwrap();
    assert!(surge.success);
    assert!(harness.engine.attack(id, AttackRequest::new()).unwrap().success);
    assert!(!harness.engine.attack(id, AttackRequest::new()).unwrap().success);
}

// =============================================================================
// Rogue
// =============================================================================

#[test]
fn test_sneak_attack_rides_on_finesse_hit() {
    // Sneak attack 2d6: 3 + 4. Shortsword: 15 to hit, 5 damage.
    let harness = TestHarness::new(vec![3, 4, 15, 5]);
    let id = harness.add(sample_rogue("Vex"));

    let primed = harness
        .engine
        .use_ability(id, "sneak_attack", AbilityInput::new())
        .unwrap();
    assert!(primed.success);
    assert_eq!(primed.damage_roll.as_ref().map(|r| r.total), Some(7));

    let again = harness
        .engine
        .use_ability(id, "sneak_attack", AbilityInput::new())
        .unwrap();
    assert!(!again.success);

    let report = harness.engine.attack(id, AttackRequest::new().against_ac(13)).unwrap();
    assert_eq!(report.total_damage(), 15);
    assert!(!harness.engine.events().has_source(id, "sneak_attack"));
}

#[test]
fn test_failed_attack_keeps_sneak_attack_primed() {
    // Sneak attack 3 + 4, one strike of 15 and 5, then the dice run dry
    let harness = TestHarness::new(vec![3, 4, 15, 5]);
    let mut vex = sample_rogue("Vex");
    vex.attacks_per_action = 2;
    let id = harness.add(vex);

    harness.engine.use_ability(id, "sneak_attack", AbilityInput::new()).unwrap();
    let before = harness.character(id).unwrap();

    let err = harness.engine.attack(id, AttackRequest::new()).unwrap_err();
    assert!(matches!(err, EngineError::ExecutionFailure(_)));
    assert_eq!(harness.character(id).unwrap(), before);
    assert!(harness.engine.events().has_source(id, "sneak_attack"));
}

#[test]
fn test_sneak_attack_lapses_at_turn_end() {
    let harness = TestHarness::new(vec![1, 1]);
    let id = harness.add(sample_rogue("Vex"));
    harness.engine.use_ability(id, "sneak_attack", AbilityInput::new()).unwrap();
    assert!(harness.engine.events().has_source(id, "sneak_attack"));

    harness.engine.end_turn(id, None).unwrap();
    assert!(!harness.engine.events().has_source(id, "sneak_attack"));
}

// =============================================================================
// Monk
// =============================================================================

#[test]
fn test_flurry_of_blows_after_unarmed_attack() {
    let harness = TestHarness::new(vec![10, 4, 10, 4, 10, 4, 10, 4]);
    let id = harness.add(sample_monk("Li"));

    let attack = harness
        .engine
        .attack(id, AttackRequest::new().unarmed().against_ac(10))
        .unwrap();
    assert_eq!(attack.strikes.len(), 2);
    assert_eq!(attack.total_damage(), 14);
    assert!(attack
        .available_bonus_actions
        .contains(&BonusActionOption::FlurryOfBlows));

    let flurry = harness
        .engine
        .bonus_attack(id, BonusActionOption::FlurryOfBlows, AttackRequest::new().against_ac(10))
        .unwrap();
    assert!(flurry.success, "{}", flurry.message);
    assert_eq!(flurry.strikes.len(), 2);
    assert!(flurry.strikes.iter().all(|s| s.hit));

    let li = harness.character(id).unwrap();
    assert_eq!(li.ability("ki").unwrap().uses_remaining, 4);
    assert!(li.economy.bonus_action_used);

    let martial = harness
        .engine
        .bonus_attack(id, BonusActionOption::MartialArtsStrike, AttackRequest::new())
        .unwrap();
    assert!(!martial.success);
}

#[test]
fn test_step_of_the_wind_extends_movement() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_monk("Li"));
    let speed = harness.character(id).unwrap().speed;

    let result = harness
        .engine
        .use_ability(id, "ki", AbilityInput::new().with_option("step_of_the_wind"))
        .unwrap();
    assert!(result.success, "{}", result.message);

    let moved = harness.engine.move_character(id, speed + 5).unwrap();
    assert!(moved.success, "{}", moved.message);
    let li = harness.character(id).unwrap();
    assert!(!li.economy.action_used);
    assert!(li.economy.bonus_action_used);
}

#[test]
fn test_patient_defense_imposes_disadvantage() {
    let harness = TestHarness::new(vec![]);
    let id = harness.add(sample_monk("Li"));

    harness
        .engine
        .use_ability(id, "ki", AbilityInput::new().with_option("patient_defense"))
        .unwrap();
    let li = harness.character(id).unwrap();
    let request = AttackRequest::new().against(&li);
    assert_eq!(request.advantage, Advantage::Disadvantage);
    assert_eq!(request.target_ac, Some(li.armor_class()));

    // Advantage and the dodge cancel out
    let request = AttackRequest::new().with_advantage(Advantage::Advantage).against(&li);
    assert_eq!(request.advantage, Advantage::Normal);

    harness.engine.start_new_turn(id, None).unwrap();
    let li = harness.character(id).unwrap();
    assert!(!li.effects.is_dodging());
    assert_eq!(AttackRequest::new().against(&li).advantage, Advantage::Normal);
}

// =============================================================================
// Paladin
// =============================================================================

#[test]
fn test_lay_on_hands_heals_ally_and_saves_both() {
    let harness = TestHarness::new(vec![]);
    let paladin = harness.add(sample_paladin("Aria"));
    let ally = harness.add(sample_fighter("Roland"));
    harness.engine.apply_damage(ally, 5, DamageType::Fire, None).unwrap();

    let result = harness
        .engine
        .use_ability(paladin, "lay_on_hands", AbilityInput::new().with_target(ally))
        .unwrap();
    assert!(result.success);
    assert_eq!(result.healing_done, Some(5));
    assert_eq!(result.uses_remaining, Some(20));

    let saved = harness.saved(ally).unwrap();
    assert_eq!(saved.hit_points.current, saved.hit_points.maximum);
    let saved = harness.saved(paladin).unwrap();
    assert_eq!(saved.ability("lay_on_hands").unwrap().uses_remaining, 20);
}

#[test]
fn test_divine_smite_spends_lowest_slot() {
    let harness = TestHarness::new(vec![3, 5]);
    let id = harness.add(sample_paladin("Aria"));

    let result = harness
        .engine
        .use_ability(id, "divine_smite", AbilityInput::new())
        .unwrap();
    assert!(result.success);
    assert_eq!(result.damage_roll.map(|r| r.total), Some(8));
    assert_eq!(result.uses_remaining, None);

    let aria = harness.character(id).unwrap();
    assert_eq!(aria.spell_slots.remaining(1), 3);
    assert_eq!(aria.spell_slots.remaining(2), 2);
}

#[test]
fn test_divine_smite_with_zero_dice_cap() {
    let mut config = EngineConfig::new();
    config.max_smite_dice = 0;
    let harness = TestHarness::with_config(vec![3, 5], config);
    let id = harness.add(sample_paladin("Aria"));

    let result = harness
        .engine
        .use_ability(id, "divine_smite", AbilityInput::new())
        .unwrap();
    assert!(result.success, "{}", result.message);
    assert_eq!(result.damage_roll.map(|r| r.total), Some(8));
}
