//! The combat engine.
//!
//! Holds every character in play behind its own lock, dispatches attacks
//! and abilities against them, and saves them through the repository after
//! each change. Locks are never held while saving.

use crate::abilities::{end_ability, AbilityContext, AbilityInput, AbilityOutcome, AbilityRegistry};
use crate::attack::{AttackOutcome, DamageType};
use crate::character::{Ability, AbilityRecord, Character, CharacterId, HitPoints, RestSummary, RestType};
use crate::config::EngineConfig;
use crate::dice::{self, Advantage, DiceError, Randomizer, RollOutcome, SeededRandomizer, ThreadRandomizer};
use crate::economy::{ActionCost, ActionType, BonusActionOption, EconomyError};
use crate::effects::{ActiveEffect, EffectDuration, EffectId, Modifier};
use crate::encounter::{EncounterId, EncounterProvider};
use crate::events::{CombatEvent, EventBus};
use crate::items::{self, EquipSlot, Weapon};
use crate::persist::{CharacterRepository, PersistError, RepositoryError, SavedRoster};
use crate::strike::{self, ResolvedStrike, StrikeKind, StrikeProfile};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Execution failed: {0}")]
    ExecutionFailure(String),
}

impl From<DiceError> for EngineError {
    fn from(err: DiceError) -> Self {
        match err {
            DiceError::ExhaustedSequence { .. } | DiceError::OutOfRange { .. } => {
                EngineError::ExecutionFailure(err.to_string())
            }
            _ => EngineError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => EngineError::NotFound(err.to_string()),
            RepositoryError::Unavailable(_) => EngineError::ExecutionFailure(err.to_string()),
        }
    }
}

// ============================================================================
// Requests and Reports
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub target_ac: Option<i32>,
    pub advantage: Advantage,
    /// Punch instead of using the main-hand weapon.
    pub unarmed: bool,
    pub encounter: Option<EncounterId>,
}

impl AttackRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn against_ac(mut self, ac: i32) -> Self {
        self.target_ac = Some(ac);
        self
    }

    /// Aim at `target`: its armor class, and disadvantage while it is
    /// dodging. Call after `with_advantage` so the two combine.
    pub fn against(mut self, target: &Character) -> Self {
        self.target_ac = Some(target.armor_class());
        if target.effects.is_dodging() {
            self.advantage = self.advantage.combine(Advantage::Disadvantage);
        }
        self
    }

    pub fn with_advantage(mut self, advantage: Advantage) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn unarmed(mut self) -> Self {
        self.unarmed = true;
        self
    }

    pub fn in_encounter(mut self, encounter: EncounterId) -> Self {
        self.encounter = Some(encounter);
        self
    }
}

/// Result of an attack action or bonus attack: one strike per attack made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    pub success: bool,
    pub message: String,
    pub strikes: Vec<ResolvedStrike>,
    /// Bonus actions unlocked by this attack.
    pub available_bonus_actions: Vec<BonusActionOption>,
    pub persistence_warning: Option<String>,
}

impl AttackReport {
    fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &AttackOutcome> {
        self.strikes.iter().map(|s| &s.outcome)
    }

    /// Damage from the strikes that hit.
    pub fn total_damage(&self) -> i32 {
        self.strikes
            .iter()
            .filter(|s| s.hit)
            .map(|s| s.outcome.damage_total)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbilityResult {
    pub success: bool,
    pub message: String,
    pub ability_key: String,
    /// `None` for unlimited abilities.
    pub uses_remaining: Option<i32>,
    pub effect_applied: Option<String>,
    pub healing_done: Option<i32>,
    pub damage_roll: Option<RollOutcome>,
    pub attacks: Vec<AttackOutcome>,
    pub target: Option<CharacterId>,
    /// The call ended an active toggle ability.
    pub deactivated: bool,
    pub persistence_warning: Option<String>,
}

impl AbilityResult {
    fn failure(key: &str, message: impl Into<String>, record: &AbilityRecord) -> Self {
        Self {
            success: false,
            message: message.into(),
            ability_key: key.to_string(),
            uses_remaining: uses_of(record),
            ..Self::default()
        }
    }

    fn from_outcome(key: &str, outcome: AbilityOutcome, record: Option<&AbilityRecord>) -> Self {
        Self {
            success: true,
            message: outcome.message,
            ability_key: key.to_string(),
            uses_remaining: record.and_then(uses_of),
            effect_applied: outcome.effect_applied,
            healing_done: outcome.healing_done,
            damage_roll: outcome.damage_roll,
            attacks: outcome.attacks,
            ..Self::default()
        }
    }
}

fn uses_of(record: &AbilityRecord) -> Option<i32> {
    (!record.is_unlimited()).then_some(record.uses_remaining)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbilityAvailability {
    pub ability: AbilityRecord,
    pub available: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub requested: i32,
    pub taken: i32,
    pub resisted: bool,
    pub dropped_to_zero: bool,
    pub hit_points: HitPoints,
    pub persistence_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealReport {
    pub healed: i32,
    pub hit_points: HitPoints,
    pub persistence_warning: Option<String>,
}

/// Effects and abilities that ran out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryReport {
    pub round: u32,
    pub expired_effects: Vec<String>,
    pub ended_abilities: Vec<String>,
    pub persistence_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestReport {
    pub rest: RestType,
    pub summary: RestSummary,
    pub persistence_warning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitDiceReport {
    pub rolls: Vec<RollOutcome>,
    pub healed: i32,
    pub hit_dice_remaining: u32,
    pub persistence_warning: Option<String>,
}

/// Result of spending a turn resource outside an attack or ability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub success: bool,
    pub message: String,
    pub persistence_warning: Option<String>,
}

// ============================================================================
// Engine
// ============================================================================

type Handle = Arc<Mutex<Character>>;

pub struct CombatEngine {
    repository: Arc<dyn CharacterRepository>,
    registry: AbilityRegistry,
    rng: Arc<dyn Randomizer>,
    events: EventBus,
    encounters: Option<Arc<dyn EncounterProvider>>,
    config: EngineConfig,
    roster: RwLock<HashMap<CharacterId, Handle>>,
}

impl CombatEngine {
    pub fn new(repository: Arc<dyn CharacterRepository>, config: EngineConfig) -> Self {
        let rng: Arc<dyn Randomizer> = match config.rng_seed {
            Some(seed) => Arc::new(SeededRandomizer::new(seed)),
            None => Arc::new(ThreadRandomizer),
        };
        Self {
            repository,
            registry: AbilityRegistry::with_defaults(),
            rng,
            events: EventBus::new(),
            encounters: None,
            config,
            roster: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_randomizer(mut self, rng: Arc<dyn Randomizer>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_registry(mut self, registry: AbilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_encounters(mut self, provider: Arc<dyn EncounterProvider>) -> Self {
        self.encounters = Some(provider);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &AbilityRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    /// Put a character in play, replacing any with the same id.
    pub fn add_character(&self, character: Character) -> CharacterId {
        let id = character.id;
        debug!(character = %id, name = %character.name, "character added");
        self.roster.write().insert(id, Arc::new(Mutex::new(character)));
        id
    }

    /// Bring a character in from the repository.
    pub fn load_character(&self, id: CharacterId) -> Result<(), EngineError> {
        let character = self.repository.load(id)?;
        self.add_character(character);
        Ok(())
    }

    pub fn remove_character(&self, id: CharacterId) -> Option<Character> {
        let handle = self.roster.write().remove(&id)?;
        self.events.unsubscribe_owner(id);
        let character = handle.lock().clone();
        Some(character)
    }

    /// A copy of the character's current state.
    pub fn character(&self, id: CharacterId) -> Result<Character, EngineError> {
        Ok(self.handle(id)?.lock().clone())
    }

    pub fn characters(&self) -> Vec<Character> {
        let handles: Vec<Handle> = self.roster.read().values().cloned().collect();
        handles.iter().map(|h| h.lock().clone()).collect()
    }

    fn handle(&self, id: CharacterId) -> Result<Handle, EngineError> {
        if let Some(handle) = self.roster.read().get(&id) {
            return Ok(handle.clone());
        }
        let character = self.repository.load(id)?;
        let mut roster = self.roster.write();
        Ok(roster
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(character)))
            .clone())
    }

    fn round_for(&self, encounter: Option<EncounterId>) -> u32 {
        encounter
            .and_then(|e| self.encounters.as_ref()?.turn_info(e))
            .map_or(0, |info| info.current_round)
    }

    /// Copy taken under the lock for saving once it is released.
    fn snapshot(&self, character: &Character) -> Option<Character> {
        self.config.persist_after_mutation.then(|| character.clone())
    }

    fn persist(&self, snapshot: Option<Character>) -> Option<String> {
        let character = snapshot?;
        match self.repository.save(&character) {
            Ok(()) => None,
            Err(e) => {
                warn!(character = %character.id, error = %e, "failed to persist character");
                Some(e.to_string())
            }
        }
    }

    // ------------------------------------------------------------------
    // Equipment and attacks
    // ------------------------------------------------------------------

    /// Equip a weapon from the standard catalog.
    pub fn equip(&self, id: CharacterId, slot: EquipSlot, weapon_name: &str) -> Result<Option<Weapon>, EngineError> {
        let weapon = items::get_weapon(weapon_name)
            .ok_or_else(|| EngineError::InvalidArgument(format!("Unknown weapon: {weapon_name}")))?;
        self.equip_weapon(id, slot, weapon)
    }

    pub fn equip_weapon(&self, id: CharacterId, slot: EquipSlot, weapon: Weapon) -> Result<Option<Weapon>, EngineError> {
        let handle = self.handle(id)?;
        let (previous, snapshot) = {
            let mut character = handle.lock();
            let previous = character
                .equip(slot, weapon)
                .map_err(|e| EngineError::InvalidState(e.to_string()))?;
            (previous, self.snapshot(&character))
        };
        self.persist(snapshot);
        Ok(previous)
    }

    /// Take the Attack action: one strike per attack the character gets.
    pub fn attack(&self, id: CharacterId, request: AttackRequest) -> Result<AttackReport, EngineError> {
        let handle = self.handle(id)?;
        let round = self.round_for(request.encounter);
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            if !character.economy.can_spend(ActionCost::Action) {
                return Ok(AttackReport::refused("No action remaining this turn"));
            }
            let kind = if request.unarmed { StrikeKind::Unarmed } else { StrikeKind::MainHand };
            let profile = strike::strike_profile(&character, kind)
                .map_err(|e| EngineError::InvalidState(e.to_string()))?;
            let count = character.attacks_per_action.max(1) as usize;

            let strikes = self.strike_series(&mut character, &profile, count, &request, round)?;
            character
                .economy
                .record_action(ActionType::Attack, Some(profile.subtype), Some(profile.source_key()));
            let ctx = character.bonus_action_context();
            character.economy.recompute_available_bonus_actions(&ctx);

            let hits = strikes.iter().filter(|s| s.hit).count();
            let report = AttackReport {
                success: true,
                message: format!(
                    "{} attacks with {}: {} of {} hit.",
                    character.name,
                    profile.weapon.name,
                    hits,
                    strikes.len()
                ),
                strikes,
                available_bonus_actions: character.economy.available_bonus_actions().to_vec(),
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    /// Spend the bonus action on an attack unlocked earlier this turn.
    pub fn bonus_attack(
        &self,
        id: CharacterId,
        option: BonusActionOption,
        request: AttackRequest,
    ) -> Result<AttackReport, EngineError> {
        let kind = match option {
            BonusActionOption::OffHandAttack => StrikeKind::OffHand,
            BonusActionOption::MartialArtsStrike => StrikeKind::Unarmed,
            BonusActionOption::FlurryOfBlows => return self.flurry_of_blows(id, request),
        };

        let handle = self.handle(id)?;
        let round = self.round_for(request.encounter);
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            if !character.economy.is_bonus_action_available(option) {
                return Ok(AttackReport::refused(format!("{option} is not available")));
            }
            let profile = strike::strike_profile(&character, kind)
                .map_err(|e| EngineError::InvalidState(e.to_string()))?;
            let strikes = self.strike_series(&mut character, &profile, 1, &request, round)?;
            character
                .economy
                .record_action(ActionType::BonusAction, Some(profile.subtype), Some(profile.source_key()));

            let report = AttackReport {
                success: true,
                message: format!("{} makes a bonus attack with {}.", character.name, profile.weapon.name),
                strikes,
                available_bonus_actions: character.economy.available_bonus_actions().to_vec(),
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    fn flurry_of_blows(&self, id: CharacterId, request: AttackRequest) -> Result<AttackReport, EngineError> {
        let mut input = AbilityInput::new().with_option(BonusActionOption::FlurryOfBlows.key());
        input.target_ac = request.target_ac;
        input.advantage = request.advantage;
        input.encounter = request.encounter;
        let result = self.use_ability(id, "ki", input)?;
        let strikes = result
            .attacks
            .into_iter()
            .map(|outcome| ResolvedStrike {
                hit: request.target_ac.map_or(!outcome.is_fumble, |ac| outcome.hits(ac)),
                outcome,
            })
            .collect();
        Ok(AttackReport {
            success: result.success,
            message: result.message,
            strikes,
            available_bonus_actions: Vec::new(),
            persistence_warning: result.persistence_warning,
        })
    }

    /// Resolve `count` strikes. A dice failure restores the character and
    /// returns no outcome.
    fn strike_series(
        &self,
        character: &mut Character,
        profile: &StrikeProfile,
        count: usize,
        request: &AttackRequest,
        round: u32,
    ) -> Result<Vec<ResolvedStrike>, EngineError> {
        let strikes = strike::resolve_strikes(
            &*self.rng,
            &self.events,
            character,
            profile,
            count,
            request.advantage,
            request.target_ac,
            round,
        )?;
        Ok(strikes)
    }

    // ------------------------------------------------------------------
    // Hit points
    // ------------------------------------------------------------------

    /// Damage a character. `BeforeTakingDamage` listeners may adjust the
    /// amount, then resistance halves it (rounding down).
    pub fn apply_damage(
        &self,
        id: CharacterId,
        amount: i32,
        damage_type: DamageType,
        encounter: Option<EncounterId>,
    ) -> Result<DamageReport, EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidArgument(format!("Negative damage: {amount}")));
        }
        let handle = self.handle(id)?;
        let round = self.round_for(encounter);
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let mut event = CombatEvent::before_taking_damage(id, amount, damage_type, round);
            self.events.publish(&mut event, &mut character);

            let resisted = character.effects.has_resistance(damage_type);
            let mut incoming = event.amount.max(0);
            if resisted {
                incoming /= 2;
            }
            let was_up = character.hit_points.current > 0;
            let taken = character.damage(incoming);
            debug!(character = %id, amount, taken, resisted, %damage_type, "damage applied");

            let report = DamageReport {
                requested: amount,
                taken,
                resisted,
                dropped_to_zero: was_up && character.hit_points.current == 0,
                hit_points: character.hit_points,
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    pub fn heal(&self, id: CharacterId, amount: i32) -> Result<HealReport, EngineError> {
        if amount < 0 {
            return Err(EngineError::InvalidArgument(format!("Negative healing: {amount}")));
        }
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let healed = character.heal(amount);
            let report = HealReport {
                healed,
                hit_points: character.hit_points,
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    /// Spend hit dice during a short rest. Each die heals its roll plus the
    /// constitution modifier, never less than zero.
    pub fn spend_hit_dice(&self, id: CharacterId, count: u32) -> Result<HitDiceReport, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidArgument("Must spend at least one hit die".to_string()));
        }
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            if count > character.hit_dice.remaining {
                return Err(EngineError::InvalidState(format!(
                    "Only {} hit dice remaining",
                    character.hit_dice.remaining
                )));
            }
            let sides = character.hit_dice.die.sides();
            let con = character.modifier(Ability::Constitution);

            let mut rolls = Vec::with_capacity(count as usize);
            for _ in 0..count {
                rolls.push(dice::roll(&*self.rng, 1, sides, con)?);
            }
            let mut healed = 0;
            for roll in &rolls {
                character.hit_dice.spend();
                healed += character.heal(roll.total.max(0));
            }

            let report = HitDiceReport {
                rolls,
                healed,
                hit_dice_remaining: character.hit_dice.remaining,
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------

    /// Use an ability.
    ///
    /// Using an active toggle ability ends it without spending anything.
    /// Otherwise uses, handler preconditions and the action economy are
    /// checked (failures come back as unsuccessful results), a use is
    /// consumed (pool handlers debit themselves), the economy is charged and
    /// the handler runs. A handler error restores the user and target as
    /// they were and returns [`EngineError::ExecutionFailure`].
    pub fn use_ability(&self, id: CharacterId, key: &str, input: AbilityInput) -> Result<AbilityResult, EngineError> {
        let handle = self.handle(id)?;
        let target_handle = match input.target {
            Some(target) if target != id => Some((self.handle(target)?, target)),
            _ => None,
        };
        let round = self.round_for(input.encounter);
        let handler = self.registry.get(key);

        let (mut result, snapshots) = {
            let (mut user, mut target) = lock_pair(
                &handle,
                id,
                target_handle.as_ref().map(|(h, tid)| (h.as_ref(), *tid)),
            );
            let character: &mut Character = &mut user;

            let record = character.ability(key).cloned().ok_or_else(|| {
                EngineError::NotFound(format!("{} has no ability '{}'", character.name, key))
            })?;

            if record.is_active {
                if let Some(handler) = handler.as_ref().filter(|h| h.toggles()) {
                    let outcome = handler.deactivate(character, &self.events);
                    debug!(character = %id, ability = key, "ability toggled off");
                    let mut result = AbilityResult::from_outcome(key, outcome, character.ability(key));
                    result.deactivated = true;
                    let snapshots = vec![self.snapshot(character)];
                    drop(target);
                    drop(user);
                    result.persistence_warning = self.persist_all(snapshots);
                    return Ok(result);
                }
            }

            if !record.can_use() {
                return Ok(AbilityResult::failure(key, format!("No uses of {} remaining", record.name), &record));
            }
            if let Some(handler) = &handler {
                if let Err(reason) = handler.check(character, target.as_deref(), &input) {
                    return Ok(AbilityResult::failure(key, reason, &record));
                }
            }
            if !character.economy.can_spend(record.action_cost) {
                return Ok(AbilityResult::failure(
                    key,
                    EconomyError::AlreadySpent(record.action_cost).to_string(),
                    &record,
                ));
            }

            let user_before = character.clone();
            let target_before = target.as_deref().cloned();

            if !record.is_pool() {
                if let Some(r) = character.ability_mut(key) {
                    r.consume();
                }
            }
            character
                .economy
                .record_action(ActionType::UseAbility(record.action_cost), None, Some(key));

            let executed = match &handler {
                Some(handler) => {
                    let mut ctx = AbilityContext {
                        character: &mut *character,
                        target: target.as_deref_mut(),
                        input: &input,
                        rng: &*self.rng,
                        events: &self.events,
                        config: &self.config,
                        round,
                    };
                    handler.execute(&mut ctx)
                }
                None => Ok(AbilityOutcome::new(format!("{} uses {}.", character.name, record.name))),
            };

            let outcome = match executed {
                Ok(outcome) => outcome,
                Err(e) => {
                    *character = user_before;
                    if let (Some(t), Some(before)) = (target.as_deref_mut(), target_before) {
                        *t = before;
                    }
                    self.events.unsubscribe_source(id, key);
                    warn!(character = %id, ability = key, error = %e, "ability failed, rolled back");
                    return Err(EngineError::ExecutionFailure(e.to_string()));
                }
            };
            debug!(character = %id, ability = key, "ability used");

            let mut result = AbilityResult::from_outcome(key, outcome, character.ability(key));
            result.target = target.as_deref().map(|t| t.id);
            let mut snapshots = vec![self.snapshot(character)];
            if let Some(t) = target.as_deref() {
                snapshots.push(self.snapshot(t));
            }
            (result, snapshots)
        };
        result.persistence_warning = self.persist_all(snapshots);
        Ok(result)
    }

    fn persist_all(&self, snapshots: Vec<Option<Character>>) -> Option<String> {
        let warnings: Vec<String> = snapshots.into_iter().filter_map(|s| self.persist(s)).collect();
        (!warnings.is_empty()).then(|| warnings.join("; "))
    }

    /// Every ability the character has, with whether it can be used now.
    pub fn available_abilities(&self, id: CharacterId) -> Result<Vec<AbilityAvailability>, EngineError> {
        let handle = self.handle(id)?;
        let character = handle.lock();
        Ok(character
            .abilities
            .values()
            .map(|record| {
                let toggles = self.registry.get(&record.key).is_some_and(|h| h.toggles());
                let (available, reason) = if record.is_active && toggles {
                    (true, Some("Active; use again to end it".to_string()))
                } else if !record.can_use() {
                    (false, Some("No uses remaining".to_string()))
                } else if !character.economy.can_spend(record.action_cost) {
                    (false, Some(EconomyError::AlreadySpent(record.action_cost).to_string()))
                } else {
                    (true, None)
                };
                AbilityAvailability {
                    ability: record.clone(),
                    available,
                    reason,
                }
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Turns, time and rests
    // ------------------------------------------------------------------

    /// Start the character's turn: reset the economy, run `TurnStart`
    /// listeners (duration trackers), then count round-based effects down.
    pub fn start_new_turn(&self, id: CharacterId, encounter: Option<EncounterId>) -> Result<ExpiryReport, EngineError> {
        let round = self.round_for(encounter);
        self.expire(id, round, |engine, character| {
            character.economy.start_new_turn();
            let mut event = CombatEvent::turn_start(character.id, round);
            engine.events.publish(&mut event, character);
            character.effects.tick_round_durations()
        })
    }

    /// End the character's turn, running `TurnEnd` listeners.
    pub fn end_turn(&self, id: CharacterId, encounter: Option<EncounterId>) -> Result<ExpiryReport, EngineError> {
        let round = self.round_for(encounter);
        self.expire(id, round, |engine, character| {
            let mut event = CombatEvent::turn_end(character.id, round);
            engine.events.publish(&mut event, character);
            Vec::new()
        })
    }

    /// Let in-game minutes pass outside combat.
    pub fn advance_time(&self, id: CharacterId, minutes: u32) -> Result<ExpiryReport, EngineError> {
        self.expire(id, 0, |_, character| character.effects.advance_minutes(minutes))
    }

    /// Run `step` under the lock, then end any active ability whose effects
    /// ran out, and report everything that disappeared.
    fn expire(
        &self,
        id: CharacterId,
        round: u32,
        step: impl FnOnce(&Self, &mut Character) -> Vec<ActiveEffect>,
    ) -> Result<ExpiryReport, EngineError> {
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let before: Vec<(EffectId, String)> = character.effects.iter().map(|e| (e.id, e.name.clone())).collect();
            let active_before: Vec<String> = active_keys(&character);

            let expired = step(self, &mut *character);
            for effect in &expired {
                if character.ability(&effect.source).is_some_and(|r| r.is_active) {
                    end_ability(&mut character, &effect.source);
                    self.events.unsubscribe_source(id, &effect.source);
                }
            }

            let still_active = active_keys(&character);
            let report = ExpiryReport {
                round,
                expired_effects: before
                    .into_iter()
                    .filter(|(eid, _)| !character.effects.iter().any(|e| e.id == *eid))
                    .map(|(_, name)| name)
                    .collect(),
                ended_abilities: active_before
                    .into_iter()
                    .filter(|k| !still_active.contains(k))
                    .collect(),
                persistence_warning: None,
            };
            if !report.expired_effects.is_empty() || !report.ended_abilities.is_empty() {
                debug!(
                    character = %id,
                    effects = ?report.expired_effects,
                    abilities = ?report.ended_abilities,
                    "expired"
                );
            }
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    /// Spend the reaction, if it is still available this round.
    pub fn use_reaction(&self, id: CharacterId, description: &str) -> Result<ActionReport, EngineError> {
        self.take_action(id, ActionType::Reaction, Some(description))
    }

    /// Log an action such as Dash or Dodge against the turn economy.
    pub fn take_action(
        &self,
        id: CharacterId,
        action: ActionType,
        subtype: Option<&str>,
    ) -> Result<ActionReport, EngineError> {
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let report = match character.economy.try_record(action, subtype, None) {
                Ok(()) => {
                    if action == ActionType::Dodge {
                        character.effects.add(
                            ActiveEffect::new("Dodge", "dodge", EffectDuration::Rounds(1))
                                .with_modifier(Modifier::dodging()),
                        );
                    }
                    ActionReport {
                        success: true,
                        message: format!("{} takes {:?}.", character.name, action),
                        persistence_warning: None,
                    }
                }
                Err(e) => ActionReport {
                    success: false,
                    message: e.to_string(),
                    persistence_warning: None,
                },
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    pub fn move_character(&self, id: CharacterId, feet: u32) -> Result<ActionReport, EngineError> {
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let speed = character.speed;
            let report = match character.economy.spend_movement(feet, speed) {
                Ok(left) => ActionReport {
                    success: true,
                    message: format!("{} moves {} ft ({} ft left).", character.name, feet, left),
                    persistence_warning: None,
                },
                Err(e) => ActionReport {
                    success: false,
                    message: e.to_string(),
                    persistence_warning: None,
                },
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    pub fn short_rest(&self, id: CharacterId) -> Result<RestReport, EngineError> {
        self.rest(id, RestType::Short)
    }

    /// Long rest. Also drops every listener the character owns, since no
    /// ability stays active.
    pub fn long_rest(&self, id: CharacterId) -> Result<RestReport, EngineError> {
        self.rest(id, RestType::Long)
    }

    fn rest(&self, id: CharacterId, rest: RestType) -> Result<RestReport, EngineError> {
        let handle = self.handle(id)?;
        let (mut report, snapshot) = {
            let mut character = handle.lock();
            let summary = match rest {
                RestType::Short => character.short_rest(),
                RestType::Long => {
                    self.events.unsubscribe_owner(id);
                    character.long_rest()
                }
                RestType::None => {
                    return Err(EngineError::InvalidArgument("Not a rest".to_string()));
                }
            };
            info!(
                character = %id,
                %rest,
                restored = ?summary.abilities_restored,
                slots = ?summary.slot_levels_restored,
                "rest complete"
            );
            let report = RestReport {
                rest,
                summary,
                persistence_warning: None,
            };
            (report, self.snapshot(&character))
        };
        report.persistence_warning = self.persist(snapshot);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Roster files
    // ------------------------------------------------------------------

    pub fn snapshot_roster(&self) -> SavedRoster {
        SavedRoster::new(self.characters())
    }

    /// Put every character in the roster into play. Returns how many.
    pub fn restore_roster(&self, roster: SavedRoster) -> usize {
        let count = roster.characters.len();
        for character in roster.characters {
            self.add_character(character);
        }
        count
    }

    pub async fn save_roster(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let roster = self.snapshot_roster();
        roster.save_json(path).await
    }

    pub async fn load_roster(&self, path: impl AsRef<Path>) -> Result<usize, PersistError> {
        let roster = SavedRoster::load_json(path).await?;
        Ok(self.restore_roster(roster))
    }
}

impl std::fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("characters", &self.roster.read().len())
            .finish_non_exhaustive()
    }
}

fn active_keys(character: &Character) -> Vec<String> {
    character
        .abilities
        .values()
        .filter(|r| r.is_active)
        .map(|r| r.key.clone())
        .collect()
}

/// Lock the user and an optional second character in id order so two
/// callers targeting each other cannot deadlock.
fn lock_pair<'a>(
    user: &'a Mutex<Character>,
    user_id: CharacterId,
    other: Option<(&'a Mutex<Character>, CharacterId)>,
) -> (MutexGuard<'a, Character>, Option<MutexGuard<'a, Character>>) {
    match other {
        None => (user.lock(), None),
        Some((other, other_id)) if other_id < user_id => {
            let other = other.lock();
            (user.lock(), Some(other))
        }
        Some((other, _)) => {
            let user = user.lock();
            (user, Some(other.lock()))
        }
    }
}
