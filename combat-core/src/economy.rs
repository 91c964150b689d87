//! Per-turn action economy.
//!
//! Tracks what a character has spent this turn (action, bonus action,
//! reaction, movement), keeps a log of what was done, and derives which
//! bonus actions that log has unlocked.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Log subtype for melee weapon attacks.
pub const SUBTYPE_MELEE: &str = "melee";
/// Log subtype for ranged weapon attacks.
pub const SUBTYPE_RANGED: &str = "ranged";
/// Log subtype for unarmed strikes.
pub const SUBTYPE_UNARMED: &str = "unarmed";
/// Log subtype for off-hand attacks.
pub const SUBTYPE_OFF_HAND: &str = "off_hand";

/// Errors from spending turn resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EconomyError {
    #[error("No {0} remaining this turn")]
    AlreadySpent(ActionCost),
    #[error("Not enough movement: {requested} ft requested, {remaining} ft remaining")]
    InsufficientMovement { requested: u32, remaining: u32 },
}

/// Which turn resource something costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCost {
    Action,
    BonusAction,
    Reaction,
    Free,
}

impl fmt::Display for ActionCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionCost::Action => "action",
            ActionCost::BonusAction => "bonus action",
            ActionCost::Reaction => "reaction",
            ActionCost::Free => "free action",
        })
    }
}

/// Kinds of things a character can log on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Attack,
    CastSpell,
    Dash,
    Dodge,
    Help,
    Ready,
    BonusAction,
    Reaction,
    Movement,
    /// An ability, charged to whatever its cost class says.
    UseAbility(ActionCost),
    Free,
}

impl ActionType {
    /// The turn resource this entry spends, if any.
    pub fn cost(&self) -> Option<ActionCost> {
        match self {
            ActionType::Attack
            | ActionType::CastSpell
            | ActionType::Dash
            | ActionType::Dodge
            | ActionType::Help
            | ActionType::Ready => Some(ActionCost::Action),
            ActionType::BonusAction => Some(ActionCost::BonusAction),
            ActionType::Reaction => Some(ActionCost::Reaction),
            ActionType::UseAbility(ActionCost::Free) => None,
            ActionType::UseAbility(cost) => Some(*cost),
            ActionType::Movement | ActionType::Free => None,
        }
    }

    pub fn consumes_action(&self) -> bool {
        self.cost() == Some(ActionCost::Action)
    }
}

/// One thing done this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action_type: ActionType,
    pub subtype: Option<String>,
    /// Weapon key, ability key or other source of the action.
    pub source_key: Option<String>,
    /// Position in this turn's log.
    pub sequence: u32,
    /// Unix time in milliseconds.
    pub timestamp: u64,
}

/// Bonus actions that become legal because of something done earlier in
/// the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusActionOption {
    /// Attack with the off-hand light weapon after attacking with the main hand.
    OffHandAttack,
    /// Martial Arts unarmed strike after an unarmed or monk-weapon attack.
    MartialArtsStrike,
    /// Two unarmed strikes for one ki point.
    FlurryOfBlows,
}

impl BonusActionOption {
    pub fn key(&self) -> &'static str {
        match self {
            BonusActionOption::OffHandAttack => "off_hand_attack",
            BonusActionOption::MartialArtsStrike => "martial_arts_strike",
            BonusActionOption::FlurryOfBlows => "flurry_of_blows",
        }
    }
}

impl fmt::Display for BonusActionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The character facts bonus-action unlocking depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BonusActionContext {
    pub main_hand_key: Option<String>,
    /// Light melee weapons in both hands.
    pub dual_wields_light: bool,
    pub has_martial_arts: bool,
    /// Weapons that count for Martial Arts.
    pub monk_weapon_keys: Vec<String>,
    pub ki_available: bool,
}

/// Turn resources for one character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub reaction_used: bool,
    /// Feet moved this turn.
    pub movement_used: u32,
    /// Additional actions granted this turn (Action Surge).
    pub extra_actions: u8,
    /// Dashes granted without spending the action (Step of the Wind).
    #[serde(default)]
    pub extra_dashes: u8,
    log: Vec<ActionLogEntry>,
    available_bonus_actions: Vec<BonusActionOption>,
}

impl ActionEconomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for the start of the owner's turn. Reactions refresh here and
    /// nowhere else.
    pub fn start_new_turn(&mut self) {
        self.action_used = false;
        self.bonus_action_used = false;
        self.reaction_used = false;
        self.movement_used = 0;
        self.extra_actions = 0;
        self.extra_dashes = 0;
        self.log.clear();
        self.available_bonus_actions.clear();
    }

    /// Whether a resource of this cost class is still available.
    pub fn can_spend(&self, cost: ActionCost) -> bool {
        match cost {
            ActionCost::Action => !self.action_used || self.extra_actions > 0,
            ActionCost::BonusAction => !self.bonus_action_used,
            ActionCost::Reaction => !self.reaction_used,
            ActionCost::Free => true,
        }
    }

    /// Append to the log and mark whatever the entry spends.
    pub fn record_action(
        &mut self,
        action_type: ActionType,
        subtype: Option<&str>,
        source_key: Option<&str>,
    ) {
        match action_type.cost() {
            Some(ActionCost::Action) => {
                if self.action_used && self.extra_actions > 0 {
                    self.extra_actions -= 1;
                }
                self.action_used = true;
            }
            Some(ActionCost::BonusAction) => {
                self.bonus_action_used = true;
                self.available_bonus_actions.clear();
            }
            Some(ActionCost::Reaction) => self.reaction_used = true,
            Some(ActionCost::Free) | None => {}
        }

        self.log.push(ActionLogEntry {
            action_type,
            subtype: subtype.map(str::to_string),
            source_key: source_key.map(str::to_string),
            sequence: self.log.len() as u32,
            timestamp: now_millis(),
        });
    }

    /// Check availability, then record. Nothing changes on failure.
    pub fn try_record(
        &mut self,
        action_type: ActionType,
        subtype: Option<&str>,
        source_key: Option<&str>,
    ) -> Result<(), EconomyError> {
        if let Some(cost) = action_type.cost() {
            if !self.can_spend(cost) {
                return Err(EconomyError::AlreadySpent(cost));
            }
        }
        self.record_action(action_type, subtype, source_key);
        Ok(())
    }

    /// Action Surge: one more action this turn.
    pub fn grant_extra_action(&mut self) {
        self.extra_actions = self.extra_actions.saturating_add(1);
    }

    /// Dash as part of something else, leaving the action free.
    pub fn grant_dash(&mut self) {
        self.extra_dashes = self.extra_dashes.saturating_add(1);
    }

    /// Movement available this turn: speed, plus speed again per Dash.
    pub fn movement_budget(&self, speed: u32) -> u32 {
        let dashes = self
            .log
            .iter()
            .filter(|e| e.action_type == ActionType::Dash)
            .count() as u32;
        speed.saturating_mul(1 + dashes + u32::from(self.extra_dashes))
    }

    pub fn movement_remaining(&self, speed: u32) -> u32 {
        self.movement_budget(speed).saturating_sub(self.movement_used)
    }

    /// Spend movement; returns the feet left afterward.
    pub fn spend_movement(&mut self, feet: u32, speed: u32) -> Result<u32, EconomyError> {
        let remaining = self.movement_remaining(speed);
        if feet > remaining {
            return Err(EconomyError::InsufficientMovement {
                requested: feet,
                remaining,
            });
        }
        self.movement_used += feet;
        self.record_action(ActionType::Movement, None, None);
        Ok(remaining - feet)
    }

    /// Re-derive the unlocked bonus actions from this turn's log.
    pub fn recompute_available_bonus_actions(&mut self, ctx: &BonusActionContext) {
        self.available_bonus_actions.clear();
        if self.bonus_action_used {
            return;
        }

        let attacks = || {
            self.log
                .iter()
                .filter(|e| e.action_type == ActionType::Attack)
        };

        let main_hand_attack = ctx.main_hand_key.as_deref().is_some_and(|main| {
            attacks().any(|e| {
                e.source_key.as_deref() == Some(main)
                    && e.subtype.as_deref() != Some(SUBTYPE_OFF_HAND)
            })
        });
        let martial_attack = attacks().any(|e| {
            e.subtype.as_deref() == Some(SUBTYPE_UNARMED)
                || e
                    .source_key
                    .as_ref()
                    .is_some_and(|k| ctx.monk_weapon_keys.contains(k))
        });

        let mut unlocked = Vec::new();
        if ctx.dual_wields_light && main_hand_attack {
            unlocked.push(BonusActionOption::OffHandAttack);
        }
        if ctx.has_martial_arts && martial_attack {
            unlocked.push(BonusActionOption::MartialArtsStrike);
            if ctx.ki_available {
                unlocked.push(BonusActionOption::FlurryOfBlows);
            }
        }
        self.available_bonus_actions = unlocked;
    }

    pub fn available_bonus_actions(&self) -> &[BonusActionOption] {
        &self.available_bonus_actions
    }

    pub fn is_bonus_action_available(&self, option: BonusActionOption) -> bool {
        self.available_bonus_actions.contains(&option)
    }

    pub fn log(&self) -> &[ActionLogEntry] {
        &self.log
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
