//! Timed modifiers on a character: buffs, debuffs and conditions.
//!
//! The [`EffectLedger`] is the single place combat math looks for damage
//! bonuses, resistances and AC bonuses. Effects expire by rounds, by
//! minutes, at the next rest, or never.

use crate::attack::DamageType;
use crate::character::RestType;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an applied effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectId(pub Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// D&D 5e conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Exhaustion(u8),
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Blinded => "Blinded",
            Condition::Charmed => "Charmed",
            Condition::Deafened => "Deafened",
            Condition::Frightened => "Frightened",
            Condition::Grappled => "Grappled",
            Condition::Incapacitated => "Incapacitated",
            Condition::Invisible => "Invisible",
            Condition::Paralyzed => "Paralyzed",
            Condition::Petrified => "Petrified",
            Condition::Poisoned => "Poisoned",
            Condition::Prone => "Prone",
            Condition::Restrained => "Restrained",
            Condition::Stunned => "Stunned",
            Condition::Unconscious => "Unconscious",
            Condition::Exhaustion(_) => "Exhaustion",
        }
    }

    pub fn is_incapacitating(&self) -> bool {
        matches!(
            self,
            Condition::Incapacitated
                | Condition::Paralyzed
                | Condition::Petrified
                | Condition::Stunned
                | Condition::Unconscious
        )
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Exhaustion(level) => write!(f, "Exhaustion ({level})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// How long an effect lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectDuration {
    /// Counted down once per round of the owner's turns.
    Rounds(u32),
    /// Counted down as in-game time passes.
    Minutes(u32),
    /// Cleared by the next short or long rest.
    UntilRest,
    /// Survives every rest; removed only explicitly.
    Permanent,
}

impl EffectDuration {
    pub fn is_permanent(&self) -> bool {
        matches!(self, EffectDuration::Permanent)
    }

    fn is_elapsed(&self) -> bool {
        matches!(self, EffectDuration::Rounds(0) | EffectDuration::Minutes(0))
    }
}

impl fmt::Display for EffectDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectDuration::Rounds(n) => write!(f, "{} round{}", n, if *n == 1 { "" } else { "s" }),
            EffectDuration::Minutes(n) => {
                write!(f, "{} minute{}", n, if *n == 1 { "" } else { "s" })
            }
            EffectDuration::UntilRest => write!(f, "until rest"),
            EffectDuration::Permanent => write!(f, "permanent"),
        }
    }
}

/// What a modifier changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    DamageBonus,
    AttackBonus,
    Resistance,
    AcBonus,
    /// Attacks against the character have disadvantage.
    Dodging,
    Condition(Condition),
}

/// Which damage types a modifier covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierScope {
    All,
    Only(Vec<DamageType>),
}

impl ModifierScope {
    pub fn covers(&self, damage_type: DamageType) -> bool {
        match self {
            ModifierScope::All => true,
            ModifierScope::Only(types) => types.contains(&damage_type),
        }
    }
}

/// A single numeric change carried by an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub kind: ModifierKind,
    pub value: i32,
    pub applies_to: ModifierScope,
}

impl Modifier {
    pub fn damage_bonus(value: i32, applies_to: ModifierScope) -> Self {
        Self {
            kind: ModifierKind::DamageBonus,
            value,
            applies_to,
        }
    }

    pub fn attack_bonus(value: i32) -> Self {
        Self {
            kind: ModifierKind::AttackBonus,
            value,
            applies_to: ModifierScope::All,
        }
    }

    pub fn resistance(types: impl Into<Vec<DamageType>>) -> Self {
        Self {
            kind: ModifierKind::Resistance,
            value: 0,
            applies_to: ModifierScope::Only(types.into()),
        }
    }

    pub fn ac_bonus(value: i32) -> Self {
        Self {
            kind: ModifierKind::AcBonus,
            value,
            applies_to: ModifierScope::All,
        }
    }

    pub fn dodging() -> Self {
        Self {
            kind: ModifierKind::Dodging,
            value: 0,
            applies_to: ModifierScope::All,
        }
    }

    pub fn condition(condition: Condition) -> Self {
        Self {
            kind: ModifierKind::Condition(condition),
            value: 0,
            applies_to: ModifierScope::All,
        }
    }
}

/// An effect currently applied to a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: EffectId,
    pub name: String,
    /// What applied the effect, usually an ability key.
    pub source: String,
    pub duration: EffectDuration,
    pub requires_concentration: bool,
    pub modifiers: Vec<Modifier>,
}

impl ActiveEffect {
    pub fn new(name: impl Into<String>, source: impl Into<String>, duration: EffectDuration) -> Self {
        Self {
            id: EffectId::new(),
            name: name.into(),
            source: source.into(),
            duration,
            requires_concentration: false,
            modifiers: Vec::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_concentration(mut self) -> Self {
        self.requires_concentration = true;
        self
    }

    fn matching(&self, kind: fn(&ModifierKind) -> bool) -> impl Iterator<Item = &Modifier> {
        let live = !self.duration.is_elapsed();
        self.modifiers
            .iter()
            .filter(move |m| live && kind(&m.kind))
    }
}

/// Ordered collection of the effects on one character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectLedger {
    effects: Vec<ActiveEffect>,
}

impl EffectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an effect. A concentration effect first ends every other
    /// concentration effect; those are returned.
    pub fn add(&mut self, effect: ActiveEffect) -> Vec<ActiveEffect> {
        let evicted = if effect.requires_concentration {
            self.drain_where(|e| e.requires_concentration)
        } else {
            Vec::new()
        };
        self.effects.push(effect);
        evicted
    }

    pub fn remove(&mut self, id: EffectId) -> Option<ActiveEffect> {
        let pos = self.effects.iter().position(|e| e.id == id)?;
        Some(self.effects.remove(pos))
    }

    pub fn remove_named(&mut self, name: &str) -> Vec<ActiveEffect> {
        self.drain_where(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn remove_from_source(&mut self, source: &str) -> Vec<ActiveEffect> {
        self.drain_where(|e| e.source == source)
    }

    /// Count every round-based effect down by one and drop the ones that
    /// reach zero.
    pub fn tick_round_durations(&mut self) -> Vec<ActiveEffect> {
        for effect in &mut self.effects {
            if let EffectDuration::Rounds(n) = &mut effect.duration {
                *n = n.saturating_sub(1);
            }
        }
        self.drain_where(|e| e.duration.is_elapsed())
    }

    /// Let in-game time pass. A minute is ten rounds.
    pub fn advance_minutes(&mut self, minutes: u32) -> Vec<ActiveEffect> {
        for effect in &mut self.effects {
            match &mut effect.duration {
                EffectDuration::Minutes(n) => *n = n.saturating_sub(minutes),
                EffectDuration::Rounds(n) => *n = n.saturating_sub(minutes.saturating_mul(10)),
                _ => {}
            }
        }
        self.drain_where(|e| e.duration.is_elapsed())
    }

    /// Drop what a rest ends: a long rest keeps only permanent effects, a
    /// short rest ends until-rest effects.
    pub fn clear_for_rest(&mut self, rest: RestType) -> Vec<ActiveEffect> {
        match rest {
            RestType::Long => self.drain_where(|e| !e.duration.is_permanent()),
            RestType::Short => self.drain_where(|e| e.duration == EffectDuration::UntilRest),
            RestType::None => Vec::new(),
        }
    }

    /// Sum of damage bonuses covering `damage_type`.
    pub fn damage_bonus(&self, damage_type: DamageType) -> i32 {
        self.effects
            .iter()
            .flat_map(|e| e.matching(|k| *k == ModifierKind::DamageBonus))
            .filter(|m| m.applies_to.covers(damage_type))
            .map(|m| m.value)
            .sum()
    }

    /// Sum of attack roll bonuses.
    pub fn attack_bonus(&self) -> i32 {
        self.effects
            .iter()
            .flat_map(|e| e.matching(|k| *k == ModifierKind::AttackBonus))
            .map(|m| m.value)
            .sum()
    }

    /// Resistance does not stack; any matching modifier grants it.
    pub fn has_resistance(&self, damage_type: DamageType) -> bool {
        self.effects
            .iter()
            .flat_map(|e| e.matching(|k| *k == ModifierKind::Resistance))
            .any(|m| m.applies_to.covers(damage_type))
    }

    /// Largest AC bonus among active effects, or 0.
    pub fn ac_bonus(&self) -> i32 {
        self.effects
            .iter()
            .flat_map(|e| e.matching(|k| *k == ModifierKind::AcBonus))
            .map(|m| m.value)
            .max()
            .unwrap_or(0)
            .max(0)
    }

    pub fn is_dodging(&self) -> bool {
        self.effects
            .iter()
            .any(|e| e.matching(|k| *k == ModifierKind::Dodging).next().is_some())
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.effects
            .iter()
            .flat_map(|e| e.matching(|k| matches!(k, ModifierKind::Condition(_))))
            .any(|m| m.kind == ModifierKind::Condition(condition))
    }

    pub fn concentration(&self) -> Option<&ActiveEffect> {
        self.effects.iter().find(|e| e.requires_concentration)
    }

    pub fn find_named(&self, name: &str) -> Option<&ActiveEffect> {
        self.effects
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    fn drain_where(&mut self, pred: impl Fn(&ActiveEffect) -> bool) -> Vec<ActiveEffect> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.effects)
            .into_iter()
            .partition(|e| pred(e));
        self.effects = kept;
        removed
    }
}
