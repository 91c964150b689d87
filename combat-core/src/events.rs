//! Publish/subscribe for combat events.
//!
//! Every listener belongs to one character (its owner) and only hears events
//! published for that character. Listeners share a `source` label with the
//! ability that registered them; when any listener in a source group
//! expires, the whole group goes with it and each member's cleanup runs
//! against the owner.

use crate::attack::{DamageRider, DamageType};
use crate::character::{Character, CharacterId};
use parking_lot::Mutex;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The owner rolled damage for a hit.
    DamageRoll,
    /// The owner is about to lose hit points.
    BeforeTakingDamage,
    TurnStart,
    TurnEnd,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::DamageRoll => "damage_roll",
            EventKind::BeforeTakingDamage => "before_taking_damage",
            EventKind::TurnStart => "turn_start",
            EventKind::TurnEnd => "turn_end",
        })
    }
}

/// Facts about the attack behind a `DamageRoll`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrikeInfo {
    pub melee: bool,
    pub uses_strength: bool,
    /// Finesse or ranged weapon.
    pub precise: bool,
    pub critical: bool,
}

/// An event in flight. Listeners may change `amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatEvent {
    pub kind: EventKind,
    pub subject: CharacterId,
    pub other: Option<CharacterId>,
    pub round: u32,
    pub amount: i32,
    pub damage_type: Option<DamageType>,
    pub strike: StrikeInfo,
    pub riders: Vec<DamageRider>,
}

impl CombatEvent {
    fn new(kind: EventKind, subject: CharacterId, round: u32) -> Self {
        Self {
            kind,
            subject,
            other: None,
            round,
            amount: 0,
            damage_type: None,
            strike: StrikeInfo::default(),
            riders: Vec::new(),
        }
    }

    pub fn turn_start(subject: CharacterId, round: u32) -> Self {
        Self::new(EventKind::TurnStart, subject, round)
    }

    pub fn turn_end(subject: CharacterId, round: u32) -> Self {
        Self::new(EventKind::TurnEnd, subject, round)
    }

    pub fn damage_roll(
        attacker: CharacterId,
        amount: i32,
        damage_type: DamageType,
        strike: StrikeInfo,
        round: u32,
    ) -> Self {
        Self {
            amount,
            damage_type: Some(damage_type),
            strike,
            ..Self::new(EventKind::DamageRoll, attacker, round)
        }
    }

    pub fn before_taking_damage(target: CharacterId, amount: i32, damage_type: DamageType, round: u32) -> Self {
        Self {
            amount,
            damage_type: Some(damage_type),
            ..Self::new(EventKind::BeforeTakingDamage, target, round)
        }
    }

    /// Add extra damage and remember where it came from.
    pub fn add_damage(&mut self, source: &str, amount: i32) {
        self.amount += amount;
        self.riders.push(DamageRider {
            source: source.to_string(),
            amount,
        });
    }
}

/// What a listener wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerControl {
    Continue,
    /// Remove this listener's whole source group.
    Expire,
}

pub type ListenerFn = Box<dyn FnMut(&mut CombatEvent, &mut Character) -> ListenerControl + Send>;
pub type CleanupFn = Box<dyn FnOnce(&mut Character) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub Uuid);

pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: CharacterId,
    pub kind: EventKind,
    pub source: String,
    listener: ListenerFn,
    on_expire: Option<CleanupFn>,
}

impl Subscription {
    pub fn new(
        owner: CharacterId,
        kind: EventKind,
        source: impl Into<String>,
        listener: impl FnMut(&mut CombatEvent, &mut Character) -> ListenerControl + Send + 'static,
    ) -> Self {
        Self {
            id: SubscriptionId(Uuid::new_v4()),
            owner,
            kind,
            source: source.into(),
            listener: Box::new(listener),
            on_expire: None,
        }
    }

    /// Run `cleanup` against the owner when this subscription expires.
    pub fn with_cleanup(mut self, cleanup: impl FnOnce(&mut Character) + Send + 'static) -> Self {
        self.on_expire = Some(Box::new(cleanup));
        self
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("owner", &self.owner)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A `TurnStart` listener that ends something after `rounds` of the owner's
/// turns. Each turn start also writes the countdown into the owner's
/// ability record under `ability_key`.
pub fn duration_tracker(
    owner: CharacterId,
    ability_key: &str,
    rounds: u32,
    cleanup: impl FnOnce(&mut Character) + Send + 'static,
) -> Subscription {
    let key = ability_key.to_string();
    let mut elapsed = 0u32;
    Subscription::new(owner, EventKind::TurnStart, ability_key, move |_, character| {
        elapsed += 1;
        let left = rounds.saturating_sub(elapsed);
        if let Some(record) = character.ability_mut(&key) {
            if record.is_active {
                record.rounds_remaining = Some(left);
            }
        }
        if left == 0 {
            ListenerControl::Expire
        } else {
            ListenerControl::Continue
        }
    })
    .with_cleanup(cleanup)
}

/// Listeners in insertion order.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscription: Subscription) -> SubscriptionId {
        let id = subscription.id;
        debug!(
            owner = %subscription.owner,
            kind = %subscription.kind,
            source = %subscription.source,
            "listener subscribed"
        );
        self.listeners.lock().push(subscription);
        id
    }

    /// Drop a source group without running cleanups.
    pub fn unsubscribe_source(&self, owner: CharacterId, source: &str) -> usize {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|s| !(s.owner == owner && s.source == source));
        before - listeners.len()
    }

    /// Drop every listener a character owns without running cleanups.
    pub fn unsubscribe_owner(&self, owner: CharacterId) -> usize {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|s| s.owner != owner);
        before - listeners.len()
    }

    pub fn has_source(&self, owner: CharacterId, source: &str) -> bool {
        self.listeners
            .lock()
            .iter()
            .any(|s| s.owner == owner && s.source == source)
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to the listeners `owner` holds for its kind. Returns
    /// the source groups that expired.
    ///
    /// The bus lock is held while listeners run, so listeners must not call
    /// back into the bus.
    pub fn publish(&self, event: &mut CombatEvent, owner: &mut Character) -> Vec<String> {
        let mut listeners = self.listeners.lock();
        let mut expired: Vec<String> = Vec::new();

        for sub in listeners.iter_mut() {
            if sub.owner != owner.id || sub.kind != event.kind || expired.contains(&sub.source) {
                continue;
            }
            if (sub.listener)(event, owner) == ListenerControl::Expire {
                expired.push(sub.source.clone());
            }
        }

        if expired.is_empty() {
            return expired;
        }

        let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *listeners)
            .into_iter()
            .partition(|s| s.owner == owner.id && expired.contains(&s.source));
        *listeners = kept;
        drop(listeners);

        for sub in gone {
            if let Some(cleanup) = sub.on_expire {
                cleanup(owner);
            }
        }
        debug!(owner = %owner.id, kind = %event.kind, sources = ?expired, "listeners expired");
        expired
    }
}
