//! Initiative order and round counting.

use crate::character::CharacterId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an encounter stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub current_round: u32,
    pub current_turn_index: usize,
    pub combatant_count: usize,
}

/// Supplies round numbers to the engine.
pub trait EncounterProvider: Send + Sync {
    fn turn_info(&self, encounter: EncounterId) -> Option<TurnInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CharacterId,
    pub name: String,
    pub initiative: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub active: bool,
    pub round: u32,
    pub turn_index: usize,
    pub combatants: Vec<Combatant>,
}

impl Encounter {
    pub fn new() -> Self {
        Self {
            id: EncounterId::new(),
            active: true,
            round: 1,
            turn_index: 0,
            combatants: Vec::new(),
        }
    }

    /// Highest initiative first; ties keep join order.
    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.combatants.push(combatant);
        self.combatants.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    }

    pub fn current_combatant(&self) -> Option<&Combatant> {
        self.combatants.get(self.turn_index)
    }

    /// Advance to the next combatant, starting a new round after the last.
    /// Returns whose turn it now is.
    pub fn next_turn(&mut self) -> Option<&Combatant> {
        if self.combatants.is_empty() {
            return None;
        }
        self.turn_index += 1;
        if self.turn_index >= self.combatants.len() {
            self.turn_index = 0;
            self.round += 1;
        }
        self.current_combatant()
    }

    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn turn_info(&self) -> TurnInfo {
        TurnInfo {
            current_round: self.round,
            current_turn_index: self.turn_index,
            combatant_count: self.combatants.len(),
        }
    }
}

impl Default for Encounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Running encounters, shareable with the engine as its provider.
#[derive(Debug, Default)]
pub struct EncounterTracker {
    encounters: RwLock<HashMap<EncounterId, Encounter>>,
}

impl EncounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, encounter: Encounter) -> EncounterId {
        let id = encounter.id;
        self.encounters.write().insert(id, encounter);
        id
    }

    pub fn get(&self, id: EncounterId) -> Option<Encounter> {
        self.encounters.read().get(&id).cloned()
    }

    /// Advance the encounter; returns whose turn it now is.
    pub fn next_turn(&self, id: EncounterId) -> Option<CharacterId> {
        let mut encounters = self.encounters.write();
        encounters
            .get_mut(&id)
            .filter(|e| e.active)
            .and_then(|e| e.next_turn())
            .map(|c| c.id)
    }

    pub fn end(&self, id: EncounterId) -> Option<Encounter> {
        let mut encounter = self.encounters.write().remove(&id)?;
        encounter.end();
        Some(encounter)
    }
}

impl EncounterProvider for EncounterTracker {
    fn turn_info(&self, encounter: EncounterId) -> Option<TurnInfo> {
        self.encounters
            .read()
            .get(&encounter)
            .filter(|e| e.active)
            .map(Encounter::turn_info)
    }
}
