//! Character storage.
//!
//! The engine talks to a [`CharacterRepository`]; an in-memory one is
//! provided. Whole rosters can also be written to and read from JSON files.

use crate::character::{Character, CharacterId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from a character repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("Character not found: {0}")]
    NotFound(CharacterId),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from roster files.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Where characters live between calls.
pub trait CharacterRepository: Send + Sync {
    fn load(&self, id: CharacterId) -> Result<Character, RepositoryError>;
    fn save(&self, character: &Character) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    characters: RwLock<HashMap<CharacterId, Character>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.characters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.read().is_empty()
    }
}

impl CharacterRepository for InMemoryRepository {
    fn load(&self, id: CharacterId) -> Result<Character, RepositoryError> {
        self.characters
            .read()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    fn save(&self, character: &Character) -> Result<(), RepositoryError> {
        self.characters
            .write()
            .insert(character.id, character.clone());
        Ok(())
    }
}

/// Current roster file version.
const ROSTER_VERSION: u32 = 1;

/// Every character in play, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRoster {
    pub version: u32,
    pub saved_at: String,
    pub characters: Vec<Character>,
}

impl SavedRoster {
    pub fn new(characters: Vec<Character>) -> Self {
        Self {
            version: ROSTER_VERSION,
            saved_at: chrono_now(),
            characters,
        }
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != ROSTER_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: ROSTER_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Seconds since the Unix epoch, as a string.
fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{AbilityScores, CharacterClass};
    use tempfile::TempDir;

    fn rogue() -> Character {
        Character::new("Vex", CharacterClass::Rogue, 2, AbilityScores::new(10, 16, 12, 12, 10, 14))
    }

    #[test]
    fn test_in_memory_round_trip() {
        let repo = InMemoryRepository::new();
        let character = rogue();
        assert_eq!(repo.load(character.id), Err(RepositoryError::NotFound(character.id)));

        repo.save(&character).unwrap();
        assert_eq!(repo.load(character.id).unwrap(), character);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_roster_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        let roster = SavedRoster::new(vec![rogue()]);

        roster.save_json(&path).await.unwrap();
        let loaded = SavedRoster::load_json(&path).await.unwrap();
        assert_eq!(loaded.characters, roster.characters);
    }

    #[tokio::test]
    async fn test_roster_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roster.json");
        let mut roster = SavedRoster::new(Vec::new());
        roster.version = 99;
        roster.save_json(&path).await.unwrap();

        assert!(matches!(
            SavedRoster::load_json(&path).await,
            Err(PersistError::VersionMismatch { expected: 1, found: 99 })
        ));
    }
}
