//! Game persistence for save/load functionality.
//!
//! Saves are JSON documents stored under string keys: [`AUTOSAVE_KEY`] for
//! the rolling auto-save and `manual/<name>` for named saves. Older save
//! shapes are migrated forward on load, and a corrupt manual save falls back
//! to the auto-save.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use saga_rules::{CombatState, CombatUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use crate::game_state::GameState;

/// Key of the rolling auto-save.
pub const AUTOSAVE_KEY: &str = "autosave";

/// Prefix of named manual saves.
pub const MANUAL_PREFIX: &str = "manual/";

/// Current save format version.
pub const SAVE_VERSION: u32 = 2;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("save '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("no save named '{0}'")]
    NotFound(String),

    #[error("invalid save key '{0}'")]
    InvalidKey(String),
}

/// A saved game as read back from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGame {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created.
    pub saved_at: DateTime<Utc>,

    pub state: GameState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveEnvelope<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a GameState,
}

/// Result of loading a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Resumed(GameState),
    /// The requested save was unreadable; the auto-save was loaded instead.
    RecoveredFromAutosave { state: GameState, notice: String },
    /// Nothing usable was found. A new character must be created.
    NewCharacterRequired { notice: String },
}

impl LoadOutcome {
    pub fn state(&self) -> Option<&GameState> {
        match self {
            LoadOutcome::Resumed(state) | LoadOutcome::RecoveredFromAutosave { state, .. } => Some(state),
            LoadOutcome::NewCharacterRequired { .. } => None,
        }
    }

    pub fn into_state(self) -> Option<GameState> {
        match self {
            LoadOutcome::Resumed(state) | LoadOutcome::RecoveredFromAutosave { state, .. } => Some(state),
            LoadOutcome::NewCharacterRequired { .. } => None,
        }
    }
}

/// Key-value storage for save documents.
#[async_trait]
pub trait SaveStore: Send + Sync {
    /// Read a document. `Ok(None)` when the key does not exist.
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError>;

    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError>;
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        validate_key(key)?;
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError> {
        validate_key(key)?;
        self.documents.write().await.insert(key.to_string(), contents);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError> {
        let mut keys: Vec<String> = self
            .documents
            .read()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// One JSON file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

#[async_trait]
impl SaveStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, PersistError> {
        validate_key(key)?;
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Written to a temporary file first, then renamed into place.
    async fn write(&self, key: &str, contents: String) -> Result<(), PersistError> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, contents).await?;
        fs::rename(&temp, &path).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError> {
        let key_dir = prefix.rsplit_once('/').map(|(dir, _)| dir);
        let dir = match key_dir {
            Some(key_dir) => self.root.join(key_dir),
            None => self.root.clone(),
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let key = match key_dir {
                Some(key_dir) => format!("{}/{}", key_dir, stem),
                None => stem.to_string(),
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Keys are `/`-separated segments of ASCII letters, digits, `-` and `_`.
fn validate_key(key: &str) -> Result<(), PersistError> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(PersistError::InvalidKey(key.to_string()))
    }
}

/// Key for a named manual save.
pub fn manual_key(name: &str) -> Result<String, PersistError> {
    let key = format!("{}{}", MANUAL_PREFIX, name.trim());
    validate_key(&key)?;
    Ok(key)
}

/// Names of all manual saves.
pub async fn list_manual_saves(store: &dyn SaveStore) -> Result<Vec<String>, PersistError> {
    Ok(store
        .list(MANUAL_PREFIX)
        .await?
        .into_iter()
        .filter_map(|key| key.strip_prefix(MANUAL_PREFIX).map(str::to_string))
        .collect())
}

/// Serialize `state` under `key`. Returns the save time.
pub async fn save_game(
    store: &dyn SaveStore,
    key: &str,
    state: &GameState,
) -> Result<DateTime<Utc>, PersistError> {
    let saved_at = Utc::now();
    let contents = serde_json::to_string_pretty(&SaveEnvelope {
        version: SAVE_VERSION,
        saved_at,
        state,
    })?;
    store.write(key, contents).await?;
    tracing::debug!(key, "Game saved");
    Ok(saved_at)
}

/// Load the save under `key`, falling back to the auto-save if it is corrupt.
///
/// The permadeath checkpoint runs on every loaded state: a character at
/// 0 HP who is not yet dead becomes dead before play resumes.
pub async fn load_game(store: &dyn SaveStore, key: &str) -> Result<LoadOutcome, PersistError> {
    let primary = match store.read(key).await? {
        Some(contents) => decode(key, &contents),
        None if key == AUTOSAVE_KEY => {
            return Ok(LoadOutcome::NewCharacterRequired {
                notice: "No saved game was found. Create a new character to begin.".to_string(),
            });
        }
        None => return Err(PersistError::NotFound(key.to_string())),
    };

    let primary_error = match primary {
        Ok(state) => return Ok(LoadOutcome::Resumed(checkpoint(state))),
        Err(err) => err,
    };
    tracing::warn!(key, error = %primary_error, "Save is corrupt");

    if key != AUTOSAVE_KEY {
        if let Some(contents) = store.read(AUTOSAVE_KEY).await? {
            match decode(AUTOSAVE_KEY, &contents) {
                Ok(state) => {
                    tracing::info!(key, "Recovered from auto-save");
                    return Ok(LoadOutcome::RecoveredFromAutosave {
                        state: checkpoint(state),
                        notice: format!(
                            "The save '{}' could not be read. Your most recent auto-save was loaded instead.",
                            key.strip_prefix(MANUAL_PREFIX).unwrap_or(key)
                        ),
                    });
                }
                Err(err) => tracing::warn!(error = %err, "Auto-save is corrupt too"),
            }
        }
    }

    Ok(LoadOutcome::NewCharacterRequired {
        notice: "Your saved game could not be read. Create a new character to begin again.".to_string(),
    })
}

fn checkpoint(mut state: GameState) -> GameState {
    state.character.normalize_vitals();
    if state.character.watch_health() {
        tracing::info!(character = %state.character.name, "Loaded character at 0 HP is dead");
    }
    state
}

fn decode(key: &str, contents: &str) -> Result<GameState, PersistError> {
    let corrupt = |reason: String| PersistError::Corrupt {
        key: key.to_string(),
        reason,
    };

    let value: Value = serde_json::from_str(contents).map_err(|err| corrupt(err.to_string()))?;
    let migrated = migrate(value).map_err(corrupt)?;
    let saved: SavedGame = serde_json::from_value(migrated).map_err(|err| corrupt(err.to_string()))?;
    Ok(saved.state)
}

/// Bring any known save shape up to [`SAVE_VERSION`].
///
/// Unversioned documents are either a bare game state or a bare character.
/// Older characters may carry `stats` instead of `baseStats`, `currentHealth`
/// instead of `health`, an `isDead` flag instead of `life`, and a flat combat
/// object with an `isActive` flag.
pub fn migrate(value: Value) -> Result<Value, String> {
    let Value::Object(mut document) = value else {
        return Err("save is not a JSON object".to_string());
    };

    let version = document.get("version").and_then(Value::as_u64);
    if let Some(version) = version {
        if version > SAVE_VERSION as u64 {
            return Err(format!("unsupported save version {}", version));
        }
    }

    let mut state = match (version, document.remove("state")) {
        (Some(_), Some(Value::Object(state))) => state,
        (_, Some(_)) => return Err("state is not an object".to_string()),
        (_, None) if document.contains_key("character") => document.clone(),
        (_, None) if document.contains_key("name") => {
            let mut state = Map::new();
            state.insert("character".to_string(), Value::Object(document.clone()));
            state
        }
        (_, None) => return Err("no game state found".to_string()),
    };

    if let Some(log) = state.remove("storyLog") {
        state.entry("story").or_insert(log);
    }
    match state.get_mut("character") {
        Some(Value::Object(character)) => migrate_character(character),
        _ => return Err("no character found".to_string()),
    }

    let saved_at = document
        .get("savedAt")
        .cloned()
        .unwrap_or_else(|| Value::String(Utc::now().to_rfc3339()));

    let mut migrated = Map::new();
    migrated.insert("version".to_string(), Value::from(SAVE_VERSION));
    migrated.insert("savedAt".to_string(), saved_at);
    migrated.insert("state".to_string(), Value::Object(state));
    Ok(Value::Object(migrated))
}

fn migrate_character(character: &mut Map<String, Value>) {
    if let Some(stats) = character.remove("stats") {
        character.entry("baseStats").or_insert(stats);
    }
    if let Some(health) = character.remove("currentHealth") {
        character.entry("health").or_insert(health);
    }
    if let Some(dead) = character.remove("isDead") {
        if !character.contains_key("life") {
            let life = if dead.as_bool() == Some(true) { "dead" } else { "alive" };
            character.insert("life".to_string(), Value::from(life));
        }
    }
    if !character.contains_key("maxHealth") {
        let health = character.get("health").cloned().unwrap_or(Value::from(1));
        character.insert("maxHealth".to_string(), health);
    }
    if !character.contains_key("health") {
        let max = character.get("maxHealth").cloned().unwrap_or(Value::from(1));
        character.insert("health".to_string(), max);
    }

    if let Some(combat) = character.get_mut("combat") {
        let flat = combat.as_object().is_some_and(|c| !c.contains_key("status"));
        if flat {
            let state = serde_json::from_value::<CombatUpdate>(combat.clone())
                .map(|update| update.to_state())
                .unwrap_or(CombatState::Idle);
            *combat = serde_json::to_value(state).unwrap_or(Value::Null);
        }
        if combat.is_null() {
            character.remove("combat");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_rules::{Character, Encounter, Quest, Scenario, Stats};
    use serde_json::json;

    fn sample_state() -> GameState {
        let character = Character::create("Aria", "Elf", "Ranger", Stats::default()).unwrap();
        let mut state = GameState::new(character, Scenario::new("Keep", "A keep."), Quest::new("Win"));
        state.story.push_narration("You arrive at the keep.");
        state.character.combat = CombatState::Active(Encounter::new("imp", "Imp", 9).unwrap());
        state
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = MemoryStore::new();
        let state = sample_state();

        save_game(&store, AUTOSAVE_KEY, &state).await.unwrap();
        let loaded = load_game(&store, AUTOSAVE_KEY).await.unwrap();

        assert_eq!(loaded, LoadOutcome::Resumed(state));
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let state = sample_state();

        save_game(&store, &manual_key("before-boss").unwrap(), &state).await.unwrap();
        save_game(&store, &manual_key("camp").unwrap(), &state).await.unwrap();
        save_game(&store, AUTOSAVE_KEY, &state).await.unwrap();

        assert_eq!(list_manual_saves(&store).await.unwrap(), vec!["before-boss", "camp"]);
        let loaded = load_game(&store, "manual/camp").await.unwrap();
        assert_eq!(loaded.into_state(), Some(state));
    }

    #[tokio::test]
    async fn test_corrupt_manual_falls_back_to_autosave() {
        let store = MemoryStore::new();
        let state = sample_state();
        save_game(&store, AUTOSAVE_KEY, &state).await.unwrap();
        store.write("manual/slot", "{ not json".to_string()).await.unwrap();

        match load_game(&store, "manual/slot").await.unwrap() {
            LoadOutcome::RecoveredFromAutosave { state: loaded, notice } => {
                assert_eq!(loaded, state);
                assert!(notice.contains("slot"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_everything_corrupt_requires_new_character() {
        let store = MemoryStore::new();
        store.write(AUTOSAVE_KEY, "[]".to_string()).await.unwrap();
        store.write("manual/slot", "{}".to_string()).await.unwrap();

        assert!(matches!(
            load_game(&store, "manual/slot").await.unwrap(),
            LoadOutcome::NewCharacterRequired { .. }
        ));
        assert!(matches!(
            load_game(&store, AUTOSAVE_KEY).await.unwrap(),
            LoadOutcome::NewCharacterRequired { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_saves() {
        let store = MemoryStore::new();
        assert!(matches!(
            load_game(&store, AUTOSAVE_KEY).await.unwrap(),
            LoadOutcome::NewCharacterRequired { .. }
        ));
        assert!(matches!(
            load_game(&store, "manual/nope").await,
            Err(PersistError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_old_shape_is_migrated() {
        let store = MemoryStore::new();
        let old = json!({
            "character": {
                "name": "Old Timer",
                "stats": { "valor": 7, "wisdom": 4, "fellowship": 5, "craft": 5, "endurance": 6, "lore": 3 },
                "currentHealth": 14,
                "maxHealth": 42,
                "gold": 9,
                "combat": { "isActive": true, "enemyName": "Bandit", "enemyHpCurrent": 5, "enemyHpMax": 12 }
            },
            "storyLog": []
        });
        store.write(AUTOSAVE_KEY, old.to_string()).await.unwrap();

        let state = load_game(&store, AUTOSAVE_KEY).await.unwrap().into_state().unwrap();
        assert_eq!(state.character.base_stats.valor, 7);
        assert_eq!(state.character.health(), 14);
        assert_eq!(state.character.max_health(), 42);
        let encounter = state.character.combat.encounter().unwrap();
        assert_eq!(encounter.enemy_name, "Bandit");
        assert_eq!(encounter.enemy_hp_current(), 5);
    }

    #[tokio::test]
    async fn test_permadeath_checkpoint_on_load() {
        let store = MemoryStore::new();
        let old = json!({ "name": "Doomed", "health": 0, "maxHealth": 30, "isDead": false });
        store.write(AUTOSAVE_KEY, old.to_string()).await.unwrap();

        let state = load_game(&store, AUTOSAVE_KEY).await.unwrap().into_state().unwrap();
        assert!(state.character.is_dead());
    }

    #[tokio::test]
    async fn test_dead_flag_is_migrated() {
        let store = MemoryStore::new();
        let old = json!({ "name": "Ghost", "health": 10, "maxHealth": 30, "isDead": true });
        store.write(AUTOSAVE_KEY, old.to_string()).await.unwrap();

        let state = load_game(&store, AUTOSAVE_KEY).await.unwrap().into_state().unwrap();
        assert!(state.character.is_dead());
    }

    #[test]
    fn test_keys() {
        assert_eq!(manual_key(" camp ").unwrap(), "manual/camp");
        assert!(matches!(manual_key("../etc"), Err(PersistError::InvalidKey(_))));
        assert!(manual_key("").is_err());
        assert!(validate_key("manual/a_b-1").is_ok());
    }

    #[test]
    fn test_future_version_is_rejected() {
        let result = migrate(json!({ "version": 99, "savedAt": "2024-01-01T00:00:00Z", "state": {} }));
        assert!(result.is_err());
    }
}
