//! The full state of one playthrough.

use saga_rules::{Character, Quest, Scenario, StoryLog, WorldSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::{FactSource, WorldMemory};

/// Everything persisted for a playthrough. The character is the single source
/// of truth for health and combat; the rest is story bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub character: Character,
    #[serde(default)]
    pub scenario: Scenario,
    #[serde(default)]
    pub quest: Quest,
    #[serde(default)]
    pub story: StoryLog,
    #[serde(default)]
    pub memory: WorldMemory,
    #[serde(default)]
    pub world: WorldSnapshot,
    /// Id of the last turn applied, used to refuse replays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_committed_turn: Option<Uuid>,
}

impl GameState {
    pub fn new(character: Character, scenario: Scenario, quest: Quest) -> Self {
        Self {
            character,
            scenario,
            quest,
            story: StoryLog::new(),
            memory: WorldMemory::new(),
            world: WorldSnapshot::default(),
            last_committed_turn: None,
        }
    }

    /// Seed world facts known before the first turn.
    pub fn with_facts<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.memory.merge(facts, 0, FactSource::Initial);
        self
    }

    /// Player actions taken so far. Derived from the story log.
    pub fn action_count(&self) -> u32 {
        self.story.action_count()
    }
}
