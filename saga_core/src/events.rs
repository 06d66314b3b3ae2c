//! Events emitted when a turn is reconciled, for the UI layer to react to.

use serde::{Deserialize, Serialize};

/// Something the player should be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GameEvent {
    /// Health reached zero. The death has already been saved.
    CharacterDied,

    /// XP crossed a threshold. Must be resolved before the next turn.
    LevelUpReady { pending: u32 },

    /// A batch of items was rejected because it did not fit.
    InventoryFull { requested: usize, available: usize },

    ItemsAdded { count: usize },

    ItemsRemoved { count: usize },

    CombatStarted { enemy_name: String, enemy_hp_max: u32 },

    CombatEnded { enemy_name: String },

    CompanionJoined { name: String },

    CompanionLeft { name: String },

    QuestComplete,

    WorldFactsLearned { count: usize },
}
