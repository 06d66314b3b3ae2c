//! Rule violations.

use thiserror::Error;

use crate::entities::StatType;

/// Errors raised when an operation would break a game rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("Unknown consequence tier: {0:?}")]
    UnknownTier(String),

    #[error("Unknown stat: {0:?}")]
    UnknownStat(String),

    #[error("{stat} must be between {min} and {max} at creation, got {value}")]
    StatOutOfRange {
        stat: StatType,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("Character name must not be empty")]
    EmptyName,

    #[error("Inventory full: {requested} item(s) proposed, {available} slot(s) free")]
    InventoryFull { requested: usize, available: usize },

    #[error("No level-up is pending")]
    NoLevelUpPending,

    #[error("Character is dead")]
    CharacterDead,
}
