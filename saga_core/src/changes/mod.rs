//! State changes proposed for a turn.
//!
//! The generator proposes a loosely shaped JSON bag. [`sanitize`] projects
//! it onto [`StateChanges`], keeping only whitelisted keys with valid shapes
//! and in-range numbers. The projection is idempotent, so sanitizing an
//! already sanitized bag changes nothing.

mod sanitize;

pub use sanitize::*;

use saga_rules::{ActiveEffect, CombatUpdate, Companion, Item, WorldSnapshot};
use serde::{Deserialize, Serialize};

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

/// A sanitized state delta. Numbers are deltas, lists are additions unless
/// named otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StateChanges {
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub health: i32,

    /// May be negative (gold spent).
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub gold: i64,

    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub xp: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory: Vec<Item>,

    /// Item ids to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_items: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub companions: Vec<Companion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_companions: Vec<CompanionUpdate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_progress: Option<QuestProgress>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<ActiveEffect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combat_update: Option<CombatUpdate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_updates: Option<WorldSnapshot>,

    /// Facts to remember for later prompts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub world_facts: Vec<String>,
}

impl StateChanges {
    pub fn is_empty(&self) -> bool {
        *self == StateChanges::default()
    }
}

/// A change to an existing companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompanionUpdate {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub loyalty_delta: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub departed: bool,
}

/// Quest bookkeeping proposed for a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_objective: Option<String>,
    /// Percent, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub quest_complete: bool,
}
