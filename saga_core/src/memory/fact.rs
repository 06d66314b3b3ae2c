//! World facts - things the story has established.

use serde::{Deserialize, Serialize};

/// Where a fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FactSource {
    /// Seeded with the scenario.
    Initial,
    /// Reported by the narrative generator.
    #[default]
    Narrative,
    /// Carried in a state-change bag.
    StateChange,
}

/// A piece of world knowledge kept across turns and saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldFact {
    /// Human-readable content of the fact.
    pub content: String,

    /// Action count at the time the fact was learned.
    #[serde(default)]
    pub learned_on_turn: u32,

    #[serde(default)]
    pub source: FactSource,
}

impl WorldFact {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            learned_on_turn: 0,
            source: FactSource::Initial,
        }
    }

    pub fn with_turn(mut self, turn: u32) -> Self {
        self.learned_on_turn = turn;
        self
    }

    pub fn with_source(mut self, source: FactSource) -> Self {
        self.source = source;
        self
    }

    /// Identity used for deduplication.
    pub fn key(&self) -> String {
        fact_key(&self.content)
    }
}

/// Normalized form of a fact: lowercase, single spaces, no trailing period.
pub fn fact_key(content: &str) -> String {
    let collapsed = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.trim_end_matches('.').trim_end().to_string()
}
