//! World memory - long-term facts surfaced into later prompts.
//!
//! Facts form a set keyed on normalized content. Merging is a set union:
//! the first occurrence wins and keeps the turn it was learned on.

mod fact;

pub use fact::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Persistent world facts, in the order they were learned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct WorldMemory {
    facts: Vec<WorldFact>,
}

impl WorldMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union new facts into memory. Returns how many were actually new.
    pub fn merge<I, S>(&mut self, facts: I, turn: u32, source: FactSource) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut known: HashSet<String> = self.facts.iter().map(WorldFact::key).collect();
        let before = self.facts.len();

        for content in facts {
            let content = content.as_ref().trim();
            let key = fact_key(content);
            if key.is_empty() || !known.insert(key) {
                continue;
            }
            self.facts.push(
                WorldFact::new(content)
                    .with_turn(turn)
                    .with_source(source),
            );
        }

        let added = self.facts.len() - before;
        if added > 0 {
            tracing::debug!(added, total = self.facts.len(), "Merged world facts");
        }
        added
    }

    pub fn contains(&self, content: &str) -> bool {
        let key = fact_key(content);
        self.facts.iter().any(|fact| fact.key() == key)
    }

    /// The most recently learned `n` facts, oldest first.
    pub fn recent(&self, n: usize) -> &[WorldFact] {
        let start = self.facts.len().saturating_sub(n);
        &self.facts[start..]
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldFact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_set_union() {
        let mut memory = WorldMemory::new();
        assert_eq!(memory.merge(["The bridge is out", "Wolves roam the pass"], 1, FactSource::Narrative), 2);
        assert_eq!(memory.merge(["the bridge is out.", "A storm is coming"], 5, FactSource::Narrative), 1);

        assert_eq!(memory.len(), 3);
        assert!(memory.contains("THE BRIDGE IS OUT"));
        assert_eq!(memory.iter().next().unwrap().learned_on_turn, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut memory = WorldMemory::new();
        let facts = vec!["One".to_string(), "Two".to_string()];
        memory.merge(&facts, 1, FactSource::StateChange);
        let snapshot = memory.clone();
        assert_eq!(memory.merge(&facts, 2, FactSource::StateChange), 0);
        assert_eq!(memory, snapshot);
    }

    #[test]
    fn test_blank_facts_skipped() {
        let mut memory = WorldMemory::new();
        assert_eq!(memory.merge(["", "   ", "."], 1, FactSource::Narrative), 0);
        assert!(memory.is_empty());
    }

    #[test]
    fn test_recent() {
        let mut memory = WorldMemory::new();
        memory.merge(["a", "b", "c", "d"], 1, FactSource::Initial);

        let recent: Vec<&str> = memory.recent(2).iter().map(|f| f.content.as_str()).collect();
        assert_eq!(recent, vec!["c", "d"]);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut memory = WorldMemory::new();
        memory.merge(["The well is poisoned"], 3, FactSource::Narrative);

        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(json[0]["content"], "The well is poisoned");
        assert_eq!(json[0]["learnedOnTurn"], 3);
    }
}
