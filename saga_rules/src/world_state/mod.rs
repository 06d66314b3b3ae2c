//! Story and world bookkeeping: the story log, the scenario, the quest and
//! the current location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mechanics::DiceRollResult;

/// Kinds of story log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoryEntryKind {
    Narration,
    Action,
    DiceRoll,
}

/// One immutable record in the story log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEntry {
    #[serde(rename = "type")]
    kind: StoryEntryKind,
    text: String,
    timestamp: DateTime<Utc>,
}

impl StoryEntry {
    pub fn kind(&self) -> StoryEntryKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Append-only story history. The turn count is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StoryLog {
    entries: Vec<StoryEntry>,
}

impl StoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: StoryEntryKind, text: impl Into<String>) -> &StoryEntry {
        self.entries.push(StoryEntry {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn push_narration(&mut self, text: impl Into<String>) -> &StoryEntry {
        self.push(StoryEntryKind::Narration, text)
    }

    pub fn push_action(&mut self, text: impl Into<String>) -> &StoryEntry {
        self.push(StoryEntryKind::Action, text)
    }

    /// Record a check as its one-line summary.
    pub fn push_dice_roll(&mut self, result: &DiceRollResult) -> &StoryEntry {
        self.push(StoryEntryKind::DiceRoll, result.summary())
    }

    pub fn entries(&self) -> &[StoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[StoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Number of player actions recorded so far.
    pub fn action_count(&self) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.kind == StoryEntryKind::Action)
            .count() as u32
    }
}

/// Narrative tone requested for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Heroic,
    Grim,
    Whimsical,
    Mysterious,
    Horror,
}

/// How often encounters should turn violent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CombatFrequency {
    Rare,
    #[default]
    Occasional,
    Frequent,
}

/// How punishing the scenario is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stakes {
    Low,
    #[default]
    Moderate,
    High,
}

macro_rules! display_lowercase {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let text = format!("{:?}", self).to_lowercase();
                f.write_str(&text)
            }
        })*
    };
}

display_lowercase!(Tone, CombatFrequency, Stakes);

/// The adventure the character is playing through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub title: String,
    #[serde(default)]
    pub premise: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub combat_frequency: CombatFrequency,
    #[serde(default)]
    pub stakes: Stakes,
}

impl Scenario {
    pub fn new(title: impl Into<String>, premise: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            premise: premise.into(),
            ..Default::default()
        }
    }
}

/// Progress on the scenario's main quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub completed_objectives: Vec<String>,
    /// Percent, 0 to 100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub complete: bool,
}

impl Quest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Add an objective unless it is already known.
    pub fn add_objective(&mut self, objective: &str) {
        if !self.objectives.iter().any(|o| o.eq_ignore_ascii_case(objective)) {
            self.objectives.push(objective.to_string());
        }
    }

    /// Mark an objective done, adding it first if needed.
    pub fn complete_objective(&mut self, objective: &str) {
        self.add_objective(objective);
        if !self
            .completed_objectives
            .iter()
            .any(|o| o.eq_ignore_ascii_case(objective))
        {
            self.completed_objectives.push(objective.to_string());
        }
    }

    /// Progress only moves forward.
    pub fn advance_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    /// Returns true when this call completed the quest.
    pub fn mark_complete(&mut self) -> bool {
        if self.complete {
            return false;
        }
        self.complete = true;
        self.progress = 100;
        true
    }
}

/// Where and when the story currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
}
