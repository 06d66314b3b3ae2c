//! Game mechanics: risk and action categories, dice, damage, combat, progression.

pub mod combat;
pub mod damage;
pub mod dice;
pub mod progression;

pub use combat::*;
pub use damage::*;
pub use dice::*;

use serde::{Deserialize, Serialize};

/// How much a choice puts the character at risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    #[default]
    Moderate,
    Dangerous,
    Lethal,
}

impl RiskLevel {
    /// Parse a risk label, ignoring case. Unknown labels yield None.
    pub fn from_label(label: &str) -> Option<RiskLevel> {
        match label.trim().to_ascii_lowercase().as_str() {
            "safe" | "low" => Some(RiskLevel::Safe),
            "moderate" | "medium" => Some(RiskLevel::Moderate),
            "dangerous" | "high" => Some(RiskLevel::Dangerous),
            "lethal" | "deadly" => Some(RiskLevel::Lethal),
            _ => None,
        }
    }

    /// Failing a check at this risk level triggers forced combat.
    pub fn is_perilous(&self) -> bool {
        matches!(self, RiskLevel::Dangerous | RiskLevel::Lethal)
    }
}

/// What kind of action a choice represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Combat,
    Social,
    Explore,
    Stealth,
    Magic,
    Rest,
    #[default]
    Other,
}

impl ActionType {
    pub fn from_label(label: &str) -> ActionType {
        match label.trim().to_ascii_lowercase().as_str() {
            "combat" | "attack" | "fight" => ActionType::Combat,
            "social" | "talk" | "dialogue" => ActionType::Social,
            "explore" | "exploration" | "investigate" => ActionType::Explore,
            "stealth" | "sneak" => ActionType::Stealth,
            "magic" | "spell" => ActionType::Magic,
            "rest" => ActionType::Rest,
            _ => ActionType::Other,
        }
    }
}
