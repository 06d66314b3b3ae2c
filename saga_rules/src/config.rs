//! Tunable rule constants.

use serde::{Deserialize, Serialize};

/// Numbers the rules depend on. Every field has a default, so a partial TOML
/// table only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Maximum number of inventory items.
    pub inventory_capacity: usize,

    /// XP granted when an enemy is brought to 0 HP.
    pub kill_xp_bonus: u32,

    /// Flat damage added per level above the first.
    pub damage_bonus_per_level: u32,

    /// Base HP of the enemy synthesized by forced combat.
    pub ambush_base_hp: u32,

    /// Additional ambush HP per character level.
    pub ambush_hp_per_level: u32,

    /// Reject unknown consequence tiers instead of falling back to STANDARD.
    pub strict_tiers: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            inventory_capacity: 50,
            kill_xp_bonus: 25,
            damage_bonus_per_level: 1,
            ambush_base_hp: 20,
            ambush_hp_per_level: 2,
            strict_tiers: cfg!(debug_assertions),
        }
    }
}

impl RulesConfig {
    /// Parse a rules table from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
