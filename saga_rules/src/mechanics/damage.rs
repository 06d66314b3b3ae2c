//! Damage model: qualitative consequence tiers to HP.
//!
//! Tier lookup is exact and uppercase-only. Generated text usually carries
//! lowercase tiers, so callers must run [`ConsequenceTier::normalize`] before
//! [`DamageModel::resolve_tier`]; skipping it makes every tier "unknown".

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::RulesConfig;
use crate::error::RulesError;

/// Outcome severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsequenceTier {
    Trivial,
    Standard,
    Dangerous,
    Lethal,
}

impl ConsequenceTier {
    pub const ALL: [ConsequenceTier; 4] = [
        ConsequenceTier::Trivial,
        ConsequenceTier::Standard,
        ConsequenceTier::Dangerous,
        ConsequenceTier::Lethal,
    ];

    /// Label meaning "no consequence".
    pub const NONE: &'static str = "NONE";

    pub fn min_damage(&self) -> u32 {
        match self {
            ConsequenceTier::Trivial => 1,
            ConsequenceTier::Standard => 4,
            ConsequenceTier::Dangerous => 9,
            ConsequenceTier::Lethal => 16,
        }
    }

    pub fn max_damage(&self) -> u32 {
        match self {
            ConsequenceTier::Trivial => 3,
            ConsequenceTier::Standard => 8,
            ConsequenceTier::Dangerous => 15,
            ConsequenceTier::Lethal => 25,
        }
    }

    /// Midpoint of the range, rounded down.
    pub fn midpoint(&self) -> u32 {
        (self.min_damage() + self.max_damage()) / 2
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsequenceTier::Trivial => "TRIVIAL",
            ConsequenceTier::Standard => "STANDARD",
            ConsequenceTier::Dangerous => "DANGEROUS",
            ConsequenceTier::Lethal => "LETHAL",
        }
    }

    /// Bring a raw tier label into lookup form.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_ascii_uppercase()
    }
}

impl fmt::Display for ConsequenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match on the uppercase name.
impl FromStr for ConsequenceTier {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConsequenceTier::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| RulesError::UnknownTier(s.to_string()))
    }
}

/// Converts tiers into damage, scaled by level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageModel {
    bonus_per_level: u32,
    strict: bool,
}

impl Default for DamageModel {
    fn default() -> Self {
        Self::from_config(&RulesConfig::default())
    }
}

impl DamageModel {
    pub fn new(bonus_per_level: u32, strict: bool) -> Self {
        Self {
            bonus_per_level,
            strict,
        }
    }

    pub fn from_config(config: &RulesConfig) -> Self {
        Self::new(config.damage_bonus_per_level, config.strict_tiers)
    }

    /// Flat bonus for a level: nothing at level 1, then `bonus_per_level` per level.
    pub fn level_bonus(&self, level: u32) -> u32 {
        level.saturating_sub(1).saturating_mul(self.bonus_per_level)
    }

    /// Damage for a tier. With `variance` the base is drawn uniformly from the
    /// tier's range, otherwise it is the midpoint.
    pub fn roll<R: Rng>(
        &self,
        tier: ConsequenceTier,
        level: u32,
        variance: bool,
        rng: &mut R,
    ) -> u32 {
        let base = if variance {
            rng.gen_range(tier.min_damage()..=tier.max_damage())
        } else {
            tier.midpoint()
        };
        base.saturating_add(self.level_bonus(level))
    }

    /// Look up an already normalized tier label. `NONE` and the empty string
    /// mean no damage.
    ///
    /// Unknown labels are an error in strict mode. Otherwise they are logged
    /// and treated as `STANDARD`, so a bad label cannot stall combat.
    pub fn resolve_tier(&self, normalized: &str) -> Result<Option<ConsequenceTier>, RulesError> {
        if normalized.is_empty() || normalized == ConsequenceTier::NONE {
            return Ok(None);
        }
        match normalized.parse::<ConsequenceTier>() {
            Ok(tier) => Ok(Some(tier)),
            Err(err) if self.strict => Err(err),
            Err(err) => {
                tracing::error!(tier = normalized, error = %err, "Unknown consequence tier, using STANDARD");
                Ok(Some(ConsequenceTier::Standard))
            }
        }
    }
}
