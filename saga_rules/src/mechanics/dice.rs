//! d20 skill checks.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::RiskLevel;
use crate::entities::{StatType, Stats};

/// Lowest difficulty a check may ask for.
pub const DC_MIN: u32 = 8;
/// Highest difficulty a check may ask for.
pub const DC_MAX: u32 = 18;

/// A check the player is about to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceCheck {
    pub stat: StatType,
    pub dc: u32,
    #[serde(default)]
    pub risk: RiskLevel,
}

impl DiceCheck {
    /// Build a check with the DC clamped into `[DC_MIN, DC_MAX]`.
    pub fn new(stat: StatType, dc: u32, risk: RiskLevel) -> Self {
        Self {
            stat,
            dc: dc.clamp(DC_MIN, DC_MAX),
            risk,
        }
    }
}

/// The resolved outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollResult {
    pub roll: u32,
    pub modifier: i32,
    pub bonus: i32,
    pub total: i32,
    pub dc: u32,
    pub success: bool,
    pub stat: StatType,
}

impl DiceRollResult {
    /// Assemble a result from a known die face.
    pub fn from_roll(roll: u32, modifier: i32, bonus: i32, dc: u32, stat: StatType) -> Self {
        let total = roll as i32 + modifier + bonus;
        Self {
            roll,
            modifier,
            bonus,
            total,
            dc,
            success: total >= dc as i32,
            stat,
        }
    }

    /// One-line description, used for the story log and prompt context.
    pub fn summary(&self) -> String {
        format!(
            "{} check: rolled {} {:+} {:+} = {} vs DC {} ({})",
            self.stat,
            self.roll,
            self.modifier,
            self.bonus,
            self.total,
            self.dc,
            if self.success { "success" } else { "failure" }
        )
    }
}

pub fn roll_d20<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1..=20)
}

/// Roll d20 + stat value + bonus against the check's DC.
pub fn roll_check<R: Rng>(stats: &Stats, check: &DiceCheck, bonus: i32, rng: &mut R) -> DiceRollResult {
    let roll = roll_d20(rng);
    DiceRollResult::from_roll(roll, stats.get(check.stat), bonus, check.dc, check.stat)
}
