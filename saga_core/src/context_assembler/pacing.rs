//! Pacing guidance - where the story should be heading at a given turn.

use serde::{Deserialize, Serialize};

/// Story phase for a given action count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PacingPhase {
    Establish,
    Complication,
    Escalate,
    Climax,
    Resolve,
}

impl PacingPhase {
    /// Phase bands scaled to the victory turn. With the default of 20 this is
    /// 1-3, 4-8, 9-14, 15-19, then 20 onward.
    pub fn for_turn(turn: u32, victory_turn: u32) -> PacingPhase {
        let victory = victory_turn.max(5);
        let scaled = |at: u32| (at * victory).div_ceil(20);

        if turn >= victory {
            PacingPhase::Resolve
        } else if turn >= scaled(15) {
            PacingPhase::Climax
        } else if turn >= scaled(9) {
            PacingPhase::Escalate
        } else if turn >= scaled(4) {
            PacingPhase::Complication
        } else {
            PacingPhase::Establish
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            PacingPhase::Establish => {
                "Establish the setting and the stakes. Introduce the quest hook and keep danger low."
            }
            PacingPhase::Complication => {
                "Introduce a complication: a rival, an obstacle, or a secret that changes the plan."
            }
            PacingPhase::Escalate => {
                "Raise the stakes. Threats grow more direct and choices carry real cost."
            }
            PacingPhase::Climax => {
                "Drive toward the climax. Bring the central conflict to a head."
            }
            PacingPhase::Resolve => {
                "Resolve the quest now. Conclude the central conflict and mark the quest complete."
            }
        }
    }
}

/// Pacing line included in the prompt. A pure function of the action count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingGuidance {
    pub turn: u32,
    pub phase: PacingPhase,
    pub turns_remaining: u32,
}

impl PacingGuidance {
    pub fn for_turn(turn: u32, victory_turn: u32) -> Self {
        Self {
            turn,
            phase: PacingPhase::for_turn(turn, victory_turn),
            turns_remaining: victory_turn.saturating_sub(turn),
        }
    }

    pub fn to_prompt_line(&self) -> String {
        format!(
            "Turn {} ({} turns remain before the quest must end). {}",
            self.turn,
            self.turns_remaining,
            self.phase.guidance()
        )
    }
}
