//! What goes into a turn and what comes out of it.

use saga_rules::{ActionType, CombatTransition, ConsequenceTier, DiceRollResult, RiskLevel, RulesError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::changes::StateChanges;
use crate::narrative::Choice;
use crate::persist::PersistError;
use crate::reconciler::ReconcileError;

/// Action text that sends the turn straight to the death scene.
pub const DIRECT_DEATH_TRIGGER: &str = "[[direct-death]]";

/// Narrative shown when the generator could not be reached.
pub const FALLBACK_NARRATIVE: &str =
    "The world grows hazy for a moment, as if the story itself has paused to catch its breath. \
     Nothing has changed yet. Choose how to carry on.";

/// Death scene used when the generator cannot write one.
pub const FALLBACK_DEATH_NARRATIVE: &str =
    "Your strength finally gives out. The world fades to silence, and your tale ends here.";

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("character is dead")]
    CharacterDead,

    #[error("a level-up must be resolved before the next turn")]
    LevelUpPending,

    #[error("a turn is already in flight")]
    TurnInFlight,

    #[error("no turn is pending")]
    NoPendingTurn,

    #[error("turn {actual} does not match pending turn {expected}")]
    TurnMismatch { expected: Uuid, actual: Uuid },

    #[error("turn {0} was already committed")]
    DuplicateTurn(Uuid),

    #[error("turn cancelled")]
    Cancelled,

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What the player did: a picked choice or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAction {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Choice>,
}

impl PlayerAction {
    pub fn choose(choice: Choice) -> Self {
        Self {
            text: choice.text.clone(),
            choice: Some(choice),
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choice: None,
        }
    }

    pub fn death_trigger() -> Self {
        Self::free_text(DIRECT_DEATH_TRIGGER)
    }

    pub fn is_death_trigger(&self) -> bool {
        self.text.trim() == DIRECT_DEATH_TRIGGER
    }

    pub fn action_type(&self) -> Option<ActionType> {
        self.choice.as_ref().map(|choice| choice.action_type)
    }

    /// Risk of the picked choice. Free text is treated as moderate.
    pub fn risk(&self) -> RiskLevel {
        self.choice
            .as_ref()
            .map(|choice| choice.risk_level)
            .unwrap_or_default()
    }
}

/// A turn that has been started but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnTicket {
    pub turn_id: Uuid,
    pub action: PlayerAction,
    /// The check rolled for this action, before the generator was called.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<DiceRollResult>,
}

impl TurnTicket {
    pub fn new(action: PlayerAction, roll: Option<DiceRollResult>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            action,
            roll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TurnKind {
    Normal,
    /// The final scene. No choices, no state changes.
    Death,
    /// The generator failed. Nothing should be committed to the story.
    Fallback { reason: String, retryable: bool },
}

/// The authoritative result of a turn, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub turn_id: Uuid,
    pub kind: TurnKind,
    pub narrative: String,
    pub choices: Vec<Choice>,
    /// Sanitized changes with computed damage and combat merged in.
    pub state_changes: StateChanges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consequence_tier: Option<ConsequenceTier>,
    /// Damage computed from the tier, 0 when there was none.
    pub computed_damage: u32,
    pub combat: CombatTransition,
    /// The victory backstop completed the quest this turn.
    pub quest_forced_complete: bool,
}

impl TurnOutcome {
    pub fn death(turn_id: Uuid, narrative: String) -> Self {
        Self::bare(turn_id, TurnKind::Death, narrative, Vec::new())
    }

    pub fn fallback(turn_id: Uuid, reason: String, retryable: bool) -> Self {
        Self::bare(
            turn_id,
            TurnKind::Fallback { reason, retryable },
            FALLBACK_NARRATIVE.to_string(),
            crate::narrative::fallback_choices(),
        )
    }

    fn bare(turn_id: Uuid, kind: TurnKind, narrative: String, choices: Vec<Choice>) -> Self {
        Self {
            turn_id,
            kind,
            narrative,
            choices,
            state_changes: StateChanges::default(),
            consequence_tier: None,
            computed_damage: 0,
            combat: CombatTransition::None,
            quest_forced_complete: false,
        }
    }

    pub fn is_death(&self) -> bool {
        self.kind == TurnKind::Death
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.kind, TurnKind::Fallback { .. })
    }
}
