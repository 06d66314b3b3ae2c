//! One character's play session.
//!
//! The session owns the game state and admits one turn at a time:
//! [`Session::begin_turn`] rolls any dice and issues a ticket, the
//! orchestrator runs the turn against a snapshot, and [`Session::commit`]
//! applies the outcome only if it matches the pending ticket.

use rand::Rng;
use saga_rules::{roll_check, StatType};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::events::GameEvent;
use crate::game_state::GameState;
use crate::persist::{manual_key, save_game, SaveStore, AUTOSAVE_KEY};
use crate::reconciler::{Reconciler, Reconciliation};
use crate::turn::{PlayerAction, TurnError, TurnKind, TurnOrchestrator, TurnOutcome, TurnTicket};

pub struct Session {
    state: GameState,
    store: Arc<dyn SaveStore>,
    reconciler: Reconciler,
    pending: Option<TurnTicket>,
    autosave: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(state: GameState, store: Arc<dyn SaveStore>, config: &EngineConfig) -> Self {
        Self {
            state,
            store,
            reconciler: Reconciler::new(config.rules.inventory_capacity),
            pending: None,
            autosave: None,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn pending(&self) -> Option<&TurnTicket> {
        self.pending.as_ref()
    }

    pub fn is_turn_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Start a turn. Dice are rolled here, before the generator is called.
    pub fn begin_turn<R: Rng>(
        &mut self,
        action: PlayerAction,
        rng: &mut R,
    ) -> Result<TurnTicket, TurnError> {
        let character = &self.state.character;
        if character.is_dead() {
            return Err(TurnError::CharacterDead);
        }
        if self.pending.is_some() {
            return Err(TurnError::TurnInFlight);
        }
        if character.has_pending_level_up() && !action.is_death_trigger() {
            return Err(TurnError::LevelUpPending);
        }

        let roll = action
            .choice
            .as_ref()
            .and_then(|choice| choice.dice_check())
            .map(|check| roll_check(&character.stats(), &check, 0, rng));
        if let Some(roll) = &roll {
            tracing::debug!(summary = %roll.summary(), "Rolled check");
        }

        let ticket = TurnTicket::new(action, roll);
        self.pending = Some(ticket.clone());
        Ok(ticket)
    }

    /// Drop the pending turn without recording anything.
    pub fn abandon_turn(&mut self) -> Option<TurnTicket> {
        self.pending.take()
    }

    /// Begin, run and commit a turn in one call. A cancelled turn is abandoned.
    pub async fn play_turn<R: Rng + Send>(
        &mut self,
        orchestrator: &TurnOrchestrator,
        action: PlayerAction,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<(TurnOutcome, Reconciliation), TurnError> {
        let ticket = self.begin_turn(action, rng)?;
        let outcome = match orchestrator.run_turn(&self.state, &ticket, rng, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.abandon_turn();
                return Err(err);
            }
        };
        let reconciliation = self.commit(outcome.clone()).await?;
        Ok((outcome, reconciliation))
    }

    /// Apply a turn outcome. Idempotent per turn id: a replayed outcome is
    /// refused with [`TurnError::DuplicateTurn`].
    ///
    /// Fallback outcomes clear the pending turn and record nothing. A death,
    /// by outcome or by health reaching 0, is saved before this returns;
    /// other turns are auto-saved in the background.
    pub async fn commit(&mut self, outcome: TurnOutcome) -> Result<Reconciliation, TurnError> {
        let ticket = match self.pending.take() {
            Some(ticket) if ticket.turn_id == outcome.turn_id => ticket,
            other => {
                self.pending = other;
                if self.state.last_committed_turn == Some(outcome.turn_id) {
                    return Err(TurnError::DuplicateTurn(outcome.turn_id));
                }
                return match &self.pending {
                    Some(ticket) => Err(TurnError::TurnMismatch {
                        expected: ticket.turn_id,
                        actual: outcome.turn_id,
                    }),
                    None => Err(TurnError::NoPendingTurn),
                };
            }
        };

        if self.state.character.is_dead() {
            return Err(TurnError::CharacterDead);
        }

        let health = self.state.character.health();
        match outcome.kind {
            TurnKind::Fallback { reason, .. } => {
                tracing::info!(turn_id = %outcome.turn_id, reason = %reason, "Fallback turn not recorded");
                Ok(Reconciliation {
                    health_before: health,
                    health_after: health,
                    ..Default::default()
                })
            }
            TurnKind::Death => {
                if !ticket.action.is_death_trigger() {
                    self.state.story.push_action(ticket.action.text.as_str());
                }
                self.state.story.push_narration(outcome.narrative);
                self.state.character.mark_dead();
                self.state.last_committed_turn = Some(outcome.turn_id);
                tracing::info!(turn_id = %outcome.turn_id, character = %self.state.character.name, "Character died");

                self.save_now().await?;
                Ok(Reconciliation {
                    health_before: health,
                    health_after: 0,
                    died: true,
                    events: vec![GameEvent::CharacterDied],
                    rejected_items: 0,
                })
            }
            TurnKind::Normal => {
                self.state.story.push_action(ticket.action.text.as_str());
                if let Some(roll) = &ticket.roll {
                    self.state.story.push_dice_roll(roll);
                }
                let reconciliation = self.reconciler.apply(&mut self.state, &outcome.state_changes)?;
                self.state.story.push_narration(outcome.narrative);
                self.state.last_committed_turn = Some(outcome.turn_id);
                tracing::info!(
                    turn_id = %outcome.turn_id,
                    turn = self.state.action_count(),
                    health = reconciliation.health_after,
                    events = reconciliation.events.len(),
                    "Turn committed"
                );

                if reconciliation.died {
                    self.save_now().await?;
                } else {
                    self.spawn_autosave();
                }
                Ok(reconciliation)
            }
        }
    }

    /// Resolve one pending level-up. Returns the new level.
    pub async fn resolve_level_up(&mut self, stat: StatType) -> Result<u32, TurnError> {
        let level = self.state.character.apply_level_up(stat)?;
        tracing::info!(level, stat = %stat, "Level up");
        self.spawn_autosave();
        Ok(level)
    }

    /// Health watch outside of turns. A character found at 0 HP dies and
    /// the death is saved before this returns.
    pub async fn health_watch(&mut self) -> Result<bool, TurnError> {
        if !self.state.character.watch_health() {
            return Ok(false);
        }
        self.pending = None;
        tracing::info!(character = %self.state.character.name, "Health watch: character died");
        self.save_now().await?;
        Ok(true)
    }

    /// Save under a named manual slot. Returns the key.
    pub async fn save_manual(&self, name: &str) -> Result<String, TurnError> {
        let key = manual_key(name)?;
        save_game(self.store.as_ref(), &key, &self.state).await?;
        Ok(key)
    }

    /// Wait for any background auto-save to finish.
    pub async fn wait_for_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "Auto-save task failed");
            }
        }
    }

    async fn save_now(&mut self) -> Result<(), TurnError> {
        self.wait_for_autosave().await;
        save_game(self.store.as_ref(), AUTOSAVE_KEY, &self.state).await?;
        Ok(())
    }

    /// Fire-and-forget auto-save. Saves run in commit order.
    fn spawn_autosave(&mut self) {
        let previous = self.autosave.take();
        let store = Arc::clone(&self.store);
        let snapshot = self.state.clone();

        self.autosave = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            if let Err(err) = save_game(store.as_ref(), AUTOSAVE_KEY, &snapshot).await {
                tracing::warn!(error = %err, "Auto-save failed");
            }
        }));
    }
}
