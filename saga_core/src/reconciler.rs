//! Client Reconciler - applies a turn's changes to the authoritative state.
//!
//! Everything here has already been sanitized and merged by the turn
//! orchestrator. The reconciler enforces the character invariants while
//! applying it: health through the single accessor, capacity before append,
//! and no mutation at all once the character is dead.

use saga_rules::{CombatState, Inventory};
use thiserror::Error;

use crate::changes::StateChanges;
use crate::events::GameEvent;
use crate::game_state::GameState;
use crate::memory::FactSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("character is dead")]
    CharacterDead,
}

/// What applying a change set did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reconciliation {
    pub health_before: i32,
    pub health_after: i32,
    /// Health reached 0 and the character is now dead.
    pub died: bool,
    pub events: Vec<GameEvent>,
    /// Items refused because the batch did not fit.
    pub rejected_items: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    inventory_capacity: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(Inventory::DEFAULT_CAPACITY)
    }
}

impl Reconciler {
    pub fn new(inventory_capacity: usize) -> Self {
        Self { inventory_capacity }
    }

    /// Apply `changes` to `state`.
    ///
    /// When health reaches 0 the character dies and nothing else in the set
    /// is applied.
    pub fn apply(
        &self,
        state: &mut GameState,
        changes: &StateChanges,
    ) -> Result<Reconciliation, ReconcileError> {
        if state.character.is_dead() {
            return Err(ReconcileError::CharacterDead);
        }

        let turn = state.action_count();
        let character = &mut state.character;
        let mut result = Reconciliation {
            health_before: character.health(),
            ..Default::default()
        };

        result.health_after = character.apply_health_delta(changes.health);
        if character.watch_health() {
            tracing::info!(character = %character.name, "Character died");
            result.died = true;
            result.events.push(GameEvent::CharacterDied);
            return Ok(result);
        }

        if let Some(update) = &changes.combat_update {
            let previous = std::mem::replace(&mut character.combat, update.to_state());
            match (&previous, &character.combat) {
                (CombatState::Idle, CombatState::Active(encounter)) => {
                    result.events.push(GameEvent::CombatStarted {
                        enemy_name: encounter.enemy_name.clone(),
                        enemy_hp_max: encounter.enemy_hp_max(),
                    })
                }
                (CombatState::Active(encounter), CombatState::Idle) => {
                    result.events.push(GameEvent::CombatEnded {
                        enemy_name: encounter.enemy_name.clone(),
                    })
                }
                _ => {}
            }
        }

        if changes.gold != 0 {
            character.adjust_gold(changes.gold);
        }
        if changes.xp > 0 && character.gain_xp(changes.xp) > 0 {
            result.events.push(GameEvent::LevelUpReady {
                pending: character.pending_level_ups,
            });
        }

        let removed = changes
            .remove_items
            .iter()
            .filter(|id| character.inventory.remove(id).is_some())
            .count();
        if removed > 0 {
            result.events.push(GameEvent::ItemsRemoved { count: removed });
        }

        if !changes.inventory.is_empty() {
            character.inventory.set_capacity(self.inventory_capacity);
            let requested = changes.inventory.len();
            let available = character.inventory.available();
            match character.inventory.try_append(changes.inventory.clone()) {
                Ok(()) => result.events.push(GameEvent::ItemsAdded { count: requested }),
                Err(err) => {
                    tracing::warn!(requested, available, error = %err, "Rejected item batch");
                    result.rejected_items = requested;
                    result.events.push(GameEvent::InventoryFull { requested, available });
                }
            }
        }

        for companion in &changes.companions {
            let known = character
                .companions
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&companion.name));
            if !known {
                character.companions.push(companion.clone());
                result.events.push(GameEvent::CompanionJoined {
                    name: companion.name.clone(),
                });
            }
        }

        for update in &changes.update_companions {
            let Some(index) = character
                .companions
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(&update.name))
            else {
                tracing::debug!(name = %update.name, "Update for unknown companion ignored");
                continue;
            };
            if update.departed {
                let companion = character.companions.remove(index);
                result.events.push(GameEvent::CompanionLeft { name: companion.name });
            } else {
                let companion = &mut character.companions[index];
                companion.loyalty = (companion.loyalty + update.loyalty_delta)
                    .clamp(0, saga_rules::Companion::MAX_LOYALTY);
            }
        }

        character.effects.retain_mut(|effect| effect.tick());
        character.effects.extend(changes.effects.iter().cloned());

        if let Some(progress) = &changes.quest_progress {
            let quest = &mut state.quest;
            if let Some(objective) = &progress.new_objective {
                quest.add_objective(objective);
            }
            if let Some(objective) = &progress.objective_completed {
                quest.complete_objective(objective);
            }
            if let Some(percent) = progress.progress {
                quest.advance_progress(percent);
            }
            if progress.quest_complete && quest.mark_complete() {
                tracing::info!(quest = %quest.title, "Quest complete");
                result.events.push(GameEvent::QuestComplete);
            }
        }

        if let Some(world) = &changes.world_updates {
            if world.location.is_some() {
                state.world.location = world.location.clone();
            }
            if world.time_of_day.is_some() {
                state.world.time_of_day = world.time_of_day.clone();
            }
        }

        let learned = state
            .memory
            .merge(&changes.world_facts, turn, FactSource::StateChange);
        if learned > 0 {
            result.events.push(GameEvent::WorldFactsLearned { count: learned });
        }

        Ok(result)
    }
}
