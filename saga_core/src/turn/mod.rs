//! Turn Orchestrator - one player action in, one authoritative outcome out.
//!
//! The generator proposes; the rules decide. For every response the
//! orchestrator:
//! 1. **Normalizes** the consequence tier
//! 2. **Computes** damage from it, overriding any generated health change
//! 3. **Sanitizes** the rest of the proposed changes
//! 4. **Resolves** combat, including forced combat after a failed risky check
//! 5. **Merges** everything into the final change set
//!
//! Nothing is applied here. The session commits the outcome.

mod outcome;

pub use outcome::*;

use rand::Rng;
use saga_rules::{
    is_combat_action, CombatInput, CombatResolver, CombatTransition, ConsequenceTier, DamageModel,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::changes::{sanitize, sanitize_facts, QuestProgress};
use crate::config::EngineConfig;
use crate::context_assembler::{ContextAssembler, ContextConfig};
use crate::game_state::GameState;
use crate::narrative::{
    parse_death_narrative, parse_response, GeneratorError, NarrativeGenerator, NarrativeRequest,
    NarrativeResponse, RetryPolicy,
};

/// Drives the generator and applies the rules to what it returns.
pub struct TurnOrchestrator {
    generator: Arc<dyn NarrativeGenerator>,
    damage: DamageModel,
    combat: CombatResolver,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    victory_turns: u32,
    damage_variance: bool,
}

impl TurnOrchestrator {
    pub fn new(generator: Arc<dyn NarrativeGenerator>, config: &EngineConfig) -> Self {
        Self {
            generator,
            damage: DamageModel::from_config(&config.rules),
            combat: CombatResolver::from_config(&config.rules),
            assembler: ContextAssembler::new(ContextConfig::from(config)),
            retry: config.retry_policy(),
            victory_turns: config.victory_turns,
            damage_variance: config.damage_variance,
        }
    }

    pub fn with_defaults(generator: Arc<dyn NarrativeGenerator>) -> Self {
        Self::new(generator, &EngineConfig::default())
    }

    /// Run one turn against a snapshot of the state.
    ///
    /// A character at 0 HP, or the [`DIRECT_DEATH_TRIGGER`] action, goes to
    /// the death scene. Generator failures that survive the retry schedule,
    /// and responses that break a rule such as an unknown tier in strict
    /// mode, produce a fallback outcome rather than an error. Only
    /// cancellation and refused entry conditions are errors.
    pub async fn run_turn<R: Rng + Send>(
        &self,
        state: &GameState,
        ticket: &TurnTicket,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        if state.character.is_dead() {
            return Err(TurnError::CharacterDead);
        }

        if ticket.action.is_death_trigger() || state.character.health() <= 0 {
            return self.run_death(state, ticket, cancel).await;
        }

        if state.character.has_pending_level_up() {
            return Err(TurnError::LevelUpPending);
        }

        let turn = state.action_count() + 1;
        tracing::info!(turn_id = %ticket.turn_id, turn, action = %ticket.action.text, "Turn started");

        let context = self
            .assembler
            .assemble(state, &ticket.action.text, ticket.roll.as_ref());
        let request = context.to_request(ticket.turn_id);
        let request = &request;

        let result = self
            .retry
            .run("turn", cancel, move |_| self.generate_turn(request))
            .await;

        match result {
            Ok(response) => match self.resolve_response(state, ticket, response, rng) {
                Err(TurnError::Rules(error)) => {
                    tracing::error!(turn_id = %ticket.turn_id, error = %error, "Generated turn broke a rule, falling back");
                    Ok(TurnOutcome::fallback(ticket.turn_id, error.to_string(), true))
                }
                resolved => resolved,
            },
            Err(GeneratorError::Cancelled) => Err(TurnError::Cancelled),
            Err(error) => {
                tracing::error!(turn_id = %ticket.turn_id, error = %error, "Turn fell back after generator failure");
                Ok(TurnOutcome::fallback(ticket.turn_id, error.to_string(), true))
            }
        }
    }

    async fn generate_turn(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResponse, GeneratorError> {
        let text = self.generator.generate(request).await?;
        parse_response(&text)
    }

    async fn run_death(
        &self,
        state: &GameState,
        ticket: &TurnTicket,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        tracing::info!(turn_id = %ticket.turn_id, character = %state.character.name, "Death scene requested");

        let request = self.assembler.death_request(state, ticket.turn_id);
        let generator = &self.generator;
        let request = &request;
        let result = self
            .retry
            .run("death", cancel, |_| async move {
                let text = generator.generate(request).await?;
                parse_death_narrative(&text)
            })
            .await;

        let narrative = match result {
            Ok(narrative) => narrative,
            Err(GeneratorError::Cancelled) => return Err(TurnError::Cancelled),
            Err(error) => {
                tracing::warn!(error = %error, "Using the fixed death scene");
                FALLBACK_DEATH_NARRATIVE.to_string()
            }
        };

        Ok(TurnOutcome::death(ticket.turn_id, narrative))
    }

    /// Apply the rules to a parsed response. Pure apart from the rng.
    pub fn resolve_response<R: Rng>(
        &self,
        state: &GameState,
        ticket: &TurnTicket,
        response: NarrativeResponse,
        rng: &mut R,
    ) -> Result<TurnOutcome, TurnError> {
        let character = &state.character;

        let label = response
            .consequence_tier
            .as_deref()
            .map(ConsequenceTier::normalize)
            .unwrap_or_default();
        let tier = self.damage.resolve_tier(&label)?;

        let mut changes = sanitize(&response.state_changes);

        let computed_damage = match tier {
            Some(tier) => {
                let damage = self
                    .damage
                    .roll(tier, character.level, self.damage_variance, rng);
                if changes.health != 0 {
                    tracing::debug!(proposed = changes.health, damage, tier = %tier, "Overriding generated health change");
                }
                changes.health = -(damage.min(i32::MAX as u32) as i32);
                damage
            }
            None => 0,
        };

        changes.world_facts.extend(sanitize_facts(&response.new_world_facts));
        let proposed_update = changes.combat_update.take();

        let resolution = self.combat.resolve(
            CombatInput {
                current: &character.combat,
                level: character.level,
                check: ticket.roll.as_ref(),
                risk: ticket.action.risk(),
                combat_action: is_combat_action(ticket.action.action_type(), &ticket.action.text),
                proposed_start: response.start_combat.as_ref(),
                proposed_update: proposed_update.as_ref(),
            },
            rng,
        );
        changes.combat_update = resolution.to_update();
        changes.xp = changes.xp.saturating_add(resolution.xp_bonus);

        let mut quest_forced_complete = false;
        let turn = state.action_count() + 1;
        if turn >= self.victory_turns && !state.quest.complete {
            let progress = changes.quest_progress.get_or_insert_with(QuestProgress::default);
            if !progress.quest_complete {
                tracing::info!(turn, "Victory backstop completing the quest");
                progress.quest_complete = true;
                quest_forced_complete = true;
            }
        }

        let state_changes = changes.sanitized();
        if matches!(resolution.transition, CombatTransition::Started { forced: true }) {
            tracing::info!(turn_id = %ticket.turn_id, "Failed risky check forced combat");
        }

        Ok(TurnOutcome {
            turn_id: ticket.turn_id,
            kind: TurnKind::Normal,
            narrative: response.narrative,
            choices: response.choices,
            state_changes,
            consequence_tier: tier,
            computed_damage,
            combat: resolution.transition,
            quest_forced_complete,
        })
    }
}
