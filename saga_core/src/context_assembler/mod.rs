//! Context Assembler - Builds the prompt for each turn.
//!
//! Context is gathered in a fixed order:
//! 1. **Character**: vitals, derived stats, inventory, companions, effects
//! 2. **Scenario**: premise and tone/combat/stakes directives
//! 3. **Story**: the last few story log entries
//! 4. **State**: active combat, quest progress, location
//! 5. **Memory**: the most recent world facts
//! 6. **Turn**: the player's action, the dice outcome and pacing guidance

mod pacing;

pub use pacing::*;

use saga_rules::{CombatState, DiceRollResult, Quest, Scenario, StoryEntryKind, WorldSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::game_state::GameState;
use crate::narrative::{NarrativeRequest, RequestKind};

/// Instructions sent with every normal turn.
pub const TURN_SYSTEM_PROMPT: &str = "You are the narrator of a text role-playing game. \
Continue the story from the player's action and the dice outcome. \
Reply with one JSON object: {\"narrative\": string, \"choices\": [{\"id\", \"text\", \"actionType\", \
\"requiresRoll\", \"stat\", \"dc\", \"riskLevel\"}], \"consequenceTier\": \"NONE|TRIVIAL|STANDARD|DANGEROUS|LETHAL\", \
\"stateChanges\": object, \"startCombat\": {\"enemyId\", \"enemyName\", \"enemyHpMax\"} or null, \
\"newWorldFacts\": [string]}. Never state damage numbers; describe severity through consequenceTier.";

/// Instructions sent for the final scene after death.
pub const DEATH_SYSTEM_PROMPT: &str = "You are the narrator of a text role-playing game. \
The player's character has died. Write a short, final death scene in prose. \
Offer no choices and no way to continue.";

/// Configuration for context assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Story log entries to include.
    pub recent_entries: usize,

    /// Maximum number of world facts to include.
    pub max_facts: usize,

    /// Action count at which the quest must end.
    pub victory_turn: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ContextConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            recent_entries: config.context_entries,
            max_facts: config.prompt_facts,
            victory_turn: config.victory_turns,
        }
    }
}

/// The context assembler builds prompts from game state.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Assemble the context for the next turn. `action` has not been logged
    /// yet, so the turn number is the logged action count plus one.
    pub fn assemble(
        &self,
        state: &GameState,
        action: &str,
        roll: Option<&DiceRollResult>,
    ) -> AssembledContext {
        let turn = state.action_count() + 1;

        AssembledContext {
            character: self.extract_character_context(state),
            scenario: state.scenario.clone(),
            recent_story: state
                .story
                .recent(self.config.recent_entries)
                .iter()
                .map(|entry| {
                    let label = match entry.kind() {
                        StoryEntryKind::Narration => "Narrator",
                        StoryEntryKind::Action => "Player",
                        StoryEntryKind::DiceRoll => "Dice",
                    };
                    format!("{}: {}", label, entry.text())
                })
                .collect(),
            combat: describe_combat(&state.character.combat),
            quest: state.quest.clone(),
            facts: state
                .memory
                .recent(self.config.max_facts)
                .iter()
                .map(|fact| fact.content.clone())
                .collect(),
            world: state.world.clone(),
            player_action: action.to_string(),
            dice: roll.map(DiceRollResult::summary),
            pacing: PacingGuidance::for_turn(turn, self.config.victory_turn),
        }
    }

    /// A minimal request for the death scene.
    pub fn death_request(&self, state: &GameState, turn_id: Uuid) -> NarrativeRequest {
        let character = &state.character;
        let mut prompt = format!(
            "{} the {} {} has fallen in \"{}\".\n",
            character.name, character.race, character.background, state.scenario.title
        );
        if let Some(last) = state.story.recent(1).first() {
            prompt.push_str(&format!("Last moment: {}\n", last.text()));
        }
        if let Some(encounter) = character.combat.encounter() {
            prompt.push_str(&format!("Slain by: {}\n", encounter.enemy_name));
        }

        NarrativeRequest {
            kind: RequestKind::Death,
            system: DEATH_SYSTEM_PROMPT.to_string(),
            prompt,
            turn_id,
        }
    }

    fn extract_character_context(&self, state: &GameState) -> CharacterContext {
        let character = &state.character;
        CharacterContext {
            name: character.name.clone(),
            race: character.race.clone(),
            background: character.background.clone(),
            level: character.level,
            health: character.health(),
            max_health: character.max_health(),
            gold: character.gold,
            stats: character
                .stats()
                .iter()
                .map(|(stat, value)| format!("{} {}", stat, value))
                .collect(),
            inventory: character
                .inventory
                .items()
                .iter()
                .map(|item| {
                    if item.equipped {
                        format!("{} (equipped)", item.name)
                    } else {
                        item.name.clone()
                    }
                })
                .collect(),
            companions: character
                .companions
                .iter()
                .map(|c| format!("{} (loyalty {})", c.name, c.loyalty))
                .collect(),
            effects: character.effects.iter().map(|e| e.name.clone()).collect(),
        }
    }
}

fn describe_combat(combat: &CombatState) -> Option<String> {
    combat.encounter().map(|encounter| {
        format!(
            "Fighting {} (HP {}/{}), round {}",
            encounter.enemy_name,
            encounter.enemy_hp_current(),
            encounter.enemy_hp_max(),
            encounter.round_count
        )
    })
}

/// The assembled context ready for prompt generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub character: CharacterContext,
    pub scenario: Scenario,
    /// Recent story entries, oldest first.
    pub recent_story: Vec<String>,
    pub combat: Option<String>,
    pub quest: Quest,
    /// Known world facts, oldest first.
    pub facts: Vec<String>,
    pub world: WorldSnapshot,
    pub player_action: String,
    /// Dice summary when the action required a roll.
    pub dice: Option<String>,
    pub pacing: PacingGuidance,
}

impl AssembledContext {
    /// Format the context as a prompt string.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Scenario\n");
        prompt.push_str(&format!("{}: {}\n", self.scenario.title, self.scenario.premise));
        prompt.push_str(&format!(
            "Tone: {}. Combat: {}. Stakes: {}.\n\n",
            self.scenario.tone, self.scenario.combat_frequency, self.scenario.stakes
        ));

        let c = &self.character;
        prompt.push_str("## Character\n");
        prompt.push_str(&format!(
            "{}, level {} {} {}. HP {}/{}, gold {}.\n",
            c.name, c.level, c.race, c.background, c.health, c.max_health, c.gold
        ));
        prompt.push_str(&format!("Stats: {}\n", c.stats.join(", ")));
        if !c.inventory.is_empty() {
            prompt.push_str(&format!("Inventory: {}\n", c.inventory.join(", ")));
        }
        if !c.companions.is_empty() {
            prompt.push_str(&format!("Companions: {}\n", c.companions.join(", ")));
        }
        if !c.effects.is_empty() {
            prompt.push_str(&format!("Effects: {}\n", c.effects.join(", ")));
        }
        prompt.push('\n');

        if let Some(location) = &self.world.location {
            prompt.push_str(&format!("## Location\n{}", location));
            if let Some(time) = &self.world.time_of_day {
                prompt.push_str(&format!(", {}", time));
            }
            prompt.push_str("\n\n");
        }

        if !self.quest.title.is_empty() {
            prompt.push_str("## Quest\n");
            prompt.push_str(&format!("{} ({}% complete)\n", self.quest.title, self.quest.progress));
            for objective in &self.quest.objectives {
                let done = self.quest.completed_objectives.contains(objective);
                prompt.push_str(&format!("- [{}] {}\n", if done { "x" } else { " " }, objective));
            }
            prompt.push('\n');
        }

        if let Some(combat) = &self.combat {
            prompt.push_str(&format!("## Combat\n{}\n\n", combat));
        }

        if !self.facts.is_empty() {
            prompt.push_str("## Known Facts\n");
            for fact in &self.facts {
                prompt.push_str(&format!("- {}\n", fact));
            }
            prompt.push('\n');
        }

        if !self.recent_story.is_empty() {
            prompt.push_str("## Recent Story\n");
            for entry in &self.recent_story {
                prompt.push_str(entry);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("## Player Action\n");
        prompt.push_str(&self.player_action);
        prompt.push('\n');
        if let Some(dice) = &self.dice {
            prompt.push_str(&format!("Dice: {}\n", dice));
        }
        prompt.push('\n');

        prompt.push_str("## Pacing\n");
        prompt.push_str(&self.pacing.to_prompt_line());
        prompt.push('\n');

        prompt
    }

    pub fn to_request(&self, turn_id: Uuid) -> NarrativeRequest {
        NarrativeRequest {
            kind: RequestKind::Turn,
            system: TURN_SYSTEM_PROMPT.to_string(),
            prompt: self.to_prompt_string(),
            turn_id,
        }
    }
}

/// Character context for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterContext {
    pub name: String,
    pub race: String,
    pub background: String,
    pub level: u32,
    pub health: i32,
    pub max_health: i32,
    pub gold: u32,
    pub stats: Vec<String>,
    pub inventory: Vec<String>,
    pub companions: Vec<String>,
    pub effects: Vec<String>,
}
