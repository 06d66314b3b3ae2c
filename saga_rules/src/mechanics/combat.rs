//! Combat state machine.
//!
//! States are `Idle` and `Active(Encounter)`. The resolver computes each
//! turn's transition from the current state, the player's check and whatever
//! the narrative proposed; its own round and HP arithmetic always wins over
//! proposed numbers.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ActionType, ConsequenceTier, DamageModel, DiceRollResult, RiskLevel};
use crate::config::RulesConfig;

/// Name of the enemy synthesized by forced combat.
pub const AMBUSH_ENEMY_NAME: &str = "Ambushing Threat";
pub const AMBUSH_ENEMY_ID: &str = "ambushing-threat";

/// Upper bound accepted for a proposed enemy's HP.
pub const MAX_ENEMY_HP: u32 = 10_000;

const ATTACK_VERBS: &[&str] = &[
    "attack", "strike", "fight", "slash", "stab", "shoot", "charge", "swing", "punch", "kick",
    "hit", "smite", "cleave", "lunge", "parry", "kill", "duel", "shove",
];

const VERB_SUFFIXES: &[&str] = &["", "s", "es", "ed", "d", "ing", "ting"];

/// Current combat state of a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CombatState {
    #[default]
    Idle,
    Active(Encounter),
}

impl CombatState {
    pub fn is_active(&self) -> bool {
        matches!(self, CombatState::Active(_))
    }

    pub fn encounter(&self) -> Option<&Encounter> {
        match self {
            CombatState::Active(encounter) => Some(encounter),
            CombatState::Idle => None,
        }
    }
}

/// A single active enemy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub enemy_id: String,
    pub enemy_name: String,
    enemy_hp_current: u32,
    enemy_hp_max: u32,
    pub round_count: u32,
}

impl Encounter {
    /// Start an encounter at full HP. A non-positive max HP is a data bug and
    /// yields None.
    pub fn new(enemy_id: impl Into<String>, enemy_name: impl Into<String>, enemy_hp_max: u32) -> Option<Self> {
        if enemy_hp_max == 0 {
            return None;
        }
        Some(Self {
            enemy_id: enemy_id.into(),
            enemy_name: enemy_name.into(),
            enemy_hp_current: enemy_hp_max,
            enemy_hp_max,
            round_count: 1,
        })
    }

    pub fn enemy_hp_current(&self) -> u32 {
        self.enemy_hp_current
    }

    pub fn enemy_hp_max(&self) -> u32 {
        self.enemy_hp_max
    }

    /// Set current HP, clamped to `[0, enemy_hp_max]`.
    pub fn set_enemy_hp(&mut self, hp: u32) {
        self.enemy_hp_current = hp.min(self.enemy_hp_max);
    }

    /// Reduce enemy HP, floored at 0. Returns the HP left.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.enemy_hp_current = self.enemy_hp_current.saturating_sub(amount);
        self.enemy_hp_current
    }

    pub fn is_defeated(&self) -> bool {
        self.enemy_hp_current == 0
    }
}

/// An enemy the narrative wants to start a fight with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnemyProposal {
    #[serde(default)]
    pub enemy_id: Option<String>,
    #[serde(default)]
    pub enemy_name: Option<String>,
    #[serde(default)]
    pub enemy_hp_max: Option<i64>,
}

impl EnemyProposal {
    /// Turn the proposal into an encounter, or None if its HP is missing or
    /// not positive.
    pub fn to_encounter(&self) -> Option<Encounter> {
        let hp = self.enemy_hp_max.filter(|hp| *hp > 0)?;
        let hp = hp.min(MAX_ENEMY_HP as i64) as u32;

        let name = self
            .enemy_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown Foe");
        let id = self
            .enemy_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slug(name));

        Encounter::new(id, name, hp)
    }
}

fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Flat combat fields as they travel inside a state-change bag. Every field
/// is optional so a partial proposal can be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CombatUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy_hp_current: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemy_hp_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_count: Option<u32>,
}

impl CombatUpdate {
    /// Keep `enemy_hp_current` within `enemy_hp_max` when both are present.
    pub fn clamped(mut self) -> Self {
        if let (Some(current), Some(max)) = (self.enemy_hp_current, self.enemy_hp_max) {
            self.enemy_hp_current = Some(current.min(max));
        }
        self
    }

    /// Rebuild a state from a full update. Anything that does not describe a
    /// live enemy with positive HP becomes `Idle`.
    pub fn to_state(&self) -> CombatState {
        if self.is_active != Some(true) {
            return CombatState::Idle;
        }
        let max = self.enemy_hp_max.unwrap_or(0);
        let current = self.enemy_hp_current.unwrap_or(max).min(max);
        if current == 0 {
            return CombatState::Idle;
        }
        let name = self.enemy_name.clone().unwrap_or_else(|| "Unknown Foe".to_string());
        let id = self.enemy_id.clone().unwrap_or_else(|| slug(&name));
        match Encounter::new(id, name, max) {
            Some(mut encounter) => {
                encounter.set_enemy_hp(current);
                encounter.round_count = self.round_count.unwrap_or(1);
                CombatState::Active(encounter)
            }
            None => CombatState::Idle,
        }
    }
}

impl From<&CombatState> for CombatUpdate {
    fn from(state: &CombatState) -> Self {
        match state {
            CombatState::Idle => CombatUpdate {
                is_active: Some(false),
                ..Default::default()
            },
            CombatState::Active(encounter) => CombatUpdate {
                is_active: Some(true),
                enemy_id: Some(encounter.enemy_id.clone()),
                enemy_name: Some(encounter.enemy_name.clone()),
                enemy_hp_current: Some(encounter.enemy_hp_current),
                enemy_hp_max: Some(encounter.enemy_hp_max),
                round_count: Some(encounter.round_count),
            },
        }
    }
}

/// Does this action read as an attack?
///
/// An explicit combat action type always counts; otherwise the choice text is
/// scanned for attack verbs.
pub fn is_combat_action(action_type: Option<ActionType>, text: &str) -> bool {
    if action_type == Some(ActionType::Combat) {
        return true;
    }
    text.split(|c: char| !c.is_alphabetic())
        .map(str::to_lowercase)
        .any(|word| ATTACK_VERBS.iter().any(|verb| is_inflection_of(&word, verb)))
}

fn is_inflection_of(word: &str, verb: &str) -> bool {
    let stem = verb.strip_suffix('e').unwrap_or(verb);
    [verb, stem].iter().any(|base| {
        word.strip_prefix(base)
            .is_some_and(|suffix| VERB_SUFFIXES.contains(&suffix))
    })
}

/// Everything the resolver looks at for one turn.
#[derive(Debug, Clone, Copy)]
pub struct CombatInput<'a> {
    pub current: &'a CombatState,
    pub level: u32,
    pub check: Option<&'a DiceRollResult>,
    pub risk: RiskLevel,
    pub combat_action: bool,
    pub proposed_start: Option<&'a EnemyProposal>,
    pub proposed_update: Option<&'a CombatUpdate>,
}

/// What happened to combat this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CombatTransition {
    /// No combat before or after.
    None,
    Started { forced: bool },
    Continued { damage_dealt: u32 },
    /// Enemy reduced to 0 HP.
    Defeated { damage_dealt: u32 },
    /// The narrative ended the encounter without a kill.
    Resolved,
}

/// The resolver's authoritative result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatResolution {
    pub state: CombatState,
    pub xp_bonus: u32,
    pub transition: CombatTransition,
}

impl CombatResolution {
    /// The state as a combat update for the final state-change bag, or None if
    /// combat was never involved this turn.
    pub fn to_update(&self) -> Option<CombatUpdate> {
        match self.transition {
            CombatTransition::None => None,
            _ => Some(CombatUpdate::from(&self.state)),
        }
    }
}

/// Owns every combat transition.
#[derive(Debug, Clone, Copy)]
pub struct CombatResolver {
    damage: DamageModel,
    kill_xp_bonus: u32,
    ambush_base_hp: u32,
    ambush_hp_per_level: u32,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::from_config(&RulesConfig::default())
    }
}

impl CombatResolver {
    pub fn from_config(config: &RulesConfig) -> Self {
        Self {
            damage: DamageModel::from_config(config),
            kill_xp_bonus: config.kill_xp_bonus,
            ambush_base_hp: config.ambush_base_hp,
            ambush_hp_per_level: config.ambush_hp_per_level,
        }
    }

    /// HP of the enemy synthesized by forced combat.
    pub fn ambush_hp(&self, level: u32) -> u32 {
        self.ambush_base_hp
            .saturating_add(level.saturating_mul(self.ambush_hp_per_level))
            .max(1)
    }

    /// Damage a successful player attack deals: STANDARD midpoint plus level bonus.
    pub fn player_attack_damage<R: Rng>(&self, level: u32, rng: &mut R) -> u32 {
        self.damage.roll(ConsequenceTier::Standard, level, false, rng)
    }

    pub fn resolve<R: Rng>(&self, input: CombatInput<'_>, rng: &mut R) -> CombatResolution {
        match input.current {
            CombatState::Idle => self.resolve_idle(input),
            CombatState::Active(encounter) => self.resolve_active(encounter.clone(), input, rng),
        }
    }

    fn resolve_idle(&self, input: CombatInput<'_>) -> CombatResolution {
        if let Some(proposal) = input.proposed_start {
            match proposal.to_encounter() {
                Some(encounter) => {
                    tracing::info!(enemy = %encounter.enemy_name, hp = encounter.enemy_hp_max(), "Combat started");
                    return CombatResolution {
                        state: CombatState::Active(encounter),
                        xp_bonus: 0,
                        transition: CombatTransition::Started { forced: false },
                    };
                }
                None => {
                    tracing::warn!(proposal = ?proposal, "Rejected combat start without positive enemy HP");
                }
            }
        }

        let failed_perilous_check = input.risk.is_perilous() && input.check.is_some_and(|check| !check.success);
        if failed_perilous_check {
            let hp = self.ambush_hp(input.level);
            if let Some(encounter) = Encounter::new(AMBUSH_ENEMY_ID, AMBUSH_ENEMY_NAME, hp) {
                tracing::info!(risk = ?input.risk, hp, "Forced combat after failed check");
                return CombatResolution {
                    state: CombatState::Active(encounter),
                    xp_bonus: 0,
                    transition: CombatTransition::Started { forced: true },
                };
            }
        }

        CombatResolution {
            state: CombatState::Idle,
            xp_bonus: 0,
            transition: CombatTransition::None,
        }
    }

    fn resolve_active<R: Rng>(
        &self,
        mut encounter: Encounter,
        input: CombatInput<'_>,
        rng: &mut R,
    ) -> CombatResolution {
        if input.proposed_start.is_some() {
            tracing::debug!(enemy = %encounter.enemy_name, "Ignoring combat start while an enemy is active");
        }

        encounter.round_count += 1;

        let landed = input.combat_action && input.check.is_some_and(|check| check.success);
        let damage_dealt = if landed {
            let damage = self.player_attack_damage(input.level, rng);
            encounter.take_damage(damage);
            damage
        } else {
            0
        };

        if encounter.is_defeated() {
            tracing::info!(enemy = %encounter.enemy_name, rounds = encounter.round_count, "Enemy defeated");
            return CombatResolution {
                state: CombatState::Idle,
                xp_bonus: self.kill_xp_bonus,
                transition: CombatTransition::Defeated { damage_dealt },
            };
        }

        let narratively_ended = input.proposed_update.and_then(|update| update.is_active) == Some(false);
        if narratively_ended {
            tracing::info!(enemy = %encounter.enemy_name, "Combat resolved by narrative");
            return CombatResolution {
                state: CombatState::Idle,
                xp_bonus: 0,
                transition: CombatTransition::Resolved,
            };
        }

        CombatResolution {
            state: CombatState::Active(encounter),
            xp_bonus: 0,
            transition: CombatTransition::Continued { damage_dealt },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::StatType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn failed() -> DiceRollResult {
        DiceRollResult::from_roll(2, 3, 0, 15, StatType::Valor)
    }

    fn succeeded() -> DiceRollResult {
        DiceRollResult::from_roll(18, 3, 0, 15, StatType::Valor)
    }

    fn idle_input<'a>(current: &'a CombatState, check: Option<&'a DiceRollResult>, risk: RiskLevel) -> CombatInput<'a> {
        CombatInput {
            current,
            level: 3,
            check,
            risk,
            combat_action: false,
            proposed_start: None,
            proposed_update: None,
        }
    }

    fn active(hp: u32) -> CombatState {
        let mut encounter = Encounter::new("wolf", "Dire Wolf", 30).unwrap();
        encounter.set_enemy_hp(hp);
        CombatState::Active(encounter)
    }

    #[test]
    fn test_forced_combat_on_failed_dangerous_check() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let check = failed();

        let result = resolver.resolve(idle_input(&CombatState::Idle, Some(&check), RiskLevel::Dangerous), &mut rng);

        assert_eq!(result.transition, CombatTransition::Started { forced: true });
        let encounter = result.state.encounter().unwrap();
        assert_eq!(encounter.enemy_name, AMBUSH_ENEMY_NAME);
        assert_eq!(encounter.enemy_hp_max(), 20 + 3 * 2);
        assert_eq!(encounter.enemy_hp_current(), encounter.enemy_hp_max());
    }

    #[test]
    fn test_no_forced_combat_when_safe_or_successful() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (fail, pass) = (failed(), succeeded());

        let safe = resolver.resolve(idle_input(&CombatState::Idle, Some(&fail), RiskLevel::Moderate), &mut rng);
        assert_eq!(safe.state, CombatState::Idle);

        let passed = resolver.resolve(idle_input(&CombatState::Idle, Some(&pass), RiskLevel::Lethal), &mut rng);
        assert_eq!(passed.state, CombatState::Idle);

        let unchecked = resolver.resolve(idle_input(&CombatState::Idle, None, RiskLevel::Lethal), &mut rng);
        assert_eq!(unchecked.transition, CombatTransition::None);
    }

    #[test]
    fn test_proposed_start_wins_over_ambush() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let check = failed();
        let proposal = EnemyProposal {
            enemy_id: None,
            enemy_name: Some("Bandit Chief".to_string()),
            enemy_hp_max: Some(35),
        };
        let mut input = idle_input(&CombatState::Idle, Some(&check), RiskLevel::Dangerous);
        input.proposed_start = Some(&proposal);

        let result = resolver.resolve(input, &mut rng);

        assert_eq!(result.transition, CombatTransition::Started { forced: false });
        let encounter = result.state.encounter().unwrap();
        assert_eq!(encounter.enemy_id, "bandit-chief");
        assert_eq!(encounter.enemy_hp_max(), 35);
    }

    #[test]
    fn test_invalid_start_is_ignored() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        for hp in [None, Some(0), Some(-5)] {
            let proposal = EnemyProposal {
                enemy_id: Some("ghost".to_string()),
                enemy_name: Some("Ghost".to_string()),
                enemy_hp_max: hp,
            };
            let mut input = idle_input(&CombatState::Idle, None, RiskLevel::Safe);
            input.proposed_start = Some(&proposal);

            let result = resolver.resolve(input, &mut rng);
            assert_eq!(result.state, CombatState::Idle);
        }
    }

    #[test]
    fn test_invalid_start_still_allows_forced_combat() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let check = failed();
        let proposal = EnemyProposal {
            enemy_hp_max: Some(0),
            ..Default::default()
        };
        let mut input = idle_input(&CombatState::Idle, Some(&check), RiskLevel::Lethal);
        input.proposed_start = Some(&proposal);

        let result = resolver.resolve(input, &mut rng);
        assert_eq!(result.transition, CombatTransition::Started { forced: true });
    }

    #[test]
    fn test_round_increments_and_ai_numbers_ignored() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(30);
        let proposed = CombatUpdate {
            enemy_hp_current: Some(1),
            round_count: Some(99),
            ..Default::default()
        };
        let mut input = idle_input(&current, None, RiskLevel::Moderate);
        input.proposed_update = Some(&proposed);

        let result = resolver.resolve(input, &mut rng);

        let encounter = result.state.encounter().unwrap();
        assert_eq!(encounter.round_count, 2);
        assert_eq!(encounter.enemy_hp_current(), 30);
        assert_eq!(result.transition, CombatTransition::Continued { damage_dealt: 0 });
    }

    #[test]
    fn test_successful_attack_damages_enemy() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(30);
        let check = succeeded();
        let mut input = idle_input(&current, Some(&check), RiskLevel::Moderate);
        input.combat_action = true;

        let result = resolver.resolve(input, &mut rng);

        // STANDARD midpoint 6 + level bonus 2
        assert_eq!(result.state.encounter().unwrap().enemy_hp_current(), 22);
        assert_eq!(result.transition, CombatTransition::Continued { damage_dealt: 8 });
    }

    #[test]
    fn test_failed_attack_deals_nothing() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(30);
        let check = failed();
        let mut input = idle_input(&current, Some(&check), RiskLevel::Moderate);
        input.combat_action = true;

        let result = resolver.resolve(input, &mut rng);
        assert_eq!(result.state.encounter().unwrap().enemy_hp_current(), 30);
    }

    #[test]
    fn test_kill_ends_combat_with_bonus() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(5);
        let check = succeeded();
        let mut input = idle_input(&current, Some(&check), RiskLevel::Moderate);
        input.combat_action = true;

        let result = resolver.resolve(input, &mut rng);

        assert_eq!(result.state, CombatState::Idle);
        assert_eq!(result.xp_bonus, 25);
        assert_eq!(result.transition, CombatTransition::Defeated { damage_dealt: 8 });
        assert_eq!(result.to_update().unwrap().is_active, Some(false));
    }

    #[test]
    fn test_narrative_resolution_ends_without_bonus() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(20);
        let proposed = CombatUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        let mut input = idle_input(&current, None, RiskLevel::Safe);
        input.proposed_update = Some(&proposed);

        let result = resolver.resolve(input, &mut rng);

        assert_eq!(result.state, CombatState::Idle);
        assert_eq!(result.xp_bonus, 0);
        assert_eq!(result.transition, CombatTransition::Resolved);
    }

    #[test]
    fn test_start_ignored_while_active() {
        let resolver = CombatResolver::default();
        let mut rng = StdRng::seed_from_u64(1);
        let current = active(20);
        let proposal = EnemyProposal {
            enemy_name: Some("Second Wolf".to_string()),
            enemy_hp_max: Some(10),
            ..Default::default()
        };
        let mut input = idle_input(&current, None, RiskLevel::Safe);
        input.proposed_start = Some(&proposal);

        let result = resolver.resolve(input, &mut rng);
        assert_eq!(result.state.encounter().unwrap().enemy_name, "Dire Wolf");
    }

    #[test]
    fn test_enemy_hp_never_leaves_bounds() {
        let mut encounter = Encounter::new("x", "X", 10).unwrap();
        encounter.set_enemy_hp(50);
        assert_eq!(encounter.enemy_hp_current(), 10);
        assert_eq!(encounter.take_damage(25), 0);
        assert!(encounter.is_defeated());
        assert!(Encounter::new("x", "X", 0).is_none());
    }

    #[test]
    fn test_attack_heuristic() {
        assert!(is_combat_action(Some(ActionType::Combat), "Wait patiently"));
        assert!(is_combat_action(None, "Strike the goblin with your sword"));
        assert!(is_combat_action(Some(ActionType::Other), "Attacks wildly"));
        assert!(!is_combat_action(None, "Talk to the innkeeper"));
        assert!(!is_combat_action(None, "Hitch a ride on the cart"));
    }

    #[test]
    fn test_update_round_trip_through_state() {
        let state = active(12);
        let update = CombatUpdate::from(&state);
        assert_eq!(update.to_state(), state);

        let dead_enemy = CombatUpdate {
            is_active: Some(true),
            enemy_hp_current: Some(0),
            enemy_hp_max: Some(10),
            ..Default::default()
        };
        assert_eq!(dead_enemy.to_state(), CombatState::Idle);
    }
}
