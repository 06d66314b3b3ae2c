//! The player character.

use serde::{Deserialize, Serialize};

use super::{ActiveEffect, CharacterId, Companion, Inventory, StatType, Stats};
use crate::error::RulesError;
use crate::mechanics::{progression, CombatState};

/// Whether the character may still act. `Dead` is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifeState {
    #[default]
    Alive,
    Dead,
}

/// A player character.
///
/// `health` is private: it is read through [`Character::health`] and changed
/// only through [`Character::apply_health_delta`], which keeps it inside
/// `[0, max_health]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(default)]
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub background: String,

    #[serde(default)]
    pub base_stats: Stats,

    health: i32,
    max_health: i32,

    #[serde(default)]
    pub gold: u32,
    #[serde(default)]
    pub xp: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    /// Level-ups earned but not yet resolved.
    #[serde(default)]
    pub pending_level_ups: u32,

    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub companions: Vec<Companion>,
    #[serde(default)]
    pub effects: Vec<ActiveEffect>,

    #[serde(default)]
    pub combat: CombatState,
    #[serde(default)]
    life: LifeState,
}

fn default_level() -> u32 {
    1
}

impl Character {
    pub const BASE_HEALTH: i32 = 30;
    pub const HEALTH_PER_ENDURANCE: i32 = 2;

    /// Create a level 1 character, validating name and creation stats.
    pub fn create(
        name: impl Into<String>,
        race: impl Into<String>,
        background: impl Into<String>,
        base_stats: Stats,
    ) -> Result<Self, RulesError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RulesError::EmptyName);
        }
        base_stats.validate_creation()?;

        let max_health = Self::BASE_HEALTH + base_stats.endurance * Self::HEALTH_PER_ENDURANCE;
        Ok(Self {
            id: CharacterId::new(),
            name,
            race: race.into(),
            background: background.into(),
            base_stats,
            health: max_health,
            max_health,
            gold: 0,
            xp: 0,
            level: 1,
            pending_level_ups: 0,
            inventory: Inventory::default(),
            companions: Vec::new(),
            effects: Vec::new(),
            combat: CombatState::Idle,
            life: LifeState::Alive,
        })
    }

    /// Override maximum health and heal to full.
    pub fn with_max_health(mut self, max_health: i32) -> Self {
        self.max_health = max_health.max(1);
        self.health = self.max_health;
        self
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    /// Apply a signed change to health, clamped to `[0, max_health]`.
    /// Returns the new health.
    pub fn apply_health_delta(&mut self, delta: i32) -> i32 {
        self.health = self.health.saturating_add(delta).clamp(0, self.max_health);
        self.health
    }

    /// Re-establish the health bounds after deserializing foreign data.
    pub fn normalize_vitals(&mut self) {
        self.max_health = self.max_health.max(1);
        self.health = self.health.clamp(0, self.max_health);
    }

    pub fn life(&self) -> LifeState {
        self.life
    }

    pub fn is_dead(&self) -> bool {
        self.life == LifeState::Dead
    }

    /// Permanently kill the character. Any encounter ends with it.
    pub fn mark_dead(&mut self) {
        self.health = 0;
        self.life = LifeState::Dead;
        self.combat = CombatState::Idle;
    }

    /// Health watch: a character at 0 HP who is not yet dead becomes dead.
    /// Returns true when this call performed the transition.
    pub fn watch_health(&mut self) -> bool {
        if self.health <= 0 && !self.is_dead() {
            self.mark_dead();
            return true;
        }
        false
    }

    /// Effective stats: base + equipped items + active effects, recomputed on
    /// every call.
    pub fn stats(&self) -> Stats {
        let item_mods = self.inventory.equipped().flat_map(|item| item.modifiers.iter());
        let effect_mods = self.effects.iter().flat_map(|effect| effect.modifiers.iter());
        self.base_stats.with_modifiers(item_mods.chain(effect_mods))
    }

    pub fn stat(&self, stat: StatType) -> i32 {
        self.stats().get(stat)
    }

    /// Add gold, never going below zero. Returns the new balance.
    pub fn adjust_gold(&mut self, delta: i64) -> u32 {
        let balance = (self.gold as i64 + delta).clamp(0, u32::MAX as i64);
        self.gold = balance as u32;
        self.gold
    }

    /// Add XP and queue any level-ups it earns. Returns the number newly queued.
    pub fn gain_xp(&mut self, amount: u32) -> u32 {
        self.xp = self.xp.saturating_add(amount);
        let reachable = progression::level_for_xp(self.xp);
        let queued_level = self.level + self.pending_level_ups;
        let earned = reachable.saturating_sub(queued_level);
        self.pending_level_ups += earned;
        earned
    }

    pub fn has_pending_level_up(&self) -> bool {
        self.pending_level_ups > 0
    }

    /// Resolve one queued level-up by raising `stat`. Returns the new level.
    pub fn apply_level_up(&mut self, stat: StatType) -> Result<u32, RulesError> {
        if self.is_dead() {
            return Err(RulesError::CharacterDead);
        }
        if self.pending_level_ups == 0 {
            return Err(RulesError::NoLevelUpPending);
        }
        self.pending_level_ups -= 1;
        self.level += 1;
        *self.base_stats.get_mut(stat) += 1;
        self.max_health += progression::LEVEL_UP_HEALTH;
        self.apply_health_delta(progression::LEVEL_UP_HEALTH);
        Ok(self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Item, ItemType};

    fn hero() -> Character {
        Character::create("Aria", "Elf", "Ranger", Stats::default()).unwrap()
    }

    #[test]
    fn test_new_character() {
        let character = hero();
        assert_eq!(character.name, "Aria");
        assert_eq!(character.level, 1);
        assert_eq!(character.max_health(), 40);
        assert_eq!(character.health(), 40);
        assert!(!character.is_dead());
    }

    #[test]
    fn test_create_validates() {
        assert_eq!(
            Character::create("  ", "Elf", "Ranger", Stats::default()),
            Err(RulesError::EmptyName)
        );
        let weak = Stats {
            endurance: 2,
            ..Default::default()
        };
        assert!(Character::create("Aria", "Elf", "Ranger", weak).is_err());
    }

    #[test]
    fn test_health_is_clamped() {
        let mut character = hero();
        assert_eq!(character.apply_health_delta(-100), 0);
        assert_eq!(character.apply_health_delta(500), 40);
        assert_eq!(character.apply_health_delta(i32::MIN), 0);
    }

    #[test]
    fn test_health_watch_marks_death_once() {
        let mut character = hero();
        character.apply_health_delta(-40);
        assert!(!character.is_dead());

        assert!(character.watch_health());
        assert!(character.is_dead());
        assert!(!character.watch_health());
    }

    #[test]
    fn test_derived_stats() {
        let mut character = hero();
        character
            .inventory
            .try_append(vec![
                Item::new("blade", "Blade", ItemType::Weapon)
                    .with_modifier(StatType::Valor, 2)
                    .equipped(),
                Item::new("tome", "Tome", ItemType::Misc).with_modifier(StatType::Lore, 3),
            ])
            .unwrap();
        character.effects.push(ActiveEffect {
            name: "Inspired".to_string(),
            modifiers: vec![crate::entities::StatModifier {
                stat: StatType::Valor,
                amount: 1,
            }],
            remaining_turns: Some(2),
        });

        assert_eq!(character.stat(StatType::Valor), 8);
        assert_eq!(character.stat(StatType::Lore), 5);
        assert_eq!(character.base_stats.valor, 5);
    }

    #[test]
    fn test_gold_never_negative() {
        let mut character = hero();
        character.adjust_gold(10);
        assert_eq!(character.adjust_gold(-25), 0);
    }

    #[test]
    fn test_level_up_is_queued() {
        let mut character = hero();
        assert_eq!(character.gain_xp(120), 1);
        assert_eq!(character.level, 1);
        assert!(character.has_pending_level_up());

        assert_eq!(character.apply_level_up(StatType::Valor), Ok(2));
        assert_eq!(character.base_stats.valor, 6);
        assert_eq!(character.max_health(), 45);
        assert_eq!(character.apply_level_up(StatType::Valor), Err(RulesError::NoLevelUpPending));
    }

    #[test]
    fn test_xp_does_not_requeue_levels() {
        let mut character = hero();
        assert_eq!(character.gain_xp(100), 1);
        assert_eq!(character.gain_xp(50), 0);
        assert_eq!(character.gain_xp(150), 1);
        assert_eq!(character.pending_level_ups, 2);
    }

    #[test]
    fn test_old_shape_deserializes() {
        let json = r#"{"name":"Old","health":12,"maxHealth":30,"gold":5}"#;
        let character: Character = serde_json::from_str(json).unwrap();

        assert_eq!(character.base_stats, Stats::default());
        assert_eq!(character.combat, CombatState::Idle);
        assert_eq!(character.level, 1);
        assert_eq!(character.health(), 12);
        assert!(!character.is_dead());
    }
}
