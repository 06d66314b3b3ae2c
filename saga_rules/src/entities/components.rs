//! Component definitions for characters: stats, items, companions, effects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RulesError;

/// The six attributes every character has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub valor: i32,
    pub wisdom: i32,
    pub fellowship: i32,
    pub craft: i32,
    pub endurance: i32,
    pub lore: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            valor: 5,
            wisdom: 5,
            fellowship: 5,
            craft: 5,
            endurance: 5,
            lore: 5,
        }
    }
}

impl Stats {
    /// Lowest value a stat may take at character creation.
    pub const CREATION_MIN: i32 = 3;
    /// Highest value a stat may take at character creation.
    pub const CREATION_MAX: i32 = 8;

    pub fn get(&self, stat: StatType) -> i32 {
        match stat {
            StatType::Valor => self.valor,
            StatType::Wisdom => self.wisdom,
            StatType::Fellowship => self.fellowship,
            StatType::Craft => self.craft,
            StatType::Endurance => self.endurance,
            StatType::Lore => self.lore,
        }
    }

    pub fn get_mut(&mut self, stat: StatType) -> &mut i32 {
        match stat {
            StatType::Valor => &mut self.valor,
            StatType::Wisdom => &mut self.wisdom,
            StatType::Fellowship => &mut self.fellowship,
            StatType::Craft => &mut self.craft,
            StatType::Endurance => &mut self.endurance,
            StatType::Lore => &mut self.lore,
        }
    }

    /// Apply a list of modifiers, returning the adjusted stats.
    pub fn with_modifiers<'a>(mut self, modifiers: impl IntoIterator<Item = &'a StatModifier>) -> Self {
        for modifier in modifiers {
            *self.get_mut(modifier.stat) += modifier.amount;
        }
        self
    }

    /// Check the creation bounds for every stat.
    pub fn validate_creation(&self) -> Result<(), RulesError> {
        for stat in StatType::ALL {
            let value = self.get(stat);
            if !(Self::CREATION_MIN..=Self::CREATION_MAX).contains(&value) {
                return Err(RulesError::StatOutOfRange {
                    stat,
                    value,
                    min: Self::CREATION_MIN,
                    max: Self::CREATION_MAX,
                });
            }
        }
        Ok(())
    }

    /// Iterate over `(stat, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (StatType, i32)> + '_ {
        StatType::ALL.into_iter().map(move |stat| (stat, self.get(stat)))
    }
}

/// Stat names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Valor,
    Wisdom,
    Fellowship,
    Craft,
    Endurance,
    Lore,
}

impl StatType {
    pub const ALL: [StatType; 6] = [
        StatType::Valor,
        StatType::Wisdom,
        StatType::Fellowship,
        StatType::Craft,
        StatType::Endurance,
        StatType::Lore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatType::Valor => "valor",
            StatType::Wisdom => "wisdom",
            StatType::Fellowship => "fellowship",
            StatType::Craft => "craft",
            StatType::Endurance => "endurance",
            StatType::Lore => "lore",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, since stat names arrive from generated text.
impl FromStr for StatType {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        StatType::ALL
            .into_iter()
            .find(|stat| stat.as_str() == lowered)
            .ok_or_else(|| RulesError::UnknownStat(s.to_string()))
    }
}

/// A signed adjustment to one stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatModifier {
    pub stat: StatType,
    pub amount: i32,
}

/// Item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Weapon,
    Armor,
    Accessory,
    Consumable,
    Tool,
    Quest,
    Misc,
}

impl ItemType {
    /// Map a free-form type tag onto a category. Unrecognized tags become `Misc`.
    pub fn from_tag(tag: &str) -> ItemType {
        match tag.trim().to_ascii_lowercase().as_str() {
            "weapon" => ItemType::Weapon,
            "armor" | "armour" | "shield" => ItemType::Armor,
            "accessory" | "ring" | "amulet" | "trinket" => ItemType::Accessory,
            "consumable" | "potion" | "food" | "scroll" => ItemType::Consumable,
            "tool" => ItemType::Tool,
            "quest" | "key" => ItemType::Quest,
            _ => ItemType::Misc,
        }
    }
}

/// An inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub equipped: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<StatModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type,
            equipped: false,
            modifiers: Vec::new(),
            description: None,
        }
    }

    pub fn with_modifier(mut self, stat: StatType, amount: i32) -> Self {
        self.modifiers.push(StatModifier { stat, amount });
        self
    }

    pub fn equipped(mut self) -> Self {
        self.equipped = true;
        self
    }
}

fn default_capacity() -> usize {
    Inventory::DEFAULT_CAPACITY
}

/// Ordered item list with a hard capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl Inventory {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Free slots left.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    /// Append all items or none of them.
    pub fn try_append(&mut self, items: Vec<Item>) -> Result<(), RulesError> {
        if items.len() > self.available() {
            return Err(RulesError::InventoryFull {
                requested: items.len(),
                available: self.available(),
            });
        }
        self.items.extend(items);
        Ok(())
    }

    /// Remove the first item with the given id.
    pub fn remove(&mut self, id: &str) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Toggle the equipped flag. Returns false if no such item exists.
    pub fn set_equipped(&mut self, id: &str, equipped: bool) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.equipped = equipped;
                true
            }
            None => false,
        }
    }

    pub fn equipped(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| item.equipped)
    }
}

/// A travelling companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Companion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Loyalty from 0 (about to leave) to 100.
    #[serde(default = "Companion::default_loyalty")]
    pub loyalty: i32,
}

impl Companion {
    pub const MAX_LOYALTY: i32 = 100;

    fn default_loyalty() -> i32 {
        50
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            loyalty: Self::default_loyalty(),
        }
    }
}

/// A temporary or permanent effect modifying stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveEffect {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<StatModifier>,
    /// None = permanent effect.
    #[serde(default)]
    pub remaining_turns: Option<u32>,
}

impl ActiveEffect {
    /// Count down one turn. Returns whether the effect is still active.
    pub fn tick(&mut self) -> bool {
        match self.remaining_turns.as_mut() {
            Some(turns) => {
                *turns = turns.saturating_sub(1);
                *turns > 0
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn potion(id: &str) -> Item {
        Item::new(id, "Potion", ItemType::Consumable)
    }

    #[test]
    fn test_stat_lookup() {
        let stats = Stats {
            valor: 8,
            lore: 3,
            ..Default::default()
        };

        assert_eq!(stats.get(StatType::Valor), 8);
        assert_eq!(stats.get(StatType::Lore), 3);
        assert_eq!(stats.get(StatType::Craft), 5);
    }

    #[test]
    fn test_creation_bounds() {
        assert!(Stats::default().validate_creation().is_ok());

        let too_strong = Stats {
            valor: 9,
            ..Default::default()
        };
        assert!(matches!(
            too_strong.validate_creation(),
            Err(RulesError::StatOutOfRange { stat: StatType::Valor, value: 9, .. })
        ));
    }

    #[test]
    fn test_stat_parse_is_case_insensitive() {
        assert_eq!(" Valor ".parse::<StatType>().unwrap(), StatType::Valor);
        assert_eq!("LORE".parse::<StatType>().unwrap(), StatType::Lore);
        assert!("charisma".parse::<StatType>().is_err());
    }

    #[test]
    fn test_item_type_tags() {
        assert_eq!(ItemType::from_tag("Weapon"), ItemType::Weapon);
        assert_eq!(ItemType::from_tag("potion"), ItemType::Consumable);
        assert_eq!(ItemType::from_tag("relic"), ItemType::Misc);
    }

    #[test]
    fn test_inventory_append_is_atomic() {
        let mut inventory = Inventory::with_capacity(3);
        inventory.try_append(vec![potion("a"), potion("b")]).unwrap();

        let result = inventory.try_append(vec![potion("c"), potion("d")]);

        assert_eq!(
            result,
            Err(RulesError::InventoryFull {
                requested: 2,
                available: 1
            })
        );
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn test_inventory_remove_and_equip() {
        let mut inventory = Inventory::default();
        inventory
            .try_append(vec![Item::new("sword", "Sword", ItemType::Weapon), potion("p")])
            .unwrap();

        assert!(inventory.set_equipped("sword", true));
        assert!(!inventory.set_equipped("missing", true));
        assert_eq!(inventory.equipped().count(), 1);

        assert_eq!(inventory.remove("p").map(|i| i.name), Some("Potion".to_string()));
        assert!(inventory.remove("p").is_none());
    }

    #[test]
    fn test_effect_tick() {
        let mut effect = ActiveEffect {
            name: "Blessed".to_string(),
            modifiers: vec![],
            remaining_turns: Some(2),
        };
        assert!(effect.tick());
        assert!(!effect.tick());

        let mut permanent = ActiveEffect {
            remaining_turns: None,
            ..effect
        };
        assert!(permanent.tick());
    }
}
