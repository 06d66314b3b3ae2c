//! The sanitizing projection.
//!
//! Raw values are parsed field by field into typed candidates, then the typed
//! clamps in [`StateChanges::sanitized`] run over the result. Invalid entries
//! are dropped one at a time; nothing here fails a turn.

use saga_rules::{
    ActiveEffect, CombatUpdate, Companion, EnemyProposal, Item, ItemType, StatModifier, StatType,
    WorldSnapshot,
};
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{CompanionUpdate, QuestProgress, StateChanges};

/// Largest health change accepted in one turn.
pub const HEALTH_DELTA_LIMIT: i32 = 1_000;
/// Largest gold change accepted in one turn.
pub const GOLD_DELTA_LIMIT: i64 = 1_000_000;
/// Largest XP grant accepted in one turn.
pub const XP_LIMIT: u32 = 100_000;
/// Largest stat modifier carried by an item or effect.
pub const MODIFIER_LIMIT: i32 = 5;
/// Longest effect duration, in turns.
pub const EFFECT_TURN_LIMIT: u32 = 100;

/// Project an untrusted JSON bag onto a safe [`StateChanges`]. Unknown keys
/// are ignored; non-objects yield the empty bag.
pub fn sanitize(raw: &Value) -> StateChanges {
    let Some(object) = raw.as_object() else {
        if !raw.is_null() {
            tracing::debug!(kind = value_kind(raw), "State changes were not an object, ignoring");
        }
        return StateChanges::default();
    };

    let changes = StateChanges {
        health: number(object.get("health"))
            .map(|n| n.round().clamp(-(HEALTH_DELTA_LIMIT as f64), HEALTH_DELTA_LIMIT as f64) as i32)
            .unwrap_or(0),
        gold: number(object.get("gold"))
            .map(|n| n.round().clamp(-(GOLD_DELTA_LIMIT as f64), GOLD_DELTA_LIMIT as f64) as i64)
            .unwrap_or(0),
        xp: number(object.get("xp"))
            .map(|n| n.round().clamp(0.0, XP_LIMIT as f64) as u32)
            .unwrap_or(0),
        inventory: parse_list(object.get("inventory"), "inventory", parse_item),
        remove_items: parse_list(object.get("removeItems"), "removeItems", identifier),
        companions: parse_list(object.get("companions"), "companions", parse_companion),
        update_companions: parse_list(
            object
                .get("updateCompanions")
                .or_else(|| object.get("updateCompanships")),
            "updateCompanions",
            parse_companion_update,
        ),
        quest_progress: object.get("questProgress").and_then(parse_quest_progress),
        effects: parse_list(object.get("effects"), "effects", parse_effect),
        combat_update: object.get("combatUpdate").and_then(parse_combat_update),
        world_updates: object.get("worldUpdates").and_then(parse_world_updates),
        world_facts: parse_list(object.get("worldFacts"), "worldFacts", text),
    };

    changes.sanitized()
}

/// Clean up a list of fact strings: trimmed, non-empty, first occurrence kept.
pub fn sanitize_facts(raw: &Value) -> Vec<String> {
    dedupe_facts(parse_list(Some(raw), "newWorldFacts", text))
}

/// Read a combat start proposal. Ids may be numbers and HP may be a float or
/// a numeric string. Returns None only when the value is not an object;
/// whether the HP is usable is decided by [`EnemyProposal::to_encounter`].
pub fn sanitize_enemy_proposal(raw: &Value) -> Option<EnemyProposal> {
    let object = raw.as_object()?;
    Some(EnemyProposal {
        enemy_id: object.get("enemyId").and_then(identifier),
        enemy_name: field_text(object, "enemyName"),
        enemy_hp_max: number(object.get("enemyHpMax"))
            .map(|hp| hp.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64),
    })
}

impl StateChanges {
    /// Apply the typed clamps. Idempotent.
    pub fn sanitized(self) -> Self {
        StateChanges {
            health: self.health.clamp(-HEALTH_DELTA_LIMIT, HEALTH_DELTA_LIMIT),
            gold: self.gold.clamp(-GOLD_DELTA_LIMIT, GOLD_DELTA_LIMIT),
            xp: self.xp.min(XP_LIMIT),
            inventory: self.inventory.into_iter().filter_map(clean_item).collect(),
            remove_items: self
                .remove_items
                .into_iter()
                .filter_map(|id| non_empty(&id))
                .collect(),
            companions: self.companions.into_iter().filter_map(clean_companion).collect(),
            update_companions: self
                .update_companions
                .into_iter()
                .filter_map(clean_companion_update)
                .collect(),
            quest_progress: self.quest_progress.and_then(clean_quest_progress),
            effects: self.effects.into_iter().filter_map(clean_effect).collect(),
            combat_update: self.combat_update.map(CombatUpdate::clamped),
            world_updates: self.world_updates.and_then(clean_world_updates),
            world_facts: dedupe_facts(self.world_facts),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A finite number, accepting numeric strings.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn text(value: &Value) -> Option<String> {
    value.as_str().and_then(non_empty)
}

/// Strings, or numbers rendered as strings.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(text)
}

/// Parse each element of a list, dropping the ones that fail. A lone object
/// is treated as a one-element list.
fn parse_list<T>(value: Option<&Value>, field: &str, parse: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    let elements: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        Some(other) => {
            tracing::debug!(field, kind = value_kind(other), "Expected a list, ignoring");
            return Vec::new();
        }
    };

    let total = elements.len();
    let parsed: Vec<T> = elements.into_iter().filter_map(parse).collect();
    if parsed.len() < total {
        tracing::debug!(field, dropped = total - parsed.len(), "Dropped invalid entries");
    }
    parsed
}

fn parse_modifiers(value: Option<&Value>) -> Vec<StatModifier> {
    parse_list(value, "modifiers", |entry| {
        let object = entry.as_object()?;
        let stat: StatType = object.get("stat")?.as_str()?.parse().ok()?;
        let amount = number(object.get("amount"))?.round();
        Some(StatModifier {
            stat,
            amount: amount.clamp(-(MODIFIER_LIMIT as f64), MODIFIER_LIMIT as f64) as i32,
        })
    })
}

fn parse_item(value: &Value) -> Option<Item> {
    let object = value.as_object()?;
    let id = object.get("id").and_then(identifier)?;
    let name = field_text(object, "name")?;
    let tag = field_text(object, "type")?;

    Some(Item {
        id,
        name,
        item_type: ItemType::from_tag(&tag),
        equipped: flag(object.get("equipped")),
        modifiers: parse_modifiers(object.get("modifiers")),
        description: field_text(object, "description"),
    })
}

fn parse_companion(value: &Value) -> Option<Companion> {
    if let Some(name) = text(value) {
        return Some(Companion::new(name));
    }
    let object = value.as_object()?;
    let mut companion = Companion::new(field_text(object, "name")?);
    if let Some(description) = field_text(object, "description") {
        companion.description = description;
    }
    if let Some(loyalty) = number(object.get("loyalty")) {
        companion.loyalty = loyalty.round().clamp(0.0, Companion::MAX_LOYALTY as f64) as i32;
    }
    Some(companion)
}

fn parse_companion_update(value: &Value) -> Option<CompanionUpdate> {
    let object = value.as_object()?;
    let delta = number(object.get("loyaltyDelta").or_else(|| object.get("loyalty"))).unwrap_or(0.0);
    Some(CompanionUpdate {
        name: field_text(object, "name")?,
        loyalty_delta: delta
            .round()
            .clamp(-(Companion::MAX_LOYALTY as f64), Companion::MAX_LOYALTY as f64) as i32,
        departed: flag(object.get("departed")),
    })
}

fn parse_quest_progress(value: &Value) -> Option<QuestProgress> {
    let object = value.as_object()?;
    Some(QuestProgress {
        objective_completed: field_text(object, "objectiveCompleted"),
        new_objective: field_text(object, "newObjective"),
        progress: number(object.get("progress")).map(|p| p.round().clamp(0.0, 100.0) as u8),
        quest_complete: flag(object.get("questComplete")),
    })
}

fn parse_effect(value: &Value) -> Option<ActiveEffect> {
    let object = value.as_object()?;
    let turns = number(object.get("remainingTurns").or_else(|| object.get("duration")))
        .map(|t| t.round().clamp(1.0, EFFECT_TURN_LIMIT as f64) as u32);
    Some(ActiveEffect {
        name: field_text(object, "name")?,
        modifiers: parse_modifiers(object.get("modifiers")),
        remaining_turns: turns,
    })
}

fn parse_combat_update(value: &Value) -> Option<CombatUpdate> {
    let object = value.as_object()?;
    let count = |key: &str| number(object.get(key)).map(|n| n.round().clamp(0.0, u32::MAX as f64) as u32);
    Some(CombatUpdate {
        is_active: object.get("isActive").and_then(Value::as_bool),
        enemy_id: object.get("enemyId").and_then(identifier),
        enemy_name: field_text(object, "enemyName"),
        enemy_hp_current: count("enemyHpCurrent"),
        enemy_hp_max: count("enemyHpMax"),
        round_count: count("roundCount"),
    })
}

fn parse_world_updates(value: &Value) -> Option<WorldSnapshot> {
    let object = value.as_object()?;
    Some(WorldSnapshot {
        location: field_text(object, "location"),
        time_of_day: field_text(object, "timeOfDay"),
    })
}

fn clean_modifiers(modifiers: Vec<StatModifier>) -> Vec<StatModifier> {
    modifiers
        .into_iter()
        .map(|m| StatModifier {
            stat: m.stat,
            amount: m.amount.clamp(-MODIFIER_LIMIT, MODIFIER_LIMIT),
        })
        .collect()
}

fn clean_item(item: Item) -> Option<Item> {
    Some(Item {
        id: non_empty(&item.id)?,
        name: non_empty(&item.name)?,
        item_type: item.item_type,
        equipped: item.equipped,
        modifiers: clean_modifiers(item.modifiers),
        description: item.description.as_deref().and_then(non_empty),
    })
}

fn clean_companion(companion: Companion) -> Option<Companion> {
    Some(Companion {
        name: non_empty(&companion.name)?,
        description: companion.description.trim().to_string(),
        loyalty: companion.loyalty.clamp(0, Companion::MAX_LOYALTY),
    })
}

fn clean_companion_update(update: CompanionUpdate) -> Option<CompanionUpdate> {
    Some(CompanionUpdate {
        name: non_empty(&update.name)?,
        loyalty_delta: update
            .loyalty_delta
            .clamp(-Companion::MAX_LOYALTY, Companion::MAX_LOYALTY),
        departed: update.departed,
    })
}

fn clean_quest_progress(progress: QuestProgress) -> Option<QuestProgress> {
    let cleaned = QuestProgress {
        objective_completed: progress.objective_completed.as_deref().and_then(non_empty),
        new_objective: progress.new_objective.as_deref().and_then(non_empty),
        progress: progress.progress.map(|p| p.min(100)),
        quest_complete: progress.quest_complete,
    };
    (cleaned != QuestProgress::default()).then_some(cleaned)
}

fn clean_effect(effect: ActiveEffect) -> Option<ActiveEffect> {
    Some(ActiveEffect {
        name: non_empty(&effect.name)?,
        modifiers: clean_modifiers(effect.modifiers),
        remaining_turns: effect.remaining_turns.map(|t| t.clamp(1, EFFECT_TURN_LIMIT)),
    })
}

fn clean_world_updates(snapshot: WorldSnapshot) -> Option<WorldSnapshot> {
    let cleaned = WorldSnapshot {
        location: snapshot.location.as_deref().and_then(non_empty),
        time_of_day: snapshot.time_of_day.as_deref().and_then(non_empty),
    };
    (cleaned != WorldSnapshot::default()).then_some(cleaned)
}

fn dedupe_facts(facts: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    facts
        .into_iter()
        .filter_map(|fact| non_empty(&fact))
        .filter(|fact| seen.insert(crate::memory::fact_key(fact)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_numeric_health_is_no_change() {
        assert_eq!(sanitize(&json!({ "health": "a lot" })).health, 0);
        assert_eq!(sanitize(&json!({ "health": null })).health, 0);
        assert_eq!(sanitize(&json!({})).health, 0);
        assert_eq!(sanitize(&json!({ "health": "-4" })).health, -4);
        assert_eq!(sanitize(&json!({ "health": -3.6 })).health, -4);
    }

    #[test]
    fn test_gold_may_be_negative_xp_may_not() {
        let changes = sanitize(&json!({ "gold": -15, "xp": -40 }));
        assert_eq!(changes.gold, -15);
        assert_eq!(changes.xp, 0);
    }

    #[test]
    fn test_numbers_are_bounded() {
        let changes = sanitize(&json!({ "health": -1e12, "gold": 1e300, "xp": 1e9 }));
        assert_eq!(changes.health, -HEALTH_DELTA_LIMIT);
        assert_eq!(changes.gold, GOLD_DELTA_LIMIT);
        assert_eq!(changes.xp, XP_LIMIT);
    }

    #[test]
    fn test_invalid_items_dropped_individually() {
        let changes = sanitize(&json!({
            "inventory": [
                { "id": "rope", "name": "Rope", "type": "tool" },
                { "name": "Nameless id", "type": "misc" },
                { "id": "gem", "name": "Gem" },
                { "id": 7, "name": "Seven", "type": "relic", "equipped": true },
                "not an item"
            ]
        }));

        assert_eq!(changes.inventory.len(), 2);
        assert_eq!(changes.inventory[0].item_type, ItemType::Tool);
        assert_eq!(changes.inventory[1].id, "7");
        assert_eq!(changes.inventory[1].item_type, ItemType::Misc);
        assert!(changes.inventory[1].equipped);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let changes = sanitize(&json!({ "health": -2, "setLevel": 99, "isDead": true }));
        assert_eq!(
            changes,
            StateChanges {
                health: -2,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(sanitize(&json!("lose 5 hp")).is_empty());
        assert!(sanitize(&json!([1, 2])).is_empty());
        assert!(sanitize(&Value::Null).is_empty());
    }

    #[test]
    fn test_companion_shapes() {
        let changes = sanitize(&json!({
            "companions": ["Bram", { "name": "Isolde", "loyalty": 250 }, { "loyalty": 5 }],
            "updateCompanships": [{ "name": "Bram", "loyaltyDelta": -10, "departed": "true" }]
        }));

        assert_eq!(changes.companions.len(), 2);
        assert_eq!(changes.companions[1].loyalty, 100);
        assert_eq!(changes.update_companions[0].loyalty_delta, -10);
        assert!(changes.update_companions[0].departed);
    }

    #[test]
    fn test_combat_update_is_clamped() {
        let changes = sanitize(&json!({
            "combatUpdate": { "isActive": true, "enemyHpCurrent": 80, "enemyHpMax": 30, "roundCount": -2 }
        }));
        let update = changes.combat_update.unwrap();
        assert_eq!(update.enemy_hp_current, Some(30));
        assert_eq!(update.round_count, Some(0));
    }

    #[test]
    fn test_enemy_proposal_shapes() {
        let numeric_id = sanitize_enemy_proposal(&json!({ "enemyId": 7, "enemyName": "Orc", "enemyHpMax": 30 })).unwrap();
        assert_eq!(numeric_id.enemy_id.as_deref(), Some("7"));
        assert_eq!(numeric_id.to_encounter().unwrap().enemy_hp_max(), 30);

        let float_hp = sanitize_enemy_proposal(&json!({ "enemyId": "orc", "enemyName": "Orc", "enemyHpMax": 30.0 })).unwrap();
        assert_eq!(float_hp.enemy_hp_max, Some(30));

        let string_hp = sanitize_enemy_proposal(&json!({ "enemyId": "orc", "enemyName": "Orc", "enemyHpMax": "30" })).unwrap();
        assert_eq!(string_hp.to_encounter().unwrap().enemy_hp_max(), 30);

        let no_hp = sanitize_enemy_proposal(&json!({ "enemyName": "Orc", "enemyHpMax": "lots" })).unwrap();
        assert!(no_hp.to_encounter().is_none());
        assert!(sanitize_enemy_proposal(&json!("orc")).is_none());
    }

    #[test]
    fn test_facts_are_deduplicated() {
        let changes = sanitize(&json!({
            "worldFacts": ["The bridge is out.", "the bridge is out", "  ", "A storm is coming"]
        }));
        assert_eq!(changes.world_facts, vec!["The bridge is out.", "A storm is coming"]);
    }

    #[test]
    fn test_effect_modifiers_bounded() {
        let changes = sanitize(&json!({
            "effects": [{ "name": "Giant Strength", "duration": 3,
                          "modifiers": [{ "stat": "VALOR", "amount": 40 }, { "stat": "luck", "amount": 1 }] }]
        }));
        let effect = &changes.effects[0];
        assert_eq!(effect.remaining_turns, Some(3));
        assert_eq!(effect.modifiers.len(), 1);
        assert_eq!(effect.modifiers[0].amount, MODIFIER_LIMIT);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let raw = json!({
            "health": "-7.2",
            "gold": 12,
            "xp": -5,
            "inventory": [
                { "id": " torch ", "name": "Torch", "type": "TOOL", "modifiers": [{ "stat": "lore", "amount": 9 }] },
                { "id": "", "name": "Ghost", "type": "misc" }
            ],
            "removeItems": ["rope", 3, ""],
            "companions": [{ "name": "Wren", "loyalty": -20 }],
            "updateCompanions": [{ "name": "Wren", "loyalty": 300 }],
            "questProgress": { "progress": 140, "newObjective": "  Cross the river " },
            "effects": [{ "name": "Poisoned", "remainingTurns": 0 }],
            "combatUpdate": { "isActive": false, "enemyHpCurrent": 3 },
            "worldUpdates": { "location": " Ferry Landing ", "timeOfDay": "" },
            "worldFacts": ["The ferryman lies", "The ferryman lies."],
            "unexpected": { "nested": true }
        });

        let once = sanitize(&raw);
        let twice = sanitize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
        assert_eq!(once.clone().sanitized(), once);
    }
}
