//! Player choices offered by the narrative.

use saga_rules::{ActionType, DiceCheck, RiskLevel, StatType, DC_MAX, DC_MIN};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DC used when a rolled choice does not name one.
pub const DEFAULT_DC: u32 = 12;

/// An option presented to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub action_type: ActionType,
    #[serde(default)]
    pub requires_roll: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<StatType>,
    #[serde(default = "default_dc")]
    pub dc: u32,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

fn default_dc() -> u32 {
    DEFAULT_DC
}

impl Choice {
    /// A choice with no roll and no risk.
    pub fn safe(id: impl Into<String>, text: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            action_type,
            requires_roll: false,
            stat: None,
            dc: DEFAULT_DC,
            risk_level: RiskLevel::Safe,
        }
    }

    /// The check this choice calls for, if any. A missing stat is picked from
    /// the action type.
    pub fn dice_check(&self) -> Option<DiceCheck> {
        if !self.requires_roll {
            return None;
        }
        let stat = self.stat.unwrap_or_else(|| default_stat(self.action_type));
        Some(DiceCheck::new(stat, self.dc, self.risk_level))
    }

    /// Read a choice from generated JSON. Needs an id and non-empty text;
    /// everything else is optional and clamped.
    pub fn from_value(value: &Value) -> Option<Choice> {
        let object = value.as_object()?;
        let id = match object.get("id")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let text = object.get("text")?.as_str()?.trim();
        if text.is_empty() {
            return None;
        }

        let label = |key: &str| object.get(key).and_then(Value::as_str);
        let dc = object
            .get("dc")
            .and_then(Value::as_f64)
            .filter(|dc| dc.is_finite())
            .map(|dc| dc.round().clamp(DC_MIN as f64, DC_MAX as f64) as u32)
            .unwrap_or(DEFAULT_DC);

        Some(Choice {
            id,
            text: text.to_string(),
            action_type: label("actionType").map(ActionType::from_label).unwrap_or_default(),
            requires_roll: object.get("requiresRoll").and_then(Value::as_bool).unwrap_or(false),
            stat: label("stat").and_then(|s| s.parse().ok()),
            dc,
            risk_level: label("riskLevel").and_then(RiskLevel::from_label).unwrap_or_default(),
        })
    }
}

/// The stat an action leans on when the generator forgets to say.
pub fn default_stat(action_type: ActionType) -> StatType {
    match action_type {
        ActionType::Combat => StatType::Valor,
        ActionType::Social => StatType::Fellowship,
        ActionType::Explore => StatType::Wisdom,
        ActionType::Stealth => StatType::Craft,
        ActionType::Magic => StatType::Lore,
        ActionType::Rest | ActionType::Other => StatType::Endurance,
    }
}

/// The choices offered when a turn falls back.
pub fn fallback_choices() -> Vec<Choice> {
    vec![
        Choice::safe("fallback-look", "Take a careful look around", ActionType::Explore),
        Choice::safe("fallback-wait", "Wait and catch your breath", ActionType::Rest),
        Choice::safe("fallback-retrace", "Retrace your steps", ActionType::Explore),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dc_is_clamped() {
        let high = Choice::from_value(&json!({ "id": "a", "text": "Leap", "dc": 40 })).unwrap();
        let low = Choice::from_value(&json!({ "id": "b", "text": "Step", "dc": 1 })).unwrap();
        let missing = Choice::from_value(&json!({ "id": 3, "text": "Look" })).unwrap();

        assert_eq!(high.dc, DC_MAX);
        assert_eq!(low.dc, DC_MIN);
        assert_eq!(missing.dc, DEFAULT_DC);
        assert_eq!(missing.id, "3");
    }

    #[test]
    fn test_invalid_choices() {
        assert!(Choice::from_value(&json!({ "text": "No id" })).is_none());
        assert!(Choice::from_value(&json!({ "id": "x", "text": "  " })).is_none());
        assert!(Choice::from_value(&json!("Run")).is_none());
    }

    #[test]
    fn test_labels_are_lenient() {
        let choice = Choice::from_value(&json!({
            "id": "c",
            "text": "Charge the gate",
            "actionType": "COMBAT",
            "requiresRoll": true,
            "stat": "Valor",
            "riskLevel": "Dangerous"
        }))
        .unwrap();

        assert_eq!(choice.action_type, ActionType::Combat);
        assert_eq!(choice.stat, Some(StatType::Valor));
        assert_eq!(choice.risk_level, RiskLevel::Dangerous);
    }

    #[test]
    fn test_dice_check() {
        let mut choice = Choice::safe("s", "Slip past the guards", ActionType::Stealth);
        assert!(choice.dice_check().is_none());

        choice.requires_roll = true;
        choice.risk_level = RiskLevel::Lethal;
        let check = choice.dice_check().unwrap();
        assert_eq!(check.stat, StatType::Craft);
        assert_eq!(check.risk, RiskLevel::Lethal);
    }

    #[test]
    fn test_fallback_choices_are_safe() {
        let choices = fallback_choices();
        assert_eq!(choices.len(), 3);
        assert!(choices.iter().all(|c| !c.requires_roll && c.risk_level == RiskLevel::Safe));
    }
}
