//! Lenient parsing of generated turn payloads.

use saga_rules::EnemyProposal;
use serde_json::{Map, Value};

use super::{Choice, GeneratorError};
use crate::changes::sanitize_enemy_proposal;

/// The structured part of a generated turn, before sanitizing.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeResponse {
    pub narrative: String,
    pub choices: Vec<Choice>,
    /// Raw tier label as generated. Not yet normalized.
    pub consequence_tier: Option<String>,
    /// The raw state-change bag, untouched.
    pub state_changes: Value,
    pub start_combat: Option<EnemyProposal>,
    pub new_world_facts: Value,
}

/// Pull the turn payload out of generated text.
///
/// Code fences are stripped and the outermost `{ ... }` span is parsed.
/// A payload without a non-empty `narrative` or without at least one valid
/// choice is malformed.
pub fn parse_response(text: &str) -> Result<NarrativeResponse, GeneratorError> {
    let object = extract_object(text)?;

    let narrative = object
        .get("narrative")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| GeneratorError::Malformed("missing narrative".to_string()))?
        .to_string();

    let choices: Vec<Choice> = object
        .get("choices")
        .and_then(Value::as_array)
        .map(|raw| raw.iter().filter_map(Choice::from_value).collect())
        .unwrap_or_default();
    if choices.is_empty() {
        return Err(GeneratorError::Malformed("no valid choices".to_string()));
    }

    let start_combat = match object.get("startCombat") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(raw) => {
            let proposal = sanitize_enemy_proposal(raw);
            if proposal.is_none() {
                tracing::warn!("Ignoring unreadable combat start");
            }
            proposal
        }
    };

    Ok(NarrativeResponse {
        narrative,
        choices,
        consequence_tier: object
            .get("consequenceTier")
            .and_then(Value::as_str)
            .map(str::to_string),
        state_changes: object.get("stateChanges").cloned().unwrap_or(Value::Null),
        start_combat,
        new_world_facts: object.get("newWorldFacts").cloned().unwrap_or(Value::Null),
    })
}

/// Plain prose for a death scene. Fences and surrounding whitespace are removed.
pub fn parse_death_narrative(text: &str) -> Result<String, GeneratorError> {
    if let Ok(object) = extract_object(text) {
        if let Some(narrative) = object.get("narrative").and_then(Value::as_str) {
            let narrative = narrative.trim();
            if !narrative.is_empty() {
                return Ok(narrative.to_string());
            }
        }
    }
    let stripped = strip_fences(text);
    let prose = stripped.trim();
    if prose.is_empty() {
        return Err(GeneratorError::Malformed("empty death narrative".to_string()));
    }
    Ok(prose.to_string())
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_object(text: &str) -> Result<Map<String, Value>, GeneratorError> {
    let cleaned = strip_fences(text);
    let (start, end) = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(GeneratorError::Malformed("no JSON object found".to_string())),
    };

    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(GeneratorError::Malformed("payload is not an object".to_string())),
        Err(err) => Err(GeneratorError::Malformed(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FENCED: &str = r#"Here is the next scene:
```json
{
  "narrative": "The goblin lunges from the brush.",
  "choices": [
    { "id": "1", "text": "Strike back", "actionType": "combat", "requiresRoll": true, "stat": "valor", "dc": 13 },
    { "id": "2", "text": "Flee" },
    { "text": "Invalid, no id" }
  ],
  "consequenceTier": "dangerous",
  "stateChanges": { "health": -30 },
  "startCombat": { "enemyId": "goblin", "enemyName": "Goblin", "enemyHpMax": 12 },
  "newWorldFacts": ["Goblins hunt this road"]
}
```"#;

    #[test]
    fn test_parses_fenced_payload() {
        let response = parse_response(FENCED).unwrap();

        assert_eq!(response.narrative, "The goblin lunges from the brush.");
        assert_eq!(response.choices.len(), 2);
        assert_eq!(response.consequence_tier.as_deref(), Some("dangerous"));
        assert_eq!(response.state_changes["health"], -30);
        assert_eq!(response.start_combat.unwrap().enemy_hp_max, Some(12));
        assert!(response.new_world_facts.is_array());
    }

    #[test]
    fn test_requires_narrative_and_choices() {
        assert!(matches!(
            parse_response(r#"{ "choices": [{ "id": "1", "text": "Go" }] }"#),
            Err(GeneratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{ "narrative": "Silence.", "choices": [] }"#),
            Err(GeneratorError::Malformed(_))
        ));
        assert!(matches!(
            parse_response("I cannot continue this story."),
            Err(GeneratorError::Malformed(_))
        ));
    }

    #[test]
    fn test_optional_fields_missing() {
        let response = parse_response(r#"{ "narrative": "Calm.", "choices": [{ "id": "a", "text": "Rest" }] }"#).unwrap();

        assert!(response.consequence_tier.is_none());
        assert!(response.state_changes.is_null());
        assert!(response.start_combat.is_none());
    }

    #[test]
    fn test_loose_combat_start_is_kept() {
        let response = parse_response(
            r#"{ "narrative": "An orc bars the way.", "choices": [{ "id": 1, "text": "Fight" }],
                 "startCombat": { "enemyId": 7, "enemyName": "Orc", "enemyHpMax": "30.0" } }"#,
        )
        .unwrap();

        let encounter = response.start_combat.unwrap().to_encounter().unwrap();
        assert_eq!(encounter.enemy_id, "7");
        assert_eq!(encounter.enemy_hp_max(), 30);
    }

    #[test]
    fn test_death_narrative() {
        assert_eq!(
            parse_death_narrative("```\nYour tale ends here.\n```").unwrap(),
            "Your tale ends here."
        );
        assert_eq!(
            parse_death_narrative(r#"{"narrative": "The light fades."}"#).unwrap(),
            "The light fades."
        );
        assert!(parse_death_narrative("  ").is_err());
    }
}
