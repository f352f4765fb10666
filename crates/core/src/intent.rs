//! Intent model trait — an optional natural-language collaborator that
//! proposes plan steps for a prompt.
//!
//! Proposals are untyped [`RawStep`]s; the compiler decides whether to
//! trust them.

use async_trait::async_trait;
use thiserror::Error;

use crate::action::RawStep;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentModelError {
    /// The model could not be reached or answered with an error status.
    #[error("intent model request failed: {0}")]
    Request(String),

    /// The model answered but not with a usable step list.
    #[error("intent model returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait IntentModel: Send + Sync {
    /// Model identifier, used in logs.
    fn name(&self) -> &str;

    async fn propose(
        &self,
        prompt: &str,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<RawStep>, IntentModelError>;
}

/// Extract a step list from model output.
///
/// Accepts a bare JSON array, an object with a `steps` array, and either of
/// those wrapped in a fenced code block.
pub fn parse_proposal(text: &str) -> Result<Vec<RawStep>, IntentModelError> {
    let trimmed = strip_code_fence(text.trim());
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| IntentModelError::InvalidResponse(e.to_string()))?;

    let steps = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => map
            .remove("steps")
            .ok_or_else(|| IntentModelError::InvalidResponse("missing 'steps'".into()))?,
        other => {
            return Err(IntentModelError::InvalidResponse(format!(
                "expected a JSON array, got {other}"
            )));
        }
    };

    serde_json::from_value(steps).map_err(|e| IntentModelError::InvalidResponse(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let steps = parse_proposal(r#"[{"action": "compile", "params": {}}]"#).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "compile");
    }

    #[test]
    fn parses_fenced_steps_object() {
        let text = "```json\n{\"steps\": [{\"action\": \"create_model\", \"params\": {\"name\": \"Trade\"}}]}\n```";
        let steps = parse_proposal(text).unwrap();
        assert_eq!(steps[0].params["name"], "Trade");
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            parse_proposal("I would create a model first."),
            Err(IntentModelError::InvalidResponse(_))
        ));
        assert!(parse_proposal("42").is_err());
    }
}
