//! OpenAI-compatible intent model.
//!
//! Asks a chat-completions endpoint to translate a prompt into a JSON array
//! of `{action, params}` steps. Works with any endpoint exposing
//! `/chat/completions` (OpenAI, OpenRouter, Ollama, vLLM).

use crate::ClientError;
use async_trait::async_trait;
use guardian_core::action::ACTION_NAMES;
use guardian_core::intent::parse_proposal;
use guardian_core::{IntentModel, IntentModelError, RawStep};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct OpenAiIntentModel {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiIntentModel {
    pub fn new(
        model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build {
                service: "intent",
                reason: e.to_string(),
            })?;

        Ok(Self {
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn system_prompt() -> String {
        format!(
            "You translate requests about data models into an ordered plan. \
             Reply with only a JSON array of steps, each {{\"action\": <name>, \"params\": {{...}}}}. \
             Allowed actions: {}. Use PascalCase model names, kebab-case workspace ids, \
             and camelCase service paths. Reply with [] when nothing applies.",
            ACTION_NAMES.join(", ")
        )
    }
}

#[async_trait]
impl IntentModel for OpenAiIntentModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn propose(
        &self,
        prompt: &str,
        context: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<RawStep>, IntentModelError> {
        let user = if context.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt}\n\nContext: {}", serde_json::Value::Object(context.clone()))
        };

        let body = json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": Self::system_prompt()},
                {"role": "user", "content": user},
            ],
        });

        debug!(model = %self.model, "Requesting intent proposal");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| IntentModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IntentModelError::Request(format!("HTTP {}: {text}", status.as_u16())));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| IntentModelError::InvalidResponse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| IntentModelError::InvalidResponse("no choices in response".into()))?;

        parse_proposal(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_action() {
        let prompt = OpenAiIntentModel::system_prompt();
        for name in ACTION_NAMES {
            assert!(prompt.contains(name), "missing {name}");
        }
    }

    #[test]
    fn chat_response_parses() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "[]"}}], "usage": {}}"#,
        )
        .unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let model = OpenAiIntentModel::new("gpt-test", "http://127.0.0.1:1/v1", None, Duration::from_secs(2))
            .unwrap();
        let err = model.propose("create a model", &Default::default()).await.unwrap_err();
        assert!(matches!(err, IntentModelError::Request(_)));
    }
}
