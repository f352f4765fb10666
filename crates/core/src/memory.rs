//! Memory records — what the agent remembers about past intents and actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{Step, StepStatus};

/// One compiled intent: the prompt, the plan it produced, and its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,

    #[serde(default)]
    pub correlation_id: String,

    pub prompt: String,

    #[serde(default)]
    pub plan: Vec<StepRecord>,

    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Episode {
    pub fn new(
        correlation_id: impl Into<String>,
        prompt: impl Into<String>,
        plan: Vec<StepRecord>,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            correlation_id: correlation_id.into(),
            prompt: prompt.into(),
            plan,
            context,
            timestamp: Utc::now(),
        }
    }
}

/// A plan step as remembered in an episode.
///
/// Same wire shape as [`Step`], but the action stays untyped so history
/// written by other builds (unknown actions, extra params) still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,

    pub action: String,

    #[serde(default)]
    pub params: serde_json::Value,

    #[serde(default)]
    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_approval: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl From<&Step> for StepRecord {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id.clone(),
            action: step.action.name().to_string(),
            params: step.action.params(),
            status: step.status,
            result: step.result.clone(),
            error: step.error.clone(),
            started_at: step.started_at,
            completed_at: step.completed_at,
            requires_approval: step.requires_approval,
            validation_error: step.validation_error.clone(),
        }
    }
}

/// One executed step: the action, its params, and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(default)]
    pub correlation_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,

    pub action: String,

    #[serde(default)]
    pub params: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}
