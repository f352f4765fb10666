//! Intent compiler: prompt + context → validated plan.
//!
//! When an [`IntentModel`] is attached it is asked first, under a timeout.
//! Any model failure (error, timeout, empty or malformed proposal) falls
//! back to the deterministic [`RuleSet`]. Either way the steps pass through
//! [`PolicyEngine::validate_plan`] before the plan is returned.

use crate::rules::{PromptView, RuleSet};
use guardian_core::{Action, ActionError, IntentModel, IntentModelError, Plan, Step};
use guardian_policy::PolicyEngine;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(20);

/// Why the intent model's proposal was not used.
#[derive(Debug, Error)]
enum CompileFallbackError {
    #[error("no intent model configured")]
    NoModel,

    #[error(transparent)]
    Model(#[from] IntentModelError),

    #[error("intent model timed out after {0:?}")]
    Timeout(Duration),

    #[error("proposal contains an invalid step: {0}")]
    InvalidStep(#[from] ActionError),

    #[error("intent model proposed no steps")]
    Empty,
}

pub struct IntentCompiler {
    policy: Arc<PolicyEngine>,
    rules: RuleSet,
    model: Option<Arc<dyn IntentModel>>,
    model_timeout: Duration,
}

impl IntentCompiler {
    pub fn new(policy: Arc<PolicyEngine>) -> Self {
        Self {
            policy,
            rules: RuleSet::default(),
            model: None,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    /// Replace the rule table used when no model proposal is available.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Ask this model first; rules remain the fallback.
    pub fn with_model(mut self, model: Arc<dyn IntentModel>, timeout: Duration) -> Self {
        self.model = Some(model);
        self.model_timeout = timeout;
        self
    }

    /// Translate a prompt into policy-validated steps.
    ///
    /// An empty or whitespace-only prompt yields no steps. Never fails:
    /// a prompt nothing understands simply produces an empty list.
    pub async fn parse(&self, prompt: &str, context: &Map<String, Value>) -> Vec<Step> {
        if prompt.trim().is_empty() {
            return Vec::new();
        }

        let actions = match self.propose(prompt, context).await {
            Ok(actions) => actions,
            Err(CompileFallbackError::NoModel) => self.apply_rules(prompt, context),
            Err(reason) => {
                warn!(%reason, "Falling back to rule parser");
                self.apply_rules(prompt, context)
            }
        };

        let steps = self.policy.validate_plan(Step::sequence(actions));
        debug!(steps = steps.len(), "Intent compiled");
        steps
    }

    /// Compile a prompt into a [`Plan`] tagged with `correlation_id`.
    pub async fn compile(
        &self,
        prompt: &str,
        context: &Map<String, Value>,
        correlation_id: &str,
    ) -> Plan {
        let steps = self.parse(prompt, context).await;
        info!(
            correlation_id,
            steps = steps.len(),
            actions = ?steps.iter().map(|s| s.action.name()).collect::<Vec<_>>(),
            "Plan compiled"
        );
        Plan::new(correlation_id, prompt, steps)
    }

    fn apply_rules(&self, prompt: &str, context: &Map<String, Value>) -> Vec<Action> {
        self.rules.apply(&PromptView::new(prompt, context))
    }

    async fn propose(
        &self,
        prompt: &str,
        context: &Map<String, Value>,
    ) -> Result<Vec<Action>, CompileFallbackError> {
        let model = self.model.as_ref().ok_or(CompileFallbackError::NoModel)?;

        let raw = tokio::time::timeout(self.model_timeout, model.propose(prompt, context))
            .await
            .map_err(|_| CompileFallbackError::Timeout(self.model_timeout))??;

        if raw.is_empty() {
            return Err(CompileFallbackError::Empty);
        }

        let actions = raw
            .into_iter()
            .map(Action::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(model = model.name(), steps = actions.len(), "Using intent model proposal");
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedIntentModel;
    use guardian_config::PolicyConfig;
    use guardian_core::RawStep;
    use guardian_core::action::{Compile, CreateModel};
    use serde_json::json;

    fn policy(config: PolicyConfig) -> Arc<PolicyEngine> {
        Arc::new(PolicyEngine::new(config).unwrap())
    }

    fn compiler() -> IntentCompiler {
        IntentCompiler::new(policy(PolicyConfig::default()))
    }

    fn names(steps: &[Step]) -> Vec<&'static str> {
        steps.iter().map(|s| s.action.name()).collect()
    }

    #[tokio::test]
    async fn rule_fallback_builds_sequential_steps() {
        let steps = compiler()
            .parse("create a trade model then compile", &Map::new())
            .await;
        assert_eq!(names(&steps), vec!["create_model", "compile"]);
        assert_eq!(steps[0].id, "step-1");
        assert_eq!(steps[1].id, "step-2");
        assert_eq!(steps[0].action, Action::CreateModel(CreateModel::named("Trade")));
        assert!(steps.iter().all(|s| s.validation_error.is_none()));
    }

    #[tokio::test]
    async fn empty_prompt_yields_empty_plan() {
        let model = Arc::new(ScriptedIntentModel::steps(vec![RawStep::new("compile", json!({}))]));
        let compiler = compiler().with_model(model.clone(), Duration::from_secs(1));
        assert!(compiler.parse("", &Map::new()).await.is_empty());
        assert!(compiler.parse("  \n", &Map::new()).await.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn model_proposal_takes_precedence() {
        let model = Arc::new(ScriptedIntentModel::steps(vec![
            RawStep::new("create_model", json!({"name": "Position"})),
            RawStep::new("compile", json!({})),
        ]));
        let steps = compiler()
            .with_model(model.clone(), Duration::from_secs(1))
            .parse("create a trade model", &Map::new())
            .await;
        assert_eq!(steps[0].action, Action::CreateModel(CreateModel::named("Position")));
        assert_eq!(steps[1].action, Action::Compile(Compile::default()));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn model_failure_falls_back_to_rules() {
        let failing = Arc::new(ScriptedIntentModel::failing("rate limited"));
        let steps = compiler()
            .with_model(failing, Duration::from_secs(1))
            .parse("create a trade model then compile", &Map::new())
            .await;
        assert_eq!(names(&steps), vec!["create_model", "compile"]);

        let unknown = Arc::new(ScriptedIntentModel::steps(vec![RawStep::new(
            "drop_database",
            json!({}),
        )]));
        let steps = compiler()
            .with_model(unknown, Duration::from_secs(1))
            .parse("compile", &Map::new())
            .await;
        assert_eq!(names(&steps), vec!["compile"]);

        let empty = Arc::new(ScriptedIntentModel::steps(vec![]));
        let steps = compiler()
            .with_model(empty, Duration::from_secs(1))
            .parse("compile", &Map::new())
            .await;
        assert_eq!(names(&steps), vec!["compile"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out_into_rules() {
        let slow = Arc::new(
            ScriptedIntentModel::steps(vec![RawStep::new("publish", json!({}))])
                .with_delay(Duration::from_secs(60)),
        );
        let steps = compiler()
            .with_model(slow, Duration::from_secs(5))
            .parse("compile", &Map::new())
            .await;
        assert_eq!(names(&steps), vec!["compile"]);
    }

    #[tokio::test]
    async fn prohibited_steps_are_dropped_and_violations_annotated() {
        let config = PolicyConfig {
            prohibited_actions: vec!["compile".into()],
            ..PolicyConfig::default()
        };
        let steps = IntentCompiler::new(policy(config))
            .parse("create a model trade then compile and publish", &Map::new())
            .await;

        assert_eq!(names(&steps), vec!["create_model", "publish"]);
        assert!(steps[1].requires_approval);
        // Lowercase "trade" comes after "model" but is not capitalised, so the
        // name falls back to the word before, which is filler.
        assert_eq!(steps[0].action, Action::CreateModel(CreateModel::named("Model")));

        let mut context = Map::new();
        context.insert("model_name".into(), json!("bad_name"));
        let steps = compiler().parse("create a model", &context).await;
        assert_eq!(
            steps[0].validation_error.as_deref(),
            Some("Model name 'bad_name' violates naming policy")
        );
    }

    #[tokio::test]
    async fn compile_tags_plan_with_correlation_id() {
        let plan = compiler().compile("run the tests", &Map::new(), "corr-7").await;
        assert_eq!(plan.correlation_id, "corr-7");
        assert_eq!(plan.prompt, "run the tests");
        assert_eq!(names(&plan.steps), vec!["run_tests"]);
        assert!(!plan.executed);
    }
}
