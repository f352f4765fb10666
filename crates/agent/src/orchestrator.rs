//! The `Agent` facade: compile → (optionally) execute → remember.

use crate::compiler::IntentCompiler;
use crate::executor::{Adapters, ExecutorSettings, PlanExecutor, RunOptions};
use guardian_config::AppConfig;
use guardian_core::{Episode, Error, ErrorEnvelope, IntentModel, Plan, PlanReport, StepRecord};
use guardian_memory::MemoryStore;
use guardian_policy::PolicyEngine;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One caller request.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub prompt: String,
    pub context: Map<String, Value>,
    /// Run the plan, not just compile it.
    pub execute: bool,
    /// Generated when absent.
    pub correlation_id: Option<String>,
    pub options: RunOptions,
}

impl AgentRequest {
    /// A plan-only request.
    pub fn plan(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// A request that compiles and runs.
    pub fn run(prompt: impl Into<String>, options: RunOptions) -> Self {
        Self {
            prompt: prompt.into(),
            execute: true,
            options,
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

pub struct Agent {
    compiler: IntentCompiler,
    executor: PlanExecutor,
    memory: MemoryStore,
    policy: Arc<PolicyEngine>,
    redact_prompts: bool,
}

impl Agent {
    pub fn new(
        compiler: IntentCompiler,
        executor: PlanExecutor,
        memory: MemoryStore,
        policy: Arc<PolicyEngine>,
    ) -> Self {
        Self {
            compiler,
            executor,
            memory,
            policy,
            redact_prompts: true,
        }
    }

    /// Wire an agent from configuration.
    ///
    /// The model, when given, is asked before the rule parser.
    pub fn from_config(
        config: &AppConfig,
        adapters: Adapters,
        memory: MemoryStore,
        model: Option<Arc<dyn IntentModel>>,
    ) -> Result<Self, Error> {
        let policy = PolicyEngine::new(config.policy.clone()).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let policy = Arc::new(policy);

        let mut compiler = IntentCompiler::new(policy.clone());
        if let Some(model) = model {
            compiler = compiler.with_model(model, Duration::from_secs(config.intent.timeout_secs));
        }
        let executor = PlanExecutor::new(
            adapters,
            policy.clone(),
            memory.clone(),
            ExecutorSettings::from_config(config),
        );

        Ok(Self::new(compiler, executor, memory, policy)
            .with_prompt_redaction(config.memory.redact_prompts))
    }

    /// Redact personal data from prompts, context and step params before
    /// they are stored as episodes.
    pub fn with_prompt_redaction(mut self, enabled: bool) -> Self {
        self.redact_prompts = enabled;
        self
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn compiler(&self) -> &IntentCompiler {
        &self.compiler
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    /// Compile the prompt, run it when asked, and record the episode.
    pub async fn handle(&self, request: AgentRequest) -> Result<PlanReport, ErrorEnvelope> {
        let correlation_id = request
            .correlation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self.process(request, &correlation_id).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(correlation_id = %correlation_id, "Request failed: {e}");
                Err(e.into_envelope(correlation_id))
            }
        }
    }

    async fn process(&self, request: AgentRequest, correlation_id: &str) -> Result<PlanReport, Error> {
        info!(correlation_id, execute = request.execute, "Handling request");

        let mut plan = self
            .compiler
            .compile(&request.prompt, &request.context, correlation_id)
            .await;

        if request.execute {
            self.executor.run(&mut plan, &request.options).await;
        }

        let episode = self.episode(&plan, request.context);
        self.memory.add_episode(episode).await;

        Ok(plan.report())
    }

    fn episode(&self, plan: &Plan, context: Map<String, Value>) -> Episode {
        let mut steps: Vec<StepRecord> = plan.steps.iter().map(StepRecord::from).collect();
        if !self.redact_prompts {
            return Episode::new(&plan.correlation_id, &plan.prompt, steps, context);
        }

        for step in &mut steps {
            step.params = self.policy.redact_value(&step.params);
            step.result = step.result.as_ref().map(|r| self.policy.redact_value(r));
            step.error = step.error.as_deref().map(|e| self.policy.redact_pii(e));
        }
        let context = match self.policy.redact_value(&Value::Object(context)) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Episode::new(
            &plan.correlation_id,
            self.policy.redact_pii(&plan.prompt),
            steps,
            context,
        )
    }
}
