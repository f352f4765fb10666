//! Plan executor.
//!
//! Drives each step through PENDING → RUNNING → {COMPLETED, FAILED},
//! one at a time, in plan order. Every step is checked against policy
//! before its handler runs, every adapter call gets a per-call timeout and
//! bounded retry for transport failures, and every attempted step leaves
//! one [`ActionRecord`] in memory whatever its outcome.

use crate::entities::{
    append_constraints, append_properties, class_entity, class_pure, constraint_definition,
    mapping_entity, rename_properties, service_entity,
};
use crate::retry::RetryPolicy;
use guardian_config::AppConfig;
use guardian_core::action::{
    AddConstraints, ApplyChanges, Compile, CreateMapping, CreateModel, CreateWorkspace,
    GenerateService, ImportModel, OpenReview, Publish, RunTests, SearchDepot, TransformSchema,
    UpsertEntities,
};
use guardian_core::{
    Action, ActionRecord, AdapterError, AdapterResult, CompileSource, DepotAdapter, EngineAdapter,
    Entity, Error, Plan, PlanStatus, PolicyViolation, SdlcAdapter, Step, StepError, TestSummary,
};
use guardian_memory::MemoryStore;
use guardian_policy::PolicyEngine;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_PUBLISH_VERSION: &str = "1.0.0";
const LATEST_VERSION: &str = "latest";

/// The three platform services a plan can touch.
#[derive(Clone)]
pub struct Adapters {
    pub engine: Arc<dyn EngineAdapter>,
    pub sdlc: Arc<dyn SdlcAdapter>,
    pub depot: Arc<dyn DepotAdapter>,
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Target project when an action does not name one
    pub project_id: String,
    /// Target workspace when an action does not name one
    pub workspace_id: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Keep going after a failed step
    pub debug: bool,
}

impl ExecutorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            project_id: config.services.project_id.clone(),
            workspace_id: config.services.workspace_id.clone(),
            request_timeout: Duration::from_secs(config.executor.request_timeout_secs),
            retry: RetryPolicy::from_config(&config.executor),
            debug: config.executor.debug,
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Per-run switches supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run every step even after a failure.
    pub debug: bool,
    /// Execute steps flagged `requires_approval`.
    pub approve: bool,
    /// Stop the run when this instant passes.
    pub deadline: Option<Instant>,
}

pub struct PlanExecutor {
    adapters: Adapters,
    policy: Arc<PolicyEngine>,
    memory: MemoryStore,
    settings: ExecutorSettings,
}

impl PlanExecutor {
    pub fn new(
        adapters: Adapters,
        policy: Arc<PolicyEngine>,
        memory: MemoryStore,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            adapters,
            policy,
            memory,
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run a plan's steps in order and return the resulting plan status.
    ///
    /// Stops at the first failure unless debug mode is on. Steps awaiting
    /// approval are skipped (left PENDING) unless `options.approve` is set.
    /// When the deadline passes the current step fails as cancelled and
    /// nothing after it runs, debug mode or not.
    pub async fn run(&self, plan: &mut Plan, options: &RunOptions) -> PlanStatus {
        let debug_mode = options.debug || self.settings.debug;
        let correlation_id = plan.correlation_id.clone();
        info!(
            correlation_id = %correlation_id,
            steps = plan.steps.len(),
            debug = debug_mode,
            "Executing plan"
        );
        plan.executed = true;

        for step in plan.steps.iter_mut() {
            if step.status.is_terminal() {
                continue;
            }
            if step.requires_approval && !options.approve {
                info!(step_id = %step.id, action = step.action.name(), "Step awaiting approval, skipped");
                continue;
            }

            let outcome = self.run_step(step, &correlation_id, options.deadline).await;
            let halt = match &outcome {
                Err(err) if err.is_cancellation() => true,
                Err(_) => !debug_mode,
                Ok(_) => false,
            };
            settle(step, outcome);

            if halt {
                warn!(correlation_id = %correlation_id, step_id = %step.id, "Plan halted");
                break;
            }
        }

        let status = plan.status();
        info!(correlation_id = %correlation_id, status = ?status, "Plan finished");
        status
    }

    async fn run_step(
        &self,
        step: &mut Step,
        correlation_id: &str,
        deadline: Option<Instant>,
    ) -> Result<Value, StepError> {
        if let Err(e) = step.start() {
            return Err(StepError::InvalidParams(e.to_string()));
        }
        debug!(step_id = %step.id, action = step.action.name(), "Step started");

        let Some(deadline) = deadline else {
            return self.execute_action(&step.action, correlation_id, Some(&step.id)).await;
        };

        let attempt = async {
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::timeout_at(
                deadline,
                self.execute_action(&step.action, correlation_id, Some(&step.id)),
            )
            .await
            .ok()
        };

        match attempt.await {
            Some(outcome) => outcome,
            None => {
                let err = StepError::Cancelled("deadline exceeded".into());
                self.record(&step.action, correlation_id, Some(&step.id), &Err(err.clone()))
                    .await;
                Err(err)
            }
        }
    }

    /// Check and run one action, then record the attempt.
    ///
    /// The record is written whether the action succeeded, its handler
    /// failed, or policy blocked it before any adapter call.
    pub async fn execute_action(
        &self,
        action: &Action,
        correlation_id: &str,
        step_id: Option<&str>,
    ) -> Result<Value, StepError> {
        let outcome = match self.policy.check_action(action) {
            Ok(()) => self.dispatch(action).await,
            Err(violation) => {
                warn!(
                    correlation_id,
                    action = action.name(),
                    "Blocked by policy: {}",
                    violation.message
                );
                Err(StepError::Policy(violation))
            }
        };

        self.record(action, correlation_id, step_id, &outcome).await;
        outcome
    }

    /// Run an action given by name with raw JSON parameters.
    ///
    /// Unknown names fail before anything is recorded or called.
    pub async fn execute_named(
        &self,
        name: &str,
        params: Value,
        correlation_id: &str,
    ) -> Result<Value, Error> {
        let action = Action::from_parts(name, params)?;
        Ok(self.execute_action(&action, correlation_id, None).await?)
    }

    async fn record(
        &self,
        action: &Action,
        correlation_id: &str,
        step_id: Option<&str>,
        outcome: &Result<Value, StepError>,
    ) {
        let (result, error) = match outcome {
            Ok(value) => (Some(self.policy.redact_value(value)), None),
            Err(err) => (None, Some(self.policy.redact_pii(&err.to_string()))),
        };
        self.memory
            .add_action(ActionRecord {
                correlation_id: correlation_id.to_string(),
                step_id: step_id.map(str::to_string),
                action: action.name().to_string(),
                params: self.policy.redact_value(&action.params()),
                result,
                error,
                timestamp: chrono::Utc::now(),
            })
            .await;
    }

    // ── Dispatch ───────────────────────────────────────────────────

    async fn dispatch(&self, action: &Action) -> Result<Value, StepError> {
        match action {
            Action::CreateWorkspace(p) => self.create_workspace(p).await,
            Action::CreateModel(p) => self.create_model(p).await,
            Action::CreateMapping(p) => self.create_mapping(p).await,
            Action::Compile(p) => self.compile(p).await,
            Action::GenerateService(p) => self.generate_service(p).await,
            Action::OpenReview(p) => self.open_review(p).await,
            Action::SearchDepot(p) => self.search_depot(p).await,
            Action::ImportModel(p) => self.import_model(p).await,
            Action::UpsertEntities(p) => self.upsert_entities(p).await,
            Action::TransformSchema(p) => self.transform_schema(p).await,
            Action::RunTests(p) => self.run_tests(p).await,
            Action::Publish(p) => self.publish(p).await,
            Action::ApplyChanges(p) => self.apply_changes(p).await,
            Action::AddConstraints(p) => self.add_constraints(p).await,
        }
    }

    /// One adapter call under the per-call timeout, retried with backoff
    /// while the failure is a retryable transport error.
    async fn call<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AdapterResult<T>>,
    {
        let retry = &self.settings.retry;
        let timeout = self.settings.request_timeout;
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(timeout, op()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AdapterError::transport(format!(
                    "{operation} timed out after {}s",
                    timeout.as_secs_f64()
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.should_retry() && attempt < retry.max_attempts => {
                    let delay = retry.backoff(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient adapter failure, retrying: {}",
                        err.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(StepError::Adapter(err)),
            }
        }
    }

    fn target<'a>(
        &'a self,
        project: &'a Option<String>,
        workspace: &'a Option<String>,
    ) -> (&'a str, &'a str) {
        (
            project.as_deref().unwrap_or(&self.settings.project_id),
            workspace.as_deref().unwrap_or(&self.settings.workspace_id),
        )
    }

    fn default_target(&self) -> (&str, &str) {
        (self.settings.project_id.as_str(), self.settings.workspace_id.as_str())
    }

    async fn upsert(&self, project: &str, workspace: &str, entities: &[Entity]) -> Result<(), StepError> {
        self.call("upsert_entities", || {
            self.adapters.sdlc.upsert_entities(project, workspace, entities)
        })
        .await
    }

    /// Fetch one entity from the workspace by path.
    async fn fetch_entity(&self, project: &str, workspace: &str, path: &str) -> Result<Entity, StepError> {
        let entities = self
            .call("get_entities", || self.adapters.sdlc.get_entities(project, workspace))
            .await?;
        entities
            .into_iter()
            .find(|e| e.path == path)
            .ok_or_else(|| StepError::InvalidParams(format!("Model {path} not found")))
    }

    // ── Handlers ───────────────────────────────────────────────────

    async fn create_workspace(&self, p: &CreateWorkspace) -> Result<Value, StepError> {
        let (project, workspace) = self.target(&p.project_id, &p.workspace_id);
        let outcome = self
            .call("create_workspace", || self.adapters.sdlc.create_workspace(project, workspace))
            .await?;
        if !outcome.created {
            debug!(project, workspace, "Workspace already exists");
        }
        Ok(json!({
            "project_id": project,
            "workspace_id": workspace,
            "created": outcome.created,
        }))
    }

    async fn create_model(&self, p: &CreateModel) -> Result<Value, StepError> {
        let (project, workspace) = self.default_target();
        let entity = class_entity(&p.name, p.csv_data.as_deref());
        self.upsert(project, workspace, std::slice::from_ref(&entity)).await?;
        Ok(json!({
            "model": entity.path,
            "pure": class_pure(&p.name, p.csv_data.as_deref()),
        }))
    }

    async fn create_mapping(&self, p: &CreateMapping) -> Result<Value, StepError> {
        let (project, workspace) = self.default_target();
        let entity = mapping_entity(&p.name, p.model.as_deref());
        self.upsert(project, workspace, std::slice::from_ref(&entity)).await?;
        Ok(json!({ "mapping": entity.path }))
    }

    async fn compile(&self, p: &Compile) -> Result<Value, StepError> {
        let (project, workspace) = self.target(&p.project_id, &p.workspace_id);
        let source = CompileSource {
            project_id: project.to_string(),
            workspace_id: workspace.to_string(),
            code: None,
        };
        let outcome = self
            .call("compile", || self.adapters.engine.compile(&source))
            .await?;

        if !self.policy.check_compile_result(&outcome) {
            let detail = outcome
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(StepError::Rejected(format!(
                "compilation status '{}': {detail}",
                outcome.status
            )));
        }
        Ok(json!(outcome))
    }

    async fn generate_service(&self, p: &GenerateService) -> Result<Value, StepError> {
        let (project, workspace) = self.default_target();
        let entity = service_entity(&p.path, p.query.as_deref());
        self.upsert(project, workspace, std::slice::from_ref(&entity)).await?;
        Ok(json!({
            "service": entity.path,
            "pattern": entity.content["pattern"],
        }))
    }

    async fn open_review(&self, p: &OpenReview) -> Result<Value, StepError> {
        let (project, workspace) = self.default_target();
        let description = p.description.as_deref().unwrap_or_default();
        let review = self
            .call("open_review", || {
                self.adapters
                    .sdlc
                    .create_review(project, workspace, &p.title, description)
            })
            .await?;
        Ok(json!({ "review_id": review.id, "url": review.url }))
    }

    async fn search_depot(&self, p: &SearchDepot) -> Result<Value, StepError> {
        let query = p.query.trim();
        if query.is_empty() {
            return Err(StepError::InvalidParams("search_depot requires a query".into()));
        }
        let limit = p.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let results = self
            .call("search_depot", || self.adapters.depot.search(query, limit))
            .await?;
        Ok(json!({ "count": results.len(), "results": results }))
    }

    async fn import_model(&self, p: &ImportModel) -> Result<Value, StepError> {
        let (project, workspace) = self.target(&p.project_id, &p.workspace_id);
        let version = p.version.as_deref().unwrap_or(LATEST_VERSION);

        let mut entities = self
            .call("import_model", || {
                self.adapters.depot.get_entities(&p.depot_project_id, version)
            })
            .await?;
        if !p.entity_paths.is_empty() {
            entities.retain(|e| p.entity_paths.contains(&e.path));
        }

        let max = self.policy.rules().max_entities_per_request;
        if entities.len() > max {
            return Err(PolicyViolation::new(format!(
                "Too many entities: {} > {max}",
                entities.len()
            ))
            .into());
        }

        if !entities.is_empty() {
            self.upsert(project, workspace, &entities).await?;
        }
        let imported: Vec<&str> = entities.iter().map(|e| e.path.as_str()).collect();
        Ok(json!({
            "source": p.depot_project_id,
            "version": version,
            "count": imported.len(),
            "imported": imported,
        }))
    }

    async fn upsert_entities(&self, p: &UpsertEntities) -> Result<Value, StepError> {
        let (project, workspace) = self.target(&p.project_id, &p.workspace_id);
        self.upsert(project, workspace, &p.entities).await?;
        Ok(json!({ "upserted": p.entities.len() }))
    }

    async fn transform_schema(&self, p: &TransformSchema) -> Result<Value, StepError> {
        self.call("transform_schema", || {
            self.adapters
                .engine
                .transform_to_schema(&p.format, &p.class_path)
        })
        .await
    }

    async fn run_tests(&self, p: &RunTests) -> Result<Value, StepError> {
        let results = self
            .call("run_tests", || self.adapters.engine.run_tests(p.path.as_deref()))
            .await?;
        let summary = TestSummary::from_results(results);

        if !self.policy.check_test_result(&summary) {
            let failed = summary.results.iter().filter(|r| !r.passed).count();
            return Err(StepError::Rejected(format!(
                "{failed} of {} tests failed",
                summary.results.len()
            )));
        }
        Ok(json!(summary))
    }

    async fn publish(&self, p: &Publish) -> Result<Value, StepError> {
        let (project, _) = self.default_target();
        let version = p.version.as_deref().unwrap_or(DEFAULT_PUBLISH_VERSION);
        self.call("publish", || self.adapters.depot.publish(project, version))
            .await
    }

    // Model edits fetch the class, change it, and upsert it back.

    async fn apply_changes(&self, p: &ApplyChanges) -> Result<Value, StepError> {
        if p.rename.is_empty() && p.add_fields.is_empty() {
            return Err(StepError::InvalidParams("apply_changes needs rename or add_fields".into()));
        }
        let (project, workspace) = self.default_target();
        let mut entity = self.fetch_entity(project, workspace, &p.model_path).await?;

        let renamed = rename_properties(&mut entity, &p.rename);
        let added = append_properties(&mut entity, &p.add_fields);
        self.upsert(project, workspace, std::slice::from_ref(&entity)).await?;

        info!(model = %p.model_path, renamed, added = added.len(), "Model changes applied");
        Ok(json!({
            "model_path": p.model_path,
            "renamed": renamed,
            "added": added,
        }))
    }

    async fn add_constraints(&self, p: &AddConstraints) -> Result<Value, StepError> {
        let definitions = p
            .constraints
            .iter()
            .map(constraint_definition)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|name| {
                StepError::InvalidParams(format!("Unknown constraint '{name}' needs a body"))
            })?;
        let (project, workspace) = self.default_target();
        let mut entity = self.fetch_entity(project, workspace, &p.model_path).await?;

        let added = append_constraints(&mut entity, definitions);
        if !added.is_empty() {
            self.upsert(project, workspace, std::slice::from_ref(&entity)).await?;
        }
        Ok(json!({
            "model_path": p.model_path,
            "added": added,
        }))
    }
}

/// Move a RUNNING step to its terminal state.
fn settle(step: &mut Step, outcome: Result<Value, StepError>) {
    let transition = match outcome {
        Ok(result) => {
            info!(step_id = %step.id, action = step.action.name(), "Step completed");
            step.complete(result)
        }
        Err(err) => {
            warn!(step_id = %step.id, action = step.action.name(), "Step failed: {err}");
            step.fail(err.to_string())
        }
    };
    if let Err(e) = transition {
        warn!(step_id = %step.id, "{e}");
    }
}
