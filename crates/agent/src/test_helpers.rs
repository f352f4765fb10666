//! Shared test helpers: in-process adapters and intent models.

use async_trait::async_trait;
use guardian_core::{
    AdapterError, AdapterResult, CompileOutcome, CompileSource, DepotAdapter, EngineAdapter,
    Entity, IntentModel, IntentModelError, RawStep, Review, SdlcAdapter, TestCaseResult,
    WorkspaceOutcome,
};
use serde_json::{Map, Value, json};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::executor::Adapters;

/// Every adapter call, as `"service.method"`, across all mocks sharing it.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: &str) {
        self.0.lock().unwrap().push(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Errors returned, in order, before a mock answers normally.
#[derive(Default)]
struct Failures(Mutex<VecDeque<AdapterError>>);

impl Failures {
    fn next(&self) -> AdapterResult<()> {
        match self.0.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn push(&self, err: AdapterError) {
        self.0.lock().unwrap().push_back(err);
    }
}

// ── Engine ────────────────────────────────────────────────────────────────

pub struct MockEngine {
    log: CallLog,
    failures: Failures,
    compile_outcome: Mutex<CompileOutcome>,
    test_results: Mutex<Vec<TestCaseResult>>,
    delay: Mutex<Option<Duration>>,
}

impl MockEngine {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
            compile_outcome: Mutex::new(CompileOutcome::success()),
            test_results: Mutex::new(vec![TestCaseResult {
                name: "model::TradeTest".into(),
                passed: true,
                message: String::new(),
            }]),
            delay: Mutex::new(None),
        }
    }

    pub fn set_compile_outcome(&self, outcome: CompileOutcome) {
        *self.compile_outcome.lock().unwrap() = outcome;
    }

    pub fn set_test_results(&self, results: Vec<TestCaseResult>) {
        *self.test_results.lock().unwrap() = results;
    }

    /// Make every call sleep first (use with paused time).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next(&self, err: AdapterError) {
        self.failures.push(err);
    }

    async fn enter(&self, call: &str) -> AdapterResult<()> {
        self.log.push(call);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.failures.next()
    }
}

#[async_trait]
impl EngineAdapter for MockEngine {
    async fn compile(&self, _source: &CompileSource) -> AdapterResult<CompileOutcome> {
        self.enter("engine.compile").await?;
        Ok(self.compile_outcome.lock().unwrap().clone())
    }

    async fn transform_to_schema(&self, schema_type: &str, class_path: &str) -> AdapterResult<Value> {
        self.enter("engine.transform_to_schema").await?;
        Ok(json!({"type": schema_type, "class": class_path, "schema": {}}))
    }

    async fn run_tests(&self, _path: Option<&str>) -> AdapterResult<Vec<TestCaseResult>> {
        self.enter("engine.run_tests").await?;
        Ok(self.test_results.lock().unwrap().clone())
    }
}

// ── SDLC ──────────────────────────────────────────────────────────────────

pub struct MockSdlc {
    log: CallLog,
    failures: Failures,
    workspaces: Mutex<HashSet<(String, String)>>,
    entities: Mutex<Vec<Entity>>,
}

impl MockSdlc {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
            workspaces: Mutex::new(HashSet::new()),
            entities: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next(&self, err: AdapterError) {
        self.failures.push(err);
    }

    /// The workspace contents, in first-upsert order.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.lock().unwrap().clone()
    }
}

#[async_trait]
impl SdlcAdapter for MockSdlc {
    async fn create_workspace(&self, project_id: &str, workspace_id: &str) -> AdapterResult<WorkspaceOutcome> {
        self.log.push("sdlc.create_workspace");
        self.failures.next()?;
        let created = self
            .workspaces
            .lock()
            .unwrap()
            .insert((project_id.to_string(), workspace_id.to_string()));
        Ok(WorkspaceOutcome { created })
    }

    async fn get_entities(&self, _project_id: &str, _workspace_id: &str) -> AdapterResult<Vec<Entity>> {
        self.log.push("sdlc.get_entities");
        self.failures.next()?;
        Ok(self.entities())
    }

    async fn upsert_entities(&self, _project_id: &str, _workspace_id: &str, entities: &[Entity]) -> AdapterResult<()> {
        self.log.push("sdlc.upsert_entities");
        self.failures.next()?;
        let mut stored = self.entities.lock().unwrap();
        for entity in entities {
            match stored.iter_mut().find(|e| e.path == entity.path) {
                Some(existing) => *existing = entity.clone(),
                None => stored.push(entity.clone()),
            }
        }
        Ok(())
    }

    async fn create_review(
        &self,
        project_id: &str,
        workspace_id: &str,
        _title: &str,
        _description: &str,
    ) -> AdapterResult<Review> {
        self.log.push("sdlc.create_review");
        self.failures.next()?;
        Ok(Review {
            id: "42".into(),
            url: format!("http://sdlc.test/{project_id}/{workspace_id}/reviews/42"),
        })
    }
}

// ── Depot ─────────────────────────────────────────────────────────────────

pub struct MockDepot {
    log: CallLog,
    failures: Failures,
    entities: Mutex<Vec<Entity>>,
}

impl MockDepot {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
            entities: Mutex::new(Vec::new()),
        }
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        *self.entities.lock().unwrap() = entities;
    }

    pub fn fail_next(&self, err: AdapterError) {
        self.failures.push(err);
    }
}

#[async_trait]
impl DepotAdapter for MockDepot {
    async fn search(&self, query: &str, limit: usize) -> AdapterResult<Vec<Value>> {
        self.log.push("depot.search");
        self.failures.next()?;
        Ok((0..limit.min(3))
            .map(|i| json!({"groupId": "org.finos", "artifactId": format!("{query}-{i}")}))
            .collect())
    }

    async fn get_entities(&self, _project_id: &str, _version: &str) -> AdapterResult<Vec<Entity>> {
        self.log.push("depot.get_entities");
        self.failures.next()?;
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn publish(&self, project_id: &str, version: &str) -> AdapterResult<Value> {
        self.log.push("depot.publish");
        self.failures.next()?;
        Ok(json!({"project": project_id, "version": version}))
    }
}

/// Three mocks sharing one call log.
pub struct MockServices {
    pub log: CallLog,
    pub engine: Arc<MockEngine>,
    pub sdlc: Arc<MockSdlc>,
    pub depot: Arc<MockDepot>,
}

impl MockServices {
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            engine: Arc::new(MockEngine::new(log.clone())),
            sdlc: Arc::new(MockSdlc::new(log.clone())),
            depot: Arc::new(MockDepot::new(log.clone())),
            log,
        }
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            engine: self.engine.clone(),
            sdlc: self.sdlc.clone(),
            depot: self.depot.clone(),
        }
    }
}

// ── Intent model ──────────────────────────────────────────────────────────

/// Returns the same proposal (or error) on every call.
pub struct ScriptedIntentModel {
    reply: Result<Vec<RawStep>, IntentModelError>,
    delay: Option<Duration>,
    call_count: Mutex<usize>,
}

impl ScriptedIntentModel {
    pub fn steps(steps: Vec<RawStep>) -> Self {
        Self {
            reply: Ok(steps),
            delay: None,
            call_count: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(IntentModelError::Request(message.to_string())),
            delay: None,
            call_count: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl IntentModel for ScriptedIntentModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn propose(&self, _prompt: &str, _context: &Map<String, Value>) -> Result<Vec<RawStep>, IntentModelError> {
        *self.call_count.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}
