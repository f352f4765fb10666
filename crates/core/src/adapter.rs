//! Adapter traits — the abstraction over the external platform services.
//!
//! The executor only talks to the outside world through these three traits.
//! Implementations: HTTP clients in `guardian-clients`, in-process mocks in
//! tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Result alias for adapter calls.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// A versioned model element stored in a workspace or published to the depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub path: String,
    pub classifier_path: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// What the engine should compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSource {
    pub project_id: String,
    pub workspace_id: String,
    /// Inline source text; `None` compiles the workspace as stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileIssue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Standardized compilation outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileOutcome {
    pub status: String,
    #[serde(default)]
    pub errors: Vec<CompileIssue>,
    #[serde(default)]
    pub warnings: Vec<CompileIssue>,
}

impl CompileOutcome {
    pub fn success() -> Self {
        Self {
            status: "success".into(),
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            errors: vec![CompileIssue {
                message: message.into(),
                source: None,
            }],
            warnings: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub message: String,
}

/// Aggregate of a test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: bool,
    pub results: Vec<TestCaseResult>,
}

impl TestSummary {
    /// An empty run counts as passed.
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        Self {
            passed: results.iter().all(|r| r.passed),
            results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceOutcome {
    /// `false` when the workspace already existed.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// The model engine: compilation, schema generation, tests.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    async fn compile(&self, source: &CompileSource) -> AdapterResult<CompileOutcome>;

    async fn transform_to_schema(
        &self,
        schema_type: &str,
        class_path: &str,
    ) -> AdapterResult<serde_json::Value>;

    async fn run_tests(&self, path: Option<&str>) -> AdapterResult<Vec<TestCaseResult>>;
}

/// The SDLC service: workspaces, entities, reviews.
#[async_trait]
pub trait SdlcAdapter: Send + Sync {
    /// Must tolerate being called twice for the same id.
    async fn create_workspace(
        &self,
        project_id: &str,
        workspace_id: &str,
    ) -> AdapterResult<WorkspaceOutcome>;

    async fn get_entities(&self, project_id: &str, workspace_id: &str)
        -> AdapterResult<Vec<Entity>>;

    async fn upsert_entities(
        &self,
        project_id: &str,
        workspace_id: &str,
        entities: &[Entity],
    ) -> AdapterResult<()>;

    async fn create_review(
        &self,
        project_id: &str,
        workspace_id: &str,
        title: &str,
        description: &str,
    ) -> AdapterResult<Review>;
}

/// The depot: published artifact search and retrieval.
#[async_trait]
pub trait DepotAdapter: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> AdapterResult<Vec<serde_json::Value>>;

    async fn get_entities(&self, project_id: &str, version: &str) -> AdapterResult<Vec<Entity>>;

    async fn publish(&self, project_id: &str, version: &str) -> AdapterResult<serde_json::Value>;
}
