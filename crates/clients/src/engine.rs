//! Engine client: compilation, schema generation, test runs.

use crate::ClientError;
use crate::http::HttpService;
use async_trait::async_trait;
use guardian_core::{
    AdapterError, AdapterResult, CompileOutcome, CompileSource, EngineAdapter, TestCaseResult,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub struct EngineClient {
    http: HttpService,
}

impl EngineClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpService::new("engine", base_url, token, timeout)?,
        })
    }
}

/// Read a compile response body.
///
/// Bodies without a `status` field count as success, since the engine
/// only reports one when something went wrong.
fn compile_outcome(body: Value) -> AdapterResult<CompileOutcome> {
    if body.get("status").is_none() {
        return Ok(CompileOutcome::success());
    }
    serde_json::from_value(body)
        .map_err(|e| AdapterError::service(format!("engine: unreadable compile result: {e}")))
}

/// Test results arrive either as a bare array or under `results`.
fn test_results(body: Value) -> AdapterResult<Vec<TestCaseResult>> {
    let list = match body {
        Value::Array(_) => body,
        Value::Object(mut map) => map.remove("results").unwrap_or(Value::Array(vec![])),
        _ => Value::Array(vec![]),
    };
    serde_json::from_value(list)
        .map_err(|e| AdapterError::service(format!("engine: unreadable test results: {e}")))
}

#[async_trait]
impl EngineAdapter for EngineClient {
    async fn compile(&self, source: &CompileSource) -> AdapterResult<CompileOutcome> {
        debug!(project = %source.project_id, workspace = %source.workspace_id, "Compiling");
        let request = self
            .http
            .post("/api/pure/v1/compilation/compile")
            .query(&[
                ("projectId", source.project_id.as_str()),
                ("workspaceId", source.workspace_id.as_str()),
            ])
            .body(source.code.clone().unwrap_or_default());

        let response = self.http.execute(request).await?;
        let status = response.status();

        // A client error here is a compilation failure the gate should see,
        // not a service failure.
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Ok(CompileOutcome::error(body));
        }

        let response = self.http.check(response).await?;
        let body: Value = response.json().await.unwrap_or(Value::Null);
        compile_outcome(body)
    }

    async fn transform_to_schema(&self, schema_type: &str, class_path: &str) -> AdapterResult<Value> {
        let request = self
            .http
            .post("/api/pure/v1/schema/generation")
            .json(&json!({"class": class_path, "type": schema_type}));
        self.http.send_json(request).await
    }

    async fn run_tests(&self, path: Option<&str>) -> AdapterResult<Vec<TestCaseResult>> {
        let request = self
            .http
            .post("/api/pure/v1/test/run")
            .json(&json!({"path": path}));
        let body: Value = self.http.send_json(request).await?;
        test_results(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statusless_compile_body_is_success() {
        assert_eq!(compile_outcome(json!({})).unwrap(), CompileOutcome::success());
        assert_eq!(compile_outcome(Value::Null).unwrap(), CompileOutcome::success());
    }

    #[test]
    fn compile_error_body_is_preserved() {
        let outcome = compile_outcome(json!({
            "status": "error",
            "errors": [{"message": "Can't find type 'Strin'"}]
        }))
        .unwrap();
        assert_eq!(outcome.status, "error");
        assert_eq!(outcome.errors[0].message, "Can't find type 'Strin'");
    }

    #[test]
    fn test_results_accept_both_shapes() {
        let bare = test_results(json!([{"name": "t1", "passed": true}])).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = test_results(json!({"results": [{"name": "t2", "passed": false, "message": "x"}]}))
            .unwrap();
        assert!(!wrapped[0].passed);

        assert!(test_results(json!({"unexpected": 1})).unwrap().is_empty());
    }
}
