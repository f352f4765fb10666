//! Depot client: search, versioned entities, publishing.
//!
//! Depot projects are addressed as `group:artifact`. Publishing also
//! accepts a plain SDLC project id.

use crate::ClientError;
use crate::http::HttpService;
use async_trait::async_trait;
use guardian_core::{AdapterError, AdapterResult, DepotAdapter, Entity};
use serde_json::{Value, json};
use std::time::Duration;

pub struct DepotClient {
    http: HttpService,
}

impl DepotClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpService::new("depot", base_url, token, timeout)?,
        })
    }
}

fn coordinates(project_id: &str) -> AdapterResult<(&str, &str)> {
    match project_id.split_once(':') {
        Some((group, artifact)) if !group.is_empty() && !artifact.is_empty() => Ok((group, artifact)),
        _ => Err(AdapterError::service(format!(
            "depot: project id '{project_id}' is not of the form group:artifact"
        ))),
    }
}

fn project_path(project_id: &str) -> String {
    project_id.replace(':', "/")
}

#[async_trait]
impl DepotAdapter for DepotClient {
    async fn search(&self, query: &str, limit: usize) -> AdapterResult<Vec<Value>> {
        let request = self.http.get("/projects").query(&[("search", query)]);
        let mut results: Vec<Value> = self.http.send_json(request).await?;
        results.truncate(limit);
        Ok(results)
    }

    async fn get_entities(&self, project_id: &str, version: &str) -> AdapterResult<Vec<Entity>> {
        let (group, artifact) = coordinates(project_id)?;
        let path = format!("/projects/{group}/{artifact}/versions/{version}/entities");
        self.http.send_json(self.http.get(&path)).await
    }

    async fn publish(&self, project_id: &str, version: &str) -> AdapterResult<Value> {
        let path = format!("/projects/{}/versions/{version}", project_path(project_id));
        let request = self
            .http
            .post(&path)
            .json(&json!({"notes": format!("Published version {version}")}));
        self.http.send_json(request).await
    }
}
