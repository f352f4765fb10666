//! SDLC client: workspaces, entities, reviews.

use crate::ClientError;
use crate::http::HttpService;
use async_trait::async_trait;
use guardian_core::{AdapterResult, Entity, Review, SdlcAdapter, WorkspaceOutcome};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub struct SdlcClient {
    http: HttpService,
}

impl SdlcClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: HttpService::new("sdlc", base_url, token, timeout)?,
        })
    }
}

fn workspace_path(project_id: &str, workspace_id: &str) -> String {
    format!("/projects/{project_id}/workspaces/{workspace_id}")
}

/// Review payload as the service returns it. Ids may be numeric.
#[derive(Deserialize)]
struct ReviewBody {
    id: serde_json::Value,
    #[serde(default, alias = "webURL", alias = "web_url")]
    url: String,
}

impl From<ReviewBody> for Review {
    fn from(body: ReviewBody) -> Self {
        let id = match body.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Review { id, url: body.url }
    }
}

#[async_trait]
impl SdlcAdapter for SdlcClient {
    async fn create_workspace(
        &self,
        project_id: &str,
        workspace_id: &str,
    ) -> AdapterResult<WorkspaceOutcome> {
        let request = self.http.post(&workspace_path(project_id, workspace_id));
        let response = self.http.execute(request).await?;

        if response.status() == StatusCode::CONFLICT {
            info!(project = project_id, workspace = workspace_id, "Workspace already exists");
            return Ok(WorkspaceOutcome { created: false });
        }

        self.http.check(response).await?;
        Ok(WorkspaceOutcome { created: true })
    }

    async fn get_entities(&self, project_id: &str, workspace_id: &str) -> AdapterResult<Vec<Entity>> {
        let path = format!("{}/entities", workspace_path(project_id, workspace_id));
        self.http.send_json(self.http.get(&path)).await
    }

    async fn upsert_entities(
        &self,
        project_id: &str,
        workspace_id: &str,
        entities: &[Entity],
    ) -> AdapterResult<()> {
        let path = format!("{}/entities", workspace_path(project_id, workspace_id));
        let request = self
            .http
            .post(&path)
            .json(&json!({"replace": false, "entities": entities}));
        self.http.send_empty(request).await
    }

    async fn create_review(
        &self,
        project_id: &str,
        workspace_id: &str,
        title: &str,
        description: &str,
    ) -> AdapterResult<Review> {
        let path = format!("{}/review", workspace_path(project_id, workspace_id));
        let request = self
            .http
            .post(&path)
            .json(&json!({"title": title, "description": description}));
        let body: ReviewBody = self.http.send_json(request).await?;
        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_ids_may_be_numeric() {
        let body: ReviewBody = serde_json::from_str(r#"{"id": 42, "webURL": "http://sdlc/r/42"}"#).unwrap();
        let review: Review = body.into();
        assert_eq!(review.id, "42");
        assert_eq!(review.url, "http://sdlc/r/42");
    }

    #[test]
    fn workspace_paths() {
        assert_eq!(workspace_path("demo", "team-dev"), "/projects/demo/workspaces/team-dev");
    }
}
