//! Shared HTTP plumbing: one `reqwest::Client` per service with bearer
//! auth, plus the mapping from HTTP failures to [`AdapterError`].
//!
//! | Failure                          | Kind        | Retryable |
//! |----------------------------------|-------------|-----------|
//! | connect / timeout / request I/O  | `TRANSPORT` | yes       |
//! | 5xx, 429                         | `TRANSPORT` | yes       |
//! | any other non-2xx                | `SERVICE`   | no        |
//! | 2xx with an unreadable body      | `SERVICE`   | no        |

use crate::ClientError;
use guardian_core::{AdapterError, AdapterResult};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest error body echoed into an [`AdapterError`] message.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpService {
    service: &'static str,
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpService {
    pub fn new(
        service: &'static str,
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build {
                service,
                reason: e.to_string(),
            })?;

        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request, mapping only transport-level failures.
    pub async fn execute(&self, request: RequestBuilder) -> AdapterResult<Response> {
        request.send().await.map_err(|e| {
            warn!(service = self.service, error = %e, "Request failed before a response");
            transport_error(self.service, &e)
        })
    }

    /// Turn a non-2xx response into an error.
    pub async fn check(&self, response: Response) -> AdapterResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(service = self.service, status = status.as_u16(), "Service returned error");
        Err(status_error(self.service, status, &body))
    }

    /// Send, check status, and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AdapterResult<T> {
        let response = self.check(self.execute(request).await?).await?;
        response.json().await.map_err(|e| {
            AdapterError::service(format!("{}: unreadable response body: {e}", self.service))
        })
    }

    /// Send and check status, discarding the body.
    pub async fn send_empty(&self, request: RequestBuilder) -> AdapterResult<()> {
        let response = self.check(self.execute(request).await?).await?;
        debug!(service = self.service, status = response.status().as_u16(), "Request succeeded");
        Ok(())
    }
}

pub fn transport_error(service: &str, error: &reqwest::Error) -> AdapterError {
    let reason = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    AdapterError::transport(format!("{service}: {reason}: {error}"))
}

pub fn status_error(service: &str, status: StatusCode, body: &str) -> AdapterError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("{service}: HTTP {}: {body}", status.as_u16());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AdapterError::transport(message)
    } else {
        AdapterError::service(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::AdapterErrorKind;

    #[test]
    fn server_errors_are_retryable_transport() {
        let err = status_error("engine", StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.kind, AdapterErrorKind::Transport);
        assert!(err.should_retry());
        assert!(err.message.contains("502"));

        assert!(status_error("sdlc", StatusCode::TOO_MANY_REQUESTS, "").should_retry());
    }

    #[test]
    fn client_errors_are_service_failures() {
        let err = status_error("sdlc", StatusCode::NOT_FOUND, "no such project");
        assert_eq!(err.kind, AdapterErrorKind::Service);
        assert!(!err.should_retry());
        assert!(err.message.contains("no such project"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(10_000);
        let err = status_error("depot", StatusCode::BAD_REQUEST, &body);
        assert!(err.message.len() < 600);
    }

    #[test]
    fn urls_join_cleanly() {
        let http = HttpService::new("engine", "http://localhost:6300/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(http.url("/api/x"), "http://localhost:6300/api/x");
        assert_eq!(http.url("api/x"), "http://localhost:6300/api/x");
    }

    #[tokio::test]
    async fn refused_connection_is_transport() {
        let http = HttpService::new("engine", "http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
        let err = http.execute(http.get("/health")).await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Transport);
        assert!(err.retryable);
    }
}
