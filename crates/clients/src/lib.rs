//! Reference HTTP adapters for Guardian.
//!
//! Each client owns one `reqwest::Client` configured with the per-call
//! timeout and an optional bearer token, and implements the matching
//! adapter trait from `guardian-core`. The agent never depends on this
//! crate; the CLI wires these in, tests wire in mocks.

pub mod depot;
pub mod engine;
pub mod http;
pub mod intent;
pub mod sdlc;

pub use depot::DepotClient;
pub use engine::EngineClient;
pub use intent::OpenAiIntentModel;
pub use sdlc::SdlcClient;

use guardian_config::AppConfig;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client for {service}: {reason}")]
    Build { service: &'static str, reason: String },
}

/// The three platform clients, built from one configuration.
pub struct ServiceClients {
    pub engine: EngineClient,
    pub sdlc: SdlcClient,
    pub depot: DepotClient,
}

impl ServiceClients {
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        let services = &config.services;
        let timeout = Duration::from_secs(config.executor.request_timeout_secs);
        Ok(Self {
            engine: EngineClient::new(&services.engine_url, services.engine_token.clone(), timeout)?,
            sdlc: SdlcClient::new(&services.sdlc_url, services.sdlc_token.clone(), timeout)?,
            depot: DepotClient::new(&services.depot_url, services.depot_token.clone(), timeout)?,
        })
    }
}

/// The configured intent model, if a model name is set.
pub fn intent_model_from_config(config: &AppConfig) -> Result<Option<OpenAiIntentModel>, ClientError> {
    let intent = &config.intent;
    let Some(model) = &intent.model else {
        return Ok(None);
    };
    let model = OpenAiIntentModel::new(
        model.clone(),
        intent.api_url.clone(),
        intent.api_key.clone(),
        Duration::from_secs(intent.timeout_secs),
    )?;
    Ok(Some(model))
}
