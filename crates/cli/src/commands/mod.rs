//! Subcommand implementations and the wiring they share.

pub mod config_cmd;
pub mod memory;
pub mod plan;
pub mod policy;

use guardian_agent::{Adapters, Agent};
use guardian_clients::{ServiceClients, intent_model_from_config};
use guardian_config::AppConfig;
use guardian_core::IntentModel;
use guardian_memory::MemoryStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub fn history_path(config: &AppConfig) -> PathBuf {
    config
        .memory
        .history_path
        .clone()
        .unwrap_or_else(AppConfig::default_history_path)
}

pub async fn open_memory(config: &AppConfig) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    let path = history_path(config);
    Ok(MemoryStore::load_from(&path, &config.memory).await?)
}

/// Build an agent wired to the configured HTTP services.
pub fn build_agent(config: &AppConfig, memory: MemoryStore) -> Result<Agent, Box<dyn std::error::Error>> {
    let clients = ServiceClients::from_config(config)?;
    let adapters = Adapters {
        engine: Arc::new(clients.engine),
        sdlc: Arc::new(clients.sdlc),
        depot: Arc::new(clients.depot),
    };
    let model = intent_model_from_config(config)?.map(|m| Arc::new(m) as Arc<dyn IntentModel>);
    Ok(Agent::from_config(config, adapters, memory, model)?)
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
