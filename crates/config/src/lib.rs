//! Configuration loading, validation, and management for Guardian.
//!
//! Loads configuration from `~/.guardian/config.toml` with environment
//! variable overrides. Validates all settings at startup. Nothing here is
//! global: the loaded [`AppConfig`] is handed to constructors explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.guardian/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Platform service endpoints and the default target workspace
    #[serde(default)]
    pub services: ServicesConfig,

    /// Guardrail rules
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Episodic/action memory
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Plan execution: timeouts, retries, debug mode
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Optional natural-language intent model
    #[serde(default)]
    pub intent: IntentConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    #[serde(default = "default_sdlc_url")]
    pub sdlc_url: String,

    #[serde(default = "default_depot_url")]
    pub depot_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdlc_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depot_token: Option<String>,

    /// Project used when a step does not name one
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Workspace used when a step does not name one
    #[serde(default = "default_workspace_id")]
    pub workspace_id: String,
}

fn default_engine_url() -> String {
    "http://localhost:6300".into()
}
fn default_sdlc_url() -> String {
    "http://localhost:6100".into()
}
fn default_depot_url() -> String {
    "http://localhost:6200".into()
}
fn default_project_id() -> String {
    "demo-project".into()
}
fn default_workspace_id() -> String {
    "agent-dev".into()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            engine_url: default_engine_url(),
            sdlc_url: default_sdlc_url(),
            depot_url: default_depot_url(),
            engine_token: None,
            sdlc_token: None,
            depot_token: None,
            project_id: default_project_id(),
            workspace_id: default_workspace_id(),
        }
    }
}

impl std::fmt::Debug for ServicesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesConfig")
            .field("engine_url", &self.engine_url)
            .field("sdlc_url", &self.sdlc_url)
            .field("depot_url", &self.depot_url)
            .field("engine_token", &redact(&self.engine_token))
            .field("sdlc_token", &redact(&self.sdlc_token))
            .field("depot_token", &redact(&self.depot_token))
            .field("project_id", &self.project_id)
            .field("workspace_id", &self.workspace_id)
            .finish()
    }
}

/// Guardrail rules evaluated by the policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Regular expressions that identify personal data
    #[serde(default = "default_pii_patterns")]
    pub pii_patterns: Vec<String>,

    #[serde(default)]
    pub naming_rules: NamingRules,

    /// Actions removed from plans outright
    #[serde(default)]
    pub prohibited_actions: Vec<String>,

    /// Actions flagged for human approval
    #[serde(default = "default_require_approval")]
    pub require_approval: Vec<String>,

    #[serde(default = "default_max_entities")]
    pub max_entities_per_request: usize,

    #[serde(default = "default_max_title_length")]
    pub max_review_title_length: usize,

    #[serde(default = "default_schema_types")]
    pub allowed_schema_types: Vec<String>,
}

fn default_pii_patterns() -> Vec<String> {
    vec![
        // Email
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b".into(),
        // SSN
        r"\b\d{3}-\d{2}-\d{4}\b".into(),
        // Credit card
        r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b".into(),
        // Phone
        r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b".into(),
    ]
}
fn default_require_approval() -> Vec<String> {
    vec!["delete".into(), "merge".into(), "publish".into()]
}
fn default_max_entities() -> usize {
    100
}
fn default_max_title_length() -> usize {
    200
}
fn default_schema_types() -> Vec<String> {
    vec!["jsonSchema".into(), "avro".into(), "protobuf".into()]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pii_patterns: default_pii_patterns(),
            naming_rules: NamingRules::default(),
            prohibited_actions: vec![],
            require_approval: default_require_approval(),
            max_entities_per_request: default_max_entities(),
            max_review_title_length: default_max_title_length(),
            allowed_schema_types: default_schema_types(),
        }
    }
}

/// One naming regex per action-target kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingRules {
    /// PascalCase model names
    #[serde(default = "default_model_rule")]
    pub model: String,

    /// camelCase service paths, slashes allowed
    #[serde(default = "default_service_rule")]
    pub service: String,

    /// kebab-case workspace ids
    #[serde(default = "default_workspace_rule")]
    pub workspace: String,
}

fn default_model_rule() -> String {
    r"^[A-Z][a-zA-Z0-9]*$".into()
}
fn default_service_rule() -> String {
    r"^[a-z][a-zA-Z0-9/]*$".into()
}
fn default_workspace_rule() -> String {
    r"^[a-z][a-z0-9-]*$".into()
}

impl Default for NamingRules {
    fn default() -> Self {
        Self {
            model: default_model_rule(),
            service: default_service_rule(),
            workspace: default_workspace_rule(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Episode capacity; oldest entries are evicted beyond it
    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,

    /// Action-record capacity as a multiple of `max_episodes`
    #[serde(default = "default_action_multiplier")]
    pub action_multiplier: usize,

    /// Where history is persisted between runs (none = in-memory only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,

    /// Redact personal data from prompts before they are remembered
    #[serde(default = "default_true")]
    pub redact_prompts: bool,
}

fn default_max_episodes() -> usize {
    1000
}
fn default_action_multiplier() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_episodes: default_max_episodes(),
            action_multiplier: default_action_multiplier(),
            history_path: None,
            redact_prompts: true,
        }
    }
}

impl MemoryConfig {
    pub fn max_actions(&self) -> usize {
        self.max_episodes.saturating_mul(self.action_multiplier)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Per adapter call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total attempts for transport failures (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Keep executing after a failed step
    #[serde(default)]
    pub debug: bool,
}

fn default_request_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay() -> u64 {
    500
}
fn default_retry_max_delay() -> u64 {
    8_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            debug: false,
        }
    }
}

/// OpenAI-compatible model used to turn prompts into plans.
#[derive(Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Model name; unset disables the model and uses the rule parser only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_intent_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_intent_timeout")]
    pub timeout_secs: u64,
}

fn default_intent_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_intent_timeout() -> u64 {
    20
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_url: default_intent_url(),
            api_key: None,
            timeout_secs: default_intent_timeout(),
        }
    }
}

impl std::fmt::Debug for IntentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentConfig")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.guardian/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// - `GUARDIAN_ENGINE_URL`, `GUARDIAN_SDLC_URL`, `GUARDIAN_DEPOT_URL`
    /// - `GUARDIAN_PROJECT_ID`, `GUARDIAN_WORKSPACE_ID`
    /// - `GUARDIAN_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `GUARDIAN_DEBUG` (`1` / `true`)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GUARDIAN_ENGINE_URL") {
            self.services.engine_url = url;
        }
        if let Some(url) = lookup("GUARDIAN_SDLC_URL") {
            self.services.sdlc_url = url;
        }
        if let Some(url) = lookup("GUARDIAN_DEPOT_URL") {
            self.services.depot_url = url;
        }
        if let Some(project) = lookup("GUARDIAN_PROJECT_ID") {
            self.services.project_id = project;
        }
        if let Some(workspace) = lookup("GUARDIAN_WORKSPACE_ID") {
            self.services.workspace_id = workspace;
        }
        if self.intent.api_key.is_none() {
            self.intent.api_key = lookup("GUARDIAN_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(debug) = lookup("GUARDIAN_DEBUG") {
            self.executor.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".guardian")
    }

    /// Default location of the persisted memory history.
    pub fn default_history_path() -> PathBuf {
        Self::config_dir().join("history.json")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.max_episodes == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_episodes must be at least 1".into(),
            ));
        }
        if self.memory.action_multiplier == 0 {
            return Err(ConfigError::ValidationError(
                "memory.action_multiplier must be at least 1".into(),
            ));
        }
        if self.executor.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "executor.max_attempts must be at least 1".into(),
            ));
        }
        if self.executor.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "executor.request_timeout_secs must be > 0".into(),
            ));
        }
        let rules = &self.policy.naming_rules;
        for (kind, rule) in [("model", &rules.model), ("service", &rules.service), ("workspace", &rules.workspace)] {
            if rule.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "policy.naming_rules.{kind} cannot be empty"
                )));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.request_timeout_secs, 30);
        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.policy.max_review_title_length, 200);
        assert_eq!(config.memory.max_actions(), 10_000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.services.engine_url, config.services.engine_url);
        assert_eq!(parsed.policy.pii_patterns, config.policy.pii_patterns);
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = AppConfig::default();
        config.memory.max_episodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.executor.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().services.project_id, "demo-project");
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[policy]
prohibited_actions = ["publish"]
max_review_title_length = 80

[executor]
debug = true
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.policy.prohibited_actions, vec!["publish".to_string()]);
        assert_eq!(config.policy.max_review_title_length, 80);
        assert_eq!(config.policy.max_entities_per_request, 100);
        assert!(config.executor.debug);
        assert_eq!(config.memory.max_episodes, 1000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[executor\nmax_attempts = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("GUARDIAN_ENGINE_URL", "http://engine:6300"),
            ("GUARDIAN_WORKSPACE_ID", "team-ws"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GUARDIAN_DEBUG", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.services.engine_url, "http://engine:6300");
        assert_eq!(config.services.workspace_id, "team-ws");
        assert_eq!(config.intent.api_key.as_deref(), Some("sk-test"));
        assert!(config.executor.debug);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config.services.sdlc_token = Some("very-secret".into());
        config.intent.api_key = Some("sk-secret".into());
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("very-secret"));
        assert!(!debug_str.contains("sk-secret"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("localhost:6300"));
        assert!(toml_str.contains("max_episodes"));
    }
}
