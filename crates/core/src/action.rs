//! Actions — the closed set of operations a plan step can perform.
//!
//! Each variant carries its own payload struct. On the wire an action is
//! always `{"action": "<snake_name>", "params": {...}}` (see [`RawStep`]),
//! which is also the shape an external intent model is asked to produce.
//! Converting a [`RawStep`] into an [`Action`] is where unknown names and
//! malformed payloads are rejected, so nothing downstream ever sees them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::adapter::Entity;
use crate::error::{Error, UnknownAction};

/// The untyped `{action, params}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RawStep {
    pub fn new(action: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Errors produced while turning a [`RawStep`] into a typed [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error(transparent)]
    Unknown(#[from] UnknownAction),

    #[error("invalid parameters for '{action}': {reason}")]
    InvalidParams { action: String, reason: String },
}

impl From<ActionError> for Error {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::Unknown(u) => Error::UnknownAction(u),
            ActionError::InvalidParams { action, reason } => Error::InvalidParams { action, reason },
        }
    }
}

/// Every operation the executor knows how to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub enum Action {
    CreateWorkspace(CreateWorkspace),
    CreateModel(CreateModel),
    CreateMapping(CreateMapping),
    Compile(Compile),
    GenerateService(GenerateService),
    OpenReview(OpenReview),
    SearchDepot(SearchDepot),
    ImportModel(ImportModel),
    UpsertEntities(UpsertEntities),
    TransformSchema(TransformSchema),
    RunTests(RunTests),
    Publish(Publish),
    ApplyChanges(ApplyChanges),
    AddConstraints(AddConstraints),
}

/// All action names, in declaration order.
pub const ACTION_NAMES: [&str; 14] = [
    "create_workspace",
    "create_model",
    "create_mapping",
    "compile",
    "generate_service",
    "open_review",
    "search_depot",
    "import_model",
    "upsert_entities",
    "transform_schema",
    "run_tests",
    "publish",
    "apply_changes",
    "add_constraints",
];

impl Action {
    /// The snake_case wire name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateWorkspace(_) => "create_workspace",
            Action::CreateModel(_) => "create_model",
            Action::CreateMapping(_) => "create_mapping",
            Action::Compile(_) => "compile",
            Action::GenerateService(_) => "generate_service",
            Action::OpenReview(_) => "open_review",
            Action::SearchDepot(_) => "search_depot",
            Action::ImportModel(_) => "import_model",
            Action::UpsertEntities(_) => "upsert_entities",
            Action::TransformSchema(_) => "transform_schema",
            Action::RunTests(_) => "run_tests",
            Action::Publish(_) => "publish",
            Action::ApplyChanges(_) => "apply_changes",
            Action::AddConstraints(_) => "add_constraints",
        }
    }

    /// The payload as a JSON value (what policies scan and memory records).
    pub fn params(&self) -> serde_json::Value {
        let value = match self {
            Action::CreateWorkspace(p) => serde_json::to_value(p),
            Action::CreateModel(p) => serde_json::to_value(p),
            Action::CreateMapping(p) => serde_json::to_value(p),
            Action::Compile(p) => serde_json::to_value(p),
            Action::GenerateService(p) => serde_json::to_value(p),
            Action::OpenReview(p) => serde_json::to_value(p),
            Action::SearchDepot(p) => serde_json::to_value(p),
            Action::ImportModel(p) => serde_json::to_value(p),
            Action::UpsertEntities(p) => serde_json::to_value(p),
            Action::TransformSchema(p) => serde_json::to_value(p),
            Action::RunTests(p) => serde_json::to_value(p),
            Action::Publish(p) => serde_json::to_value(p),
            Action::ApplyChanges(p) => serde_json::to_value(p),
            Action::AddConstraints(p) => serde_json::to_value(p),
        };
        // Payloads are plain data structs; serialization cannot fail.
        value.unwrap_or_default()
    }

    /// Build a typed action from a dynamic name and JSON params.
    ///
    /// A `null` params value is treated as an empty object.
    pub fn from_parts(name: &str, params: serde_json::Value) -> Result<Self, ActionError> {
        let params = if params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            params
        };

        let action = match name {
            "create_workspace" => Action::CreateWorkspace(payload(name, params)?),
            "create_model" => Action::CreateModel(payload(name, params)?),
            "create_mapping" => Action::CreateMapping(payload(name, params)?),
            "compile" => Action::Compile(payload(name, params)?),
            "generate_service" => Action::GenerateService(payload(name, params)?),
            "open_review" => Action::OpenReview(payload(name, params)?),
            "search_depot" => Action::SearchDepot(payload(name, params)?),
            "import_model" => Action::ImportModel(payload(name, params)?),
            "upsert_entities" => Action::UpsertEntities(payload(name, params)?),
            "transform_schema" => Action::TransformSchema(payload(name, params)?),
            "run_tests" => Action::RunTests(payload(name, params)?),
            "publish" => Action::Publish(payload(name, params)?),
            "apply_changes" => Action::ApplyChanges(payload(name, params)?),
            "add_constraints" => Action::AddConstraints(payload(name, params)?),
            other => return Err(UnknownAction(other.to_string()).into()),
        };
        Ok(action)
    }
}

fn payload<T: DeserializeOwned>(action: &str, params: serde_json::Value) -> Result<T, ActionError> {
    serde_json::from_value(params).map_err(|e| ActionError::InvalidParams {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

impl TryFrom<RawStep> for Action {
    type Error = ActionError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        Action::from_parts(&raw.action, raw.params)
    }
}

impl From<Action> for RawStep {
    fn from(action: Action) -> Self {
        RawStep {
            action: action.name().to_string(),
            params: action.params(),
        }
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkspace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateModel {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// CSV text whose header row becomes the class properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_data: Option<String>,
}

fn default_model_name() -> String {
    "GeneratedModel".into()
}

impl CreateModel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            csv_data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMapping {
    #[serde(default = "default_mapping_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_mapping_name() -> String {
    "GeneratedMapping".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Compile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateService {
    #[serde(default = "default_service_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

fn default_service_path() -> String {
    "service/generated".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenReview {
    #[serde(default = "default_review_title")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_review_title() -> String {
    "Agent-generated changes".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchDepot {
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportModel {
    pub depot_project_id: String,
    /// A concrete version, or `None` for the depot's latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Only import these entity paths; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertEntities {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSchema {
    #[serde(default = "default_schema_format")]
    pub format: String,
    #[serde(default = "default_class_path")]
    pub class_path: String,
}

fn default_schema_format() -> String {
    "avro".into()
}
fn default_class_path() -> String {
    "model::Model".into()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunTests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Publish {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Edit an existing class: rename properties, then append new ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyChanges {
    pub model_path: String,
    /// Old property name to new property name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rename: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_fields: Vec<FieldSpec>,
}

/// A property to add to a class. Added properties are optional (`[0..1]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub type_name: String,
}

fn default_field_type() -> String {
    "String".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddConstraints {
    pub model_path: String,
    pub constraints: Vec<ConstraintSpec>,
}

/// A constraint given by well-known name, or spelled out with its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintSpec {
    Named(String),
    Defined { name: String, body: String },
}

impl ConstraintSpec {
    pub fn name(&self) -> &str {
        match self {
            ConstraintSpec::Named(name) => name,
            ConstraintSpec::Defined { name, .. } => name,
        }
    }
}
