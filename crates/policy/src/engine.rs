//! Policy evaluation.

use crate::PolicyError;
use crate::visitor::{rewrite_strings, visit_strings};
use guardian_config::PolicyConfig;
use guardian_core::{Action, CompileOutcome, PolicyViolation, Step, TestSummary};
use regex_lite::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::ControlFlow;
use tracing::{debug, info, warn};

/// Replacement text for redacted personal data.
pub const REDACTED: &str = "[REDACTED]";

/// Upper bound on redaction passes. One pass already reaches the fixpoint
/// for the shipped patterns; custom patterns may need more.
const MAX_REDACTION_PASSES: usize = 8;

/// Compiled naming conventions, keyed by target kind.
struct NamingMatchers {
    model: Regex,
    service: Regex,
    workspace: Regex,
}

/// Stateless guardrail evaluator.
///
/// Built once from configuration; every method is side-effect free apart
/// from logging.
pub struct PolicyEngine {
    config: PolicyConfig,
    pii: Vec<Regex>,
    naming: NamingMatchers,
}

/// Dry-run outcome for a single action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub prohibited: bool,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyLimits {
    pub max_entities: usize,
    pub max_title_length: usize,
    pub allowed_schema_types: Vec<String>,
}

/// Human-facing overview of the active rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub pii_detection: bool,
    pub naming_rules: Vec<String>,
    pub prohibited_actions: Vec<String>,
    pub approval_required: Vec<String>,
    pub limits: PolicyLimits,
}

fn compile(name: &str, pattern: &str) -> Result<Regex, PolicyError> {
    Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl PolicyEngine {
    /// Build an engine, compiling every configured pattern up front.
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        let pii = config
            .pii_patterns
            .iter()
            .enumerate()
            .map(|(i, p)| compile(&format!("pii_patterns[{i}]"), p))
            .collect::<Result<Vec<_>, _>>()?;

        let rules = &config.naming_rules;
        let naming = NamingMatchers {
            model: compile("naming_rules.model", &rules.model)?,
            service: compile("naming_rules.service", &rules.service)?,
            workspace: compile("naming_rules.workspace", &rules.workspace)?,
        };

        info!(
            pii_patterns = pii.len(),
            prohibited = config.prohibited_actions.len(),
            approval = config.require_approval.len(),
            "Policy engine initialized"
        );

        Ok(Self {
            config,
            pii,
            naming,
        })
    }

    /// The active configuration.
    pub fn rules(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            pii_detection: !self.pii.is_empty(),
            naming_rules: vec!["model".into(), "service".into(), "workspace".into()],
            prohibited_actions: self.config.prohibited_actions.clone(),
            approval_required: self.config.require_approval.clone(),
            limits: PolicyLimits {
                max_entities: self.config.max_entities_per_request,
                max_title_length: self.config.max_review_title_length,
                allowed_schema_types: self.config.allowed_schema_types.clone(),
            },
        }
    }

    /// Check a typed action.
    pub fn check_action(&self, action: &Action) -> Result<(), PolicyViolation> {
        self.check(action.name(), &action.params())
    }

    /// Check an action given by name with raw JSON parameters.
    ///
    /// Fails with the first issue found: personal data anywhere in the
    /// parameters, then the naming convention or limit for that action.
    pub fn check(&self, action: &str, params: &Value) -> Result<(), PolicyViolation> {
        match self.issues(action, params).into_iter().next() {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every issue with an action, without failing.
    pub fn validate_step(&self, action: &Action) -> StepValidation {
        let name = action.name();
        let issues: Vec<String> = self
            .issues(name, &action.params())
            .into_iter()
            .map(|v| v.message)
            .collect();
        StepValidation {
            valid: issues.is_empty(),
            issues,
            prohibited: self.is_prohibited(name),
            requires_approval: self.requires_approval(name),
        }
    }

    /// Filter and annotate a plan.
    ///
    /// Prohibited actions are removed. Actions in the approval set are
    /// flagged. Steps failing [`check_action`](Self::check_action) are kept
    /// with `validation_error` set. Never fails.
    pub fn validate_plan(&self, steps: Vec<Step>) -> Vec<Step> {
        let mut validated = Vec::with_capacity(steps.len());

        for mut step in steps {
            let name = step.action.name();

            if self.is_prohibited(name) {
                warn!(step_id = %step.id, action = name, "Prohibited action removed from plan");
                continue;
            }

            if self.requires_approval(name) {
                debug!(step_id = %step.id, action = name, "Step requires approval");
                step.requires_approval = true;
            }

            if let Err(violation) = self.check_action(&step.action) {
                warn!(step_id = %step.id, action = name, "Step validation failed: {}", violation.message);
                step.validation_error = Some(violation.message);
            }

            validated.push(step);
        }

        validated
    }

    /// Whether any string leaf of `value` contains personal data.
    pub fn contains_pii(&self, value: &Value) -> bool {
        visit_strings(value, &mut |s: &str| {
            if self.pii.iter().any(|re| re.is_match(s)) {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_break()
    }

    /// Replace every personal-data match with [`REDACTED`].
    ///
    /// Applied until the text stops changing, so redacting twice is the
    /// same as redacting once.
    pub fn redact_pii(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_REDACTION_PASSES {
            let next = self.redact_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// [`redact_pii`](Self::redact_pii) over every string leaf.
    pub fn redact_value(&self, value: &Value) -> Value {
        let mut redacted = value.clone();
        rewrite_strings(&mut redacted, &mut |s: &str| self.redact_pii(s));
        redacted
    }

    /// Compilation passes only with status `success`.
    pub fn check_compile_result(&self, outcome: &CompileOutcome) -> bool {
        outcome.status == "success"
    }

    pub fn check_test_result(&self, summary: &TestSummary) -> bool {
        summary.passed
    }

    // ── Internal ───────────────────────────────────────────────────

    fn is_prohibited(&self, action: &str) -> bool {
        self.config.prohibited_actions.iter().any(|a| a == action)
    }

    fn requires_approval(&self, action: &str) -> bool {
        self.config.require_approval.iter().any(|a| a == action)
    }

    fn redact_once(&self, text: &str) -> String {
        self.pii.iter().fold(text.to_string(), |acc, re| {
            re.replace_all(&acc, NoExpand(REDACTED)).into_owned()
        })
    }

    fn issues(&self, action: &str, params: &Value) -> Vec<PolicyViolation> {
        let mut issues = Vec::new();

        if self.contains_pii(params) {
            issues.push(PolicyViolation::new("PII detected in parameters"));
        }

        let field = |key: &str| params.get(key).and_then(Value::as_str);

        match action {
            "create_workspace" => {
                if let Some(id) = field("workspace_id") {
                    if !self.naming.workspace.is_match(id) {
                        issues.push(PolicyViolation::new(format!(
                            "Workspace ID '{id}' violates naming policy"
                        )));
                    }
                }
            }
            "create_model" => {
                if let Some(name) = field("name") {
                    if !self.naming.model.is_match(name) {
                        issues.push(PolicyViolation::new(format!(
                            "Model name '{name}' violates naming policy"
                        )));
                    }
                }
            }
            "generate_service" => {
                if let Some(path) = field("path") {
                    if !self.naming.service.is_match(path) {
                        issues.push(PolicyViolation::new(format!(
                            "Service path '{path}' violates naming policy"
                        )));
                    }
                }
            }
            "open_review" => {
                let max = self.config.max_review_title_length;
                if field("title").is_some_and(|t| t.chars().count() > max) {
                    issues.push(PolicyViolation::new(format!(
                        "Review title exceeds maximum length of {max}"
                    )));
                }
            }
            "upsert_entities" => {
                let max = self.config.max_entities_per_request;
                let count = params
                    .get("entities")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                if count > max {
                    issues.push(PolicyViolation::new(format!(
                        "Too many entities: {count} > {max}"
                    )));
                }
            }
            "transform_schema" => {
                let format = field("format").unwrap_or_default();
                if !self.config.allowed_schema_types.iter().any(|t| t == format) {
                    issues.push(PolicyViolation::new(format!(
                        "Schema type '{format}' not allowed"
                    )));
                }
            }
            _ => {}
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardian_core::TestCaseResult;
    use guardian_core::action::{Compile, CreateModel, OpenReview, Publish, TransformSchema};
    use serde_json::json;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(PolicyConfig::default()).unwrap()
    }

    #[test]
    fn email_in_params_is_rejected() {
        let err = engine().check("create_model", &json!({"email": "a@b.com"})).unwrap_err();
        assert_eq!(err.message, "PII detected in parameters");
    }

    #[test]
    fn clean_params_pass() {
        assert!(engine().check("create_model", &json!({"name": "Clean"})).is_ok());
    }

    #[test]
    fn pii_is_found_in_nested_values() {
        let params = json!({"entities": [{"content": {"notes": ["call 555-123-4567"]}}]});
        assert!(engine().check("upsert_entities", &params).is_err());

        let ssn = json!({"description": "ssn 123-45-6789"});
        assert!(engine().check("open_review", &ssn).is_err());
    }

    #[test]
    fn model_naming_convention() {
        let e = engine();
        assert!(e.check_action(&Action::CreateModel(CreateModel::named("Trade"))).is_ok());
        let err = e
            .check_action(&Action::CreateModel(CreateModel::named("trade_model")))
            .unwrap_err();
        assert!(err.message.contains("trade_model"));
    }

    #[test]
    fn workspace_and_service_naming() {
        let e = engine();
        assert!(e.check("create_workspace", &json!({"workspace_id": "team-dev"})).is_ok());
        assert!(e.check("create_workspace", &json!({"workspace_id": "Team_Dev"})).is_err());
        assert!(e.check("create_workspace", &json!({})).is_ok());

        assert!(e.check("generate_service", &json!({"path": "trades/byNotional"})).is_ok());
        assert!(e.check("generate_service", &json!({"path": "Trades/ByNotional"})).is_err());
    }

    #[test]
    fn review_title_limit() {
        let e = engine();
        let long = "x".repeat(201);
        assert!(e.check("open_review", &json!({"title": long})).is_err());
        assert!(e.check("open_review", &json!({"title": "ok"})).is_ok());
        assert!(e.check("open_review", &json!({"title": "y".repeat(200)})).is_ok());
    }

    #[test]
    fn entity_batch_limit() {
        let e = engine();
        let entities: Vec<Value> = (0..101).map(|i| json!({"path": format!("model::M{i}")})).collect();
        let err = e.check("upsert_entities", &json!({ "entities": entities })).unwrap_err();
        assert!(err.message.contains("101 > 100"));
    }

    #[test]
    fn schema_type_allow_list() {
        let e = engine();
        let ok = Action::TransformSchema(TransformSchema {
            format: "avro".into(),
            class_path: "model::Trade".into(),
        });
        let bad = Action::TransformSchema(TransformSchema {
            format: "xml".into(),
            class_path: "model::Trade".into(),
        });
        assert!(e.check_action(&ok).is_ok());
        assert!(e.check_action(&bad).is_err());
    }

    #[test]
    fn validate_plan_drops_prohibited_steps() {
        let config = PolicyConfig {
            prohibited_actions: vec!["compile".into()],
            ..PolicyConfig::default()
        };
        let e = PolicyEngine::new(config).unwrap();
        let steps = Step::sequence([
            Action::CreateModel(CreateModel::named("Trade")),
            Action::Compile(Compile::default()),
            Action::Compile(Compile::default()),
        ]);

        let validated = e.validate_plan(steps);
        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].action.name(), "create_model");
    }

    #[test]
    fn validate_plan_flags_approval_and_annotates_violations() {
        let steps = Step::sequence([
            Action::Publish(Publish::default()),
            Action::CreateModel(CreateModel::named("lowercase")),
            Action::OpenReview(OpenReview {
                title: "ok".into(),
                description: None,
            }),
        ]);

        let validated = engine().validate_plan(steps);
        assert_eq!(validated.len(), 3);
        assert!(validated[0].requires_approval);
        assert!(validated[1].validation_error.as_deref().unwrap().contains("lowercase"));
        assert!(validated[2].validation_error.is_none());
        assert!(!validated[2].requires_approval);
    }

    #[test]
    fn redaction_replaces_every_match() {
        let text = "mail bob@example.com or call 555-123-4567, ssn 123-45-6789";
        let redacted = engine().redact_pii(text);
        assert!(!redacted.contains("bob@example.com"));
        assert!(!redacted.contains("555-123-4567"));
        assert!(!redacted.contains("123-45-6789"));
        assert_eq!(redacted.matches(REDACTED).count(), 3);
    }

    #[test]
    fn redaction_is_idempotent() {
        let e = engine();
        for text in [
            "",
            "nothing to see",
            "card 4111 1111 1111 1111 and a@b.io",
            "[REDACTED] already",
        ] {
            let once = e.redact_pii(text);
            assert_eq!(e.redact_pii(&once), once);
        }
    }

    #[test]
    fn redact_value_rewrites_string_leaves() {
        let value = json!({"prompt": "email a@b.com", "count": 2, "tags": ["x@y.org"]});
        let redacted = engine().redact_value(&value);
        assert_eq!(redacted["prompt"], "email [REDACTED]");
        assert_eq!(redacted["count"], 2);
        assert_eq!(redacted["tags"][0], REDACTED);
        assert!(!engine().contains_pii(&redacted));
    }

    #[test]
    fn result_gates() {
        let e = engine();
        assert!(e.check_compile_result(&CompileOutcome::success()));
        assert!(!e.check_compile_result(&CompileOutcome::error("type mismatch")));

        let failing = TestSummary::from_results(vec![TestCaseResult {
            name: "t".into(),
            passed: false,
            message: "boom".into(),
        }]);
        assert!(!e.check_test_result(&failing));
        assert!(e.check_test_result(&TestSummary::from_results(vec![])));
    }

    #[test]
    fn validate_step_collects_all_issues() {
        let action = Action::CreateModel(CreateModel {
            name: "bad name".into(),
            csv_data: Some("contact\nbob@example.com".into()),
        });
        let report = engine().validate_step(&action);
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 2);
        assert!(!report.prohibited);

        let publish = engine().validate_step(&Action::Publish(Publish::default()));
        assert!(publish.valid);
        assert!(publish.requires_approval);
    }

    #[test]
    fn summary_reflects_config() {
        let summary = engine().summary();
        assert!(summary.pii_detection);
        assert_eq!(summary.limits.max_title_length, 200);
        assert_eq!(summary.approval_required, vec!["delete", "merge", "publish"]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let config = PolicyConfig {
            pii_patterns: vec!["(unclosed".into()],
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyEngine::new(config),
            Err(PolicyError::InvalidPattern { .. })
        ));
    }
}
