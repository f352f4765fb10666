//! Guardrail policies for agent plans.
//!
//! The [`PolicyEngine`] is a stateless rule evaluator configured from
//! [`guardian_config::PolicyConfig`]. It sits between the intent compiler
//! and the executor and answers three questions:
//!
//! - may this action run with these parameters? ([`PolicyEngine::check`])
//! - which steps of a plan are dropped, flagged, or annotated?
//!   ([`PolicyEngine::validate_plan`])
//! - what does this text look like with personal data removed?
//!   ([`PolicyEngine::redact_pii`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   Intent     │───▶│   Policy     │───▶│    Plan      │
//! │   Compiler   │    │   Engine     │    │   Executor   │
//! └──────────────┘    └──────────────┘    └──────────────┘
//!                           │
//!                  ┌────────┴────────┐
//!                  │ drop / approve  │
//!                  │ annotate / deny │
//!                  └─────────────────┘
//! ```
//!
//! # Example policy section
//!
//! ```toml
//! [policy]
//! prohibited_actions = ["publish"]
//! require_approval = ["open_review"]
//! max_review_title_length = 120
//!
//! [policy.naming_rules]
//! model = "^[A-Z][a-zA-Z0-9]*$"
//! ```

mod engine;
pub mod visitor;

pub use engine::{PolicyEngine, PolicyLimits, PolicySummary, StepValidation, REDACTED};

/// Errors raised while building a policy engine.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid pattern for '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },
}
