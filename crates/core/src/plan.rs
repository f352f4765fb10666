//! Plans and steps — the unit of work the compiler produces and the executor
//! drives through its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;

/// Lifecycle of a single step: PENDING → RUNNING → {COMPLETED, FAILED}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

/// An illegal state-machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step_id}' cannot move from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub step_id: String,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// One action within a plan, plus its execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,

    #[serde(flatten)]
    pub action: Action,

    #[serde(default)]
    pub status: StepStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Set by policy validation; the executor leaves such steps pending
    /// unless the run is explicitly approved.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_approval: bool,

    /// Policy annotation for a step that failed validation but was kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            status: StepStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            requires_approval: false,
            validation_error: None,
        }
    }

    /// Build a step list with sequential ids `step-1`, `step-2`, ...
    pub fn sequence(actions: impl IntoIterator<Item = Action>) -> Vec<Step> {
        actions
            .into_iter()
            .enumerate()
            .map(|(i, action)| Step::new(format!("step-{}", i + 1), action))
            .collect()
    }

    /// PENDING → RUNNING.
    pub fn start(&mut self) -> Result<(), InvalidTransition> {
        self.transition(StepStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// RUNNING → COMPLETED.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<(), InvalidTransition> {
        self.transition(StepStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// PENDING | RUNNING → FAILED.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(StepStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: StepStatus) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (self.status, to),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
                | (StepStatus::Pending, StepStatus::Failed)
        );
        if !allowed {
            return Err(InvalidTransition {
                step_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

/// Overall outcome of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Compiled but not executed.
    Planned,
    Completed,
    Failed,
    /// Executed without failures, but some steps never ran.
    Partial,
}

/// An ordered, validated sequence of steps compiled from one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub correlation_id: String,
    pub prompt: String,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub executed: bool,
}

impl Plan {
    pub fn new(correlation_id: impl Into<String>, prompt: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            prompt: prompt.into(),
            steps,
            created_at: Utc::now(),
            executed: false,
        }
    }

    pub fn status(&self) -> PlanStatus {
        if !self.executed {
            return PlanStatus::Planned;
        }
        if self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            PlanStatus::Failed
        } else if self.steps.iter().all(|s| s.status == StepStatus::Completed) {
            PlanStatus::Completed
        } else {
            PlanStatus::Partial
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn report(&self) -> PlanReport {
        PlanReport {
            correlation_id: self.correlation_id.clone(),
            prompt: self.prompt.clone(),
            status: self.status(),
            steps: self.steps.clone(),
        }
    }
}

/// What a caller receives after compiling (and optionally running) a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub correlation_id: String,
    pub prompt: String,
    pub status: PlanStatus,
    pub steps: Vec<Step>,
}
