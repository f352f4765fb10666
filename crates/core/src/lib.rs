//! # Guardian Core
//!
//! Domain types, adapter traits, and error definitions for the Guardian
//! orchestration agent. This crate has **zero framework dependencies** — it
//! defines the model that the policy engine, memory store, executor and
//! clients all implement against.
//!
//! ## Design Philosophy
//!
//! Every external service, and the optional intent model, is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping HTTP clients for in-process fakes in tests
//! - Constructor injection instead of process-wide clients
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod adapter;
pub mod error;
pub mod intent;
pub mod memory;
pub mod plan;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionError, RawStep};
pub use adapter::{
    AdapterResult, CompileOutcome, CompileSource, DepotAdapter, EngineAdapter, Entity, Review,
    SdlcAdapter, TestCaseResult, TestSummary, WorkspaceOutcome,
};
pub use error::{
    AdapterError, AdapterErrorKind, Error, ErrorEnvelope, PolicyViolation, Result, StepError,
    UnknownAction,
};
pub use intent::{IntentModel, IntentModelError};
pub use memory::{ActionRecord, Episode, StepRecord};
pub use plan::{Plan, PlanReport, PlanStatus, Step, StepStatus};
