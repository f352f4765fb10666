//! The orchestration core of Guardian.
//!
//! A request flows through three stages:
//!
//! 1. **Compile**: the [`IntentCompiler`] turns the prompt into steps, asking
//!    the optional intent model first and falling back to the rule table
//! 2. **Validate**: the policy engine drops prohibited steps, flags the ones
//!    needing approval, and annotates violations
//! 3. **Execute** (optional): the [`PlanExecutor`] runs steps in order
//!    against the platform adapters, fail-fast, recording every attempt
//!
//! The [`Agent`] facade wires the three together and stores one episode per
//! request in memory.

pub mod compiler;
pub mod entities;
pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod rules;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use compiler::IntentCompiler;
pub use executor::{Adapters, ExecutorSettings, PlanExecutor, RunOptions};
pub use orchestrator::{Agent, AgentRequest};
pub use retry::RetryPolicy;
pub use rules::{IntentRule, PromptView, RuleSet};
