//! `guardian policy` / `guardian redact`.

use super::{CmdResult, load_config, print_json};
use guardian_policy::PolicyEngine;

pub fn summary() -> CmdResult {
    let config = load_config()?;
    let engine = PolicyEngine::new(config.policy)?;
    print_json(&engine.summary())
}

pub fn redact(text: &str) -> CmdResult {
    let config = load_config()?;
    let engine = PolicyEngine::new(config.policy)?;
    println!("{}", engine.redact_pii(text));
    Ok(())
}
