//! `guardian plan` / `guardian run` — compile (and execute) a prompt.

use super::{CmdResult, build_agent, history_path, load_config, open_memory, print_json};
use guardian_agent::{AgentRequest, RunOptions};
use serde_json::{Map, Value};
use std::time::Duration;

pub struct RunFlags {
    pub debug: bool,
    pub approve: bool,
    pub deadline_secs: Option<u64>,
}

pub async fn plan(prompt: String, context: &[String]) -> CmdResult {
    let request = AgentRequest::plan(prompt).with_context(parse_context(context)?);
    handle(request).await
}

pub async fn run(prompt: String, context: &[String], flags: RunFlags) -> CmdResult {
    let options = RunOptions {
        debug: flags.debug,
        approve: flags.approve,
        deadline: flags
            .deadline_secs
            .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs)),
    };
    let request = AgentRequest::run(prompt, options).with_context(parse_context(context)?);
    handle(request).await
}

async fn handle(request: AgentRequest) -> CmdResult {
    let config = load_config()?;
    let memory = open_memory(&config).await?;
    let agent = build_agent(&config, memory.clone())?;

    let outcome = agent.handle(request).await;
    let path = history_path(&config);
    memory.save_to(&path).await?;
    tracing::debug!(path = %path.display(), "History saved");

    match outcome {
        Ok(report) => print_json(&report),
        Err(envelope) => {
            print_json(&envelope)?;
            Err(format!("{}: {}", envelope.code, envelope.message).into())
        }
    }
}

/// Parse `key=value` pairs. Values that parse as JSON keep their type,
/// anything else is a string.
fn parse_context(pairs: &[String]) -> Result<Map<String, Value>, String> {
    let mut context = Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid context entry '{pair}', expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid context entry '{pair}', key is empty"));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_values_keep_json_types() {
        let pairs = vec![
            "workspace_id=risk-dev".to_string(),
            "limit=5".to_string(),
            "csv_data=id,notional".to_string(),
            "flags=[\"a\"]".to_string(),
        ];
        let context = parse_context(&pairs).unwrap();
        assert_eq!(context["workspace_id"], "risk-dev");
        assert_eq!(context["limit"], 5);
        assert_eq!(context["csv_data"], "id,notional");
        assert_eq!(context["flags"], json!(["a"]));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(parse_context(&["novalue".to_string()]).is_err());
        assert!(parse_context(&["=x".to_string()]).is_err());
        assert!(parse_context(&[]).unwrap().is_empty());
    }
}
