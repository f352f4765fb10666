//! `guardian memory` — history statistics, export and import.

use super::{CmdResult, history_path, load_config, open_memory, print_json};
use guardian_memory::HistoryExport;
use std::path::Path;

pub async fn stats() -> CmdResult {
    let config = load_config()?;
    let memory = open_memory(&config).await?;
    print_json(&memory.get_statistics().await)
}

pub async fn export(output: &Path) -> CmdResult {
    let config = load_config()?;
    let memory = open_memory(&config).await?;
    memory.export_history().await.write(output)?;
    eprintln!("Exported history to {}", output.display());
    Ok(())
}

pub async fn import(input: &Path) -> CmdResult {
    let config = load_config()?;
    let doc = HistoryExport::read(input)?
        .ok_or_else(|| format!("No history found at {}", input.display()))?;

    let memory = open_memory(&config).await?;
    memory.import_history(doc).await;
    memory.save_to(&history_path(&config)).await?;
    print_json(&memory.get_statistics().await)
}
