//! History documents — the export/import format and its file persistence.
//!
//! A history file is a single pretty-printed JSON object:
//!
//! ```json
//! { "episodes": [...], "actions": [...], "context": {...}, "exported_at": "..." }
//! ```
//!
//! Default location: `~/.guardian/history.json`. Missing keys are allowed
//! on import and unknown keys are ignored.

use chrono::{DateTime, Utc};
use guardian_core::error::MemoryError;
use guardian_core::{ActionRecord, Episode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<Episode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionRecord>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

impl HistoryExport {
    pub fn from_json(text: &str) -> Result<Self, MemoryError> {
        serde_json::from_str(text).map_err(|e| MemoryError::InvalidHistory(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, MemoryError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize history: {e}")))
    }

    /// Read a history file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>, MemoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read history file {}: {e}",
                    path.display()
                )));
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Self::from_json(&content).map(Some)
    }

    /// Write the document, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<(), MemoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create history directory: {e}"))
            })?;
        }
        std::fs::write(path, self.to_json()?)
            .map_err(|e| MemoryError::Storage(format!("Failed to write history file: {e}")))?;
        debug!(path = %path.display(), "History written");
        Ok(())
    }
}
