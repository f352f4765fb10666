//! Memory for Guardian: a bounded, append-only log of episodes (compiled
//! intents) and action records (executed steps), plus a small key/value
//! context.
//!
//! Used for audit, replay, and "have we seen a prompt like this before"
//! lookups. The whole history serializes to one JSON document which can be
//! exported, imported, or persisted to `~/.guardian/history.json`.

pub mod history;
pub mod store;

pub use history::HistoryExport;
pub use store::{MemoryStatistics, MemoryStore};
