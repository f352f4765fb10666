//! Bounded, append-only memory of episodes and executed actions.

use crate::history::HistoryExport;
use chrono::Utc;
use guardian_config::MemoryConfig;
use guardian_core::error::MemoryError;
use guardian_core::{ActionRecord, Episode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
struct MemoryState {
    episodes: VecDeque<Episode>,
    actions: VecDeque<ActionRecord>,
    context: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate view returned by [`MemoryStore::get_statistics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub episode_count: usize,
    pub action_count: usize,
    pub context_keys: Vec<String>,
    pub action_types: BTreeMap<String, usize>,
    /// Size of the serialized episodes, actions and context.
    pub memory_usage_bytes: usize,
}

/// Episodic and action memory with FIFO eviction.
///
/// Cloning is cheap and clones share the same underlying log. All writes
/// go through one write lock; reads return snapshots.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    max_episodes: usize,
    max_actions: usize,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
    queue.push_back(item);
    while queue.len() > cap {
        queue.pop_front();
    }
}

fn last_n<T: Clone>(queue: &VecDeque<T>, n: usize) -> Vec<T> {
    queue.iter().skip(queue.len().saturating_sub(n)).cloned().collect()
}

fn bounded<T>(items: Vec<T>, cap: usize) -> VecDeque<T> {
    let skip = items.len().saturating_sub(cap);
    items.into_iter().skip(skip).collect()
}

fn tokens(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

impl MemoryStore {
    /// Create an empty store. Capacities below 1 are raised to 1.
    pub fn new(max_episodes: usize, max_actions: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            max_episodes: max_episodes.max(1),
            max_actions: max_actions.max(1),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_episodes, config.max_actions())
    }

    /// Open a store backed by a history file. A missing file starts empty.
    pub async fn load_from(path: &Path, config: &MemoryConfig) -> Result<Self, MemoryError> {
        let store = Self::from_config(config);
        if let Some(doc) = HistoryExport::read(path)? {
            store.import_history(doc).await;
        }
        debug!(path = %path.display(), "Memory loaded");
        Ok(store)
    }

    /// Persist the current history to `path`.
    pub async fn save_to(&self, path: &Path) -> Result<(), MemoryError> {
        self.export_history().await.write(path)
    }

    pub fn max_episodes(&self) -> usize {
        self.max_episodes
    }

    pub fn max_actions(&self) -> usize {
        self.max_actions
    }

    pub async fn add_episode(&self, episode: Episode) {
        debug!(episode_id = %episode.id, correlation_id = %episode.correlation_id, "Episode added to memory");
        let mut state = self.state.write().await;
        push_bounded(&mut state.episodes, episode, self.max_episodes);
    }

    pub async fn add_action(&self, record: ActionRecord) {
        debug!(action = %record.action, correlation_id = %record.correlation_id, "Action added to memory");
        let mut state = self.state.write().await;
        push_bounded(&mut state.actions, record, self.max_actions);
    }

    /// The last `n` episodes, oldest first.
    pub async fn get_recent_episodes(&self, n: usize) -> Vec<Episode> {
        last_n(&self.state.read().await.episodes, n)
    }

    /// The last `n` action records, oldest first.
    pub async fn get_recent_actions(&self, n: usize) -> Vec<ActionRecord> {
        last_n(&self.state.read().await.actions, n)
    }

    /// Every retained action record for one correlation id, oldest first.
    pub async fn actions_for(&self, correlation_id: &str) -> Vec<ActionRecord> {
        self.state
            .read()
            .await
            .actions
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    /// Episodes whose prompts share words with `prompt`.
    ///
    /// Score is the fraction of the query's distinct lowercase tokens that
    /// also appear in the episode prompt. Zero scores are excluded; equal
    /// scores are ordered most recent first.
    pub async fn find_similar_episodes(&self, prompt: &str, limit: usize) -> Vec<Episode> {
        let query = tokens(prompt);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let state = self.state.read().await;
        let mut scored: Vec<(usize, usize, &Episode)> = state
            .episodes
            .iter()
            .enumerate()
            .filter_map(|(idx, episode)| {
                let common = tokens(&episode.prompt).intersection(&query).count();
                (common > 0).then_some((common, idx, episode))
            })
            .collect();

        // Same denominator for every episode, so the shared-token count
        // orders exactly like the ratio.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, _, episode)| episode.clone())
            .collect()
    }

    pub async fn get_context(&self, key: &str) -> Option<serde_json::Value> {
        self.state.read().await.context.get(key).cloned()
    }

    pub async fn set_context(&self, key: impl Into<String>, value: serde_json::Value) {
        self.state.write().await.context.insert(key.into(), value);
    }

    pub async fn clear_context(&self) {
        self.state.write().await.context.clear();
    }

    pub async fn get_statistics(&self) -> MemoryStatistics {
        let state = self.state.read().await;

        let mut action_types = BTreeMap::new();
        for record in &state.actions {
            *action_types.entry(record.action.clone()).or_insert(0) += 1;
        }

        let size = |v: Result<Vec<u8>, serde_json::Error>| v.map_or(0, |b| b.len());
        let memory_usage_bytes = size(serde_json::to_vec(&state.episodes))
            + size(serde_json::to_vec(&state.actions))
            + size(serde_json::to_vec(&state.context));

        MemoryStatistics {
            episode_count: state.episodes.len(),
            action_count: state.actions.len(),
            context_keys: state.context.keys().cloned().collect(),
            action_types,
            memory_usage_bytes,
        }
    }

    pub async fn export_history(&self) -> HistoryExport {
        let state = self.state.read().await;
        HistoryExport {
            episodes: Some(state.episodes.iter().cloned().collect()),
            actions: Some(state.actions.iter().cloned().collect()),
            context: Some(state.context.clone()),
            exported_at: Some(Utc::now()),
        }
    }

    /// Replace the parts present in `doc`. Lists longer than the caps keep
    /// their newest entries.
    pub async fn import_history(&self, doc: HistoryExport) {
        let mut state = self.state.write().await;
        if let Some(episodes) = doc.episodes {
            state.episodes = bounded(episodes, self.max_episodes);
        }
        if let Some(actions) = doc.actions {
            state.actions = bounded(actions, self.max_actions);
        }
        if let Some(context) = doc.context {
            state.context = context;
        }
        info!(
            episodes = state.episodes.len(),
            actions = state.actions.len(),
            "History imported"
        );
    }
}
