//! Transition history.
//!
//! The engine does not write history itself. [`history_listener`] builds a
//! [`TransitionRecord`] from every `after_transition` event and hands it to
//! a [`HistoryStore`].

use crate::error::StorageError;
use crate::state::validate_id;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use placenet_core::{BoxError, Event, Place};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Call-context key read into [`TransitionRecord::notes`].
pub const NOTES_KEY: &str = "notes";

/// Call-context key read into [`TransitionRecord::actor`].
pub const ACTOR_KEY: &str = "actor";

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub workflow_id: String,
    pub from: Vec<Place>,
    pub to: Vec<Place>,
    pub transition: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub actor: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, Value>,
}

impl TransitionRecord {
    /// Builds a record from an event. `notes` and `actor` come from the call
    /// context; every other context value lands in `custom_fields`.
    pub fn from_event(event: &Event<'_>) -> Self {
        let ctx = event.call_context();
        let text = |key: &str| {
            ctx.value(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let custom_fields = ctx
            .values()
            .iter()
            .filter(|(k, _)| k.as_str() != NOTES_KEY && k.as_str() != ACTOR_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            workflow_id: event.workflow().name().to_string(),
            from: event.from().to_vec(),
            to: event.to().to_vec(),
            transition: event.transition().name().to_string(),
            notes: text(NOTES_KEY),
            actor: text(ACTOR_KEY),
            created_at: Utc::now(),
            custom_fields,
        }
    }
}

/// Filtering and pagination for [`HistoryStore::list_history`].
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Maximum records to return (`None` = all).
    pub limit: Option<usize>,
    pub offset: usize,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub actor: Option<String>,
    pub transition: Option<String>,
}

impl QueryOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_transition(mut self, transition: impl Into<String>) -> Self {
        self.transition = Some(transition.into());
        self
    }

    fn matches(&self, record: &TransitionRecord) -> bool {
        self.from_date.map_or(true, |d| record.created_at >= d)
            && self.to_date.map_or(true, |d| record.created_at <= d)
            && self.actor.as_ref().map_or(true, |a| &record.actor == a)
            && self
                .transition
                .as_ref()
                .map_or(true, |t| &record.transition == t)
    }

    /// Filters, orders newest first, then paginates.
    fn apply(&self, records: Vec<TransitionRecord>) -> Vec<TransitionRecord> {
        let mut matching: Vec<TransitionRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        // Stored order is append order; reversing first keeps ties newest first.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Saves and queries transition history.
pub trait HistoryStore: Send + Sync {
    fn save_transition(&self, record: &TransitionRecord) -> Result<(), StorageError>;

    /// Returns matching records for one workflow, newest first.
    fn list_history(
        &self,
        workflow_id: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<TransitionRecord>, StorageError>;
}

/// Returns an `after_transition` listener that records every applied
/// transition in `store`.
pub fn history_listener(
    store: Arc<dyn HistoryStore>,
) -> impl Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static {
    move |event: &Event<'_>| {
        store.save_transition(&TransitionRecord::from_event(event))?;
        Ok(())
    }
}

/// In-memory history.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: RwLock<HashMap<String, Vec<TransitionRecord>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn save_transition(&self, record: &TransitionRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .entry(record.workflow_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_history(
        &self,
        workflow_id: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<TransitionRecord>, StorageError> {
        let records = self
            .records
            .read()
            .get(workflow_id)
            .cloned()
            .unwrap_or_default();
        Ok(opts.apply(records))
    }
}

/// File-backed history: one JSON-lines file per workflow.
#[derive(Debug)]
pub struct FileHistory {
    dir: PathBuf,
}

impl FileHistory {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn history_path(&self, workflow_id: &str) -> Result<PathBuf, StorageError> {
        validate_id(workflow_id)?;
        Ok(self.dir.join(format!("{}.jsonl", workflow_id)))
    }

    /// Removes all history of a workflow.
    pub fn purge(&self, workflow_id: &str) -> Result<(), StorageError> {
        let path = self.history_path(workflow_id)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl HistoryStore for FileHistory {
    fn save_transition(&self, record: &TransitionRecord) -> Result<(), StorageError> {
        let path = self.history_path(&record.workflow_id)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }

    fn list_history(
        &self,
        workflow_id: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<TransitionRecord>, StorageError> {
        let path = self.history_path(workflow_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for line in BufReader::new(File::open(&path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(opts.apply(records))
    }
}
