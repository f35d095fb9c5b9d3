//! Workflow state storage.
//!
//! A workflow is fully described by its ordered places and its flat
//! context map; [`Storage`] persists exactly those two values.

use crate::error::StorageError;
use parking_lot::RwLock;
use placenet_core::{ContextMap, Place};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Persists workflow places and context by workflow id.
pub trait Storage: Send + Sync {
    fn load_state(&self, id: &str) -> Result<(Vec<Place>, ContextMap), StorageError>;

    fn save_state(&self, id: &str, places: &[Place], context: &ContextMap)
        -> Result<(), StorageError>;

    /// Deletes the state. Deleting unknown state succeeds.
    fn delete_state(&self, id: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
struct StoredState {
    places: Vec<Place>,
    context: ContextMap,
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    states: RwLock<HashMap<String, StoredState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn load_state(&self, id: &str) -> Result<(Vec<Place>, ContextMap), StorageError> {
        self.states
            .read()
            .get(id)
            .map(|s| (s.places.clone(), s.context.clone()))
            .ok_or_else(|| StorageError::StateNotFound(id.to_string()))
    }

    fn save_state(
        &self,
        id: &str,
        places: &[Place],
        context: &ContextMap,
    ) -> Result<(), StorageError> {
        if places.is_empty() {
            return Err(StorageError::EmptyMarking(id.to_string()));
        }
        self.states.write().insert(
            id.to_string(),
            StoredState {
                places: places.to_vec(),
                context: context.clone(),
            },
        );
        Ok(())
    }

    fn delete_state(&self, id: &str) -> Result<(), StorageError> {
        self.states.write().remove(id);
        Ok(())
    }
}

/// State document written by [`FileStorage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateRecord {
    id: String,
    places: Vec<Place>,
    context: ContextMap,
    /// Unix millis.
    saved_at: i64,
    /// CRC32C of the serialized places and context.
    checksum: String,
}

/// File-backed storage: one JSON document per workflow.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens or creates a state directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the ids of all stored workflows, sorted.
    pub fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn state_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl Storage for FileStorage {
    fn load_state(&self, id: &str) -> Result<(Vec<Place>, ContextMap), StorageError> {
        let path = self.state_path(id)?;
        if !path.exists() {
            return Err(StorageError::StateNotFound(id.to_string()));
        }

        let file = File::open(&path)?;
        let record: StateRecord = serde_json::from_reader(BufReader::new(file))?;

        let actual = state_checksum(&record.places, &record.context)?;
        if actual != record.checksum {
            return Err(StorageError::Corruption(format!(
                "workflow state {} checksum mismatch",
                id
            )));
        }

        tracing::debug!("Loaded state for workflow {}: {:?}", id, record.places);
        Ok((record.places, record.context))
    }

    fn save_state(
        &self,
        id: &str,
        places: &[Place],
        context: &ContextMap,
    ) -> Result<(), StorageError> {
        if places.is_empty() {
            return Err(StorageError::EmptyMarking(id.to_string()));
        }
        let path = self.state_path(id)?;

        let record = StateRecord {
            id: id.to_string(),
            places: places.to_vec(),
            context: context.clone(),
            saved_at: chrono::Utc::now().timestamp_millis(),
            checksum: state_checksum(places, context)?,
        };

        // Write to a temp file then rename so a crash never leaves half a document.
        let tmp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &record)?;
            writer.flush()?;
        }
        fs::rename(&tmp_path, &path)?;

        tracing::debug!("Saved state for workflow {}: {:?}", id, places);
        Ok(())
    }

    fn delete_state(&self, id: &str) -> Result<(), StorageError> {
        let path = self.state_path(id)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

fn state_checksum(places: &[Place], context: &ContextMap) -> Result<String, StorageError> {
    let bytes = serde_json::to_vec(&(places, context))?;
    Ok(format!("{:08x}", crc32c::crc32c(&bytes)))
}

/// Ids double as file names: allow only `[A-Za-z0-9_.-]`, not starting with `.`.
pub(crate) fn validate_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidId(id.to_string()))
    }
}
