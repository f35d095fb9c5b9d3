//! # placenet-storage
//!
//! Persistence for placenet workflows.
//!
//! This crate provides:
//! - Workflow state storage (in-memory and JSON files with checksums)
//! - Transition history with filtering and pagination
//! - A history listener that records every applied transition
//! - The [`Manager`], which creates, loads, saves and deletes workflows

pub mod error;
pub mod history;
pub mod manager;
pub mod state;

pub use error::StorageError;
pub use history::{
    history_listener, FileHistory, HistoryStore, MemoryHistory, QueryOptions, TransitionRecord,
    ACTOR_KEY, NOTES_KEY,
};
pub use manager::Manager;
pub use state::{FileStorage, MemoryStorage, Storage};
