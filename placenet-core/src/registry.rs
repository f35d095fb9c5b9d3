//! Registry of live workflow instances.

use crate::error::CoreError;
use crate::workflow::SharedWorkflow;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Thread-safe directory mapping workflow name to instance.
///
/// Lookups take a read lock and may run concurrently; inserts and removals
/// take the write lock. Instances are shared, never copied.
#[derive(Debug, Default)]
pub struct Registry {
    workflows: RwLock<HashMap<String, SharedWorkflow>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a workflow under its own name.
    ///
    /// Locks the workflow briefly to read its name, so the caller must not
    /// hold that workflow's guard while registering it.
    pub fn add_workflow(&self, workflow: SharedWorkflow) -> Result<(), CoreError> {
        // Read the name before taking the registry lock.
        let name = workflow.lock().name().to_string();

        let mut workflows = self.workflows.write();
        if workflows.contains_key(&name) {
            return Err(CoreError::WorkflowExists { name });
        }
        workflows.insert(name, workflow);
        Ok(())
    }

    /// Registers a workflow under its own name, replacing any entry with
    /// that name in one step. Returns the replaced entry.
    ///
    /// Like [`Registry::add_workflow`], the caller must not hold the
    /// workflow's guard.
    pub fn replace_workflow(&self, workflow: SharedWorkflow) -> Option<SharedWorkflow> {
        let name = workflow.lock().name().to_string();
        self.workflows.write().insert(name, workflow)
    }

    pub fn workflow(&self, name: &str) -> Result<SharedWorkflow, CoreError> {
        self.workflows
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::WorkflowNotFound {
                name: name.to_string(),
            })
    }

    /// Removes a workflow and returns it.
    pub fn remove_workflow(&self, name: &str) -> Result<SharedWorkflow, CoreError> {
        self.workflows
            .write()
            .remove(name)
            .ok_or_else(|| CoreError::WorkflowNotFound {
                name: name.to_string(),
            })
    }

    /// Returns all workflow names, sorted.
    pub fn list_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workflows.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_workflow(&self, name: &str) -> bool {
        self.workflows.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.workflows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.read().is_empty()
    }
}
