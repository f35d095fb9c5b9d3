//! Workflow manager.
//!
//! Ties a [`Registry`] to a [`Storage`] backend and owns the middle tier of
//! listeners shared by every workflow it creates or loads.

use crate::error::StorageError;
use crate::state::Storage;
use placenet_core::{
    BoxError, CoreError, Definition, Event, EventKind, GuardEvent, ListenerId, Listeners, Place,
    Registry, SharedListeners, SharedWorkflow, Workflow,
};
use std::sync::Arc;

/// Creates, loads, saves and deletes persisted workflows.
pub struct Manager {
    registry: Arc<Registry>,
    storage: Arc<dyn Storage>,
    listeners: SharedListeners,
}

impl Manager {
    pub fn new(registry: Arc<Registry>, storage: Arc<dyn Storage>) -> Self {
        Self {
            registry,
            storage,
            listeners: Listeners::shared(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Creates a workflow, persists its initial state and registers it.
    pub fn create_workflow(
        &self,
        id: &str,
        definition: Arc<Definition>,
        initial_place: impl Into<Place>,
    ) -> Result<SharedWorkflow, StorageError> {
        if self.registry.has_workflow(id) {
            return Err(CoreError::WorkflowExists {
                name: id.to_string(),
            }
            .into());
        }

        let mut workflow = Workflow::new(id, definition, initial_place)?;
        workflow.set_manager(&self.listeners);
        self.save(&workflow)?;

        let shared = workflow.into_shared();
        self.registry.add_workflow(shared.clone())?;
        tracing::info!("Created workflow {}", id);
        Ok(shared)
    }

    /// Loads a workflow from storage, replacing any registered instance.
    pub fn load_workflow(
        &self,
        id: &str,
        definition: Arc<Definition>,
    ) -> Result<SharedWorkflow, StorageError> {
        let (places, context) = self.storage.load_state(id)?;
        let mut workflow = Workflow::restore(id, definition, &places, context)?;
        workflow.set_manager(&self.listeners);

        let shared = workflow.into_shared();
        // Stale entries are replaced by what storage holds.
        self.registry.replace_workflow(shared.clone());
        tracing::debug!("Loaded workflow {} at {:?}", id, places);
        Ok(shared)
    }

    /// Returns the registered instance, loading it from storage if needed.
    pub fn get_workflow(
        &self,
        id: &str,
        definition: Arc<Definition>,
    ) -> Result<SharedWorkflow, StorageError> {
        match self.registry.workflow(id) {
            Ok(workflow) => Ok(workflow),
            Err(_) => self.load_workflow(id, definition),
        }
    }

    /// Persists a registered workflow.
    pub fn save_workflow(&self, id: &str) -> Result<(), StorageError> {
        let shared = self.registry.workflow(id)?;
        let workflow = shared.lock();
        self.save(&workflow)
    }

    /// Persists the places and context of `workflow`.
    pub fn save(&self, workflow: &Workflow) -> Result<(), StorageError> {
        self.storage.save_state(
            workflow.name(),
            workflow.marking().as_slice(),
            workflow.context_map(),
        )
    }

    /// Unregisters a workflow and deletes its state.
    pub fn delete_workflow(&self, id: &str) -> Result<(), StorageError> {
        match self.registry.remove_workflow(id) {
            Ok(shared) => {
                shared.lock().clear_manager();
            }
            Err(CoreError::WorkflowNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.storage.delete_state(id)?;
        tracing::info!("Deleted workflow {}", id);
        Ok(())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers a listener run for every workflow of this manager.
    pub fn add_event_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.write().add_event_listener(kind, listener)
    }

    /// Registers a guard listener run for every workflow of this manager.
    pub fn add_guard_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&mut GuardEvent<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.listeners.write().add_guard_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(id)
    }

    pub fn listeners(&self) -> &SharedListeners {
        &self.listeners
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("workflows", &self.registry.len())
            .field("listeners", &*self.listeners.read())
            .finish()
    }
}
