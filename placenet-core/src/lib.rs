//! # placenet-core
//!
//! Place/transition workflow engine for placenet.
//!
//! This crate provides:
//! - Transition and definition construction and validation
//! - Markings (the places an instance currently occupies)
//! - Guard evaluation: constraints plus three-tier listener dispatch
//! - Transition application with before/after events
//! - A thread-safe registry of live workflows
//! - Mermaid state-diagram rendering

pub mod definition;
pub mod diagram;
pub mod error;
pub mod event;
pub mod listener;
pub mod marking;
pub mod place;
pub mod registry;
pub mod transition;
pub mod workflow;

pub use definition::{Definition, DefinitionDocument, TransitionDocument};
pub use diagram::Diagram;
pub use error::{BoxError, CoreError, Side};
pub use event::{CallContext, Event, EventKind, GuardEvent};
pub use listener::{ListenerId, Listeners, SharedListeners};
pub use marking::Marking;
pub use place::{places, Place};
pub use registry::Registry;
pub use transition::{Constraint, Transition};
pub use workflow::{ContextMap, SharedWorkflow, Workflow};
