//! Approval Workflow Engine
//!
//! Runs applications through the stages of a workflow version:
//!
//! - **State managers** ([`StateManager`]) decide an application's next and
//!   previous state and record stage activities, per stage type
//! - **Ordinals** ([`ordinal`]) keep stages and approval levels densely
//!   numbered through inserts, deletes and reorders
//! - **Store** ([`WorkflowStore`]) persists versions, stages, levels,
//!   formviews, applications, activities and submissions, with
//!   closure-scoped transactions
//! - **Engine** ([`ApprovalEngine`]) edits workflow versions, drives the
//!   application lifecycle and merges application forms
//!
//! All operations are synchronous and fail fast; a failed operation rolls
//! its writes back.

#![deny(unsafe_code)]

pub mod config;
pub mod editor;
pub mod engine;
pub mod errors;
pub mod form_contents;
pub mod lifecycle;
pub mod memory;
pub mod ordinal;
pub mod state_manager;
pub mod store;

pub use config::{ApprovalConfig, OrdinalConfig};
pub use editor::DEFAULT_LEVEL_NAME;
pub use engine::ApprovalEngine;
pub use errors::{EngineError, EngineResult};
pub use memory::InMemoryWorkflowStore;
pub use ordinal::{
    Allocate, LevelOrdinals, OrdinalRepository, RemovedItem, Reorder, Shift, StageOrdinals,
};
pub use state_manager::{StageContext, StateManager};
pub use store::{
    LevelRecord, StageRecord, StoreRecorder, Transactional, VersionRecord, WorkflowStore,
};
