//! Approval Workflow Domain Types
//!
//! An approval workflow moves an **application** through the ordered
//! **stages** of a workflow version. Approvals stages are further split
//! into ordered **approval levels**, each of which must sign off before
//! the application moves on.
//!
//! # Key Concepts
//!
//! - **WorkflowVersion**: the ordered stages an application passes through,
//!   together with the JSON form schema applicants fill in.
//! - **WorkflowStage**: one step of a version. Its [`StageType`] decides how
//!   an application enters, leaves and moves through it.
//! - **ApprovalLevel**: an ordered sub-step of an approvals stage.
//! - **ApplicationState**: the immutable `(stage, draft, level)` position of
//!   an application.
//! - **Formview**: how a single form field is presented at a stage.
//!
//! Ordinal numbers of stages within a version, and of levels within a
//! stage, form a dense `1..=N` sequence.

#![deny(unsafe_code)]

mod activity;
mod application;
mod errors;
mod ids;
mod stage;
mod state;
mod version;

pub use activity::*;
pub use application::*;
pub use errors::*;
pub use ids::*;
pub use stage::*;
pub use state::*;
pub use version::*;
