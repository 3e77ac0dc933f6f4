//! Approval Workflow Forms
//!
//! Applications carry a JSON form. The **form schema** belongs to the
//! workflow version and lists fields, either at the top level or grouped
//! into sections. Each stage narrows the schema through its formviews, and
//! applicants submit **form data** per stage.
//!
//! The mergers in [`merger`] walk the stages an application has worked
//! through and produce the schema and data a user sees, for one of three
//! [`MergePurpose`]s.

#![deny(unsafe_code)]

mod condition;
mod data;
mod errors;
mod limits;
pub mod merger;
mod schema;

pub use condition::*;
pub use data::*;
pub use errors::*;
pub use limits::*;
pub use merger::{
    merge_form_contents, FormContents, FormDataMerger, FormSchemaMerger, MergePurpose,
    NoAdjustment, SchemaAdjuster,
};
pub use schema::*;
