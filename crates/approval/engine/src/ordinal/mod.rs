//! Ordinal bookkeeping for ordered children of a parent
//!
//! Stages are ordered within a workflow version and approval levels within
//! a stage. Their ordinal numbers form a dense `1..=N` sequence per parent:
//!
//! - [`Allocate`] hands out the next ordinal for a new child
//! - [`Shift`] closes the gap left by a deleted child
//! - [`Reorder`] renumbers children to a caller-supplied order
//!
//! The operations are generic over an [`OrdinalRepository`]; the concrete
//! scopes over a [`WorkflowStore`](crate::WorkflowStore) live in [`scopes`].

mod allocate;
mod reorder;
pub mod scopes;
mod shift;

pub use allocate::Allocate;
pub use reorder::Reorder;
pub use scopes::{LevelOrdinals, StageOrdinals};
pub use shift::Shift;

use crate::store::Transactional;
use approval_types::ApprovalResult;
use std::fmt::Display;
use std::hash::Hash;

/// Storage of ordered items grouped under a parent
pub trait OrdinalRepository: Transactional {
    type Parent: Clone + PartialEq + Display;
    type Item: Clone + Eq + Hash + Display;

    /// `(item, ordinal)` pairs of every child of `parent`
    fn ordinals(&self, parent: &Self::Parent) -> ApprovalResult<Vec<(Self::Item, i64)>>;

    /// Parent of an existing item, `None` if the item does not exist
    fn parent_of(&self, item: &Self::Item) -> ApprovalResult<Option<Self::Parent>>;

    /// Write an item's ordinal; `stamp` updates its modification time
    fn set_ordinal(&mut self, item: &Self::Item, ordinal: i64, stamp: bool) -> ApprovalResult<()>;
}

/// What was known about an item before it was deleted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedItem<I, P> {
    pub item: I,
    pub parent: P,
    pub ordinal: i64,
}

impl<I, P> RemovedItem<I, P> {
    pub fn new(item: I, parent: P, ordinal: i64) -> Self {
        Self {
            item,
            parent,
            ordinal,
        }
    }
}
