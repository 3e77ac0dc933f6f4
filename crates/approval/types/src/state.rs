//! Application state: where an application currently sits in its workflow

use crate::{ApprovalLevelId, StageId};
use serde::{Deserialize, Serialize};

/// Immutable position of an application: `(stage, draft, approval level)`.
///
/// `is_draft` is only set by the creation state of a form-submission
/// stage; `approval_level_id` is only set inside approvals stages.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationState {
    stage_id: StageId,
    is_draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approval_level_id: Option<ApprovalLevelId>,
}

impl ApplicationState {
    pub fn new(stage_id: StageId, is_draft: bool, approval_level_id: Option<ApprovalLevelId>) -> Self {
        Self {
            stage_id,
            is_draft,
            approval_level_id,
        }
    }

    /// State at the start of a stage without approval levels
    pub fn at_stage(stage_id: StageId) -> Self {
        Self::new(stage_id, false, None)
    }

    /// State at a given approval level
    pub fn at_level(stage_id: StageId, level_id: ApprovalLevelId) -> Self {
        Self::new(stage_id, false, Some(level_id))
    }

    pub fn stage_id(&self) -> &StageId {
        &self.stage_id
    }

    pub fn is_draft(&self) -> bool {
        self.is_draft
    }

    pub fn approval_level_id(&self) -> Option<&ApprovalLevelId> {
        self.approval_level_id.as_ref()
    }

    /// True when both states are the same position, draft flag included
    pub fn is_same_as(&self, other: &ApplicationState) -> bool {
        self == other
    }
}

impl std::fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage={}", self.stage_id)?;
        if let Some(level) = &self.approval_level_id {
            write!(f, " level={}", level)?;
        }
        if self.is_draft {
            write!(f, " (draft)")?;
        }
        Ok(())
    }
}
