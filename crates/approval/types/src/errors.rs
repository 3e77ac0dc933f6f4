//! Error types for the approval workflow layer

use crate::{ApplicationId, ApprovalLevelId, StageId, StageType, WorkflowVersionId};

/// Errors that can occur in approval workflow operations
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    // ── Lookups ──────────────────────────────────────────────────────
    #[error("Workflow version not found: {0}")]
    VersionNotFound(WorkflowVersionId),

    #[error("Workflow stage not found: {0}")]
    StageNotFound(StageId),

    #[error("Approval level not found: {0}")]
    ApprovalLevelNotFound(ApprovalLevelId),

    #[error("Application not found: {0}")]
    ApplicationNotFound(ApplicationId),

    // ── State transitions ────────────────────────────────────────────
    #[error("Application stage is not of type {expected}")]
    StageTypeMismatch { expected: StageType, actual: StageType },

    #[error("An application can not start in {} stage", .0.with_article())]
    IllegalStart(StageType),

    #[error("Can not exit a finished state")]
    FinishedStateExit,

    #[error("Finished stage {0} has no next or previous state")]
    TerminalStage(StageId),

    #[error("No next stage")]
    NoNextStage,

    #[error("No previous stage")]
    NoPreviousStage,

    #[error("Approvals stage {0} has no approval levels")]
    NoApprovalLevels(StageId),

    #[error("Invalid application state: {0}")]
    InvalidState(String),

    #[error("Application has already been submitted")]
    AlreadySubmitted,

    // ── Workflow editing ─────────────────────────────────────────────
    #[error("Workflow version {0} is not a draft")]
    VersionNotDraft(WorkflowVersionId),

    #[error("Workflow version {0} is not active")]
    VersionNotActive(WorkflowVersionId),

    #[error("Workflow stage {0} is not active")]
    StageNotActive(StageId),

    // ── Ordinals ─────────────────────────────────────────────────────
    #[error("Ordinal item {0}: item is not deleted")]
    ItemNotDeleted(String),

    #[error("Ordinal item {item}: item does not belong to the parent {parent}")]
    ForeignItem { item: String, parent: String },

    #[error("Ordinal items do not match: {0}")]
    ItemsMismatch(String),

    // ── Storage ──────────────────────────────────────────────────────
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),

    // ── Misc ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow validation error: {0}")]
    ValidationError(String),
}

/// Result type alias for approval workflow operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_start_messages() {
        assert_eq!(
            ApprovalError::IllegalStart(StageType::Approvals).to_string(),
            "An application can not start in an approval stage"
        );
        assert_eq!(
            ApprovalError::IllegalStart(StageType::Waiting).to_string(),
            "An application can not start in a waiting stage"
        );
    }

    #[test]
    fn test_stage_type_mismatch_message() {
        let err = ApprovalError::StageTypeMismatch {
            expected: StageType::Waiting,
            actual: StageType::Finished,
        };
        assert_eq!(err.to_string(), "Application stage is not of type waiting");
    }
}
