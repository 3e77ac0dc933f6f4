//! Applications: a single request moving through a workflow version

use crate::{
    ApplicationId, ApplicationState, ApprovalError, ApprovalResult, StageId, StageType, UserId,
    WorkflowVersionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An application progressing through workflow stages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub title: String,
    pub workflow_version_id: WorkflowVersionId,
    /// Who the application is for
    pub applicant: UserId,
    /// Who created it (may differ from the applicant)
    pub creator: UserId,
    current_state: ApplicationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        workflow_version_id: WorkflowVersionId,
        title: impl Into<String>,
        creator: UserId,
        applicant: Option<UserId>,
        start_state: ApplicationState,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::generate(),
            title: title.into(),
            workflow_version_id,
            applicant: applicant.unwrap_or_else(|| creator.clone()),
            creator,
            current_state: start_state,
            submitted_at: None,
            submitter: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_state(&self) -> &ApplicationState {
        &self.current_state
    }

    pub fn current_stage_id(&self) -> &StageId {
        self.current_state.stage_id()
    }

    /// Overwrite the current state without running any stage hooks
    pub fn set_current_state(&mut self, state: ApplicationState) {
        self.current_state = state;
        self.updated_at = Utc::now();
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// Mark the application submitted for the first time
    pub fn mark_submitted(&mut self, submitter: UserId) -> ApprovalResult<()> {
        if self.submitted_at.is_some() {
            return Err(ApprovalError::AlreadySubmitted);
        }
        let now = Utc::now();
        self.submitted_at = Some(now);
        self.submitter = Some(submitter);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_completed(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Coarse progress, given the type of the current stage
    pub fn overall_progress(&self, current_stage_type: StageType) -> OverallProgress {
        if self.current_state.is_draft() {
            OverallProgress::Draft
        } else if current_stage_type == StageType::Finished {
            OverallProgress::Finished
        } else {
            OverallProgress::InProgress
        }
    }
}

/// Coarse progress of an application, for dashboards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallProgress {
    Draft,
    InProgress,
    Finished,
}

// ── Submissions ──────────────────────────────────────────────────────

/// Form data submitted for an application at a given stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub application_id: ApplicationId,
    pub user: UserId,
    pub stage_id: StageId,
    /// JSON object of field values
    pub form_data: String,
    /// Replaced by a later submission for the same stage
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
}

impl ApplicationSubmission {
    pub fn new(
        application_id: ApplicationId,
        user: UserId,
        stage_id: StageId,
        form_data: impl Into<String>,
    ) -> Self {
        Self {
            application_id,
            user,
            stage_id,
            form_data: form_data.into(),
            superseded: false,
            created_at: Utc::now(),
        }
    }
}
