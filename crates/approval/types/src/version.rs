//! Workflow versions: the ordered stages an application passes through
//!
//! Versions are edited while in draft, then activated. Applications can
//! only be created against an active version.

use crate::{
    ApplicationState, ApprovalError, ApprovalLevelId, ApprovalResult, StageId, StageType,
    WorkflowStage, WorkflowVersionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publication status of a workflow version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Active,
    Archived,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStatus::Draft => write!(f, "draft"),
            VersionStatus::Active => write!(f, "active"),
            VersionStatus::Archived => write!(f, "archived"),
        }
    }
}

/// A workflow version with its stages ordered by ordinal number
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub id: WorkflowVersionId,
    pub name: String,
    pub status: VersionStatus,
    /// JSON form schema applicants fill in
    pub form_schema: String,
    pub stages: Vec<WorkflowStage>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersion {
    pub fn new(name: impl Into<String>, form_schema: impl Into<String>) -> Self {
        Self {
            id: WorkflowVersionId::generate(),
            name: name.into(),
            status: VersionStatus::Draft,
            form_schema: form_schema.into(),
            stages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: WorkflowVersionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: VersionStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a stage; its ordinal number is set to the next position
    pub fn with_stage(mut self, mut stage: WorkflowStage) -> Self {
        stage.workflow_version_id = self.id.clone();
        stage.ordinal_number = self.stages.len() as i64 + 1;
        self.stages.push(stage);
        self
    }

    pub fn is_draft(&self) -> bool {
        self.status == VersionStatus::Draft
    }

    pub fn is_active(&self) -> bool {
        self.status == VersionStatus::Active
    }

    /// Get a stage of this version
    pub fn stage(&self, id: &StageId) -> ApprovalResult<&WorkflowStage> {
        self.stages
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| ApprovalError::StageNotFound(id.clone()))
    }

    pub fn first_stage(&self) -> Option<&WorkflowStage> {
        self.stages.first()
    }

    pub fn last_stage(&self) -> Option<&WorkflowStage> {
        self.stages.last()
    }

    /// The stage after `id`, or `None` if `id` is last or unknown
    pub fn next_stage(&self, id: &StageId) -> Option<&WorkflowStage> {
        let pos = self.stages.iter().position(|s| &s.id == id)?;
        self.stages.get(pos + 1)
    }

    /// The stage before `id`, or `None` if `id` is first or unknown
    pub fn previous_stage(&self, id: &StageId) -> Option<&WorkflowStage> {
        let pos = self.stages.iter().position(|s| &s.id == id)?;
        pos.checked_sub(1).and_then(|p| self.stages.get(p))
    }

    /// Stages from the first one up to and including `id`
    pub fn working_stages(&self, id: &StageId) -> ApprovalResult<Vec<&WorkflowStage>> {
        let pos = self
            .stages
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| ApprovalError::StageNotFound(id.clone()))?;
        Ok(self.stages[..=pos].iter().collect())
    }

    pub fn stages_of_type(&self, stage_type: StageType) -> impl Iterator<Item = &WorkflowStage> {
        self.stages.iter().filter(move |s| s.stage_type == stage_type)
    }

    /// Whether the given approval level belongs to any stage of this version
    pub fn has_approval_level(&self, level_id: &ApprovalLevelId) -> bool {
        self.stages.iter().any(|s| s.has_level(level_id))
    }

    /// Stage type at the given application state
    pub fn stage_type_of(&self, state: &ApplicationState) -> ApprovalResult<StageType> {
        Ok(self.stage(state.stage_id())?.stage_type)
    }

    /// Structural checks performed before a version is activated
    pub fn validate(&self) -> ApprovalResult<()> {
        let first = self
            .first_stage()
            .ok_or_else(|| ApprovalError::ValidationError("Workflow version has no stages".into()))?;
        if !first.stage_type.behaviour().can_start {
            return Err(ApprovalError::ValidationError(format!(
                "First stage '{}' must be a form submission stage",
                first.name
            )));
        }
        if let Some(last) = self.last_stage() {
            if last.stage_type != StageType::Finished {
                return Err(ApprovalError::ValidationError(
                    "Last stage must be a finished stage".into(),
                ));
            }
        }
        for stage in self.stages_of_type(StageType::Approvals) {
            if stage.approval_levels.is_empty() {
                return Err(ApprovalError::NoApprovalLevels(stage.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_version() -> WorkflowVersion {
        let v = WorkflowVersionId::new("v1");
        WorkflowVersion::new("Travel", "{}")
            .with_id(v.clone())
            .with_stage(
                WorkflowStage::new(v.clone(), "Request", StageType::FormSubmission, 0)
                    .with_id(StageId::new("s1")),
            )
            .with_stage(
                WorkflowStage::new(v.clone(), "Approval", StageType::Approvals, 0)
                    .with_id(StageId::new("s2"))
                    .with_level(ApprovalLevelId::new("l1"), "Manager"),
            )
            .with_stage(
                WorkflowStage::new(v, "Done", StageType::Finished, 0).with_id(StageId::new("s3")),
            )
    }

    #[test]
    fn test_stage_navigation() {
        let version = make_version();
        let s1 = StageId::new("s1");
        let s2 = StageId::new("s2");
        let s3 = StageId::new("s3");

        assert_eq!(version.next_stage(&s1).unwrap().id, s2);
        assert!(version.next_stage(&s3).is_none());
        assert_eq!(version.previous_stage(&s2).unwrap().id, s1);
        assert!(version.previous_stage(&s1).is_none());
        assert!(version.next_stage(&StageId::new("nope")).is_none());
        assert_eq!(version.stages[2].ordinal_number, 3);
    }

    #[test]
    fn test_working_stages() {
        let version = make_version();
        let ids: Vec<_> = version
            .working_stages(&StageId::new("s2"))
            .unwrap()
            .into_iter()
            .map(|s| s.id.0.clone())
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(version.working_stages(&StageId::new("nope")).is_err());
    }

    #[test]
    fn test_has_approval_level() {
        let version = make_version();
        assert!(version.has_approval_level(&ApprovalLevelId::new("l1")));
        assert!(!version.has_approval_level(&ApprovalLevelId::new("l9")));
    }

    #[test]
    fn test_validate() {
        assert!(make_version().validate().is_ok());

        let mut no_levels = make_version();
        no_levels.stages[1].approval_levels.clear();
        assert!(matches!(
            no_levels.validate(),
            Err(ApprovalError::NoApprovalLevels(_))
        ));

        let mut bad_start = make_version();
        bad_start.stages[0].stage_type = StageType::Waiting;
        assert!(bad_start.validate().is_err());

        let empty = WorkflowVersion::new("Empty", "{}");
        assert!(empty.validate().is_err());
    }
}
