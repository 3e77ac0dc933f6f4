//! In-memory reference implementation of [`WorkflowStore`].
//!
//! Deterministic and test-friendly. Transactions snapshot every table on
//! `begin` and restore the snapshot on `rollback`; they nest. Stage and level
//! ordinals are unique per parent, like the unique index a relational
//! backend would carry.

use crate::store::{LevelRecord, StageRecord, Transactional, VersionRecord, WorkflowStore};
use approval_types::*;
use std::collections::HashMap;

#[derive(Clone, Default)]
struct Tables {
    versions: HashMap<WorkflowVersionId, VersionRecord>,
    stages: HashMap<StageId, StageRecord>,
    levels: HashMap<ApprovalLevelId, LevelRecord>,
    formviews: Vec<(StageId, Formview)>,
    applications: HashMap<ApplicationId, Application>,
    activities: Vec<ApplicationActivity>,
    submissions: Vec<ApplicationSubmission>,
}

/// In-memory workflow store.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    tables: Tables,
    snapshots: Vec<Tables>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth of open transactions
    pub fn transaction_depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Every submission of an application, superseded ones included
    pub fn all_submissions(&self, application_id: &ApplicationId) -> Vec<ApplicationSubmission> {
        self.tables
            .submissions
            .iter()
            .filter(|s| &s.application_id == application_id)
            .cloned()
            .collect()
    }

    fn check_stage_ordinal(&self, record: &StageRecord) -> ApprovalResult<()> {
        let taken = self.tables.stages.values().any(|s| {
            s.id != record.id
                && s.workflow_version_id == record.workflow_version_id
                && s.ordinal_number == record.ordinal_number
        });
        if taken {
            return Err(ApprovalError::Conflict(format!(
                "stage ordinal {} already used in version {}",
                record.ordinal_number, record.workflow_version_id
            )));
        }
        Ok(())
    }

    fn check_level_ordinal(&self, record: &LevelRecord) -> ApprovalResult<()> {
        let taken = self.tables.levels.values().any(|l| {
            l.id != record.id
                && l.stage_id == record.stage_id
                && l.ordinal_number == record.ordinal_number
        });
        if taken {
            return Err(ApprovalError::Conflict(format!(
                "approval level ordinal {} already used in stage {}",
                record.ordinal_number, record.stage_id
            )));
        }
        Ok(())
    }
}

impl Transactional for InMemoryWorkflowStore {
    fn begin(&mut self) -> ApprovalResult<()> {
        self.snapshots.push(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> ApprovalResult<()> {
        self.snapshots
            .pop()
            .map(|_| ())
            .ok_or_else(|| ApprovalError::Backend("commit without an open transaction".into()))
    }

    fn rollback(&mut self) -> ApprovalResult<()> {
        let snapshot = self
            .snapshots
            .pop()
            .ok_or_else(|| ApprovalError::Backend("rollback without an open transaction".into()))?;
        self.tables = snapshot;
        Ok(())
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn insert_version(&mut self, record: VersionRecord) -> ApprovalResult<()> {
        if self.tables.versions.contains_key(&record.id) {
            return Err(ApprovalError::Conflict(format!(
                "workflow version {} already exists",
                record.id
            )));
        }
        self.tables.versions.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_version(&self, id: &WorkflowVersionId) -> ApprovalResult<Option<VersionRecord>> {
        Ok(self.tables.versions.get(id).cloned())
    }

    fn update_version(&mut self, record: VersionRecord) -> ApprovalResult<()> {
        let slot = self
            .tables
            .versions
            .get_mut(&record.id)
            .ok_or_else(|| ApprovalError::VersionNotFound(record.id.clone()))?;
        *slot = record;
        Ok(())
    }

    fn delete_version(&mut self, id: &WorkflowVersionId) -> ApprovalResult<()> {
        self.tables
            .versions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApprovalError::VersionNotFound(id.clone()))
    }

    fn insert_stage(&mut self, record: StageRecord) -> ApprovalResult<()> {
        if self.tables.stages.contains_key(&record.id) {
            return Err(ApprovalError::Conflict(format!("stage {} already exists", record.id)));
        }
        self.check_stage_ordinal(&record)?;
        self.tables.stages.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_stage(&self, id: &StageId) -> ApprovalResult<Option<StageRecord>> {
        Ok(self.tables.stages.get(id).cloned())
    }

    fn update_stage(&mut self, record: StageRecord) -> ApprovalResult<()> {
        if !self.tables.stages.contains_key(&record.id) {
            return Err(ApprovalError::StageNotFound(record.id.clone()));
        }
        self.check_stage_ordinal(&record)?;
        self.tables.stages.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete_stage(&mut self, id: &StageId) -> ApprovalResult<()> {
        self.tables
            .stages
            .remove(id)
            .ok_or_else(|| ApprovalError::StageNotFound(id.clone()))?;
        self.tables.formviews.retain(|(stage_id, _)| stage_id != id);
        Ok(())
    }

    fn list_stages(&self, version_id: &WorkflowVersionId) -> ApprovalResult<Vec<StageRecord>> {
        let mut stages: Vec<StageRecord> = self
            .tables
            .stages
            .values()
            .filter(|s| &s.workflow_version_id == version_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.ordinal_number);
        Ok(stages)
    }

    fn insert_level(&mut self, record: LevelRecord) -> ApprovalResult<()> {
        if self.tables.levels.contains_key(&record.id) {
            return Err(ApprovalError::Conflict(format!(
                "approval level {} already exists",
                record.id
            )));
        }
        self.check_level_ordinal(&record)?;
        self.tables.levels.insert(record.id.clone(), record);
        Ok(())
    }

    fn get_level(&self, id: &ApprovalLevelId) -> ApprovalResult<Option<LevelRecord>> {
        Ok(self.tables.levels.get(id).cloned())
    }

    fn update_level(&mut self, record: LevelRecord) -> ApprovalResult<()> {
        if !self.tables.levels.contains_key(&record.id) {
            return Err(ApprovalError::ApprovalLevelNotFound(record.id.clone()));
        }
        self.check_level_ordinal(&record)?;
        self.tables.levels.insert(record.id.clone(), record);
        Ok(())
    }

    fn delete_level(&mut self, id: &ApprovalLevelId) -> ApprovalResult<()> {
        self.tables
            .levels
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApprovalError::ApprovalLevelNotFound(id.clone()))
    }

    fn list_levels(&self, stage_id: &StageId) -> ApprovalResult<Vec<LevelRecord>> {
        let mut levels: Vec<LevelRecord> = self
            .tables
            .levels
            .values()
            .filter(|l| &l.stage_id == stage_id)
            .cloned()
            .collect();
        levels.sort_by_key(|l| l.ordinal_number);
        Ok(levels)
    }

    fn save_formview(&mut self, stage_id: &StageId, formview: Formview) -> ApprovalResult<()> {
        if !self.tables.stages.contains_key(stage_id) {
            return Err(ApprovalError::StageNotFound(stage_id.clone()));
        }
        let existing = self
            .tables
            .formviews
            .iter_mut()
            .find(|(s, f)| s == stage_id && f.field_key == formview.field_key);
        match existing {
            Some((_, slot)) => *slot = formview,
            None => self.tables.formviews.push((stage_id.clone(), formview)),
        }
        Ok(())
    }

    fn delete_formview(&mut self, stage_id: &StageId, field_key: &str) -> ApprovalResult<()> {
        let before = self.tables.formviews.len();
        self.tables
            .formviews
            .retain(|(s, f)| !(s == stage_id && f.field_key == field_key));
        if self.tables.formviews.len() == before {
            return Err(ApprovalError::NotFound(format!(
                "formview {} of stage {}",
                field_key, stage_id
            )));
        }
        Ok(())
    }

    fn list_formviews(&self, stage_id: &StageId) -> ApprovalResult<Vec<Formview>> {
        Ok(self
            .tables
            .formviews
            .iter()
            .filter(|(s, _)| s == stage_id)
            .map(|(_, f)| f.clone())
            .collect())
    }

    fn insert_application(&mut self, application: Application) -> ApprovalResult<()> {
        if self.tables.applications.contains_key(&application.id) {
            return Err(ApprovalError::Conflict(format!(
                "application {} already exists",
                application.id
            )));
        }
        self.tables
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    fn get_application(&self, id: &ApplicationId) -> ApprovalResult<Option<Application>> {
        Ok(self.tables.applications.get(id).cloned())
    }

    fn update_application(&mut self, application: Application) -> ApprovalResult<()> {
        let slot = self
            .tables
            .applications
            .get_mut(&application.id)
            .ok_or_else(|| ApprovalError::ApplicationNotFound(application.id.clone()))?;
        *slot = application;
        Ok(())
    }

    fn delete_application(&mut self, id: &ApplicationId) -> ApprovalResult<()> {
        self.tables
            .applications
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApprovalError::ApplicationNotFound(id.clone()))
    }

    fn count_applications(&self, version_id: &WorkflowVersionId) -> ApprovalResult<usize> {
        Ok(self
            .tables
            .applications
            .values()
            .filter(|a| &a.workflow_version_id == version_id)
            .count())
    }

    fn append_activity(&mut self, activity: ApplicationActivity) -> ApprovalResult<()> {
        self.tables.activities.push(activity);
        Ok(())
    }

    fn list_activities(&self, application_id: &ApplicationId) -> ApprovalResult<Vec<ApplicationActivity>> {
        Ok(self
            .tables
            .activities
            .iter()
            .filter(|a| &a.application_id == application_id)
            .cloned()
            .collect())
    }

    fn delete_activities(&mut self, application_id: &ApplicationId) -> ApprovalResult<usize> {
        let before = self.tables.activities.len();
        self.tables
            .activities
            .retain(|a| &a.application_id != application_id);
        Ok(before - self.tables.activities.len())
    }

    fn save_submission(&mut self, submission: ApplicationSubmission) -> ApprovalResult<()> {
        for earlier in self.tables.submissions.iter_mut().filter(|s| {
            s.application_id == submission.application_id && s.stage_id == submission.stage_id
        }) {
            earlier.superseded = true;
        }
        self.tables.submissions.push(submission);
        Ok(())
    }

    fn latest_submissions(
        &self,
        application_id: &ApplicationId,
    ) -> ApprovalResult<Vec<ApplicationSubmission>> {
        Ok(self
            .tables
            .submissions
            .iter()
            .filter(|s| &s.application_id == application_id && !s.superseded)
            .cloned()
            .collect())
    }

    fn delete_submissions(&mut self, application_id: &ApplicationId) -> ApprovalResult<usize> {
        let before = self.tables.submissions.len();
        self.tables
            .submissions
            .retain(|s| &s.application_id != application_id);
        Ok(before - self.tables.submissions.len())
    }
}
