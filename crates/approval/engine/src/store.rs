//! Storage interface for workflow and application records
//!
//! Stages, approval levels and formviews are stored as separate rows so
//! that ordinal bookkeeping can rewrite individual rows. [`WorkflowStore::load_version`]
//! assembles them back into a [`WorkflowVersion`].

use approval_types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Transactions ─────────────────────────────────────────────────────

/// Explicit begin / commit / rollback, plus a closure helper
pub trait Transactional {
    fn begin(&mut self) -> ApprovalResult<()>;
    fn commit(&mut self) -> ApprovalResult<()>;
    fn rollback(&mut self) -> ApprovalResult<()>;

    /// Run `f` in a transaction; any error rolls every write back
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<ApprovalError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::error!(error = %rollback_err, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: WorkflowVersionId,
    pub name: String,
    pub status: VersionStatus,
    pub form_schema: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(name: impl Into<String>, form_schema: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowVersionId::generate(),
            name: name.into(),
            status: VersionStatus::Draft,
            form_schema: form_schema.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: StageId,
    pub workflow_version_id: WorkflowVersionId,
    pub name: String,
    pub stage_type: StageType,
    pub ordinal_number: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StageRecord {
    pub fn new(
        workflow_version_id: WorkflowVersionId,
        name: impl Into<String>,
        stage_type: StageType,
        ordinal_number: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: StageId::generate(),
            workflow_version_id,
            name: name.into(),
            stage_type,
            ordinal_number,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub id: ApprovalLevelId,
    pub stage_id: StageId,
    pub name: String,
    pub ordinal_number: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LevelRecord {
    pub fn new(stage_id: StageId, name: impl Into<String>, ordinal_number: i64) -> Self {
        let now = Utc::now();
        Self {
            id: ApprovalLevelId::generate(),
            stage_id,
            name: name.into(),
            ordinal_number,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_level(&self) -> ApprovalLevel {
        ApprovalLevel {
            id: self.id.clone(),
            stage_id: self.stage_id.clone(),
            name: self.name.clone(),
            ordinal_number: self.ordinal_number,
            active: self.active,
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// Storage interface for workflow versions and the applications run on them.
///
/// Listing methods return rows ordered by ordinal number (stages, levels)
/// or insertion order (formviews, activities, submissions).
pub trait WorkflowStore: Transactional {
    // versions
    fn insert_version(&mut self, record: VersionRecord) -> ApprovalResult<()>;
    fn get_version(&self, id: &WorkflowVersionId) -> ApprovalResult<Option<VersionRecord>>;
    fn update_version(&mut self, record: VersionRecord) -> ApprovalResult<()>;
    fn delete_version(&mut self, id: &WorkflowVersionId) -> ApprovalResult<()>;

    // stages
    fn insert_stage(&mut self, record: StageRecord) -> ApprovalResult<()>;
    fn get_stage(&self, id: &StageId) -> ApprovalResult<Option<StageRecord>>;
    fn update_stage(&mut self, record: StageRecord) -> ApprovalResult<()>;
    fn delete_stage(&mut self, id: &StageId) -> ApprovalResult<()>;
    fn list_stages(&self, version_id: &WorkflowVersionId) -> ApprovalResult<Vec<StageRecord>>;

    // approval levels
    fn insert_level(&mut self, record: LevelRecord) -> ApprovalResult<()>;
    fn get_level(&self, id: &ApprovalLevelId) -> ApprovalResult<Option<LevelRecord>>;
    fn update_level(&mut self, record: LevelRecord) -> ApprovalResult<()>;
    fn delete_level(&mut self, id: &ApprovalLevelId) -> ApprovalResult<()>;
    fn list_levels(&self, stage_id: &StageId) -> ApprovalResult<Vec<LevelRecord>>;

    // formviews
    /// Insert or replace the formview for `formview.field_key`
    fn save_formview(&mut self, stage_id: &StageId, formview: Formview) -> ApprovalResult<()>;
    fn delete_formview(&mut self, stage_id: &StageId, field_key: &str) -> ApprovalResult<()>;
    fn list_formviews(&self, stage_id: &StageId) -> ApprovalResult<Vec<Formview>>;

    // applications
    fn insert_application(&mut self, application: Application) -> ApprovalResult<()>;
    fn get_application(&self, id: &ApplicationId) -> ApprovalResult<Option<Application>>;
    fn update_application(&mut self, application: Application) -> ApprovalResult<()>;
    fn delete_application(&mut self, id: &ApplicationId) -> ApprovalResult<()>;
    fn count_applications(&self, version_id: &WorkflowVersionId) -> ApprovalResult<usize>;

    // activities
    fn append_activity(&mut self, activity: ApplicationActivity) -> ApprovalResult<()>;
    fn list_activities(&self, application_id: &ApplicationId) -> ApprovalResult<Vec<ApplicationActivity>>;
    /// Remove an application's activities, returning how many went
    fn delete_activities(&mut self, application_id: &ApplicationId) -> ApprovalResult<usize>;

    // submissions
    /// Store a submission, superseding earlier ones for the same stage
    fn save_submission(&mut self, submission: ApplicationSubmission) -> ApprovalResult<()>;
    /// Submissions that have not been superseded
    fn latest_submissions(
        &self,
        application_id: &ApplicationId,
    ) -> ApprovalResult<Vec<ApplicationSubmission>>;
    /// Remove an application's submissions, superseded ones included
    fn delete_submissions(&mut self, application_id: &ApplicationId) -> ApprovalResult<usize>;

    /// Assemble a version with its stages, levels and formviews
    fn load_version(&self, id: &WorkflowVersionId) -> ApprovalResult<WorkflowVersion> {
        let record = self
            .get_version(id)?
            .ok_or_else(|| ApprovalError::VersionNotFound(id.clone()))?;

        let mut stages = Vec::new();
        for stage in self.list_stages(id)? {
            let approval_levels = self
                .list_levels(&stage.id)?
                .iter()
                .map(LevelRecord::to_level)
                .collect();
            let formviews = self.list_formviews(&stage.id)?;
            stages.push(WorkflowStage {
                id: stage.id,
                workflow_version_id: stage.workflow_version_id,
                name: stage.name,
                stage_type: stage.stage_type,
                ordinal_number: stage.ordinal_number,
                active: stage.active,
                approval_levels,
                formviews,
            });
        }

        Ok(WorkflowVersion {
            id: record.id,
            name: record.name,
            status: record.status,
            form_schema: record.form_schema,
            stages,
            created_at: record.created_at,
        })
    }
}

/// Routes activities produced by stage hooks into a store
pub struct StoreRecorder<'s, S: WorkflowStore> {
    store: &'s mut S,
}

impl<'s, S: WorkflowStore> StoreRecorder<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }
}

impl<S: WorkflowStore> ActivityRecorder for StoreRecorder<'_, S> {
    fn record(&mut self, activity: ApplicationActivity) -> ApprovalResult<()> {
        self.store.append_activity(activity)
    }
}
