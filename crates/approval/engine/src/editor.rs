//! Workflow version editing
//!
//! Versions are built while in draft: stages are added, renamed and
//! deleted, approvals stages get their levels, and formviews decide which
//! form fields each stage shows. Ordinals stay dense through every edit.

use crate::engine::ApprovalEngine;
use crate::errors::EngineResult;
use crate::ordinal::{Allocate, LevelOrdinals, RemovedItem, Reorder, Shift, StageOrdinals};
use crate::store::{LevelRecord, StageRecord, Transactional, VersionRecord, WorkflowStore};
use approval_form::FormSchema;
use approval_types::*;
use chrono::Utc;
use std::collections::HashSet;

/// Name given to the level every new approvals stage starts with
pub const DEFAULT_LEVEL_NAME: &str = "Level 1";

impl<S: WorkflowStore> ApprovalEngine<S> {
    // ── Versions ─────────────────────────────────────────────────────

    /// Create a draft version around a form schema
    pub fn create_version(
        &mut self,
        name: &str,
        form_schema: &str,
    ) -> EngineResult<WorkflowVersionId> {
        let name = non_empty(name, "Workflow version name")?;
        self.parse_schema(form_schema)?;
        let record = VersionRecord::new(name, form_schema);
        let id = record.id.clone();
        self.store.insert_version(record)?;
        tracing::info!(version = %id, name = %name, "workflow version created");
        Ok(id)
    }

    /// Validate a draft version and make it available to applications
    pub fn activate_version(&mut self, id: &WorkflowVersionId) -> EngineResult<()> {
        let mut record = self.draft_version(id)?;
        self.store.load_version(id)?.validate()?;
        record.status = VersionStatus::Active;
        record.updated_at = Utc::now();
        self.store.update_version(record)?;
        tracing::info!(version = %id, "workflow version activated");
        Ok(())
    }

    /// Stop new applications on an active version
    pub fn archive_version(&mut self, id: &WorkflowVersionId) -> EngineResult<()> {
        let mut record = self.version_record(id)?;
        if record.status != VersionStatus::Active {
            return Err(ApprovalError::VersionNotActive(id.clone()).into());
        }
        record.status = VersionStatus::Archived;
        record.updated_at = Utc::now();
        self.store.update_version(record)?;
        tracing::info!(version = %id, "workflow version archived");
        Ok(())
    }

    /// Delete a version with its stages, levels and formviews
    pub fn delete_version(&mut self, id: &WorkflowVersionId) -> EngineResult<()> {
        self.version_record(id)?;
        let applications = self.store.count_applications(id)?;
        if applications > 0 {
            tracing::warn!(version = %id, applications, "refusing to delete workflow version in use");
            return Err(ApprovalError::ValidationError(format!(
                "Workflow version {} has {} application(s)",
                id, applications
            ))
            .into());
        }

        self.store.transaction(|store| {
            for stage in store.list_stages(id)? {
                for level in store.list_levels(&stage.id)? {
                    store.delete_level(&level.id)?;
                }
                store.delete_stage(&stage.id)?;
            }
            store.delete_version(id)
        })?;
        tracing::info!(version = %id, "workflow version deleted");
        Ok(())
    }

    /// Copy a version into a new draft: its stages in order, then each
    /// stage's formviews and approval levels. Ordinals are allocated afresh.
    pub fn clone_version(
        &mut self,
        source_id: &WorkflowVersionId,
        name: &str,
    ) -> EngineResult<WorkflowVersionId> {
        let name = non_empty(name, "Workflow version name")?;
        let source = self.store.load_version(source_id)?;
        let record = VersionRecord::new(name, source.form_schema.clone());
        let id = record.id.clone();

        self.store.transaction(|store| {
            store.insert_version(record)?;
            for stage in &source.stages {
                let ordinal = Allocate::next(&StageOrdinals::new(&mut *store), &id)?;
                let mut copy = StageRecord::new(id.clone(), stage.name.clone(), stage.stage_type, ordinal);
                copy.active = stage.active;
                let stage_id = copy.id.clone();
                store.insert_stage(copy)?;

                for formview in &stage.formviews {
                    store.save_formview(&stage_id, formview.clone())?;
                }
                for level in &stage.approval_levels {
                    let ordinal = Allocate::next(&LevelOrdinals::new(&mut *store), &stage_id)?;
                    let mut copy = LevelRecord::new(stage_id.clone(), level.name.clone(), ordinal);
                    copy.active = level.active;
                    store.insert_level(copy)?;
                }
            }
            Ok::<_, ApprovalError>(())
        })?;

        tracing::info!(source = %source_id, version = %id, stages = source.stages.len(), "workflow version cloned");
        Ok(id)
    }

    // ── Stages ───────────────────────────────────────────────────────

    /// Add a stage to a draft version.
    ///
    /// Finished stages are appended; any other stage is inserted before the
    /// first finished stage. The new stage gets default formviews, and an
    /// approvals stage gets a first approval level.
    pub fn add_stage(
        &mut self,
        version_id: &WorkflowVersionId,
        name: &str,
        stage_type: StageType,
    ) -> EngineResult<StageId> {
        let record = self.draft_version(version_id)?;
        let name = non_empty(name, "Stage name")?;
        let version = self.store.load_version(version_id)?;
        let schema = self.parse_schema(&record.form_schema)?;

        let first_finished = version
            .stages_of_type(StageType::Finished)
            .map(|s| s.ordinal_number)
            .min();
        let (ordinal, to_shift) = match (stage_type, first_finished) {
            (StageType::Finished, _) | (_, None) => {
                (Allocate::next(&StageOrdinals::new(&mut self.store), version_id)?, Vec::new())
            }
            (_, Some(first)) => {
                let mut following: Vec<(StageId, i64)> = version
                    .stages
                    .iter()
                    .filter(|s| s.ordinal_number >= first)
                    .map(|s| (s.id.clone(), s.ordinal_number))
                    .collect();
                following.sort_by_key(|(_, ord)| std::cmp::Reverse(*ord));
                (first, following)
            }
        };

        let previous = version
            .stages
            .iter()
            .filter(|s| s.ordinal_number < ordinal)
            .max_by_key(|s| s.ordinal_number);
        let formviews = if stage_type.has_formviews() {
            self.default_formviews(&version, &schema, stage_type, previous)
        } else {
            Vec::new()
        };

        let stage = StageRecord::new(version_id.clone(), name, stage_type, ordinal);
        let stage_id = stage.id.clone();
        let track = self.config.ordinal.track_updates;
        self.store.transaction(|store| {
            for (id, ord) in &to_shift {
                let mut moved = store
                    .get_stage(id)?
                    .ok_or_else(|| ApprovalError::StageNotFound(id.clone()))?;
                moved.ordinal_number = ord + 1;
                if track {
                    moved.updated_at = Utc::now();
                }
                store.update_stage(moved)?;
            }
            store.insert_stage(stage)?;
            for formview in formviews {
                store.save_formview(&stage_id, formview)?;
            }
            if stage_type.behaviour().walks_levels {
                store.insert_level(LevelRecord::new(stage_id.clone(), DEFAULT_LEVEL_NAME, 1))?;
            }
            Ok::<_, ApprovalError>(())
        })?;

        tracing::info!(
            version = %version_id,
            stage = %stage_id,
            stage_type = %stage_type,
            ordinal,
            "stage added"
        );
        Ok(stage_id)
    }

    pub fn rename_stage(&mut self, stage_id: &StageId, name: &str) -> EngineResult<()> {
        let mut stage = self.stage_record(stage_id)?;
        self.draft_version(&stage.workflow_version_id)?;
        stage.name = non_empty(name, "Stage name")?.to_string();
        stage.updated_at = Utc::now();
        self.store.update_stage(stage)?;
        Ok(())
    }

    /// Delete a stage of a draft version and close the ordinal gap
    pub fn delete_stage(&mut self, version_id: &WorkflowVersionId, stage_id: &StageId) -> EngineResult<()> {
        self.draft_version(version_id)?;
        let stage = self.stage_record(stage_id)?;
        if stage.workflow_version_id != *version_id {
            tracing::warn!(version = %version_id, stage = %stage_id, "refusing to delete a foreign stage");
            return Err(ApprovalError::ForeignItem {
                item: stage.id.to_string(),
                parent: version_id.to_string(),
            }
            .into());
        }
        let removed = RemovedItem::new(
            stage.id.clone(),
            stage.workflow_version_id.clone(),
            stage.ordinal_number,
        );
        let shift = Shift::new(self.config.ordinal.track_updates);

        self.store.transaction(|store| {
            for level in store.list_levels(stage_id)? {
                store.delete_level(&level.id)?;
            }
            store.delete_stage(stage_id)?;
            shift.execute(&mut StageOrdinals::new(store), version_id, &removed)
        })?;
        tracing::info!(version = %version_id, stage = %stage_id, "stage deleted");
        Ok(())
    }

    // ── Approval levels ──────────────────────────────────────────────

    /// Append an approval level to an approvals stage
    pub fn add_approval_level(&mut self, stage_id: &StageId, name: &str) -> EngineResult<ApprovalLevelId> {
        let stage = self.approvals_stage(stage_id)?;
        let name = non_empty(name, "Approval level name")?;
        let ordinal = Allocate::next(&LevelOrdinals::new(&mut self.store), &stage.id)?;
        let level = LevelRecord::new(stage.id.clone(), name, ordinal);
        let id = level.id.clone();
        self.store.insert_level(level)?;
        tracing::info!(stage = %stage_id, level = %id, ordinal, "approval level added");
        Ok(id)
    }

    pub fn rename_approval_level(&mut self, level_id: &ApprovalLevelId, name: &str) -> EngineResult<()> {
        let mut level = self.level_record(level_id)?;
        self.approvals_stage(&level.stage_id)?;
        level.name = non_empty(name, "Approval level name")?.to_string();
        level.updated_at = Utc::now();
        self.store.update_level(level)?;
        Ok(())
    }

    /// Delete an approval level; an approvals stage keeps at least one
    pub fn delete_approval_level(&mut self, level_id: &ApprovalLevelId) -> EngineResult<()> {
        let level = self.level_record(level_id)?;
        let stage = self.approvals_stage(&level.stage_id)?;
        if self.store.list_levels(&stage.id)?.len() <= 1 {
            return Err(ApprovalError::ValidationError(format!(
                "Approvals stage {} must keep at least one approval level",
                stage.id
            ))
            .into());
        }

        let removed = RemovedItem::new(level.id.clone(), level.stage_id.clone(), level.ordinal_number);
        let shift = Shift::new(self.config.ordinal.track_updates);
        self.store.transaction(|store| {
            store.delete_level(level_id)?;
            shift.execute(&mut LevelOrdinals::new(store), &stage.id, &removed)
        })?;
        tracing::info!(stage = %stage.id, level = %level_id, "approval level deleted");
        Ok(())
    }

    /// Reorder the levels of an approvals stage
    pub fn reorder_approval_levels(
        &mut self,
        stage_id: &StageId,
        current: &[ApprovalLevelId],
        new_order: &[ApprovalLevelId],
    ) -> EngineResult<()> {
        let stage = self.approvals_stage(stage_id)?;
        Reorder::new(self.config.ordinal.track_updates).execute(
            &mut LevelOrdinals::new(&mut self.store),
            &stage.id,
            current,
            new_order,
        )?;
        tracing::info!(stage = %stage_id, levels = new_order.len(), "approval levels reordered");
        Ok(())
    }

    // ── Formviews ────────────────────────────────────────────────────

    /// Set how a form field is shown at a stage. `Hidden` removes the formview.
    pub fn configure_formview(
        &mut self,
        stage_id: &StageId,
        field_key: &str,
        visibility: FormviewVisibility,
    ) -> EngineResult<()> {
        let stage = self.stage_record(stage_id)?;
        let version = self.draft_version(&stage.workflow_version_id)?;
        if !stage.active {
            return Err(ApprovalError::StageNotActive(stage.id).into());
        }
        let schema = self.parse_schema(&version.form_schema)?;
        if !schema.has_field(field_key) {
            return Err(ApprovalError::ValidationError(format!("Unknown form field: {}", field_key)).into());
        }

        let existing = self
            .store
            .list_formviews(stage_id)?
            .into_iter()
            .find(|f| f.field_key == field_key);
        match (visibility.flags(), existing) {
            (None, Some(_)) => self.store.delete_formview(stage_id, field_key)?,
            (None, None) => {}
            (Some((required, disabled)), existing) => {
                let mut formview = existing.unwrap_or_else(|| Formview::new(field_key, false, false));
                formview.required = required;
                formview.disabled = disabled;
                self.store.save_formview(stage_id, formview)?;
            }
        }
        tracing::debug!(stage = %stage_id, field = field_key, ?visibility, "formview configured");
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Formviews a new stage starts with.
    ///
    /// Form stages take every respondable field no earlier stage shows.
    /// Other stages copy the formviews of the stage before them, falling
    /// back to the form stage rule when there is none.
    fn default_formviews(
        &self,
        version: &WorkflowVersion,
        schema: &FormSchema,
        stage_type: StageType,
        previous: Option<&WorkflowStage>,
    ) -> Vec<Formview> {
        if stage_type != StageType::FormSubmission {
            if let Some(previous) = previous.filter(|p| !p.formviews.is_empty()) {
                return previous.formviews.clone();
            }
        }

        let used: HashSet<&str> = version
            .stages
            .iter()
            .flat_map(|s| s.formviews.iter().map(|f| f.field_key.as_str()))
            .collect();
        schema
            .respondable_fields(&self.config.form)
            .into_iter()
            .filter(|field| !used.contains(field.key()))
            .map(|field| {
                let disabled = field.disabled();
                Formview::new(field.key(), field.required() && !disabled, disabled)
            })
            .collect()
    }

    fn draft_version(&self, id: &WorkflowVersionId) -> EngineResult<VersionRecord> {
        let record = self.version_record(id)?;
        if record.status != VersionStatus::Draft {
            tracing::warn!(version = %id, status = %record.status, "edit refused on non-draft version");
            return Err(ApprovalError::VersionNotDraft(id.clone()).into());
        }
        Ok(record)
    }

    fn stage_record(&self, id: &StageId) -> EngineResult<StageRecord> {
        Ok(self
            .store
            .get_stage(id)?
            .ok_or_else(|| ApprovalError::StageNotFound(id.clone()))?)
    }

    fn level_record(&self, id: &ApprovalLevelId) -> EngineResult<LevelRecord> {
        Ok(self
            .store
            .get_level(id)?
            .ok_or_else(|| ApprovalError::ApprovalLevelNotFound(id.clone()))?)
    }

    /// An approvals stage of a draft version
    fn approvals_stage(&self, id: &StageId) -> EngineResult<StageRecord> {
        let stage = self.stage_record(id)?;
        if stage.stage_type != StageType::Approvals {
            return Err(ApprovalError::StageTypeMismatch {
                expected: StageType::Approvals,
                actual: stage.stage_type,
            }
            .into());
        }
        self.draft_version(&stage.workflow_version_id)?;
        Ok(stage)
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> EngineResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApprovalError::ValidationError(format!("{} can not be empty", what)).into());
    }
    Ok(trimmed)
}
