//! The approval engine facade
//!
//! Workflow editing lives in [`crate::editor`], application handling in
//! [`crate::lifecycle`] and form merging in [`crate::form_contents`]; all of
//! them are methods on [`ApprovalEngine`].

use crate::config::ApprovalConfig;
use crate::errors::EngineResult;
use crate::store::{VersionRecord, WorkflowStore};
use approval_form::FormSchema;
use approval_types::*;

/// Approval workflow engine over a [`WorkflowStore`]
pub struct ApprovalEngine<S: WorkflowStore> {
    pub(crate) store: S,
    pub(crate) config: ApprovalConfig,
}

impl<S: WorkflowStore> ApprovalEngine<S> {
    pub fn new(store: S, config: ApprovalConfig) -> Self {
        tracing::debug!(
            track_updates = config.ordinal.track_updates,
            max_data_depth = config.form.max_data_depth,
            "approval engine created"
        );
        Self { store, config }
    }

    pub fn with_defaults(store: S) -> Self {
        Self::new(store, ApprovalConfig::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load a version with its stages, levels and formviews
    pub fn load_version(&self, id: &WorkflowVersionId) -> EngineResult<WorkflowVersion> {
        Ok(self.store.load_version(id)?)
    }

    pub fn load_application(&self, id: &ApplicationId) -> EngineResult<Application> {
        Ok(self
            .store
            .get_application(id)?
            .ok_or_else(|| ApprovalError::ApplicationNotFound(id.clone()))?)
    }

    pub fn activities(&self, id: &ApplicationId) -> EngineResult<Vec<ApplicationActivity>> {
        Ok(self.store.list_activities(id)?)
    }

    /// Coarse progress of an application
    pub fn overall_progress(&self, id: &ApplicationId) -> EngineResult<OverallProgress> {
        let application = self.load_application(id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let stage_type = version.stage_type_of(application.current_state())?;
        Ok(application.overall_progress(stage_type))
    }

    pub(crate) fn version_record(&self, id: &WorkflowVersionId) -> EngineResult<VersionRecord> {
        Ok(self
            .store
            .get_version(id)?
            .ok_or_else(|| ApprovalError::VersionNotFound(id.clone()))?)
    }

    pub(crate) fn parse_schema(&self, json: &str) -> EngineResult<FormSchema> {
        Ok(FormSchema::parse(json, &self.config.form)?)
    }
}
