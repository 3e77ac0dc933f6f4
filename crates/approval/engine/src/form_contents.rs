//! Merged form schema and data for an application

use crate::engine::ApprovalEngine;
use crate::errors::EngineResult;
use crate::store::WorkflowStore;
use approval_form::{merge_form_contents, FormContents, MergePurpose, SchemaAdjuster};
use approval_types::ApplicationId;

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// The form an application shows for `purpose`, assembled from every
    /// stage up to its current one
    pub fn form_contents(
        &self,
        application_id: &ApplicationId,
        purpose: MergePurpose,
        adjuster: &dyn SchemaAdjuster,
    ) -> EngineResult<FormContents> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let base = self.parse_schema(&version.form_schema)?;
        let stages = version.working_stages(application.current_stage_id())?;
        let submissions = self.latest_form_data(application_id)?;
        Ok(merge_form_contents(&base, &stages, &submissions, purpose, adjuster)?)
    }
}
