//! Application lifecycle: creation, form submissions and state changes
//!
//! Every state change runs the exit hook of the state being left, stores
//! the new state, then runs the entry hook of the state being entered. The
//! three steps and the activities they record commit together.

use crate::engine::ApprovalEngine;
use crate::errors::EngineResult;
use crate::state_manager::StateManager;
use crate::store::{StoreRecorder, Transactional, WorkflowStore};
use approval_form::FormData;
use approval_types::*;
use std::collections::HashMap;

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// Create an application in the first stage of an active version
    pub fn create_application(
        &mut self,
        version_id: &WorkflowVersionId,
        title: &str,
        creator: &UserId,
        applicant: Option<UserId>,
    ) -> EngineResult<ApplicationId> {
        let id = self.open_application(version_id, title, creator, applicant, None)?;
        tracing::info!(application = %id, version = %version_id, creator = %creator, "application created");
        Ok(id)
    }

    /// Copy an application into an active version as a fresh draft. The
    /// latest submission of the source's first stage becomes the copy's
    /// first submission, narrowed to the fields the copy's first stage shows.
    pub fn clone_application(
        &mut self,
        source_id: &ApplicationId,
        cloner: &UserId,
        version_id: &WorkflowVersionId,
    ) -> EngineResult<ApplicationId> {
        let source = self.load_application(source_id)?;
        let source_version = self.load_version(&source.workflow_version_id)?;
        let submission = match source_version.first_stage() {
            Some(first) => self
                .store
                .latest_submissions(source_id)?
                .into_iter()
                .find(|s| s.stage_id == first.id),
            None => None,
        };
        let origin = CloneOrigin {
            application_id: source.id.clone(),
            submission,
        };

        let id = self.open_application(
            version_id,
            &source.title,
            cloner,
            Some(source.applicant.clone()),
            Some(origin),
        )?;
        tracing::info!(application = %id, source = %source_id, version = %version_id, cloner = %cloner, "application cloned");
        Ok(id)
    }

    /// Delete a draft application with its activities and submissions
    pub fn delete_application(&mut self, application_id: &ApplicationId) -> EngineResult<()> {
        let application = self.load_application(application_id)?;
        if !application.current_state().is_draft() {
            tracing::warn!(application = %application_id, state = %application.current_state(), "refusing to delete submitted application");
            return Err(ApprovalError::InvalidState(format!(
                "application {} is not a draft and can not be deleted",
                application_id
            ))
            .into());
        }

        let (activities, submissions) = self.store.transaction(|store| {
            let submissions = store.delete_submissions(application_id)?;
            let activities = store.delete_activities(application_id)?;
            store.delete_application(application_id)?;
            Ok::<_, ApprovalError>((activities, submissions))
        })?;
        tracing::info!(application = %application_id, activities, submissions, "application deleted");
        Ok(())
    }

    /// Move an application to `new_state`, running the stage hooks.
    /// Moving to the state it is already in does nothing.
    pub fn change_state(
        &mut self,
        application_id: &ApplicationId,
        new_state: ApplicationState,
        actor: Option<&UserId>,
    ) -> EngineResult<()> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        self.move_application(&version, application, new_state, actor)
    }

    /// Store form data for the application's current stage. Keys the stage
    /// has no formview for are dropped.
    pub fn save_submission(
        &mut self,
        application_id: &ApplicationId,
        user: &UserId,
        form_data: &str,
    ) -> EngineResult<()> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let stage = version.stage(application.current_stage_id())?;
        if stage.stage_type.behaviour().terminal {
            return Err(ApprovalError::InvalidState(format!(
                "application {} is finished",
                application.id
            ))
            .into());
        }

        let data = FormData::parse(form_data, &self.config.form)?.filter_field_keys(&stage.formviews);
        let submission = ApplicationSubmission::new(
            application.id.clone(),
            user.clone(),
            stage.id.clone(),
            data.to_json(),
        );
        self.store.save_submission(submission)?;
        tracing::debug!(application = %application.id, stage = %stage.id, fields = data.len(), "submission saved");
        Ok(())
    }

    /// Submit the form of a form-submission stage and move on
    pub fn submit_application(
        &mut self,
        application_id: &ApplicationId,
        user: &UserId,
    ) -> EngineResult<ApplicationState> {
        let mut application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let manager = StateManager::of_type(
            &version,
            application.current_stage_id(),
            StageType::FormSubmission,
        )?;
        let stage = manager.stage();

        let data = self
            .latest_form_data(application_id)?
            .remove(&stage.id)
            .unwrap_or_else(FormData::create_empty);
        let schema = self.parse_schema(&version.form_schema)?;
        data.check_readiness(&stage.formviews, &schema)?;

        if !application.is_submitted() {
            application.mark_submitted(user.clone())?;
        }
        let next = manager.get_next_state(application.current_state())?;
        self.move_application(&version, application, next.clone(), Some(user))?;
        Ok(next)
    }

    /// Sign off the current approval level and move on
    pub fn approve_level(
        &mut self,
        application_id: &ApplicationId,
        approver: &UserId,
    ) -> EngineResult<ApplicationState> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let manager = StateManager::of_type(
            &version,
            application.current_stage_id(),
            StageType::Approvals,
        )?;
        let next = manager.get_next_state(application.current_state())?;
        self.move_application(&version, application, next.clone(), Some(approver))?;
        Ok(next)
    }

    /// Move an application to the state after its current one
    pub fn advance_application(
        &mut self,
        application_id: &ApplicationId,
        actor: Option<&UserId>,
    ) -> EngineResult<ApplicationState> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let manager = StateManager::for_state(&version, application.current_state())?;
        let next = manager.get_next_state(application.current_state())?;
        self.move_application(&version, application, next.clone(), actor)?;
        Ok(next)
    }

    /// Return an application to the start of the previous stage
    pub fn send_back(
        &mut self,
        application_id: &ApplicationId,
        actor: Option<&UserId>,
    ) -> EngineResult<ApplicationState> {
        let application = self.load_application(application_id)?;
        let version = self.load_version(&application.workflow_version_id)?;
        let manager = StateManager::for_state(&version, application.current_state())?;
        let previous = manager.get_previous_state(application.current_state())?;
        self.move_application(&version, application, previous.clone(), actor)?;
        Ok(previous)
    }

    /// Latest parsed submission per stage
    pub fn latest_form_data(
        &self,
        application_id: &ApplicationId,
    ) -> EngineResult<HashMap<StageId, FormData>> {
        let mut out = HashMap::new();
        for submission in self.store.latest_submissions(application_id)? {
            let data = FormData::parse(&submission.form_data, &self.config.form)?;
            out.insert(submission.stage_id, data);
        }
        Ok(out)
    }

    fn open_application(
        &mut self,
        version_id: &WorkflowVersionId,
        title: &str,
        creator: &UserId,
        applicant: Option<UserId>,
        origin: Option<CloneOrigin>,
    ) -> EngineResult<ApplicationId> {
        let version = self.load_version(version_id)?;
        if !version.is_active() {
            return Err(ApprovalError::VersionNotActive(version_id.clone()).into());
        }
        let first = version
            .first_stage()
            .ok_or_else(|| ApprovalError::ValidationError("Workflow version has no stages".into()))?;
        let manager = StateManager::for_stage(&version, &first.id)?;
        let state = manager.get_creation_state()?;

        let application = Application::new(version_id.clone(), title, creator.clone(), applicant, state);
        let copied = match origin.as_ref().and_then(|o| o.submission.as_ref()) {
            Some(submission) => {
                let data = FormData::parse(&submission.form_data, &self.config.form)?
                    .filter_field_keys(&first.formviews);
                Some(ApplicationSubmission::new(
                    application.id.clone(),
                    submission.user.clone(),
                    first.id.clone(),
                    data.to_json(),
                ))
            }
            None => None,
        };

        let id = application.id.clone();
        self.store.transaction(|store| {
            store.insert_application(application.clone())?;
            let mut creation = ApplicationActivity::new(
                application.id.clone(),
                Some(creator.clone()),
                ActivityType::Creation,
                first.id.clone(),
                None,
            );
            if let Some(origin) = &origin {
                creation = creation.with_info("source", origin.application_id.to_string());
            }
            store.append_activity(creation)?;
            manager.on_application_start(&application, Some(creator), &mut StoreRecorder::new(store))?;
            if let Some(submission) = copied {
                store.save_submission(submission)?;
            }
            Ok::<_, ApprovalError>(())
        })?;
        Ok(id)
    }

    fn move_application(
        &mut self,
        version: &WorkflowVersion,
        mut application: Application,
        new_state: ApplicationState,
        actor: Option<&UserId>,
    ) -> EngineResult<()> {
        if application.current_state().is_same_as(&new_state) {
            tracing::debug!(application = %application.id, state = %new_state, "state unchanged");
            return Ok(());
        }

        let leaving = StateManager::for_state(version, application.current_state())?;
        let entering = StateManager::for_state(version, &new_state)?;
        entering.check_state(&new_state)?;

        let from = application.current_state().clone();
        let id = application.id.clone();
        self.store.transaction(|store| {
            leaving.on_state_exit(&application, &new_state, actor, &mut StoreRecorder::new(store))?;
            application.set_current_state(new_state.clone());
            entering.on_state_entry(&mut application, &from, actor, &mut StoreRecorder::new(store))?;
            store.update_application(application)
        })?;

        tracing::info!(application = %id, from = %from, to = %new_state, "application state changed");
        Ok(())
    }
}

/// The application a new one is cloned from
struct CloneOrigin {
    application_id: ApplicationId,
    submission: Option<ApplicationSubmission>,
}
