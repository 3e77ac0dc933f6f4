//! Per-stage-type state managers
//!
//! A [`StateManager`] is built for one stage of a loaded
//! [`WorkflowVersion`] and answers where an application goes next, and which
//! activities are recorded when it enters or leaves that stage. The rules
//! that differ between stage types come from [`StageType::behaviour`].

use approval_types::*;

/// A stage together with the version it belongs to
#[derive(Clone, Copy, Debug)]
pub struct StageContext<'v> {
    pub version: &'v WorkflowVersion,
    pub stage: &'v WorkflowStage,
}

/// State manager for one stage, tagged by its type
#[derive(Clone, Copy, Debug)]
pub enum StateManager<'v> {
    FormSubmission(StageContext<'v>),
    Waiting(StageContext<'v>),
    Approvals(StageContext<'v>),
    Finished(StageContext<'v>),
}

impl<'v> StateManager<'v> {
    /// Manager matching the type of the given stage
    pub fn for_stage(version: &'v WorkflowVersion, stage_id: &StageId) -> ApprovalResult<Self> {
        let stage = version.stage(stage_id)?;
        let ctx = StageContext { version, stage };
        Ok(match stage.stage_type {
            StageType::FormSubmission => StateManager::FormSubmission(ctx),
            StageType::Waiting => StateManager::Waiting(ctx),
            StageType::Approvals => StateManager::Approvals(ctx),
            StageType::Finished => StateManager::Finished(ctx),
        })
    }

    /// Manager for a stage that must be of the `expected` type
    pub fn of_type(
        version: &'v WorkflowVersion,
        stage_id: &StageId,
        expected: StageType,
    ) -> ApprovalResult<Self> {
        let manager = Self::for_stage(version, stage_id)?;
        let actual = manager.stage_type();
        if actual != expected {
            return Err(ApprovalError::StageTypeMismatch { expected, actual });
        }
        Ok(manager)
    }

    /// Manager for the stage an application state sits in
    pub fn for_state(version: &'v WorkflowVersion, state: &ApplicationState) -> ApprovalResult<Self> {
        Self::for_stage(version, state.stage_id())
    }

    fn ctx(&self) -> &StageContext<'v> {
        match self {
            StateManager::FormSubmission(ctx)
            | StateManager::Waiting(ctx)
            | StateManager::Approvals(ctx)
            | StateManager::Finished(ctx) => ctx,
        }
    }

    pub fn stage(&self) -> &'v WorkflowStage {
        self.ctx().stage
    }

    pub fn version(&self) -> &'v WorkflowVersion {
        self.ctx().version
    }

    pub fn stage_type(&self) -> StageType {
        self.stage().stage_type
    }

    fn behaviour(&self) -> StageBehaviour {
        self.stage_type().behaviour()
    }

    // ── States ───────────────────────────────────────────────────────

    /// Draft state a new application is created in
    pub fn get_creation_state(&self) -> ApprovalResult<ApplicationState> {
        if !self.behaviour().can_start {
            return Err(ApprovalError::IllegalStart(self.stage_type()));
        }
        Ok(ApplicationState::new(self.stage().id.clone(), true, None))
    }

    /// State an application is in when it arrives at this stage
    pub fn get_initial_state(&self) -> ApprovalResult<ApplicationState> {
        let stage = self.stage();
        if self.behaviour().walks_levels {
            let level = stage
                .first_level()
                .ok_or_else(|| ApprovalError::NoApprovalLevels(stage.id.clone()))?;
            return Ok(ApplicationState::at_level(stage.id.clone(), level.id.clone()));
        }
        Ok(ApplicationState::at_stage(stage.id.clone()))
    }

    /// State following `current`: the next level, or the next stage's initial state
    pub fn get_next_state(&self, current: &ApplicationState) -> ApprovalResult<ApplicationState> {
        self.check_state(current)?;
        let stage = self.stage();
        if self.behaviour().terminal {
            return Err(ApprovalError::TerminalStage(stage.id.clone()));
        }
        if self.behaviour().walks_levels {
            if let Some(level) = current
                .approval_level_id()
                .and_then(|id| stage.next_level(id))
            {
                return Ok(ApplicationState::at_level(stage.id.clone(), level.id.clone()));
            }
        }
        let next = self
            .version()
            .next_stage(&stage.id)
            .ok_or(ApprovalError::NoNextStage)?;
        StateManager::for_stage(self.version(), &next.id)?.get_initial_state()
    }

    /// Initial state of the previous stage
    pub fn get_previous_state(&self, current: &ApplicationState) -> ApprovalResult<ApplicationState> {
        self.check_state(current)?;
        let stage = self.stage();
        if self.behaviour().terminal {
            return Err(ApprovalError::TerminalStage(stage.id.clone()));
        }
        let previous = self
            .version()
            .previous_stage(&stage.id)
            .ok_or(ApprovalError::NoPreviousStage)?;
        StateManager::for_stage(self.version(), &previous.id)?.get_initial_state()
    }

    /// A state handled by this manager must sit in its stage, and in an
    /// approvals stage at one of the stage's levels
    pub fn check_state(&self, state: &ApplicationState) -> ApprovalResult<()> {
        let stage = self.stage();
        if state.stage_id() != &stage.id {
            return Err(ApprovalError::InvalidState(format!(
                "{} is not in stage {}",
                state, stage.id
            )));
        }
        if self.behaviour().walks_levels {
            match state.approval_level_id() {
                Some(level) if stage.has_level(level) => {}
                _ => {
                    return Err(ApprovalError::InvalidState(format!(
                        "{} is not at an approval level of stage {}",
                        state, stage.id
                    )))
                }
            }
        }
        Ok(())
    }

    // ── Hooks ────────────────────────────────────────────────────────

    /// Runs once, right after an application is created in this stage
    pub fn on_application_start(
        &self,
        application: &Application,
        actor: Option<&UserId>,
        recorder: &mut dyn ActivityRecorder,
    ) -> ApprovalResult<()> {
        if !self.behaviour().can_start {
            return Err(ApprovalError::IllegalStart(self.stage_type()));
        }
        recorder.record(self.activity(application, actor, ActivityType::StageStarted, None))
    }

    /// Runs after `application` moved into a state of this stage from `from`
    pub fn on_state_entry(
        &self,
        application: &mut Application,
        from: &ApplicationState,
        actor: Option<&UserId>,
        recorder: &mut dyn ActivityRecorder,
    ) -> ApprovalResult<()> {
        let stage = self.stage();
        match self {
            StateManager::Approvals(_) => {
                if from.stage_id() != &stage.id {
                    recorder.record(self.activity(application, actor, ActivityType::StageStarted, None))?;
                }
                let level = application.current_state().approval_level_id().cloned();
                recorder.record(self.activity(application, actor, ActivityType::LevelStarted, level))?;
            }
            StateManager::Finished(_) => {
                recorder.record(self.activity(application, actor, ActivityType::StageStarted, None))?;
                application.mark_completed();
                tracing::info!(application = %application.id, "application completed");
            }
            StateManager::FormSubmission(_) | StateManager::Waiting(_) => {
                recorder.record(self.activity(application, actor, ActivityType::StageStarted, None))?;
            }
        }
        Ok(())
    }

    /// Runs before `application` leaves its current state for `to`
    pub fn on_state_exit(
        &self,
        application: &Application,
        to: &ApplicationState,
        actor: Option<&UserId>,
        recorder: &mut dyn ActivityRecorder,
    ) -> ApprovalResult<()> {
        let stage = self.stage();
        match self {
            StateManager::Finished(_) => return Err(ApprovalError::FinishedStateExit),
            StateManager::Approvals(_) => {
                let level = application.current_state().approval_level_id().cloned();
                recorder.record(self.activity(application, actor, ActivityType::LevelEnded, level))?;
                if to.stage_id() != &stage.id {
                    recorder.record(self.activity(application, actor, ActivityType::StageEnded, None))?;
                }
            }
            StateManager::FormSubmission(_) | StateManager::Waiting(_) => {
                recorder.record(self.activity(application, actor, ActivityType::StageEnded, None))?;
            }
        }
        Ok(())
    }

    fn activity(
        &self,
        application: &Application,
        actor: Option<&UserId>,
        activity_type: ActivityType,
        level: Option<ApprovalLevelId>,
    ) -> ApplicationActivity {
        let stage = self.stage();
        let mut activity = ApplicationActivity::new(
            application.id.clone(),
            actor.cloned(),
            activity_type,
            stage.id.clone(),
            level.clone(),
        )
        .with_info("stage", stage.name.clone());
        if let Some(level) = level.as_ref().and_then(|id| stage.level(id)) {
            activity = activity.with_info("level", level.name.clone());
        }
        activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version() -> WorkflowVersion {
        let v = WorkflowVersionId::new("v1");
        WorkflowVersion::new("Travel", "{}")
            .with_id(v.clone())
            .with_stage(
                WorkflowStage::new(v.clone(), "Request", StageType::FormSubmission, 0)
                    .with_id(StageId::new("request")),
            )
            .with_stage(
                WorkflowStage::new(v.clone(), "Hold", StageType::Waiting, 0)
                    .with_id(StageId::new("hold")),
            )
            .with_stage(
                WorkflowStage::new(v.clone(), "Review", StageType::Approvals, 0)
                    .with_id(StageId::new("review"))
                    .with_level(ApprovalLevelId::new("l1"), "Manager")
                    .with_level(ApprovalLevelId::new("l2"), "Director"),
            )
            .with_stage(
                WorkflowStage::new(v, "Done", StageType::Finished, 0).with_id(StageId::new("done")),
            )
    }

    fn sid(s: &str) -> StageId {
        StageId::new(s)
    }

    #[test]
    fn test_dispatch_by_stage_type() {
        let v = version();
        assert!(matches!(
            StateManager::for_stage(&v, &sid("hold")).unwrap(),
            StateManager::Waiting(_)
        ));
        let err = StateManager::of_type(&v, &sid("done"), StageType::Waiting).unwrap_err();
        assert_eq!(err.to_string(), "Application stage is not of type waiting");
        assert!(StateManager::for_stage(&v, &sid("nope")).is_err());
    }

    #[test]
    fn test_creation_state_only_in_form_stage() {
        let v = version();
        let state = StateManager::for_stage(&v, &sid("request"))
            .unwrap()
            .get_creation_state()
            .unwrap();
        assert!(state.is_draft());
        assert_eq!(state.stage_id(), &sid("request"));

        let err = StateManager::for_stage(&v, &sid("review"))
            .unwrap()
            .get_creation_state()
            .unwrap_err();
        assert_eq!(err.to_string(), "An application can not start in an approval stage");
        let err = StateManager::for_stage(&v, &sid("done"))
            .unwrap()
            .get_creation_state()
            .unwrap_err();
        assert_eq!(err.to_string(), "An application can not start in a finished stage");
    }

    #[test]
    fn test_initial_states() {
        let v = version();
        let review = StateManager::for_stage(&v, &sid("review")).unwrap();
        assert_eq!(
            review.get_initial_state().unwrap(),
            ApplicationState::at_level(sid("review"), ApprovalLevelId::new("l1"))
        );
        let hold = StateManager::for_stage(&v, &sid("hold")).unwrap();
        assert_eq!(hold.get_initial_state().unwrap(), ApplicationState::at_stage(sid("hold")));
    }

    #[test]
    fn test_previous_state_of_first_stage() {
        let v = version();
        let request = StateManager::for_stage(&v, &sid("request")).unwrap();
        let err = request
            .get_previous_state(&ApplicationState::at_stage(sid("request")))
            .unwrap_err();
        assert_eq!(err.to_string(), "No previous stage");
    }

    #[test]
    fn test_approvals_previous_goes_to_previous_stage() {
        let v = version();
        let review = StateManager::for_stage(&v, &sid("review")).unwrap();
        let at_l2 = ApplicationState::at_level(sid("review"), ApprovalLevelId::new("l2"));
        assert_eq!(
            review.get_previous_state(&at_l2).unwrap(),
            ApplicationState::at_stage(sid("hold"))
        );
    }

    #[test]
    fn test_state_must_belong_to_stage() {
        let v = version();
        let review = StateManager::for_stage(&v, &sid("review")).unwrap();
        assert!(review
            .get_next_state(&ApplicationState::at_stage(sid("hold")))
            .is_err());
        assert!(review
            .get_next_state(&ApplicationState::at_stage(sid("review")))
            .is_err());
        assert!(review
            .get_next_state(&ApplicationState::at_level(sid("review"), ApprovalLevelId::new("x")))
            .is_err());
    }

    #[test]
    fn test_finished_is_terminal() {
        let v = version();
        let done = StateManager::for_stage(&v, &sid("done")).unwrap();
        let state = ApplicationState::at_stage(sid("done"));
        assert!(matches!(
            done.get_next_state(&state),
            Err(ApprovalError::TerminalStage(_))
        ));
        assert!(matches!(
            done.get_previous_state(&state),
            Err(ApprovalError::TerminalStage(_))
        ));
    }

    #[test]
    fn test_application_start_hook() {
        let v = version();
        let request = StateManager::for_stage(&v, &sid("request")).unwrap();
        let app = Application::new(
            v.id.clone(),
            "Trip",
            UserId::new("u1"),
            None,
            request.get_creation_state().unwrap(),
        );
        let mut log: Vec<ApplicationActivity> = Vec::new();
        request
            .on_application_start(&app, Some(&UserId::new("u1")), &mut log)
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].activity_type, ActivityType::StageStarted);

        let hold = StateManager::for_stage(&v, &sid("hold")).unwrap();
        assert!(hold.on_application_start(&app, None, &mut log).is_err());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_finished_entry_completes_application() {
        let v = version();
        let done = StateManager::for_stage(&v, &sid("done")).unwrap();
        let mut app = Application::new(
            v.id.clone(),
            "Trip",
            UserId::new("u1"),
            None,
            ApplicationState::at_stage(sid("done")),
        );
        let mut log: Vec<ApplicationActivity> = Vec::new();
        let from = ApplicationState::at_level(sid("review"), ApprovalLevelId::new("l2"));
        done.on_state_entry(&mut app, &from, None, &mut log).unwrap();

        assert!(app.is_completed());
        assert_eq!(log[0].activity_type, ActivityType::StageStarted);
        assert_eq!(
            done.on_state_exit(&app, &from, None, &mut log).unwrap_err().to_string(),
            "Can not exit a finished state"
        );
    }
}
