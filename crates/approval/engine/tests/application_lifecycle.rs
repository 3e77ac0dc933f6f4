//! Applications moving through a travel-request workflow

use approval_engine::{ApprovalEngine, EngineError, InMemoryWorkflowStore};
use approval_form::{FormSchema, MergePurpose, NoAdjustment, SchemaAdjuster};
use approval_types::*;
use serde_json::{json, Value};

const SCHEMA: &str = r#"{
  "version": "1",
  "fields": [
    {"key": "destination", "type": "text", "label": "Destination", "required": true},
    {"key": "intro", "type": "label", "label": "Fill in your trip"}
  ],
  "sections": [
    {"key": "A", "label": "Costs", "fields": [
      {"key": "amount", "type": "number", "label": "Amount"}
    ]}
  ]
}"#;

struct Fixture {
    engine: ApprovalEngine<InMemoryWorkflowStore>,
    version: WorkflowVersionId,
    request: StageId,
    review: StageId,
    done: StageId,
    levels: Vec<ApprovalLevelId>,
}

/// Request (form) -> Review (Level 1, Director) -> Done
fn fixture() -> Fixture {
    let mut engine = ApprovalEngine::with_defaults(InMemoryWorkflowStore::new());
    let version = engine.create_version("Travel", SCHEMA).unwrap();
    let request = engine
        .add_stage(&version, "Request", StageType::FormSubmission)
        .unwrap();
    let done = engine.add_stage(&version, "Done", StageType::Finished).unwrap();
    let review = engine.add_stage(&version, "Review", StageType::Approvals).unwrap();
    engine.add_approval_level(&review, "Director").unwrap();
    engine.activate_version(&version).unwrap();

    let loaded = engine.load_version(&version).unwrap();
    let levels = loaded
        .stage(&review)
        .unwrap()
        .approval_levels
        .iter()
        .map(|l| l.id.clone())
        .collect();
    Fixture {
        engine,
        version,
        request,
        review,
        done,
        levels,
    }
}

fn user() -> UserId {
    UserId::new("alice")
}

fn activity_types(engine: &ApprovalEngine<InMemoryWorkflowStore>, id: &ApplicationId) -> Vec<ActivityType> {
    engine
        .activities(id)
        .unwrap()
        .iter()
        .map(|a| a.activity_type)
        .collect()
}

fn submitted(f: &mut Fixture) -> ApplicationId {
    let id = f
        .engine
        .create_application(&f.version, "Trip to Oslo", &user(), None)
        .unwrap();
    f.engine
        .save_submission(&id, &user(), r#"{"destination": "Oslo", "amount": 120, "bogus": 1}"#)
        .unwrap();
    f.engine.submit_application(&id, &user()).unwrap();
    id
}

#[test]
fn stages_are_ordered_with_finished_last() {
    let f = fixture();
    let version = f.engine.load_version(&f.version).unwrap();
    let ids: Vec<&StageId> = version.stages.iter().map(|s| &s.id).collect();
    assert_eq!(ids, vec![&f.request, &f.review, &f.done]);
    let ordinals: Vec<i64> = version.stages.iter().map(|s| s.ordinal_number).collect();
    assert_eq!(ordinals, vec![1, 2, 3]);
    assert_eq!(f.levels.len(), 2);
}

#[test]
fn application_starts_as_draft_in_form_stage() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip", &user(), Some(UserId::new("bob")))
        .unwrap();

    let app = f.engine.load_application(&id).unwrap();
    assert!(app.current_state().is_draft());
    assert_eq!(app.current_stage_id(), &f.request);
    assert_eq!(app.applicant, UserId::new("bob"));
    assert_eq!(app.creator, user());
    assert_eq!(
        activity_types(&f.engine, &id),
        vec![ActivityType::Creation, ActivityType::StageStarted]
    );
    assert_eq!(f.engine.overall_progress(&id).unwrap(), OverallProgress::Draft);
}

#[test]
fn applications_need_an_active_version() {
    let mut engine = ApprovalEngine::with_defaults(InMemoryWorkflowStore::new());
    let version = engine.create_version("Draft", SCHEMA).unwrap();
    engine
        .add_stage(&version, "Request", StageType::FormSubmission)
        .unwrap();
    let err = engine
        .create_application(&version, "Trip", &user(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Approval(ApprovalError::VersionNotActive(_))
    ));
}

#[test]
fn submit_requires_required_fields() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip", &user(), None)
        .unwrap();

    let err = f.engine.submit_application(&id, &user()).unwrap_err();
    assert_eq!(err.to_string(), "Required field(s) are not set: destination");
    assert!(f.engine.load_application(&id).unwrap().current_state().is_draft());
}

#[test]
fn malicious_submission_is_rejected() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip", &user(), None)
        .unwrap();
    let err = f
        .engine
        .save_submission(&id, &user(), "[1, 2, 3]")
        .unwrap_err();
    assert_eq!(err.to_string(), "Malicious form data detected");
}

#[test]
fn approvals_walk_levels_then_next_stage() {
    let mut f = fixture();
    let id = submitted(&mut f);

    let app = f.engine.load_application(&id).unwrap();
    assert!(app.is_submitted());
    assert_eq!(
        app.current_state(),
        &ApplicationState::at_level(f.review.clone(), f.levels[0].clone())
    );

    let state = f.engine.approve_level(&id, &UserId::new("manager")).unwrap();
    assert_eq!(state, ApplicationState::at_level(f.review.clone(), f.levels[1].clone()));

    let state = f.engine.approve_level(&id, &UserId::new("director")).unwrap();
    assert_eq!(state, ApplicationState::at_stage(f.done.clone()));

    let app = f.engine.load_application(&id).unwrap();
    assert!(app.is_completed());
    assert_eq!(f.engine.overall_progress(&id).unwrap(), OverallProgress::Finished);
    assert_eq!(
        activity_types(&f.engine, &id),
        vec![
            ActivityType::Creation,
            ActivityType::StageStarted,
            // submit
            ActivityType::StageEnded,
            ActivityType::StageStarted,
            ActivityType::LevelStarted,
            // first approval
            ActivityType::LevelEnded,
            ActivityType::LevelStarted,
            // second approval
            ActivityType::LevelEnded,
            ActivityType::StageEnded,
            ActivityType::StageStarted,
        ]
    );
}

#[test]
fn finished_application_can_not_move() {
    let mut f = fixture();
    let id = submitted(&mut f);
    f.engine.approve_level(&id, &user()).unwrap();
    f.engine.approve_level(&id, &user()).unwrap();
    let before = f.engine.activities(&id).unwrap().len();

    let err = f
        .engine
        .change_state(
            &id,
            ApplicationState::at_level(f.review.clone(), f.levels[0].clone()),
            Some(&user()),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Can not exit a finished state");

    assert!(matches!(
        f.engine.advance_application(&id, None),
        Err(EngineError::Approval(ApprovalError::TerminalStage(_)))
    ));
    assert!(matches!(
        f.engine.approve_level(&id, &user()),
        Err(EngineError::Approval(ApprovalError::StageTypeMismatch { .. }))
    ));

    let app = f.engine.load_application(&id).unwrap();
    assert_eq!(app.current_stage_id(), &f.done);
    assert_eq!(f.engine.activities(&id).unwrap().len(), before);
}

#[test]
fn send_back_returns_to_previous_stage() {
    let mut f = fixture();
    let id = submitted(&mut f);
    f.engine.approve_level(&id, &user()).unwrap();

    let state = f.engine.send_back(&id, Some(&user())).unwrap();
    assert_eq!(state, ApplicationState::at_stage(f.request.clone()));
    assert!(!state.is_draft());

    let first_submit = f.engine.load_application(&id).unwrap().submitted_at;
    let state = f.engine.submit_application(&id, &user()).unwrap();
    assert_eq!(state, ApplicationState::at_level(f.review.clone(), f.levels[0].clone()));
    assert_eq!(f.engine.load_application(&id).unwrap().submitted_at, first_submit);
}

#[test]
fn change_to_same_state_is_a_no_op() {
    let mut f = fixture();
    let id = submitted(&mut f);
    let before = f.engine.activities(&id).unwrap().len();
    let current = f.engine.load_application(&id).unwrap().current_state().clone();

    f.engine.change_state(&id, current, None).unwrap();
    assert_eq!(f.engine.activities(&id).unwrap().len(), before);
}

#[test]
fn change_state_rejects_unknown_level() {
    let mut f = fixture();
    let id = submitted(&mut f);
    let bogus = ApplicationState::at_level(f.review.clone(), ApprovalLevelId::new("nope"));
    assert!(f.engine.change_state(&id, bogus, None).is_err());
}

#[test]
fn view_contents_merge_submissions() {
    let mut f = fixture();
    let id = submitted(&mut f);

    let contents = f
        .engine
        .form_contents(&id, MergePurpose::View, &NoAdjustment)
        .unwrap();
    assert_eq!(contents.form_schema.field_keys(), vec!["destination", "amount"]);
    assert_eq!(contents.form_data.get_value("destination"), Some(&json!("Oslo")));
    assert_eq!(contents.form_data.get_value("amount"), Some(&json!(120)));
    assert!(!contents.form_data.has_value("bogus"));
}

struct HelpOnEdit;

impl SchemaAdjuster for HelpOnEdit {
    fn adjust(&self, _stage: &WorkflowStage, purpose: MergePurpose, mut schema: FormSchema) -> FormSchema {
        if purpose == MergePurpose::Edit {
            schema.set_field_help("destination", "City you travel to");
        }
        schema
    }
}

#[test]
fn edit_contents_use_current_stage_schema() {
    let mut f = fixture();
    let id = submitted(&mut f);

    let contents = f
        .engine
        .form_contents(&id, MergePurpose::Edit, &HelpOnEdit)
        .unwrap();
    let destination = contents.form_schema.field("destination").unwrap();
    assert_eq!(destination.get("help"), Some(&json!("City you travel to")));
    assert_eq!(contents.form_data.get_value("destination"), Some(&json!("Oslo")));
}

#[test]
fn preview_contents_have_no_data() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip", &user(), None)
        .unwrap();
    f.engine
        .save_submission(&id, &user(), r#"{"destination": "Oslo"}"#)
        .unwrap();

    let contents = f
        .engine
        .form_contents(&id, MergePurpose::Preview, &NoAdjustment)
        .unwrap();
    assert!(contents.form_schema.has_field("intro"));
    assert_eq!(contents.form_data.get_value("destination"), Some(&Value::Null));
}

#[test]
fn resubmission_supersedes() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip", &user(), None)
        .unwrap();
    f.engine
        .save_submission(&id, &user(), r#"{"destination": "Oslo"}"#)
        .unwrap();
    f.engine
        .save_submission(&id, &user(), "{\"destination\": \"Bergen\"}\r\n")
        .unwrap();

    let data = f.engine.latest_form_data(&id).unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[&f.request].get_value("destination"), Some(&json!("Bergen")));
    assert_eq!(f.engine.store().all_submissions(&id).len(), 2);
}

#[test]
fn only_draft_applications_can_be_deleted() {
    let mut f = fixture();
    let draft = f
        .engine
        .create_application(&f.version, "Trip", &user(), None)
        .unwrap();
    f.engine
        .save_submission(&draft, &user(), r#"{"destination": "Oslo"}"#)
        .unwrap();

    f.engine.delete_application(&draft).unwrap();
    assert!(matches!(
        f.engine.load_application(&draft),
        Err(EngineError::Approval(ApprovalError::ApplicationNotFound(_)))
    ));
    assert!(f.engine.activities(&draft).unwrap().is_empty());
    assert!(f.engine.store().all_submissions(&draft).is_empty());

    let id = submitted(&mut f);
    let before = f.engine.activities(&id).unwrap().len();
    assert!(matches!(
        f.engine.delete_application(&id),
        Err(EngineError::Approval(ApprovalError::InvalidState(_)))
    ));
    assert!(f.engine.load_application(&id).is_ok());
    assert_eq!(f.engine.activities(&id).unwrap().len(), before);
    assert_eq!(f.engine.store().all_submissions(&id).len(), 1);
    assert_eq!(f.engine.store().transaction_depth(), 0);
}

#[test]
fn clone_starts_a_draft_with_first_stage_data() {
    let mut f = fixture();
    let id = f
        .engine
        .create_application(&f.version, "Trip to Oslo", &user(), Some(UserId::new("bob")))
        .unwrap();
    f.engine
        .save_submission(&id, &user(), r#"{"destination": "Oslo", "amount": 120}"#)
        .unwrap();
    f.engine.submit_application(&id, &user()).unwrap();
    f.engine.approve_level(&id, &user()).unwrap();

    let clerk = UserId::new("clerk");
    let copy = f.engine.clone_application(&id, &clerk, &f.version).unwrap();
    assert_ne!(copy, id);

    let app = f.engine.load_application(&copy).unwrap();
    assert_eq!(app.title, "Trip to Oslo");
    assert_eq!(app.creator, clerk);
    assert_eq!(app.applicant, UserId::new("bob"));
    assert!(app.current_state().is_draft());
    assert_eq!(app.current_stage_id(), &f.request);
    assert!(!app.is_submitted());

    let activities = f.engine.activities(&copy).unwrap();
    assert_eq!(activities[0].activity_type, ActivityType::Creation);
    assert_eq!(activities[0].info.get("source"), Some(&id.to_string()));

    let data = f.engine.latest_form_data(&copy).unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[&f.request].get_value("destination"), Some(&json!("Oslo")));
    assert_eq!(data[&f.request].get_value("amount"), Some(&json!(120)));
    let copied = f.engine.store().all_submissions(&copy);
    assert_eq!(copied[0].user, user());

    // the source is untouched
    assert_eq!(
        f.engine.load_application(&id).unwrap().current_state(),
        &ApplicationState::at_level(f.review.clone(), f.levels[1].clone())
    );
}

#[test]
fn clone_needs_an_active_version() {
    let mut f = fixture();
    let id = submitted(&mut f);
    let draft = f.engine.clone_version(&f.version, "Travel v2").unwrap();

    let err = f
        .engine
        .clone_application(&id, &user(), &draft)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Approval(ApprovalError::VersionNotActive(_))
    ));

    f.engine.activate_version(&draft).unwrap();
    let copy = f.engine.clone_application(&id, &user(), &draft).unwrap();
    let app = f.engine.load_application(&copy).unwrap();
    assert_eq!(app.workflow_version_id, draft);
    let first = f.engine.load_version(&draft).unwrap().stages[0].id.clone();
    assert_eq!(app.current_stage_id(), &first);
    assert_eq!(
        f.engine.latest_form_data(&copy).unwrap()[&first].get_value("destination"),
        Some(&json!("Oslo"))
    );
}
