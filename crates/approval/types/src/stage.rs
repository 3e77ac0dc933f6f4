//! Workflow stages, approval levels and formviews
//!
//! A stage is one ordered step of a workflow version. What an application
//! may do inside a stage is decided by its [`StageType`]; the per-type
//! rules live in a single transition table ([`StageType::behaviour`]) so the
//! state managers never re-derive them.

use crate::{ApprovalError, ApprovalLevelId, ApprovalResult, StageId, WorkflowVersionId};
use serde::{Deserialize, Serialize};

// ── Stage Type ───────────────────────────────────────────────────────

/// The kind of a workflow stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// The applicant fills in (part of) the form. Applications start here.
    FormSubmission,
    /// The application sits idle until something external moves it on.
    Waiting,
    /// Approvers sign off level by level.
    Approvals,
    /// Terminal stage; the application is complete.
    Finished,
}

/// Row of the stage transition table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageBehaviour {
    /// An application may be created inside this stage
    pub can_start: bool,
    /// The stage advances through its approval levels before leaving
    pub walks_levels: bool,
    /// No state follows or precedes this stage; leaving it is an error
    pub terminal: bool,
}

impl StageType {
    pub const ALL: [StageType; 4] = [
        StageType::FormSubmission,
        StageType::Waiting,
        StageType::Approvals,
        StageType::Finished,
    ];

    /// Stable lowercase code, as stored on stage records
    pub fn code(&self) -> &'static str {
        match self {
            StageType::FormSubmission => "form_submission",
            StageType::Waiting => "waiting",
            StageType::Approvals => "approvals",
            StageType::Finished => "finished",
        }
    }

    /// Uppercase enum name used by API callers
    pub fn enum_name(&self) -> &'static str {
        match self {
            StageType::FormSubmission => "FORM_SUBMISSION",
            StageType::Waiting => "WAITING",
            StageType::Approvals => "APPROVALS",
            StageType::Finished => "FINISHED",
        }
    }

    /// Resolve a stage type from its enum name
    pub fn from_enum(name: &str) -> ApprovalResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.enum_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ApprovalError::ValidationError(format!("Unknown stage type: {}", name)))
    }

    /// Human-readable name with its indefinite article ("an approval")
    pub fn with_article(&self) -> &'static str {
        match self {
            StageType::FormSubmission => "a form submission",
            StageType::Waiting => "a waiting",
            StageType::Approvals => "an approval",
            StageType::Finished => "a finished",
        }
    }

    /// This type's row in the transition table
    pub const fn behaviour(&self) -> StageBehaviour {
        match self {
            StageType::FormSubmission => StageBehaviour {
                can_start: true,
                walks_levels: false,
                terminal: false,
            },
            StageType::Waiting => StageBehaviour {
                can_start: false,
                walks_levels: false,
                terminal: false,
            },
            StageType::Approvals => StageBehaviour {
                can_start: false,
                walks_levels: true,
                terminal: false,
            },
            StageType::Finished => StageBehaviour {
                can_start: false,
                walks_levels: false,
                terminal: true,
            },
        }
    }

    /// Whether the type carries formviews when a stage is created
    pub fn has_formviews(&self) -> bool {
        !matches!(self, StageType::Finished)
    }
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ── Approval Level ───────────────────────────────────────────────────

/// An ordered sign-off step within an approvals stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub id: ApprovalLevelId,
    pub stage_id: StageId,
    pub name: String,
    /// Position within the stage (1-based, dense)
    pub ordinal_number: i64,
    pub active: bool,
}

impl ApprovalLevel {
    pub fn new(stage_id: StageId, name: impl Into<String>, ordinal_number: i64) -> Self {
        Self {
            id: ApprovalLevelId::generate(),
            stage_id,
            name: name.into(),
            ordinal_number,
            active: true,
        }
    }
}

// ── Formviews ────────────────────────────────────────────────────────

/// How a form field is presented at a stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormviewVisibility {
    Editable,
    EditableAndRequired,
    ReadOnly,
    /// Hidden fields have no formview at all
    Hidden,
}

impl FormviewVisibility {
    /// Resolve the `required` / `disabled` pair of a stored formview.
    ///
    /// A field cannot be both required and disabled.
    pub fn resolve(required: bool, disabled: bool) -> ApprovalResult<Self> {
        match (required, disabled) {
            (false, false) => Ok(FormviewVisibility::Editable),
            (true, false) => Ok(FormviewVisibility::EditableAndRequired),
            (false, true) => Ok(FormviewVisibility::ReadOnly),
            (true, true) => Err(ApprovalError::ValidationError(
                "Can not resolve visibility enum, unknown configuration".into(),
            )),
        }
    }

    /// The `(required, disabled)` pair, or `None` for hidden
    pub fn flags(&self) -> Option<(bool, bool)> {
        match self {
            FormviewVisibility::Editable => Some((false, false)),
            FormviewVisibility::EditableAndRequired => Some((true, false)),
            FormviewVisibility::ReadOnly => Some((false, true)),
            FormviewVisibility::Hidden => None,
        }
    }
}

/// Per-stage configuration of a single form field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formview {
    /// Field key in the form schema
    pub field_key: String,
    pub required: bool,
    pub disabled: bool,
    /// Overrides the schema default at this stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub active: bool,
}

impl Formview {
    pub fn new(field_key: impl Into<String>, required: bool, disabled: bool) -> Self {
        Self {
            field_key: field_key.into(),
            required,
            disabled,
            default_value: None,
            active: true,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn visibility(&self) -> ApprovalResult<FormviewVisibility> {
        FormviewVisibility::resolve(self.required, self.disabled)
    }
}

// ── Workflow Stage ───────────────────────────────────────────────────

/// One ordered step of a workflow version
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub id: StageId,
    pub workflow_version_id: WorkflowVersionId,
    pub name: String,
    pub stage_type: StageType,
    /// Position within the version (1-based, dense)
    pub ordinal_number: i64,
    pub active: bool,
    /// Approval levels ordered by ordinal number (approvals stages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approval_levels: Vec<ApprovalLevel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formviews: Vec<Formview>,
}

impl WorkflowStage {
    pub fn new(
        workflow_version_id: WorkflowVersionId,
        name: impl Into<String>,
        stage_type: StageType,
        ordinal_number: i64,
    ) -> Self {
        Self {
            id: StageId::generate(),
            workflow_version_id,
            name: name.into(),
            stage_type,
            ordinal_number,
            active: true,
            approval_levels: Vec::new(),
            formviews: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: StageId) -> Self {
        self.id = id;
        self
    }

    /// Append an approval level at the next ordinal position
    pub fn with_level(mut self, id: ApprovalLevelId, name: impl Into<String>) -> Self {
        let ordinal = self.approval_levels.len() as i64 + 1;
        let mut level = ApprovalLevel::new(self.id.clone(), name, ordinal);
        level.id = id;
        self.approval_levels.push(level);
        self
    }

    pub fn with_formview(mut self, formview: Formview) -> Self {
        self.formviews.push(formview);
        self
    }

    pub fn is_type(&self, stage_type: StageType) -> bool {
        self.stage_type == stage_type
    }

    pub fn first_level(&self) -> Option<&ApprovalLevel> {
        self.approval_levels.first()
    }

    pub fn last_level(&self) -> Option<&ApprovalLevel> {
        self.approval_levels.last()
    }

    pub fn level(&self, id: &ApprovalLevelId) -> Option<&ApprovalLevel> {
        self.approval_levels.iter().find(|l| &l.id == id)
    }

    pub fn has_level(&self, id: &ApprovalLevelId) -> bool {
        self.level(id).is_some()
    }

    /// The level after `id`, or `None` when `id` is the last level
    pub fn next_level(&self, id: &ApprovalLevelId) -> Option<&ApprovalLevel> {
        let pos = self.approval_levels.iter().position(|l| &l.id == id)?;
        self.approval_levels.get(pos + 1)
    }

    /// The level before `id`, or `None` when `id` is the first level
    pub fn previous_level(&self, id: &ApprovalLevelId) -> Option<&ApprovalLevel> {
        let pos = self.approval_levels.iter().position(|l| &l.id == id)?;
        pos.checked_sub(1).and_then(|p| self.approval_levels.get(p))
    }

    pub fn formview(&self, field_key: &str) -> Option<&Formview> {
        self.formviews.iter().find(|f| f.field_key == field_key)
    }
}
