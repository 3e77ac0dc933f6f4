//! Schema and data mergers
//!
//! An application's form is assembled from every stage it has worked
//! through, from the first stage up to its current stage. Each stage sees
//! the base schema narrowed by its formviews, optionally adjusted by a
//! [`SchemaAdjuster`] plugin hook.
//!
//! | purpose   | schema                                   | data                                        |
//! |-----------|------------------------------------------|---------------------------------------------|
//! | `View`    | concat of every stage's adjusted schema   | concat of every stage's latest submission   |
//! | `Edit`    | current stage's adjusted schema only      | view data projected onto the edit schema    |
//! | `Preview` | whole base schema, formview defaults set  | empty data with schema defaults filled in   |

use crate::{FormData, FormError, FormResult, FormSchema};
use approval_types::{StageId, WorkflowStage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the merged form is for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergePurpose {
    View,
    Edit,
    Preview,
}

impl MergePurpose {
    pub fn from_name(name: &str) -> FormResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "VIEW" => Ok(MergePurpose::View),
            "EDIT" => Ok(MergePurpose::Edit),
            "PREVIEW" => Ok(MergePurpose::Preview),
            _ => Err(FormError::UnknownPurpose(name.to_string())),
        }
    }
}

impl std::fmt::Display for MergePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePurpose::View => write!(f, "VIEW"),
            MergePurpose::Edit => write!(f, "EDIT"),
            MergePurpose::Preview => write!(f, "PREVIEW"),
        }
    }
}

/// Plugin hook run on each stage's schema before it is merged
pub trait SchemaAdjuster {
    fn adjust(&self, stage: &WorkflowStage, purpose: MergePurpose, schema: FormSchema) -> FormSchema {
        let _ = (stage, purpose);
        schema
    }
}

/// Leaves every schema untouched
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAdjustment;

impl SchemaAdjuster for NoAdjustment {}

// ── Schema merger ────────────────────────────────────────────────────

/// Accumulates the merged schema stage by stage
pub struct FormSchemaMerger<'a> {
    base: &'a FormSchema,
    adjuster: &'a dyn SchemaAdjuster,
    purpose: MergePurpose,
    result: FormSchema,
}

impl<'a> FormSchemaMerger<'a> {
    pub fn new(base: &'a FormSchema, adjuster: &'a dyn SchemaAdjuster, purpose: MergePurpose) -> Self {
        let result = match purpose {
            MergePurpose::Preview => base.clone(),
            MergePurpose::View | MergePurpose::Edit => base.create_empty(),
        };
        Self {
            base,
            adjuster,
            purpose,
            result,
        }
    }

    /// The base schema narrowed to a stage and adjusted
    pub fn stage_schema(&self, stage: &WorkflowStage) -> FormSchema {
        let applied = self.base.apply_formviews(&stage.formviews);
        self.adjuster.adjust(stage, self.purpose, applied)
    }

    /// Fold one working stage into the result. Returns the stage's adjusted
    /// schema for the data merger, or `None` when the purpose takes no data.
    pub fn process_stage(&mut self, stage: &WorkflowStage, is_current: bool) -> Option<FormSchema> {
        match self.purpose {
            MergePurpose::View => {
                let schema = self.stage_schema(stage);
                self.result = self.result.concat(&schema);
                Some(schema)
            }
            MergePurpose::Edit => {
                let schema = self.stage_schema(stage);
                if is_current {
                    self.result = schema.clone();
                }
                Some(schema)
            }
            MergePurpose::Preview => {
                for formview in stage.formviews.iter().filter(|f| f.active) {
                    if let Some(default) = formview.default_value.as_deref() {
                        self.result.set_field_default(&formview.field_key, default);
                    }
                }
                if is_current {
                    let schema = std::mem::replace(&mut self.result, self.base.create_empty());
                    self.result = self.adjuster.adjust(stage, self.purpose, schema);
                }
                None
            }
        }
    }

    pub fn finish(self) -> FormSchema {
        self.result
    }
}

// ── Data merger ──────────────────────────────────────────────────────

/// Accumulates the merged data stage by stage
pub struct FormDataMerger {
    purpose: MergePurpose,
    result: FormData,
}

impl FormDataMerger {
    pub fn new(purpose: MergePurpose) -> Self {
        Self {
            purpose,
            result: FormData::create_empty(),
        }
    }

    /// Fold a stage's latest submission, seen through that stage's schema.
    /// Stages without a submission contribute nothing.
    pub fn process_stage(&mut self, stage_schema: &FormSchema, submission: Option<&FormData>) {
        if self.purpose == MergePurpose::Preview {
            return;
        }
        if let Some(submission) = submission {
            let projected = submission.apply_form_schema(stage_schema, false);
            self.result = self.result.concat(&projected);
        }
    }

    pub fn finish(self, merged_schema: &FormSchema) -> FormData {
        match self.purpose {
            MergePurpose::View => self.result,
            MergePurpose::Edit => self.result.apply_form_schema(merged_schema, false),
            MergePurpose::Preview => FormData::create_empty().apply_form_schema(merged_schema, true),
        }
    }
}

// ── Driver ───────────────────────────────────────────────────────────

/// Merged schema and data for one application
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormContents {
    pub form_schema: FormSchema,
    pub form_data: FormData,
}

/// Run both mergers over the working stages.
///
/// `stages` are sorted by ordinal number; the last one is the current
/// stage. `submissions` holds the latest submission per stage.
pub fn merge_form_contents(
    base: &FormSchema,
    stages: &[&WorkflowStage],
    submissions: &HashMap<StageId, FormData>,
    purpose: MergePurpose,
    adjuster: &dyn SchemaAdjuster,
) -> FormResult<FormContents> {
    let mut ordered: Vec<&WorkflowStage> = stages.to_vec();
    ordered.sort_by_key(|s| s.ordinal_number);

    let mut schema_merger = FormSchemaMerger::new(base, adjuster, purpose);
    let mut data_merger = FormDataMerger::new(purpose);

    let last = ordered.len().saturating_sub(1);
    for (i, stage) in ordered.iter().enumerate() {
        if let Some(stage_schema) = schema_merger.process_stage(stage, i == last) {
            data_merger.process_stage(&stage_schema, submissions.get(&stage.id));
        }
    }

    let form_schema = schema_merger.finish();
    let form_data = data_merger.finish(&form_schema);
    tracing::debug!(
        purpose = %purpose,
        stages = ordered.len(),
        fields = form_schema.fields().len(),
        "merged form contents"
    );
    Ok(FormContents {
        form_schema,
        form_data,
    })
}
