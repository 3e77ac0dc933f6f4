//! Application activities: the audit trail written by stage hooks

use crate::{ApplicationId, ApprovalLevelId, ApprovalResult, StageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of activity recorded against an application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Creation,
    StageStarted,
    StageEnded,
    LevelStarted,
    LevelEnded,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityType::Creation => "creation",
            ActivityType::StageStarted => "stage_started",
            ActivityType::StageEnded => "stage_ended",
            ActivityType::LevelStarted => "level_started",
            ActivityType::LevelEnded => "level_ended",
        };
        write!(f, "{}", s)
    }
}

/// One entry of an application's activity log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationActivity {
    pub application_id: ApplicationId,
    /// `None` when the system acted (scheduled task, automatic transition)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<UserId>,
    pub activity_type: ActivityType,
    pub stage_id: StageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_level_id: Option<ApprovalLevelId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub info: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ApplicationActivity {
    pub fn new(
        application_id: ApplicationId,
        actor: Option<UserId>,
        activity_type: ActivityType,
        stage_id: StageId,
        approval_level_id: Option<ApprovalLevelId>,
    ) -> Self {
        Self {
            application_id,
            actor,
            activity_type,
            stage_id,
            approval_level_id,
            info: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

/// Sink for activities produced by stage entry/exit hooks
pub trait ActivityRecorder {
    fn record(&mut self, activity: ApplicationActivity) -> ApprovalResult<()>;
}

impl ActivityRecorder for Vec<ApplicationActivity> {
    fn record(&mut self, activity: ApplicationActivity) -> ApprovalResult<()> {
        self.push(activity);
        Ok(())
    }
}
