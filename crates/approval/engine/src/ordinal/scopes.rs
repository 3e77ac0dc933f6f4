//! Ordinal repositories over a [`WorkflowStore`]
//!
//! [`StageOrdinals`] orders stages within a workflow version,
//! [`LevelOrdinals`] orders approval levels within a stage.

use super::OrdinalRepository;
use crate::store::{Transactional, WorkflowStore};
use approval_types::*;
use chrono::Utc;

/// Stages of a workflow version
pub struct StageOrdinals<'s, S: WorkflowStore> {
    store: &'s mut S,
}

impl<'s, S: WorkflowStore> StageOrdinals<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }
}

impl<S: WorkflowStore> Transactional for StageOrdinals<'_, S> {
    fn begin(&mut self) -> ApprovalResult<()> {
        self.store.begin()
    }

    fn commit(&mut self) -> ApprovalResult<()> {
        self.store.commit()
    }

    fn rollback(&mut self) -> ApprovalResult<()> {
        self.store.rollback()
    }
}

impl<S: WorkflowStore> OrdinalRepository for StageOrdinals<'_, S> {
    type Parent = WorkflowVersionId;
    type Item = StageId;

    fn ordinals(&self, parent: &WorkflowVersionId) -> ApprovalResult<Vec<(StageId, i64)>> {
        Ok(self
            .store
            .list_stages(parent)?
            .into_iter()
            .map(|s| (s.id, s.ordinal_number))
            .collect())
    }

    fn parent_of(&self, item: &StageId) -> ApprovalResult<Option<WorkflowVersionId>> {
        Ok(self.store.get_stage(item)?.map(|s| s.workflow_version_id))
    }

    fn set_ordinal(&mut self, item: &StageId, ordinal: i64, stamp: bool) -> ApprovalResult<()> {
        let mut record = self
            .store
            .get_stage(item)?
            .ok_or_else(|| ApprovalError::StageNotFound(item.clone()))?;
        record.ordinal_number = ordinal;
        if stamp {
            record.updated_at = Utc::now();
        }
        self.store.update_stage(record)
    }
}

/// Approval levels of a stage
pub struct LevelOrdinals<'s, S: WorkflowStore> {
    store: &'s mut S,
}

impl<'s, S: WorkflowStore> LevelOrdinals<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }
}

impl<S: WorkflowStore> Transactional for LevelOrdinals<'_, S> {
    fn begin(&mut self) -> ApprovalResult<()> {
        self.store.begin()
    }

    fn commit(&mut self) -> ApprovalResult<()> {
        self.store.commit()
    }

    fn rollback(&mut self) -> ApprovalResult<()> {
        self.store.rollback()
    }
}

impl<S: WorkflowStore> OrdinalRepository for LevelOrdinals<'_, S> {
    type Parent = StageId;
    type Item = ApprovalLevelId;

    fn ordinals(&self, parent: &StageId) -> ApprovalResult<Vec<(ApprovalLevelId, i64)>> {
        Ok(self
            .store
            .list_levels(parent)?
            .into_iter()
            .map(|l| (l.id, l.ordinal_number))
            .collect())
    }

    fn parent_of(&self, item: &ApprovalLevelId) -> ApprovalResult<Option<StageId>> {
        Ok(self.store.get_level(item)?.map(|l| l.stage_id))
    }

    fn set_ordinal(
        &mut self,
        item: &ApprovalLevelId,
        ordinal: i64,
        stamp: bool,
    ) -> ApprovalResult<()> {
        let mut record = self
            .store
            .get_level(item)?
            .ok_or_else(|| ApprovalError::ApprovalLevelNotFound(item.clone()))?;
        record.ordinal_number = ordinal;
        if stamp {
            record.updated_at = Utc::now();
        }
        self.store.update_level(record)
    }
}
