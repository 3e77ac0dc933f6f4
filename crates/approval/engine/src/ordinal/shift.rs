use super::{OrdinalRepository, RemovedItem};
use crate::store::Transactional;
use approval_types::{ApprovalError, ApprovalResult};

/// Closes the gap a deleted child leaves in its parent's ordinals
#[derive(Clone, Copy, Debug)]
pub struct Shift {
    track_updates: bool,
}

impl Shift {
    pub fn new(track_updates: bool) -> Self {
        Self { track_updates }
    }

    /// Decrement every sibling ordered after the removed item.
    ///
    /// The item must already be deleted and must have belonged to `parent`.
    pub fn execute<R: OrdinalRepository>(
        &self,
        repo: &mut R,
        parent: &R::Parent,
        removed: &RemovedItem<R::Item, R::Parent>,
    ) -> ApprovalResult<()> {
        if repo.parent_of(&removed.item)?.is_some() {
            return Err(ApprovalError::ItemNotDeleted(removed.item.to_string()));
        }
        if &removed.parent != parent {
            return Err(ApprovalError::ForeignItem {
                item: removed.item.to_string(),
                parent: parent.to_string(),
            });
        }

        let mut following: Vec<(R::Item, i64)> = repo
            .ordinals(parent)?
            .into_iter()
            .filter(|(_, ord)| *ord > removed.ordinal)
            .collect();
        following.sort_by_key(|(_, ord)| *ord);

        let stamp = self.track_updates;
        repo.transaction(|repo| {
            for (item, ord) in &following {
                repo.set_ordinal(item, ord - 1, stamp)?;
            }
            Ok::<_, ApprovalError>(())
        })?;

        tracing::debug!(
            parent = %parent,
            removed = %removed.item,
            shifted = following.len(),
            "shifted ordinals"
        );
        Ok(())
    }
}
