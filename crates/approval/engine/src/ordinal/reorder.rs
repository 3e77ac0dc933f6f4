use super::OrdinalRepository;
use crate::store::Transactional;
use approval_types::{ApprovalError, ApprovalResult};
use std::collections::{HashMap, HashSet};

/// Renumbers a parent's children to follow a new order
#[derive(Clone, Copy, Debug)]
pub struct Reorder {
    track_updates: bool,
}

impl Reorder {
    pub fn new(track_updates: bool) -> Self {
        Self { track_updates }
    }

    /// Give each item of `new_order` the ordinal `position + 1`.
    ///
    /// `current` is the order the caller last saw. Both lists must be
    /// exactly the parent's children. Only items whose ordinal changes are
    /// written, first to a negated placeholder and then to the final value,
    /// so the per-parent uniqueness of ordinals holds after every write.
    pub fn execute<R: OrdinalRepository>(
        &self,
        repo: &mut R,
        parent: &R::Parent,
        current: &[R::Item],
        new_order: &[R::Item],
    ) -> ApprovalResult<()> {
        for item in current.iter().chain(new_order) {
            match repo.parent_of(item)? {
                Some(p) if &p == parent => {}
                _ => {
                    return Err(ApprovalError::ForeignItem {
                        item: item.to_string(),
                        parent: parent.to_string(),
                    })
                }
            }
        }

        let stored: HashMap<R::Item, i64> = repo.ordinals(parent)?.into_iter().collect();
        check_matches(&stored, current, "current order")?;
        check_matches(&stored, new_order, "new order")?;

        let changes: Vec<(R::Item, i64)> = new_order
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.clone(), pos as i64 + 1))
            .filter(|(item, ord)| stored.get(item) != Some(ord))
            .collect();
        if changes.is_empty() {
            return Ok(());
        }

        let stamp = self.track_updates;
        repo.transaction(|repo| {
            for (item, ord) in &changes {
                repo.set_ordinal(item, -ord, stamp)?;
            }
            for (item, ord) in &changes {
                repo.set_ordinal(item, *ord, stamp)?;
            }
            Ok::<_, ApprovalError>(())
        })?;

        tracing::debug!(parent = %parent, changed = changes.len(), "reordered ordinals");
        Ok(())
    }
}

fn check_matches<I: Eq + std::hash::Hash>(
    stored: &HashMap<I, i64>,
    items: &[I],
    what: &str,
) -> ApprovalResult<()> {
    let unique: HashSet<&I> = items.iter().collect();
    let matches = unique.len() == items.len()
        && items.len() == stored.len()
        && items.iter().all(|i| stored.contains_key(i));
    if matches {
        Ok(())
    } else {
        Err(ApprovalError::ItemsMismatch(what.to_string()))
    }
}
