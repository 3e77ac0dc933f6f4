use super::OrdinalRepository;
use approval_types::ApprovalResult;

/// Ordinal allocation for new children
pub struct Allocate;

impl Allocate {
    /// `max + 1` over the parent's children, or 1 when it has none
    pub fn next<R: OrdinalRepository>(repo: &R, parent: &R::Parent) -> ApprovalResult<i64> {
        let max = repo.ordinals(parent)?.into_iter().map(|(_, ord)| ord).max();
        let next = max.map_or(1, |m| m + 1);
        tracing::debug!(parent = %parent, ordinal = next, "allocated ordinal");
        Ok(next)
    }
}
