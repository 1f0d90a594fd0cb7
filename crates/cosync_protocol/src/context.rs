//! Causal-window replay.
//!
//! Every operation carries the number of log entries its origin site had
//! integrated when the operation was created. Replaying the log suffix past
//! that point yields the operation's effective form, and every replica that
//! holds the same log computes the same result.

use crate::algebra::{transform_against, Algebra, Side};
use crate::operation::{Operation, SiteId};

/// One integrated operation as recorded in the log: the origin site plus the
/// effective edits that were actually applied to the document.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry<E> {
    /// Site that authored the operation.
    pub site_id: SiteId,
    /// The edits in their applied (already transformed) form.
    pub edits: Vec<E>,
}

/// Computes the effective edits of `op` against a log of integrated entries.
///
/// The operation's batch is transformed through every entry at position
/// `op.context` or later, skipping entries authored by the operation's own
/// site (those were already accounted for at the origin). Returns `None`
/// when the claimed context lies beyond the log, which means the operation
/// references history this replica has never seen.
pub fn effective_edits<A: Algebra>(
    algebra: &A,
    entries: &[LogEntry<A::Edit>],
    op: &Operation<A::Edit>,
) -> Option<Vec<A::Edit>> {
    let start = usize::try_from(op.context).ok()?;
    if start > entries.len() {
        return None;
    }

    let mut edits = op.updates.clone();
    for entry in &entries[start..] {
        if entry.site_id == op.site_id {
            continue;
        }
        let side = Side::for_sites(&op.site_id, &entry.site_id);
        edits = transform_against(algebra, &edits, &entry.edits, side);
    }
    Some(edits)
}
