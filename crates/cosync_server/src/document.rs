//! The authoritative document log.
//!
//! The server owns the total order of operations. Each accepted operation is
//! stored twice: in its original form (so late-joining clients can replay
//! exactly what the server saw) and in its effective form (the transformed
//! edits that actually mutated the document, which later operations are
//! transformed against).

use cosync_protocol::{
    apply_all, effective_edits, Algebra, DocumentId, DocumentSnapshot, LogEntry, OpId, Operation,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of merging a batch of operations into the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOutcome {
    /// Operations accepted into the log.
    pub accepted: usize,
    /// Operations skipped because their id was already integrated.
    pub duplicates: usize,
    /// Operations dropped as malformed.
    pub rejected: usize,
}

/// One document's total-order operation log and materialized value.
pub struct DocumentLog<A: Algebra> {
    id: DocumentId,
    algebra: Arc<A>,
    data: A::Data,
    /// Operations in their original (as-committed) form.
    log: Vec<Operation<A::Edit>>,
    /// Effective edits per log position, the transform reference for
    /// everything that arrives later.
    entries: Vec<LogEntry<A::Edit>>,
    index: HashSet<OpId>,
}

impl<A: Algebra> DocumentLog<A> {
    /// Creates an empty log over `initial`, or the algebra's default value.
    pub fn new(id: DocumentId, algebra: Arc<A>, initial: Option<A::Data>) -> Self {
        Self {
            id,
            algebra,
            data: initial.unwrap_or_default(),
            log: Vec::new(),
            entries: Vec::new(),
            index: HashSet::new(),
        }
    }

    /// Document identifier.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Current materialized value.
    pub fn data(&self) -> &A::Data {
        &self.data
    }

    /// Log length, which is also the context a fully caught-up site holds.
    pub fn context(&self) -> u64 {
        self.log.len() as u64
    }

    /// Whether an operation id has already been integrated.
    pub fn contains(&self, id: &OpId) -> bool {
        self.index.contains(id)
    }

    /// Number of distinct operation ids integrated.
    pub fn ids_stored(&self) -> u64 {
        self.index.len() as u64
    }

    /// Merges a batch of operations, oldest first.
    ///
    /// Duplicate ids are skipped without effect, which makes redelivery of a
    /// lost response safe. A malformed operation (impossible context or an
    /// edit that does not apply) is dropped without touching the document;
    /// the rest of the batch still merges.
    pub fn apply(&mut self, ops: &[Operation<A::Edit>]) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        for op in ops {
            if self.index.contains(&op.id) {
                debug!(document = %self.id, op = %op.id, "skipping duplicate operation");
                outcome.duplicates += 1;
                continue;
            }

            let Some(edits) = effective_edits(self.algebra.as_ref(), &self.entries, op) else {
                warn!(
                    document = %self.id,
                    op = %op.id,
                    context = op.context,
                    log_len = self.log.len(),
                    "dropping operation with context past the log"
                );
                outcome.rejected += 1;
                continue;
            };

            let next = match apply_all(self.algebra.as_ref(), &self.data, &edits) {
                Ok(next) => next,
                Err(err) => {
                    warn!(
                        document = %self.id,
                        op = %op.id,
                        error = %err,
                        "dropping operation that does not apply"
                    );
                    outcome.rejected += 1;
                    continue;
                }
            };

            // An annihilated operation (empty effective batch) still takes a
            // log slot so its author receives the echo.
            self.data = next;
            self.entries.push(LogEntry {
                site_id: op.site_id.clone(),
                edits,
            });
            self.index.insert(op.id.clone());
            self.log.push(op.clone());
            outcome.accepted += 1;
        }
        outcome
    }

    /// Returns one page of the log starting at `cursor`, plus the cursor the
    /// reader holds after consuming it.
    ///
    /// `None` when `cursor` lies past the end of the log.
    pub fn fetch_since(
        &self,
        cursor: u64,
        page_size: usize,
    ) -> Option<(Vec<Operation<A::Edit>>, u64)> {
        let start = usize::try_from(cursor).ok()?;
        if start > self.log.len() {
            return None;
        }
        let end = (start + page_size).min(self.log.len());
        Some((self.log[start..end].to_vec(), end as u64))
    }

    /// Full snapshot for a joining site.
    pub fn snapshot(&self) -> DocumentSnapshot<A::Data, A::Edit> {
        DocumentSnapshot {
            id: self.id.clone(),
            data: self.data.clone(),
            ops: self.log.clone(),
            context: self.context(),
        }
    }
}

/// Lifetime counters for one document, reported by the stat endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    /// Commit requests handled.
    pub requests_received: u64,
    /// Commit requests that carried at least one operation.
    pub requests_with_ops: u64,
    /// Operations received, duplicates included.
    pub ops_received: u64,
    /// Operations accepted into the log.
    pub ops_stored: u64,
    /// Operations sent back out in log pages.
    pub ops_sent: u64,
    /// Operations dropped as malformed.
    pub ops_rejected: u64,
}

/// One document's log together with its counters.
pub struct DocumentState<A: Algebra> {
    /// Operation log and materialized value.
    pub log: DocumentLog<A>,
    /// Lifetime counters.
    pub stats: DocumentStats,
}

impl<A: Algebra> DocumentState<A> {
    /// Creates the state for a fresh document.
    pub fn new(log: DocumentLog<A>) -> Self {
        Self {
            log,
            stats: DocumentStats::default(),
        }
    }
}
