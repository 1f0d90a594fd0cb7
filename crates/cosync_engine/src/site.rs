//! The client-side site state machine.
//!
//! A site holds the materialized document, the mirror of the server log it
//! has integrated so far, the queue of own operations awaiting their echo,
//! and the undo/redo stacks. All transform work on the client happens here;
//! the session only moves operations between this state machine and the
//! transport.

use crate::error::{EngineError, EngineResult};
use cosync_protocol::{
    apply_all, effective_edits, invert_all, transform_seqs, Algebra, AlgebraError,
    DocumentSnapshot, LogEntry, OpId, Operation, Side, SiteId,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// One replica of a document.
pub struct Site<A: Algebra> {
    algebra: Arc<A>,
    site_id: SiteId,
    data: A::Data,
    /// Mirror of the server log: effective edits per integrated position.
    /// Kept identical to the server's own record so causal-window replay
    /// produces the same result on both ends.
    history: Vec<LogEntry<A::Edit>>,
    /// Own operations committed but not yet echoed back, oldest first.
    /// Their edits are rewritten in place as foreign operations arrive.
    unacked: VecDeque<Operation<A::Edit>>,
    undo_stack: Vec<Vec<A::Edit>>,
    redo_stack: Vec<Vec<A::Edit>>,
    seen: HashSet<OpId>,
}

impl<A: Algebra> Site<A> {
    /// Creates a site over an empty document.
    pub fn new(algebra: Arc<A>, site_id: SiteId) -> Self {
        Self {
            algebra,
            site_id,
            data: A::Data::default(),
            history: Vec::new(),
            unacked: VecDeque::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Creates a site from a join snapshot, replaying the snapshot's log to
    /// rebuild the effective-edit record.
    pub fn from_snapshot(
        algebra: Arc<A>,
        site_id: SiteId,
        snapshot: DocumentSnapshot<A::Data, A::Edit>,
    ) -> EngineResult<Self> {
        let mut history = Vec::with_capacity(snapshot.ops.len());
        let mut seen = HashSet::with_capacity(snapshot.ops.len());
        for op in &snapshot.ops {
            let edits = effective_edits(algebra.as_ref(), &history, op).ok_or_else(|| {
                EngineError::Protocol(format!(
                    "snapshot operation {} has context {} past position {}",
                    op.id,
                    op.context,
                    history.len()
                ))
            })?;
            history.push(LogEntry {
                site_id: op.site_id.clone(),
                edits,
            });
            seen.insert(op.id.clone());
        }
        if history.len() as u64 != snapshot.context {
            return Err(EngineError::Protocol(format!(
                "snapshot context {} does not match its log of {} operations",
                snapshot.context,
                history.len()
            )));
        }
        Ok(Self {
            algebra,
            site_id,
            data: snapshot.data,
            history,
            unacked: VecDeque::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            seen,
        })
    }

    /// This site's identity.
    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    /// Current document value.
    pub fn data(&self) -> &A::Data {
        &self.data
    }

    /// How many log operations this site has integrated. New operations are
    /// stamped with this value as their context.
    pub fn cursor(&self) -> u64 {
        self.history.len() as u64
    }

    /// Own operations awaiting their echo.
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    /// Whether there is anything to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether there is anything to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Applies a local edit batch and mints the operation that carries it.
    ///
    /// The edits must target the current document value. A committed edit
    /// lands on the undo stack and clears the redo stack.
    pub fn commit(&mut self, edits: Vec<A::Edit>) -> EngineResult<Operation<A::Edit>> {
        if edits.is_empty() {
            return Err(EngineError::Malformed(AlgebraError::InvalidEdit(
                "empty edit batch".into(),
            )));
        }
        self.data = apply_all(self.algebra.as_ref(), &self.data, &edits)?;
        self.undo_stack
            .push(invert_all(self.algebra.as_ref(), &edits));
        self.redo_stack.clear();

        let op = Operation::new(self.site_id.clone(), self.cursor(), edits);
        self.unacked.push_back(op.clone());
        Ok(op)
    }

    /// Reverses the most recent un-undone local commit.
    ///
    /// Returns the operation carrying the reversal, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> EngineResult<Option<Operation<A::Edit>>> {
        let Some(edits) = self.undo_stack.last().cloned() else {
            return Ok(None);
        };
        self.data = apply_all(self.algebra.as_ref(), &self.data, &edits)?;
        self.undo_stack.pop();
        self.redo_stack
            .push(invert_all(self.algebra.as_ref(), &edits));

        let op = Operation::new(self.site_id.clone(), self.cursor(), edits);
        self.unacked.push_back(op.clone());
        Ok(Some(op))
    }

    /// Re-applies the most recently undone commit.
    pub fn redo(&mut self) -> EngineResult<Option<Operation<A::Edit>>> {
        let Some(edits) = self.redo_stack.last().cloned() else {
            return Ok(None);
        };
        self.data = apply_all(self.algebra.as_ref(), &self.data, &edits)?;
        self.redo_stack.pop();
        self.undo_stack
            .push(invert_all(self.algebra.as_ref(), &edits));

        let op = Operation::new(self.site_id.clone(), self.cursor(), edits);
        self.unacked.push_back(op.clone());
        Ok(Some(op))
    }

    /// Integrates one operation delivered from the server log.
    ///
    /// Operations must arrive in log order, starting at this site's cursor.
    /// A redelivered operation is skipped outright. An echo of an own
    /// operation acknowledges the oldest pending one; a foreign operation is
    /// replayed through its causal window, bridged past the pending queue,
    /// and applied. Returns the edits that changed the local document (empty
    /// for echoes and annihilated operations).
    pub fn integrate(&mut self, op: &Operation<A::Edit>) -> EngineResult<Vec<A::Edit>> {
        if self.seen.contains(&op.id) {
            debug!(site = %self.site_id, op = %op.id, "duplicate delivery skipped");
            return Ok(Vec::new());
        }

        if op.site_id == self.site_id {
            self.acknowledge(op)?;
            self.seen.insert(op.id.clone());
            return Ok(Vec::new());
        }

        let algebra = Arc::clone(&self.algebra);
        let window = effective_edits(algebra.as_ref(), &self.history, op).ok_or_else(|| {
            EngineError::Protocol(format!(
                "operation {} has context {} past cursor {}",
                op.id,
                op.context,
                self.history.len()
            ))
        })?;

        // Bridge past the pending queue: the incoming edits move into the
        // local frame while each pending operation is rewritten to stand
        // after them.
        let mut local = window.clone();
        let side_remote = Side::for_sites(&op.site_id, &self.site_id);
        for pending in self.unacked.iter_mut() {
            let (local_next, pending_next) =
                transform_seqs(algebra.as_ref(), &local, &pending.updates, side_remote);
            pending.updates = pending_next;
            local = local_next;
        }

        self.data = apply_all(algebra.as_ref(), &self.data, &local)?;

        let side_local = side_remote.opposite();
        rebase_stack(algebra.as_ref(), &mut self.undo_stack, &local, side_local);
        rebase_stack(algebra.as_ref(), &mut self.redo_stack, &local, side_local);

        self.history.push(LogEntry {
            site_id: op.site_id.clone(),
            edits: window,
        });
        self.seen.insert(op.id.clone());
        Ok(local)
    }

    /// Integrates a log page in order, returning every edit applied locally.
    pub fn integrate_page(&mut self, ops: &[Operation<A::Edit>]) -> EngineResult<Vec<A::Edit>> {
        let mut applied = Vec::new();
        for op in ops {
            applied.extend(self.integrate(op)?);
        }
        Ok(applied)
    }

    fn acknowledge(&mut self, op: &Operation<A::Edit>) -> EngineResult<()> {
        if self.unacked.front().map(|p| p.id == op.id).unwrap_or(false) {
            if let Some(pending) = self.unacked.pop_front() {
                // The bridged form of the pending operation is exactly the
                // effective form the server logged for it.
                self.history.push(LogEntry {
                    site_id: pending.site_id,
                    edits: pending.updates,
                });
            }
            return Ok(());
        }

        // An echo out of step with the queue means a delivery this site never
        // requested. Record it from the window replay so the cursor stays
        // aligned with the log.
        warn!(
            site = %self.site_id,
            op = %op.id,
            pending = self.unacked.len(),
            "own operation echoed out of order"
        );
        let window =
            effective_edits(self.algebra.as_ref(), &self.history, op).ok_or_else(|| {
                EngineError::Protocol(format!(
                    "echoed operation {} has context {} past cursor {}",
                    op.id,
                    op.context,
                    self.history.len()
                ))
            })?;
        self.history.push(LogEntry {
            site_id: op.site_id.clone(),
            edits: window,
        });
        Ok(())
    }
}

/// Rewrites every stack entry past an applied foreign edit batch.
///
/// Entries are walked from the top: the incoming edits live in the current
/// document frame, which is the top entry's frame, and each dual transform
/// carries them one frame deeper. Entries whose edits are annihilated
/// entirely drop off the stack.
fn rebase_stack<A: Algebra>(
    algebra: &A,
    stack: &mut Vec<Vec<A::Edit>>,
    incoming: &[A::Edit],
    side_local: Side,
) {
    let mut incoming = incoming.to_vec();
    for entry in stack.iter_mut().rev() {
        let (entry_next, incoming_next) = transform_seqs(algebra, entry, &incoming, side_local);
        *entry = entry_next;
        incoming = incoming_next;
    }
    stack.retain(|entry| !entry.is_empty());
}
