//! The sync session: a site wired to a transport.
//!
//! A session owns one [`Site`] and pumps it over a [`CommitTransport`] with
//! single-flight request cycles. Each cycle sends whatever local operations
//! are queued (possibly none, which makes the request a plain poll) together
//! with the site's log cursor, then integrates the log page that comes back.
//! A background task can drive cycles on an interval; `sync_now` drives one
//! by hand, which is how the deterministic tests work.

use crate::config::SessionConfig;
use crate::error::{EngineError, EngineResult};
use crate::site::Site;
use crate::transport::CommitTransport;
use cosync_protocol::{
    Algebra, CommitRequest, CreateRequest, DocumentId, Operation, SiteId, StatRequest,
    StatResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// The current state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No exchange in progress.
    Idle,
    /// An exchange is in flight.
    Syncing,
    /// Waiting out a backoff delay after a failed exchange.
    Backoff,
    /// The session was stopped.
    Stopped,
}

impl SessionState {
    /// Whether the session can still exchange with the server.
    pub fn is_running(&self) -> bool {
        !matches!(self, SessionState::Stopped)
    }
}

/// Result of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A round trip completed.
    Completed {
        /// Operations sent to the server.
        sent: usize,
        /// Log operations received and integrated.
        received: usize,
    },
    /// Another cycle was already in flight.
    Skipped,
    /// The backoff delay after a failure has not elapsed yet.
    Waiting,
}

/// Counters describing a session's life so far.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Round trips completed.
    pub cycles_completed: u64,
    /// Operations sent to the server.
    pub ops_sent: u64,
    /// Log operations received and integrated.
    pub ops_received: u64,
    /// Cycles skipped because one was already in flight.
    pub ticks_skipped: u64,
    /// Failed exchanges.
    pub failures: u64,
    /// Most recent error message.
    pub last_error: Option<String>,
}

struct SessionInner<A: Algebra, T: CommitTransport<A>> {
    config: SessionConfig,
    transport: T,
    document_id: DocumentId,
    site: Mutex<Site<A>>,
    /// Operations committed locally and not yet confirmed sent, in their
    /// original form. Popped only once a response proves delivery; the
    /// server's duplicate drop makes the resend after a lost response safe.
    outbound: Mutex<VecDeque<Operation<A::Edit>>>,
    state: Mutex<SessionState>,
    stats: Mutex<SessionStats>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
    failures: AtomicU32,
    retry_at: Mutex<Option<Instant>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// A live connection between a local site and a document on the server.
///
/// Cheap to clone; clones share the same session.
pub struct SyncSession<A: Algebra, T: CommitTransport<A>> {
    inner: Arc<SessionInner<A, T>>,
}

impl<A: Algebra, T: CommitTransport<A>> Clone for SyncSession<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Algebra, T: CommitTransport<A> + 'static> SyncSession<A, T> {
    /// Creates a document on the server without joining it.
    pub fn create_document(
        transport: &T,
        initial: Option<A::Data>,
    ) -> EngineResult<DocumentId> {
        let response = transport.create(CreateRequest { initial })?;
        Ok(response.document.id)
    }

    /// Joins a document: fetches a snapshot, builds the local site, and
    /// returns the session ready to sync.
    pub fn connect(
        config: SessionConfig,
        algebra: A,
        transport: T,
        document_id: DocumentId,
    ) -> EngineResult<Self> {
        let joined = transport.join(&document_id)?;
        let site = Site::from_snapshot(Arc::new(algebra), joined.site_id, joined.document)?;
        info!(document = %document_id, site = %site.site_id(), "joined document");
        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                document_id,
                site: Mutex::new(site),
                outbound: Mutex::new(VecDeque::new()),
                state: Mutex::new(SessionState::Idle),
                stats: Mutex::new(SessionStats::default()),
                in_flight: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                failures: AtomicU32::new(0),
                retry_at: Mutex::new(None),
                task: Mutex::new(None),
            }),
        })
    }

    /// The document this session is bound to.
    pub fn document_id(&self) -> &DocumentId {
        &self.inner.document_id
    }

    /// The identity the server minted for this site.
    pub fn site_id(&self) -> SiteId {
        self.inner.site.lock().site_id().clone()
    }

    /// Current local document value.
    pub fn data(&self) -> A::Data {
        self.inner.site.lock().data().clone()
    }

    /// How many log operations the local site has integrated.
    pub fn cursor(&self) -> u64 {
        self.inner.site.lock().cursor()
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        self.inner.stats.lock().clone()
    }

    /// Operations committed locally and not yet echoed back.
    pub fn pending_ops(&self) -> usize {
        self.inner.site.lock().unacked_len()
    }

    /// Applies a local edit batch and queues it for the next cycle.
    pub fn commit(&self, edits: Vec<A::Edit>) -> EngineResult<()> {
        let op = self.inner.site.lock().commit(edits)?;
        self.inner.outbound.lock().push_back(op);
        Ok(())
    }

    /// Undoes the most recent local commit. Returns false when there was
    /// nothing to undo.
    pub fn undo(&self) -> EngineResult<bool> {
        let Some(op) = self.inner.site.lock().undo()? else {
            return Ok(false);
        };
        self.inner.outbound.lock().push_back(op);
        Ok(true)
    }

    /// Re-applies the most recently undone commit.
    pub fn redo(&self) -> EngineResult<bool> {
        let Some(op) = self.inner.site.lock().redo()? else {
            return Ok(false);
        };
        self.inner.outbound.lock().push_back(op);
        Ok(true)
    }

    /// Fetches server-side counters for this document.
    pub fn stat(&self) -> EngineResult<StatResponse<A::Data>> {
        self.inner.transport.stat(&StatRequest {
            document_id: self.inner.document_id.clone(),
        })
    }

    /// Drives one sync cycle.
    ///
    /// Does nothing when another cycle is in flight or a backoff delay is
    /// still running; the distinction comes back in the [`CycleOutcome`].
    pub fn sync_now(&self) -> EngineResult<CycleOutcome> {
        self.cycle()
    }

    fn cycle(&self) -> EngineResult<CycleOutcome> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(EngineError::Stopped);
        }
        if let Some(at) = *self.inner.retry_at.lock() {
            if Instant::now() < at {
                return Ok(CycleOutcome::Waiting);
            }
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.inner.stats.lock().ticks_skipped += 1;
            return Ok(CycleOutcome::Skipped);
        }

        let outcome = self.round_trip();
        self.inner.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    fn round_trip(&self) -> EngineResult<CycleOutcome> {
        *self.inner.state.lock() = SessionState::Syncing;

        let ops: Vec<_> = self
            .inner
            .outbound
            .lock()
            .iter()
            .take(self.inner.config.max_ops_per_commit)
            .cloned()
            .collect();
        let request = CommitRequest {
            document_id: self.inner.document_id.clone(),
            package_index: self.inner.site.lock().cursor(),
            ops,
        };

        let result = self.inner.transport.commit(&request);

        // A stop that raced the exchange wins: the late response is dropped
        // without touching the queue, the site, or the state.
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(EngineError::Stopped);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => return self.record_failure(err),
        };

        // Delivery confirmed, the sent operations leave the queue. Their
        // echoes arrive through log pages like any other operation.
        {
            let mut outbound = self.inner.outbound.lock();
            for _ in 0..request.ops.len() {
                outbound.pop_front();
            }
        }

        if let Err(err) = self.inner.site.lock().integrate_page(&response.ops) {
            return self.record_failure(err);
        }

        self.inner.failures.store(0, Ordering::SeqCst);
        *self.inner.retry_at.lock() = None;
        *self.inner.state.lock() = SessionState::Idle;

        let mut stats = self.inner.stats.lock();
        stats.cycles_completed += 1;
        stats.ops_sent += request.ops.len() as u64;
        stats.ops_received += response.ops.len() as u64;
        drop(stats);

        debug!(
            document = %self.inner.document_id,
            sent = request.ops.len(),
            received = response.ops.len(),
            "sync cycle completed"
        );
        Ok(CycleOutcome::Completed {
            sent: request.ops.len(),
            received: response.ops.len(),
        })
    }

    fn record_failure(&self, err: EngineError) -> EngineResult<CycleOutcome> {
        {
            let mut stats = self.inner.stats.lock();
            stats.failures += 1;
            stats.last_error = Some(err.to_string());
        }
        if err.is_retryable() {
            let failures = self.inner.failures.fetch_add(1, Ordering::SeqCst) + 1;
            let delay = self.inner.config.retry.delay_for_failures(failures);
            *self.inner.retry_at.lock() = Some(Instant::now() + delay);
            *self.inner.state.lock() = SessionState::Backoff;
            warn!(
                document = %self.inner.document_id,
                error = %err,
                failures,
                backoff_ms = delay.as_millis() as u64,
                "sync cycle failed, backing off"
            );
        } else {
            *self.inner.state.lock() = SessionState::Idle;
            warn!(document = %self.inner.document_id, error = %err, "sync cycle failed");
        }
        Err(err)
    }

    /// Starts the background polling task. A second call while the task is
    /// alive does nothing.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() || self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let session = self.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(session.inner.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if session.inner.stopped.load(Ordering::SeqCst) {
                    break;
                }
                match session.cycle() {
                    Ok(_) => {}
                    Err(EngineError::Stopped) => break,
                    Err(_) => {
                        // Already logged; the next tick retries once the
                        // backoff window closes.
                    }
                }
            }
        }));
    }

    /// Stops the session. Idempotent; a stopped session refuses further
    /// cycles, and an exchange already in flight has its response discarded.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.inner.state.lock() = SessionState::Stopped;
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
        }
        info!(document = %self.inner.document_id, "session stopped");
    }
}
