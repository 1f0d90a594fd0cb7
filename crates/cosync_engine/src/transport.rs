//! Transport layer abstraction.

use crate::error::{EngineError, EngineResult};
use cosync_protocol::{
    Algebra, CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentId,
    DocumentSnapshot, JoinResponse, StatRequest, StatResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

/// Network communication with the document server.
///
/// This trait abstracts the wire, allowing different implementations
/// (HTTP, an in-process loopback for tests, etc.). Every exchange is one
/// request with one response; the session never holds more than one in
/// flight.
pub trait CommitTransport<A: Algebra>: Send + Sync {
    /// Creates a document on the server, receiving its initial snapshot.
    fn create(&self, request: CreateRequest<A::Data>)
        -> EngineResult<CreateResponse<A::Data, A::Edit>>;

    /// Joins a document, receiving a site identity and a snapshot.
    fn join(&self, document_id: &DocumentId) -> EngineResult<JoinResponse<A::Data, A::Edit>>;

    /// Sends outbound operations and polls for the next log page.
    fn commit(&self, request: &CommitRequest<A::Edit>) -> EngineResult<CommitResponse<A::Edit>>;

    /// Fetches server-side counters for a document.
    fn stat(&self, request: &StatRequest) -> EngineResult<StatResponse<A::Data>>;
}

impl<A: Algebra, T: CommitTransport<A> + ?Sized> CommitTransport<A> for std::sync::Arc<T> {
    fn create(
        &self,
        request: CreateRequest<A::Data>,
    ) -> EngineResult<CreateResponse<A::Data, A::Edit>> {
        (**self).create(request)
    }

    fn join(&self, document_id: &DocumentId) -> EngineResult<JoinResponse<A::Data, A::Edit>> {
        (**self).join(document_id)
    }

    fn commit(&self, request: &CommitRequest<A::Edit>) -> EngineResult<CommitResponse<A::Edit>> {
        (**self).commit(request)
    }

    fn stat(&self, request: &StatRequest) -> EngineResult<StatResponse<A::Data>> {
        (**self).stat(request)
    }
}

/// A scripted transport for testing.
///
/// Commit responses are served from a queue; an empty queue answers with an
/// empty page. `fail_next` makes the next N exchanges fail with a retryable
/// transport error. Every commit request is recorded.
pub struct MockTransport<A: Algebra> {
    join_response: Mutex<Option<JoinResponse<A::Data, A::Edit>>>,
    commit_responses: Mutex<VecDeque<CommitResponse<A::Edit>>>,
    requests: Mutex<Vec<CommitRequest<A::Edit>>>,
    fail_next: AtomicU32,
}

impl<A: Algebra> MockTransport<A> {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self {
            join_response: Mutex::new(None),
            commit_responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fail_next: AtomicU32::new(0),
        }
    }

    /// Sets the response for the next join.
    pub fn set_join_response(&self, response: JoinResponse<A::Data, A::Edit>) {
        *self.join_response.lock() = Some(response);
    }

    /// Queues a commit response.
    pub fn push_commit_response(&self, response: CommitResponse<A::Edit>) {
        self.commit_responses.lock().push_back(response);
    }

    /// Makes the next `count` exchanges fail with retryable errors.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Commit requests received so far.
    pub fn requests(&self) -> Vec<CommitRequest<A::Edit>> {
        self.requests.lock().clone()
    }

    fn check_failure(&self) -> EngineResult<()> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::transport_retryable("scripted failure"));
        }
        Ok(())
    }
}

impl<A: Algebra> Default for MockTransport<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Algebra> CommitTransport<A> for MockTransport<A> {
    fn create(
        &self,
        request: CreateRequest<A::Data>,
    ) -> EngineResult<CreateResponse<A::Data, A::Edit>> {
        self.check_failure()?;
        Ok(CreateResponse {
            document: DocumentSnapshot {
                id: DocumentId::random(),
                data: request.initial.unwrap_or_default(),
                ops: Vec::new(),
                context: 0,
            },
        })
    }

    fn join(&self, _document_id: &DocumentId) -> EngineResult<JoinResponse<A::Data, A::Edit>> {
        self.check_failure()?;
        self.join_response
            .lock()
            .take()
            .ok_or_else(|| EngineError::Protocol("no scripted join response".into()))
    }

    fn commit(&self, request: &CommitRequest<A::Edit>) -> EngineResult<CommitResponse<A::Edit>> {
        self.check_failure()?;
        self.requests.lock().push(request.clone());
        Ok(self
            .commit_responses
            .lock()
            .pop_front()
            .unwrap_or(CommitResponse { ops: Vec::new() }))
    }

    fn stat(&self, _request: &StatRequest) -> EngineResult<StatResponse<A::Data>> {
        Err(EngineError::Protocol("no scripted stat response".into()))
    }
}
