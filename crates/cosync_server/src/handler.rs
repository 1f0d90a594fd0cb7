//! Request handlers for the commit/poll endpoints.

use crate::config::ServerConfig;
use crate::document::{DocumentLog, DocumentState};
use crate::error::{ServerError, ServerResult};
use crate::store::DocumentStore;
use cosync_protocol::{
    Algebra, CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentId,
    JoinResponse, SiteId, StatRequest, StatResponse,
};
use std::sync::Arc;
use tracing::info;

/// Shared state for request handling.
pub struct HandlerContext<A: Algebra, S: DocumentStore<A>> {
    /// Server configuration.
    pub config: ServerConfig,
    /// The operation algebra documents are interpreted under.
    pub algebra: Arc<A>,
    /// Document storage.
    pub store: S,
}

impl<A: Algebra, S: DocumentStore<A>> HandlerContext<A, S> {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, algebra: Arc<A>, store: S) -> Self {
        Self {
            config,
            algebra,
            store,
        }
    }
}

/// Handler for client requests.
pub struct RequestHandler<A: Algebra, S: DocumentStore<A>> {
    context: Arc<HandlerContext<A, S>>,
}

impl<A: Algebra, S: DocumentStore<A>> RequestHandler<A, S> {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext<A, S>>) -> Self {
        Self { context }
    }

    /// Handles a document-creation request.
    pub fn handle_create(
        &self,
        request: CreateRequest<A::Data>,
    ) -> ServerResult<CreateResponse<A::Data, A::Edit>> {
        let id = DocumentId::random();
        let log = DocumentLog::new(
            id.clone(),
            Arc::clone(&self.context.algebra),
            request.initial,
        );
        let document = log.snapshot();
        self.context.store.insert(id.clone(), DocumentState::new(log));
        info!(document = %id, "created document");
        Ok(CreateResponse { document })
    }

    /// Handles a join request: mints a site identity and returns a snapshot.
    pub fn handle_join(
        &self,
        document_id: DocumentId,
    ) -> ServerResult<JoinResponse<A::Data, A::Edit>> {
        let state = self
            .context
            .store
            .get(&document_id)
            .ok_or_else(|| ServerError::UnknownDocument(document_id.clone()))?;

        let site_id = SiteId::random();
        let snapshot = state.lock().log.snapshot();
        info!(document = %document_id, site = %site_id, "site joined");
        Ok(JoinResponse {
            site_id,
            document: snapshot,
        })
    }

    /// Handles a commit request: merges the inbound operations, then answers
    /// with the log page starting at the sender's cursor.
    ///
    /// A request with no operations is a plain poll. Redelivered operations
    /// deduplicate by id, so the response echoes them from the log exactly as
    /// if the first delivery had been answered.
    pub fn handle_commit(
        &self,
        request: CommitRequest<A::Edit>,
    ) -> ServerResult<CommitResponse<A::Edit>> {
        if request.ops.len() > self.context.config.max_ops_per_commit {
            return Err(ServerError::InvalidRequest(format!(
                "too many operations: {} > {}",
                request.ops.len(),
                self.context.config.max_ops_per_commit
            )));
        }

        let state = self
            .context
            .store
            .get(&request.document_id)
            .ok_or_else(|| ServerError::UnknownDocument(request.document_id.clone()))?;
        let mut state = state.lock();

        state.stats.requests_received += 1;
        if !request.ops.is_empty() {
            state.stats.requests_with_ops += 1;
            state.stats.ops_received += request.ops.len() as u64;
        }

        let outcome = state.log.apply(&request.ops);
        state.stats.ops_stored += outcome.accepted as u64;
        state.stats.ops_rejected += outcome.rejected as u64;

        let (ops, _cursor) = state
            .log
            .fetch_since(request.package_index, self.context.config.page_size)
            .ok_or_else(|| {
                ServerError::ProtocolViolation(format!(
                    "cursor {} past log of length {}",
                    request.package_index,
                    state.log.context()
                ))
            })?;
        state.stats.ops_sent += ops.len() as u64;

        Ok(CommitResponse { ops })
    }

    /// Handles a stat request.
    pub fn handle_stat(&self, request: StatRequest) -> ServerResult<StatResponse<A::Data>> {
        let state = self
            .context
            .store
            .get(&request.document_id)
            .ok_or_else(|| ServerError::UnknownDocument(request.document_id.clone()))?;
        let state = state.lock();

        Ok(StatResponse {
            requests_received: state.stats.requests_received,
            requests_with_ops: state.stats.requests_with_ops,
            ops_received: state.stats.ops_received,
            ops_stored: state.stats.ops_stored,
            ids_stored: state.log.ids_stored(),
            ops_sent: state.stats.ops_sent,
            ops_rejected: state.stats.ops_rejected,
            document_data: state.log.data().clone(),
        })
    }
}
