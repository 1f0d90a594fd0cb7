//! Server facade.

use crate::config::ServerConfig;
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::{DocumentStore, MemoryStore};
use cosync_protocol::{
    Algebra, CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentId,
    JoinResponse, StatRequest, StatResponse,
};
use std::sync::Arc;

use crate::error::ServerResult;

/// The collaborative document server.
///
/// Owns every document log and resolves concurrent edits into one total
/// order. Transport is out of scope here: an application exposes endpoints
/// that deserialize request bodies and call the matching `handle_*` method.
///
/// # Example
///
/// ```
/// use cosync_server::{CollabServer, ServerConfig};
/// use cosync_protocol::{CreateRequest, TextAlgebra};
///
/// let server = CollabServer::new(ServerConfig::default(), TextAlgebra);
/// let created = server.handle_create(CreateRequest::default()).unwrap();
/// let joined = server.handle_join(created.document.id).unwrap();
/// assert_eq!(joined.document.context, 0);
/// ```
pub struct CollabServer<A: Algebra, S: DocumentStore<A> = MemoryStore<A>> {
    handler: RequestHandler<A, S>,
    context: Arc<HandlerContext<A, S>>,
}

impl<A: Algebra> CollabServer<A, MemoryStore<A>> {
    /// Creates a server over an in-memory store.
    pub fn new(config: ServerConfig, algebra: A) -> Self {
        Self::with_store(config, algebra, MemoryStore::new())
    }
}

impl<A: Algebra, S: DocumentStore<A>> CollabServer<A, S> {
    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, algebra: A, store: S) -> Self {
        let context = Arc::new(HandlerContext::new(config, Arc::new(algebra), store));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a document-creation request.
    pub fn handle_create(
        &self,
        request: CreateRequest<A::Data>,
    ) -> ServerResult<CreateResponse<A::Data, A::Edit>> {
        self.handler.handle_create(request)
    }

    /// Handles a join request.
    pub fn handle_join(
        &self,
        document_id: DocumentId,
    ) -> ServerResult<JoinResponse<A::Data, A::Edit>> {
        self.handler.handle_join(document_id)
    }

    /// Handles a commit request.
    pub fn handle_commit(
        &self,
        request: CommitRequest<A::Edit>,
    ) -> ServerResult<CommitResponse<A::Edit>> {
        self.handler.handle_commit(request)
    }

    /// Handles a stat request.
    pub fn handle_stat(&self, request: StatRequest) -> ServerResult<StatResponse<A::Data>> {
        self.handler.handle_stat(request)
    }

    /// Number of documents held.
    pub fn document_count(&self) -> usize {
        self.context.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosync_protocol::{Operation, SiteId, TextAlgebra, TextEdit};

    #[test]
    fn full_request_cycle() {
        let server = CollabServer::new(ServerConfig::default(), TextAlgebra);
        assert_eq!(server.document_count(), 0);

        let created = server.handle_create(CreateRequest::default()).unwrap();
        assert_eq!(server.document_count(), 1);

        let joined = server.handle_join(created.document.id.clone()).unwrap();
        let op = Operation::new(
            joined.site_id.clone(),
            0,
            vec![TextEdit::insert(0, "hello")],
        );
        let response = server
            .handle_commit(CommitRequest {
                document_id: created.document.id.clone(),
                package_index: 0,
                ops: vec![op],
            })
            .unwrap();
        assert_eq!(response.ops.len(), 1);

        let stat = server
            .handle_stat(StatRequest {
                document_id: created.document.id,
            })
            .unwrap();
        assert_eq!(stat.document_data, "hello");
        assert_eq!(stat.ids_stored, 1);
    }

    #[test]
    fn two_sites_converge_through_the_server() {
        let server = CollabServer::new(ServerConfig::default(), TextAlgebra);
        let created = server.handle_create(CreateRequest::default()).unwrap();
        let doc = created.document.id;

        let seed = Operation::new(
            SiteId::new("s1"),
            0,
            vec![TextEdit::insert(0, "Hello World")],
        );
        server
            .handle_commit(CommitRequest {
                document_id: doc.clone(),
                package_index: 0,
                ops: vec![seed],
            })
            .unwrap();

        // Concurrent edits against "Hello World".
        let prepend = Operation::new(SiteId::new("s1"), 1, vec![TextEdit::insert(0, "X")]);
        let truncate = Operation::new(SiteId::new("s2"), 1, vec![TextEdit::remove(10, "d")]);
        for op in [prepend, truncate] {
            server
                .handle_commit(CommitRequest {
                    document_id: doc.clone(),
                    package_index: 0,
                    ops: vec![op],
                })
                .unwrap();
        }

        let stat = server.handle_stat(StatRequest { document_id: doc }).unwrap();
        assert_eq!(stat.document_data, "XHello Worl");
    }
}
