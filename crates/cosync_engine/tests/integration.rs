//! End-to-end tests: sessions talking to an in-process server.

use cosync_engine::{
    CommitTransport, CycleOutcome, EngineError, EngineResult, RetryConfig, SessionConfig,
    SessionState, SyncSession,
};
use cosync_protocol::{
    diff, CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentId, JoinResponse,
    StatRequest, StatResponse, TextAlgebra, TextEdit,
};
use cosync_server::{CollabServer, ServerConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Calls the server in-process. `drop_next_response` loses the response of
/// an exchange after the server has handled it, which is the dangerous half
/// of a network failure.
struct Loopback {
    server: Arc<CollabServer<TextAlgebra>>,
    drop_responses: AtomicU32,
}

impl Loopback {
    fn new(server: Arc<CollabServer<TextAlgebra>>) -> Self {
        Self {
            server,
            drop_responses: AtomicU32::new(0),
        }
    }

    fn drop_next_response(&self, count: u32) {
        self.drop_responses.store(count, Ordering::SeqCst);
    }

    fn map_err(err: cosync_server::ServerError) -> EngineError {
        EngineError::Server(err.to_string())
    }
}

impl CommitTransport<TextAlgebra> for Loopback {
    fn create(
        &self,
        request: CreateRequest<String>,
    ) -> EngineResult<CreateResponse<String, TextEdit>> {
        self.server.handle_create(request).map_err(Self::map_err)
    }

    fn join(&self, document_id: &DocumentId) -> EngineResult<JoinResponse<String, TextEdit>> {
        self.server
            .handle_join(document_id.clone())
            .map_err(Self::map_err)
    }

    fn commit(&self, request: &CommitRequest<TextEdit>) -> EngineResult<CommitResponse<TextEdit>> {
        let response = self
            .server
            .handle_commit(request.clone())
            .map_err(Self::map_err)?;
        let remaining = self.drop_responses.load(Ordering::SeqCst);
        if remaining > 0 {
            self.drop_responses.store(remaining - 1, Ordering::SeqCst);
            return Err(EngineError::transport_retryable("response lost"));
        }
        Ok(response)
    }

    fn stat(&self, request: &StatRequest) -> EngineResult<StatResponse<String>> {
        self.server
            .handle_stat(request.clone())
            .map_err(Self::map_err)
    }
}

type TextSession = SyncSession<TextAlgebra, Arc<Loopback>>;

fn config() -> SessionConfig {
    SessionConfig::default().with_retry(RetryConfig::no_backoff())
}

fn setup() -> (Arc<CollabServer<TextAlgebra>>, DocumentId) {
    setup_with(ServerConfig::default())
}

fn setup_with(server_config: ServerConfig) -> (Arc<CollabServer<TextAlgebra>>, DocumentId) {
    let server = Arc::new(CollabServer::new(server_config, TextAlgebra));
    let transport = Arc::new(Loopback::new(Arc::clone(&server)));
    let doc = TextSession::create_document(&transport, None).unwrap();
    (server, doc)
}

fn join(server: &Arc<CollabServer<TextAlgebra>>, doc: &DocumentId) -> (TextSession, Arc<Loopback>) {
    let transport = Arc::new(Loopback::new(Arc::clone(server)));
    let session =
        TextSession::connect(config(), TextAlgebra, Arc::clone(&transport), doc.clone()).unwrap();
    (session, transport)
}

#[test]
fn two_sites_converge_on_concurrent_edits() {
    let (server, doc) = setup();
    let (s1, _) = join(&server, &doc);

    s1.commit(diff("", "Hello World")).unwrap();
    let outcome = s1.sync_now().unwrap();
    // The echo comes back in the same response page.
    assert_eq!(outcome, CycleOutcome::Completed { sent: 1, received: 1 });
    assert_eq!(s1.cursor(), 1);

    let (s2, _) = join(&server, &doc);
    assert_eq!(s2.data(), "Hello World");

    // Concurrent: s1 prepends while s2 trims the tail.
    s1.commit(vec![TextEdit::insert(0, "X")]).unwrap();
    s2.commit(vec![TextEdit::remove(10, "d")]).unwrap();

    s1.sync_now().unwrap();
    s2.sync_now().unwrap();
    s1.sync_now().unwrap();

    assert_eq!(s1.data(), "XHello Worl");
    assert_eq!(s2.data(), "XHello Worl");

    let stat = s1.stat().unwrap();
    assert_eq!(stat.document_data, "XHello Worl");
    assert_eq!(stat.ops_stored, 3);
}

#[test]
fn lost_response_is_repaired_by_resending() {
    let (server, doc) = setup();
    let (session, transport) = join(&server, &doc);

    session.commit(diff("", "abc")).unwrap();
    transport.drop_next_response(1);

    let err = session.sync_now().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(session.state(), SessionState::Backoff);

    // The retry resends the same operation; the server already has it and
    // answers with the echo as if nothing was lost.
    let outcome = session.sync_now().unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { sent: 1, received: 1 });
    assert_eq!(session.data(), "abc");
    assert_eq!(session.pending_ops(), 0);

    let stat = session.stat().unwrap();
    assert_eq!(stat.ops_received, 2);
    assert_eq!(stat.ops_stored, 1);
    assert_eq!(stat.ids_stored, 1);
}

#[test]
fn log_pages_are_windowed() {
    let (server, doc) = setup_with(ServerConfig::new().with_page_size(2));
    let (session, _) = join(&server, &doc);

    let mut text = String::new();
    for c in ["a", "b", "c", "d", "e"] {
        let next = format!("{text}{c}");
        session.commit(diff(&text, &next)).unwrap();
        text = next;
    }

    // All five go out at once, but echoes come back two per page.
    let outcome = session.sync_now().unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { sent: 5, received: 2 });
    let outcome = session.sync_now().unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { sent: 0, received: 2 });
    let outcome = session.sync_now().unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { sent: 0, received: 1 });

    assert_eq!(session.pending_ops(), 0);
    assert_eq!(session.cursor(), 5);

    // A late joiner still gets the whole document.
    let (late, _) = join(&server, &doc);
    assert_eq!(late.data(), "abcde");
    assert_eq!(late.cursor(), 5);
}

#[test]
fn undo_and_redo_propagate_to_other_sites() {
    let (server, doc) = setup();
    let (s1, _) = join(&server, &doc);

    s1.commit(diff("", "hello")).unwrap();
    s1.sync_now().unwrap();

    let (s2, _) = join(&server, &doc);
    assert_eq!(s2.data(), "hello");

    assert!(s1.undo().unwrap());
    s1.sync_now().unwrap();
    s2.sync_now().unwrap();
    assert_eq!(s1.data(), "");
    assert_eq!(s2.data(), "");

    assert!(s1.redo().unwrap());
    s1.sync_now().unwrap();
    s2.sync_now().unwrap();
    assert_eq!(s1.data(), "hello");
    assert_eq!(s2.data(), "hello");
}

#[test]
fn multi_edit_batches_converge() {
    let (server, doc) = setup();
    let (s1, _) = join(&server, &doc);

    s1.commit(diff("", "the quick fox")).unwrap();
    s1.sync_now().unwrap();

    let (s2, _) = join(&server, &doc);

    // Each side rewrites a different part of the sentence before hearing
    // about the other.
    s1.commit(diff("the quick fox", "the quick brown fox")).unwrap();
    s2.commit(diff("the quick fox", "a quick fox")).unwrap();

    s1.sync_now().unwrap();
    s2.sync_now().unwrap();
    s1.sync_now().unwrap();

    assert_eq!(s1.cursor(), s2.cursor());
    assert_eq!(s1.data(), s2.data());

    let stat = s1.stat().unwrap();
    assert_eq!(stat.document_data, s1.data());
    assert_eq!(stat.ops_rejected, 0);
}

#[test]
fn remote_edits_rebase_the_undo_stack() {
    let (server, doc) = setup();
    let (s1, _) = join(&server, &doc);

    s1.commit(diff("", "world")).unwrap();
    s1.sync_now().unwrap();

    let (s2, _) = join(&server, &doc);
    s2.commit(vec![TextEdit::insert(0, "Hello ")]).unwrap();
    s2.sync_now().unwrap();

    // s1 picks up the prepend, then undoes its own insert of "world".
    s1.sync_now().unwrap();
    assert_eq!(s1.data(), "Hello world");

    assert!(s1.undo().unwrap());
    assert_eq!(s1.data(), "Hello ");

    s1.sync_now().unwrap();
    s2.sync_now().unwrap();
    assert_eq!(s2.data(), "Hello ");
}

#[tokio::test(start_paused = true)]
async fn background_sessions_converge_without_manual_pumping() {
    let (server, doc) = setup();

    let t1 = Arc::new(Loopback::new(Arc::clone(&server)));
    let s1 = TextSession::connect(
        config().with_poll_interval(Duration::from_millis(20)),
        TextAlgebra,
        t1,
        doc.clone(),
    )
    .unwrap();
    let t2 = Arc::new(Loopback::new(Arc::clone(&server)));
    let s2 = TextSession::connect(
        config().with_poll_interval(Duration::from_millis(20)),
        TextAlgebra,
        t2,
        doc.clone(),
    )
    .unwrap();

    s1.start();
    s2.start();

    s1.commit(diff("", "ping")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(s2.data(), "ping");

    s2.commit(vec![TextEdit::insert(4, "!")]).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(s1.data(), "ping!");
    assert_eq!(s2.data(), "ping!");

    s1.stop();
    s2.stop();
    assert!(!s1.state().is_running());
}
