//! Document storage.
//!
//! The handler reaches documents through the [`DocumentStore`] trait so a
//! deployment can back the server with something durable. The in-memory
//! store is what the tests and the reference server use.

use crate::document::DocumentState;
use cosync_protocol::{Algebra, DocumentId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Store of live documents, keyed by id.
///
/// Each document is handed out behind its own lock so commits against
/// different documents never contend.
pub trait DocumentStore<A: Algebra>: Send + Sync {
    /// Looks up a document.
    fn get(&self, id: &DocumentId) -> Option<Arc<Mutex<DocumentState<A>>>>;

    /// Registers a fresh document.
    fn insert(&self, id: DocumentId, state: DocumentState<A>);

    /// Number of documents held.
    fn len(&self) -> usize;

    /// Whether the store holds no documents.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`DocumentStore`].
pub struct MemoryStore<A: Algebra> {
    documents: RwLock<HashMap<DocumentId, Arc<Mutex<DocumentState<A>>>>>,
}

impl<A: Algebra> MemoryStore<A> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }
}

impl<A: Algebra> Default for MemoryStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Algebra> DocumentStore<A> for MemoryStore<A> {
    fn get(&self, id: &DocumentId) -> Option<Arc<Mutex<DocumentState<A>>>> {
        self.documents.read().get(id).cloned()
    }

    fn insert(&self, id: DocumentId, state: DocumentState<A>) {
        self.documents
            .write()
            .insert(id, Arc::new(Mutex::new(state)));
    }

    fn len(&self) -> usize {
        self.documents.read().len()
    }
}
