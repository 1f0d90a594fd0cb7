//! Request and response bodies exchanged between clients and the server.
//!
//! Everything here serializes as camelCase JSON. The payload types stay
//! generic over the algebra's data and edit types so the wire format follows
//! whatever algebra a deployment picks.

use crate::operation::{DocumentId, Operation, SiteId};
use serde::{Deserialize, Serialize};

/// A full copy of a document as handed to a joining site: the materialized
/// value plus the log of every integrated operation in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot<D, E> {
    /// Document identifier.
    pub id: DocumentId,
    /// Materialized document value.
    pub data: D,
    /// Every operation the server has integrated, in log order.
    pub ops: Vec<Operation<E>>,
    /// Length of the log, which is the context a fresh site starts from.
    pub context: u64,
}

/// Body of a document-creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest<D> {
    /// Starting document value; the algebra's default when absent.
    pub initial: Option<D>,
}

impl<D> Default for CreateRequest<D> {
    fn default() -> Self {
        CreateRequest { initial: None }
    }
}

/// Body of a document-creation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse<D, E> {
    /// The freshly allocated document.
    pub document: DocumentSnapshot<D, E>,
}

/// Body of a join response: the identity minted for the joining site and the
/// document it should load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse<D, E> {
    /// Identity assigned to the joining site.
    pub site_id: SiteId,
    /// Snapshot to initialize the site from.
    pub document: DocumentSnapshot<D, E>,
}

/// Body of a commit request: the site's outbound operations plus its log
/// cursor, which tells the server where this site's copy of the log ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest<E> {
    /// Target document.
    pub document_id: DocumentId,
    /// How many log entries the sender has already integrated.
    pub package_index: u64,
    /// Operations to merge, oldest first. May be empty for a pure poll.
    pub ops: Vec<Operation<E>>,
}

/// Body of a commit response: one page of the log starting at the request's
/// `package_index`, own echoes included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse<E> {
    /// Log page, oldest first.
    pub ops: Vec<Operation<E>>,
}

/// Body of a stat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRequest {
    /// Document to report on.
    pub document_id: DocumentId,
}

/// Server-side counters for one document, plus its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatResponse<D> {
    /// Commit requests handled.
    pub requests_received: u64,
    /// Commit requests that carried at least one operation.
    pub requests_with_ops: u64,
    /// Operations received across all commits, duplicates included.
    pub ops_received: u64,
    /// Operations accepted into the log.
    pub ops_stored: u64,
    /// Distinct operation ids seen.
    pub ids_stored: u64,
    /// Operations sent back out in log pages.
    pub ops_sent: u64,
    /// Operations dropped as malformed.
    pub ops_rejected: u64,
    /// Current materialized document value.
    pub document_data: D,
}
