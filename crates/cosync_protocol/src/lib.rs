//! # cosync protocol
//!
//! Protocol types and the operation-algebra contract for cosync.
//!
//! This crate provides:
//! - `Operation` and the id newtypes used on the wire
//! - The `Algebra` trait: the pluggable transform/invert/apply strategy
//! - Sequence helpers generalizing single-edit transforms to batches
//! - Causal-context replay shared by sites and the document log
//! - Request/response messages for the commit/poll protocol
//! - `TextAlgebra`, a reference algebra over plain strings
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod algebra;
mod context;
mod messages;
mod operation;
mod text;

pub use algebra::{
    apply_all, invert_all, transform_against, transform_seqs, Algebra, AlgebraError,
    AlgebraResult, Side,
};
pub use context::{effective_edits, LogEntry};
pub use messages::{
    CommitRequest, CommitResponse, CreateRequest, CreateResponse, DocumentSnapshot, JoinResponse,
    StatRequest, StatResponse,
};
pub use operation::{DocumentId, OpId, Operation, SiteId};
pub use text::{diff, TextAlgebra, TextEdit};
