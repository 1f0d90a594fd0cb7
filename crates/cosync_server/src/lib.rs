//! # cosync server
//!
//! Authoritative document server for cosync.
//!
//! This crate provides:
//! - The document log: total ordering, transform-on-merge, duplicate drop
//! - Windowed log delivery (commit responses page from the sender's cursor)
//! - Document creation and join handshakes
//! - Per-document counters behind a stat endpoint
//!
//! # Architecture
//!
//! Each document is one log of operations in the order the server accepted
//! them. An arriving operation is transformed through every logged entry it
//! was concurrent with, then appended; the transformed form becomes part of
//! the reference every later arrival transforms against. Clients replay the
//! identical computation from the operation stream, so a value never needs
//! to travel back down.
//!
//! Transport is out of scope: the handlers are plain functions over the
//! request/response types in `cosync_protocol`, ready to sit behind any
//! HTTP framework or an in-process loopback (which is how the engine tests
//! drive them).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod document;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use document::{ApplyOutcome, DocumentLog, DocumentState, DocumentStats};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::CollabServer;
pub use store::{DocumentStore, MemoryStore};
