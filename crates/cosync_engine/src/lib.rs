//! # cosync engine
//!
//! Client-side state machine and sync session for cosync.
//!
//! This crate provides:
//! - The site state machine: local commits, undo/redo, remote integration
//! - Bridging of pending operations past concurrent remote edits
//! - A polling sync session with single-flight exchanges and backoff
//! - HTTP transport abstraction and a scripted mock for tests
//!
//! ## Architecture
//!
//! Every edit is optimistic: a commit applies locally at once and queues an
//! operation stamped with the site's log cursor. Sync cycles send queued
//! operations and poll one page of the server log in the same request. The
//! site replays each received operation through its causal window, so client
//! and server always agree on the effective form without values ever being
//! shipped back.
//!
//! ## Key Invariants
//!
//! - The server log order is the only order; sites converge to it
//! - Operations are idempotent on the server (duplicate ids are dropped),
//!   so a lost response is repaired by resending
//! - At most one exchange is in flight per session
//! - Own operations come back as echoes and acknowledge the pending queue
//!   in FIFO order

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod http;
mod session;
mod site;
mod transport;

pub use config::{RetryConfig, SessionConfig};
pub use error::{EngineError, EngineResult};
pub use http::{HttpClient, HttpTransport};
pub use session::{CycleOutcome, SessionState, SessionStats, SyncSession};
pub use site::Site;
pub use transport::{CommitTransport, MockTransport};
