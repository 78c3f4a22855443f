//! Repository synchronization engine for git-sync
//!
//! Keeps a local working copy in step with a remote reference:
//!
//! - [`SyncEngine`] runs the clone-or-attach and pull state machine
//! - [`Transport`] is the in-process libgit2 backend
//! - [`FallbackTransport`] runs `git clone` when the library clone fails
//! - [`SyncMetrics`] counts transfers for the metrics endpoint

pub mod engine;
pub mod error;
pub mod fallback;
pub mod helpers;
pub mod metrics;
pub mod options;
pub mod state;
pub mod transport;

pub use engine::{PullOutcome, SyncEngine};
pub use error::{Error, ErrorKind, Result};
pub use fallback::{FallbackError, FallbackTransport, GitCommand, clone_args};
pub use metrics::{MetricsSnapshot, SyncMetrics};
pub use options::TransferOptions;
pub use state::{HeadRef, PathLiveness, Phase, SyncState, TransferMode};
pub use transport::{Git2Transport, Transport, TransportError, clone_from};
