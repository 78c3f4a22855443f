//! Job scheduler for git-sync
//!
//! An explicitly constructed [`Scheduler`] owns the shared error channel for
//! one application run. Targets register a one-shot acquisition job and then
//! a recurring pull job; the first unrecovered error (or the
//! [`Error::Finished`] sentinel) ends the run.

pub mod error;
pub mod scheduler;

pub use error::{Error, JobError, JobResult};
pub use scheduler::{ErrorPolicy, Scheduler};
