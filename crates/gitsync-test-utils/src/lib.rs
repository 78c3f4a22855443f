//! Shared test utilities for the git-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`git`]: upstream repositories to sync from, built with `git2`

pub mod git;

pub use git::{Upstream, fake_git_dir};
