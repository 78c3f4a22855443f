//! Per-target synchronization state.

use std::fmt;
use std::path::Path;

use git2::{Oid, Repository};

use crate::ErrorKind;

/// Lifecycle of a target inside its engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Acquiring,
    Attached,
    Syncing,
    /// Last invocation failed. The engine keeps any open handle, so a later
    /// pull may still succeed.
    Failed(ErrorKind),
}

/// What the target path held when it was last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLiveness {
    /// Missing or empty directory.
    Absent,
    /// A repository that matches the target.
    PresentMatching,
    /// Content that is not (or not known to be) the configured repository.
    PresentForeign,
}

impl PathLiveness {
    /// Classify a path before acquisition.
    ///
    /// A path holding a `.git` directory counts as matching until attach
    /// verification says otherwise.
    pub fn observe(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(PathLiveness::Absent);
        }
        if path.join(".git").exists() {
            return Ok(PathLiveness::PresentMatching);
        }
        if path.is_dir() && std::fs::read_dir(path)?.next().is_none() {
            return Ok(PathLiveness::Absent);
        }
        Ok(PathLiveness::PresentForeign)
    }
}

/// Which backend produced the local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// In-process libgit2 transfer.
    Library,
    /// `git` executable run as a subprocess.
    ExternalProcess,
    /// No transfer; an existing repository was reattached.
    Reattached,
}

/// Where HEAD of a local repository points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadRef {
    /// Symbolic HEAD, e.g. `refs/heads/main`.
    Branch(String),
    /// HEAD pointing directly at a commit.
    Detached(Oid),
}

impl HeadRef {
    /// Read HEAD without requiring the branch to be born.
    pub fn read(repo: &Repository) -> Result<Self, git2::Error> {
        let head = repo.find_reference("HEAD")?;
        if let Some(name) = head.symbolic_target() {
            return Ok(HeadRef::Branch(name.to_string()));
        }
        head.target()
            .map(HeadRef::Detached)
            .ok_or_else(|| git2::Error::from_str("HEAD has neither a symbolic nor a direct target"))
    }

    /// Short branch name when HEAD is symbolic.
    pub fn branch(&self) -> Option<&str> {
        match self {
            HeadRef::Branch(name) => Some(name.strip_prefix("refs/heads/").unwrap_or(name)),
            HeadRef::Detached(_) => None,
        }
    }
}

impl fmt::Display for HeadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeadRef::Branch(name) => f.write_str(name),
            HeadRef::Detached(oid) => write!(f, "HEAD (detached at {oid})"),
        }
    }
}

/// Snapshot of what the engine knows about its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub phase: Phase,
    pub liveness: PathLiveness,
    pub head: Option<HeadRef>,
    pub mode: Option<TransferMode>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            liveness: PathLiveness::Absent,
            head: None,
            mode: None,
        }
    }
}
