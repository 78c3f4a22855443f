//! Per-target synchronization engine
//!
//! A [`SyncEngine`] owns one target's local path and repository handle. It
//! acquires the repository once with [`SyncEngine::clone_or_attach`] and then
//! keeps it current with [`SyncEngine::pull`]. Neither operation retries; the
//! caller's next scheduled invocation is the retry.

use std::fs;
use std::sync::Arc;

use git2::{Oid, Repository};
use gitsync_config::target::{is_supported_scheme, url_scheme};
use gitsync_config::{Reference, Target};

use crate::fallback::{FallbackTransport, GitCommand};
use crate::helpers;
use crate::metrics::SyncMetrics;
use crate::options::{TransferOptions, branch_refspec, tag_refspec};
use crate::state::{HeadRef, PathLiveness, Phase, SyncState, TransferMode};
use crate::transport::{Git2Transport, Transport, TransportError};
use crate::{Error, Result};

/// Result of a successful pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local copy already matched the remote.
    UpToDate,
    /// The working tree moved from `from` (if known) to `to`.
    Updated { from: Option<Oid>, to: Oid },
}

/// Drives one target's local path to match its remote reference.
pub struct SyncEngine {
    target: Target,
    transport: Arc<dyn Transport>,
    fallback: Arc<dyn FallbackTransport>,
    metrics: SyncMetrics,
    repo: Option<Repository>,
    state: SyncState,
}

impl SyncEngine {
    /// Engine using libgit2 first and the `git` executable as fallback.
    pub fn new(target: Target) -> Self {
        Self::with_backends(target, Arc::new(Git2Transport), Arc::new(GitCommand::default()))
    }

    pub fn with_backends(
        target: Target,
        transport: Arc<dyn Transport>,
        fallback: Arc<dyn FallbackTransport>,
    ) -> Self {
        Self {
            target,
            transport,
            fallback,
            metrics: SyncMetrics::new(),
            repo: None,
            state: SyncState::default(),
        }
    }

    /// Report into shared counters instead of private ones.
    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Open repository handle, once attached.
    pub fn repository(&self) -> Option<&Repository> {
        self.repo.as_ref()
    }

    /// Acquire the repository, or reattach to an existing local copy.
    ///
    /// On an engine that is already attached this only re-runs the
    /// reference verification against the open handle.
    pub fn clone_or_attach(&mut self) -> Result<()> {
        let result = match self.repo.take() {
            Some(repo) => {
                let mode = self.state.mode.unwrap_or(TransferMode::Reattached);
                let verified = self.verify(&repo, mode);
                self.repo = Some(repo);
                verified
            }
            None => self.acquire(),
        };

        if let Err(err) = &result {
            self.metrics.record_clone_failure(self.target.name());
            self.fail("unable to clone or attach to the git repo", err);
        }
        result
    }

    /// Bring the working tree up to date with the remote reference.
    ///
    /// Local modifications to tracked files are discarded first.
    pub fn pull(&mut self) -> Result<PullOutcome> {
        let result = match &self.repo {
            Some(repo) => {
                self.state.phase = Phase::Syncing;
                pull_repository(repo, &self.target, self.transport.as_ref())
                    .map(|outcome| (outcome, HeadRef::read(repo).ok()))
            }
            None => Err(Error::NotAttached {
                name: self.target.name().to_string(),
            }),
        };

        match result {
            Ok((outcome, head)) => {
                self.metrics
                    .record_pull(self.target.name(), outcome != PullOutcome::UpToDate);
                match outcome {
                    PullOutcome::UpToDate => tracing::debug!(
                        name = %self.target.name(),
                        url = %self.target.url(),
                        path = %self.target.path().display(),
                        "repo is up to date"
                    ),
                    PullOutcome::Updated { to, .. } => tracing::info!(
                        name = %self.target.name(),
                        url = %self.target.url(),
                        path = %self.target.path().display(),
                        commit = %to,
                        "repo updated"
                    ),
                }
                if head.is_some() {
                    self.state.head = head;
                }
                self.state.phase = Phase::Attached;
                Ok(outcome)
            }
            Err(err) => {
                self.metrics.record_pull_failure(self.target.name());
                self.fail("unable to pull the git repo", &err);
                Err(err)
            }
        }
    }

    fn acquire(&mut self) -> Result<()> {
        self.state.phase = Phase::Acquiring;

        check_url(self.target.url())?;
        if self.target.path().as_os_str().is_empty() {
            return Err(Error::EmptyPath);
        }
        self.prepare_path()?;

        let options = TransferOptions::from_target(&self.target)?;
        tracing::debug!(
            name = %self.target.name(),
            url = %self.target.url(),
            path = %self.target.path().display(),
            auth = self.target.auth().map(|a| a.mode()).unwrap_or("none"),
            "cloning repo"
        );

        match self.transport.clone_repository(&options) {
            Ok(repo) => {
                self.metrics.record_clone(self.target.name());
                self.attach(repo, TransferMode::Library)
            }
            Err(TransportError::AlreadyExists { .. }) => {
                tracing::debug!(
                    name = %self.target.name(),
                    path = %self.target.path().display(),
                    "repo already exists, attaching"
                );
                let repo = match self.open() {
                    Ok(repo) => repo,
                    Err(err) => {
                        self.state.liveness = PathLiveness::PresentForeign;
                        return Err(err);
                    }
                };
                self.attach(repo, TransferMode::Reattached)
            }
            Err(TransportError::Failed(err)) => {
                tracing::warn!(
                    name = %self.target.name(),
                    url = %self.target.url(),
                    path = %self.target.path().display(),
                    error = %err,
                    "unable to clone repo in-process, running git clone"
                );
                self.fallback
                    .clone_repository(&self.target, options.auth.as_ref())
                    .map_err(|e| Error::CloneFailed {
                        url: self.target.url().to_string(),
                        path: self.target.path().to_path_buf(),
                        message: e.to_string(),
                    })?;
                self.metrics.record_fallback_clone(self.target.name());

                let repo = self.open()?;
                self.attach(repo, TransferMode::ExternalProcess)
            }
        }
    }

    /// Create the target directory, wiping it first when `force` is set.
    fn prepare_path(&mut self) -> Result<()> {
        let path = self.target.path();

        if path.exists() && self.target.force() {
            tracing::warn!(
                name = %self.target.name(),
                path = %path.display(),
                "force is set, removing existing content"
            );
            let removed = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(|e| Error::io(path, e))?;
        }
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| Error::io(path, e))?;
        }

        self.state.liveness = PathLiveness::observe(path).map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(self.target.path()).map_err(|source| Error::AttachFailed {
            path: self.target.path().to_path_buf(),
            source,
        })
    }

    /// Keep the handle if its HEAD matches the configured reference.
    fn attach(&mut self, repo: Repository, mode: TransferMode) -> Result<()> {
        self.verify(&repo, mode)?;
        self.repo = Some(repo);
        Ok(())
    }

    fn verify(&mut self, repo: &Repository, mode: TransferMode) -> Result<()> {
        let head = HeadRef::read(repo).map_err(|source| Error::AttachFailed {
            path: self.target.path().to_path_buf(),
            source,
        })?;

        if let Err(err) = verify_reference(repo, self.target.reference(), &head) {
            self.state.liveness = PathLiveness::PresentForeign;
            self.state.head = Some(head);
            return Err(err);
        }

        if mode == TransferMode::Reattached {
            self.metrics.record_attach(self.target.name());
        }

        tracing::info!(
            name = %self.target.name(),
            url = %self.target.url(),
            path = %self.target.path().display(),
            local_ref = %head,
            mode = ?mode,
            "repo attached"
        );

        self.state = SyncState {
            phase: Phase::Attached,
            liveness: PathLiveness::PresentMatching,
            head: Some(head),
            mode: Some(mode),
        };
        Ok(())
    }

    fn fail(&mut self, message: &str, err: &Error) {
        let kind = err.kind();
        let local_ref = self.state.head.as_ref().map(|h| h.to_string()).unwrap_or_default();
        tracing::error!(
            name = %self.target.name(),
            url = %self.target.url(),
            path = %self.target.path().display(),
            target_ref = %self.target.reference(),
            local_ref = %local_ref,
            kind = %kind,
            error = %err,
            "{}",
            message
        );
        self.state.phase = Phase::Failed(kind);
    }
}

/// Only `http` and `https` remotes can be synchronized.
pub(crate) fn check_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::EmptyUrl);
    }
    let scheme = url_scheme(url).ok_or_else(|| Error::InvalidUrl {
        url: url.to_string(),
    })?;
    if !is_supported_scheme(&scheme) {
        return Err(Error::UnsupportedUrlScheme { scheme });
    }
    Ok(())
}

/// A configured branch must be the symbolic HEAD; a configured tag must
/// peel to the detached HEAD commit.
fn verify_reference(repo: &Repository, reference: &Reference, head: &HeadRef) -> Result<()> {
    if !reference.is_pullable() {
        return Ok(());
    }

    let matches = match (reference, head) {
        (Reference::Branch(branch), HeadRef::Branch(name)) => {
            name.strip_prefix("refs/heads/") == Some(branch.as_str())
        }
        (Reference::Tag(tag), HeadRef::Detached(oid)) => tag_commit(repo, tag) == Some(*oid),
        _ => false,
    };

    if matches {
        Ok(())
    } else {
        Err(Error::ReferenceMismatch {
            local: head.to_string(),
            target: reference.to_string(),
        })
    }
}

fn tag_commit(repo: &Repository, tag: &str) -> Option<Oid> {
    repo.find_reference(&format!("refs/tags/{tag}"))
        .and_then(|r| r.peel_to_commit())
        .map(|c| c.id())
        .ok()
}

fn pull_repository(
    repo: &Repository,
    target: &Target,
    transport: &dyn Transport,
) -> Result<PullOutcome> {
    helpers::hard_reset(repo)?;
    let options = TransferOptions::from_target(target)?;

    let outcome = match target.reference() {
        Reference::Tag(tag) if target.reference().is_pullable() => {
            pull_tag(repo, tag, &options, transport)?
        }
        Reference::Branch(branch) if target.reference().is_pullable() => {
            pull_branch(repo, branch, &options, transport)?
        }
        _ => {
            let head = HeadRef::read(repo)?;
            let branch = head.branch().ok_or_else(|| Error::PullFailed {
                message: "HEAD is detached and no reference is configured".to_string(),
            })?;
            pull_branch(repo, branch, &options, transport)?
        }
    };

    if target.submodules() && outcome != PullOutcome::UpToDate {
        helpers::update_submodules(repo, &options)?;
    }
    Ok(outcome)
}

fn pull_branch(
    repo: &Repository,
    branch: &str,
    options: &TransferOptions,
    transport: &dyn Transport,
) -> Result<PullOutcome> {
    transport.fetch(repo, &[branch_refspec(&options.remote_name, branch)], options)?;

    let remote = repo.refname_to_id(&format!("refs/remotes/{}/{}", options.remote_name, branch))?;
    let local = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .ok()
        .and_then(|r| r.target());

    match local {
        Some(local) if local == remote => return Ok(PullOutcome::UpToDate),
        // Truncated history cannot prove ancestry; shallow mirrors follow the remote.
        Some(local) if options.depth == 0 && !repo.graph_descendant_of(remote, local)? => {
            return Err(Error::NonFastForward {
                reference: format!("refs/heads/{branch}"),
                local: local.to_string(),
                remote: remote.to_string(),
            });
        }
        _ => {}
    }

    helpers::fast_forward(repo, branch, remote)?;
    Ok(PullOutcome::Updated {
        from: local,
        to: remote,
    })
}

fn pull_tag(
    repo: &Repository,
    tag: &str,
    options: &TransferOptions,
    transport: &dyn Transport,
) -> Result<PullOutcome> {
    transport.fetch(repo, &[tag_refspec(tag)], options)?;

    let commit = repo.find_reference(&format!("refs/tags/{tag}"))?.peel_to_commit()?;
    let current = repo.head()?.target();
    if current == Some(commit.id()) {
        return Ok(PullOutcome::UpToDate);
    }

    helpers::checkout_detached(repo, &commit)?;
    Ok(PullOutcome::Updated {
        from: current,
        to: commit.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.test/repo.git")]
    #[case("HTTP://example.test/repo.git")]
    fn test_supported_urls(#[case] url: &str) {
        check_url(url).unwrap();
    }

    #[test]
    fn test_empty_url() {
        assert!(matches!(check_url(""), Err(Error::EmptyUrl)));
    }

    #[rstest]
    #[case("ssh://git@example.test/repo.git", "ssh")]
    #[case("file:///srv/repo.git", "file")]
    #[case("git://example.test/repo.git", "git")]
    fn test_unsupported_schemes(#[case] url: &str, #[case] expected: &str) {
        match check_url(url) {
            Err(Error::UnsupportedUrlScheme { scheme }) => assert_eq!(scheme, expected),
            other => panic!("expected UnsupportedUrlScheme, got {other:?}"),
        }
    }

    #[test]
    fn test_scp_style_url_is_invalid() {
        assert!(matches!(
            check_url("git@example.test:repo.git"),
            Err(Error::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_symbolic_reference_skips_verification() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let head = HeadRef::Branch("refs/heads/whatever".into());
        verify_reference(&repo, &Reference::Branch("HEAD".into()), &head).unwrap();
        verify_reference(&repo, &Reference::Default, &head).unwrap();
    }

    #[test]
    fn test_branch_mismatch() {
        let temp = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        let head = HeadRef::Branch("refs/heads/dev".into());
        let err = verify_reference(&repo, &Reference::Branch("main".into()), &head).unwrap_err();
        match err {
            Error::ReferenceMismatch { local, target } => {
                assert_eq!(local, "refs/heads/dev");
                assert_eq!(target, "refs/heads/main");
            }
            other => panic!("expected ReferenceMismatch, got {other:?}"),
        }
    }
}
