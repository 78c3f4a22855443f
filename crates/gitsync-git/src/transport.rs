//! In-process transfer backend built on libgit2.

use std::path::PathBuf;

use git2::build::RepoBuilder;
use git2::{ErrorCode, Repository};
use gitsync_config::Reference;

use crate::helpers;
use crate::options::{TransferOptions, tag_refspec};

/// Outcome of a library clone that did not produce a repository.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The path already holds a repository or other content.
    #[error("repository already exists at {path}")]
    AlreadyExists { path: PathBuf },

    /// Any other clone failure; triggers the fallback transfer.
    #[error(transparent)]
    Failed(#[from] git2::Error),
}

/// In-process version-control client.
pub trait Transport: Send + Sync {
    /// Clone `options.url` into `options.path`.
    fn clone_repository(&self, options: &TransferOptions) -> Result<Repository, TransportError>;

    /// Fetch `refspecs` from the configured remote of an open repository.
    fn fetch(
        &self,
        repo: &Repository,
        refspecs: &[String],
        options: &TransferOptions,
    ) -> Result<(), git2::Error> {
        let mut remote = repo.find_remote(&options.remote_name)?;
        let mut fetch_options = options.fetch_options();
        remote.fetch(refspecs, Some(&mut fetch_options), None)
    }
}

/// Default transport: libgit2 talking to the configured URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Transport;

impl Transport for Git2Transport {
    fn clone_repository(&self, options: &TransferOptions) -> Result<Repository, TransportError> {
        clone_from(&options.url, options)
    }
}

/// Clone `source` into `options.path` honouring reference, remote name,
/// single-branch, depth, auth and submodule settings.
///
/// `source` is normally the target URL; any location libgit2 accepts works.
pub fn clone_from(source: &str, options: &TransferOptions) -> Result<Repository, TransportError> {
    if options.path.join(".git").exists() {
        return Err(TransportError::AlreadyExists {
            path: options.path.clone(),
        });
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(options.fetch_options());

    if let Reference::Branch(branch) = &options.reference {
        builder.branch(branch);
    }

    let remote_name = options.remote_name.clone();
    let refspec = options.clone_refspec();
    builder.remote_create(move |repo, _name, url| match &refspec {
        Some(refspec) => repo.remote_with_fetch(&remote_name, url, refspec),
        None => repo.remote(&remote_name, url),
    });

    let repo = builder
        .clone(source, &options.path)
        .map_err(|e| match e.code() {
            ErrorCode::Exists => TransportError::AlreadyExists {
                path: options.path.clone(),
            },
            _ => TransportError::Failed(e),
        })?;

    if let Err(err) = finish_clone(&repo, options) {
        drop(repo);
        // Leave an empty directory behind so the fallback can clone into it.
        if let Err(cleanup) = helpers::clear_directory(&options.path) {
            tracing::warn!(
                name = %options.name,
                path = %options.path.display(),
                error = %cleanup,
                "unable to remove partial clone"
            );
        }
        return Err(TransportError::Failed(err));
    }

    Ok(repo)
}

/// Steps that run after libgit2 has written the repository.
fn finish_clone(repo: &Repository, options: &TransferOptions) -> Result<(), git2::Error> {
    if let Reference::Tag(tag) = &options.reference {
        checkout_tag(repo, tag, options)?;
    }
    if options.submodules {
        helpers::update_submodules(repo, options)?;
    }
    Ok(())
}

/// Detach HEAD at the commit a tag points to, fetching the tag if the clone
/// did not bring it along.
fn checkout_tag(repo: &Repository, tag: &str, options: &TransferOptions) -> Result<(), git2::Error> {
    let refname = format!("refs/tags/{tag}");
    if repo.find_reference(&refname).is_err() {
        let mut remote = repo.find_remote(&options.remote_name)?;
        let mut fetch_options = options.fetch_options();
        remote.fetch(&[tag_refspec(tag)], Some(&mut fetch_options), None)?;
    }

    let commit = repo.find_reference(&refname)?.peel_to_commit()?;
    helpers::checkout_detached(repo, &commit)
}
