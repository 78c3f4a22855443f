//! Shared git2 helper functions for the sync engine
//!
//! These functions encapsulate the working-tree manipulations used by both
//! the clone path and the pull path.

use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Repository, ResetType, SubmoduleUpdateOptions};

use crate::options::TransferOptions;

/// Force the working tree and index back to the HEAD commit.
///
/// Uncommitted modifications to tracked files are discarded. Untracked files
/// are left alone.
pub fn hard_reset(repo: &Repository) -> Result<(), git2::Error> {
    let head = repo.head()?.peel_to_commit()?;
    repo.reset(head.as_object(), ResetType::Hard, None)
}

/// Check out `commit` and point HEAD directly at it.
pub fn checkout_detached(repo: &Repository, commit: &Commit<'_>) -> Result<(), git2::Error> {
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(commit.id())
}

/// Move a local branch to `target` and update the working tree.
///
/// The branch is created when it does not exist yet.
pub fn fast_forward(repo: &Repository, branch: &str, target: Oid) -> Result<(), git2::Error> {
    let refname = format!("refs/heads/{branch}");
    let message = format!("pull: fast-forward to {target}");

    match repo.find_reference(&refname) {
        Ok(mut reference) => {
            reference.set_target(target, &message)?;
        }
        Err(_) => {
            repo.reference(&refname, target, true, &message)?;
        }
    }

    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))
}

/// Initialise and update every submodule, recursively.
pub fn update_submodules(repo: &Repository, options: &TransferOptions) -> Result<(), git2::Error> {
    for mut submodule in repo.submodules()? {
        let mut update = SubmoduleUpdateOptions::new();
        update.fetch(options.fetch_options());
        submodule.update(true, Some(&mut update))?;

        tracing::debug!(
            name = %options.name,
            submodule = %submodule.path().display(),
            "submodule updated"
        );

        let nested = submodule.open()?;
        update_submodules(&nested, options)?;
    }
    Ok(())
}

/// Remove everything inside `path`, keeping the directory itself.
pub fn clear_directory(path: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
