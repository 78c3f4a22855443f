//! Upstream repository fixtures.
//!
//! Every fixture lives in its own temporary directory and is removed when
//! dropped. Panics on any failure; these are test helpers.

use std::fs;
use std::path::Path;

use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// Creates a `.git` directory that is not a real repository.
///
/// Use for: path classification tests that only look for the marker.
///
/// # Panics
/// Panics if the filesystem operations fail.
pub fn fake_git_dir(path: &Path) {
    fs::create_dir_all(path.join(".git/refs/heads"))
        .unwrap_or_else(|e| panic!("fake_git_dir: failed to create .git: {e}"));
    fs::write(path.join(".git/HEAD"), "ref: refs/heads/main\n")
        .unwrap_or_else(|e| panic!("fake_git_dir: failed to write HEAD: {e}"));
}

/// A non-bare repository on branch `main` with one commit (`README.md`).
///
/// Engines clone from [`Upstream::path`]; tests then move the upstream with
/// [`Upstream::commit_file`], [`Upstream::branch`], [`Upstream::tag`] and
/// [`Upstream::add_submodule`].
pub struct Upstream {
    dir: TempDir,
    repo: Repository,
}

impl Upstream {
    /// # Panics
    /// Panics if the repository cannot be created.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("Upstream: tempdir failed: {e}"));
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts)
            .unwrap_or_else(|e| panic!("Upstream: init failed: {e}"));

        let upstream = Self { dir, repo };
        upstream.commit_file("README.md", "# Upstream\n", "Initial commit");
        upstream
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path as a string, usable as a clone source.
    pub fn location(&self) -> String {
        self.dir.path().display().to_string()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Write `name` and commit it on the current branch.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> Oid {
        let file = self.dir.path().join(name);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("commit_file: failed to create dirs: {e}"));
        }
        fs::write(&file, content)
            .unwrap_or_else(|e| panic!("commit_file: failed to write {name}: {e}"));

        let mut index = self.repo.index().unwrap_or_else(|e| panic!("commit_file: {e}"));
        index
            .add_path(Path::new(name))
            .unwrap_or_else(|e| panic!("commit_file: failed to stage {name}: {e}"));
        index.write().unwrap_or_else(|e| panic!("commit_file: {e}"));
        self.commit_index(message)
    }

    /// Register `url` as a submodule at `path` and commit it.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn add_submodule(&self, url: &str, path: &str) -> Oid {
        let mut submodule = self
            .repo
            .submodule(url, Path::new(path), true)
            .unwrap_or_else(|e| panic!("add_submodule: failed to add {path}: {e}"));
        submodule
            .clone(None)
            .unwrap_or_else(|e| panic!("add_submodule: failed to clone {url}: {e}"));
        submodule
            .add_finalize()
            .unwrap_or_else(|e| panic!("add_submodule: {e}"));

        let mut index = self.repo.index().unwrap_or_else(|e| panic!("add_submodule: {e}"));
        index.write().unwrap_or_else(|e| panic!("add_submodule: {e}"));
        self.commit_index(&format!("Add submodule {path}"))
    }

    /// Commit whatever is staged on the current branch.
    fn commit_index(&self, message: &str) -> Oid {
        let mut index = self.repo.index().unwrap_or_else(|e| panic!("commit: {e}"));
        let tree_id = index.write_tree().unwrap_or_else(|e| panic!("commit: {e}"));
        let tree = self
            .repo
            .find_tree(tree_id)
            .unwrap_or_else(|e| panic!("commit: {e}"));

        let sig = signature();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap_or_else(|e| panic!("commit: commit failed: {e}"))
    }

    /// Create `name` at the current commit and switch to it.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn branch(&self, name: &str) {
        let head = self.head_commit();
        let commit = self
            .repo
            .find_commit(head)
            .unwrap_or_else(|e| panic!("branch: {e}"));
        self.repo
            .branch(name, &commit, false)
            .unwrap_or_else(|e| panic!("branch: failed to create {name}: {e}"));
        self.checkout(name);
    }

    /// Switch HEAD to an existing branch.
    ///
    /// # Panics
    /// Panics if the branch does not exist.
    pub fn checkout(&self, name: &str) {
        self.repo
            .set_head(&format!("refs/heads/{name}"))
            .unwrap_or_else(|e| panic!("checkout: failed to switch to {name}: {e}"));
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
            .unwrap_or_else(|e| panic!("checkout: {e}"));
    }

    /// Annotated tag at the current commit. Returns the tagged commit.
    ///
    /// # Panics
    /// Panics if any git operation fails.
    pub fn tag(&self, name: &str) -> Oid {
        let head = self.head_commit();
        let object = self
            .repo
            .find_object(head, None)
            .unwrap_or_else(|e| panic!("tag: {e}"));
        self.repo
            .tag(name, &object, &signature(), name, true)
            .unwrap_or_else(|e| panic!("tag: failed to create {name}: {e}"));
        head
    }

    /// Commit HEAD currently points at.
    ///
    /// # Panics
    /// Panics if HEAD is unborn.
    pub fn head_commit(&self) -> Oid {
        self.repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map(|commit| commit.id())
            .unwrap_or_else(|e| panic!("head_commit: {e}"))
    }
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new()
    }
}

fn signature() -> Signature<'static> {
    Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("signature: {e}"))
}
