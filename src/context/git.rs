//
//  git-providers
//  context/git.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Local Checkout
//!
//! Reads the remote URL, branch and head commit of the git repository the
//! `gp` binary runs in, so commands can default to "this repository".
//!
//! Only read access through `git2`; clone, fetch and push are out of scope.
//!
//! ```rust,no_run
//! use git_providers::context::GitContext;
//!
//! if let Ok(git) = GitContext::open() {
//!     if let Some(url) = git.origin_url()? {
//!         println!("origin: {url}");
//!     }
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use git2::Repository;

/// Read-only handle on a local git repository.
pub struct GitContext {
    repo: Repository,
}

impl GitContext {
    /// Discovers the repository containing the current directory.
    pub fn open() -> Result<Self> {
        Self::open_at(Path::new("."))
    }

    /// Discovers the repository containing `path`, walking up parent directories.
    pub fn open_at(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("not a git repository: {}", path.display()))?;
        Ok(Self { repo })
    }

    /// URL of the remote called `name`, if configured.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// URL of `origin`.
    pub fn origin_url(&self) -> Result<Option<String>> {
        self.remote_url("origin")
    }

    /// Short name of the checked-out branch; `None` on a detached or unborn HEAD.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    /// Commit id HEAD points at.
    pub fn head_sha(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        head.target().map(|oid| oid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_origin_remote() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://github.com/daytonaio/daytona.git")
            .unwrap();

        let git = GitContext::open_at(dir.path()).unwrap();
        assert_eq!(
            git.origin_url().unwrap().as_deref(),
            Some("https://github.com/daytonaio/daytona.git")
        );
        assert_eq!(git.remote_url("upstream").unwrap(), None);
        // unborn HEAD
        assert!(git.head_sha().is_none());
    }

    #[test]
    fn test_open_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nothing");
        std::fs::create_dir(&nested).unwrap();
        // tempdir may itself live inside a repository on some machines
        if Repository::discover(&nested).is_err() {
            assert!(GitContext::open_at(&nested).is_err());
        }
    }
}
