//
//  git-providers
//  context/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Repository Context Module
//!
//! The canonical, vendor-independent description of "which repository, which
//! ref, commit, path or pull request". Every provider adapter parses URLs and
//! API payloads into these types and every consumer reads them.
//!
//! ## Overview
//!
//! - [`StaticGitContext`]: the canonical context parsed from a URL
//! - [`GitRepository`]: a fully resolved repository (branch and head commit known)
//! - [`RepositoryContextRequest`]: input of `get_repository_context` and URL building
//! - [`GitNamespace`], [`GitBranch`], [`GitPullRequest`], [`GitUser`]: listing projections
//! - [`GitEventData`]: a normalized push event
//! - [`resolver`]: the shared URL grammar
//! - [`GitContext`]: reads the local checkout's remote
//!
//! ## Branch and commit
//!
//! `branch` and `sha` are independent optional fields. A URL that points at a
//! commit view cannot tell whether the ref is a branch or a commit, so the parser
//! sets **both** fields to the same value. [`StaticGitContext::is_commit_ref`]
//! detects that encoding.
//!
//! ## Example
//!
//! ```rust
//! use git_providers::context::{parse_static_git_context, StaticGitContext};
//!
//! let ssh = parse_static_git_context("git@github.com:daytonaio/daytona.git").unwrap();
//! let https = parse_static_git_context("https://github.com/daytonaio/daytona").unwrap();
//! assert_eq!(ssh.url, https.url);
//! assert_eq!(https.url, "https://github.com/daytonaio/daytona.git");
//! ```

mod git;
pub mod resolver;

pub use git::*;
pub use resolver::{clone_url, parse_static_git_context};

use serde::{Deserialize, Serialize};

/// Reserved namespace id for the authenticated user's own namespace.
///
/// Several vendors list organizations and the personal namespace through
/// different endpoints; listings prepend a namespace with this id.
pub const PERSONAL_NAMESPACE_ID: &str = "<PERSONAL>";

/// Largest page any listing operation requests.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Canonical description of a repository location parsed from a URL.
///
/// Immutable once built; adapters return fresh values.
///
/// # Fields
///
/// * `id` - Provider-specific repository identifier. May differ from `name`
///   (GitLab full path, Azure DevOps UUID, Bitbucket Server project key)
/// * `name` - Human-readable repository name
/// * `owner` - Namespace owning the repository; may contain `/` (GitLab subgroups)
/// * `url` - Canonical clone URL, the join key between consumers
/// * `source` - Hostname of the provider instance
/// * `branch` / `sha` - Ref and commit; both set to the same value for commit views
/// * `path` - File or directory scoped to `branch`
/// * `pr_number` - Pull or merge request number
///
/// At most one selector is active: a pull request, a path, or a plain
/// branch/commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticGitContext {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u32>,
}

impl StaticGitContext {
    /// Builds a context from raw URL components.
    ///
    /// `id` defaults to `name` and `url` is rebuilt with [`clone_url`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use git_providers::context::StaticGitContext;
    ///
    /// let ctx = StaticGitContext::from_parts("gitlab.com", "org/sub", "repo", true);
    /// assert_eq!(ctx.url, "https://gitlab.com/org/sub/repo.git");
    /// assert_eq!(ctx.id, "repo");
    /// ```
    pub fn from_parts(source: &str, owner: &str, name: &str, https: bool) -> Self {
        Self {
            id: name.to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            url: clone_url(source, owner, name, https),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Builds a context from a repository returned by a vendor API.
    ///
    /// Empty branch or sha values are treated as absent.
    pub fn from_repository(repo: &GitRepository) -> Self {
        Self {
            id: repo.id.clone(),
            name: repo.name.clone(),
            owner: repo.owner.clone(),
            url: repo.url.clone(),
            source: repo.source.clone(),
            branch: non_empty(&repo.branch),
            sha: non_empty(&repo.sha),
            path: repo.path.clone(),
            pr_number: repo.pr_number,
        }
    }

    /// Sets both `branch` and `sha` to `reference`: the commit-view encoding.
    pub fn with_commit(mut self, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        self.branch = Some(reference.clone());
        self.sha = Some(reference);
        self
    }

    /// Returns `true` when the context points at a commit (branch == sha).
    pub fn is_commit_ref(&self) -> bool {
        matches!((&self.branch, &self.sha), (Some(b), Some(s)) if b == s)
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A repository with its branch and head commit resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepository {
    pub id: String,
    pub url: String,
    pub name: String,
    pub branch: String,
    pub sha: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u32>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl GitRepository {
    /// Projects a context into a repository, leaving unknown fields empty.
    pub fn from_context(ctx: &StaticGitContext) -> Self {
        Self {
            id: ctx.id.clone(),
            url: ctx.url.clone(),
            name: ctx.name.clone(),
            branch: ctx.branch.clone().unwrap_or_default(),
            sha: ctx.sha.clone().unwrap_or_default(),
            owner: ctx.owner.clone(),
            pr_number: ctx.pr_number,
            source: ctx.source.clone(),
            path: ctx.path.clone(),
        }
    }
}

/// Input of `get_repository_context` and of URL building.
///
/// Only `url` is required; every other field overrides what the URL encodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryContextRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub pr_number: Option<u32>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RepositoryContextRequest {
    /// A request carrying only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Copies every field of a parsed context into a request.
    pub fn from_context(ctx: &StaticGitContext) -> Self {
        Self {
            id: Some(ctx.id.clone()),
            name: Some(ctx.name.clone()),
            url: ctx.url.clone(),
            branch: ctx.branch.clone(),
            sha: ctx.sha.clone(),
            owner: Some(ctx.owner.clone()),
            path: ctx.path.clone(),
            pr_number: ctx.pr_number,
            source: Some(ctx.source.clone()),
        }
    }

    /// Repository name, falling back to `fallback` when unset.
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }
}

/// Vendor grouping above a repository (organization, group, project, workspace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitNamespace {
    pub id: String,
    pub name: String,
}

impl GitNamespace {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The synthetic personal namespace for `username`.
    pub fn personal(username: impl Into<String>) -> Self {
        Self::new(PERSONAL_NAMESPACE_ID, username)
    }

    pub fn is_personal(&self) -> bool {
        self.id == PERSONAL_NAMESPACE_ID
    }
}

/// Returns `true` if `namespace_id` is the personal namespace sentinel (or empty).
pub fn is_personal_namespace(namespace_id: &str) -> bool {
    namespace_id.is_empty() || namespace_id == PERSONAL_NAMESPACE_ID
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitBranch {
    pub name: String,
    pub sha: String,
}

/// An open pull/merge request and the repository its changes come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPullRequest {
    pub name: String,
    pub branch: String,
    pub sha: String,
    pub source_repo_id: String,
    pub source_repo_url: String,
    pub source_repo_owner: String,
    pub source_repo_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: String,
}

/// A push event reduced to what a prebuild trigger needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitEventData {
    pub url: String,
    pub branch: String,
    pub sha: String,
    pub owner: String,
    pub affected_files: Vec<String>,
}

/// Page selection for listing operations.
///
/// `per_page` is clamped to [`MAX_PAGE_SIZE`] and `page` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: MAX_PAGE_SIZE,
        }
    }
}

impl ListOptions {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page.clamp(1, MAX_PAGE_SIZE)
    }

    /// Zero-based offset of the first item (offset-paginated APIs).
    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.per_page()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
