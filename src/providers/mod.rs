//
//  git-providers
//  providers/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Git Provider Adapters
//!
//! One adapter per git hosting vendor, all behind the [`GitProvider`] trait.
//!
//! ## Overview
//!
//! | Module | Vendor | Branch-by-commit strategy |
//! |--------|--------|---------------------------|
//! | [`github`] | GitHub, GitHub Enterprise Server | compare API |
//! | [`gitlab`] | GitLab, self-managed | parent walk |
//! | [`bitbucket`] | Bitbucket Cloud | per-branch commit listing |
//! | [`bitbucket_server`] | Bitbucket Server/Data Center | per-branch commit listing |
//! | [`azure_devops`] | Azure DevOps | commits batch query |
//! | [`gitea`] | Gitea, Codeberg | parent walk |
//! | [`gogs`] | Gogs | parent walk |
//! | [`gitee`] | Gitee | per-branch commit listing |
//! | [`gitness`] | Gitness | per-branch commit listing |
//! | [`aws_codecommit`] | AWS CodeCommit | parent walk |
//!
//! The [`dispatcher`] picks the adapter for a provider id or a URL.
//!
//! ## Shared behaviour
//!
//! - URL parsing starts from [`crate::context::resolver`]; adapters reinterpret
//!   the leftover `path` with their own keywords
//! - [`GitProvider::get_repository_context`] is implemented once here
//! - Vendors that lack an API for an operation return
//!   [`ProviderError::Unsupported`]; callers treat that as "not applicable"
//! - Nothing here retries or caches
//!
//! ## Example
//!
//! ```rust,no_run
//! use git_providers::context::RepositoryContextRequest;
//! use git_providers::providers::{github::GitHubProvider, GitProvider};
//!
//! # async fn example() -> git_providers::api::common::Result<()> {
//! let provider = GitHubProvider::new("ghp_xxx", None)?;
//! let repo = provider
//!     .get_repository_context(&RepositoryContextRequest::new(
//!         "https://github.com/daytonaio/daytona/tree/main",
//!     ))
//!     .await?;
//! println!("{} @ {}", repo.branch, repo.sha);
//! # Ok(())
//! # }
//! ```

pub mod aws_codecommit;
pub mod azure_devops;
pub mod bitbucket;
pub mod bitbucket_server;
pub mod dispatcher;
pub mod gitea;
pub mod gitee;
pub mod github;
pub mod gitlab;
pub mod gitness;
pub mod gogs;

pub use dispatcher::{create_provider, GitProviderService, ProviderId};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::api::common::{ProviderError, Result};
use crate::context::{
    is_personal_namespace, GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository,
    GitUser, ListOptions, RepositoryContextRequest, StaticGitContext,
};

/// Upper bound on commits visited per branch by [`find_branch_by_parent_walk`].
pub const MAX_PARENT_WALK_DEPTH: usize = 1000;

/// Git wire-protocol capabilities a vendor's smart HTTP server cannot serve.
///
/// Handed to whatever component performs clones for the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportCapability {
    ThinPack,
}

impl TransportCapability {
    /// Capability name as advertised in the git protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThinPack => "thin-pack",
        }
    }
}

/// Common capability interface implemented by every vendor adapter.
///
/// Methods other than the parse/build pair perform network calls. Adapters
/// hold only read-only state, so one instance can serve concurrent callers.
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Stable provider id (e.g. `github`, `gitlab-self-managed`).
    fn id(&self) -> &str;

    /// Cheap ownership probe: does this adapter's host serve `repo_url`?
    fn can_handle(&self, repo_url: &str) -> Result<bool>;

    /// Parses a URL into a canonical context without network access.
    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext>;

    /// Parses a URL and performs any lookup the URL cannot carry.
    async fn resolve_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        self.parse_static_git_context(repo_url)
    }

    /// Builds the user-facing URL for a context; the inverse of parsing.
    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String;

    /// Lists namespaces, the personal namespace first.
    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>>;

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>>;

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>>;

    /// Lists open pull requests.
    async fn get_repo_prs(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>>;

    /// The authenticated user.
    async fn get_user(&self) -> Result<GitUser>;

    /// Head commit of the context's branch (or of the default branch).
    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String>;

    /// A branch whose history contains `ctx.sha`.
    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String>;

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String>;

    /// Replaces branch and repository with the pull request's source when
    /// `ctx.pr_number` is set; returns the context unchanged otherwise.
    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext>;

    /// Resolves a URL plus overrides into a repository with branch and commit.
    ///
    /// 1. Resolve the URL and overlay the request's fields
    /// 2. If a pull request is selected, switch to its source branch and repository
    /// 3. If a commit is selected, find a branch containing it and keep the commit
    /// 4. Otherwise fill a missing branch from the default branch and read its head
    async fn get_repository_context(
        &self,
        request: &RepositoryContextRequest,
    ) -> Result<GitRepository> {
        let mut ctx = self.resolve_static_git_context(&request.url).await?;
        overlay_request(&mut ctx, request);

        if ctx.pr_number.is_some() {
            ctx = self.get_pr_context(&ctx).await?;
        }

        let mut repo = GitRepository::from_context(&ctx);

        match ctx.sha.clone().filter(|s| !s.is_empty()) {
            Some(sha) => {
                if ctx.branch.is_none() || ctx.is_commit_ref() {
                    repo.branch = self.get_branch_by_commit(&ctx).await?;
                }
                repo.sha = sha;
            }
            None => {
                if repo.branch.is_empty() {
                    repo.branch = self.get_default_branch(&ctx).await?;
                    ctx.branch = Some(repo.branch.clone());
                }
                repo.sha = self.get_last_commit_sha(&ctx).await?;
            }
        }

        tracing::debug!(
            "resolved {} to {}@{}",
            request.url,
            repo.branch,
            repo.sha
        );
        Ok(repo)
    }

    /// Registers a push webhook used to trigger prebuilds. Returns the hook id.
    async fn register_prebuild_webhook(
        &self,
        _repo: &GitRepository,
        _endpoint_url: &str,
    ) -> Result<String> {
        Err(ProviderError::unsupported(self.id(), "webhook registration"))
    }

    /// Finds the id of a webhook pointing at `endpoint_url`, if any.
    async fn get_prebuild_webhook(
        &self,
        _repo: &GitRepository,
        _endpoint_url: &str,
    ) -> Result<Option<String>> {
        Err(ProviderError::unsupported(self.id(), "webhook lookup"))
    }

    async fn unregister_prebuild_webhook(&self, _repo: &GitRepository, _id: &str) -> Result<()> {
        Err(ProviderError::unsupported(self.id(), "webhook removal"))
    }

    /// Number of commits between `initial_sha` and `current_sha`.
    async fn get_commits_range(
        &self,
        _repo: &GitRepository,
        _initial_sha: &str,
        _current_sha: &str,
    ) -> Result<usize> {
        Err(ProviderError::unsupported(self.id(), "commit range"))
    }

    /// Normalizes a webhook delivery. `Ok(None)` for events other than pushes.
    fn parse_event_data(&self, _headers: &HeaderMap, _body: &[u8]) -> Result<Option<GitEventData>> {
        Err(ProviderError::unsupported(self.id(), "webhook events"))
    }

    /// Capabilities the clone transport must not request from this vendor.
    fn unsupported_transport_capabilities(&self) -> Vec<TransportCapability> {
        Vec::new()
    }
}

fn overlay_request(ctx: &mut StaticGitContext, request: &RepositoryContextRequest) {
    fn set(target: &mut String, value: &Option<String>) {
        if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
            target.clone_from(v);
        }
    }

    set(&mut ctx.id, &request.id);
    set(&mut ctx.name, &request.name);
    set(&mut ctx.owner, &request.owner);
    set(&mut ctx.source, &request.source);

    if request.branch.is_some() {
        ctx.branch.clone_from(&request.branch);
    }
    if request.sha.is_some() {
        ctx.sha.clone_from(&request.sha);
    }
    if request.path.is_some() {
        ctx.path.clone_from(&request.path);
    }
    if request.pr_number.is_some() {
        ctx.pr_number = request.pr_number;
    }
}

/// Maps the personal namespace sentinel to the authenticated username.
pub async fn resolve_namespace<P: GitProvider + ?Sized>(
    provider: &P,
    namespace_id: &str,
) -> Result<String> {
    if is_personal_namespace(namespace_id) {
        Ok(provider.get_user().await?.username)
    } else {
        Ok(namespace_id.to_string())
    }
}

/// Access to a repository's first-parent chain, one commit at a time.
#[async_trait]
pub trait CommitGraph: Send + Sync {
    /// First parent of `sha`; `None` for a root commit.
    async fn first_parent(&self, sha: &str) -> Result<Option<String>>;
}

/// Finds the first branch, in listing order, whose first-parent chain contains `target`.
///
/// Each chain is followed from the branch head for at most
/// [`MAX_PARENT_WALK_DEPTH`] commits. A branch whose commits cannot be fetched
/// is skipped.
///
/// # Errors
///
/// [`ProviderError::BranchNotFound`] when no chain contains `target`.
pub async fn find_branch_by_parent_walk<G: CommitGraph + ?Sized>(
    graph: &G,
    branches: &[GitBranch],
    target: &str,
) -> Result<String> {
    for branch in branches {
        if branch.sha.is_empty() {
            continue;
        }

        let mut current = branch.sha.clone();
        let mut depth = 0;
        loop {
            if current == target {
                return Ok(branch.name.clone());
            }
            if depth >= MAX_PARENT_WALK_DEPTH {
                tracing::warn!(
                    "stopped walking {} after {} commits",
                    branch.name,
                    MAX_PARENT_WALK_DEPTH
                );
                break;
            }
            match graph.first_parent(&current).await {
                Ok(Some(parent)) => current = parent,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("skipping branch {}: {}", branch.name, e);
                    break;
                }
            }
            depth += 1;
        }
    }

    Err(ProviderError::BranchNotFound {
        sha: target.to_string(),
    })
}

/// Case-insensitive header comparison for webhook deliveries.
pub(crate) fn header_is(headers: &HeaderMap, name: &str, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

/// Trims the `.git` suffix from a clone URL to get its web URL.
pub(crate) fn web_url(clone_url: &str) -> &str {
    clone_url.strip_suffix(".git").unwrap_or(clone_url)
}
