//
//  git-providers
//  providers/gogs.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Gogs Adapter
//!
//! Gogs speaks an older dialect of the Gitea v1 API and shares its payload
//! shapes. It has no pull request listing and no commit listing, so:
//!
//! - [`GitProvider::get_repo_prs`] and [`GitProvider::get_pr_context`] report
//!   [`ProviderError::Unsupported`]
//! - branch-by-commit and commit ranges walk first parents one commit at a time
//!
//! URL routes: `src/{branch}[/{path}]`, `commits/{branch}`, `commit/{sha}`,
//! `pulls/{n}`.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::json;

use crate::api::common::{ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{parse_pr_number, parse_static_git_context, path_segments};
use crate::context::{
    is_personal_namespace, GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository,
    GitUser, ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::gitea::{
    api_root, repo_path, to_repository, Branch, Commit, Hook, Org, PushEvent, Repo, User,
};
use crate::providers::{
    find_branch_by_parent_walk, header_is, resolve_namespace, web_url, CommitGraph, GitProvider,
    MAX_PARENT_WALK_DEPTH,
};

struct RepoCommits<'a> {
    client: &'a ApiClient,
    repo: String,
}

#[async_trait]
impl CommitGraph for RepoCommits<'_> {
    async fn first_parent(&self, sha: &str) -> Result<Option<String>> {
        let commit: Commit = self
            .client
            .get(&format!("{}/commits/{sha}", self.repo))
            .await?;
        Ok(commit.parents.into_iter().next().map(|p| p.sha))
    }
}

/// Gogs instance.
#[derive(Debug, Clone)]
pub struct GogsProvider {
    client: ApiClient,
    base_url: String,
}

impl GogsProvider {
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let client = ApiClient::new(api_root(base_url))?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::token));
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn graph(&self, owner: &str, name: &str) -> RepoCommits<'_> {
        RepoCommits {
            client: &self.client,
            repo: repo_path(owner, name),
        }
    }

    async fn list_branches(&self, owner: &str, name: &str) -> Result<Vec<GitBranch>> {
        let branches: Vec<Branch> = self
            .client
            .get(&format!("{}/branches", repo_path(owner, name)))
            .await?;
        Ok(branches
            .into_iter()
            .map(|b| GitBranch {
                name: b.name,
                sha: b.commit.id,
            })
            .collect())
    }
}

#[async_trait]
impl GitProvider for GogsProvider {
    fn id(&self) -> &str {
        "gogs"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(self.base_url.contains(&ctx.source))
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let mut ctx = parse_static_git_context(repo_url)?;
        let Some(path) = ctx.path.take() else {
            return Ok(ctx);
        };
        let parts = path_segments(&path);

        match parts.as_slice() {
            ["pulls", rest @ ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, rest.first())?);
            }
            ["src", branch, rest @ ..] => {
                ctx.branch = Some(branch.to_string());
                if !rest.is_empty() {
                    ctx.path = Some(rest.join("/"));
                }
            }
            ["commits", branch, ..] => {
                ctx.branch = Some(branch.to_string());
            }
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            _ => ctx.path = Some(path),
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let url = web_url(&request.url);

        if let Some(pr) = request.pr_number {
            return format!("{url}/pulls/{pr}");
        }

        match (
            request.branch.as_deref().filter(|b| !b.is_empty()),
            request.path.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(branch), _) if request.sha.as_deref() == Some(branch) => {
                format!("{url}/commit/{branch}")
            }
            (Some(branch), Some(path)) => format!("{url}/src/{branch}/{path}"),
            (Some(branch), None) => format!("{url}/src/{branch}"),
            (None, Some(path)) => format!("{url}/src/main/{path}"),
            (None, None) => url.to_string(),
        }
    }

    async fn get_namespaces(&self, _options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let orgs: Vec<Org> = self.client.get("/user/orgs").await?;

        let mut namespaces = vec![GitNamespace::personal(&user.username)];
        namespaces.extend(orgs.into_iter().map(|o| {
            let slug = o.slug();
            GitNamespace::new(slug.clone(), slug)
        }));
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let path = if is_personal_namespace(namespace) {
            "/user/repos".to_string()
        } else {
            format!("/orgs/{}/repos", urlencoding::encode(namespace))
        };
        let repos: Vec<Repo> = self.client.get(&path).await?;
        Ok(repos.into_iter().map(to_repository).collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let owner = resolve_namespace(self, namespace_id).await?;
        self.list_branches(&owner, repository_id).await
    }

    async fn get_repo_prs(
        &self,
        _repository_id: &str,
        _namespace_id: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        Err(ProviderError::unsupported(self.id(), "pull request listing"))
    }

    async fn get_user(&self) -> Result<GitUser> {
        let user: User = self.client.get("/user").await?;
        Ok(GitUser {
            id: user.id.to_string(),
            username: user.login,
            name: user.full_name,
            email: user.email,
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let reference = match ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            Some(reference) => reference.clone(),
            None => self.get_default_branch(ctx).await?,
        };
        let commit: Commit = self
            .client
            .get(&format!(
                "{}/commits/{}",
                repo_path(&ctx.owner, &ctx.name),
                urlencoding::encode(&reference)
            ))
            .await?;
        Ok(commit.sha)
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self.list_branches(&ctx.owner, &ctx.name).await?;
        find_branch_by_parent_walk(&self.graph(&ctx.owner, &ctx.name), &branches, &sha).await
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo: Repo = self.client.get(&repo_path(&ctx.owner, &ctx.name)).await?;
        Ok(repo.default_branch)
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        if ctx.pr_number.is_none() {
            return Ok(ctx.clone());
        }
        Err(ProviderError::unsupported(self.id(), "pull requests"))
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({
            "type": "gogs",
            "config": {"url": endpoint_url, "content_type": "json"},
            "events": ["push"],
            "active": true,
        });
        let hook: Hook = self
            .client
            .post(&format!("{}/hooks", repo_path(&repo.owner, &repo.name)), &body)
            .await?;
        Ok(hook.id.to_string())
    }

    async fn get_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<Option<String>> {
        let hooks: Vec<Hook> = self
            .client
            .get(&format!("{}/hooks", repo_path(&repo.owner, &repo.name)))
            .await?;
        Ok(hooks
            .into_iter()
            .find(|h| h.config.get("url").map(String::as_str) == Some(endpoint_url))
            .map(|h| h.id.to_string()))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        let id: u64 = id
            .parse()
            .map_err(|_| ProviderError::Config(format!("invalid webhook id: {id}")))?;
        self.client
            .delete(&format!("{}/hooks/{id}", repo_path(&repo.owner, &repo.name)))
            .await
    }

    /// Follows first parents from `current_sha` until `initial_sha`.
    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let graph = self.graph(&repo.owner, &repo.name);
        let mut current = current_sha.to_string();

        for count in 0..MAX_PARENT_WALK_DEPTH {
            if current == initial_sha {
                return Ok(count);
            }
            match graph.first_parent(&current).await? {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Err(ProviderError::NotFound(format!(
            "{initial_sha} in the history of {current_sha}"
        )))
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-Gogs-Event", "push") {
            return Ok(None);
        }
        let event: PushEvent = serde_json::from_slice(body)?;
        Ok(event.into_event_data())
    }
}
