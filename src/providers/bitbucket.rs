//
//  git-providers
//  providers/bitbucket.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Bitbucket Cloud Adapter
//!
//! bitbucket.org through the 2.0 REST API, authenticated with HTTP Basic
//! (username and app password or API token).
//!
//! ## URL Forms
//!
//! | Path after the repository | Effect |
//! |---------------------------|--------|
//! | `pull-requests/{n}` | `pr_number` |
//! | `src/{branch}[/{path}]` | `branch` (and `path`) |
//! | `branch/{branch}` | `branch` |
//! | `commits/branch/{branch}` | `branch` |
//! | `commits/{sha}` | `branch` and `sha` |
//!
//! Repository ids used by the listing operations are full names
//! (`workspace/slug`).

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{PaginatedResponse, ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{parse_pr_number, parse_static_git_context, path_segments};
use crate::context::{
    GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository, GitUser, ListOptions,
    RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{
    header_is, resolve_namespace, web_url, GitProvider, MAX_PARENT_WALK_DEPTH,
};

const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    html: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    account_id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Email {
    email: String,
    #[serde(default)]
    is_primary: bool,
}

#[derive(Debug, Deserialize)]
struct Workspace {
    slug: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    mainbranch: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Hash {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    target: Hash,
}

#[derive(Debug, Deserialize)]
struct PullSource {
    branch: Named,
    #[serde(default)]
    commit: Option<Hash>,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct Pull {
    title: String,
    source: PullSource,
}

#[derive(Debug, Deserialize)]
struct Hook {
    uuid: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PushTarget {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PushRef {
    #[serde(rename = "type", default)]
    kind: String,
    name: String,
    target: PushTarget,
}

#[derive(Debug, Deserialize)]
struct PushChange {
    #[serde(rename = "new")]
    new_ref: Option<PushRef>,
}

#[derive(Debug, Deserialize)]
struct Push {
    #[serde(default)]
    changes: Vec<PushChange>,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    push: Push,
    repository: PushRepository,
}

#[derive(Debug, Deserialize)]
struct PushRepository {
    #[serde(default)]
    links: Links,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    owner: Option<Account>,
}

/// Bitbucket Cloud.
#[derive(Debug, Clone)]
pub struct BitbucketProvider {
    client: ApiClient,
}

impl BitbucketProvider {
    /// Creates an adapter authenticated as `username`.
    ///
    /// `base_api_url` only exists to point the adapter at a test server.
    pub fn new(username: &str, token: &str, base_api_url: Option<&str>) -> Result<Self> {
        let mut client = ApiClient::new(base_api_url.unwrap_or(BITBUCKET_API))?;
        if !token.is_empty() {
            client = client.with_auth(AuthCredential::basic(username, token));
        }
        Ok(Self { client })
    }

    fn to_repository(repo: Repository) -> Result<GitRepository> {
        let (owner, name) = split_full_name(&repo.full_name)?;
        let url = repo
            .links
            .html
            .map(|h| h.href)
            .unwrap_or_else(|| format!("https://bitbucket.org/{}", repo.full_name));
        let source = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "bitbucket.org".to_string());

        Ok(GitRepository {
            id: repo.full_name.clone(),
            name: name.to_string(),
            owner: owner.to_string(),
            url,
            branch: repo.mainbranch.map(|b| b.name).unwrap_or_default(),
            source,
            ..Default::default()
        })
    }

    async fn list_branches(&self, full_name: &str, options: &ListOptions) -> Result<Vec<GitBranch>> {
        let page: PaginatedResponse<Branch> = self
            .client
            .get(&format!(
                "/repositories/{full_name}/refs/branches?pagelen={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;
        Ok(page
            .values
            .into_iter()
            .map(|b| GitBranch {
                name: b.name,
                sha: b.target.hash,
            })
            .collect())
    }

    /// Follows `next` links until `limit` commit hashes are collected.
    async fn commit_hashes(&self, path: &str, limit: usize) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(page_url) = next.take() {
            let page: PaginatedResponse<Hash> = self.client.get(&page_url).await?;
            hashes.extend(page.values.into_iter().map(|c| c.hash));
            if hashes.len() >= limit {
                hashes.truncate(limit);
                break;
            }
            next = page.next;
        }

        Ok(hashes)
    }
}

fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    full_name
        .rsplit_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .ok_or_else(|| ProviderError::NotFound(format!("invalid repository full name: {full_name}")))
}

fn full_name_of(owner: &str, name: &str) -> String {
    format!("{owner}/{name}")
}

#[async_trait]
impl GitProvider for BitbucketProvider {
    fn id(&self) -> &str {
        "bitbucket"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(ctx.source == "bitbucket.org")
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let mut ctx = parse_static_git_context(repo_url)?;
        let Some(path) = ctx.path.take() else {
            return Ok(ctx);
        };
        let parts = path_segments(&path);

        match parts.as_slice() {
            ["pull-requests", rest @ ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, rest.first())?);
            }
            ["src" | "branch", branch, rest @ ..] => {
                ctx.branch = Some(branch.to_string());
                if !rest.is_empty() {
                    ctx.path = Some(rest.join("/"));
                }
            }
            ["commits", "branch", branch, ..] => {
                ctx.branch = Some(branch.to_string());
            }
            ["commits", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            _ => ctx.path = Some(path),
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let url = web_url(&request.url);

        if let Some(pr) = request.pr_number {
            return format!("{url}/pull-requests/{pr}");
        }

        match (request.branch.as_deref().filter(|b| !b.is_empty()), &request.path) {
            (Some(branch), _) if request.sha.as_deref() == Some(branch) => {
                format!("{url}/commits/{branch}")
            }
            (Some(branch), Some(path)) => format!("{url}/src/{branch}/{path}"),
            (Some(branch), None) => format!("{url}/branch/{branch}"),
            (None, Some(path)) => format!("{url}/src/main/{path}"),
            (None, None) => url.to_string(),
        }
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let page: PaginatedResponse<Workspace> = self
            .client
            .get(&format!(
                "/workspaces?pagelen={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(&user.username)];
        namespaces.extend(
            page.values
                .into_iter()
                // the personal workspace is already listed first
                .filter(|w| w.slug != user.username)
                .map(|w| GitNamespace::new(w.slug, w.name)),
        );
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let workspace = resolve_namespace(self, namespace).await?;
        let page: PaginatedResponse<Repository> = self
            .client
            .get(&format!(
                "/repositories/{workspace}?pagelen={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        page.values.into_iter().map(Self::to_repository).collect()
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        self.list_branches(repository_id, options).await
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let page: PaginatedResponse<Pull> = self
            .client
            .get(&format!(
                "/repositories/{repository_id}/pullrequests?state=OPEN&pagelen={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        page.values
            .into_iter()
            .map(|pr| {
                let source = Self::to_repository(pr.source.repository)?;
                Ok(GitPullRequest {
                    name: pr.title,
                    branch: pr.source.branch.name,
                    sha: pr.source.commit.map(|c| c.hash).unwrap_or_default(),
                    source_repo_id: source.id,
                    source_repo_url: source.url,
                    source_repo_owner: source.owner,
                    source_repo_name: source.name,
                })
            })
            .collect()
    }

    async fn get_user(&self) -> Result<GitUser> {
        let account: Account = self.client.get("/user").await?;
        let emails: PaginatedResponse<Email> = self.client.get("/user/emails").await?;

        let email = emails
            .values
            .iter()
            .find(|e| e.is_primary)
            .or_else(|| emails.values.first())
            .map(|e| e.email.clone())
            .unwrap_or_default();

        Ok(GitUser {
            id: account.account_id,
            username: account.username,
            name: account.display_name,
            email,
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let full_name = full_name_of(&ctx.owner, &ctx.id);
        let path = match (&ctx.sha, &ctx.branch) {
            (Some(sha), _) => format!("/repositories/{full_name}/commits?include={sha}&pagelen=1"),
            (None, Some(branch)) => format!(
                "/repositories/{full_name}/commits/{}?pagelen=1",
                urlencoding::encode(branch)
            ),
            (None, None) => format!("/repositories/{full_name}/commits?pagelen=1"),
        };

        let page: PaginatedResponse<Hash> = self.client.get(&path).await?;
        page.values
            .into_iter()
            .next()
            .map(|c| c.hash)
            .ok_or_else(|| ProviderError::NotFound(format!("commits of {full_name}")))
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let full_name = full_name_of(&ctx.owner, &ctx.id);
        let branches = self.list_branches(&full_name, &ListOptions::default()).await?;

        for branch in branches {
            if branch.sha == sha {
                return Ok(branch.name);
            }
            let path = format!(
                "/repositories/{full_name}/commits/{}?pagelen=100",
                urlencoding::encode(&branch.name)
            );
            match self.commit_hashes(&path, MAX_PARENT_WALK_DEPTH).await {
                Ok(hashes) if hashes.iter().any(|h| *h == sha) => return Ok(branch.name),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping branch {}: {}", branch.name, e),
            }
        }

        Err(ProviderError::BranchNotFound { sha })
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo: Repository = self
            .client
            .get(&format!("/repositories/{}", full_name_of(&ctx.owner, &ctx.id)))
            .await?;
        repo.mainbranch
            .map(|b| b.name)
            .ok_or_else(|| ProviderError::NotFound(format!("main branch of {}", ctx.full_name())))
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: Pull = self
            .client
            .get(&format!(
                "/repositories/{}/pullrequests/{number}",
                full_name_of(&ctx.owner, &ctx.id)
            ))
            .await?;
        let (owner, name) = split_full_name(&pr.source.repository.full_name)?;

        let mut resolved = ctx.clone();
        resolved.owner = owner.to_string();
        resolved.name = name.to_string();
        resolved.id = name.to_string();
        resolved.url = crate::context::clone_url(&ctx.source, owner, name, true);
        resolved.branch = Some(pr.source.branch.name);
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({
            "description": "prebuild trigger",
            "url": endpoint_url,
            "active": true,
            "events": ["repo:push"],
        });
        let hook: Hook = self
            .client
            .post(
                &format!("/repositories/{}/hooks", full_name_of(&repo.owner, &repo.name)),
                &body,
            )
            .await?;
        Ok(hook.uuid)
    }

    async fn get_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<Option<String>> {
        let page: PaginatedResponse<Hook> = self
            .client
            .get(&format!(
                "/repositories/{}/hooks?pagelen=100",
                full_name_of(&repo.owner, &repo.name)
            ))
            .await?;
        Ok(page
            .values
            .into_iter()
            .find(|h| h.url == endpoint_url)
            .map(|h| h.uuid))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        self.client
            .delete(&format!(
                "/repositories/{}/hooks/{}",
                full_name_of(&repo.owner, &repo.name),
                urlencoding::encode(id)
            ))
            .await
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let path = format!(
            "/repositories/{}/commits?include={current_sha}&exclude={initial_sha}&pagelen=100",
            full_name_of(&repo.owner, &repo.name)
        );
        Ok(self.commit_hashes(&path, MAX_PARENT_WALK_DEPTH).await?.len())
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-Event-Key", "repo:push") {
            return Ok(None);
        }

        let event: PushEvent = serde_json::from_slice(body)?;
        let Some(change) = event
            .push
            .changes
            .into_iter()
            .filter_map(|c| c.new_ref)
            .find(|r| r.kind == "branch")
        else {
            return Ok(None);
        };

        let url = event
            .repository
            .links
            .html
            .map(|h| h.href)
            .unwrap_or_else(|| format!("https://bitbucket.org/{}", event.repository.full_name));

        Ok(Some(GitEventData {
            url: format!("{}.git", web_url(&url)),
            branch: change.name,
            sha: change.target.hash,
            owner: event
                .repository
                .owner
                .map(|o| o.username)
                .unwrap_or_default(),
            affected_files: Vec::new(),
        }))
    }
}
