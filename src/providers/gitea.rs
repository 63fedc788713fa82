//
//  git-providers
//  providers/gitea.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Gitea Adapter
//!
//! Self-hosted Gitea instances and Codeberg through the `/api/v1` REST API,
//! authenticated with the `token` scheme.
//!
//! ## URL Forms
//!
//! | Path after the repository | Effect |
//! |---------------------------|--------|
//! | `pulls/{n}` | `pr_number` |
//! | `src/branch/{branch}[/{path}]` | `branch` (and `path`) |
//! | `src/commit/{sha}[/{path}]` | `branch` and `sha` (and `path`) |
//! | `commit/{sha}` | `branch` and `sha` |
//! | `commits/branch/{branch}` | `branch` |
//!
//! Gitea has no "branches containing commit" endpoint, so
//! [`GitProvider::get_branch_by_commit`] walks first parents.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{parse_pr_number, parse_static_git_context, path_segments};
use crate::context::{
    GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository, GitUser, ListOptions,
    RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{
    find_branch_by_parent_walk, header_is, resolve_namespace, web_url, CommitGraph, GitProvider,
    MAX_PARENT_WALK_DEPTH,
};

/// Codeberg's public instance.
pub const CODEBERG_URL: &str = "https://codeberg.org";

#[derive(Debug, Deserialize)]
pub(crate) struct Owner {
    pub login: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Org {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: String,
}

impl Org {
    pub fn slug(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Repo {
    pub id: u64,
    pub name: String,
    pub html_url: String,
    #[serde(default)]
    pub clone_url: String,
    #[serde(default)]
    pub default_branch: String,
    pub owner: Owner,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchCommit {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Branch {
    pub name: String,
    pub commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParentRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Commit {
    pub sha: String,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    sha: String,
    #[serde(default)]
    repo: Option<Repo>,
}

#[derive(Debug, Deserialize)]
struct Pull {
    title: String,
    head: PullHead,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Hook {
    pub id: u64,
    #[serde(default)]
    pub config: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushRepository {
    pub html_url: String,
    pub owner: Owner,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushEvent {
    #[serde(rename = "ref")]
    pub reference: String,
    pub after: String,
    pub repository: PushRepository,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

impl PushEvent {
    /// Normalizes a branch push; `None` for tag pushes.
    pub fn into_event_data(self) -> Option<GitEventData> {
        let branch = self.reference.strip_prefix("refs/heads/")?.to_string();
        let owner = if self.repository.owner.full_name.is_empty() {
            self.repository.owner.login
        } else {
            self.repository.owner.full_name
        };

        Some(GitEventData {
            url: format!("{}.git", web_url(self.repository.html_url.trim_end_matches('/'))),
            branch,
            sha: self.after,
            owner,
            affected_files: self
                .commits
                .into_iter()
                .flat_map(|c| c.added.into_iter().chain(c.modified).chain(c.removed))
                .collect(),
        })
    }
}

/// API root for an instance URL: `{base}/api/v1` unless `base` already names an API.
pub(crate) fn api_root(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.contains("/api/") {
        base.to_string()
    } else {
        format!("{base}/api/v1")
    }
}

pub(crate) fn to_repository(repo: Repo) -> GitRepository {
    let source = url::Url::parse(&repo.html_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    GitRepository {
        id: repo.name.clone(),
        name: repo.name,
        url: if repo.clone_url.is_empty() {
            repo.html_url
        } else {
            repo.clone_url
        },
        branch: repo.default_branch,
        owner: repo.owner.login,
        source,
        ..Default::default()
    }
}

pub(crate) fn repo_path(owner: &str, name: &str) -> String {
    format!(
        "/repos/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(name)
    )
}

/// First-parent access through `git/commits/{sha}`.
struct RepoCommits<'a> {
    client: &'a ApiClient,
    repo: String,
}

#[async_trait]
impl CommitGraph for RepoCommits<'_> {
    async fn first_parent(&self, sha: &str) -> Result<Option<String>> {
        let commit: Commit = self
            .client
            .get(&format!("{}/git/commits/{sha}", self.repo))
            .await?;
        Ok(commit.parents.into_iter().next().map(|p| p.sha))
    }
}

/// Gitea or Codeberg instance.
#[derive(Debug, Clone)]
pub struct GiteaProvider {
    id: String,
    client: ApiClient,
    base_url: String,
}

impl GiteaProvider {
    /// Creates an adapter for the Gitea instance at `base_url`.
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        Self::with_id("gitea", token, base_url)
    }

    /// Creates an adapter for Codeberg.
    pub fn codeberg(token: &str) -> Result<Self> {
        Self::with_id("codeberg", token, CODEBERG_URL)
    }

    pub(crate) fn with_id(id: &str, token: &str, base_url: &str) -> Result<Self> {
        let client = ApiClient::new(api_root(base_url))?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::token));
        Ok(Self {
            id: id.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn list_branches(&self, owner: &str, name: &str, options: &ListOptions) -> Result<Vec<GitBranch>> {
        let branches: Vec<Branch> = self
            .client
            .get(&format!(
                "{}/branches?page={}&limit={}",
                repo_path(owner, name),
                options.page(),
                options.per_page()
            ))
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
impl GitProvider for GiteaProvider {
    fn id(&self) -> &str {
        &self.id
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
            ["src", "branch", branch, rest @ ..] => {
                ctx.branch = Some(branch.to_string());
                if !rest.is_empty() {
                    ctx.path = Some(rest.join("/"));
                }
            }
            ["src", "commit", sha, rest @ ..] => {
                ctx = ctx.with_commit(*sha);
                if !rest.is_empty() {
                    ctx.path = Some(rest.join("/"));
                }
            }
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            ["commits", "branch", branch] => {
                ctx.branch = Some(branch.to_string());
            }
            _ => ctx.path = Some(path),
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let mut url = web_url(&request.url).to_string();

        if let Some(pr) = request.pr_number {
            return format!("{url}/pulls/{pr}");
        }

        let path = request.path.as_deref().filter(|p| !p.is_empty());
        match request.branch.as_deref().filter(|b| !b.is_empty()) {
            Some(branch) if request.sha.as_deref() == Some(branch) => {
                url.push_str(&format!("/src/commit/{branch}"));
            }
            Some(branch) => url.push_str(&format!("/src/branch/{branch}")),
            None if path.is_some() => url.push_str("/src/branch/main"),
            None => {}
        }
        if let Some(path) = path {
            url.push('/');
            url.push_str(path);
        }

        url
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let orgs: Vec<Org> = self
            .client
            .get(&format!(
                "/user/orgs?page={}&limit={}",
                options.page(),
                options.per_page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(&user.username)];
        namespaces.extend(orgs.into_iter().map(|o| {
            let slug = o.slug();
            let name = if o.full_name.is_empty() {
                slug.clone()
            } else {
                o.full_name
            };
            GitNamespace::new(slug, name)
        }));
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let query = format!("page={}&limit={}", options.page(), options.per_page());
        let path = if crate::context::is_personal_namespace(namespace) {
            format!("/user/repos?{query}")
        } else {
            format!("/orgs/{}/repos?{query}", urlencoding::encode(namespace))
        };

        let repos: Vec<Repo> = self.client.get(&path).await?;
        Ok(repos.into_iter().map(to_repository).collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let owner = resolve_namespace(self, namespace_id).await?;
        self.list_branches(&owner, repository_id, options).await
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let owner = resolve_namespace(self, namespace_id).await?;
        let pulls: Vec<Pull> = self
            .client
            .get(&format!(
                "{}/pulls?state=open&page={}&limit={}",
                repo_path(&owner, repository_id),
                options.page(),
                options.per_page()
            ))
            .await?;

        Ok(pulls
            .into_iter()
            .filter_map(|pr| {
                let Some(repo) = pr.head.repo else {
                    tracing::warn!("skipping pull request {:?}: source repository is gone", pr.title);
                    return None;
                };
                let source = to_repository(repo);
                Some(GitPullRequest {
                    name: pr.title,
                    branch: pr.head.reference,
                    sha: pr.head.sha,
                    source_repo_id: source.id,
                    source_repo_url: source.url,
                    source_repo_owner: source.owner,
                    source_repo_name: source.name,
                })
            })
            .collect())
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
        let mut path = format!("{}/commits?limit=1", repo_path(&ctx.owner, &ctx.name));
        if let Some(reference) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&sha={}", urlencoding::encode(reference)));
        }

        let commits: Vec<Commit> = self.client.get(&path).await?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| ProviderError::NotFound(format!("commits of {}", ctx.full_name())))
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self
            .list_branches(&ctx.owner, &ctx.name, &ListOptions::default())
            .await?;
        let graph = RepoCommits {
            client: &self.client,
            repo: repo_path(&ctx.owner, &ctx.name),
        };
        find_branch_by_parent_walk(&graph, &branches, &sha).await
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo: Repo = self.client.get(&repo_path(&ctx.owner, &ctx.name)).await?;
        Ok(repo.default_branch)
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: Pull = self
            .client
            .get(&format!("{}/pulls/{number}", repo_path(&ctx.owner, &ctx.name)))
            .await?;
        let repo = pr
            .head
            .repo
            .ok_or_else(|| ProviderError::NotFound(format!("source repository of pull {number}")))?;

        let mut resolved = ctx.clone();
        resolved.branch = Some(pr.head.reference);
        resolved.url = repo.clone_url;
        resolved.id = repo.name.clone();
        resolved.name = repo.name;
        resolved.owner = repo.owner.login;
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({
            "type": "gitea",
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
            .get(&format!(
                "{}/hooks?page=1&limit=100",
                repo_path(&repo.owner, &repo.name)
            ))
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

    /// Counts commits listed from `current_sha` until `initial_sha` appears.
    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let base = repo_path(&repo.owner, &repo.name);
        let per_page = 50;
        let mut page = 1;
        let mut seen = 0;

        while seen < MAX_PARENT_WALK_DEPTH {
            let commits: Vec<Commit> = self
                .client
                .get(&format!(
                    "{base}/commits?sha={}&page={page}&limit={per_page}&stat=false",
                    urlencoding::encode(current_sha)
                ))
                .await?;
            let fetched = commits.len();
            for commit in commits {
                if commit.sha == initial_sha {
                    return Ok(seen);
                }
                seen += 1;
            }
            if fetched < per_page {
                break;
            }
            page += 1;
        }

        Err(ProviderError::NotFound(format!(
            "{initial_sha} in the history of {current_sha}"
        )))
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-Gitea-Event", "push") {
            return Ok(None);
        }
        let event: PushEvent = serde_json::from_slice(body)?;
        Ok(event.into_event_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GiteaProvider {
        GiteaProvider::new("token", "https://gitea.example.com").unwrap()
    }

    #[test]
    fn test_api_root() {
        assert_eq!(api_root("https://gitea.example.com/"), "https://gitea.example.com/api/v1");
        assert_eq!(api_root("https://gitea.example.com/api/v1"), "https://gitea.example.com/api/v1");
    }

    #[test]
    fn test_parse_forms() {
        let p = provider();
        let base = "https://gitea.example.com/daytonaio/daytona";

        let ctx = p.parse_static_git_context(&format!("{base}/pulls/3")).unwrap();
        assert_eq!(ctx.pr_number, Some(3));

        let ctx = p
            .parse_static_git_context(&format!("{base}/src/branch/dev/docs/a.md"))
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert_eq!(ctx.path.as_deref(), Some("docs/a.md"));

        let ctx = p
            .parse_static_git_context(&format!("{base}/src/commit/abc/README.md"))
            .unwrap();
        assert!(ctx.is_commit_ref());
        assert_eq!(ctx.path.as_deref(), Some("README.md"));

        let ctx = p.parse_static_git_context(&format!("{base}/commit/abc")).unwrap();
        assert!(ctx.is_commit_ref());
        assert!(ctx.path.is_none());

        let ctx = p
            .parse_static_git_context(&format!("{base}/commits/branch/dev"))
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert!(ctx.sha.is_none());
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        for url in [
            "https://gitea.example.com/a/b",
            "https://gitea.example.com/a/b/pulls/2",
            "https://gitea.example.com/a/b/src/branch/dev",
            "https://gitea.example.com/a/b/src/branch/dev/src/lib.rs",
            "https://gitea.example.com/a/b/src/commit/abc",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            let built = p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx));
            assert_eq!(built, url);
        }
    }

    #[test]
    fn test_codeberg_can_handle() {
        let p = GiteaProvider::codeberg("").unwrap();
        assert_eq!(p.id(), "codeberg");
        assert!(p.can_handle("https://codeberg.org/forgejo/forgejo").unwrap());
        assert!(!p.can_handle("https://gitea.com/gitea/tea").unwrap());
    }

    #[tokio::test]
    async fn test_branch_by_commit_walks_parents() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/repos/a/b/branches?page=1&limit=100")
            .with_body(r#"[{"name": "main", "commit": {"id": "m2"}}, {"name": "dev", "commit": {"id": "d2"}}]"#)
            .create_async()
            .await;
        for (sha, parent) in [("m2", Some("m1")), ("m1", None), ("d2", Some("target"))] {
            let parents = parent
                .map(|p| format!(r#"[{{"sha": "{p}"}}]"#))
                .unwrap_or_else(|| "[]".to_string());
            server
                .mock("GET", format!("/api/v1/repos/a/b/git/commits/{sha}").as_str())
                .with_body(format!(r#"{{"sha": "{sha}", "parents": {parents}}}"#))
                .create_async()
                .await;
        }

        let p = GiteaProvider::new("t", &server.url()).unwrap();
        let ctx = StaticGitContext::from_parts("localhost", "a", "b", false).with_commit("target");
        assert_eq!(p.get_branch_by_commit(&ctx).await.unwrap(), "dev");
    }

    #[tokio::test]
    async fn test_commits_range_counts_until_initial() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/repos/a/b/commits?sha=c3&page=1&limit=50&stat=false")
            .with_body(r#"[{"sha": "c3"}, {"sha": "c2"}, {"sha": "c1"}, {"sha": "c0"}]"#)
            .create_async()
            .await;

        let p = GiteaProvider::new("t", &server.url()).unwrap();
        let repo = GitRepository {
            owner: "a".to_string(),
            name: "b".to_string(),
            ..Default::default()
        };
        assert_eq!(p.get_commits_range(&repo, "c1", "c3").await.unwrap(), 2);
        assert!(p.get_commits_range(&repo, "zz", "c3").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_webhook_lookup_by_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/repos/a/b/hooks?page=1&limit=100")
            .with_body(r#"[{"id": 4, "config": {"url": "https://other"}}, {"id": 7, "config": {"url": "https://hook"}}]"#)
            .create_async()
            .await;

        let p = GiteaProvider::new("t", &server.url()).unwrap();
        let repo = GitRepository {
            owner: "a".to_string(),
            name: "b".to_string(),
            ..Default::default()
        };
        assert_eq!(
            p.get_prebuild_webhook(&repo, "https://hook").await.unwrap().as_deref(),
            Some("7")
        );
        assert_eq!(p.get_prebuild_webhook(&repo, "https://none").await.unwrap(), None);
    }

    #[test]
    fn test_parse_push_event() {
        let mut headers = HeaderMap::new();
        headers.insert("x-gitea-event", "push".parse().unwrap());
        let body = br#"{
            "ref": "refs/heads/main",
            "after": "abc",
            "repository": {"html_url": "https://gitea.example.com/a/b", "owner": {"login": "a", "full_name": ""}},
            "commits": [{"added": ["x.rs"], "modified": ["y.rs"], "removed": []}]
        }"#;
        let event = provider().parse_event_data(&headers, body).unwrap().unwrap();
        assert_eq!(event.url, "https://gitea.example.com/a/b.git");
        assert_eq!(event.branch, "main");
        assert_eq!(event.owner, "a");
        assert_eq!(event.affected_files, vec!["x.rs", "y.rs"]);

        let tag = br#"{"ref": "refs/tags/v1", "after": "abc",
            "repository": {"html_url": "https://gitea.example.com/a/b", "owner": {"login": "a"}}}"#;
        assert!(provider().parse_event_data(&headers, tag).unwrap().is_none());
    }
}
