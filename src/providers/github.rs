//
//  git-providers
//  providers/github.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # GitHub Adapter
//!
//! GitHub.com and GitHub Enterprise Server through the v3 REST API.
//!
//! ## URL Forms
//!
//! | Path after the repository | Effect |
//! |---------------------------|--------|
//! | `pull/{n}` | `pr_number` |
//! | `tree/{branch}` | `branch` (may contain `/`) |
//! | `blob/{branch}/{path}` | `branch` and `path` |
//! | `commits/{branch}` | `branch` |
//! | `commit/{sha}` | `branch` and `sha` |
//!
//! ## API Root
//!
//! `https://api.github.com` unless a base API URL is configured. Enterprise
//! servers serve the API under `/api/v3`, which is appended when missing.

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
use crate::providers::{header_is, resolve_namespace, web_url, GitProvider};

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    html_url: String,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    default_branch: String,
    owner: Account,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
    repo: Option<Repo>,
}

#[derive(Debug, Deserialize)]
struct Pull {
    title: String,
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct Comparison {
    status: String,
    #[serde(default)]
    total_commits: Option<usize>,
    #[serde(default)]
    commits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Hook {
    id: u64,
    #[serde(default)]
    config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PushOwner {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushRepository {
    html_url: String,
    #[serde(default)]
    owner: Option<PushOwner>,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    head_commit: Option<CommitId>,
    repository: PushRepository,
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize)]
struct CommitId {
    id: String,
}

/// GitHub and GitHub Enterprise Server.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    id: String,
    client: ApiClient,
    base_api_url: Option<String>,
}

impl GitHubProvider {
    /// Creates an adapter for github.com (`base_api_url = None`) or an
    /// Enterprise server.
    ///
    /// An empty token means anonymous access.
    pub fn new(token: &str, base_api_url: Option<&str>) -> Result<Self> {
        let id = if base_api_url.is_some() {
            "github-enterprise-server"
        } else {
            "github"
        };
        Self::with_id(id, token, base_api_url)
    }

    pub(crate) fn with_id(id: &str, token: &str, base_api_url: Option<&str>) -> Result<Self> {
        let root = base_api_url.map(api_root).unwrap_or_else(|| GITHUB_API.to_string());
        let client = ApiClient::new(root)?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::bearer))
            .with_header("Accept", "application/vnd.github+json");

        Ok(Self {
            id: id.to_string(),
            client,
            base_api_url: base_api_url.map(str::to_string),
        })
    }

    fn to_repository(repo: Repo) -> GitRepository {
        let source = url::Url::parse(&repo.html_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        GitRepository {
            id: repo.name.clone(),
            name: repo.name,
            url: repo.html_url,
            branch: repo.default_branch,
            owner: repo.owner.login,
            source,
            ..Default::default()
        }
    }

    async fn list_branches(&self, owner: &str, repo: &str, options: &ListOptions) -> Result<Vec<Branch>> {
        self.client
            .get(&format!(
                "/repos/{owner}/{repo}/branches?per_page={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await
    }

    async fn compare(&self, owner: &str, repo: &str, base: &str, head: &str) -> Result<Comparison> {
        self.client
            .get(&format!("/repos/{owner}/{repo}/compare/{base}...{head}"))
            .await
    }
}

/// `https://ghe.example.com` → `https://ghe.example.com/api/v3`
fn api_root(base_api_url: &str) -> String {
    let trimmed = base_api_url.trim_end_matches('/');
    if trimmed.contains("/api/") || trimmed.starts_with("https://api.") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api/v3")
    }
}

#[async_trait]
impl GitProvider for GitHubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(match &self.base_api_url {
            None => ctx.source == "github.com",
            Some(base) => base.contains(&ctx.source),
        })
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let mut ctx = parse_static_git_context(repo_url)?;
        let Some(path) = ctx.path.take() else {
            return Ok(ctx);
        };
        let parts = path_segments(&path);

        match parts.as_slice() {
            ["pull", rest @ ..] if !rest.is_empty() => {
                ctx.pr_number = Some(parse_pr_number(repo_url, rest.first())?);
            }
            ["tree", rest @ ..] if !rest.is_empty() => {
                ctx.branch = Some(rest.join("/"));
            }
            ["blob", branch, rest @ ..] => {
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
        let mut url = web_url(&request.url).to_string();

        if let Some(pr) = request.pr_number {
            return format!("{url}/pull/{pr}");
        }

        match request.branch.as_deref().filter(|b| !b.is_empty()) {
            Some(branch) if request.sha.as_deref() == Some(branch) => {
                url.push_str(&format!("/commit/{branch}"));
            }
            Some(branch) => match &request.path {
                Some(path) => url.push_str(&format!("/blob/{branch}/{path}")),
                None => url.push_str(&format!("/tree/{branch}")),
            },
            None => {
                if let Some(path) = &request.path {
                    url.push_str(&format!("/blob/main/{path}"));
                }
            }
        }

        url
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let orgs: Vec<Account> = self
            .client
            .get(&format!(
                "/user/orgs?per_page={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(user.username)];
        namespaces.extend(orgs.into_iter().map(|o| GitNamespace::new(&o.login, &o.login)));
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let query = if crate::context::is_personal_namespace(namespace) {
            format!("fork:true user:{}", self.get_user().await?.username)
        } else {
            format!("fork:true org:{namespace}")
        };

        let result: SearchResult = self
            .client
            .get(&format!(
                "/search/repositories?q={}&per_page={}&page={}",
                urlencoding::encode(&query),
                options.per_page(),
                options.page()
            ))
            .await?;

        Ok(result.items.into_iter().map(Self::to_repository).collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let owner = resolve_namespace(self, namespace_id).await?;
        let branches = self.list_branches(&owner, repository_id, options).await?;
        Ok(branches
            .into_iter()
            .map(|b| GitBranch {
                name: b.name,
                sha: b.commit.sha,
            })
            .collect())
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
                "/repos/{owner}/{repository_id}/pulls?state=open&per_page={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        Ok(pulls
            .into_iter()
            .filter_map(|pr| {
                // deleted forks have no head repository
                let repo = pr.head.repo?;
                Some(GitPullRequest {
                    name: pr.title,
                    branch: pr.head.git_ref,
                    sha: pr.head.sha,
                    source_repo_id: repo.name.clone(),
                    source_repo_name: repo.name,
                    source_repo_url: repo.html_url,
                    source_repo_owner: repo.owner.login,
                })
            })
            .collect())
    }

    async fn get_user(&self) -> Result<GitUser> {
        let user: User = self.client.get("/user").await?;
        Ok(GitUser {
            id: user.id.to_string(),
            username: user.login,
            name: user.name.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let mut path = format!("/repos/{}/{}/commits?per_page=1", ctx.owner, ctx.name);
        if let Some(reference) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&sha={}", urlencoding::encode(reference)));
        }

        let commits: Vec<CommitRef> = self.client.get(&path).await?;
        Ok(commits.into_iter().next().map(|c| c.sha).unwrap_or_default())
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let Some(sha) = ctx.sha.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(String::new());
        };

        let branches = self
            .list_branches(&ctx.owner, &ctx.name, &ListOptions::default())
            .await?;
        for branch in branches {
            let comparison = self.compare(&ctx.owner, &ctx.name, &branch.name, sha).await?;
            if comparison.status == "identical" || comparison.status == "behind" {
                return Ok(branch.name);
            }
        }

        Err(ProviderError::BranchNotFound {
            sha: sha.to_string(),
        })
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo: Repo = self
            .client
            .get(&format!("/repos/{}/{}", ctx.owner, ctx.name))
            .await?;
        Ok(repo.default_branch)
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: Pull = self
            .client
            .get(&format!("/repos/{}/{}/pulls/{number}", ctx.owner, ctx.name))
            .await?;
        let repo = pr
            .head
            .repo
            .ok_or_else(|| ProviderError::NotFound(format!("source repository of PR #{number}")))?;

        let mut resolved = ctx.clone();
        resolved.branch = Some(pr.head.git_ref);
        resolved.url = repo.clone_url.unwrap_or_else(|| format!("{}.git", repo.html_url));
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
            "active": true,
            "events": ["push"],
            "config": {"url": endpoint_url, "content_type": "json"},
        });
        let hook: Hook = self
            .client
            .post(&format!("/repos/{}/{}/hooks", repo.owner, repo.name), &body)
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
            .get(&format!("/repos/{}/{}/hooks?per_page=100", repo.owner, repo.name))
            .await?;
        Ok(hooks
            .into_iter()
            .find(|h| h.config.get("url").and_then(|u| u.as_str()) == Some(endpoint_url))
            .map(|h| h.id.to_string()))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/repos/{}/{}/hooks/{id}", repo.owner, repo.name))
            .await
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let comparison = self
            .compare(&repo.owner, &repo.name, initial_sha, current_sha)
            .await?;
        Ok(comparison.total_commits.unwrap_or(comparison.commits.len()))
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-GitHub-Event", "push") {
            return Ok(None);
        }

        let event: PushEvent = serde_json::from_slice(body)?;
        let affected_files = event
            .commits
            .into_iter()
            .flat_map(|c| c.added.into_iter().chain(c.modified).chain(c.removed))
            .collect();

        Ok(Some(GitEventData {
            url: format!("{}.git", web_url(&event.repository.html_url)),
            branch: event
                .git_ref
                .strip_prefix("refs/heads/")
                .unwrap_or(&event.git_ref)
                .to_string(),
            sha: event.head_commit.map(|c| c.id).unwrap_or_default(),
            owner: event
                .repository
                .owner
                .and_then(|o| o.name)
                .unwrap_or_default(),
            affected_files,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GitHubProvider {
        GitHubProvider::new("", None).unwrap()
    }

    fn mocked(server: &mockito::ServerGuard) -> GitHubProvider {
        GitHubProvider::new("token", Some(&format!("{}/api/v3", server.url()))).unwrap()
    }

    #[test]
    fn test_parse_branch_with_slash() {
        let ctx = provider()
            .parse_static_git_context("https://github.com/daytonaio/daytona/tree/feature/x")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("feature/x"));
        assert!(ctx.sha.is_none());
        assert!(ctx.path.is_none());
    }

    #[test]
    fn test_parse_blob() {
        let ctx = provider()
            .parse_static_git_context("https://github.com/daytonaio/daytona/blob/main/docs/README.md")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert_eq!(ctx.path.as_deref(), Some("docs/README.md"));
    }

    #[test]
    fn test_parse_commit_sets_branch_and_sha() {
        let ctx = provider()
            .parse_static_git_context("https://github.com/daytonaio/daytona/commit/abc123")
            .unwrap();
        assert_eq!(ctx.sha.as_deref(), Some("abc123"));
        assert_eq!(ctx.branch.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_pull() {
        let ctx = provider()
            .parse_static_git_context("https://github.com/daytonaio/daytona/pull/1")
            .unwrap();
        assert_eq!(ctx.pr_number, Some(1));
        assert!(ctx.branch.is_none() && ctx.sha.is_none() && ctx.path.is_none());
    }

    #[test]
    fn test_parse_invalid_pull_number() {
        assert!(provider()
            .parse_static_git_context("https://github.com/a/b/pull/abc")
            .is_err());
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        for url in [
            "https://github.com/daytonaio/daytona",
            "https://github.com/daytonaio/daytona/tree/feature/x",
            "https://github.com/daytonaio/daytona/blob/dev/src/main.rs",
            "https://github.com/daytonaio/daytona/commit/abc123",
            "https://github.com/daytonaio/daytona/pull/7",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            let built = p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx));
            assert_eq!(built, url);
            assert_eq!(p.parse_static_git_context(&built).unwrap(), ctx);
        }
    }

    #[test]
    fn test_url_path_without_branch_uses_main() {
        let request = RepositoryContextRequest {
            url: "https://github.com/a/b.git".to_string(),
            path: Some("README.md".to_string()),
            ..Default::default()
        };
        assert_eq!(
            provider().get_url_from_context(&request),
            "https://github.com/a/b/blob/main/README.md"
        );
    }

    #[test]
    fn test_can_handle() {
        let p = provider();
        assert!(p.can_handle("https://github.com/a/b").unwrap());
        assert!(!p.can_handle("https://gitlab.com/a/b").unwrap());

        let ghes = GitHubProvider::new("", Some("https://ghe.example.com/api/v3")).unwrap();
        assert_eq!(ghes.id(), "github-enterprise-server");
        assert!(ghes.can_handle("https://ghe.example.com/a/b").unwrap());
    }

    #[test]
    fn test_api_root() {
        assert_eq!(api_root("https://ghe.example.com"), "https://ghe.example.com/api/v3");
        assert_eq!(api_root("https://ghe.example.com/api/v3/"), "https://ghe.example.com/api/v3");
    }

    #[tokio::test]
    async fn test_get_namespaces_prepends_personal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/user")
            .match_header("authorization", "Bearer token")
            .with_body(r#"{"id": 1, "login": "octocat", "name": "Octo Cat"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/user/orgs?per_page=100&page=1")
            .with_body(r#"[{"login": "daytonaio"}]"#)
            .create_async()
            .await;

        let namespaces = mocked(&server)
            .get_namespaces(&ListOptions::default())
            .await
            .unwrap();
        assert_eq!(namespaces.len(), 2);
        assert!(namespaces[0].is_personal());
        assert_eq!(namespaces[0].name, "octocat");
        assert_eq!(namespaces[1].id, "daytonaio");
    }

    #[tokio::test]
    async fn test_get_branch_by_commit_uses_compare() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/repos/a/b/branches?per_page=100&page=1")
            .with_body(
                r#"[{"name": "main", "commit": {"sha": "m1"}}, {"name": "dev", "commit": {"sha": "d1"}}]"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/repos/a/b/compare/main...abc")
            .with_body(r#"{"status": "diverged", "commits": []}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/repos/a/b/compare/dev...abc")
            .with_body(r#"{"status": "behind", "commits": []}"#)
            .create_async()
            .await;

        let ctx = StaticGitContext::from_parts("github.com", "a", "b", true).with_commit("abc");
        let branch = mocked(&server).get_branch_by_commit(&ctx).await.unwrap();
        assert_eq!(branch, "dev");
    }

    #[tokio::test]
    async fn test_repository_context_fills_default_branch_and_head() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/repos/a/b")
            .with_body(
                r#"{"name": "b", "html_url": "https://github.com/a/b", "default_branch": "trunk", "owner": {"login": "a"}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/repos/a/b/commits?per_page=1&sha=trunk")
            .with_body(r#"[{"sha": "cafe"}]"#)
            .create_async()
            .await;

        let repo = mocked(&server)
            .get_repository_context(&RepositoryContextRequest::new("https://github.com/a/b"))
            .await
            .unwrap();
        assert_eq!(repo.branch, "trunk");
        assert_eq!(repo.sha, "cafe");
        assert_eq!(repo.url, "https://github.com/a/b.git");
    }

    #[tokio::test]
    async fn test_pr_context_switches_to_head_repo() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/repos/a/b/pulls/3")
            .with_body(
                r#"{"title": "Fix", "head": {"ref": "fix", "sha": "f00", "repo": {"name": "b-fork", "html_url": "https://github.com/me/b-fork", "clone_url": "https://github.com/me/b-fork.git", "owner": {"login": "me"}}}}"#,
            )
            .create_async()
            .await;

        let mut ctx = StaticGitContext::from_parts("github.com", "a", "b", true);
        ctx.pr_number = Some(3);
        let resolved = mocked(&server).get_pr_context(&ctx).await.unwrap();
        assert_eq!(resolved.branch.as_deref(), Some("fix"));
        assert_eq!(resolved.owner, "me");
        assert_eq!(resolved.url, "https://github.com/me/b-fork.git");
    }

    #[tokio::test]
    async fn test_get_prebuild_webhook_matches_url() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/repos/a/b/hooks?per_page=100")
            .with_body(
                r#"[{"id": 1, "config": {"url": "https://other"}}, {"id": 2, "config": {"url": "https://hook"}}]"#,
            )
            .create_async()
            .await;

        let repo = GitRepository {
            owner: "a".to_string(),
            name: "b".to_string(),
            ..Default::default()
        };
        let id = mocked(&server)
            .get_prebuild_webhook(&repo, "https://hook")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_push_event() {
        let mut headers = HeaderMap::new();
        headers.insert("x-github-event", "push".parse().unwrap());
        let body = br#"{
            "ref": "refs/heads/main",
            "head_commit": {"id": "abc"},
            "repository": {"html_url": "https://github.com/a/b", "owner": {"name": "a"}},
            "commits": [{"added": ["x"], "modified": ["y"], "removed": []}]
        }"#;

        let event = provider().parse_event_data(&headers, body).unwrap().unwrap();
        assert_eq!(event.url, "https://github.com/a/b.git");
        assert_eq!(event.branch, "main");
        assert_eq!(event.sha, "abc");
        assert_eq!(event.affected_files, vec!["x", "y"]);

        headers.insert("x-github-event", "ping".parse().unwrap());
        assert!(provider().parse_event_data(&headers, body).unwrap().is_none());
    }
}
