//
//  git-providers
//  providers/bitbucket_server.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Bitbucket Server / Data Center Adapter
//!
//! Self-hosted Bitbucket through the REST 1.0 API rooted at `base_api_url`
//! (for example `https://bitbucket.example.com/rest`).
//!
//! ## Context Conventions
//!
//! Bitbucket Server repositories live in projects identified by a short key.
//! A parsed context carries:
//!
//! | Field | Value |
//! |-------|-------|
//! | `id` | project key |
//! | `name`, `owner` | repository slug |
//! | `url` | `{root}/scm/{key}/{slug}.git` |
//!
//! ## URL Forms
//!
//! - `{root}[/rest/api/{v}]/projects/{key}/repos/{slug}/{action}[/{identifier}]`
//!   with action `browse`, `commits`, `branches` or `pull-requests`
//! - `{root}/scm/{key}/{slug}.git`
//! - `?at=refs%2Fheads%2F{branch}` selects a branch, `commits?until={sha}` a commit
//!
//! ## Pagination
//!
//! Offset based (`start`/`limit`), see [`ServerPaginatedResponse`].

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{ProviderError, Result, ServerPaginatedResponse};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{host_with_port, parse_http, parse_pr_number};
use crate::context::{
    is_personal_namespace, GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository,
    GitUser, ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{header_is, GitProvider, MAX_PARENT_WALK_DEPTH};

static PROJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(https?://[^/]+)(?:/rest/api/[^/]+)?/projects/([^/]+)/repos/([^/?#]+)(?:/([^/?#]+))?(?:/([^?#]+))?",
    )
    .unwrap()
});

static SCM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://[^/]+)/scm/([^/]+)/([^/.?#]+)(?:\.git)?(?:/([^/?#]+))?(?:/([^?#]+))?")
        .unwrap()
});

const REF_HEADS: &str = "refs/heads/";

#[derive(Debug, Deserialize)]
struct Project {
    key: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(rename = "clone", default)]
    clone_links: Vec<Link>,
    #[serde(rename = "self", default)]
    self_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    slug: String,
    project: Project,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Branch {
    display_id: String,
    #[serde(default)]
    latest_commit: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRef {
    display_id: String,
    #[serde(default)]
    latest_commit: String,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pull {
    title: String,
    from_ref: PullRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: u64,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Webhook {
    id: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefChange {
    ref_id: String,
    to_hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Actor {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct RefsChangedEvent {
    actor: Actor,
    repository: Repository,
    #[serde(default)]
    changes: Vec<RefChange>,
}

/// Bitbucket Server or Data Center instance.
#[derive(Debug, Clone)]
pub struct BitbucketServerProvider {
    client: ApiClient,
    base_api_url: String,
}

impl BitbucketServerProvider {
    /// Creates an adapter for the instance whose REST root is `base_api_url`.
    pub fn new(username: &str, token: &str, base_api_url: &str) -> Result<Self> {
        let mut client = ApiClient::new(base_api_url)?;
        if !token.is_empty() {
            client = client.with_auth(AuthCredential::basic(username, token));
        }
        Ok(Self {
            client,
            base_api_url: base_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Web root of the instance: the API root without `/rest`.
    fn web_root(&self) -> &str {
        self.base_api_url
            .strip_suffix("/rest")
            .unwrap_or(&self.base_api_url)
    }

    fn source(&self) -> String {
        parse_http(&self.base_api_url)
            .ok()
            .and_then(|u| host_with_port(&u, &self.base_api_url).ok())
            .unwrap_or_default()
    }

    fn repo_path(key: &str, slug: &str) -> String {
        format!(
            "/api/1.0/projects/{}/repos/{}",
            urlencoding::encode(key),
            urlencoding::encode(slug)
        )
    }

    fn to_repository(&self, repo: Repository) -> GitRepository {
        let url = repo
            .links
            .clone_links
            .iter()
            .find(|l| matches!(l.name.as_deref(), Some("https" | "http")))
            .or_else(|| repo.links.self_links.first())
            .map(|l| l.href.clone())
            .unwrap_or_else(|| format!("{}/scm/{}/{}.git", self.web_root(), repo.project.key, repo.slug));

        GitRepository {
            id: repo.project.key,
            name: repo.slug.clone(),
            owner: repo.slug,
            url,
            source: self.source(),
            ..Default::default()
        }
    }

    async fn list_branches(
        &self,
        key: &str,
        slug: &str,
        options: &ListOptions,
    ) -> Result<Vec<Branch>> {
        let page: ServerPaginatedResponse<Branch> = self
            .client
            .get(&format!(
                "{}/branches?start={}&limit={}",
                Self::repo_path(key, slug),
                options.offset(),
                options.per_page()
            ))
            .await?;
        Ok(page.values)
    }

    /// Pages through a commit listing until `limit` ids are collected.
    async fn commit_ids(&self, path: &str, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut start = 0;

        loop {
            let separator = if path.contains('?') { '&' } else { '?' };
            let page: ServerPaginatedResponse<Commit> = self
                .client
                .get(&format!("{path}{separator}start={start}&limit=100"))
                .await?;
            let next_start = page.next_start();
            ids.extend(page.values.into_iter().map(|c| c.id));
            if ids.len() >= limit {
                ids.truncate(limit);
                break;
            }
            match next_start {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(ids)
    }
}

/// Reads the `at=refs/heads/...` and `until=...` query parameters.
fn query_refs(repo_url: &str) -> (Option<String>, Option<String>) {
    let Ok(parsed) = url::Url::parse(repo_url) else {
        return (None, None);
    };
    let mut branch = None;
    let mut until = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "at" => branch = Some(value.strip_prefix(REF_HEADS).unwrap_or(&value).to_string()),
            "until" => until = Some(value.into_owned()),
            _ => {}
        }
    }
    (branch, until)
}

#[async_trait]
impl GitProvider for BitbucketServerProvider {
    fn id(&self) -> &str {
        "bitbucket-server"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(self.base_api_url.contains(&ctx.source))
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let repo_url = repo_url.trim();
        let caps = PROJECT_PATTERN
            .captures(repo_url)
            .or_else(|| SCM_PATTERN.captures(repo_url))
            .ok_or_else(|| {
                ProviderError::parse_with(repo_url, "could not extract project key and repository")
            })?;

        let root = &caps[1];
        let key = &caps[2];
        let slug = caps[3].trim_end_matches(".git");
        let action = caps.get(4).map(|m| m.as_str());
        let identifier = caps.get(5).map(|m| m.as_str().trim_end_matches('/'));

        let parsed = parse_http(root)?;
        let mut ctx = StaticGitContext {
            id: key.to_string(),
            name: slug.to_string(),
            owner: slug.to_string(),
            url: format!("{root}/scm/{key}/{slug}.git"),
            source: host_with_port(&parsed, repo_url)?,
            ..Default::default()
        };

        let (at, until) = query_refs(repo_url);

        match action {
            Some("pull-requests") => {
                if let Some(number) = identifier {
                    ctx.pr_number = Some(parse_pr_number(repo_url, Some(&number))?);
                }
            }
            Some("browse") => {
                ctx.branch = at;
                ctx.path = identifier.filter(|p| !p.is_empty()).map(str::to_string);
            }
            Some("commits") => {
                if let Some(sha) = identifier.map(str::to_string).or(until) {
                    ctx = ctx.with_commit(sha);
                }
            }
            _ => {
                ctx.branch = at;
            }
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let Some(caps) = SCM_PATTERN.captures(&request.url) else {
            return request.url.trim_end_matches(".git").to_string();
        };
        let repo = format!("{}/projects/{}/repos/{}", &caps[1], &caps[2], &caps[3]);

        if let Some(pr) = request.pr_number {
            return format!("{repo}/pull-requests/{pr}");
        }

        let branch = request.branch.as_deref().filter(|b| !b.is_empty());
        if let Some(sha) = branch.filter(|b| request.sha.as_deref() == Some(*b)) {
            return format!("{repo}/commits/{sha}");
        }

        let mut url = format!("{repo}/browse");
        if let Some(path) = request.path.as_deref().filter(|p| !p.is_empty()) {
            url.push('/');
            url.push_str(path);
        }
        if let Some(branch) = branch {
            url.push_str(&format!("?at={}", urlencoding::encode(&format!("{REF_HEADS}{branch}"))));
        }
        url
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let page: ServerPaginatedResponse<Project> = self
            .client
            .get(&format!(
                "/api/1.0/projects?start={}&limit={}",
                options.offset(),
                options.per_page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(&user.username)];
        namespaces.extend(page.values.into_iter().map(|p| GitNamespace::new(p.key, p.name)));
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let path = if is_personal_namespace(namespace) {
            "/api/1.0/repos".to_string()
        } else {
            format!("/api/1.0/projects/{}/repos", urlencoding::encode(namespace))
        };

        let page: ServerPaginatedResponse<Repository> = self
            .client
            .get(&format!(
                "{path}?start={}&limit={}",
                options.offset(),
                options.per_page()
            ))
            .await?;

        Ok(page
            .values
            .into_iter()
            .map(|r| self.to_repository(r))
            .collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let branches = self.list_branches(namespace_id, repository_id, options).await?;
        Ok(branches
            .into_iter()
            .map(|b| GitBranch {
                name: b.display_id,
                sha: b.latest_commit,
            })
            .collect())
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let page: ServerPaginatedResponse<Pull> = self
            .client
            .get(&format!(
                "{}/pull-requests?state=OPEN&start={}&limit={}",
                Self::repo_path(namespace_id, repository_id),
                options.offset(),
                options.per_page()
            ))
            .await?;

        Ok(page
            .values
            .into_iter()
            .map(|pr| {
                let source = self.to_repository(pr.from_ref.repository);
                GitPullRequest {
                    name: pr.title,
                    branch: pr.from_ref.display_id,
                    sha: pr.from_ref.latest_commit,
                    source_repo_id: source.id,
                    source_repo_url: source.url,
                    source_repo_owner: source.owner,
                    source_repo_name: source.name,
                }
            })
            .collect())
    }

    async fn get_user(&self) -> Result<GitUser> {
        // no "current user" endpoint; the username comes back as a response header
        let (_, headers): (serde_json::Value, HeaderMap) = self
            .client
            .get_with_headers("/api/1.0/application-properties")
            .await?;
        let username = headers
            .get("x-ausername")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::NotFound("X-AUSERNAME header".to_string()))?
            .to_string();

        let user: User = self
            .client
            .get(&format!("/api/1.0/users/{}", urlencoding::encode(&username)))
            .await?;

        Ok(GitUser {
            id: user.id.to_string(),
            username,
            name: user.display_name,
            email: user.email_address.unwrap_or_default(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let mut path = format!("{}/commits?limit=1", Self::repo_path(&ctx.id, &ctx.name));
        if let Some(until) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&until={}", urlencoding::encode(until)));
        }

        let page: ServerPaginatedResponse<Commit> = self.client.get(&path).await?;
        page.values
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| ProviderError::NotFound(format!("commits of {}/{}", ctx.id, ctx.name)))
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self
            .list_branches(&ctx.id, &ctx.name, &ListOptions::default())
            .await?;

        for branch in branches {
            if branch.latest_commit == sha {
                return Ok(branch.display_id);
            }
            let path = format!(
                "{}/commits?until={}",
                Self::repo_path(&ctx.id, &ctx.name),
                urlencoding::encode(&branch.latest_commit)
            );
            match self.commit_ids(&path, MAX_PARENT_WALK_DEPTH).await {
                Ok(ids) if ids.contains(&sha) => return Ok(branch.display_id),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping branch {}: {}", branch.display_id, e),
            }
        }

        Err(ProviderError::BranchNotFound { sha })
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        self.list_branches(&ctx.id, &ctx.name, &ListOptions::default())
            .await?
            .into_iter()
            .find(|b| b.is_default)
            .map(|b| b.display_id)
            .ok_or_else(|| ProviderError::NotFound(format!("default branch of {}/{}", ctx.id, ctx.name)))
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: Pull = self
            .client
            .get(&format!(
                "{}/pull-requests/{number}",
                Self::repo_path(&ctx.id, &ctx.name)
            ))
            .await?;
        let source = pr.from_ref.repository;

        let mut resolved = ctx.clone();
        resolved.url = format!("{}/scm/{}/{}.git", self.web_root(), source.project.key, source.slug);
        resolved.id = source.project.key;
        resolved.name = source.slug.clone();
        resolved.owner = source.slug;
        resolved.branch = Some(pr.from_ref.display_id);
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({
            "name": "prebuild trigger",
            "url": endpoint_url,
            "events": ["repo:refs_changed"],
            "active": true,
        });
        let hook: Webhook = self
            .client
            .post(&format!("{}/webhooks", Self::repo_path(&repo.id, &repo.name)), &body)
            .await?;
        Ok(hook.id.to_string())
    }

    async fn get_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<Option<String>> {
        let page: ServerPaginatedResponse<Webhook> = self
            .client
            .get(&format!("{}/webhooks", Self::repo_path(&repo.id, &repo.name)))
            .await?;
        Ok(page
            .values
            .into_iter()
            .find(|h| h.url == endpoint_url)
            .map(|h| h.id.to_string()))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        let id: u64 = id
            .parse()
            .map_err(|_| ProviderError::Config(format!("invalid webhook id: {id}")))?;
        self.client
            .delete(&format!("{}/webhooks/{id}", Self::repo_path(&repo.id, &repo.name)))
            .await
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let path = format!(
            "{}/commits?since={}&until={}",
            Self::repo_path(&repo.id, &repo.name),
            urlencoding::encode(initial_sha),
            urlencoding::encode(current_sha)
        );
        Ok(self.commit_ids(&path, MAX_PARENT_WALK_DEPTH).await?.len())
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-Event-Key", "repo:refs_changed") {
            return Ok(None);
        }

        let event: RefsChangedEvent = serde_json::from_slice(body)?;
        let Some(change) = event
            .changes
            .iter()
            .find(|c| c.ref_id.starts_with(REF_HEADS))
        else {
            return Ok(None);
        };

        Ok(Some(GitEventData {
            url: format!(
                "{}/scm/{}/{}.git",
                self.web_root(),
                event.repository.project.key.to_lowercase(),
                event.repository.slug
            ),
            branch: change.ref_id.trim_start_matches(REF_HEADS).to_string(),
            sha: change.to_hash.clone(),
            owner: event.actor.display_name,
            affected_files: Vec::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> BitbucketServerProvider {
        BitbucketServerProvider::new("admin", "token", "https://bitbucket.example.com/rest").unwrap()
    }

    #[test]
    fn test_parse_commits_until() {
        let ctx = provider()
            .parse_static_git_context(
                "https://bitbucket.example.com/rest/api/latest/projects/PK/repos/RN/commits?until=SHA1",
            )
            .unwrap();
        assert_eq!(ctx.id, "PK");
        assert_eq!(ctx.name, "RN");
        assert_eq!(ctx.owner, "RN");
        assert_eq!(ctx.sha.as_deref(), Some("SHA1"));
        assert!(ctx.is_commit_ref());
        assert_eq!(ctx.url, "https://bitbucket.example.com/scm/PK/RN.git");
        assert_eq!(ctx.source, "bitbucket.example.com");
    }

    #[test]
    fn test_parse_scm_clone_url() {
        let ctx = provider()
            .parse_static_git_context("https://bitbucket.example.com/scm/pk/repo.git")
            .unwrap();
        assert_eq!(ctx.id, "pk");
        assert_eq!(ctx.name, "repo");
        assert!(ctx.branch.is_none() && ctx.path.is_none());
    }

    #[test]
    fn test_parse_browse_with_branch() {
        let ctx = provider()
            .parse_static_git_context(
                "https://bitbucket.example.com/projects/PK/repos/RN/browse/src/main.rs?at=refs%2Fheads%2Fdev",
            )
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert_eq!(ctx.path.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn test_parse_pull_request() {
        let ctx = provider()
            .parse_static_git_context("https://bitbucket.example.com/projects/PK/repos/RN/pull-requests/7")
            .unwrap();
        assert_eq!(ctx.pr_number, Some(7));

        assert!(provider()
            .parse_static_git_context("https://bitbucket.example.com/projects/PK/repos/RN/pull-requests/x")
            .is_err());
    }

    #[test]
    fn test_parse_rejects_foreign_url() {
        let err = provider()
            .parse_static_git_context("https://github.com/a/b")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        for url in [
            "https://bitbucket.example.com/projects/PK/repos/RN/browse",
            "https://bitbucket.example.com/projects/PK/repos/RN/browse?at=refs%2Fheads%2Fdev",
            "https://bitbucket.example.com/projects/PK/repos/RN/browse/docs/a.md?at=refs%2Fheads%2Fdev",
            "https://bitbucket.example.com/projects/PK/repos/RN/commits/abc123",
            "https://bitbucket.example.com/projects/PK/repos/RN/pull-requests/3",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            let built = p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx));
            assert_eq!(built, url);
        }
    }

    #[test]
    fn test_can_handle() {
        let p = provider();
        assert!(p.can_handle("https://bitbucket.example.com/scm/pk/repo.git").unwrap());
        assert!(!p.can_handle("https://other.example.com/scm/pk/repo.git").unwrap());
    }

    #[tokio::test]
    async fn test_get_user_from_header() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/1.0/application-properties")
            .with_header("x-ausername", "jdoe")
            .with_body(r#"{"version": "8.9.0"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/1.0/users/jdoe")
            .with_body(r#"{"id": 12, "displayName": "J Doe", "emailAddress": "j@x.io"}"#)
            .create_async()
            .await;

        let p = BitbucketServerProvider::new("jdoe", "t", &server.url()).unwrap();
        let user = p.get_user().await.unwrap();
        assert_eq!(user.id, "12");
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.email, "j@x.io");
    }

    #[tokio::test]
    async fn test_default_and_commit_branch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/branches?start=0&limit=100")
            .with_body(
                r#"{"values": [
                    {"displayId": "main", "latestCommit": "m2", "isDefault": true},
                    {"displayId": "feature", "latestCommit": "f2", "isDefault": false}
                ], "isLastPage": true}"#,
            )
            .expect_at_least(2)
            .create_async()
            .await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/commits?until=m2&start=0&limit=100")
            .with_body(r#"{"values": [{"id": "m2"}, {"id": "m1"}], "isLastPage": true}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/commits?until=f2&start=0&limit=100")
            .with_body(r#"{"values": [{"id": "f2"}, {"id": "f1"}], "isLastPage": true}"#)
            .create_async()
            .await;

        let p = BitbucketServerProvider::new("u", "t", &server.url()).unwrap();
        let ctx = p
            .parse_static_git_context(&format!("{}/projects/PK/repos/RN/commits/f1", server.url()))
            .unwrap();

        assert_eq!(p.get_default_branch(&ctx).await.unwrap(), "main");
        assert_eq!(p.get_branch_by_commit(&ctx).await.unwrap(), "feature");
    }

    #[tokio::test]
    async fn test_commit_ids_follow_next_page_start() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/commits?until=c4&start=0&limit=100")
            .with_body(
                r#"{"values": [{"id": "c4"}, {"id": "c3"}], "isLastPage": false, "nextPageStart": 2}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/commits?until=c4&start=2&limit=100")
            .with_body(r#"{"values": [{"id": "c2"}, {"id": "c1"}], "isLastPage": true}"#)
            .create_async()
            .await;

        let p = BitbucketServerProvider::new("u", "t", &server.url()).unwrap();
        let ids = p
            .commit_ids("/api/1.0/projects/PK/repos/RN/commits?until=c4", 10)
            .await
            .unwrap();
        assert_eq!(ids, vec!["c4", "c3", "c2", "c1"]);

        let ids = p
            .commit_ids("/api/1.0/projects/PK/repos/RN/commits?until=c4", 1)
            .await
            .unwrap();
        assert_eq!(ids, vec!["c4"]);
    }

    #[tokio::test]
    async fn test_pr_context_uses_source_repository() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/1.0/projects/PK/repos/RN/pull-requests/5")
            .with_body(
                r#"{"title": "Fix", "fromRef": {"displayId": "fix", "latestCommit": "abc",
                    "repository": {"slug": "fork", "project": {"key": "~JDOE"}}}}"#,
            )
            .create_async()
            .await;

        let p = BitbucketServerProvider::new("u", "t", &server.url()).unwrap();
        let mut ctx = p
            .parse_static_git_context(&format!("{}/projects/PK/repos/RN", server.url()))
            .unwrap();
        ctx.pr_number = Some(5);

        let resolved = p.get_pr_context(&ctx).await.unwrap();
        assert_eq!(resolved.id, "~JDOE");
        assert_eq!(resolved.name, "fork");
        assert_eq!(resolved.branch.as_deref(), Some("fix"));
    }

    #[test]
    fn test_parse_refs_changed_event() {
        let mut headers = HeaderMap::new();
        headers.insert("x-event-key", "repo:refs_changed".parse().unwrap());
        let body = br#"{
            "actor": {"displayName": "J Doe"},
            "repository": {"slug": "rn", "project": {"key": "PK"}},
            "changes": [{"refId": "refs/heads/main", "toHash": "abc"}]
        }"#;
        let event = provider().parse_event_data(&headers, body).unwrap().unwrap();
        assert_eq!(event.url, "https://bitbucket.example.com/scm/pk/rn.git");
        assert_eq!(event.branch, "main");
        assert_eq!(event.sha, "abc");
        assert_eq!(event.owner, "J Doe");

        headers.insert("x-event-key", "pr:opened".parse().unwrap());
        assert!(provider().parse_event_data(&headers, body).unwrap().is_none());
    }
}
