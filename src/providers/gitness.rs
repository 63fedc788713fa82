//
//  git-providers
//  providers/gitness.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Gitness Adapter
//!
//! Self-hosted Gitness (Harness Open Source) through the `/api/v1` REST API
//! with a bearer token.
//!
//! Repositories live in spaces. The web UI serves `/{space}/{repo}/...` while
//! clone URLs carry a `/git/` prefix: `/git/{space}/{repo}.git`. API calls
//! address a repository by its URL-encoded ref, `space%2Frepo`.
//!
//! | Path after the repository | Effect |
//! |---------------------------|--------|
//! | `pulls/{n}` | `pr_number` |
//! | `files/{branch}[/~/{path}]` | `branch` (and `path`); `~` ends the branch name |
//! | `commits/{branch}` | `branch` |
//! | `commit/{sha}` | `branch` and `sha` |

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{
    host_with_port, join_segments, parse_http, parse_pr_number, parse_static_git_context,
    path_segments, strip_git_suffix,
};
use crate::context::{
    is_personal_namespace, GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository,
    GitUser, ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::gitea::api_root;
use crate::providers::{resolve_namespace, web_url, GitProvider, MAX_PARENT_WALK_DEPTH};

const PUSH_TRIGGER: &str = "branch_updated";

#[derive(Debug, Deserialize)]
struct User {
    uid: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct Space {
    identifier: String,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct Membership {
    space: Space,
}

#[derive(Debug, Deserialize)]
struct Repository {
    identifier: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    git_url: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitList {
    #[serde(default)]
    commits: Vec<Commit>,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    title: String,
    source_branch: String,
    #[serde(default)]
    source_sha: String,
    #[serde(default)]
    source_repo_id: u64,
}

#[derive(Debug, Deserialize)]
struct Webhook {
    id: u64,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct EventCommit {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EventRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EventRepo {
    git_url: String,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    trigger: String,
    #[serde(rename = "ref")]
    reference: EventRef,
    repo: EventRepo,
    sha: String,
    #[serde(default)]
    commits: Vec<EventCommit>,
}

/// `{scheme}://{host}/git/{space}/{repo}.git`
pub fn gitness_clone_url(scheme: &str, host: &str, space: &str, repo: &str) -> String {
    format!("{scheme}://{host}/git/{space}/{repo}.git")
}

/// Web URL of a repository: the clone URL without `.git` and the `/git/` prefix.
fn repo_web_url(clone: &str) -> String {
    let trimmed = web_url(clone);
    let Ok(mut parsed) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    if let Some(rest) = parsed.path().strip_prefix("/git/").map(|p| format!("/{p}")) {
        parsed.set_path(&rest);
    }
    parsed.to_string()
}

/// Space owning a repository path (`space/sub/repo` -> `space/sub`).
fn space_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(space, _)| space).unwrap_or_default()
}

fn repo_ref(space: &str, repo: &str) -> String {
    format!("/repos/{}", urlencoding::encode(&format!("{space}/{repo}")))
}

/// Gitness instance.
#[derive(Debug, Clone)]
pub struct GitnessProvider {
    client: ApiClient,
    base_url: String,
}

impl GitnessProvider {
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let client = ApiClient::new(api_root(base_url))?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::bearer))
            .with_header("Accept", "application/json");
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn list_branches(&self, space: &str, repo: &str, options: &ListOptions) -> Result<Vec<GitBranch>> {
        let branches: Vec<Branch> = self
            .client
            .get(&format!(
                "{}/branches?page={}&limit={}",
                repo_ref(space, repo),
                options.page(),
                options.per_page()
            ))
            .await?;
        Ok(branches
            .into_iter()
            .map(|b| GitBranch {
                name: b.name,
                sha: b.sha,
            })
            .collect())
    }

    /// Commit ids reachable from `git_ref`, newest first, up to `limit`.
    async fn history(&self, space: &str, repo: &str, git_ref: &str, limit: usize) -> Result<Vec<String>> {
        let per_page = 100;
        let mut page = 1;
        let mut shas = Vec::new();

        while shas.len() < limit {
            let list: CommitList = self
                .client
                .get(&format!(
                    "{}/commits?git_ref={}&page={page}&limit={per_page}&include_stats=false",
                    repo_ref(space, repo),
                    urlencoding::encode(git_ref)
                ))
                .await?;
            let fetched = list.commits.len();
            shas.extend(list.commits.into_iter().map(|c| c.sha));
            if fetched < per_page {
                break;
            }
            page += 1;
        }

        shas.truncate(limit);
        Ok(shas)
    }
}

#[async_trait]
impl GitProvider for GitnessProvider {
    fn id(&self) -> &str {
        "gitness"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(self.base_url.contains(&ctx.source))
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let mut ctx = parse_static_git_context(repo_url)?;
        if !repo_url.trim().starts_with("http") {
            return Ok(ctx);
        }

        let parsed = parse_http(repo_url.trim())?;
        let mut segments = path_segments(parsed.path());
        if segments.first() == Some(&"git") {
            segments.remove(0);
        }
        if segments.len() < 2 {
            return Err(ProviderError::parse_with(repo_url, "expected space and repository"));
        }

        let space = segments[0];
        let name = strip_git_suffix(segments[1]);
        let host = host_with_port(&parsed, repo_url)?;
        ctx.owner = space.to_string();
        ctx.name = name.to_string();
        ctx.id = name.to_string();
        ctx.url = gitness_clone_url(parsed.scheme(), &host, space, name);
        ctx.path = None;

        let parts = &segments[2..];
        match parts {
            ["pulls", rest @ ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, rest.first())?);
            }
            ["files", rest @ ..] if !rest.is_empty() => {
                let tilde = rest.iter().position(|s| *s == "~");
                let (branch, path) = match tilde {
                    Some(i) => (&rest[..i], &rest[i + 1..]),
                    None => (rest, &[][..]),
                };
                ctx.branch = join_segments(branch);
                ctx.path = join_segments(path);
            }
            ["commits", branch, ..] => {
                ctx.branch = Some(branch.to_string());
            }
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            _ => ctx.path = join_segments(parts),
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let url = repo_web_url(&request.url);

        if let Some(pr) = request.pr_number {
            return format!("{url}/pulls/{pr}");
        }

        let path = request.path.as_deref().filter(|p| !p.is_empty());
        match request.branch.as_deref().filter(|b| !b.is_empty()) {
            Some(sha) if request.sha.as_deref() == Some(sha) && path.is_none() => {
                format!("{url}/commit/{sha}")
            }
            Some(branch) => match path {
                Some(path) => format!("{url}/files/{branch}/~/{path}"),
                None => format!("{url}/files/{branch}"),
            },
            None => match path {
                Some(path) => format!("{url}/files/main/~/{path}"),
                None => url,
            },
        }
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let memberships: Vec<Membership> = self
            .client
            .get(&format!(
                "/user/memberships?order=asc&sort=identifier&page={}&limit={}",
                options.page(),
                options.per_page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(&user.username)];
        namespaces.extend(memberships.into_iter().map(|m| {
            let id = if m.space.path.is_empty() {
                m.space.identifier.clone()
            } else {
                m.space.path
            };
            GitNamespace::new(id, m.space.identifier)
        }));
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let space = if is_personal_namespace(namespace) {
            self.get_user().await?.username
        } else {
            namespace.to_string()
        };

        let repos: Vec<Repository> = self
            .client
            .get(&format!(
                "/spaces/{}/+/repos?page={}&limit={}",
                urlencoding::encode(&space),
                options.page(),
                options.per_page()
            ))
            .await?;

        Ok(repos
            .into_iter()
            .map(|r| {
                let source = url::Url::parse(&r.git_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_default();
                let owner = match space_of(&r.path) {
                    "" => space.clone(),
                    s => s.to_string(),
                };
                GitRepository {
                    id: r.identifier.clone(),
                    name: r.identifier,
                    url: r.git_url,
                    branch: r.default_branch,
                    owner,
                    source,
                    ..Default::default()
                }
            })
            .collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let space = resolve_namespace(self, namespace_id).await?;
        self.list_branches(&space, repository_id, options).await
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let space = resolve_namespace(self, namespace_id).await?;
        let pulls: Vec<PullRequest> = self
            .client
            .get(&format!(
                "{}/pullreq?state=open&page={}&limit={}",
                repo_ref(&space, repository_id),
                options.page(),
                options.per_page()
            ))
            .await?;

        let root = url::Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Config(format!("invalid Gitness URL {}: {e}", self.base_url)))?;
        let host = host_with_port(&root, &self.base_url)?;
        let clone = gitness_clone_url(root.scheme(), &host, &space, repository_id);

        Ok(pulls
            .into_iter()
            .map(|pr| GitPullRequest {
                name: pr.title,
                branch: pr.source_branch,
                sha: pr.source_sha,
                source_repo_id: pr.source_repo_id.to_string(),
                source_repo_url: clone.clone(),
                source_repo_owner: space.clone(),
                source_repo_name: repository_id.to_string(),
            })
            .collect())
    }

    async fn get_user(&self) -> Result<GitUser> {
        let user: User = self.client.get("/user").await?;
        Ok(GitUser {
            id: user.uid.clone(),
            username: user.uid,
            name: user.display_name,
            email: user.email,
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let mut path = format!(
            "{}/commits?page=1&limit=1&include_stats=false",
            repo_ref(&ctx.owner, &ctx.name)
        );
        // without git_ref Gitness lists the default branch
        if let Some(reference) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&git_ref={}", urlencoding::encode(reference)));
        }

        let list: CommitList = self.client.get(&path).await?;
        list.commits
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

        for branch in branches {
            if branch.sha == sha {
                return Ok(branch.name);
            }
            match self
                .history(&ctx.owner, &ctx.name, &branch.name, MAX_PARENT_WALK_DEPTH)
                .await
            {
                Ok(history) if history.contains(&sha) => return Ok(branch.name),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping branch {}: {}", branch.name, e),
            }
        }

        Err(ProviderError::BranchNotFound { sha })
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo: Repository = self.client.get(&repo_ref(&ctx.owner, &ctx.name)).await?;
        Ok(repo.default_branch)
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: PullRequest = self
            .client
            .get(&format!("{}/pullreq/{number}", repo_ref(&ctx.owner, &ctx.name)))
            .await?;

        let mut resolved = ctx.clone();
        resolved.branch = Some(pr.source_branch);
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({
            "identifier": format!("prebuild-{}", repo.id),
            "display_name": "Prebuild webhook",
            "url": endpoint_url,
            "enabled": true,
            "insecure": false,
            "triggers": [PUSH_TRIGGER],
        });
        let hook: Webhook = self
            .client
            .post(&format!("{}/webhooks", repo_ref(&repo.owner, &repo.name)), &body)
            .await?;
        Ok(hook.id.to_string())
    }

    async fn get_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<Option<String>> {
        let hooks: Vec<Webhook> = self
            .client
            .get(&format!(
                "{}/webhooks?page=1&limit=100",
                repo_ref(&repo.owner, &repo.name)
            ))
            .await?;
        Ok(hooks
            .into_iter()
            .find(|h| h.url == endpoint_url)
            .map(|h| h.id.to_string()))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        self.client
            .delete(&format!(
                "{}/webhooks/{}",
                repo_ref(&repo.owner, &repo.name),
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
        let history = self
            .history(&repo.owner, &repo.name, current_sha, MAX_PARENT_WALK_DEPTH)
            .await?;
        history
            .iter()
            .position(|sha| sha == initial_sha)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("{initial_sha} in the history of {current_sha}"))
            })
    }

    fn parse_event_data(&self, _headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        let event: WebhookEvent = serde_json::from_slice(body)?;
        if event.trigger != PUSH_TRIGGER {
            return Ok(None);
        }

        let branch = event
            .reference
            .name
            .strip_prefix("refs/heads/")
            .unwrap_or(&event.reference.name)
            .to_string();

        Ok(Some(GitEventData {
            url: event.repo.git_url,
            branch,
            sha: event.sha,
            owner: space_of(&event.repo.path).to_string(),
            affected_files: event
                .commits
                .into_iter()
                .flat_map(|c| c.modified.into_iter().chain(c.added).chain(c.removed))
                .collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GitnessProvider {
        GitnessProvider::new("token", "https://gitness.example.com").unwrap()
    }

    #[test]
    fn test_parse_clone_url() {
        let ctx = provider()
            .parse_static_git_context("https://gitness.example.com/git/team/app.git")
            .unwrap();
        assert_eq!(ctx.owner, "team");
        assert_eq!(ctx.name, "app");
        assert_eq!(ctx.url, "https://gitness.example.com/git/team/app.git");
        assert!(ctx.path.is_none());
    }

    #[test]
    fn test_parse_web_forms() {
        let p = provider();
        let base = "https://gitness.example.com/team/app";

        let ctx = p
            .parse_static_git_context(&format!("{base}/files/feature/login/~/src/main.rs"))
            .unwrap();
        assert_eq!(ctx.url, "https://gitness.example.com/git/team/app.git");
        assert_eq!(ctx.branch.as_deref(), Some("feature/login"));
        assert_eq!(ctx.path.as_deref(), Some("src/main.rs"));

        let ctx = p.parse_static_git_context(&format!("{base}/files/dev")).unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert!(ctx.path.is_none());

        let ctx = p.parse_static_git_context(&format!("{base}/commits/dev")).unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert!(ctx.sha.is_none());

        let ctx = p.parse_static_git_context(&format!("{base}/commit/abc")).unwrap();
        assert!(ctx.is_commit_ref());

        let ctx = p.parse_static_git_context(&format!("{base}/pulls/7")).unwrap();
        assert_eq!(ctx.pr_number, Some(7));
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        for url in [
            "https://gitness.example.com/team/app",
            "https://gitness.example.com/team/app/pulls/7",
            "https://gitness.example.com/team/app/files/dev",
            "https://gitness.example.com/team/app/files/dev/~/docs/a.md",
            "https://gitness.example.com/team/app/commit/abc",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            let built = p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx));
            assert_eq!(built, url);
        }

        let mut request = RepositoryContextRequest::new("https://gitness.example.com/git/team/app.git");
        request.path = Some("README.md".to_string());
        assert_eq!(
            p.get_url_from_context(&request),
            "https://gitness.example.com/team/app/files/main/~/README.md"
        );
    }

    #[test]
    fn test_can_handle() {
        let p = provider();
        assert!(p.can_handle("https://gitness.example.com/team/app").unwrap());
        assert!(!p.can_handle("https://github.com/team/app").unwrap());
    }

    #[tokio::test]
    async fn test_branch_by_commit_scans_history() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/repos/team%2Fapp/branches?page=1&limit=100")
            .match_header("authorization", "Bearer token")
            .with_body(r#"[{"name": "main", "sha": "m1"}, {"name": "dev", "sha": "d2"}]"#)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                "/api/v1/repos/team%2Fapp/commits?git_ref=main&page=1&limit=100&include_stats=false",
            )
            .with_body(r#"{"commits": [{"sha": "m1"}]}"#)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                "/api/v1/repos/team%2Fapp/commits?git_ref=dev&page=1&limit=100&include_stats=false",
            )
            .with_body(r#"{"commits": [{"sha": "d2"}, {"sha": "target"}]}"#)
            .create_async()
            .await;

        let p = GitnessProvider::new("token", &server.url()).unwrap();
        let ctx = StaticGitContext::from_parts("localhost", "team", "app", false).with_commit("target");
        assert_eq!(p.get_branch_by_commit(&ctx).await.unwrap(), "dev");
    }

    #[tokio::test]
    async fn test_register_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/repos/team%2Fapp/webhooks")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"url": "https://hooks.example.com", "triggers": ["branch_updated"]}"#.to_string(),
            ))
            .with_status(201)
            .with_body(r#"{"id": 12, "url": "https://hooks.example.com"}"#)
            .create_async()
            .await;

        let p = GitnessProvider::new("token", &server.url()).unwrap();
        let repo = GitRepository {
            id: "app".to_string(),
            name: "app".to_string(),
            owner: "team".to_string(),
            ..Default::default()
        };
        let id = p
            .register_prebuild_webhook(&repo, "https://hooks.example.com")
            .await
            .unwrap();
        assert_eq!(id, "12");
        mock.assert_async().await;
    }

    #[test]
    fn test_parse_event_data() {
        let body = br#"{
            "trigger": "branch_updated",
            "ref": {"name": "refs/heads/main"},
            "repo": {"git_url": "https://gitness.example.com/git/team/app.git", "path": "team/app"},
            "sha": "abc",
            "commits": [{"added": ["a"], "modified": ["m"], "removed": []}]
        }"#;
        let event = provider()
            .parse_event_data(&HeaderMap::new(), body)
            .unwrap()
            .unwrap();
        assert_eq!(event.branch, "main");
        assert_eq!(event.owner, "team");
        assert_eq!(event.affected_files, vec!["m", "a"]);

        let other = br#"{"trigger": "pullreq_created", "ref": {"name": "x"}, "repo": {"git_url": ""}, "sha": ""}"#;
        assert!(provider().parse_event_data(&HeaderMap::new(), other).unwrap().is_none());
    }
}
