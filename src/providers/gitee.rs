//
//  git-providers
//  providers/gitee.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Gitee Adapter
//!
//! gitee.com through the v5 REST API with a bearer token. Gitee has no
//! webhook support here; the webhook operations report
//! [`ProviderError::Unsupported`].
//!
//! | Path after the repository | Effect |
//! |---------------------------|--------|
//! | `pulls/{n}` | `pr_number` |
//! | `tree/{branch}`, `commits/{branch}` | `branch` |
//! | `blob/{ref}/{path}` | `path`, plus `branch` (and `sha` for a full commit id) |
//! | `commit/{sha}` | `branch` and `sha` |

use async_trait::async_trait;
use serde::Deserialize;

use crate::api::common::{ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{is_full_sha, parse_pr_number, parse_static_git_context, path_segments};
use crate::context::{
    is_personal_namespace, GitBranch, GitNamespace, GitPullRequest, GitRepository, GitUser,
    ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{resolve_namespace, web_url, GitProvider, MAX_PARENT_WALK_DEPTH};

const GITEE_API: &str = "https://gitee.com/api/v5";
const GITEE_HOST: &str = "gitee.com";

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    login: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    path: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    html_url: String,
    #[serde(default)]
    default_branch: String,
    owner: Owner,
}

#[derive(Debug, Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    commit: Sha,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    sha: String,
    repo: Repo,
}

#[derive(Debug, Deserialize)]
struct Pull {
    title: String,
    head: PullHead,
}

fn to_repository(repo: Repo) -> GitRepository {
    GitRepository {
        id: repo.name.clone(),
        name: repo.name,
        url: repo.html_url,
        branch: repo.default_branch,
        owner: repo.owner.login,
        source: GITEE_HOST.to_string(),
        ..Default::default()
    }
}

fn repo_path(owner: &str, name: &str) -> String {
    format!(
        "/repos/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(name)
    )
}

/// gitee.com
#[derive(Debug, Clone)]
pub struct GiteeProvider {
    client: ApiClient,
}

impl GiteeProvider {
    /// `base_api_url` only exists to point the adapter at a test server.
    pub fn new(token: &str, base_api_url: Option<&str>) -> Result<Self> {
        let client = ApiClient::new(base_api_url.unwrap_or(GITEE_API))?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::bearer))
            .with_header("Accept", "application/json");
        Ok(Self { client })
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
                sha: b.commit.sha,
            })
            .collect())
    }

    /// Lists commit ids reachable from `reference`, newest first, up to `limit`.
    async fn history(&self, owner: &str, name: &str, reference: &str, limit: usize) -> Result<Vec<String>> {
        let per_page = 100;
        let mut page = 1;
        let mut shas = Vec::new();

        while shas.len() < limit {
            let commits: Vec<Sha> = self
                .client
                .get(&format!(
                    "{}/commits?sha={}&page={page}&per_page={per_page}",
                    repo_path(owner, name),
                    urlencoding::encode(reference)
                ))
                .await?;
            let fetched = commits.len();
            shas.extend(commits.into_iter().map(|c| c.sha));
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
impl GitProvider for GiteeProvider {
    fn id(&self) -> &str {
        "gitee"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(ctx.source == GITEE_HOST)
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
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            ["commits" | "tree", branch, ..] => {
                ctx.branch = Some(branch.to_string());
            }
            ["blob", reference, rest @ ..] => {
                if is_full_sha(reference) {
                    ctx = ctx.with_commit(*reference);
                } else {
                    ctx.branch = Some(reference.to_string());
                }
                ctx.path = Some(rest.join("/"));
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

        let is_commit = request.branch.is_some() && request.branch == request.sha;
        match (
            request.branch.as_deref().filter(|b| !b.is_empty()),
            request.path.as_deref().filter(|p| !p.is_empty()),
        ) {
            (Some(reference), Some(path)) => format!("{url}/blob/{reference}/{path}"),
            (Some(sha), None) if is_commit => format!("{url}/commit/{sha}"),
            (Some(branch), None) => format!("{url}/tree/{branch}"),
            (None, Some(path)) => format!("{url}/blob/master/{path}"),
            (None, None) => url.to_string(),
        }
    }

    async fn get_namespaces(&self, _options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let namespaces: Vec<Namespace> = self.client.get("/user/namespaces").await?;

        let mut result = vec![GitNamespace::personal(&user.username)];
        result.extend(
            namespaces
                .into_iter()
                .filter(|n| n.path != user.username)
                .map(|n| GitNamespace::new(n.path, n.name)),
        );
        Ok(result)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let query = format!("page={}&per_page={}", options.page(), options.per_page());
        let path = if is_personal_namespace(namespace) {
            format!("/user/repos?type=owner&{query}")
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
        _options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let owner = resolve_namespace(self, namespace_id).await?;
        self.list_branches(&owner, repository_id).await
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
                "{}/pulls?state=open&page={}&per_page={}",
                repo_path(&owner, repository_id),
                options.page(),
                options.per_page()
            ))
            .await?;

        Ok(pulls
            .into_iter()
            .map(|pr| {
                let source = to_repository(pr.head.repo);
                GitPullRequest {
                    name: pr.title,
                    branch: pr.head.reference,
                    sha: pr.head.sha,
                    source_repo_id: source.id,
                    source_repo_url: source.url,
                    source_repo_owner: source.owner,
                    source_repo_name: source.name,
                }
            })
            .collect())
    }

    async fn get_user(&self) -> Result<GitUser> {
        let user: User = self.client.get("/user").await?;
        Ok(GitUser {
            id: user.id.to_string(),
            username: user.login,
            name: user.name,
            // private emails come back as null
            email: user.email.unwrap_or_default(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let mut path = format!("{}/commits?per_page=1", repo_path(&ctx.owner, &ctx.name));
        if let Some(reference) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&sha={}", urlencoding::encode(reference)));
        }
        let commits: Vec<Sha> = self.client.get(&path).await?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| ProviderError::NotFound(format!("commits of {}", ctx.full_name())))
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self.list_branches(&ctx.owner, &ctx.name).await?;

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

        let mut resolved = ctx.clone();
        resolved.branch = Some(pr.head.reference);
        resolved.url = format!("{}.git", web_url(&pr.head.repo.html_url));
        resolved.id = pr.head.repo.name.clone();
        resolved.name = pr.head.repo.name;
        resolved.owner = pr.head.repo.owner.login;
        Ok(resolved)
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
            .ok_or_else(|| ProviderError::NotFound(format!("{initial_sha} in the history of {current_sha}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GiteeProvider {
        GiteeProvider::new("", None).unwrap()
    }

    #[test]
    fn test_can_handle() {
        let p = provider();
        assert!(p.can_handle("https://gitee.com/user/repo").unwrap());
        assert!(p.can_handle("git@gitee.com:user/repo.git").unwrap());
        assert!(!p.can_handle("https://github.com/user/repo").unwrap());
    }

    #[test]
    fn test_parse_forms() {
        let p = provider();

        let ctx = p.parse_static_git_context("https://gitee.com/owner/repo1").unwrap();
        assert_eq!(ctx.url, "https://gitee.com/owner/repo1.git");
        assert!(ctx.branch.is_none());

        let ctx = p
            .parse_static_git_context("https://gitee.com/owner/repo1/tree/dev")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));

        let ctx = p
            .parse_static_git_context("https://gitee.com/owner/repo1/commit/abc123")
            .unwrap();
        assert_eq!(ctx.sha.as_deref(), Some("abc123"));
        assert!(ctx.is_commit_ref());

        let ctx = p
            .parse_static_git_context("https://gitee.com/owner/repo1/pulls/42")
            .unwrap();
        assert_eq!(ctx.pr_number, Some(42));

        let ctx = p
            .parse_static_git_context("https://gitee.com/owner/repo1/blob/dev/src/main.rs")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert!(ctx.sha.is_none());
        assert_eq!(ctx.path.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn test_url_from_context() {
        let p = provider();
        let mut request = RepositoryContextRequest::new("https://gitee.com/owner/repo.git");
        request.path = Some("README.md".to_string());
        assert_eq!(
            p.get_url_from_context(&request),
            "https://gitee.com/owner/repo/blob/master/README.md"
        );

        for url in [
            "https://gitee.com/owner/repo/tree/dev",
            "https://gitee.com/owner/repo/commit/abc",
            "https://gitee.com/owner/repo/blob/dev/a/b.rs",
            "https://gitee.com/owner/repo/pulls/1",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            assert_eq!(
                p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx)),
                url
            );
        }
    }

    #[tokio::test]
    async fn test_get_repositories_for_personal_namespace() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user/repos?type=owner&page=1&per_page=100")
            .match_header("authorization", "Bearer token")
            .with_body(
                r#"[{"name": "repo1", "html_url": "https://gitee.com/user/repo1",
                     "default_branch": "main", "owner": {"login": "user"}}]"#,
            )
            .create_async()
            .await;

        let p = GiteeProvider::new("token", Some(&server.url())).unwrap();
        let repos = p
            .get_repositories(crate::context::PERSONAL_NAMESPACE_ID, &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].branch, "main");
        assert_eq!(repos[0].url, "https://gitee.com/user/repo1");
        assert_eq!(repos[0].owner, "user");
    }

    #[tokio::test]
    async fn test_webhooks_unsupported() {
        let repo = GitRepository::default();
        let err = provider()
            .register_prebuild_webhook(&repo, "https://hook")
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
