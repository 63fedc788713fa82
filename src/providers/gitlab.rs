//
//  git-providers
//  providers/gitlab.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # GitLab Adapter
//!
//! GitLab.com and self-managed instances through the v4 REST API.
//!
//! Repositories can sit in nested subgroups, so the owner is every path
//! segment before the repository name and the repository id is the full
//! `owner/name` path. Vendor routes follow a `/-/` separator:
//!
//! | Route | Effect |
//! |-------|--------|
//! | `-/merge_requests/{n}` | `pr_number` |
//! | `-/tree/{branch}[/{path}]` | `branch` (and `path`) |
//! | `-/blob/{branch}/{path}` | `branch` and `path` |
//! | `-/commit/{sha}` | `branch` and `sha` |
//! | `-/commits/{ref}` | `branch`, plus `sha` when `ref` is a full commit id |

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{ProviderError, Result};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{
    host_with_port, is_full_sha, parse_http, parse_pr_number, parse_static_git_context,
    path_segments,
};
use crate::context::{
    is_personal_namespace, GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository,
    GitUser, ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{
    find_branch_by_parent_walk, header_is, web_url, CommitGraph, GitProvider,
};

const GITLAB_API: &str = "https://gitlab.com/api/v4";

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    username: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Group {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Namespace {
    path: String,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    path: String,
    web_url: String,
    #[serde(default)]
    http_url_to_repo: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    namespace: Namespace,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
    #[serde(default)]
    parent_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    name: String,
    commit: Commit,
}

#[derive(Debug, Deserialize)]
struct MergeRequest {
    title: String,
    source_branch: String,
    #[serde(default)]
    sha: Option<String>,
    source_project_id: u64,
}

#[derive(Debug, Deserialize)]
struct Comparison {
    #[serde(default)]
    commits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Hook {
    id: u64,
    url: String,
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
struct PushProject {
    web_url: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    #[serde(default)]
    event_name: String,
    #[serde(rename = "ref", default)]
    git_ref: String,
    #[serde(default)]
    after: String,
    project: PushProject,
    #[serde(default)]
    commits: Vec<PushCommit>,
}

/// GitLab.com and GitLab self-managed.
#[derive(Debug, Clone)]
pub struct GitLabProvider {
    id: String,
    client: ApiClient,
    base_api_url: Option<String>,
}

impl GitLabProvider {
    /// Creates an adapter for gitlab.com (`base_api_url = None`) or a
    /// self-managed instance (e.g. `https://gitlab.example.com/api/v4`).
    pub fn new(token: &str, base_api_url: Option<&str>) -> Result<Self> {
        let id = if base_api_url.is_some() {
            "gitlab-self-managed"
        } else {
            "gitlab"
        };
        let client = ApiClient::new(base_api_url.unwrap_or(GITLAB_API))?
            .with_auth(AuthCredential::non_empty(token, AuthCredential::private_token));

        Ok(Self {
            id: id.to_string(),
            client,
            base_api_url: base_api_url.map(str::to_string),
        })
    }

    fn to_repository(project: Project) -> GitRepository {
        let source = url::Url::parse(&project.web_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        GitRepository {
            id: project.id.to_string(),
            name: project.path,
            url: project.web_url,
            branch: project.default_branch.unwrap_or_default(),
            owner: project.namespace.path,
            source,
            ..Default::default()
        }
    }

    async fn project(&self, project_id: &str) -> Result<Project> {
        self.client
            .get(&format!("/projects/{}", project_ref(project_id)))
            .await
    }

    async fn list_branches(&self, project_id: &str, options: &ListOptions) -> Result<Vec<GitBranch>> {
        let branches: Vec<Branch> = self
            .client
            .get(&format!(
                "/projects/{}/repository/branches?per_page={}&page={}",
                project_ref(project_id),
                options.per_page(),
                options.page()
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

    fn is_https(&self, repo_url: &str) -> bool {
        match &self.base_api_url {
            Some(base) if base.starts_with("http://") => false,
            _ => !repo_url.starts_with("http://"),
        }
    }
}

/// Project ids are either numeric or a URL-encoded `owner/name` path.
fn project_ref(project_id: &str) -> String {
    urlencoding::encode(project_id).into_owned()
}

fn repo_project_id(repo: &GitRepository) -> String {
    project_ref(&format!("{}/{}", repo.owner, repo.name))
}

struct ProjectCommits<'a> {
    client: &'a ApiClient,
    project: String,
}

#[async_trait]
impl CommitGraph for ProjectCommits<'_> {
    async fn first_parent(&self, sha: &str) -> Result<Option<String>> {
        let commit: Commit = self
            .client
            .get(&format!("/projects/{}/repository/commits/{sha}", self.project))
            .await?;
        Ok(commit.parent_ids.into_iter().next())
    }
}

#[async_trait]
impl GitProvider for GitLabProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(match &self.base_api_url {
            None => ctx.source == "gitlab.com",
            Some(base) => base.contains(&ctx.source),
        })
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        if repo_url.starts_with("git@") {
            let mut ctx = parse_static_git_context(repo_url)?;
            ctx.id = ctx.full_name();
            return Ok(ctx);
        }
        if !repo_url.starts_with("http") {
            return Err(ProviderError::parse(repo_url));
        }

        let parsed = parse_http(repo_url)?;
        let source = host_with_port(&parsed, repo_url)?;

        let sections: Vec<&str> = parsed.path().split("/-/").collect();
        if sections.len() > 2 {
            return Err(ProviderError::parse(repo_url));
        }

        let owner_repo = path_segments(sections[0]);
        let Some((name, owner)) = owner_repo.split_last() else {
            return Err(ProviderError::parse(repo_url));
        };
        if owner.is_empty() {
            return Err(ProviderError::parse_with(repo_url, "expected owner and repository name"));
        }

        let mut ctx =
            StaticGitContext::from_parts(&source, &owner.join("/"), name, self.is_https(repo_url));
        ctx.id = ctx.full_name();

        let Some(route) = sections.get(1) else {
            return Ok(ctx);
        };
        let parts = path_segments(route);

        match parts.as_slice() {
            ["merge_requests", rest @ ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, rest.first())?);
            }
            ["tree", branch, rest @ ..] => {
                ctx.branch = Some(branch.to_string());
                if !rest.is_empty() {
                    ctx.path = Some(rest.join("/"));
                }
            }
            ["blob", branch, rest @ ..] => {
                ctx.branch = Some(branch.to_string());
                ctx.path = Some(rest.join("/"));
            }
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            ["commits", reference, ..] => {
                if is_full_sha(reference) {
                    ctx = ctx.with_commit(*reference);
                } else {
                    ctx.branch = Some(reference.to_string());
                }
            }
            _ => {}
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let mut url = web_url(&request.url).to_string();

        if let Some(pr) = request.pr_number {
            return format!("{url}/-/merge_requests/{pr}");
        }

        match request.branch.as_deref().filter(|b| !b.is_empty()) {
            Some(branch) => {
                if request.sha.as_deref() == Some(branch) {
                    url.push_str(&format!("/-/commit/{branch}"));
                } else {
                    url.push_str(&format!("/-/tree/{branch}"));
                }
                if let Some(path) = &request.path {
                    url.push_str(&format!("/{path}"));
                }
            }
            None => {
                if let Some(path) = &request.path {
                    url.push_str(&format!("/-/blob/main/{path}"));
                }
            }
        }

        url
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let user = self.get_user().await?;
        let groups: Vec<Group> = self
            .client
            .get(&format!(
                "/groups?per_page={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        let mut namespaces = vec![GitNamespace::personal(user.username)];
        namespaces.extend(
            groups
                .into_iter()
                .map(|g| GitNamespace::new(g.id.to_string(), g.name)),
        );
        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let path = if is_personal_namespace(namespace) {
            let user = self.get_user().await?;
            format!("/users/{}/projects", user.id)
        } else {
            format!("/groups/{}/projects", project_ref(namespace))
        };

        let projects: Vec<Project> = self
            .client
            .get(&format!(
                "{path}?per_page={}&page={}",
                options.per_page(),
                options.page()
            ))
            .await?;

        Ok(projects.into_iter().map(Self::to_repository).collect())
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
        let merge_requests: Vec<MergeRequest> = self
            .client
            .get(&format!(
                "/projects/{}/merge_requests?state=opened&per_page={}&page={}",
                project_ref(repository_id),
                options.per_page(),
                options.page()
            ))
            .await?;

        let mut pulls = Vec::with_capacity(merge_requests.len());
        for mr in merge_requests {
            let source = match self.project(&mr.source_project_id.to_string()).await {
                Ok(project) => project,
                Err(e) => {
                    tracing::warn!("skipping merge request {:?}: {}", mr.title, e);
                    continue;
                }
            };
            pulls.push(GitPullRequest {
                name: mr.title,
                branch: mr.source_branch,
                sha: mr.sha.unwrap_or_default(),
                source_repo_id: mr.source_project_id.to_string(),
                source_repo_url: source.web_url,
                source_repo_owner: source.namespace.path,
                source_repo_name: source.path,
            });
        }

        Ok(pulls)
    }

    async fn get_user(&self) -> Result<GitUser> {
        let user: User = self.client.get("/user").await?;
        Ok(GitUser {
            id: user.id.to_string(),
            username: user.username,
            name: user.name,
            email: user.email.unwrap_or_default(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let mut path = format!(
            "/projects/{}/repository/commits?per_page=1",
            project_ref(&ctx.id)
        );
        if let Some(reference) = ctx.sha.as_ref().or(ctx.branch.as_ref()) {
            path.push_str(&format!("&ref_name={}", urlencoding::encode(reference)));
        }

        let commits: Vec<Commit> = self.client.get(&path).await?;
        Ok(commits.into_iter().next().map(|c| c.id).unwrap_or_default())
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx
            .sha
            .as_deref()
            .ok_or_else(|| ProviderError::BranchNotFound { sha: String::new() })?;

        let branches = self.list_branches(&ctx.id, &ListOptions::default()).await?;
        let graph = ProjectCommits {
            client: &self.client,
            project: project_ref(&ctx.id),
        };
        find_branch_by_parent_walk(&graph, &branches, sha).await
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let project = self.project(&ctx.id).await?;
        project
            .default_branch
            .ok_or_else(|| ProviderError::NotFound(format!("default branch of {}", ctx.id)))
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let mr: MergeRequest = self
            .client
            .get(&format!(
                "/projects/{}/merge_requests/{number}",
                project_ref(&ctx.id)
            ))
            .await?;
        let source = self.project(&mr.source_project_id.to_string()).await?;

        let mut resolved = ctx.clone();
        resolved.branch = Some(mr.source_branch);
        resolved.url = source
            .http_url_to_repo
            .unwrap_or_else(|| format!("{}.git", source.web_url));
        resolved.owner = source.namespace.path;
        resolved.name = source.path;
        resolved.id = resolved.full_name();
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let body = json!({"url": endpoint_url, "push_events": true});
        let hook: Hook = self
            .client
            .post(&format!("/projects/{}/hooks", repo_project_id(repo)), &body)
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
                "/projects/{}/hooks?per_page=100",
                repo_project_id(repo)
            ))
            .await?;
        Ok(hooks
            .into_iter()
            .find(|h| h.url == endpoint_url)
            .map(|h| h.id.to_string()))
    }

    async fn unregister_prebuild_webhook(&self, repo: &GitRepository, id: &str) -> Result<()> {
        self.client
            .delete(&format!("/projects/{}/hooks/{id}", repo_project_id(repo)))
            .await
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let comparison: Comparison = self
            .client
            .get(&format!(
                "/projects/{}/repository/compare?from={initial_sha}&to={current_sha}",
                repo_project_id(repo)
            ))
            .await?;
        Ok(comparison.commits.len())
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if headers.contains_key("x-gitlab-event") && !header_is(headers, "x-gitlab-event", "Push Hook")
        {
            return Ok(None);
        }

        let event: PushEvent = serde_json::from_slice(body)?;
        if event.event_name != "push" {
            return Ok(None);
        }

        let affected_files = event
            .commits
            .into_iter()
            .flat_map(|c| c.added.into_iter().chain(c.modified).chain(c.removed))
            .collect();

        Ok(Some(GitEventData {
            url: format!("{}.git", web_url(&event.project.web_url)),
            branch: event
                .git_ref
                .strip_prefix("refs/heads/")
                .unwrap_or(&event.git_ref)
                .to_string(),
            sha: event.after,
            owner: event.project.namespace,
            affected_files,
        }))
    }
}
