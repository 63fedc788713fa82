//
//  git-providers
//  providers/azure_devops.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Azure DevOps Adapter
//!
//! Azure DevOps Services through the REST API of one organization
//! (`base_api_url = https://dev.azure.com/{org}`), authenticated with a
//! personal access token over Basic auth.
//!
//! ## URL Forms
//!
//! | Form | Example |
//! |------|---------|
//! | HTTPS | `https://dev.azure.com/{org}/{project}/_git/{repo}` |
//! | HTTPS, project omitted | `https://dev.azure.com/{org}/_git/{repo}` (project = repo) |
//! | SSH | `git@ssh.dev.azure.com:v3/{org}/{project}/{repo}` |
//!
//! Refs and paths travel in the query string: `version=GB{branch}`,
//! `version=GC{sha}`, `path=/{path}`. Pull requests and commits use
//! `/pullrequest/{n}` and `/commit/{sha}` after the repository.
//!
//! ## Repository ids
//!
//! The repository UUID is not part of any URL. Parsing yields the id
//! `{project}/{repo}`, which every API call accepts;
//! [`GitProvider::resolve_static_git_context`] swaps it for the UUID.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;

use crate::api::common::{ProviderError, Result, ValueList};
use crate::api::ApiClient;
use crate::auth::AuthCredential;
use crate::context::resolver::{host_with_port, parse_http, parse_pr_number};
use crate::context::{
    GitBranch, GitEventData, GitNamespace, GitPullRequest, GitRepository, GitUser, ListOptions,
    RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{header_is, GitProvider, TransportCapability};

const API_VERSION: &str = "7.1";
const REF_HEADS: &str = "refs/heads/";
const CONTINUATION_HEADER: &str = "x-ms-continuationtoken";

static SSH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^git@ssh\.([\w.]+):(.+?)/(.+?)/(.+?)/(.+?)$").unwrap());

static HTTP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(https?://)?(?P<source>[^/]+)/(?P<org>[^/]+)(?:/(?P<project>[^/]+?))?/_git/(?P<repo>[^/?]+)(?:/(?P<rest>[^?]*))?(?:\?.*)?$",
    )
    .unwrap()
});

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    id: String,
    name: String,
    #[serde(default)]
    web_url: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    remote_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRef {
    commit_id: String,
}

#[derive(Debug, Deserialize)]
struct BranchStats {
    name: String,
    #[serde(default)]
    commit: Option<CommitRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    title: String,
    source_ref_name: String,
    #[serde(default)]
    last_merge_source_commit: Option<CommitRef>,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    #[serde(rename = "$value", default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(rename = "Account", alias = "Accounts", default)]
    account: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Identity {
    id: String,
    #[serde(default)]
    provider_display_name: String,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionData {
    authenticated_user: Identity,
    authorized_user: Identity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitDiffs {
    #[serde(default)]
    ahead_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Subscription {
    id: String,
    #[serde(default)]
    consumer_inputs: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefUpdate {
    name: String,
    new_object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushResource {
    #[serde(default)]
    ref_updates: Vec<RefUpdate>,
    #[serde(default)]
    commits: Vec<CommitRef>,
    repository: Repository,
}

#[derive(Debug, Deserialize)]
struct PushEvent {
    resource: PushResource,
}

/// Azure DevOps organization.
#[derive(Debug, Clone)]
pub struct AzureDevOpsProvider {
    client: ApiClient,
    base_api_url: String,
}

impl AzureDevOpsProvider {
    /// Creates an adapter for the organization at `base_api_url`.
    pub fn new(token: &str, base_api_url: &str) -> Result<Self> {
        let mut client = ApiClient::new(base_api_url)?;
        if !token.is_empty() {
            client = client.with_auth(AuthCredential::basic("", token));
        }
        Ok(Self {
            client,
            base_api_url: base_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Organization name: the last path segment of the API root.
    pub fn organization(&self) -> &str {
        self.base_api_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    fn to_repository(&self, repo: Repository) -> GitRepository {
        let url = repo.web_url.unwrap_or_default();
        let source = parse_http(&url)
            .ok()
            .and_then(|u| host_with_port(&u, &url).ok())
            .unwrap_or_default();
        GitRepository {
            id: repo.id,
            name: repo.name,
            branch: strip_ref(repo.default_branch.as_deref().unwrap_or_default()),
            owner: self.organization().to_string(),
            url,
            source,
            ..Default::default()
        }
    }

    async fn repository(&self, repository_id: &str) -> Result<Repository> {
        self.client.get(&api(&repo_api(repository_id), "")).await
    }

    async fn list_branches(&self, repository_id: &str) -> Result<Vec<GitBranch>> {
        let list: ValueList<BranchStats> = self
            .client
            .get(&api(&format!("{}/stats/branches", repo_api(repository_id)), ""))
            .await?;
        Ok(list
            .value
            .into_iter()
            .map(|b| GitBranch {
                name: b.name,
                sha: b.commit.map(|c| c.commit_id).unwrap_or_default(),
            })
            .collect())
    }

    async fn project_id(&self, project: &str) -> Result<String> {
        let project: Project = self
            .client
            .get(&api(&format!("/_apis/projects/{}", urlencoding::encode(project)), ""))
            .await?;
        Ok(project.id)
    }
}

/// Appends the `api-version` parameter (and any extra query) to `path`.
fn api(path: &str, query: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    if query.is_empty() {
        format!("{path}{separator}api-version={API_VERSION}")
    } else {
        format!("{path}{separator}{query}&api-version={API_VERSION}")
    }
}

/// API path of a repository given its UUID or `{project}/{repo}`.
fn repo_api(repository_id: &str) -> String {
    match repository_id.split_once('/') {
        Some((project, repo)) => format!(
            "/{}/_apis/git/repositories/{}",
            urlencoding::encode(project),
            urlencoding::encode(repo)
        ),
        None => format!("/_apis/git/repositories/{}", urlencoding::encode(repository_id)),
    }
}

fn strip_ref(name: &str) -> String {
    name.strip_prefix(REF_HEADS).unwrap_or(name).to_string()
}

fn web_repo_url(source: &str, org: &str, project: &str, repo: &str) -> String {
    format!("https://{source}/{org}/{project}/_git/{repo}")
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// `(project, repo)` of a web URL built by [`web_repo_url`].
fn project_and_repo(url: &str) -> Option<(String, String)> {
    let caps = HTTP_PATTERN.captures(url)?;
    let repo = decode(&caps["repo"]);
    let project = caps
        .name("project")
        .map(|p| decode(p.as_str()))
        .unwrap_or_else(|| repo.clone());
    Some((project, repo))
}

/// Applies `version`/`itemVersion`/`refName` and `path` query parameters.
fn apply_query(ctx: &mut StaticGitContext, query: &str) {
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "version" | "itemVersion" | "refName" => {
                if let Some(sha) = value.strip_prefix("GC") {
                    *ctx = std::mem::take(ctx).with_commit(sha);
                } else if let Some(branch) = value
                    .strip_prefix("GB")
                    .or_else(|| value.strip_prefix("GT"))
                    .or_else(|| value.strip_prefix(REF_HEADS))
                {
                    if ctx.branch.is_none() {
                        ctx.branch = Some(branch.to_string());
                    }
                }
            }
            "path" => {
                let path = value.trim_start_matches('/');
                if !path.is_empty() {
                    ctx.path = Some(path.to_string());
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl GitProvider for AzureDevOpsProvider {
    fn id(&self) -> &str {
        "azure-devops"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let ctx = self.parse_static_git_context(repo_url)?;
        Ok(self.base_api_url.contains(&ctx.source))
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let repo_url = repo_url.trim();

        if let Some(caps) = SSH_PATTERN.captures(repo_url) {
            let source = &caps[1];
            let org = &caps[3];
            let project = &caps[4];
            let repo = caps[5].trim_end_matches(".git");
            return Ok(StaticGitContext {
                id: format!("{project}/{repo}"),
                name: repo.to_string(),
                owner: org.to_string(),
                url: web_repo_url(source, org, project, repo),
                source: source.to_string(),
                ..Default::default()
            });
        }

        if !repo_url.starts_with("http") {
            return Err(ProviderError::parse(repo_url));
        }

        let parsed = parse_http(repo_url)?;
        let caps = HTTP_PATTERN
            .captures(repo_url)
            .ok_or_else(|| ProviderError::parse_with(repo_url, "expected an _git repository URL"))?;

        let source = host_with_port(&parsed, repo_url)?;
        let org = &caps["org"];
        let raw_repo = caps["repo"].trim_end_matches(".git");
        let raw_project = caps.name("project").map_or(raw_repo, |p| p.as_str());

        let name = decode(raw_repo);
        let project = decode(raw_project);

        let mut ctx = StaticGitContext {
            id: format!("{project}/{name}"),
            name,
            owner: org.to_string(),
            url: web_repo_url(&source, org, raw_project, raw_repo),
            source,
            ..Default::default()
        };

        let rest: Vec<&str> = caps
            .name("rest")
            .map(|r| r.as_str().split('/').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        match rest.as_slice() {
            ["pullrequest", number, ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, Some(number))?);
            }
            ["commit", sha, ..] => {
                ctx = ctx.with_commit(*sha);
            }
            _ => {}
        }

        if ctx.pr_number.is_none() {
            if let Some(query) = parsed.query() {
                apply_query(&mut ctx, query);
            }
        }

        Ok(ctx)
    }

    async fn resolve_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let mut ctx = self.parse_static_git_context(repo_url)?;
        let repo = self.repository(&ctx.id).await?;
        tracing::debug!("resolved azure repository {} to {}", ctx.id, repo.id);
        ctx.id = repo.id;
        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let url = request.url.trim_end_matches(".git");

        if let Some(pr) = request.pr_number {
            return format!("{url}/pullrequest/{pr}");
        }

        let path = request.path.as_deref().filter(|p| !p.is_empty());
        let query = match (request.branch.as_deref().filter(|b| !b.is_empty()), path) {
            (Some(branch), _) if request.sha.as_deref() == Some(branch) => {
                format!("version=GC{branch}")
            }
            (Some(branch), Some(path)) => format!("version=GB{branch}&path=/{path}"),
            (Some(branch), None) => format!("version=GB{branch}"),
            (None, Some(path)) => format!("version=GBmain&path=/{path}"),
            (None, None) => return url.to_string(),
        };

        format!("{url}?{query}")
    }

    async fn get_namespaces(&self, options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let mut namespaces = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query = format!("$top={}", options.per_page());
            if let Some(token) = &token {
                query.push_str(&format!("&continuationToken={}", urlencoding::encode(token)));
            }
            let (list, headers): (ValueList<Project>, HeaderMap) = self
                .client
                .get_with_headers(&api("/_apis/projects", &query))
                .await?;
            namespaces.extend(list.value.into_iter().map(|p| GitNamespace::new(p.id, p.name)));

            token = headers
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if token.is_none() {
                break;
            }
        }

        Ok(namespaces)
    }

    async fn get_repositories(
        &self,
        namespace: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        let list: ValueList<Repository> = self
            .client
            .get(&api(
                &format!("/{}/_apis/git/repositories", urlencoding::encode(namespace)),
                "",
            ))
            .await?;
        Ok(list
            .value
            .into_iter()
            .map(|r| self.to_repository(r))
            .collect())
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        let mut branches = self.list_branches(repository_id).await?;
        for branch in &mut branches {
            branch.name = strip_ref(&branch.name);
        }
        Ok(branches)
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let repo = self.repository(repository_id).await?;
        let list: ValueList<PullRequest> = self
            .client
            .get(&api(
                &format!("{}/pullrequests", repo_api(repository_id)),
                &format!(
                    "searchCriteria.status=active&$top={}&$skip={}",
                    options.per_page(),
                    options.offset()
                ),
            ))
            .await?;

        let url = repo.web_url.unwrap_or_default();
        Ok(list
            .value
            .into_iter()
            .map(|pr| GitPullRequest {
                name: pr.title,
                branch: strip_ref(&pr.source_ref_name),
                sha: pr
                    .last_merge_source_commit
                    .map(|c| c.commit_id)
                    .unwrap_or_default(),
                source_repo_id: pr.repository.id,
                source_repo_url: url.clone(),
                source_repo_owner: self.organization().to_string(),
                source_repo_name: pr.repository.name,
            })
            .collect())
    }

    async fn get_user(&self) -> Result<GitUser> {
        let data: ConnectionData = self
            .client
            .get("/_apis/connectionData?api-version=7.1-preview")
            .await?;

        Ok(GitUser {
            id: data.authenticated_user.id,
            username: data.authorized_user.provider_display_name,
            name: data.authenticated_user.provider_display_name,
            email: data
                .authenticated_user
                .properties
                .account
                .map(|a| a.value)
                .unwrap_or_default(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        let (version, version_type) = match (&ctx.sha, &ctx.branch) {
            (Some(sha), _) => (sha.as_str(), "commit"),
            (None, Some(branch)) => (branch.as_str(), "branch"),
            (None, None) => ("", "branch"),
        };

        let mut query = "searchCriteria.$top=1".to_string();
        if !version.is_empty() {
            query.push_str(&format!(
                "&searchCriteria.itemVersion.version={}&searchCriteria.itemVersion.versionType={version_type}",
                urlencoding::encode(version)
            ));
        }

        let list: ValueList<CommitRef> = self
            .client
            .get(&api(&format!("{}/commits", repo_api(&ctx.id)), &query))
            .await?;
        list.value
            .into_iter()
            .next()
            .map(|c| c.commit_id)
            .ok_or_else(|| ProviderError::NotFound(format!("commits of {}", ctx.id)))
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self.list_branches(&ctx.id).await?;

        for branch in branches {
            if branch.sha == sha {
                return Ok(strip_ref(&branch.name));
            }

            let name = strip_ref(&branch.name);
            let body = json!({
                "itemVersion": {"version": name, "versionType": "branch"},
                "fromCommitId": sha,
                "toCommitId": sha,
                "$top": 1,
            });
            let result: Result<ValueList<CommitRef>> = self
                .client
                .post(&api(&format!("{}/commitsbatch", repo_api(&ctx.id)), ""), &body)
                .await;

            match result {
                Ok(list) if list.value.iter().any(|c| c.commit_id == sha) => return Ok(name),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping branch {}: {}", name, e),
            }
        }

        Err(ProviderError::BranchNotFound { sha })
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let repo = self.repository(&ctx.id).await?;
        repo.default_branch
            .map(|b| strip_ref(&b))
            .ok_or_else(|| ProviderError::NotFound(format!("default branch of {}", ctx.id)))
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let pr: PullRequest = self
            .client
            .get(&api(&format!("{}/pullrequests/{number}", repo_api(&ctx.id)), ""))
            .await?;

        let mut resolved = ctx.clone();
        resolved.branch = Some(strip_ref(&pr.source_ref_name));
        resolved.owner = self.organization().to_string();
        Ok(resolved)
    }

    async fn register_prebuild_webhook(
        &self,
        repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<String> {
        let (project, _) = project_and_repo(&repo.url)
            .ok_or_else(|| ProviderError::parse_with(repo.url.clone(), "expected an _git repository URL"))?;
        let project_id = self.project_id(&project).await?;

        let body = json!({
            "publisherId": "tfs",
            "eventType": "git.push",
            "resourceVersion": "1.0",
            "consumerId": "webHooks",
            "consumerActionId": "httpRequest",
            "consumerInputs": {
                "url": endpoint_url,
                "httpHeaders": format!("X-AzureDevops-Event:git.push\nX-Owner:{}", repo.owner),
            },
            "publisherInputs": {
                "projectId": project_id,
                "repository": repo.id,
            },
            "status": "enabled",
        });

        let subscription: Subscription = self
            .client
            .post(&api("/_apis/hooks/subscriptions", ""), &body)
            .await?;
        Ok(subscription.id)
    }

    async fn get_prebuild_webhook(
        &self,
        _repo: &GitRepository,
        endpoint_url: &str,
    ) -> Result<Option<String>> {
        let list: ValueList<Subscription> = self
            .client
            .get(&api(
                "/_apis/hooks/subscriptions",
                "publisherId=tfs&eventType=git.push&consumerId=webHooks&consumerActionId=httpRequest",
            ))
            .await?;
        Ok(list
            .value
            .into_iter()
            .find(|s| s.consumer_inputs.get("url").map(String::as_str) == Some(endpoint_url))
            .map(|s| s.id))
    }

    async fn unregister_prebuild_webhook(&self, _repo: &GitRepository, id: &str) -> Result<()> {
        self.client
            .delete(&api(
                &format!("/_apis/hooks/subscriptions/{}", urlencoding::encode(id)),
                "",
            ))
            .await
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let diffs: CommitDiffs = self
            .client
            .get(&api(
                &format!("{}/diffs/commits", repo_api(&repo.id)),
                &format!(
                    "baseVersion={initial_sha}&baseVersionType=commit&targetVersion={current_sha}&targetVersionType=commit"
                ),
            ))
            .await?;
        Ok(diffs.ahead_count)
    }

    fn parse_event_data(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<GitEventData>> {
        if !header_is(headers, "X-AzureDevops-Event", "git.push") {
            return Ok(None);
        }

        let event: PushEvent = serde_json::from_slice(body)?;
        let resource = event.resource;
        let Some(update) = resource
            .ref_updates
            .iter()
            .find(|u| u.name.starts_with(REF_HEADS))
        else {
            return Ok(None);
        };

        // remote URLs embed the organization as user info
        let remote = resource
            .repository
            .remote_url
            .or(resource.repository.web_url)
            .unwrap_or_default();
        let url = match url::Url::parse(&remote) {
            Ok(mut parsed) => {
                let _ = parsed.set_username("");
                parsed.to_string()
            }
            Err(_) => remote,
        };

        Ok(Some(GitEventData {
            url,
            branch: strip_ref(&update.name),
            sha: update.new_object_id.clone(),
            owner: headers
                .get("x-owner")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            affected_files: resource.commits.into_iter().map(|c| c.commit_id).collect(),
        }))
    }

    fn unsupported_transport_capabilities(&self) -> Vec<TransportCapability> {
        vec![TransportCapability::ThinPack]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AzureDevOpsProvider {
        AzureDevOpsProvider::new("pat", "https://dev.azure.com/org").unwrap()
    }

    #[test]
    fn test_organization() {
        assert_eq!(provider().organization(), "org");
    }

    #[test]
    fn test_parse_pull_request() {
        let ctx = provider()
            .parse_static_git_context("https://dev.azure.com/org/proj/_git/proj/pullrequest/4")
            .unwrap();
        assert_eq!(ctx.owner, "org");
        assert_eq!(ctx.name, "proj");
        assert_eq!(ctx.pr_number, Some(4));
        assert!(ctx.branch.is_none());
        assert!(ctx.sha.is_none());
    }

    #[test]
    fn test_parse_query_versions() {
        let p = provider();
        let ctx = p
            .parse_static_git_context("https://dev.azure.com/org/proj/_git/repo?version=GBmain")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert_eq!(ctx.id, "proj/repo");

        let ctx = p
            .parse_static_git_context("https://dev.azure.com/org/proj/_git/repo?version=GCabc123")
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("abc123"));
        assert_eq!(ctx.sha.as_deref(), Some("abc123"));

        let ctx = p
            .parse_static_git_context(
                "https://dev.azure.com/org/proj/_git/repo?path=/README.md&version=GBdev",
            )
            .unwrap();
        assert_eq!(ctx.path.as_deref(), Some("README.md"));
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
    }

    #[test]
    fn test_parse_underscored_names() {
        let ctx = provider()
            .parse_static_git_context("https://dev.azure.com/org/my_proj/_git/my_repo?version=GBmain")
            .unwrap();
        assert_eq!(ctx.owner, "org");
        assert_eq!(ctx.name, "my_repo");
        assert_eq!(ctx.id, "my_proj/my_repo");
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert_eq!(ctx.url, "https://dev.azure.com/org/my_proj/_git/my_repo");
    }

    #[test]
    fn test_parse_without_project() {
        let ctx = provider()
            .parse_static_git_context("https://dev.azure.com/org/_git/repo")
            .unwrap();
        assert_eq!(ctx.id, "repo/repo");
        assert_eq!(ctx.url, "https://dev.azure.com/org/repo/_git/repo");
    }

    #[test]
    fn test_parse_ssh() {
        let ctx = provider()
            .parse_static_git_context("git@ssh.dev.azure.com:v3/org/proj/repo")
            .unwrap();
        assert_eq!(ctx.source, "dev.azure.com");
        assert_eq!(ctx.owner, "org");
        assert_eq!(ctx.name, "repo");
        assert_eq!(ctx.url, "https://dev.azure.com/org/proj/_git/repo");
    }

    #[test]
    fn test_parse_commit_path() {
        let ctx = provider()
            .parse_static_git_context("https://dev.azure.com/org/proj/_git/repo/commit/abc")
            .unwrap();
        assert!(ctx.is_commit_ref());
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        for url in [
            "https://dev.azure.com/org/proj/_git/repo",
            "https://dev.azure.com/org/proj/_git/repo?version=GBdev",
            "https://dev.azure.com/org/proj/_git/repo?version=GCabc",
            "https://dev.azure.com/org/proj/_git/repo?version=GBdev&path=/docs/a.md",
            "https://dev.azure.com/org/proj/_git/repo/pullrequest/9",
        ] {
            let ctx = p.parse_static_git_context(url).unwrap();
            let built = p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx));
            assert_eq!(built, url);
        }
    }

    #[test]
    fn test_thin_pack_unsupported() {
        assert_eq!(
            provider().unsupported_transport_capabilities(),
            vec![TransportCapability::ThinPack]
        );
    }

    #[tokio::test]
    async fn test_resolve_fetches_repository_uuid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/proj/_apis/git/repositories/repo?api-version=7.1")
            .with_body(r#"{"id": "6f1c", "name": "repo", "defaultBranch": "refs/heads/main"}"#)
            .create_async()
            .await;

        let p = AzureDevOpsProvider::new("pat", &server.url()).unwrap();
        let ctx = p
            .resolve_static_git_context("https://dev.azure.com/org/proj/_git/repo")
            .await
            .unwrap();
        assert_eq!(ctx.id, "6f1c");
        assert_eq!(ctx.name, "repo");
    }

    #[tokio::test]
    async fn test_branch_by_commit_uses_commits_batch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/_apis/git/repositories/6f1c/stats/branches?api-version=7.1")
            .with_body(
                r#"{"count": 2, "value": [
                    {"name": "main", "commit": {"commitId": "m1"}},
                    {"name": "dev", "commit": {"commitId": "d1"}}
                ]}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/_apis/git/repositories/6f1c/commitsbatch?api-version=7.1")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"itemVersion": {"version": "main"}}"#.to_string(),
            ))
            .with_body(r#"{"count": 0, "value": []}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/_apis/git/repositories/6f1c/commitsbatch?api-version=7.1")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"itemVersion": {"version": "dev"}}"#.to_string(),
            ))
            .with_body(r#"{"count": 1, "value": [{"commitId": "target"}]}"#)
            .create_async()
            .await;

        let p = AzureDevOpsProvider::new("pat", &server.url()).unwrap();
        let mut ctx = StaticGitContext::from_parts("dev.azure.com", "org", "repo", true)
            .with_commit("target");
        ctx.id = "6f1c".to_string();
        assert_eq!(p.get_branch_by_commit(&ctx).await.unwrap(), "dev");
    }

    #[tokio::test]
    async fn test_namespaces_follow_continuation_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/_apis/projects?$top=100&api-version=7.1")
            .with_header("x-ms-continuationtoken", "next1")
            .with_body(r#"{"count": 1, "value": [{"id": "p1", "name": "One"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/_apis/projects?$top=100&continuationToken=next1&api-version=7.1")
            .with_body(r#"{"count": 1, "value": [{"id": "p2", "name": "Two"}]}"#)
            .create_async()
            .await;

        let p = AzureDevOpsProvider::new("pat", &server.url()).unwrap();
        let namespaces = p.get_namespaces(&ListOptions::default()).await.unwrap();
        let names: Vec<_> = namespaces.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);
    }

    #[test]
    fn test_parse_push_event() {
        let mut headers = HeaderMap::new();
        headers.insert("x-azuredevops-event", "git.push".parse().unwrap());
        headers.insert("x-owner", "org".parse().unwrap());
        let body = br#"{"resource": {
            "refUpdates": [{"name": "refs/heads/main", "newObjectId": "abc"}],
            "commits": [{"commitId": "abc"}],
            "repository": {"id": "6f1c", "name": "repo",
                "remoteUrl": "https://org@dev.azure.com/org/proj/_git/repo"}
        }}"#;
        let event = provider().parse_event_data(&headers, body).unwrap().unwrap();
        assert_eq!(event.url, "https://dev.azure.com/org/proj/_git/repo");
        assert_eq!(event.branch, "main");
        assert_eq!(event.sha, "abc");
        assert_eq!(event.owner, "org");
        assert_eq!(event.affected_files, vec!["abc".to_string()]);
    }
}
