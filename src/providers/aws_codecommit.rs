//
//  git-providers
//  providers/aws_codecommit.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # AWS CodeCommit Adapter
//!
//! CodeCommit speaks the AWS JSON 1.1 protocol: every call is a signed
//! `POST /` whose operation is named by the `X-Amz-Target` header. Identity
//! comes from IAM `GetUser`, which uses the query protocol.
//!
//! ## URL Forms
//!
//! | Form | Example |
//! |------|---------|
//! | Clone URL | `https://git-codecommit.{region}.amazonaws.com/v1/repos/{name}` (branch `main` assumed) |
//! | Console | `https://{region}.console.aws.amazon.com/codesuite/codecommit/repositories/{name}/browse` |
//! | Console branch | `.../repositories/{name}/browse/refs/heads/{branch}[/--/{path}]` |
//! | Console commit | `.../repositories/{name}/commit/{sha}` |
//! | Console pull request | `.../repositories/{name}/pull-requests/{n}` |
//!
//! There is no namespace above a repository, so namespaces are repositories.
//! CodeCommit has no webhook API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::common::{ProviderError, Result};
use crate::api::{format_api_error, ApiClient};
use crate::auth::{AwsCredentials, SigV4Signer};
use crate::context::resolver::{parse_pr_number, path_segments};
use crate::context::{
    is_personal_namespace, GitBranch, GitNamespace, GitPullRequest, GitRepository, GitUser,
    ListOptions, RepositoryContextRequest, StaticGitContext,
};
use crate::providers::{find_branch_by_parent_walk, CommitGraph, GitProvider, MAX_PARENT_WALK_DEPTH};

const TARGET_PREFIX: &str = "CodeCommit_20150413";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const IAM_ENDPOINT: &str = "https://iam.amazonaws.com";
/// IAM is a global service signed for this region.
const IAM_REGION: &str = "us-east-1";
const CONSOLE_PREFIX: &str = "codesuite/codecommit/repositories";
const ASSUMED_BRANCH: &str = "main";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNameIdPair {
    repository_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRepositoriesOutput {
    #[serde(default)]
    repositories: Vec<RepositoryNameIdPair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryMetadata {
    repository_name: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    account_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRepositoryOutput {
    repository_metadata: RepositoryMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBranchesOutput {
    #[serde(default)]
    branches: Vec<String>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchInfo {
    branch_name: String,
    commit_id: String,
}

#[derive(Debug, Deserialize)]
struct GetBranchOutput {
    branch: BranchInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitInfo {
    commit_id: String,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GetCommitOutput {
    commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPullRequestsOutput {
    #[serde(default)]
    pull_request_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestTarget {
    repository_name: String,
    source_reference: String,
    #[serde(default)]
    source_commit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author_arn: String,
    #[serde(default)]
    pull_request_targets: Vec<PullRequestTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetPullRequestOutput {
    pull_request: PullRequestInfo,
}

impl PullRequestInfo {
    fn into_target(self, id: &str) -> Result<(String, PullRequestTarget)> {
        let target = self
            .pull_request_targets
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("targets of pull request {id}")))?;
        Ok((self.title, target))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamUser {
    user_id: String,
    user_name: String,
    #[serde(default)]
    arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamGetUserResult {
    user: IamUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamGetUserResponse {
    get_user_result: IamGetUserResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IamEnvelope {
    get_user_response: IamGetUserResponse,
}

/// Extracts the region from a configured base URL.
///
/// Accepts `https://{region}.console.aws.amazon.com`,
/// `https://codecommit.{region}.amazonaws.com` and the `git-codecommit` host.
pub fn region_from_base_url(base_api_url: &str) -> Result<String> {
    let host = url::Url::parse(base_api_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| base_api_url.trim_start_matches("https://").to_string());
    let mut labels = host.split('.');
    let region = match labels.next() {
        Some("codecommit" | "git-codecommit") => labels.next(),
        first => first,
    };
    region
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Config(format!("cannot read an AWS region from {base_api_url}"))
        })
}

/// `https://git-codecommit.{region}.amazonaws.com/v1/repos/{name}`
pub fn codecommit_clone_url(region: &str, name: &str) -> String {
    format!("https://git-codecommit.{region}.amazonaws.com/v1/repos/{name}")
}

fn git_host(region: &str) -> String {
    format!("git-codecommit.{region}.amazonaws.com")
}

fn console_host(region: &str) -> String {
    format!("{region}.console.aws.amazon.com")
}

/// Region encoded in a CodeCommit git or console host.
fn region_of_host(host: &str) -> Option<&str> {
    if let Some(rest) = host.strip_prefix("git-codecommit.") {
        return rest.strip_suffix(".amazonaws.com");
    }
    host.strip_suffix(".console.aws.amazon.com")
}

fn aws_error(status: StatusCode, body: &str) -> ProviderError {
    let missing = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("__type").and_then(Value::as_str).map(str::to_string))
        .is_some_and(|t| t.ends_with("DoesNotExistException"));

    match format_api_error(status, body) {
        ProviderError::Api { message, .. } if missing => ProviderError::Api {
            status: StatusCode::NOT_FOUND.as_u16(),
            message,
        },
        other => other,
    }
}

/// One signed AWS endpoint.
#[derive(Debug, Clone)]
struct Endpoint {
    client: ApiClient,
    signer: SigV4Signer,
    host: String,
}

impl Endpoint {
    fn new(url: &str, signer: SigV4Signer) -> Result<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ProviderError::Config(format!("invalid AWS endpoint {url}: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ProviderError::Config(format!("invalid AWS endpoint {url}"))),
        };
        Ok(Self {
            client: ApiClient::new(url)?,
            signer,
            host,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        content_type: &str,
        target: Option<&str>,
        payload: Vec<u8>,
    ) -> Result<T> {
        let mut headers = vec![("host", self.host.as_str()), ("content-type", content_type)];
        if let Some(target) = target {
            headers.push(("x-amz-target", target));
        }
        let signed = self
            .signer
            .sign("POST", "/", "", &headers, &payload, Utc::now())
            .map_err(|e| ProviderError::Config(format!("cannot sign request: {e}")))?;

        let url = self.client.url("/");
        tracing::debug!("POST {} {}", url, target.unwrap_or_default());
        let mut request = self
            .client
            .http()
            .post(&url)
            .header("content-type", content_type)
            .header("accept", "application/json");
        if let Some(target) = target {
            request = request.header("x-amz-target", target);
        }
        for (name, value) in signed {
            request = request.header(name, value);
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::debug!("request failed with {}: {}", status, text);
            return Err(aws_error(status, &text));
        }
        Ok(serde_json::from_str(if text.trim().is_empty() { "{}" } else { &text })?)
    }
}

/// AWS CodeCommit in one region.
#[derive(Debug, Clone)]
pub struct AwsCodeCommitProvider {
    region: String,
    codecommit: Endpoint,
    iam: Endpoint,
}

impl AwsCodeCommitProvider {
    /// Creates an adapter for the region named by `base_api_url`.
    pub fn new(credentials: AwsCredentials, base_api_url: &str) -> Result<Self> {
        let region = region_from_base_url(base_api_url)?;
        let codecommit = format!("https://codecommit.{region}.amazonaws.com");
        Self::with_endpoints(credentials, &region, &codecommit, IAM_ENDPOINT)
    }

    /// Creates an adapter talking to explicit CodeCommit and IAM endpoints.
    pub fn with_endpoints(
        credentials: AwsCredentials,
        region: &str,
        codecommit_url: &str,
        iam_url: &str,
    ) -> Result<Self> {
        Ok(Self {
            region: region.to_string(),
            codecommit: Endpoint::new(
                codecommit_url,
                SigV4Signer::new(credentials.clone(), region, "codecommit"),
            )?,
            iam: Endpoint::new(iam_url, SigV4Signer::new(credentials, IAM_REGION, "iam"))?,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, input: Value) -> Result<T> {
        let target = format!("{TARGET_PREFIX}.{operation}");
        let payload = serde_json::to_vec(&input)?;
        self.codecommit
            .send(JSON_CONTENT_TYPE, Some(&target), payload)
            .await
    }

    async fn get_repository(&self, name: &str) -> Result<RepositoryMetadata> {
        let output: GetRepositoryOutput = self
            .call("GetRepository", json!({ "repositoryName": name }))
            .await?;
        Ok(output.repository_metadata)
    }

    async fn get_branch(&self, repository: &str, branch: &str) -> Result<BranchInfo> {
        let output: GetBranchOutput = self
            .call(
                "GetBranch",
                json!({ "repositoryName": repository, "branchName": branch }),
            )
            .await?;
        Ok(output.branch)
    }

    async fn get_pull_request(&self, id: &str) -> Result<PullRequestInfo> {
        let output: GetPullRequestOutput = self
            .call("GetPullRequest", json!({ "pullRequestId": id }))
            .await?;
        Ok(output.pull_request)
    }

    /// Every branch with its head; heads that cannot be read are left empty.
    async fn list_branches(&self, repository: &str) -> Result<Vec<GitBranch>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut input = json!({ "repositoryName": repository });
            if let Some(token) = &next_token {
                input["nextToken"] = json!(token);
            }
            let page: ListBranchesOutput = self.call("ListBranches", input).await?;
            names.extend(page.branches);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        let mut branches = Vec::with_capacity(names.len());
        for name in names {
            let sha = match self.get_branch(repository, &name).await {
                Ok(info) => info.commit_id,
                Err(e) => {
                    tracing::warn!("cannot read head of {}: {}", name, e);
                    String::new()
                }
            };
            branches.push(GitBranch { name, sha });
        }
        Ok(branches)
    }

    fn to_repository(&self, metadata: RepositoryMetadata) -> GitRepository {
        GitRepository {
            id: metadata.repository_name.clone(),
            url: codecommit_clone_url(&self.region, &metadata.repository_name),
            name: metadata.repository_name,
            branch: metadata.default_branch.unwrap_or_default(),
            owner: metadata.account_id,
            source: git_host(&self.region),
            ..Default::default()
        }
    }

    fn graph<'a>(&'a self, repository: &'a str) -> RepoCommits<'a> {
        RepoCommits {
            provider: self,
            repository,
        }
    }
}

/// First parents through `GetCommit`.
struct RepoCommits<'a> {
    provider: &'a AwsCodeCommitProvider,
    repository: &'a str,
}

#[async_trait]
impl CommitGraph for RepoCommits<'_> {
    async fn first_parent(&self, sha: &str) -> Result<Option<String>> {
        let output: GetCommitOutput = self
            .provider
            .call(
                "GetCommit",
                json!({ "repositoryName": self.repository, "commitId": sha }),
            )
            .await?;
        Ok(output.commit.parents.into_iter().next())
    }
}

#[async_trait]
impl GitProvider for AwsCodeCommitProvider {
    fn id(&self) -> &str {
        "aws-codecommit"
    }

    fn can_handle(&self, repo_url: &str) -> Result<bool> {
        let Ok(parsed) = url::Url::parse(repo_url.trim()) else {
            return Ok(false);
        };
        let host = parsed.host_str().unwrap_or_default();
        Ok(host == git_host(&self.region) || host == console_host(&self.region))
    }

    fn parse_static_git_context(&self, repo_url: &str) -> Result<StaticGitContext> {
        let parsed = url::Url::parse(repo_url.trim())
            .map_err(|e| ProviderError::parse_with(repo_url, e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ProviderError::parse_with(repo_url, "missing host"))?;
        let region = region_of_host(host).unwrap_or(&self.region).to_string();
        let segments = path_segments(parsed.path());

        let context = |name: &str| StaticGitContext {
            id: name.to_string(),
            name: name.to_string(),
            owner: name.to_string(),
            url: codecommit_clone_url(&region, name),
            source: git_host(&region),
            ..Default::default()
        };

        if let ["v1", "repos", name, ..] = segments.as_slice() {
            let mut ctx = context(name.trim_end_matches(".git"));
            ctx.branch = Some(ASSUMED_BRANCH.to_string());
            return Ok(ctx);
        }

        let prefix = path_segments(CONSOLE_PREFIX);
        let Some(rest) = segments.strip_prefix(prefix.as_slice()) else {
            return Err(ProviderError::parse_with(
                repo_url,
                "expected a CodeCommit clone or console URL",
            ));
        };
        let [name, parts @ ..] = rest else {
            return Err(ProviderError::parse_with(repo_url, "missing repository name"));
        };

        let mut ctx = context(name);
        match parts {
            ["browse", "refs", "heads", tail @ ..] if !tail.is_empty() => {
                let marker = tail.iter().position(|s| *s == "--");
                let (branch, path) = match marker {
                    Some(i) => (&tail[..i], &tail[i + 1..]),
                    None => (tail, &[][..]),
                };
                ctx.branch = Some(branch.join("/"));
                if !path.is_empty() {
                    ctx.path = Some(path.join("/"));
                }
            }
            ["commit", sha, ..] => ctx = ctx.with_commit(*sha),
            ["pull-requests", tail @ ..] => {
                ctx.pr_number = Some(parse_pr_number(repo_url, tail.first())?);
            }
            _ => {}
        }

        Ok(ctx)
    }

    fn get_url_from_context(&self, request: &RepositoryContextRequest) -> String {
        let fallback = request.url.rsplit('/').next().unwrap_or_default();
        let name = request.name_or(fallback);
        let region = request
            .source
            .as_deref()
            .and_then(region_of_host)
            .or_else(|| {
                request
                    .url
                    .split('/')
                    .nth(2)
                    .and_then(region_of_host)
            })
            .unwrap_or(&self.region);
        let base = format!("https://{}/{CONSOLE_PREFIX}/{name}", console_host(region));

        if let Some(pr) = request.pr_number {
            return format!("{base}/pull-requests/{pr}");
        }

        let branch = request.branch.as_deref().filter(|b| !b.is_empty());
        let sha = request.sha.as_deref().filter(|s| !s.is_empty());
        if let Some(sha) = sha {
            if branch.is_none() || branch == Some(sha) {
                return format!("{base}/commit/{sha}");
            }
        }

        let path = request.path.as_deref().filter(|p| !p.is_empty());
        match (branch, path) {
            (Some(branch), Some(path)) => format!("{base}/browse/refs/heads/{branch}/--/{path}"),
            (Some(branch), None) => format!("{base}/browse/refs/heads/{branch}"),
            (None, Some(path)) => format!("{base}/browse/refs/heads/{ASSUMED_BRANCH}/--/{path}"),
            (None, None) => format!("{base}/browse"),
        }
    }

    async fn get_namespaces(&self, _options: &ListOptions) -> Result<Vec<GitNamespace>> {
        let output: ListRepositoriesOutput = self
            .call(
                "ListRepositories",
                json!({ "sortBy": "repositoryName", "order": "ascending" }),
            )
            .await?;
        Ok(output
            .repositories
            .into_iter()
            .map(|r| GitNamespace::new(r.repository_name.clone(), r.repository_name))
            .collect())
    }

    /// The repository named by `namespace`, or every repository for the
    /// personal namespace.
    async fn get_repositories(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitRepository>> {
        if !is_personal_namespace(namespace) {
            let metadata = self.get_repository(namespace).await?;
            return Ok(vec![self.to_repository(metadata)]);
        }

        let names = self.get_namespaces(options).await?;
        let mut repos = Vec::new();
        for ns in names.into_iter().take(options.per_page() as usize) {
            repos.push(self.to_repository(self.get_repository(&ns.id).await?));
        }
        Ok(repos)
    }

    async fn get_repo_branches(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        _options: &ListOptions,
    ) -> Result<Vec<GitBranch>> {
        self.list_branches(repository_id).await
    }

    async fn get_repo_prs(
        &self,
        repository_id: &str,
        _namespace_id: &str,
        options: &ListOptions,
    ) -> Result<Vec<GitPullRequest>> {
        let output: ListPullRequestsOutput = self
            .call(
                "ListPullRequests",
                json!({
                    "repositoryName": repository_id,
                    "pullRequestStatus": "OPEN",
                    "maxResults": options.per_page(),
                }),
            )
            .await?;

        let mut pulls = Vec::with_capacity(output.pull_request_ids.len());
        for id in output.pull_request_ids {
            let pr = self.get_pull_request(&id).await?;
            // arn:aws:iam::{account}:user/{name}
            let author = pr
                .author_arn
                .rsplit(['/', ':'])
                .next()
                .unwrap_or_default()
                .to_string();
            let (title, target) = pr.into_target(&id)?;
            pulls.push(GitPullRequest {
                name: title,
                branch: target
                    .source_reference
                    .trim_start_matches("refs/heads/")
                    .to_string(),
                sha: target.source_commit.unwrap_or_default(),
                source_repo_id: target.repository_name.clone(),
                source_repo_url: codecommit_clone_url(&self.region, &target.repository_name),
                source_repo_owner: author,
                source_repo_name: target.repository_name,
            });
        }
        Ok(pulls)
    }

    async fn get_user(&self) -> Result<GitUser> {
        let payload = b"Action=GetUser&Version=2010-05-08".to_vec();
        let envelope: IamEnvelope = self.iam.send(FORM_CONTENT_TYPE, None, payload).await?;
        let user = envelope.get_user_response.get_user_result.user;
        Ok(GitUser {
            id: user.user_id,
            username: user.user_name,
            name: user.arn,
            // IAM does not expose an email address
            email: String::new(),
        })
    }

    async fn get_last_commit_sha(&self, ctx: &StaticGitContext) -> Result<String> {
        if let Some(sha) = &ctx.sha {
            let output: GetCommitOutput = self
                .call(
                    "GetCommit",
                    json!({ "repositoryName": ctx.name, "commitId": sha }),
                )
                .await?;
            return Ok(output.commit.commit_id);
        }

        let branch = match &ctx.branch {
            Some(branch) => branch.clone(),
            None => self.get_default_branch(ctx).await?,
        };
        Ok(self.get_branch(&ctx.name, &branch).await?.commit_id)
    }

    async fn get_branch_by_commit(&self, ctx: &StaticGitContext) -> Result<String> {
        let sha = ctx.sha.clone().unwrap_or_default();
        let branches = self.list_branches(&ctx.name).await?;
        find_branch_by_parent_walk(&self.graph(&ctx.name), &branches, &sha).await
    }

    async fn get_default_branch(&self, ctx: &StaticGitContext) -> Result<String> {
        let metadata = self.get_repository(&ctx.name).await?;
        metadata
            .default_branch
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ProviderError::NotFound(format!("default branch of {}", ctx.name)))
    }

    async fn get_pr_context(&self, ctx: &StaticGitContext) -> Result<StaticGitContext> {
        let Some(number) = ctx.pr_number else {
            return Ok(ctx.clone());
        };

        let id = number.to_string();
        let (_, target) = self.get_pull_request(&id).await?.into_target(&id)?;
        let mut resolved = ctx.clone();
        resolved.branch = Some(
            target
                .source_reference
                .trim_start_matches("refs/heads/")
                .to_string(),
        );
        Ok(resolved)
    }

    async fn get_commits_range(
        &self,
        repo: &GitRepository,
        initial_sha: &str,
        current_sha: &str,
    ) -> Result<usize> {
        let graph = self.graph(&repo.name);
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider() -> AwsCodeCommitProvider {
        AwsCodeCommitProvider::new(
            AwsCredentials::new("AKID", "secret"),
            "https://eu-west-1.console.aws.amazon.com",
        )
        .unwrap()
    }

    fn mocked(server: &mockito::Server) -> AwsCodeCommitProvider {
        AwsCodeCommitProvider::with_endpoints(
            AwsCredentials::new("AKID", "secret"),
            "eu-west-1",
            &server.url(),
            &server.url(),
        )
        .unwrap()
    }

    #[test]
    fn test_region_from_base_url() {
        assert_eq!(
            region_from_base_url("https://us-east-2.console.aws.amazon.com").unwrap(),
            "us-east-2"
        );
        assert_eq!(
            region_from_base_url("https://codecommit.ap-south-1.amazonaws.com").unwrap(),
            "ap-south-1"
        );
        assert!(region_from_base_url("").is_err());
    }

    #[test]
    fn test_parse_clone_url_assumes_main() {
        let ctx = provider()
            .parse_static_git_context("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app")
            .unwrap();
        assert_eq!(ctx.name, "app");
        assert_eq!(ctx.owner, "app");
        assert_eq!(ctx.branch.as_deref(), Some("main"));
        assert_eq!(ctx.source, "git-codecommit.eu-west-1.amazonaws.com");
        assert_eq!(
            ctx.url,
            "https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app"
        );
    }

    #[test]
    fn test_parse_console_forms() {
        let p = provider();
        let base = "https://eu-west-1.console.aws.amazon.com/codesuite/codecommit/repositories/app";

        let ctx = p
            .parse_static_git_context(&format!("{base}/browse/refs/heads/dev/--/src/main.rs"))
            .unwrap();
        assert_eq!(ctx.branch.as_deref(), Some("dev"));
        assert_eq!(ctx.path.as_deref(), Some("src/main.rs"));
        assert_eq!(ctx.source, "git-codecommit.eu-west-1.amazonaws.com");
        assert_eq!(
            ctx.url,
            "https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app"
        );

        let ctx = p.parse_static_git_context(&format!("{base}/commit/abc")).unwrap();
        assert!(ctx.is_commit_ref());

        let ctx = p
            .parse_static_git_context(&format!("{base}/pull-requests/4"))
            .unwrap();
        assert_eq!(ctx.pr_number, Some(4));
        assert!(ctx.branch.is_none());

        assert!(p
            .parse_static_git_context("https://eu-west-1.console.aws.amazon.com/s3/buckets")
            .is_err());
    }

    #[test]
    fn test_url_round_trip() {
        let p = provider();
        let base = "https://eu-west-1.console.aws.amazon.com/codesuite/codecommit/repositories/app";
        for url in [
            format!("{base}/browse"),
            format!("{base}/browse/refs/heads/dev"),
            format!("{base}/browse/refs/heads/dev/--/docs/a.md"),
            format!("{base}/commit/abc"),
            format!("{base}/pull-requests/4"),
        ] {
            let ctx = p.parse_static_git_context(&url).unwrap();
            assert_eq!(
                p.get_url_from_context(&RepositoryContextRequest::from_context(&ctx)),
                url
            );
        }

        let mut request = RepositoryContextRequest::new(
            "https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app",
        );
        request.path = Some("README.md".to_string());
        assert_eq!(
            p.get_url_from_context(&request),
            format!("{base}/browse/refs/heads/main/--/README.md")
        );
    }

    #[test]
    fn test_can_handle() {
        let p = provider();
        assert!(p
            .can_handle("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app")
            .unwrap());
        assert!(!p
            .can_handle("https://git-codecommit.us-east-1.amazonaws.com/v1/repos/app")
            .unwrap());
        assert!(!p.can_handle("https://github.com/a/b").unwrap());
    }

    #[tokio::test]
    async fn test_branch_by_commit_walks_parents() {
        let mut server = mockito::Server::new_async().await;
        let target = |op: &str| format!("{TARGET_PREFIX}.{op}");

        server
            .mock("POST", "/")
            .match_header("x-amz-target", target("ListBranches").as_str())
            .match_header(
                "authorization",
                Matcher::Regex("^AWS4-HMAC-SHA256 Credential=AKID/\\d{8}/eu-west-1/codecommit/".to_string()),
            )
            .with_body(r#"{"branches": ["main", "dev"]}"#)
            .create_async()
            .await;
        for (branch, head) in [("main", "m1"), ("dev", "d2")] {
            server
                .mock("POST", "/")
                .match_header("x-amz-target", target("GetBranch").as_str())
                .match_body(Matcher::PartialJsonString(format!(r#"{{"branchName": "{branch}"}}"#)))
                .with_body(format!(
                    r#"{{"branch": {{"branchName": "{branch}", "commitId": "{head}"}}}}"#
                ))
                .create_async()
                .await;
        }
        for (sha, parents) in [("m1", "[]"), ("d2", r#"["target"]"#)] {
            server
                .mock("POST", "/")
                .match_header("x-amz-target", target("GetCommit").as_str())
                .match_body(Matcher::PartialJsonString(format!(r#"{{"commitId": "{sha}"}}"#)))
                .with_body(format!(
                    r#"{{"commit": {{"commitId": "{sha}", "parents": {parents}}}}}"#
                ))
                .create_async()
                .await;
        }

        let p = mocked(&server);
        let ctx = p
            .parse_static_git_context("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app")
            .unwrap()
            .with_commit("target");
        assert_eq!(p.get_branch_by_commit(&ctx).await.unwrap(), "dev");
    }

    #[tokio::test]
    async fn test_get_user_from_iam() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body("Action=GetUser&Version=2010-05-08")
            .match_header(
                "authorization",
                Matcher::Regex("/us-east-1/iam/aws4_request".to_string()),
            )
            .with_body(
                r#"{"GetUserResponse": {"GetUserResult": {"User": {
                    "UserId": "AIDA123", "UserName": "dev",
                    "Arn": "arn:aws:iam::123456789012:user/dev"}}}}"#,
            )
            .create_async()
            .await;

        let user = mocked(&server).get_user().await.unwrap();
        assert_eq!(user.id, "AIDA123");
        assert_eq!(user.username, "dev");
        assert!(user.email.is_empty());
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"__type": "RepositoryDoesNotExistException", "message": "app does not exist"}"#)
            .create_async()
            .await;

        let p = mocked(&server);
        let ctx = p
            .parse_static_git_context("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app")
            .unwrap();
        let err = p.get_default_branch(&ctx).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_webhooks_unsupported() {
        let err = provider()
            .get_prebuild_webhook(&GitRepository::default(), "https://hook")
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
