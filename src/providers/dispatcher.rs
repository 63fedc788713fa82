//
//  git-providers
//  providers/dispatcher.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Provider Dispatch
//!
//! Maps configured provider entries to adapters.
//!
//! - [`create_provider`] builds one adapter from one [`ProviderConfig`]
//! - [`GitProviderService`] picks an adapter by id or by repository URL
//!
//! ## URL matching
//!
//! For every configured entry the URL host is checked for a set of needles:
//! the host of `base_api_url`, the vendor's public host and `{id}.`. The
//! longest matching needle wins. Entries whose needles all miss are asked
//! through [`GitProvider::can_handle`] and score zero. Equal scores keep the
//! entry configured first.

use std::fmt;
use std::str::FromStr;

use crate::api::common::{ProviderError, Result};
use crate::auth::sigv4::AwsCredentials;
use crate::config::{host_of, ProviderConfig};

use super::aws_codecommit::AwsCodeCommitProvider;
use super::azure_devops::AzureDevOpsProvider;
use super::bitbucket::BitbucketProvider;
use super::bitbucket_server::BitbucketServerProvider;
use super::gitea::GiteaProvider;
use super::gitee::GiteeProvider;
use super::github::GitHubProvider;
use super::gitlab::GitLabProvider;
use super::gitness::GitnessProvider;
use super::gogs::GogsProvider;
use super::GitProvider;

/// Stable identifiers of the supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    GitHub,
    GitHubEnterpriseServer,
    GitLab,
    GitLabSelfManaged,
    Bitbucket,
    BitbucketServer,
    Codeberg,
    Gitea,
    Gitness,
    AzureDevOps,
    AwsCodeCommit,
    Gogs,
    Gitee,
}

impl ProviderId {
    pub const ALL: [ProviderId; 13] = [
        Self::GitHub,
        Self::GitHubEnterpriseServer,
        Self::GitLab,
        Self::GitLabSelfManaged,
        Self::Bitbucket,
        Self::BitbucketServer,
        Self::Codeberg,
        Self::Gitea,
        Self::Gitness,
        Self::AzureDevOps,
        Self::AwsCodeCommit,
        Self::Gogs,
        Self::Gitee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitHubEnterpriseServer => "github-enterprise-server",
            Self::GitLab => "gitlab",
            Self::GitLabSelfManaged => "gitlab-self-managed",
            Self::Bitbucket => "bitbucket",
            Self::BitbucketServer => "bitbucket-server",
            Self::Codeberg => "codeberg",
            Self::Gitea => "gitea",
            Self::Gitness => "gitness",
            Self::AzureDevOps => "azure-devops",
            Self::AwsCodeCommit => "aws-codecommit",
            Self::Gogs => "gogs",
            Self::Gitee => "gitee",
        }
    }

    /// Self-hosted vendors cannot be reached without `base_api_url`.
    pub fn requires_base_url(&self) -> bool {
        matches!(
            self,
            Self::GitHubEnterpriseServer
                | Self::GitLabSelfManaged
                | Self::BitbucketServer
                | Self::Gitea
                | Self::Gitness
                | Self::AzureDevOps
                | Self::AwsCodeCommit
                | Self::Gogs
        )
    }

    /// Public host of SaaS vendors.
    pub fn default_host(&self) -> Option<&'static str> {
        match self {
            Self::GitHub => Some("github.com"),
            Self::GitLab => Some("gitlab.com"),
            Self::Bitbucket => Some("bitbucket.org"),
            Self::Codeberg => Some("codeberg.org"),
            Self::Gitee => Some("gitee.com"),
            Self::AzureDevOps => Some("dev.azure.com"),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ProviderError::Config(format!("unknown provider id '{s}'")))
    }
}

/// Builds the adapter described by `config`.
///
/// # Errors
///
/// [`ProviderError::Config`] for unknown ids, a missing `base_api_url` on a
/// self-hosted vendor, or missing AWS credentials.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn GitProvider>> {
    let id: ProviderId = config.id.parse()?;
    let base = config.base_api_url.as_deref().filter(|b| !b.is_empty());
    let token = config.token.as_str();

    let require_base = || {
        base.ok_or_else(|| ProviderError::Config(format!("{id} requires base_api_url")))
    };

    tracing::debug!("creating {} provider", id);

    let provider: Box<dyn GitProvider> = match id {
        ProviderId::GitHub => Box::new(GitHubProvider::with_id(id.as_str(), token, base)?),
        ProviderId::GitHubEnterpriseServer => {
            Box::new(GitHubProvider::new(token, Some(require_base()?))?)
        }
        ProviderId::GitLab => Box::new(GitLabProvider::new(token, None)?),
        ProviderId::GitLabSelfManaged => Box::new(GitLabProvider::new(token, Some(require_base()?))?),
        ProviderId::Bitbucket => {
            let (username, token) = basic_credentials(config);
            Box::new(BitbucketProvider::new(&username, &token, base)?)
        }
        ProviderId::BitbucketServer => {
            let (username, token) = basic_credentials(config);
            Box::new(BitbucketServerProvider::new(&username, &token, require_base()?)?)
        }
        ProviderId::Codeberg => match base {
            Some(base) => Box::new(GiteaProvider::with_id(id.as_str(), token, base)?),
            None => Box::new(GiteaProvider::codeberg(token)?),
        },
        ProviderId::Gitea => Box::new(GiteaProvider::new(token, require_base()?)?),
        ProviderId::Gitness => Box::new(GitnessProvider::new(token, require_base()?)?),
        ProviderId::AzureDevOps => Box::new(AzureDevOpsProvider::new(token, require_base()?)?),
        ProviderId::AwsCodeCommit => {
            let credentials = aws_credentials(config)?;
            Box::new(AwsCodeCommitProvider::new(credentials, require_base()?)?)
        }
        ProviderId::Gogs => Box::new(GogsProvider::new(token, require_base()?)?),
        ProviderId::Gitee => Box::new(GiteeProvider::new(token, base)?),
    };
    Ok(provider)
}

/// Username and secret for basic auth. A token of the form
/// `username:app-password` is split when no username is configured.
fn basic_credentials(config: &ProviderConfig) -> (String, String) {
    match config.username.as_deref().filter(|u| !u.is_empty()) {
        Some(username) => (username.to_string(), config.token.clone()),
        None => match config.token.split_once(':') {
            Some((username, secret)) => (username.to_string(), secret.to_string()),
            None => (String::new(), config.token.clone()),
        },
    }
}

/// Access key id in `username`, secret key in `token`, else the environment.
fn aws_credentials(config: &ProviderConfig) -> Result<AwsCredentials> {
    match config.username.as_deref().filter(|u| !u.is_empty()) {
        Some(access_key) if !config.token.is_empty() => {
            Ok(AwsCredentials::new(access_key, config.token.clone()))
        }
        _ => AwsCredentials::from_env().ok_or_else(|| {
            ProviderError::Config(
                "aws-codecommit needs an access key id (username) and secret (token) \
                 or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY"
                    .to_string(),
            )
        }),
    }
}

/// Resolves adapters from a fixed list of configured providers.
#[derive(Debug, Clone, Default)]
pub struct GitProviderService {
    providers: Vec<ProviderConfig>,
}

impl GitProviderService {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Adapter for the first entry configured with `id`.
    pub fn get_git_provider(&self, id: &str) -> Result<Box<dyn GitProvider>> {
        let config = self
            .providers
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ProviderError::NotFound(format!("provider '{id}' is not configured")))?;
        create_provider(config)
    }

    /// Adapter whose host best matches `url`.
    ///
    /// # Errors
    ///
    /// [`ProviderError::NotFound`] when no configured provider matches.
    pub fn get_git_provider_for_url(&self, url: &str) -> Result<Box<dyn GitProvider>> {
        let host = host_of(url);
        let mut best: Option<(usize, Box<dyn GitProvider>)> = None;

        for config in &self.providers {
            let score = host.as_deref().and_then(|h| match_score(config, h));
            let provider = match create_provider(config) {
                Ok(provider) => provider,
                Err(err) => {
                    tracing::debug!("skipping provider {}: {}", config.id, err);
                    continue;
                }
            };

            let score = match score {
                Some(score) => score,
                None if provider.can_handle(url).unwrap_or(false) => 0,
                None => continue,
            };

            if best.as_ref().map_or(true, |(current, _)| score > *current) {
                tracing::debug!("{} matches {} with score {}", config.id, url, score);
                best = Some((score, provider));
            }
        }

        best.map(|(_, provider)| provider)
            .ok_or_else(|| ProviderError::NotFound(format!("no configured provider handles {url}")))
    }

    /// Looks up the account a token belongs to without keeping the adapter.
    pub async fn get_username_from_token(
        id: &str,
        token: &str,
        base_url: Option<&str>,
    ) -> Result<String> {
        let mut config = ProviderConfig::new(id, token);
        config.base_api_url = base_url.map(str::to_string);
        let provider = create_provider(&config)?;
        let user = provider.get_user().await?;
        Ok(user.username)
    }
}

/// Length of the longest needle of `config` contained in `host`.
fn match_score(config: &ProviderConfig, host: &str) -> Option<usize> {
    let mut needles = vec![format!("{}.", config.id)];
    if let Some(base) = config.base_host() {
        needles.push(base);
    }
    if let Some(default) = config.id.parse::<ProviderId>().ok().and_then(|id| id.default_host()) {
        needles.push(default.to_string());
    }

    needles
        .into_iter()
        .filter(|needle| host.contains(needle.as_str()))
        .map(|needle| needle.len())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_id_round_trip() {
        for id in ProviderId::ALL {
            assert_eq!(id.as_str().parse::<ProviderId>().unwrap(), id);
            assert_eq!(id.to_string(), id.as_str());
        }
        assert!("sourceforge".parse::<ProviderId>().is_err());
    }

    #[test]
    fn test_missing_base_url_is_a_config_error() {
        let err = create_provider(&ProviderConfig::new("gitea", "t")).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
        assert!(create_provider(&ProviderConfig::new("github", "t")).is_ok());
    }

    #[test]
    fn test_get_git_provider() {
        let service = GitProviderService::new(vec![
            ProviderConfig::new("gitlab", "t"),
            ProviderConfig::new("github", "t"),
        ]);
        assert_eq!(service.get_git_provider("github").unwrap().id(), "github");
        assert!(service.get_git_provider("gitee").err().unwrap().is_not_found());
    }

    #[test]
    fn test_for_url_by_id_and_default_host() {
        let service = GitProviderService::new(vec![
            ProviderConfig::new("github", "t"),
            ProviderConfig::new("gitlab", "t"),
            ProviderConfig::new("bitbucket", "u:p"),
        ]);
        let provider = service
            .get_git_provider_for_url("https://gitlab.com/org/sub/repo")
            .unwrap();
        assert_eq!(provider.id(), "gitlab");
        let provider = service
            .get_git_provider_for_url("git@bitbucket.org:ws/repo.git")
            .unwrap();
        assert_eq!(provider.id(), "bitbucket");
        assert!(service
            .get_git_provider_for_url("https://gitee.com/a/b")
            .err()
            .unwrap()
            .is_not_found());
    }

    #[test]
    fn test_for_url_longest_host_wins() {
        let service = GitProviderService::new(vec![
            ProviderConfig::new("gitea", "t").with_base_api_url("https://example.com"),
            ProviderConfig::new("gitlab-self-managed", "t")
                .with_base_api_url("https://gitlab.example.com/api/v4"),
        ]);
        let provider = service
            .get_git_provider_for_url("https://gitlab.example.com/team/app")
            .unwrap();
        assert_eq!(provider.id(), "gitlab-self-managed");
    }

    #[test]
    fn test_for_url_tie_keeps_first_configured() {
        let service = GitProviderService::new(vec![
            ProviderConfig::new("gitea", "t").with_base_api_url("https://git.example.com"),
            ProviderConfig::new("gogs", "t").with_base_api_url("https://git.example.com"),
        ]);
        let provider = service
            .get_git_provider_for_url("https://git.example.com/team/app")
            .unwrap();
        assert_eq!(provider.id(), "gitea");
    }

    #[test]
    fn test_for_url_falls_back_to_can_handle() {
        let service = GitProviderService::new(vec![ProviderConfig::new("aws-codecommit", "secret")
            .with_username("AKIDEXAMPLE")
            .with_base_api_url("https://eu-west-1.console.aws.amazon.com")]);
        let provider = service
            .get_git_provider_for_url("https://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app")
            .unwrap();
        assert_eq!(provider.id(), "aws-codecommit");
    }

    #[test]
    fn test_basic_credentials_split() {
        let (user, secret) = basic_credentials(&ProviderConfig::new("bitbucket", "jdoe:app-pass"));
        assert_eq!((user.as_str(), secret.as_str()), ("jdoe", "app-pass"));
        let (user, secret) =
            basic_credentials(&ProviderConfig::new("bitbucket", "tok").with_username("me"));
        assert_eq!((user.as_str(), secret.as_str()), ("me", "tok"));
    }

    #[tokio::test]
    async fn test_get_username_from_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/user")
            .match_header("authorization", "token abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "login": "jdoe", "full_name": "J Doe", "email": "j@example.com"}"#)
            .create_async()
            .await;

        let username =
            GitProviderService::get_username_from_token("gitea", "abc", Some(&server.url()))
                .await
                .unwrap();
        assert_eq!(username, "jdoe");
        mock.assert_async().await;
    }
}
