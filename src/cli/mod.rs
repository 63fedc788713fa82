//
//  git-providers
//  cli/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! CLI command definitions using clap derive macros

mod completion;
mod listing;
mod providers;
mod url;
mod whoami;

pub use completion::CompletionCommand;
pub use listing::{BranchesCommand, NamespacesCommand, PrsCommand, ReposCommand};
pub use providers::ProvidersCommand;
pub use url::{ContextCommand, LinkCommand, ParseCommand};
pub use whoami::WhoamiCommand;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::api::common::ProviderError;
use crate::config::{host_of, Config, ProviderConfig};
use crate::context::{GitContext, ListOptions};
use crate::output::{OutputFormat, OutputWriter};
use crate::providers::{create_provider, GitProvider, GitProviderService, ProviderId};

/// gp - Work with git hosting providers from the command line
#[derive(Parser, Debug)]
#[command(
    name = "gp",
    version,
    about = "Work with git hosting providers from the command line",
    long_about = "gp resolves repository URLs from GitHub, GitLab, Bitbucket, Azure DevOps, \
                  Gitea, Gogs, Gitee, Gitness and AWS CodeCommit into a common shape.\n\n\
                  It parses and builds URLs and lists namespaces, repositories, branches \
                  and pull requests.",
    propagate_version = true,
    after_help = "Use 'gp <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Configured provider id to use instead of matching by URL
    #[arg(long, short = 'P', global = true, env = "GP_PROVIDER")]
    pub provider: Option<String>,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalOptions {
    pub fn output(&self) -> OutputWriter {
        OutputWriter::new(if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Table
        })
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a repository URL without network access
    Parse(ParseCommand),

    /// Build a repository URL from a repository and a selector
    Link(LinkCommand),

    /// Resolve a URL to a repository with branch and head commit
    Context(ContextCommand),

    /// List namespaces (organizations, groups, workspaces, projects)
    #[command(visible_alias = "ns")]
    Namespaces(NamespacesCommand),

    /// List repositories in a namespace
    Repos(ReposCommand),

    /// List branches of a repository
    Branches(BranchesCommand),

    /// List open pull requests of a repository
    Prs(PrsCommand),

    /// Show the account a token belongs to
    Whoami(WhoamiCommand),

    /// List supported and configured providers
    Providers(ProvidersCommand),

    /// Generate shell completion scripts
    Completion(CompletionCommand),
}

/// Paging flags shared by the listing commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Items per page
    #[arg(long, short = 'L', default_value = "30")]
    pub limit: u32,
}

impl From<PageArgs> for ListOptions {
    fn from(args: PageArgs) -> Self {
        ListOptions {
            page: args.page,
            per_page: args.limit,
        }
    }
}

/// The URL argument, or the `origin` remote of the repository in the
/// current directory.
pub(crate) fn url_or_origin(url: Option<&str>) -> Result<String> {
    if let Some(url) = url {
        return Ok(url.to_string());
    }
    GitContext::open()
        .context("No URL given and not inside a git repository")?
        .origin_url()?
        .ok_or_else(|| anyhow::anyhow!("No URL given and the repository has no 'origin' remote"))
}

/// Picks the adapter for a command.
///
/// `--provider` wins. Otherwise a URL is matched against the configuration,
/// falling back to an anonymous adapter for public hosts. Without a URL the
/// only configured provider is used.
pub(crate) fn select_provider(
    global: &GlobalOptions,
    url: Option<&str>,
) -> Result<Box<dyn GitProvider>> {
    let config = Config::load()?;
    let service = GitProviderService::new(config.providers);

    if let Some(id) = &global.provider {
        return service.get_git_provider(id).or_else(|err| {
            if err.is_not_found() {
                anonymous_provider(id)
            } else {
                Err(err.into())
            }
        });
    }

    if let Some(url) = url {
        return match service.get_git_provider_for_url(url) {
            Ok(provider) => Ok(provider),
            Err(err) if err.is_not_found() => public_provider_for_url(url).ok_or_else(|| err.into()),
            Err(err) => Err(err.into()),
        };
    }

    match service.providers() {
        [only] => Ok(create_provider(only)?),
        [] => anyhow::bail!("No providers configured. Run 'gp providers add <id>' first."),
        _ => anyhow::bail!("Several providers are configured; choose one with --provider"),
    }
}

/// Unauthenticated adapter for a SaaS provider that is not configured.
fn anonymous_provider(id: &str) -> Result<Box<dyn GitProvider>> {
    let provider_id: ProviderId = id.parse()?;
    if provider_id.requires_base_url() {
        return Err(ProviderError::NotFound(format!("provider '{id}' is not configured")).into());
    }
    Ok(create_provider(&ProviderConfig::new(id, ""))?)
}

fn public_provider_for_url(url: &str) -> Option<Box<dyn GitProvider>> {
    let host = host_of(url)?;
    let id = ProviderId::ALL
        .into_iter()
        .find(|id| id.default_host().is_some_and(|h| host.ends_with(h)))?;
    tracing::debug!("using anonymous {} provider for {}", id, url);
    create_provider(&ProviderConfig::new(id.as_str(), "")).ok()
}
