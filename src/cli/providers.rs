//
//  git-providers
//  cli/providers.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! `gp providers`: supported ids and the configured entries

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::GlobalOptions;
use crate::auth::{read_token_from_stdin, validate_token};
use crate::config::{Config, ProviderConfig};
use crate::output::{TableOutput, write_json};
use crate::providers::{GitProviderService, ProviderId};

/// List supported and configured providers
#[derive(Args, Debug)]
pub struct ProvidersCommand {
    #[command(subcommand)]
    pub command: Option<ProvidersSubcommand>,
}

#[derive(Subcommand, Debug)]
pub enum ProvidersSubcommand {
    /// List every supported provider id (default)
    #[command(visible_alias = "ls")]
    List,

    /// Show configured providers
    Configured,

    /// Add or replace a configured provider; the token is read from stdin
    Add(AddArgs),

    /// Remove every configured entry with an id
    Remove {
        /// Provider id
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Provider id
    pub id: String,

    /// Username (Bitbucket) or access key id (AWS CodeCommit)
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// API base URL, required for self-hosted providers
    #[arg(long)]
    pub base_url: Option<String>,

    /// Store the token without checking it against the provider
    #[arg(long)]
    pub no_verify: bool,
}

/// Row of `gp providers list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SupportedProvider {
    id: &'static str,
    requires_base_url: bool,
    default_host: Option<&'static str>,
}

/// Row of `gp providers configured`; never carries the token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfiguredProvider {
    id: String,
    username: Option<String>,
    base_api_url: Option<String>,
}

impl TableOutput for SupportedProvider {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.to_string()),
            ("Host", self.default_host.unwrap_or("self-hosted").to_string()),
            ("Needs base URL", (if self.requires_base_url { "yes" } else { "no" }).to_string()),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Host", "Needs base URL"]
    }
}

impl TableOutput for ConfiguredProvider {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.clone()),
            ("Username", self.username.clone().unwrap_or_else(|| "-".into())),
            ("Base URL", self.base_api_url.clone().unwrap_or_else(|| "-".into())),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Username", "Base URL"]
    }
}

impl From<&ProviderConfig> for ConfiguredProvider {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            username: config.username.clone(),
            base_api_url: config.base_api_url.clone(),
        }
    }
}

impl ProvidersCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        match &self.command {
            None | Some(ProvidersSubcommand::List) => self.list(global),
            Some(ProvidersSubcommand::Configured) => self.configured(global),
            Some(ProvidersSubcommand::Add(args)) => self.add(args, global).await,
            Some(ProvidersSubcommand::Remove { id }) => self.remove(id, global),
        }
    }

    fn list(&self, global: &GlobalOptions) -> Result<()> {
        let rows: Vec<SupportedProvider> = ProviderId::ALL
            .into_iter()
            .map(|id| SupportedProvider {
                id: id.as_str(),
                requires_base_url: id.requires_base_url(),
                default_host: id.default_host(),
            })
            .collect();
        global.output().write_list(&rows)
    }

    fn configured(&self, global: &GlobalOptions) -> Result<()> {
        let config = Config::load()?;
        let rows: Vec<ConfiguredProvider> = config.providers.iter().map(Into::into).collect();
        global.output().write_list(&rows)
    }

    async fn add(&self, args: &AddArgs, global: &GlobalOptions) -> Result<()> {
        let id: ProviderId = args.id.parse()?;
        if id.requires_base_url() && args.base_url.is_none() {
            anyhow::bail!("{id} requires --base-url");
        }

        let token = read_token_from_stdin()?;
        if !validate_token(&token) {
            anyhow::bail!("The token read from stdin is empty or contains whitespace");
        }

        let mut entry = ProviderConfig::new(id.as_str(), token);
        entry.username = args.username.clone();
        entry.base_api_url = args.base_url.clone();

        if !args.no_verify {
            let provider = GitProviderService::new(vec![entry.clone()]).get_git_provider(id.as_str())?;
            let user = provider.get_user().await?;
            tracing::debug!("token for {} belongs to {}", id, user.username);
            if !global.json {
                println!("Authenticated as {}", user.username);
            }
        }

        let mut config = Config::load()?;
        config.upsert(entry);
        config.save()?;

        if global.json {
            write_json(&serde_json::json!({ "added": id.as_str() }))?;
        } else {
            println!("Saved {id} to {}", Config::config_path()?.display());
        }
        Ok(())
    }

    fn remove(&self, id: &str, global: &GlobalOptions) -> Result<()> {
        let mut config = Config::load()?;
        if !config.remove(id) {
            anyhow::bail!("Provider '{id}' is not configured");
        }
        config.save()?;

        if global.json {
            write_json(&serde_json::json!({ "removed": id }))
        } else {
            println!("Removed {id}");
            Ok(())
        }
    }
}
