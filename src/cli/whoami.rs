//
//  git-providers
//  cli/whoami.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! `gp whoami`: the account behind a configured provider or a raw token

use anyhow::Result;
use clap::Args;

use super::{select_provider, GlobalOptions};
use crate::auth::{read_token_from_stdin, validate_token};
use crate::providers::GitProviderService;

/// Show the account a token belongs to
#[derive(Args, Debug)]
pub struct WhoamiCommand {
    /// Read a token from stdin and check it against --provider instead of
    /// using the configured credentials
    #[arg(long)]
    pub with_token: bool,

    /// API base URL for self-hosted providers (with --with-token)
    #[arg(long, requires = "with_token")]
    pub base_url: Option<String>,
}

impl WhoamiCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        if self.with_token {
            return self.check_token(global).await;
        }

        let provider = select_provider(global, None)?;
        let user = provider.get_user().await?;
        global.output().write(&user)
    }

    async fn check_token(&self, global: &GlobalOptions) -> Result<()> {
        let id = global
            .provider
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--with-token needs --provider"))?;

        let token = read_token_from_stdin()?;
        if !validate_token(&token) {
            anyhow::bail!("The token read from stdin is empty or contains whitespace");
        }

        let username =
            GitProviderService::get_username_from_token(id, &token, self.base_url.as_deref()).await?;

        if global.json {
            crate::output::write_json(&serde_json::json!({ "provider": id, "username": username }))
        } else {
            println!("{username}");
            Ok(())
        }
    }
}
