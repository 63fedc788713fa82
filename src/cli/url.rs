//
//  git-providers
//  cli/url.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! URL commands: `parse`, `link` and `context`

use anyhow::Result;
use clap::Args;

use super::{select_provider, url_or_origin, GlobalOptions};
use crate::context::{GitContext, RepositoryContextRequest};

/// Parse a repository URL without network access
#[derive(Args, Debug)]
pub struct ParseCommand {
    /// Repository URL (defaults to the origin remote)
    pub url: Option<String>,

    /// Also perform lookups the URL cannot carry (e.g. Azure repository ids)
    #[arg(long)]
    pub resolve: bool,
}

impl ParseCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let url = url_or_origin(self.url.as_deref())?;
        let provider = select_provider(global, Some(&url))?;

        let ctx = if self.resolve {
            provider.resolve_static_git_context(&url).await?
        } else {
            provider.parse_static_git_context(&url)?
        };

        global.output().write(&ctx)
    }
}

/// Build a repository URL from a repository and a selector
#[derive(Args, Debug)]
pub struct LinkCommand {
    /// Repository URL (defaults to the origin remote)
    pub url: Option<String>,

    /// Branch to link to
    #[arg(long, short = 'b', conflicts_with_all = ["commit", "pr"])]
    pub branch: Option<String>,

    /// Commit to link to
    #[arg(long, short = 'c', conflicts_with = "pr")]
    pub commit: Option<String>,

    /// File path inside the repository
    #[arg(long, conflicts_with = "pr")]
    pub path: Option<String>,

    /// Pull request number
    #[arg(long)]
    pub pr: Option<u32>,

    /// Open the link in the browser
    #[arg(long, short = 'w')]
    pub web: bool,
}

impl LinkCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let url = url_or_origin(self.url.as_deref())?;
        let provider = select_provider(global, Some(&url))?;
        let ctx = provider.parse_static_git_context(&url)?;

        let mut request = RepositoryContextRequest::from_context(&ctx);
        request.pr_number = self.pr;
        if self.pr.is_some() {
            request.branch = None;
            request.sha = None;
            request.path = None;
        }
        if let Some(branch) = &self.branch {
            request.branch = Some(branch.clone());
            request.sha = None;
        }
        if let Some(commit) = &self.commit {
            request.branch = Some(commit.clone());
            request.sha = Some(commit.clone());
        }
        if let Some(path) = &self.path {
            request.path = Some(path.trim_start_matches('/').to_string());
        }

        let link = provider.get_url_from_context(&request);
        if self.web {
            webbrowser::open(&link)?;
        }
        if global.json {
            crate::output::write_json(&serde_json::json!({ "url": link }))
        } else {
            println!("{link}");
            Ok(())
        }
    }
}

/// Resolve a URL to a repository with branch and head commit
#[derive(Args, Debug)]
pub struct ContextCommand {
    /// Repository URL (defaults to the origin remote at the checked-out branch)
    pub url: Option<String>,

    /// Override the branch
    #[arg(long, short = 'b')]
    pub branch: Option<String>,

    /// Override the commit
    #[arg(long, short = 'c')]
    pub sha: Option<String>,

    /// Select a pull request
    #[arg(long)]
    pub pr: Option<u32>,
}

impl ContextCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let url = url_or_origin(self.url.as_deref())?;
        let provider = select_provider(global, Some(&url))?;

        let mut request = RepositoryContextRequest {
            branch: self.branch.clone(),
            sha: self.sha.clone(),
            pr_number: self.pr,
            ..RepositoryContextRequest::new(url)
        };
        if self.url.is_none() && request.branch.is_none() && request.sha.is_none() && self.pr.is_none() {
            checkout_ref(&mut request);
        }
        let repo = provider.get_repository_context(&request).await?;

        global.output().write(&repo)
    }
}

/// Selects the local checkout's branch, or its HEAD commit when detached.
fn checkout_ref(request: &mut RepositoryContextRequest) {
    let Ok(git) = GitContext::open() else {
        return;
    };
    match git.current_branch() {
        Some(branch) => request.branch = Some(branch),
        None => request.sha = git.head_sha(),
    }
}
