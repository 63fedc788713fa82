//
//  git-providers
//  cli/listing.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Listing commands: `namespaces`, `repos`, `branches` and `prs`
//!
//! Ids are the ones the provider itself returns: `gp namespaces` prints the
//! namespace ids `gp repos` accepts, and `gp repos` prints the repository ids
//! `gp branches` and `gp prs` accept. `<PERSONAL>`, the default, selects the
//! authenticated user's own namespace.

use anyhow::Result;
use clap::Args;

use super::{select_provider, GlobalOptions, PageArgs};
use crate::context::{ListOptions, PERSONAL_NAMESPACE_ID};

/// List namespaces (organizations, groups, workspaces, projects)
#[derive(Args, Debug)]
pub struct NamespacesCommand {
    #[command(flatten)]
    pub page: PageArgs,
}

impl NamespacesCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let provider = select_provider(global, None)?;
        let namespaces = provider.get_namespaces(&ListOptions::from(self.page)).await?;
        global.output().write_list(&namespaces)
    }
}

/// List repositories in a namespace
#[derive(Args, Debug)]
pub struct ReposCommand {
    /// Namespace id
    #[arg(default_value = PERSONAL_NAMESPACE_ID)]
    pub namespace: String,

    #[command(flatten)]
    pub page: PageArgs,
}

impl ReposCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let provider = select_provider(global, None)?;
        let repos = provider
            .get_repositories(&self.namespace, &ListOptions::from(self.page))
            .await?;
        global.output().write_list(&repos)
    }
}

/// Repository selector shared by `branches` and `prs`.
#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Repository id
    pub repository: String,

    /// Namespace id
    #[arg(long, short = 'n', default_value = PERSONAL_NAMESPACE_ID)]
    pub namespace: String,

    #[command(flatten)]
    pub page: PageArgs,
}

/// List branches of a repository
#[derive(Args, Debug)]
pub struct BranchesCommand {
    #[command(flatten)]
    pub repo: RepoArgs,
}

impl BranchesCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let provider = select_provider(global, None)?;
        let branches = provider
            .get_repo_branches(
                &self.repo.repository,
                &self.repo.namespace,
                &ListOptions::from(self.repo.page),
            )
            .await?;
        global.output().write_list(&branches)
    }
}

/// List open pull requests of a repository
#[derive(Args, Debug)]
pub struct PrsCommand {
    #[command(flatten)]
    pub repo: RepoArgs,
}

impl PrsCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let provider = select_provider(global, None)?;
        let result = provider
            .get_repo_prs(
                &self.repo.repository,
                &self.repo.namespace,
                &ListOptions::from(self.repo.page),
            )
            .await;

        match result {
            Ok(prs) => global.output().write_list(&prs),
            Err(err) if err.is_unsupported() => {
                global.output().write_warning(&err.to_string());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
