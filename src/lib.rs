//
//  git-providers
//  lib.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Git Providers Library
//!
//! A vendor-neutral layer over git hosting services: it turns repository URLs
//! from any supported vendor into one canonical context, builds URLs back from
//! that context, and answers the handful of questions a workspace or prebuild
//! system needs (branches, pull requests, head commits, webhooks).
//!
//! ## Supported vendors
//!
//! GitHub and GitHub Enterprise Server, GitLab and self-managed GitLab,
//! Bitbucket Cloud, Bitbucket Server/Data Center, Azure DevOps, Gitea,
//! Codeberg, Gogs, Gitee, Gitness and AWS CodeCommit.
//!
//! ## Module Structure
//!
//! - [`context`]: Canonical model and the shared URL grammar
//! - [`providers`]: The [`providers::GitProvider`] trait, one adapter per vendor and dispatch
//! - [`api`]: HTTP client and the [`api::common::ProviderError`] taxonomy
//! - [`auth`]: Credential schemes and AWS SigV4 signing
//! - [`config`]: Configured provider entries
//! - [`cli`] and [`output`]: The `gp` binary
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use git_providers::config::ProviderConfig;
//! use git_providers::providers::GitProviderService;
//!
//! # fn main() -> anyhow::Result<()> {
//! let service = GitProviderService::new(vec![ProviderConfig::new("gitlab", "glpat-xxx")]);
//! let provider = service.get_git_provider_for_url("https://gitlab.com/org/sub/repo")?;
//! let ctx = provider.parse_static_git_context("https://gitlab.com/org/sub/repo")?;
//! assert_eq!(ctx.owner, "org/sub");
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions for `gp`.
pub mod cli;

/// HTTP client, vendor error decoding and the error taxonomy.
pub mod api;

/// Authentication schemes applied to outgoing requests.
pub mod auth;

/// Provider configuration persisted as TOML.
pub mod config;

/// Canonical repository model and URL grammar.
pub mod context;

/// Table and JSON rendering.
pub mod output;

/// Vendor adapters and dispatch.
pub mod providers;

pub use api::common::ProviderError;
pub use config::{Config, ProviderConfig};
pub use context::StaticGitContext;
pub use providers::{GitProvider, GitProviderService};

/// Binary name.
pub const APP_NAME: &str = "gp";

/// Crate version, also sent in the `User-Agent` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process exit codes of the `gp` binary.
pub mod exit_codes {
    /// The command completed without errors.
    pub const SUCCESS: i32 = 0;

    /// An unspecified error occurred. Check stderr for details.
    pub const ERROR: i32 = 1;

    /// Invalid arguments or configuration.
    pub const USAGE: i32 = 2;

    /// The vendor rejected the credentials (401/403).
    pub const AUTH_ERROR: i32 = 4;

    /// Repository, branch, pull request or provider not found.
    pub const NOT_FOUND: i32 = 8;

    /// The vendor has no API for the requested operation.
    pub const UNSUPPORTED: i32 = 16;

    /// The vendor's rate limit was exceeded (429).
    pub const RATE_LIMIT: i32 = 32;

    use crate::api::common::ProviderError;

    /// Exit code for an error returned by a command.
    pub fn for_error(err: &anyhow::Error) -> i32 {
        let Some(provider_err) = err.downcast_ref::<ProviderError>() else {
            return ERROR;
        };
        match provider_err {
            ProviderError::Config(_) | ProviderError::Parse { .. } => USAGE,
            ProviderError::Unsupported { .. } => UNSUPPORTED,
            e if e.is_not_found() => NOT_FOUND,
            e => match e.status() {
                Some(401 | 403) => AUTH_ERROR,
                Some(429) => RATE_LIMIT,
                _ => ERROR,
            },
        }
    }

}
