//
//  git-providers
//  config/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration Module
//!
//! Provider credentials for the `gp` binary, stored as TOML in the
//! platform-specific configuration directory.
//!
//! ## Configuration File Location
//!
//! - **Linux**: `~/.config/gp/config.toml`
//! - **macOS**: `~/Library/Application Support/gp/config.toml`
//! - **Windows**: `C:\Users\<User>\AppData\Roaming\gp\config.toml`
//!
//! `GP_CONFIG` overrides the location.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [[providers]]
//! id = "github"
//! token = "ghp_xxx"
//!
//! [[providers]]
//! id = "bitbucket-server"
//! username = "jdoe"
//! token = "xxxx"
//! base_api_url = "https://bitbucket.example.com/rest"
//!
//! [[providers]]
//! id = "aws-codecommit"
//! username = "AKIA..."
//! token = "secret"
//! base_api_url = "https://eu-west-1.console.aws.amazon.com"
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use git_providers::config::Config;
//!
//! let config = Config::load()?;
//! for provider in &config.providers {
//!     println!("{}", provider.id);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Submodules
//!
//! - [`file`]: Low-level configuration file I/O
//! - [`hosts`]: Host normalization used for URL dispatch

mod file;
mod hosts;

pub use file::*;
pub use hosts::*;

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "GP_CONFIG";

/// Every configured provider, in the order they were added.
///
/// The order matters for URL dispatch: when two providers match a URL equally
/// well, the one configured first wins.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// Credentials and endpoint for one provider instance.
///
/// # Fields
///
/// * `id` - Provider id such as `github` or `gitlab-self-managed`
/// * `token` - Access token, app password or AWS secret key
/// * `username` - Needed by Bitbucket (basic auth) and AWS (access key id)
/// * `base_api_url` - API root; required for self-hosted providers
/// * `signing_key` / `signing_method` - Commit-signing settings carried for
///   other tools; the provider layer does not read them
#[derive(Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_method: Option<String>,
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_base_api_url(mut self, url: impl Into<String>) -> Self {
        self.base_api_url = Some(url.into());
        self
    }

    /// Host of `base_api_url`, when one is configured.
    pub fn base_host(&self) -> Option<String> {
        self.base_api_url.as_deref().and_then(host_of)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("base_api_url", &self.base_api_url)
            .finish()
    }
}

impl Config {
    /// Loads the configuration from [`Config::config_path`].
    ///
    /// A missing file is not an error; defaults are used.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or is not valid TOML.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !config_exists(path) {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = read_config_file(path)?;
        toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Saves the configuration to [`Config::config_path`].
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Saves the configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("cannot serialize config")?;
        write_config_file(path, &content)
    }

    /// Path of the configuration file: `GP_CONFIG` or the platform config dir.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let dirs = ProjectDirs::from("", "", "gp")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// First provider configured with `id`.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Adds `provider`, replacing an entry with the same id and base URL.
    ///
    /// Replaced entries keep their position.
    pub fn upsert(&mut self, provider: ProviderConfig) {
        match self
            .providers
            .iter_mut()
            .find(|p| p.id == provider.id && p.base_api_url == provider.base_api_url)
        {
            Some(existing) => *existing = provider,
            None => self.providers.push(provider),
        }
    }

    /// Removes every entry with `id`. Returns `true` when something was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|p| p.id != id);
        self.providers.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.upsert(ProviderConfig::new("github", "ghp_1"));
        config.upsert(
            ProviderConfig::new("bitbucket-server", "secret")
                .with_username("jdoe")
                .with_base_api_url("https://bitbucket.example.com/rest"),
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.provider("bitbucket-server").unwrap().base_host().as_deref(),
            Some("bitbucket.example.com")
        );
    }

    #[test]
    fn test_optional_fields_are_not_written() {
        let mut config = Config::default();
        config.upsert(ProviderConfig::new("github", "t"));
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[[providers]]"));
        assert!(!text.contains("base_api_url"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "providers = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut config = Config::default();
        config.upsert(ProviderConfig::new("github", "old"));
        config.upsert(ProviderConfig::new("gitlab", "g"));
        config.upsert(ProviderConfig::new("github", "new"));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].token, "new");
        assert!(config.remove("gitlab"));
        assert!(!config.remove("gitlab"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", ProviderConfig::new("github", "ghp_secret"));
        assert!(!debug.contains("ghp_secret"));
    }
}
