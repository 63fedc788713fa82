//
//  git-providers
//  config/hosts.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Host Helpers
//!
//! Hostname extraction and normalization used when matching a repository URL
//! against the configured providers.
//!
//! ```rust
//! use git_providers::config::{host_of, normalize_host};
//!
//! assert_eq!(normalize_host("  HTTPS://GitHub.com/  "), "github.com");
//! assert_eq!(host_of("git@gitlab.com:group/project.git").as_deref(), Some("gitlab.com"));
//! ```

/// Normalizes a host URL to a bare lowercase hostname.
///
/// Lowercases, then removes the protocol prefix and a trailing slash.
/// Ports and paths are kept.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    let host = host.strip_prefix("https://").unwrap_or(&host);
    let host = host.strip_prefix("http://").unwrap_or(host);
    host.strip_suffix('/').unwrap_or(host).to_string()
}

/// Hostname (without port) of an HTTP(S), `ssh://` or `git@host:path` URL.
///
/// Scheme-less input such as `gitlab.example.com/team/app` is accepted too.
pub fn host_of(url: &str) -> Option<String> {
    let url = url.trim();

    if let Some(rest) = url.strip_prefix("git@") {
        return rest
            .split(':')
            .next()
            .filter(|h| !h.is_empty())
            .map(str::to_lowercase);
    }

    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        .or_else(|| bare_host(url))
}

/// `gitlab.example.com:8443/team/app` → `gitlab.example.com`
fn bare_host(url: &str) -> Option<String> {
    let normalized = normalize_host(url);
    let host = normalized.split('/').next()?.split(':').next()?;
    (host.contains('.') && !host.chars().any(char::is_whitespace)).then(|| host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("https://bitbucket.org"), "bitbucket.org");
        assert_eq!(normalize_host("http://git.example.com:3000/"), "git.example.com:3000");
        assert_eq!(normalize_host("GITEE.COM"), "gitee.com");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://GitHub.com/a/b").as_deref(), Some("github.com"));
        assert_eq!(host_of("http://localhost:3000/a/b").as_deref(), Some("localhost"));
        assert_eq!(
            host_of("ssh://git-codecommit.eu-west-1.amazonaws.com/v1/repos/app").as_deref(),
            Some("git-codecommit.eu-west-1.amazonaws.com")
        );
        assert_eq!(host_of("git@bitbucket.org:ws/repo.git").as_deref(), Some("bitbucket.org"));
        assert_eq!(
            host_of("Gitea.Example.com:3000/team/app").as_deref(),
            Some("gitea.example.com")
        );
        assert_eq!(host_of("not a url"), None);
    }
}
