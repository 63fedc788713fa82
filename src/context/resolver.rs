//
//  git-providers
//  context/resolver.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Base URL Grammar
//!
//! Parses the two URL forms every vendor accepts into an owner/name/source/url
//! skeleton. Whatever follows the repository name is kept as an opaque `path`
//! for the vendor adapter to interpret.
//!
//! ## Supported Formats
//!
//! | Format | Example |
//! |--------|---------|
//! | SSH | `git@github.com:owner/repo.git` |
//! | HTTPS | `https://github.com/owner/repo` |
//! | HTTPS with route | `https://github.com/owner/repo/tree/main` |
//!
//! The clone URL is always rebuilt from its parts, so query strings and vendor
//! routing segments never reach it.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::api::common::{ProviderError, Result};
use crate::context::StaticGitContext;

/// SSH remote: `git@host:owner/repo.git`. Owner may span several segments.
static SSH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^git@([\w.\-]+):(.+)/(.+?)(?:\.git)?$").unwrap());

/// Rebuilds the canonical clone URL `{scheme}://{source}/{owner}/{name}.git`.
///
/// # Example
///
/// ```rust
/// use git_providers::context::clone_url;
///
/// assert_eq!(
///     clone_url("github.com", "daytonaio", "daytona", true),
///     "https://github.com/daytonaio/daytona.git"
/// );
/// ```
pub fn clone_url(source: &str, owner: &str, name: &str, https: bool) -> String {
    let scheme = if https { "https" } else { "http" };
    format!("{scheme}://{source}/{owner}/{name}.git")
}

/// Parses an SSH or HTTP(S) git URL with the shared grammar.
///
/// For HTTP(S) input the first path segment becomes `owner`, the second `name`
/// (and `id`), and the remaining segments are joined back into `path`.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] for input that is neither `git@...` nor
/// `http...`, or whose path has fewer than two segments.
///
/// # Example
///
/// ```rust
/// use git_providers::context::parse_static_git_context;
///
/// let ctx = parse_static_git_context("https://github.com/daytonaio/daytona/tree/main").unwrap();
/// assert_eq!(ctx.owner, "daytonaio");
/// assert_eq!(ctx.name, "daytona");
/// assert_eq!(ctx.path.as_deref(), Some("tree/main"));
/// ```
pub fn parse_static_git_context(repo_url: &str) -> Result<StaticGitContext> {
    let repo_url = repo_url.trim();

    if let Some(caps) = SSH_PATTERN.captures(repo_url) {
        let source = &caps[1];
        let owner = &caps[2];
        let name = &caps[3];
        return Ok(StaticGitContext::from_parts(source, owner, name, true));
    }

    if !repo_url.starts_with("http") {
        return Err(ProviderError::parse(repo_url));
    }

    let parsed = parse_http(repo_url)?;
    let segments = path_segments(parsed.path());
    if segments.len() < 2 {
        return Err(ProviderError::parse_with(
            repo_url,
            "expected owner and repository name",
        ));
    }

    let source = host_with_port(&parsed, repo_url)?;
    let owner = segments[0];
    let name = strip_git_suffix(segments[1]);
    let mut ctx =
        StaticGitContext::from_parts(&source, owner, name, parsed.scheme() == "https");
    ctx.path = join_segments(&segments[2..]);

    Ok(ctx)
}

/// Parses an HTTP(S) URL, mapping failures to [`ProviderError::Parse`].
pub fn parse_http(repo_url: &str) -> Result<Url> {
    let parsed = Url::parse(repo_url.trim_end_matches(".git"))
        .map_err(|e| ProviderError::parse_with(repo_url, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ProviderError::parse_with(
            repo_url,
            format!("unsupported scheme {other}"),
        )),
    }
}

/// `host[:port]` of a parsed URL.
pub fn host_with_port(parsed: &Url, repo_url: &str) -> Result<String> {
    let host = parsed
        .host_str()
        .ok_or_else(|| ProviderError::parse_with(repo_url, "missing host"))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Splits a URL path on `/`, dropping empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Joins segments with `/`; `None` when there are none.
pub fn join_segments(segments: &[&str]) -> Option<String> {
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

pub fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// Parses the `n` in `.../pull/{n}` style segments.
pub fn parse_pr_number(repo_url: &str, value: Option<&&str>) -> Result<u32> {
    value
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| ProviderError::parse_with(repo_url, "invalid pull request number"))
}

/// Returns `true` for a full 40-character hexadecimal commit id.
pub fn is_full_sha(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssh() {
        let ctx = parse_static_git_context("git@github.com:daytonaio/daytona.git").unwrap();
        assert_eq!(ctx.source, "github.com");
        assert_eq!(ctx.owner, "daytonaio");
        assert_eq!(ctx.name, "daytona");
        assert_eq!(ctx.id, "daytona");
        assert_eq!(ctx.url, "https://github.com/daytonaio/daytona.git");
        assert!(ctx.path.is_none());
    }

    #[test]
    fn test_parse_ssh_nested_owner() {
        let ctx = parse_static_git_context("git@gitlab.com:org/sub/repo.git").unwrap();
        assert_eq!(ctx.owner, "org/sub");
        assert_eq!(ctx.name, "repo");
    }

    #[test]
    fn test_clone_url_is_idempotent_across_forms() {
        let forms = [
            "https://github.com/daytonaio/daytona.git",
            "https://github.com/daytonaio/daytona",
            "git@github.com:daytonaio/daytona.git",
        ];
        let parsed: Vec<_> = forms
            .iter()
            .map(|u| parse_static_git_context(u).unwrap())
            .collect();
        for ctx in &parsed[1..] {
            assert_eq!(ctx.owner, parsed[0].owner);
            assert_eq!(ctx.name, parsed[0].name);
            assert_eq!(ctx.source, parsed[0].source);
            assert_eq!(ctx.url, parsed[0].url);
        }
    }

    #[test]
    fn test_parse_keeps_remainder_as_path() {
        let ctx =
            parse_static_git_context("https://github.com/daytonaio/daytona/blob/main/README.md")
                .unwrap();
        assert_eq!(ctx.path.as_deref(), Some("blob/main/README.md"));
        assert_eq!(ctx.url, "https://github.com/daytonaio/daytona.git");
    }

    #[test]
    fn test_parse_drops_query() {
        let ctx = parse_static_git_context("https://github.com/a/b?tab=readme").unwrap();
        assert_eq!(ctx.url, "https://github.com/a/b.git");
        assert!(ctx.path.is_none());
    }

    #[test]
    fn test_parse_keeps_port_and_http() {
        let ctx = parse_static_git_context("http://localhost:3000/a/b").unwrap();
        assert_eq!(ctx.source, "localhost:3000");
        assert_eq!(ctx.url, "http://localhost:3000/a/b.git");
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        let err = parse_static_git_context("github.com/a/b").unwrap_err();
        assert_eq!(err.to_string(), "cannot parse git URL: github.com/a/b");
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        assert!(parse_static_git_context("https://github.com/daytonaio").is_err());
    }

    #[test]
    fn test_is_full_sha() {
        assert!(is_full_sha("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_full_sha("main"));
        assert!(!is_full_sha("0123456789abcdef"));
    }
}
