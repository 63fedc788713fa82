//
//  git-providers
//  api/common/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Common API Types shared by every provider adapter
//!
//! This module provides the error taxonomy used across the crate together with
//! the pagination envelopes some vendors wrap their list responses in.
//!
//! # Overview
//!
//! - [`ProviderError`] - Unified error type for parsing, API and capability failures
//! - [`Result`] - Crate-wide result alias over [`ProviderError`]
//! - Pagination types (re-exported from [`pagination`] submodule)
//!
//! # Example
//!
//! ```rust
//! use git_providers::api::common::ProviderError;
//!
//! fn describe(err: &ProviderError) -> &'static str {
//!     if err.is_unsupported() {
//!         "not available on this provider"
//!     } else if err.is_not_found() {
//!         "not found"
//!     } else {
//!         "failed"
//!     }
//! }
//! ```
//!
//! # Notes
//!
//! - A capability gap is never reported as a network or API failure, so callers
//!   can degrade gracefully (e.g. "no webhook needed") instead of retrying.
//! - Vendor HTTP status codes are preserved in [`ProviderError::Api`].

use thiserror::Error;

mod pagination;

pub use pagination::*;

/// Result alias used by every provider operation.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Unified error type for all provider operations.
///
/// # Variants
///
/// | Variant | Description | HTTP Status |
/// |---------|-------------|-------------|
/// | `Parse` | URL could not be interpreted | N/A |
/// | `Api` | Vendor answered with a non-success status | 4xx/5xx |
/// | `NotFound` | A lookup produced no result | 404 |
/// | `BranchNotFound` | No branch contains the requested commit | 404 |
/// | `Unsupported` | The vendor has no API for the operation | N/A |
/// | `Config` | Provider configuration is incomplete or invalid | N/A |
/// | `Network` | Transport failure (connect, TLS, timeout) | N/A |
/// | `Decode` | Response body did not match the expected shape | N/A |
///
/// # Example
///
/// ```rust
/// use git_providers::api::common::ProviderError;
///
/// let err = ProviderError::BranchNotFound { sha: "abc123".to_string() };
/// assert_eq!(err.status(), Some(404));
/// assert!(err.to_string().contains("branch not found for SHA: abc123"));
/// ```
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The URL is malformed or does not match any shape the provider understands.
    ///
    /// Never accompanied by a partially populated context.
    #[error("cannot parse git URL: {url}{}", reason_suffix(.reason))]
    Parse {
        /// The offending input
        url: String,
        /// Optional detail about what did not match
        reason: Option<String>,
    },

    /// The vendor API answered with a non-success status.
    #[error("status code: {status} err: {message}")]
    Api {
        /// HTTP status code returned by the vendor
        status: u16,
        /// Readable message extracted from the error body
        message: String,
    },

    /// A lookup returned nothing (missing header, empty listing, unknown id).
    #[error("not found: {0}")]
    NotFound(String),

    /// No branch's history contains the requested commit.
    #[error("status code: 404 branch not found for SHA: {sha}")]
    BranchNotFound {
        /// The commit that was searched for
        sha: String,
    },

    /// The vendor offers no API for this operation.
    ///
    /// Callers should treat this as "not applicable", not as a failure.
    #[error("{capability} is not supported by the {provider} provider")]
    Unsupported {
        /// Provider id (e.g. "gogs")
        provider: String,
        /// Operation name (e.g. "pull request listing")
        capability: String,
    },

    /// The provider configuration is missing a required value.
    #[error("invalid provider configuration: {0}")]
    Config(String),

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_ref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

impl ProviderError {
    /// Builds a [`ProviderError::Parse`] for `url` without extra detail.
    pub fn parse(url: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: None,
        }
    }

    /// Builds a [`ProviderError::Parse`] for `url` with a reason.
    pub fn parse_with(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: Some(reason.into()),
        }
    }

    /// Builds a [`ProviderError::Unsupported`].
    pub fn unsupported(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// HTTP status associated with the error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) | Self::BranchNotFound { .. } => Some(404),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` for capability gaps.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Returns `true` when the error means "does not exist".
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = ProviderError::parse("ftp://example.com/repo");
        assert_eq!(err.to_string(), "cannot parse git URL: ftp://example.com/repo");

        let err = ProviderError::parse_with("https://x", "missing repository name");
        assert_eq!(
            err.to_string(),
            "cannot parse git URL: https://x (missing repository name)"
        );
    }

    #[test]
    fn test_api_error_keeps_status() {
        let err = ProviderError::Api {
            status: 403,
            message: "Forbidden".to_string(),
        };
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "status code: 403 err: Forbidden");
    }

    #[test]
    fn test_unsupported_is_distinguishable() {
        let err = ProviderError::unsupported("gogs", "pull request listing");
        assert!(err.is_unsupported());
        assert_eq!(err.status(), None);
        assert_eq!(
            err.to_string(),
            "pull request listing is not supported by the gogs provider"
        );
    }

    #[test]
    fn test_branch_not_found() {
        let err = ProviderError::BranchNotFound {
            sha: "deadbeef".to_string(),
        };
        assert!(err.is_not_found());
    }
}
