//
//  git-providers
//  auth/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authentication Module
//!
//! Every git host authenticates API calls a little differently. This module
//! models those schemes as one enum so the shared [`ApiClient`](crate::api::ApiClient)
//! can inject the right header without knowing which vendor it talks to.
//!
//! ## Supported Schemes
//!
//! | Scheme | Header | Used by |
//! |--------|--------|---------|
//! | Bearer | `Authorization: Bearer <token>` | GitHub, Bitbucket Server, Gitee, Gitness |
//! | Token | `Authorization: token <token>` | Gitea, Codeberg, Gogs |
//! | Private token | `PRIVATE-TOKEN: <token>` | GitLab |
//! | Basic | `Authorization: Basic base64(user:secret)` | Bitbucket Cloud, Azure DevOps |
//! | SigV4 | `Authorization: AWS4-HMAC-SHA256 ...` | AWS CodeCommit (see [`sigv4`]) |
//!
//! ## Example
//!
//! ```rust
//! use git_providers::auth::AuthCredential;
//!
//! let github = AuthCredential::bearer("ghp_xxx");
//! let azure = AuthCredential::basic("", "pat-value");
//! assert!(format!("{:?}", github).contains("<redacted>"));
//! # let _ = azure;
//! ```

pub mod sigv4;
mod token;

pub use sigv4::{AwsCredentials, SigV4Signer};
pub use token::*;

use std::fmt;

use reqwest::RequestBuilder;

/// Authentication credentials for one provider instance.
///
/// Tokens are read-only after construction and never logged: the `Debug`
/// implementation redacts every secret.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthCredential {
    /// `Authorization: Bearer <token>`
    Bearer {
        /// The access token.
        token: String,
    },
    /// `Authorization: token <token>` (Gitea-family hosts)
    Token {
        /// The access token.
        token: String,
    },
    /// `PRIVATE-TOKEN: <token>` (GitLab personal/project access tokens)
    PrivateToken {
        /// The access token.
        token: String,
    },
    /// HTTP Basic authentication.
    Basic {
        /// Username; may be empty (Azure DevOps PATs).
        username: String,
        /// Password, app password or personal access token.
        password: String,
    },
}

impl AuthCredential {
    /// Creates a bearer-token credential.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates a `token`-scheme credential.
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    /// Creates a GitLab `PRIVATE-TOKEN` credential.
    pub fn private_token(token: impl Into<String>) -> Self {
        Self::PrivateToken {
            token: token.into(),
        }
    }

    /// Creates a Basic credential.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Builds an optional credential: an empty token means anonymous access.
    ///
    /// # Example
    ///
    /// ```rust
    /// use git_providers::auth::AuthCredential;
    ///
    /// assert!(AuthCredential::non_empty("", AuthCredential::bearer).is_none());
    /// assert!(AuthCredential::non_empty("abc", AuthCredential::bearer).is_some());
    /// ```
    pub fn non_empty(token: &str, make: fn(String) -> Self) -> Option<Self> {
        if token.is_empty() {
            None
        } else {
            Some(make(token.to_string()))
        }
    }

    /// Applies the credential to an outgoing request.
    ///
    /// # Parameters
    ///
    /// - `request`: The [`RequestBuilder`] to add authentication headers to.
    ///
    /// # Returns
    ///
    /// Returns the modified [`RequestBuilder`].
    pub fn apply_to_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer { token } => request.bearer_auth(token),
            Self::Token { token } => request.header("Authorization", format!("token {token}")),
            Self::PrivateToken { token } => request.header("PRIVATE-TOKEN", token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer { .. } => f.write_str("Bearer(<redacted>)"),
            Self::Token { .. } => f.write_str("Token(<redacted>)"),
            Self::PrivateToken { .. } => f.write_str("PrivateToken(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
