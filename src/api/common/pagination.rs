//
//  git-providers
//  api/common/pagination.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Pagination envelopes for vendor list endpoints
//!
//! Most vendors (GitHub, GitLab, Gitea, Gogs, Gitee) return a bare JSON array
//! and paginate through `page`/`per_page` query parameters. A few wrap their
//! lists in an envelope, and those envelopes live here.
//!
//! # Overview
//!
//! | Type | Vendor | Strategy |
//! |------|--------|----------|
//! | [`PaginatedResponse`] | Bitbucket Cloud | URL-based (`next` link) |
//! | [`ServerPaginatedResponse`] | Bitbucket Server/DC | Offset-based (`start`) |
//! | [`ValueList`] | Azure DevOps | `{count, value}` plus continuation header |
//!
//! # Notes
//!
//! - Listing operations fetch a single bounded page (at most 100 items);
//!   the `has_next` helpers exist so callers can decide whether to ask again.
//! - The `values`/`value` field is always present, even if empty.

use serde::{Deserialize, Serialize};

/// Bitbucket Cloud paginated response.
///
/// ```json
/// {"values": [...], "page": 1, "pagelen": 100, "size": 3, "next": null}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub values: Vec<T>,

    /// Current page number (1-indexed).
    #[serde(default)]
    pub page: Option<u32>,

    /// Page length requested.
    #[serde(default)]
    pub pagelen: Option<u32>,

    /// Total number of items, when the endpoint reports it.
    #[serde(default)]
    pub size: Option<u32>,

    /// Absolute URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> PaginatedResponse<T> {
    /// Returns `true` if another page is available.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Bitbucket Server/Data Center paginated response.
///
/// Server uses offset pagination: the client passes `start` and `limit`,
/// and the response tells whether this was the last page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPaginatedResponse<T> {
    /// Items on this page.
    pub values: Vec<T>,

    /// Number of items on this page.
    #[serde(default)]
    pub size: u32,

    /// Page size limit applied by the server.
    #[serde(default)]
    pub limit: u32,

    #[serde(default, rename = "isLastPage")]
    pub is_last_page: bool,

    #[serde(default, rename = "nextPageStart")]
    pub next_page_start: Option<u32>,

    #[serde(default)]
    pub start: u32,
}

impl<T> ServerPaginatedResponse<T> {
    /// Returns `true` if another page is available.
    pub fn has_next(&self) -> bool {
        !self.is_last_page
    }

    /// Offset to request for the next page.
    pub fn next_start(&self) -> Option<u32> {
        if self.is_last_page {
            None
        } else {
            self.next_page_start
        }
    }
}

/// Azure DevOps list envelope.
///
/// Every Azure DevOps collection endpoint answers with `{"count": n, "value": [...]}`.
/// Further pages are signalled through the `x-ms-continuationtoken` response header,
/// not through the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueList<T> {
    #[serde(default)]
    pub count: u32,
    pub value: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_page_has_next() {
        let json = r#"{"values": [1, 2], "page": 1, "pagelen": 2, "next": "https://api.bitbucket.org/2.0/x?page=2"}"#;
        let page: PaginatedResponse<u32> = serde_json::from_str(json).unwrap();
        assert!(page.has_next());
        assert_eq!(page.values, vec![1, 2]);
    }

    #[test]
    fn test_server_page_last() {
        let json = r#"{"values": [], "size": 0, "limit": 25, "isLastPage": true, "start": 0}"#;
        let page: ServerPaginatedResponse<u32> = serde_json::from_str(json).unwrap();
        assert!(!page.has_next());
        assert_eq!(page.next_start(), None);
    }

    #[test]
    fn test_server_page_next_start() {
        let json = r#"{"values": [7], "size": 1, "limit": 1, "isLastPage": false, "nextPageStart": 1, "start": 0}"#;
        let page: ServerPaginatedResponse<u32> = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_start(), Some(1));
    }

    #[test]
    fn test_value_list() {
        let json = r#"{"count": 1, "value": ["a"]}"#;
        let list: ValueList<String> = serde_json::from_str(json).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.value, vec!["a".to_string()]);
    }
}
