//
//  git-providers
//  api/client.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # HTTP Client Wrapper for Vendor APIs
//!
//! Every provider adapter talks to its vendor through one [`ApiClient`]: a thin
//! wrapper around [`reqwest::Client`] that knows the vendor's API root, injects
//! the right authentication header and turns non-success answers into
//! [`ProviderError::Api`] with the vendor status code preserved.
//!
//! ## Features
//!
//! - Authentication header injection ([`AuthCredential`])
//! - JSON serialization/deserialization
//! - Bounded per-call timeout (10 seconds); no retries
//! - Error bodies reduced to a readable message
//! - Custom User-Agent header (`gp/<version>`)

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::common::{ProviderError, Result};
use crate::auth::AuthCredential;

/// Upper bound for a single vendor round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Parses a vendor API error response and extracts a readable message.
///
/// The shapes recognised, in order:
///
/// | Shape | Vendor |
/// |-------|--------|
/// | `{"error": {"message": "..."}}` | Bitbucket Cloud |
/// | `{"errors": [{"message": "..."}]}` | Bitbucket Server |
/// | `{"error": {"detail": "..."}}` | Bitbucket Cloud (alternative) |
/// | `{"message": "..."}` | GitHub, GitLab, Gitea, Gogs, Gitee, Azure DevOps, AWS |
/// | `{"error": "..."}` | GitLab OAuth, Gitness |
///
/// If no shape matches the raw body is kept.
///
/// # Parameters
///
/// * `status` - The HTTP status code
/// * `body` - The raw error response body
///
/// # Returns
///
/// Returns a [`ProviderError::Api`] carrying the status code.
pub fn format_api_error(status: StatusCode, body: &str) -> ProviderError {
    let message = extract_error_message(body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            body.trim().to_string()
        }
    });

    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;

    if let Some(message) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Some(message.to_string());
    }

    if let Some(message) = json
        .get("errors")
        .and_then(|e| e.as_array())
        .and_then(|arr| arr.first())
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
    {
        return Some(message.to_string());
    }

    if let Some(detail) = json
        .get("error")
        .and_then(|e| e.get("detail"))
        .and_then(|m| m.as_str())
    {
        return Some(detail.to_string());
    }

    // GitLab sometimes nests validation messages in an object
    if let Some(message) = json.get("message") {
        return match message {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
    }

    if let Some(message) = json.get("Message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }

    json.get("error")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// HTTP client bound to one vendor API root.
///
/// # Example
///
/// ```rust,no_run
/// use git_providers::api::ApiClient;
/// use git_providers::auth::AuthCredential;
///
/// # async fn example() -> git_providers::api::common::Result<()> {
/// let client = ApiClient::new("https://api.github.com")?
///     .with_auth(AuthCredential::bearer("ghp_xxx"))
///     .with_header("Accept", "application/vnd.github+json");
/// let user: serde_json::Value = client.get("/user").await?;
/// println!("{}", user["login"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: Option<AuthCredential>,
    headers: Vec<(String, String)>,
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// A trailing `/` on `base_url` is dropped so paths can always start with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Network`] if the TLS backend cannot be initialised.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        Ok(Self {
            http: Client::builder()
                .user_agent(format!("gp/{}", crate::VERSION))
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: None,
            headers: Vec::new(),
        })
    }

    /// Sets the authentication credentials for this client.
    ///
    /// Accepts either a credential or `None` for anonymous access.
    pub fn with_auth(mut self, auth: impl Into<Option<AuthCredential>>) -> Self {
        self.auth = auth.into();
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the API root this client targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying HTTP client for requests that need custom signing.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolves `path` against the API root.
    ///
    /// Absolute URLs (for example pagination `next` links) are returned as is.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.auth {
            request = auth.apply_to_request(request);
        }
        request
    }

    /// Makes an HTTP GET request and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The network request fails or times out
    /// - The response status is not successful (2xx)
    /// - The response body cannot be deserialized to type `T`
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(self.request(Method::GET, path)).await
    }

    /// Makes an HTTP GET request and returns the decoded body with the response headers.
    ///
    /// Used where a vendor reports data out of band: Bitbucket Server names the
    /// authenticated user in `X-AUSERNAME`, Azure DevOps pages through
    /// `x-ms-continuationtoken`.
    pub async fn get_with_headers<T: DeserializeOwned>(&self, path: &str) -> Result<(T, HeaderMap)> {
        let response = self.send(self.request(Method::GET, path)).await?;
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        Ok((decode(&bytes)?, headers))
    }

    /// Makes an HTTP POST request with a JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(self.request(Method::POST, path).json(body)).await
    }

    /// Makes an HTTP PUT request with a JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.execute(self.request(Method::PUT, path).json(body)).await
    }

    /// Makes an HTTP DELETE request, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Sends a prepared request and decodes the JSON body.
    pub async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        decode(&bytes)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!("request failed with {}: {}", status, text);
            return Err(format_api_error(status, &text));
        }

        Ok(response)
    }
}

/// Empty bodies decode as JSON `null` so endpoints answering `204 No Content`
/// can be read into `()` or `Option<T>`.
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cloud_error() {
        let err = format_api_error(
            StatusCode::NOT_FOUND,
            r#"{"type": "error", "error": {"message": "Repository not found"}}"#,
        );
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "status code: 404 err: Repository not found");
    }

    #[test]
    fn test_format_server_error() {
        let err = format_api_error(
            StatusCode::UNAUTHORIZED,
            r#"{"errors": [{"message": "Authentication failed"}]}"#,
        );
        assert_eq!(err.to_string(), "status code: 401 err: Authentication failed");
    }

    #[test]
    fn test_format_message_error() {
        let err = format_api_error(StatusCode::NOT_FOUND, r#"{"message": "Not Found"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "status code: 404 err: Not Found");
    }

    #[test]
    fn test_format_plain_body_and_empty_body() {
        let err = format_api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "status code: 502 err: upstream down");

        let err = format_api_error(StatusCode::FORBIDDEN, "");
        assert_eq!(err.to_string(), "status code: 403 err: Forbidden");
    }

    #[test]
    fn test_url_joins_and_keeps_absolute() {
        let client = ApiClient::new("https://api.example.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(client.url("/user"), "https://api.example.com/v1/user");
        assert_eq!(
            client.url("https://api.example.com/v1/user?page=2"),
            "https://api.example.com/v1/user?page=2"
        );
    }

    #[tokio::test]
    async fn test_get_sends_auth_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer secret")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"login": "octocat"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url())
            .unwrap()
            .with_auth(AuthCredential::bearer("secret"))
            .with_header("Accept", "application/json");
        let user: serde_json::Value = client.get("/user").await.unwrap();

        assert_eq!(user["login"], "octocat");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/a/b")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url()).unwrap();
        let err = client
            .get::<serde_json::Value>("/repos/a/b")
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Not Found"));
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/hooks/1")
            .with_status(204)
            .create_async()
            .await;

        let client = ApiClient::new(server.url()).unwrap();
        assert!(client.delete("/hooks/1").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_with_headers_returns_headers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/application-properties")
            .with_status(200)
            .with_header("X-AUSERNAME", "jdoe")
            .with_body("{}")
            .create_async()
            .await;

        let client = ApiClient::new(server.url()).unwrap();
        let (_, headers): (serde_json::Value, _) = client
            .get_with_headers("/application-properties")
            .await
            .unwrap();

        assert_eq!(headers.get("x-ausername").unwrap(), "jdoe");
    }
}
