//
//  git-providers
//  auth/sigv4.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # AWS Signature Version 4
//!
//! AWS CodeCommit and IAM have no token header: each request is signed with the
//! caller's secret key. This module implements the SigV4 scheme for the JSON
//! POST requests the CodeCommit adapter sends.
//!
//! ## Algorithm
//!
//! 1. Build the canonical request (method, path, query, sorted lowercase headers,
//!    signed header list, hex SHA-256 of the payload)
//! 2. Build the string to sign from the timestamp, credential scope and the hash
//!    of the canonical request
//! 3. Derive the signing key: `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
//! 4. `Authorization: AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...`

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN` from the environment.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Signs requests for one region/service pair.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(credentials: AwsCredentials, region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Signs a request and returns the headers to add to it.
    ///
    /// `headers` must contain every header that will be sent and signed,
    /// including `host`. The returned list holds `x-amz-date`,
    /// `x-amz-security-token` (when a session token is set) and `authorization`.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &str,
        headers: &[(&str, &str)],
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, InvalidLength> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let mut canonical: BTreeMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        canonical.insert("x-amz-date".to_string(), amz_date.clone());
        if let Some(token) = &self.credentials.session_token {
            canonical.insert("x-amz-security-token".to_string(), token.clone());
        }

        let canonical_headers: String = canonical
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();
        let signed_headers = canonical.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{}",
            hex::encode(Sha256::digest(payload))
        );

        let scope = format!(
            "{date_stamp}/{}/{}/aws4_request",
            self.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            &self.service,
        )?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        let mut out = vec![("x-amz-date".to_string(), amz_date)];
        if let Some(token) = &self.credentials.session_token {
            out.push(("x-amz-security-token".to_string(), token.clone()));
        }
        out.push((
            "authorization".to_string(),
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        Ok(out)
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derives the SigV4 signing key for a date, region and service.
pub fn signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, InvalidLength> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signing_key_matches_aws_documentation() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_sign_produces_authorization_header() {
        let signer = SigV4Signer::new(
            AwsCredentials::new("AKIDEXAMPLE", "secret"),
            "eu-west-1",
            "codecommit",
        );
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let headers = signer.sign(
            "POST",
            "/",
            "",
            &[
                ("Host", "codecommit.eu-west-1.amazonaws.com"),
                ("Content-Type", "application/x-amz-json-1.1"),
                ("X-Amz-Target", "CodeCommit_20150413.ListRepositories"),
            ],
            b"{}",
            now,
        )
        .unwrap();

        let date = headers.iter().find(|(k, _)| k == "x-amz-date").unwrap();
        assert_eq!(date.1, "20240501T120000Z");

        let auth = headers.iter().find(|(k, _)| k == "authorization").unwrap();
        assert!(auth.1.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/eu-west-1/codecommit/aws4_request, "
        ));
        assert!(auth
            .1
            .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target, "));
        let signature = auth.1.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = SigV4Signer::new(AwsCredentials::new("a", "b"), "us-east-1", "iam");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = signer.sign("POST", "/", "", &[("host", "iam.amazonaws.com")], b"x", now).unwrap();
        let second = signer.sign("POST", "/", "", &[("host", "iam.amazonaws.com")], b"x", now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_session_token_is_signed() {
        let mut creds = AwsCredentials::new("a", "b");
        creds.session_token = Some("tok".to_string());
        let signer = SigV4Signer::new(creds, "us-east-1", "iam");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let headers = signer.sign("POST", "/", "", &[("host", "iam.amazonaws.com")], b"", now).unwrap();
        assert!(headers.iter().any(|(k, v)| k == "x-amz-security-token" && v == "tok"));
        let auth = &headers.last().unwrap().1;
        assert!(auth.contains("x-amz-security-token"));
    }
}
