//
//  git-providers
//  auth/token.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Token input helpers for provider-configuration flows.
//!
//! `gp whoami --with-token` reads the token from stdin so it never lands in
//! shell history, then checks it is at least plausible before any request.

use anyhow::Result;

/// Reads a single token line from stdin, trimmed.
pub fn read_token_from_stdin() -> Result<String> {
    use std::io::{self, BufRead};

    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;

    Ok(line.trim().to_string())
}

/// Cheap shape check: non-empty and free of whitespace.
pub fn validate_token(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(char::is_whitespace)
}
