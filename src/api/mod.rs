//
//  git-providers
//  api/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # API Client Layer
//!
//! Shared HTTP plumbing for the provider adapters.
//!
//! ## Architecture
//!
//! - [`client`]: [`ApiClient`], the reqwest wrapper every adapter sends through
//! - [`common`]: error taxonomy and pagination envelopes
//!
//! Vendor-specific request and response types live next to their adapter in
//! [`crate::providers`], not here.
//!
//! ## Error Handling
//!
//! Non-success answers become [`common::ProviderError::Api`] with the vendor
//! status preserved; transport failures become [`common::ProviderError::Network`].

/// Core HTTP client wrapper.
pub mod client;

/// Error types and pagination envelopes.
pub mod common;

pub use client::{format_api_error, ApiClient, REQUEST_TIMEOUT};
