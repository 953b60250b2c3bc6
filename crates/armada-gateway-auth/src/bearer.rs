// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bearer token extraction.
//!
//! Token values are secrets: never log them.

use http::header::AUTHORIZATION;
use http::HeaderMap;

/// Extract a bearer token from the Authorization header.
///
/// Expects the format `Authorization: Bearer <token>`. Returns `None` when
/// the header is absent or malformed.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
	let auth_header = headers.get(AUTHORIZATION)?;
	let auth_str = auth_header.to_str().ok()?;
	auth_str
		.strip_prefix("Bearer ")
		.map(|token| token.to_string())
}
