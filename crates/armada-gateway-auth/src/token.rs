// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Signed access tokens.
//!
//! Access tokens are HS256 JWTs carrying the user's id, email, display name,
//! and role names. Verification is pinned to the HMAC family: a token signed
//! with any other algorithm family is rejected outright.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AuthError, Result};

const ISSUER: &str = "armada";

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
	/// Subject: the user id.
	pub sub: String,
	pub email: String,
	pub name: String,
	pub roles: Vec<String>,
	pub iss: String,
	pub iat: i64,
	pub exp: i64,
}

impl UserClaims {
	pub fn user_id(&self) -> &str {
		&self.sub
	}

	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r == role)
	}

	pub fn is_admin(&self) -> bool {
		self.has_role("admin")
	}
}

/// Issues and verifies access tokens with a symmetric secret.
#[derive(Clone)]
pub struct TokenManager {
	encoding: EncodingKey,
	decoding: DecodingKey,
	access_expiry: Duration,
}

impl TokenManager {
	pub fn new(secret: &str, access_expiry: Duration) -> Self {
		Self {
			encoding: EncodingKey::from_secret(secret.as_bytes()),
			decoding: DecodingKey::from_secret(secret.as_bytes()),
			access_expiry,
		}
	}

	/// Seconds until a freshly issued access token expires.
	pub fn access_expiry_secs(&self) -> i64 {
		self.access_expiry.as_secs() as i64
	}

	/// Create a signed access token for the given user.
	pub fn generate_access_token(
		&self,
		user_id: &str,
		email: &str,
		name: &str,
		roles: Vec<String>,
	) -> Result<String> {
		let now = Utc::now().timestamp();
		let claims = UserClaims {
			sub: user_id.to_string(),
			email: email.to_string(),
			name: name.to_string(),
			roles,
			iss: ISSUER.to_string(),
			iat: now,
			exp: now + self.access_expiry_secs(),
		};
		Ok(encode(
			&Header::new(Algorithm::HS256),
			&claims,
			&self.encoding,
		)?)
	}

	/// Verify a token and return its claims. Fails on a bad signature, an
	/// expired token, or a token signed outside the HMAC-SHA-256 family.
	pub fn verify_access_token(&self, token: &str) -> Result<UserClaims> {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.set_issuer(&[ISSUER]);
		decode::<UserClaims>(token, &self.decoding, &validation)
			.map(|data| data.claims)
			.map_err(|_| AuthError::InvalidToken)
	}
}
