// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authentication middleware.
//!
//! `require_auth` validates the bearer access token and binds the decoded
//! [`UserClaims`] into the request extensions for handlers downstream.
//! `require_admin` layers on top and additionally demands the `admin` role.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use armada_gateway_auth::{extract_bearer_token, UserClaims};

use crate::api::AppState;
use crate::error::GatewayError;

pub async fn require_auth(
	State(state): State<AppState>,
	mut req: Request,
	next: Next,
) -> Result<Response, GatewayError> {
	if req.headers().get(AUTHORIZATION).is_none() {
		return Err(GatewayError::Unauthorized(
			"missing authorization header".to_string(),
		));
	}

	let token = extract_bearer_token(req.headers()).ok_or_else(|| {
		GatewayError::Unauthorized("invalid authorization format".to_string())
	})?;

	let claims = state
		.token_manager
		.verify_access_token(&token)
		.map_err(|_| GatewayError::Unauthorized("invalid or expired token".to_string()))?;

	req.extensions_mut().insert(claims);
	Ok(next.run(req).await)
}

pub async fn require_admin(req: Request, next: Next) -> Result<Response, GatewayError> {
	let claims = req
		.extensions()
		.get::<UserClaims>()
		.ok_or_else(|| GatewayError::Unauthorized("not authenticated".to_string()))?;

	if !claims.is_admin() {
		return Err(GatewayError::Forbidden("admin role required".to_string()));
	}
	Ok(next.run(req).await)
}
