// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authentication handlers: login, refresh rotation, logout, password change.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use armada_gateway_auth::{
	generate_token, hash_password, hash_token, verify_password, UserClaims,
};
use armada_gateway_db::User;

use crate::api::AppState;
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
	pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
	pub current_password: String,
	pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub access_token: String,
	pub refresh_token: String,
	pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
	pub message: &'static str,
}

/// POST /auth/login
///
/// Unknown email and wrong password are indistinguishable to the caller;
/// only a disabled account gets its own error.
#[instrument(skip_all, fields(email = %body.email))]
pub async fn login(
	State(state): State<AppState>,
	Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, GatewayError> {
	if body.email.is_empty() || body.password.is_empty() {
		return Err(GatewayError::BadRequest("invalid request".to_string()));
	}

	let user = state.db.users().get_user_by_email(&body.email).await?;
	let Some(user) = user else {
		return Err(GatewayError::Unauthorized("invalid credentials".to_string()));
	};

	if !verify_password(&body.password, &user.password_hash) {
		return Err(GatewayError::Unauthorized("invalid credentials".to_string()));
	}

	if !user.is_active {
		return Err(GatewayError::Forbidden("account is disabled".to_string()));
	}

	info!(user_id = %user.id, "login");
	issue_tokens(&state, &user).await
}

/// POST /auth/refresh
///
/// Rotation: the presented record is deleted before a fresh pair is
/// issued, so a refresh value can never succeed twice.
#[instrument(skip_all)]
pub async fn refresh(
	State(state): State<AppState>,
	Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, GatewayError> {
	if body.refresh_token.is_empty() {
		return Err(GatewayError::BadRequest("invalid request".to_string()));
	}

	let hash = hash_token(&body.refresh_token);
	let record = state
		.db
		.refresh_tokens()
		.get_refresh_token_by_hash(&hash)
		.await?;
	let Some(record) = record else {
		return Err(GatewayError::Unauthorized(
			"invalid refresh token".to_string(),
		));
	};

	if Utc::now() > record.expires_at {
		state
			.db
			.refresh_tokens()
			.delete_refresh_token(&record.id)
			.await?;
		return Err(GatewayError::Unauthorized(
			"refresh token expired".to_string(),
		));
	}

	state
		.db
		.refresh_tokens()
		.delete_refresh_token(&record.id)
		.await?;

	let user = state.db.users().get_user_by_id(&record.user_id).await?;
	let Some(user) = user else {
		return Err(GatewayError::Unauthorized("user not found".to_string()));
	};
	if !user.is_active {
		return Err(GatewayError::Forbidden("account is disabled".to_string()));
	}

	issue_tokens(&state, &user).await
}

/// POST /api/v1/auth/logout
#[instrument(skip_all)]
pub async fn logout(
	State(state): State<AppState>,
	Json(body): Json<RefreshRequest>,
) -> Result<Json<MessageResponse>, GatewayError> {
	let hash = hash_token(&body.refresh_token);
	if let Some(record) = state
		.db
		.refresh_tokens()
		.get_refresh_token_by_hash(&hash)
		.await?
	{
		state
			.db
			.refresh_tokens()
			.delete_refresh_token(&record.id)
			.await?;
	}
	Ok(Json(MessageResponse {
		message: "logged out",
	}))
}

/// POST /api/v1/auth/change-password
#[instrument(skip_all, fields(user_id = %claims.user_id()))]
pub async fn change_password(
	State(state): State<AppState>,
	Extension(claims): Extension<UserClaims>,
	Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, GatewayError> {
	if body.new_password.is_empty() {
		return Err(GatewayError::BadRequest(
			"new password must not be empty".to_string(),
		));
	}

	let user = state.db.users().get_user_by_id(claims.user_id()).await?;
	let Some(mut user) = user else {
		return Err(GatewayError::Internal("user vanished".to_string()));
	};

	if !verify_password(&body.current_password, &user.password_hash) {
		return Err(GatewayError::Unauthorized(
			"current password is incorrect".to_string(),
		));
	}

	user.password_hash = hash_password(&body.new_password)
		.map_err(|e| GatewayError::Internal(format!("hashing password: {e}")))?;
	state.db.users().update_user(&user).await?;

	info!(user_id = %user.id, "password changed");
	Ok(Json(MessageResponse {
		message: "password changed",
	}))
}

async fn issue_tokens(state: &AppState, user: &User) -> Result<Json<TokenResponse>, GatewayError> {
	let roles = state.db.roles().list_roles_by_user(&user.id).await?;
	let role_names: Vec<String> = roles.into_iter().map(|r| r.name).collect();

	let access_token = state
		.token_manager
		.generate_access_token(&user.id, &user.email, &user.name, role_names)
		.map_err(|e| GatewayError::Internal(format!("signing access token: {e}")))?;

	let (refresh_plaintext, refresh_hash) = generate_token();
	let expires_at = Utc::now()
		+ ChronoDuration::from_std(state.refresh_expiry)
			.unwrap_or_else(|_| ChronoDuration::days(7));

	if let Err(e) = state
		.db
		.refresh_tokens()
		.create_refresh_token(&user.id, &refresh_hash, expires_at)
		.await
	{
		warn!(error = %e, "failed to persist refresh token");
		return Err(e.into());
	}

	Ok(Json(TokenResponse {
		access_token,
		refresh_token: refresh_plaintext,
		expires_in: state.token_manager.access_expiry_secs(),
	}))
}
