// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Admin surface: user management, persisted cluster rows, agent token
//! issuance, and the audit trail. Every route here sits behind the admin
//! gate.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use armada_gateway_auth::{generate_token, hash_password, token_prefix, UserClaims};
use armada_gateway_db::{AgentToken, AuditLogEntry, AuditLogFilter, ClusterRecord, Role, User};

use crate::api::AppState;
use crate::error::GatewayError;
use crate::pagination::PageParams;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
	pub email: String,
	pub password: String,
	pub name: String,
	/// Role names to assign at creation, e.g. `["viewer"]`.
	#[serde(default)]
	pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
	pub users: Vec<User>,
	pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct RoleListResponse {
	pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClusterRequest {
	pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ClusterListResponse {
	pub clusters: Vec<ClusterRecord>,
	pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAgentTokenRequest {
	pub description: Option<String>,
	/// Days until expiry; omit for a non-expiring token.
	pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AgentTokenCreatedResponse {
	pub id: String,
	/// The plaintext, returned exactly once. Only the hash is stored.
	pub token: String,
	pub token_prefix: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AgentTokenListResponse {
	pub tokens: Vec<AgentToken>,
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
	pub user_email: Option<String>,
	pub cluster: Option<String>,
	pub status: Option<String>,
	/// RFC 3339 / `YYYY-MM-DDTHH:MM:SSZ`.
	pub from: Option<String>,
	pub to: Option<String>,
	// Flattening PageParams trips serde_urlencoded; keep the fields inline.
	pub page: Option<i64>,
	pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogListResponse {
	pub entries: Vec<AuditLogEntry>,
	pub total: i64,
	pub page: i64,
	pub per_page: i64,
}

/// GET /api/v1/admin/users
#[instrument(skip_all)]
pub async fn list_users(
	State(state): State<AppState>,
	Query(page): Query<PageParams>,
) -> Result<Json<UserListResponse>, GatewayError> {
	let (limit, offset) = page.limit_offset();
	let (users, total) = state.db.users().list_users(limit, offset).await?;
	Ok(Json(UserListResponse { users, total }))
}

/// POST /api/v1/admin/users
#[instrument(skip_all, fields(email = %body.email))]
pub async fn create_user(
	State(state): State<AppState>,
	Extension(claims): Extension<UserClaims>,
	Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), GatewayError> {
	if body.email.is_empty() || body.password.is_empty() || body.name.is_empty() {
		return Err(GatewayError::BadRequest(
			"email, password, and name are required".to_string(),
		));
	}

	// Resolve role names before creating anything.
	let mut role_ids = Vec::with_capacity(body.roles.len());
	for role_name in &body.roles {
		let role = state
			.db
			.roles()
			.get_role_by_name(role_name)
			.await?
			.ok_or_else(|| GatewayError::BadRequest(format!("unknown role: {role_name}")))?;
		role_ids.push(role.id);
	}

	let password_hash = hash_password(&body.password)
		.map_err(|e| GatewayError::Internal(format!("hashing password: {e}")))?;
	let user = state
		.db
		.users()
		.create_user(&body.email, &password_hash, &body.name)
		.await?;

	for role_id in &role_ids {
		state
			.db
			.roles()
			.assign_role(&user.id, role_id, Some(claims.user_id()))
			.await?;
	}

	info!(user_id = %user.id, "user created");
	Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/admin/roles
#[instrument(skip_all)]
pub async fn list_roles(
	State(state): State<AppState>,
) -> Result<Json<RoleListResponse>, GatewayError> {
	let roles = state.db.roles().list_roles().await?;
	Ok(Json(RoleListResponse { roles }))
}

/// GET /api/v1/admin/clusters. Persisted rows, not the live registry.
#[instrument(skip_all)]
pub async fn list_clusters(
	State(state): State<AppState>,
	Query(page): Query<PageParams>,
) -> Result<Json<ClusterListResponse>, GatewayError> {
	let (limit, offset) = page.limit_offset();
	let (clusters, total) = state.db.clusters().list_clusters(limit, offset).await?;
	Ok(Json(ClusterListResponse { clusters, total }))
}

/// POST /api/v1/admin/clusters
#[instrument(skip_all, fields(name = %body.name))]
pub async fn create_cluster(
	State(state): State<AppState>,
	Json(body): Json<CreateClusterRequest>,
) -> Result<(StatusCode, Json<ClusterRecord>), GatewayError> {
	if body.name.is_empty() {
		return Err(GatewayError::BadRequest("name is required".to_string()));
	}
	let cluster = state.db.clusters().create_cluster(&body.name).await?;
	Ok((StatusCode::CREATED, Json(cluster)))
}

/// POST /api/v1/admin/clusters/{name}/tokens
#[instrument(skip_all, fields(cluster = %name))]
pub async fn create_agent_token(
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(body): Json<CreateAgentTokenRequest>,
) -> Result<(StatusCode, Json<AgentTokenCreatedResponse>), GatewayError> {
	let cluster = state
		.db
		.clusters()
		.get_cluster_by_name(&name)
		.await?
		.ok_or_else(|| GatewayError::NotFound("cluster not found".to_string()))?;

	let expires_at = body
		.expires_in_days
		.map(|days| Utc::now() + ChronoDuration::days(days));

	let (plaintext, hash) = generate_token();
	let token = state
		.db
		.agent_tokens()
		.create_agent_token(
			&cluster.id,
			&hash,
			&token_prefix(&plaintext),
			body.description.as_deref(),
			expires_at,
		)
		.await?;

	info!(token_id = %token.id, cluster = %name, "agent token issued");
	Ok((
		StatusCode::CREATED,
		Json(AgentTokenCreatedResponse {
			id: token.id,
			token: plaintext,
			token_prefix: token.token_prefix,
			expires_at: token.expires_at,
		}),
	))
}

/// GET /api/v1/admin/clusters/{name}/tokens
#[instrument(skip_all, fields(cluster = %name))]
pub async fn list_agent_tokens(
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> Result<Json<AgentTokenListResponse>, GatewayError> {
	let cluster = state
		.db
		.clusters()
		.get_cluster_by_name(&name)
		.await?
		.ok_or_else(|| GatewayError::NotFound("cluster not found".to_string()))?;

	let tokens = state
		.db
		.agent_tokens()
		.list_agent_tokens_by_cluster(&cluster.id)
		.await?;
	Ok(Json(AgentTokenListResponse { tokens }))
}

/// DELETE /api/v1/admin/tokens/{id}. Revocation, not deletion; the row
/// stays for audit.
#[instrument(skip_all, fields(token_id = %id))]
pub async fn revoke_agent_token(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<StatusCode, GatewayError> {
	if state.db.agent_tokens().revoke_agent_token(&id).await? {
		Ok(StatusCode::NO_CONTENT)
	} else {
		Err(GatewayError::NotFound("agent token not found".to_string()))
	}
}

/// GET /api/v1/admin/audit-logs
#[instrument(skip_all)]
pub async fn list_audit_logs(
	State(state): State<AppState>,
	Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, GatewayError> {
	let filter = AuditLogFilter {
		user_email: query.user_email,
		cluster_name: query.cluster,
		status: query.status,
		from: parse_time_param("from", query.from.as_deref())?,
		to: parse_time_param("to", query.to.as_deref())?,
	};

	let pagination = PageParams {
		page: query.page,
		per_page: query.per_page,
	};
	let (page, per_page) = pagination.resolve();
	let (limit, offset) = pagination.limit_offset();
	let (entries, total) = state
		.db
		.audit_logs()
		.list_audit_logs(&filter, limit, offset)
		.await?;

	Ok(Json(AuditLogListResponse {
		entries,
		total,
		page,
		per_page,
	}))
}

fn parse_time_param(
	field: &str,
	value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, GatewayError> {
	value
		.map(|v| {
			DateTime::parse_from_rfc3339(v)
				.map(|dt| dt.with_timezone(&Utc))
				.map_err(|_| GatewayError::BadRequest(format!("invalid {field} timestamp: {v}")))
		})
		.transpose()
}
