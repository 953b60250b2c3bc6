// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster listing and command execution.
//!
//! `/exec` is the synchronous face of the asynchronous pull pipeline: the
//! handler enqueues on the broker and parks on the rendezvous until the
//! agent submits a result or the deadline fires.

use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use armada_gateway_auth::UserClaims;
use armada_gateway_db::NewAuditLogEntry;

use crate::api::{AppState, DEFAULT_EXEC_TIMEOUT_SECS, EXEC_GRACE_SECS, MAX_EXEC_TIMEOUT_SECS};
use crate::broker::BrokerError;
use crate::client_info::ClientIp;
use crate::error::GatewayError;
use crate::rbac::{authorize, derive_scope};
use crate::registry::AgentStatus;

#[derive(Debug, Serialize)]
pub struct ClusterResponse {
	pub name: String,
	pub status: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub kubernetes_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub node_count: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterListResponse {
	pub clusters: Vec<ClusterResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ExecRequest {
	#[serde(default)]
	pub command: Vec<String>,
	pub namespace: Option<String>,
	pub timeout: Option<i32>,
	pub stdin: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecResponse {
	pub output: String,
	pub exit_code: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// GET /api/v1/clusters, the live view drawn from the agent registry.
#[instrument(skip_all)]
pub async fn list_clusters(State(state): State<AppState>) -> Json<ClusterListResponse> {
	let clusters = state
		.registry
		.list()
		.into_iter()
		.map(|agent| ClusterResponse {
			name: agent.cluster_name,
			status: agent.status.as_str().to_string(),
			kubernetes_version: agent.kubernetes_version,
			node_count: agent.node_count,
			region: agent.region,
			provider: agent.provider,
		})
		.collect();

	Json(ClusterListResponse { clusters })
}

/// Clamp a requested timeout into `[1, 300]`; missing or zero becomes the
/// 30-second default.
pub fn clamp_timeout(requested: Option<i32>) -> i32 {
	match requested {
		None | Some(0) => DEFAULT_EXEC_TIMEOUT_SECS,
		Some(t) => t.clamp(1, MAX_EXEC_TIMEOUT_SECS),
	}
}

/// POST /api/v1/clusters/{name}/exec
#[instrument(skip_all, fields(cluster = %name, user = %claims.email))]
pub async fn exec_command(
	State(state): State<AppState>,
	Extension(claims): Extension<UserClaims>,
	Path(name): Path<String>,
	ClientIp(ip): ClientIp,
	Json(body): Json<ExecRequest>,
) -> Result<Json<ExecResponse>, GatewayError> {
	// Resolve the cluster's live agent.
	let Some(agent) = state.registry.get_by_cluster_name(&name) else {
		return Err(GatewayError::NotFound("cluster not found".to_string()));
	};
	if agent.status != AgentStatus::Connected {
		return Err(GatewayError::Unavailable(
			"cluster agent is disconnected".to_string(),
		));
	}

	// Validate the body.
	if body.command.is_empty() {
		return Err(GatewayError::BadRequest("command is required".to_string()));
	}
	let timeout_secs = clamp_timeout(body.timeout);

	let command_line = body.command.join(" ");

	// RBAC admission before anything is enqueued.
	let scope = derive_scope(&name, &body.command, body.namespace.as_deref());
	let allowed = authorize(&state.db.roles(), claims.user_id(), &scope).await?;
	if !allowed {
		write_audit(
			&state,
			&claims,
			&name,
			&command_line,
			body.namespace.as_deref(),
			"denied",
			None,
			None,
			None,
			ip.as_deref(),
		)
		.await;
		return Err(GatewayError::Forbidden("permission denied".to_string()));
	}

	// Enqueue and wait on the rendezvous.
	let started = Instant::now();
	let request_id = state.broker.enqueue(
		&agent.agent_id,
		body.command.clone(),
		body.namespace.clone(),
		timeout_secs,
		body.stdin.clone(),
	);

	let deadline = Duration::from_secs(timeout_secs as u64 + EXEC_GRACE_SECS);
	let outcome = state.broker.wait(&request_id, deadline).await;

	// Caller cleanup happens in every path before returning.
	state.broker.remove(&request_id);

	let duration_ms = started.elapsed().as_millis() as i64;

	match outcome {
		Ok(result) => {
			// Assemble output: stdout then stderr, newline-separated when
			// both are non-empty.
			let stdout = String::from_utf8_lossy(&result.stdout);
			let stderr = String::from_utf8_lossy(&result.stderr);
			let output = match (stdout.is_empty(), stderr.is_empty()) {
				(false, false) => format!("{stdout}\n{stderr}"),
				(false, true) => stdout.into_owned(),
				(true, _) => stderr.into_owned(),
			};

			let status = if result.error_message.is_some() {
				"failed"
			} else {
				"completed"
			};
			write_audit(
				&state,
				&claims,
				&name,
				&command_line,
				body.namespace.as_deref(),
				status,
				Some(result.exit_code),
				Some(duration_ms),
				result.error_message.as_deref(),
				ip.as_deref(),
			)
			.await;

			Ok(Json(ExecResponse {
				output,
				exit_code: result.exit_code,
				error: result.error_message,
			}))
		}
		Err(BrokerError::DeadlineExceeded) => {
			write_audit(
				&state,
				&claims,
				&name,
				&command_line,
				body.namespace.as_deref(),
				"timeout",
				None,
				Some(duration_ms),
				Some("command execution timed out"),
				ip.as_deref(),
			)
			.await;
			// Deadline exceeded maps to 504.
			Err(GatewayError::Timeout(
				"command execution timed out".to_string(),
			))
		}
		Err(err) => Err(GatewayError::Internal(format!("broker: {err}"))),
	}
}

/// One audit row per exec. Failures are logged, never surfaced: the
/// command outcome has already been decided.
#[allow(clippy::too_many_arguments)]
async fn write_audit(
	state: &AppState,
	claims: &UserClaims,
	cluster: &str,
	command: &str,
	namespace: Option<&str>,
	status: &str,
	exit_code: Option<i32>,
	duration_ms: Option<i64>,
	error_message: Option<&str>,
	client_ip: Option<&str>,
) {
	let entry = NewAuditLogEntry {
		user_id: Some(claims.user_id().to_string()),
		user_email: claims.email.clone(),
		cluster_name: cluster.to_string(),
		cluster_id: None,
		command: command.to_string(),
		namespace: namespace.map(str::to_string),
		status: status.to_string(),
		exit_code,
		duration_ms,
		error_message: error_message.map(str::to_string),
		client_ip: client_ip.map(str::to_string),
	};

	if let Err(e) = state.db.audit_logs().create_audit_log(&entry).await {
		warn!(error = %e, cluster, "failed to write audit record");
	}
}
