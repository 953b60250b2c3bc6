// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Persisted entity types.
//!
//! Secret material (password hashes, token hashes) is skipped during
//! serialization so these types can be returned from API handlers directly.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
	pub id: String,
	pub email: String,
	#[serde(skip_serializing)]
	pub password_hash: String,
	pub name: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// The persisted directory row for a cluster. The live connection state is
/// owned by the in-memory agent registry; this row survives restarts.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterRecord {
	pub id: String,
	pub name: String,
	pub status: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub agent_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub kubernetes_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub node_count: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_seen_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Pre-shared secret that authorizes an agent's first attach. Only the
/// SHA-256 hash is stored; the prefix is a non-secret display aid.
#[derive(Debug, Clone, Serialize)]
pub struct AgentToken {
	pub id: String,
	pub cluster_id: String,
	#[serde(skip_serializing)]
	pub token_hash: String,
	pub token_prefix: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub is_revoked: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_used_at: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

impl AgentToken {
	/// Usable means not revoked and not past its expiry.
	pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
		!self.is_revoked && self.expires_at.map_or(true, |exp| now < exp)
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct Role {
	pub id: String,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub is_system: bool,
	pub permissions: Vec<Permission>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Permission {
	pub id: String,
	pub role_id: String,
	pub cluster_pattern: String,
	pub namespace_pattern: String,
	pub resource_pattern: String,
	/// Comma-separated verb set; `*` grants all verbs.
	pub verbs: String,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
	pub id: String,
	pub user_id: String,
	pub token_hash: String,
	pub expires_at: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	pub user_email: String,
	pub cluster_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cluster_id: Option<String>,
	/// The verbatim argv, space-joined.
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	pub status: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub exit_code: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_ip: Option<String>,
	pub created_at: DateTime<Utc>,
}

/// Filters for listing audit logs. All fields are optional and combine
/// conjunctively.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
	pub user_email: Option<String>,
	pub cluster_name: Option<String>,
	pub status: Option<String>,
	pub from: Option<DateTime<Utc>>,
	pub to: Option<DateTime<Utc>>,
}
