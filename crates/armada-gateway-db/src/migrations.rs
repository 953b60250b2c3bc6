// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Schema creation and system-role seeding.
//!
//! Migrations are idempotent: every statement is `IF NOT EXISTS` or
//! `INSERT OR IGNORE`, so the gateway runs them unconditionally at startup.

use sqlx::SqlitePool;

use crate::error::{DbError, Result};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name          TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email);

CREATE TABLE IF NOT EXISTS clusters (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL UNIQUE,
    status             TEXT NOT NULL DEFAULT 'disconnected',
    agent_id           TEXT,
    kubernetes_version TEXT,
    node_count         INTEGER,
    region             TEXT,
    provider           TEXT,
    last_seen_at       TEXT,
    created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_clusters_name ON clusters(name);
CREATE INDEX IF NOT EXISTS idx_clusters_status ON clusters(status);

CREATE TABLE IF NOT EXISTS agent_tokens (
    id           TEXT PRIMARY KEY,
    cluster_id   TEXT NOT NULL REFERENCES clusters(id) ON DELETE CASCADE,
    token_hash   TEXT NOT NULL,
    token_prefix TEXT NOT NULL,
    description  TEXT,
    is_revoked   INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT,
    expires_at   TEXT,
    created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_agent_tokens_cluster_id ON agent_tokens(cluster_id);
CREATE INDEX IF NOT EXISTS idx_agent_tokens_token_hash ON agent_tokens(token_hash);

CREATE TABLE IF NOT EXISTS roles (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    description TEXT,
    is_system   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_roles_name ON roles(name);

CREATE TABLE IF NOT EXISTS permissions (
    id                TEXT PRIMARY KEY,
    role_id           TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    cluster_pattern   TEXT NOT NULL DEFAULT '*',
    namespace_pattern TEXT NOT NULL DEFAULT '*',
    resource_pattern  TEXT NOT NULL DEFAULT '*',
    verbs             TEXT NOT NULL DEFAULT '*'
);
CREATE INDEX IF NOT EXISTS idx_permissions_role_id ON permissions(role_id);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id     TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    assigned_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    assigned_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    PRIMARY KEY (user_id, role_id)
);
CREATE INDEX IF NOT EXISTS idx_user_roles_user_id ON user_roles(user_id);
CREATE INDEX IF NOT EXISTS idx_user_roles_role_id ON user_roles(role_id);

CREATE TABLE IF NOT EXISTS audit_logs (
    id            TEXT PRIMARY KEY,
    user_id       TEXT REFERENCES users(id) ON DELETE SET NULL,
    user_email    TEXT NOT NULL,
    cluster_name  TEXT NOT NULL,
    cluster_id    TEXT REFERENCES clusters(id) ON DELETE SET NULL,
    command       TEXT NOT NULL,
    namespace     TEXT,
    status        TEXT NOT NULL,
    exit_code     INTEGER,
    duration_ms   INTEGER,
    error_message TEXT,
    client_ip     TEXT,
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_user_email ON audit_logs(user_email);
CREATE INDEX IF NOT EXISTS idx_audit_logs_cluster_name ON audit_logs(cluster_name);
CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at);

CREATE TABLE IF NOT EXISTS refresh_tokens (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_refresh_tokens_token_hash ON refresh_tokens(token_hash);
"#;

/// Fixed ids keep the seed idempotent across restarts.
pub const ADMIN_ROLE_ID: &str = "00000000-0000-0000-0000-000000000001";
pub const VIEWER_ROLE_ID: &str = "00000000-0000-0000-0000-000000000002";
const ADMIN_PERM_ID: &str = "00000000-0000-0000-0000-000000000003";
const VIEWER_PERM_ID: &str = "00000000-0000-0000-0000-000000000004";

/// Create the schema and seed the `admin` and `viewer` system roles.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	sqlx::raw_sql(SCHEMA_SQL)
		.execute(pool)
		.await
		.map_err(|e| DbError::Internal(format!("create schema: {e}")))?;

	seed_role(
		pool,
		ADMIN_ROLE_ID,
		"admin",
		"Full administrative access",
		ADMIN_PERM_ID,
		"*",
	)
	.await?;
	seed_role(
		pool,
		VIEWER_ROLE_ID,
		"viewer",
		"Read-only access",
		VIEWER_PERM_ID,
		"get,list,describe,logs",
	)
	.await?;

	tracing::debug!("migrations applied");
	Ok(())
}

async fn seed_role(
	pool: &SqlitePool,
	role_id: &str,
	name: &str,
	description: &str,
	perm_id: &str,
	verbs: &str,
) -> Result<()> {
	sqlx::query("INSERT OR IGNORE INTO roles (id, name, description, is_system) VALUES (?, ?, ?, 1)")
		.bind(role_id)
		.bind(name)
		.bind(description)
		.execute(pool)
		.await
		.map_err(|e| DbError::Internal(format!("seed role {name}: {e}")))?;

	sqlx::query(
		r#"
		INSERT OR IGNORE INTO permissions (id, role_id, cluster_pattern, namespace_pattern, resource_pattern, verbs)
		VALUES (?, ?, '*', '*', '*', ?)
		"#,
	)
	.bind(perm_id)
	.bind(role_id)
	.bind(verbs)
	.execute(pool)
	.await
	.map_err(|e| DbError::Internal(format!("seed permission for {name}: {e}")))?;

	Ok(())
}
