// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Audit log repository.
//!
//! One row per brokered command: who, where, what, and how it ended.
//! Retention is age-based; the supervisor calls the cleanup on a timer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::entities::{AuditLogEntry, AuditLogFilter};
use crate::error::Result;
use crate::time::{format_timestamp, parse_timestamp};

/// A record to append, before the id and timestamp are assigned.
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
	pub user_id: Option<String>,
	pub user_email: String,
	pub cluster_name: String,
	pub cluster_id: Option<String>,
	pub command: String,
	pub namespace: Option<String>,
	pub status: String,
	pub exit_code: Option<i32>,
	pub duration_ms: Option<i64>,
	pub error_message: Option<String>,
	pub client_ip: Option<String>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
	async fn create_audit_log(&self, entry: &NewAuditLogEntry) -> Result<String>;
	async fn list_audit_logs(
		&self,
		filter: &AuditLogFilter,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<AuditLogEntry>, i64)>;
	async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl AuditStore for AuditRepository {
	async fn create_audit_log(&self, entry: &NewAuditLogEntry) -> Result<String> {
		self.create_audit_log(entry).await
	}

	async fn list_audit_logs(
		&self,
		filter: &AuditLogFilter,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<AuditLogEntry>, i64)> {
		self.list_audit_logs(filter, limit, offset).await
	}

	async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		self.delete_audit_logs_before(cutoff).await
	}
}

#[derive(Clone)]
pub struct AuditRepository {
	pool: SqlitePool,
}

impl AuditRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, entry), fields(cluster = %entry.cluster_name, status = %entry.status))]
	pub async fn create_audit_log(&self, entry: &NewAuditLogEntry) -> Result<String> {
		let id = Uuid::new_v4().to_string();

		sqlx::query(
			r#"
			INSERT INTO audit_logs
				(id, user_id, user_email, cluster_name, cluster_id, command, namespace,
				 status, exit_code, duration_ms, error_message, client_ip, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(&entry.user_id)
		.bind(&entry.user_email)
		.bind(&entry.cluster_name)
		.bind(&entry.cluster_id)
		.bind(&entry.command)
		.bind(&entry.namespace)
		.bind(&entry.status)
		.bind(entry.exit_code)
		.bind(entry.duration_ms)
		.bind(&entry.error_message)
		.bind(&entry.client_ip)
		.bind(format_timestamp(Utc::now()))
		.execute(&self.pool)
		.await?;

		Ok(id)
	}

	/// List entries matching the filter, newest first. Returns the page and
	/// the total matching count.
	#[tracing::instrument(skip(self, filter))]
	pub async fn list_audit_logs(
		&self,
		filter: &AuditLogFilter,
		limit: i64,
		offset: i64,
	) -> Result<(Vec<AuditLogEntry>, i64)> {
		let mut count_query: QueryBuilder<Sqlite> =
			QueryBuilder::new("SELECT COUNT(*) FROM audit_logs WHERE 1=1");
		push_filters(&mut count_query, filter);
		let total: i64 = count_query
			.build_query_scalar()
			.fetch_one(&self.pool)
			.await?;

		let mut list_query: QueryBuilder<Sqlite> = QueryBuilder::new(
			r#"
			SELECT id, user_id, user_email, cluster_name, cluster_id, command, namespace,
			       status, exit_code, duration_ms, error_message, client_ip, created_at
			FROM audit_logs WHERE 1=1
			"#,
		);
		push_filters(&mut list_query, filter);
		list_query.push(" ORDER BY created_at DESC, id LIMIT ");
		list_query.push_bind(limit);
		list_query.push(" OFFSET ");
		list_query.push_bind(offset);

		let rows = list_query.build().fetch_all(&self.pool).await?;
		let entries = rows
			.iter()
			.map(parse_audit_row)
			.collect::<Result<Vec<_>>>()?;

		Ok((entries, total))
	}

	/// Delete entries created before the cutoff. Returns the number removed.
	#[tracing::instrument(skip(self))]
	pub async fn delete_audit_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM audit_logs WHERE created_at < ?")
			.bind(format_timestamp(cutoff))
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &AuditLogFilter) {
	if let Some(email) = &filter.user_email {
		query.push(" AND user_email = ");
		query.push_bind(email.clone());
	}
	if let Some(cluster) = &filter.cluster_name {
		query.push(" AND cluster_name = ");
		query.push_bind(cluster.clone());
	}
	if let Some(status) = &filter.status {
		query.push(" AND status = ");
		query.push_bind(status.clone());
	}
	if let Some(from) = filter.from {
		query.push(" AND created_at >= ");
		query.push_bind(format_timestamp(from));
	}
	if let Some(to) = filter.to {
		query.push(" AND created_at <= ");
		query.push_bind(format_timestamp(to));
	}
}

fn parse_audit_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuditLogEntry> {
	Ok(AuditLogEntry {
		id: row.try_get("id")?,
		user_id: row.try_get("user_id")?,
		user_email: row.try_get("user_email")?,
		cluster_name: row.try_get("cluster_name")?,
		cluster_id: row.try_get("cluster_id")?,
		command: row.try_get("command")?,
		namespace: row.try_get("namespace")?,
		status: row.try_get("status")?,
		exit_code: row
			.try_get::<Option<i64>, _>("exit_code")?
			.map(|c| c as i32),
		duration_ms: row.try_get("duration_ms")?,
		error_message: row.try_get("error_message")?,
		client_ip: row.try_get("client_ip")?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
	})
}
