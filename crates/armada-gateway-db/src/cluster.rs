// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Cluster directory repository.
//!
//! A cluster row is the durable record for a cluster name. Live connection
//! state lives in the in-memory agent registry; on a successful agent attach
//! the row is upserted with the latest agent id and metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::entities::ClusterRecord;
use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_opt_timestamp, parse_timestamp};

/// Metadata reported by an agent at attach time.
#[derive(Debug, Clone, Default)]
pub struct ClusterMetadata {
	pub kubernetes_version: Option<String>,
	pub node_count: Option<i32>,
	pub region: Option<String>,
	pub provider: Option<String>,
}

#[async_trait]
pub trait ClusterStore: Send + Sync {
	async fn create_cluster(&self, name: &str) -> Result<ClusterRecord>;
	async fn get_cluster_by_id(&self, id: &str) -> Result<Option<ClusterRecord>>;
	async fn get_cluster_by_name(&self, name: &str) -> Result<Option<ClusterRecord>>;
	async fn list_clusters(&self, limit: i64, offset: i64) -> Result<(Vec<ClusterRecord>, i64)>;
	async fn mark_attached(
		&self,
		name: &str,
		agent_id: &str,
		metadata: &ClusterMetadata,
		at: DateTime<Utc>,
	) -> Result<()>;
	async fn delete_cluster(&self, id: &str) -> Result<bool>;
}

#[async_trait]
impl ClusterStore for ClusterRepository {
	async fn create_cluster(&self, name: &str) -> Result<ClusterRecord> {
		self.create_cluster(name).await
	}

	async fn get_cluster_by_id(&self, id: &str) -> Result<Option<ClusterRecord>> {
		self.get_cluster_by_id(id).await
	}

	async fn get_cluster_by_name(&self, name: &str) -> Result<Option<ClusterRecord>> {
		self.get_cluster_by_name(name).await
	}

	async fn list_clusters(&self, limit: i64, offset: i64) -> Result<(Vec<ClusterRecord>, i64)> {
		self.list_clusters(limit, offset).await
	}

	async fn mark_attached(
		&self,
		name: &str,
		agent_id: &str,
		metadata: &ClusterMetadata,
		at: DateTime<Utc>,
	) -> Result<()> {
		self.mark_attached(name, agent_id, metadata, at).await
	}

	async fn delete_cluster(&self, id: &str) -> Result<bool> {
		self.delete_cluster(id).await
	}
}

#[derive(Clone)]
pub struct ClusterRepository {
	pool: SqlitePool,
}

impl ClusterRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new cluster row with status `disconnected`.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn create_cluster(&self, name: &str) -> Result<ClusterRecord> {
		let id = Uuid::new_v4().to_string();
		let now = format_timestamp(Utc::now());

		sqlx::query(
			r#"
			INSERT INTO clusters (id, name, status, created_at, updated_at)
			VALUES (?, ?, 'disconnected', ?, ?)
			"#,
		)
		.bind(&id)
		.bind(name)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				DbError::Conflict(format!("cluster {name} already exists"))
			}
			other => DbError::Sqlx(other),
		})?;

		self.get_cluster_by_id(&id)
			.await?
			.ok_or_else(|| DbError::Internal("created cluster not readable".to_string()))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_cluster_by_id(&self, id: &str) -> Result<Option<ClusterRecord>> {
		let row = sqlx::query(&select("WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| parse_cluster_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_cluster_by_name(&self, name: &str) -> Result<Option<ClusterRecord>> {
		let row = sqlx::query(&select("WHERE name = ?"))
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| parse_cluster_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_clusters(&self, limit: i64, offset: i64) -> Result<(Vec<ClusterRecord>, i64)> {
		let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clusters")
			.fetch_one(&self.pool)
			.await?;

		let rows = sqlx::query(&select("ORDER BY name LIMIT ? OFFSET ?"))
			.bind(limit)
			.bind(offset)
			.fetch_all(&self.pool)
			.await?;

		let clusters = rows
			.iter()
			.map(parse_cluster_row)
			.collect::<Result<Vec<_>>>()?;
		Ok((clusters, total))
	}

	/// Record a successful agent attach: create or update the row with the
	/// new agent id, metadata, and `connected` status. Last attach wins.
	#[tracing::instrument(skip(self, metadata), fields(name = %name, agent_id = %agent_id))]
	pub async fn mark_attached(
		&self,
		name: &str,
		agent_id: &str,
		metadata: &ClusterMetadata,
		at: DateTime<Utc>,
	) -> Result<()> {
		let id = Uuid::new_v4().to_string();
		let now = format_timestamp(at);

		sqlx::query(
			r#"
			INSERT INTO clusters
				(id, name, status, agent_id, kubernetes_version, node_count, region, provider, last_seen_at, created_at, updated_at)
			VALUES (?, ?, 'connected', ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(name) DO UPDATE SET
				status = 'connected',
				agent_id = excluded.agent_id,
				kubernetes_version = excluded.kubernetes_version,
				node_count = excluded.node_count,
				region = excluded.region,
				provider = excluded.provider,
				last_seen_at = excluded.last_seen_at,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(&id)
		.bind(name)
		.bind(agent_id)
		.bind(&metadata.kubernetes_version)
		.bind(metadata.node_count)
		.bind(&metadata.region)
		.bind(&metadata.provider)
		.bind(&now)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_cluster(&self, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM clusters WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}

fn select(suffix: &str) -> String {
	format!(
		"SELECT id, name, status, agent_id, kubernetes_version, node_count, region, provider, last_seen_at, created_at, updated_at FROM clusters {suffix}"
	)
}

fn parse_cluster_row(row: &sqlx::sqlite::SqliteRow) -> Result<ClusterRecord> {
	Ok(ClusterRecord {
		id: row.try_get("id")?,
		name: row.try_get("name")?,
		status: row.try_get("status")?,
		agent_id: row.try_get("agent_id")?,
		kubernetes_version: row.try_get("kubernetes_version")?,
		node_count: row
			.try_get::<Option<i64>, _>("node_count")?
			.map(|n| n as i32),
		region: row.try_get("region")?,
		provider: row.try_get("provider")?,
		last_seen_at: parse_opt_timestamp(row.try_get("last_seen_at")?)?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::run_migrations;
	use crate::pool::create_memory_pool;

	async fn repo() -> ClusterRepository {
		let pool = create_memory_pool().await.unwrap();
		run_migrations(&pool).await.unwrap();
		ClusterRepository::new(pool)
	}

	#[tokio::test]
	async fn create_starts_disconnected() {
		let repo = repo().await;
		let cluster = repo.create_cluster("edge-1").await.unwrap();
		assert_eq!(cluster.status, "disconnected");
		assert!(cluster.agent_id.is_none());
	}

	#[tokio::test]
	async fn duplicate_name_conflicts() {
		let repo = repo().await;
		repo.create_cluster("edge-1").await.unwrap();
		assert!(matches!(
			repo.create_cluster("edge-1").await,
			Err(DbError::Conflict(_))
		));
	}

	#[tokio::test]
	async fn mark_attached_upserts_and_last_attach_wins() {
		let repo = repo().await;
		let metadata = ClusterMetadata {
			kubernetes_version: Some("v1.31.0".to_string()),
			node_count: Some(5),
			region: Some("eu-west-1".to_string()),
			provider: Some("aws".to_string()),
		};

		// First attach creates the row.
		repo.mark_attached("edge-1", "agent-aaaa", &metadata, Utc::now())
			.await
			.unwrap();
		let first = repo.get_cluster_by_name("edge-1").await.unwrap().unwrap();
		assert_eq!(first.status, "connected");
		assert_eq!(first.agent_id.as_deref(), Some("agent-aaaa"));
		assert_eq!(first.node_count, Some(5));

		// Re-attach replaces the agent id, keeps the row id.
		repo.mark_attached("edge-1", "agent-bbbb", &metadata, Utc::now())
			.await
			.unwrap();
		let second = repo.get_cluster_by_name("edge-1").await.unwrap().unwrap();
		assert_eq!(second.id, first.id);
		assert_eq!(second.agent_id.as_deref(), Some("agent-bbbb"));

		let (_, total) = repo.list_clusters(10, 0).await.unwrap();
		assert_eq!(total, 1);
	}

	#[tokio::test]
	async fn list_is_ordered_and_counted() {
		let repo = repo().await;
		repo.create_cluster("beta").await.unwrap();
		repo.create_cluster("alpha").await.unwrap();

		let (clusters, total) = repo.list_clusters(10, 0).await.unwrap();
		assert_eq!(total, 2);
		assert_eq!(clusters[0].name, "alpha");
		assert_eq!(clusters[1].name, "beta");
	}
}
