// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent token repository.
//!
//! Tokens authorize an agent's first attach. Plaintext is never stored;
//! lookups go through the SHA-256 hash. The short prefix is for display.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::entities::AgentToken;
use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_opt_timestamp, parse_timestamp};

#[async_trait]
pub trait AgentTokenStore: Send + Sync {
	async fn create_agent_token(
		&self,
		cluster_id: &str,
		token_hash: &str,
		token_prefix: &str,
		description: Option<&str>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<AgentToken>;
	async fn get_agent_token_by_id(&self, id: &str) -> Result<Option<AgentToken>>;
	async fn get_agent_token_by_hash(&self, token_hash: &str) -> Result<Option<AgentToken>>;
	async fn list_agent_tokens_by_cluster(&self, cluster_id: &str) -> Result<Vec<AgentToken>>;
	async fn revoke_agent_token(&self, id: &str) -> Result<bool>;
	async fn touch_last_used(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl AgentTokenStore for AgentTokenRepository {
	async fn create_agent_token(
		&self,
		cluster_id: &str,
		token_hash: &str,
		token_prefix: &str,
		description: Option<&str>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<AgentToken> {
		self
			.create_agent_token(cluster_id, token_hash, token_prefix, description, expires_at)
			.await
	}

	async fn get_agent_token_by_id(&self, id: &str) -> Result<Option<AgentToken>> {
		self.get_agent_token_by_id(id).await
	}

	async fn get_agent_token_by_hash(&self, token_hash: &str) -> Result<Option<AgentToken>> {
		self.get_agent_token_by_hash(token_hash).await
	}

	async fn list_agent_tokens_by_cluster(&self, cluster_id: &str) -> Result<Vec<AgentToken>> {
		self.list_agent_tokens_by_cluster(cluster_id).await
	}

	async fn revoke_agent_token(&self, id: &str) -> Result<bool> {
		self.revoke_agent_token(id).await
	}

	async fn touch_last_used(&self, id: &str) -> Result<()> {
		self.touch_last_used(id).await
	}
}

#[derive(Clone)]
pub struct AgentTokenRepository {
	pool: SqlitePool,
}

impl AgentTokenRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a token record. The caller generates the plaintext and passes
	/// only its hash and display prefix.
	#[tracing::instrument(skip(self, token_hash), fields(cluster_id = %cluster_id))]
	pub async fn create_agent_token(
		&self,
		cluster_id: &str,
		token_hash: &str,
		token_prefix: &str,
		description: Option<&str>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<AgentToken> {
		let id = Uuid::new_v4().to_string();
		let now = format_timestamp(Utc::now());

		sqlx::query(
			r#"
			INSERT INTO agent_tokens (id, cluster_id, token_hash, token_prefix, description, is_revoked, expires_at, created_at)
			VALUES (?, ?, ?, ?, ?, 0, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(cluster_id)
		.bind(token_hash)
		.bind(token_prefix)
		.bind(description)
		.bind(expires_at.map(format_timestamp))
		.bind(&now)
		.execute(&self.pool)
		.await?;

		tracing::debug!(token_id = %id, "agent token created");
		self.get_agent_token_by_id(&id)
			.await?
			.ok_or_else(|| DbError::Internal("created agent token not readable".to_string()))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_agent_token_by_id(&self, id: &str) -> Result<Option<AgentToken>> {
		let row = sqlx::query(&select("WHERE id = ?"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| parse_token_row(&r)).transpose()
	}

	/// Look up a token by the hash of a presented plaintext. Returns the row
	/// regardless of revocation or expiry; callers check `is_usable`.
	#[tracing::instrument(skip(self, token_hash))]
	pub async fn get_agent_token_by_hash(&self, token_hash: &str) -> Result<Option<AgentToken>> {
		let row = sqlx::query(&select("WHERE token_hash = ?"))
			.bind(token_hash)
			.fetch_optional(&self.pool)
			.await?;
		row.map(|r| parse_token_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_agent_tokens_by_cluster(&self, cluster_id: &str) -> Result<Vec<AgentToken>> {
		let rows = sqlx::query(&select("WHERE cluster_id = ? ORDER BY created_at DESC"))
			.bind(cluster_id)
			.fetch_all(&self.pool)
			.await?;
		rows.iter().map(parse_token_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn revoke_agent_token(&self, id: &str) -> Result<bool> {
		let result = sqlx::query("UPDATE agent_tokens SET is_revoked = 1 WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Stamp the token's last use. Called on every successful register.
	#[tracing::instrument(skip(self))]
	pub async fn touch_last_used(&self, id: &str) -> Result<()> {
		sqlx::query("UPDATE agent_tokens SET last_used_at = ? WHERE id = ?")
			.bind(format_timestamp(Utc::now()))
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

fn select(suffix: &str) -> String {
	format!(
		"SELECT id, cluster_id, token_hash, token_prefix, description, is_revoked, last_used_at, expires_at, created_at FROM agent_tokens {suffix}"
	)
}

fn parse_token_row(row: &sqlx::sqlite::SqliteRow) -> Result<AgentToken> {
	Ok(AgentToken {
		id: row.try_get("id")?,
		cluster_id: row.try_get("cluster_id")?,
		token_hash: row.try_get("token_hash")?,
		token_prefix: row.try_get("token_prefix")?,
		description: row.try_get("description")?,
		is_revoked: row.try_get::<i64, _>("is_revoked")? != 0,
		last_used_at: parse_opt_timestamp(row.try_get("last_used_at")?)?,
		expires_at: parse_opt_timestamp(row.try_get("expires_at")?)?,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cluster::ClusterRepository;
	use crate::migrations::run_migrations;
	use crate::pool::create_memory_pool;
	use chrono::Duration;

	async fn setup() -> (AgentTokenRepository, String) {
		let pool = create_memory_pool().await.unwrap();
		run_migrations(&pool).await.unwrap();
		let cluster = ClusterRepository::new(pool.clone())
			.create_cluster("edge-1")
			.await
			.unwrap();
		(AgentTokenRepository::new(pool), cluster.id)
	}

	#[tokio::test]
	async fn lookup_by_hash() {
		let (repo, cluster_id) = setup().await;
		let created = repo
			.create_agent_token(&cluster_id, "hash-abc", "deadbeef", Some("edge token"), None)
			.await
			.unwrap();

		let found = repo
			.get_agent_token_by_hash("hash-abc")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.id, created.id);
		assert_eq!(found.token_prefix, "deadbeef");
		assert!(found.is_usable(Utc::now()));

		assert!(repo
			.get_agent_token_by_hash("other-hash")
			.await
			.unwrap()
			.is_none());
	}

	#[tokio::test]
	async fn revoked_token_is_not_usable() {
		let (repo, cluster_id) = setup().await;
		let token = repo
			.create_agent_token(&cluster_id, "h", "p", None, None)
			.await
			.unwrap();

		assert!(repo.revoke_agent_token(&token.id).await.unwrap());
		let fetched = repo.get_agent_token_by_hash("h").await.unwrap().unwrap();
		assert!(fetched.is_revoked);
		assert!(!fetched.is_usable(Utc::now()));
	}

	#[tokio::test]
	async fn expired_token_is_not_usable() {
		let (repo, cluster_id) = setup().await;
		let past = Utc::now() - Duration::hours(1);
		repo.create_agent_token(&cluster_id, "h", "p", None, Some(past))
			.await
			.unwrap();

		let fetched = repo.get_agent_token_by_hash("h").await.unwrap().unwrap();
		assert!(!fetched.is_usable(Utc::now()));
	}

	#[tokio::test]
	async fn touch_last_used_stamps() {
		let (repo, cluster_id) = setup().await;
		let token = repo
			.create_agent_token(&cluster_id, "h", "p", None, None)
			.await
			.unwrap();
		assert!(token.last_used_at.is_none());

		repo.touch_last_used(&token.id).await.unwrap();
		let fetched = repo.get_agent_token_by_id(&token.id).await.unwrap().unwrap();
		assert!(fetched.last_used_at.is_some());
	}

	#[tokio::test]
	async fn list_by_cluster() {
		let (repo, cluster_id) = setup().await;
		repo.create_agent_token(&cluster_id, "h1", "p1", None, None)
			.await
			.unwrap();
		repo.create_agent_token(&cluster_id, "h2", "p2", None, None)
			.await
			.unwrap();

		let tokens = repo
			.list_agent_tokens_by_cluster(&cluster_id)
			.await
			.unwrap();
		assert_eq!(tokens.len(), 2);
	}
}
