// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Refresh token repository.
//!
//! Rotation contract: the auth handlers delete the presented record before
//! issuing a replacement, so a refresh value can never succeed twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::entities::RefreshToken;
use crate::error::Result;
use crate::time::{format_timestamp, parse_timestamp};

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
	async fn create_refresh_token(
		&self,
		user_id: &str,
		token_hash: &str,
		expires_at: DateTime<Utc>,
	) -> Result<RefreshToken>;
	async fn get_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>>;
	async fn delete_refresh_token(&self, id: &str) -> Result<bool>;
	async fn delete_refresh_tokens_by_user(&self, user_id: &str) -> Result<u64>;
	async fn cleanup_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
	async fn create_refresh_token(
		&self,
		user_id: &str,
		token_hash: &str,
		expires_at: DateTime<Utc>,
	) -> Result<RefreshToken> {
		self
			.create_refresh_token(user_id, token_hash, expires_at)
			.await
	}

	async fn get_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
		self.get_refresh_token_by_hash(token_hash).await
	}

	async fn delete_refresh_token(&self, id: &str) -> Result<bool> {
		self.delete_refresh_token(id).await
	}

	async fn delete_refresh_tokens_by_user(&self, user_id: &str) -> Result<u64> {
		self.delete_refresh_tokens_by_user(user_id).await
	}

	async fn cleanup_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
		self.cleanup_expired_refresh_tokens(now).await
	}
}

#[derive(Clone)]
pub struct RefreshTokenRepository {
	pool: SqlitePool,
}

impl RefreshTokenRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, token_hash), fields(user_id = %user_id))]
	pub async fn create_refresh_token(
		&self,
		user_id: &str,
		token_hash: &str,
		expires_at: DateTime<Utc>,
	) -> Result<RefreshToken> {
		let id = Uuid::new_v4().to_string();
		let now = Utc::now();

		sqlx::query(
			"INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(&id)
		.bind(user_id)
		.bind(token_hash)
		.bind(format_timestamp(expires_at))
		.bind(format_timestamp(now))
		.execute(&self.pool)
		.await?;

		Ok(RefreshToken {
			id,
			user_id: user_id.to_string(),
			token_hash: token_hash.to_string(),
			expires_at,
			created_at: now,
		})
	}

	#[tracing::instrument(skip(self, token_hash))]
	pub async fn get_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>> {
		let row = sqlx::query(
			"SELECT id, user_id, token_hash, expires_at, created_at FROM refresh_tokens WHERE token_hash = ?",
		)
		.bind(token_hash)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| {
			Ok(RefreshToken {
				id: r.try_get("id")?,
				user_id: r.try_get("user_id")?,
				token_hash: r.try_get("token_hash")?,
				expires_at: parse_timestamp(&r.try_get::<String, _>("expires_at")?)?,
				created_at: parse_timestamp(&r.try_get::<String, _>("created_at")?)?,
			})
		})
		.transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_refresh_token(&self, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Invalidate every session for a user (logout-everywhere, account
	/// disable).
	#[tracing::instrument(skip(self))]
	pub async fn delete_refresh_tokens_by_user(&self, user_id: &str) -> Result<u64> {
		let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
			.bind(user_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}

	/// Reap expired records. Returns the number removed.
	#[tracing::instrument(skip(self))]
	pub async fn cleanup_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
		let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
			.bind(format_timestamp(now))
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::migrations::run_migrations;
	use crate::pool::create_memory_pool;
	use crate::user::UserRepository;
	use chrono::Duration;

	async fn setup() -> (RefreshTokenRepository, String) {
		let pool = create_memory_pool().await.unwrap();
		run_migrations(&pool).await.unwrap();
		let user = UserRepository::new(pool.clone())
			.create_user("a@b.c", "h", "A")
			.await
			.unwrap();
		(RefreshTokenRepository::new(pool), user.id)
	}

	#[tokio::test]
	async fn create_and_lookup_by_hash() {
		let (repo, user_id) = setup().await;
		let expires = Utc::now() + Duration::days(7);
		repo.create_refresh_token(&user_id, "hash-1", expires)
			.await
			.unwrap();

		let found = repo
			.get_refresh_token_by_hash("hash-1")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.user_id, user_id);
	}

	#[tokio::test]
	async fn delete_makes_hash_unfindable() {
		let (repo, user_id) = setup().await;
		let token = repo
			.create_refresh_token(&user_id, "hash-1", Utc::now() + Duration::days(7))
			.await
			.unwrap();

		assert!(repo.delete_refresh_token(&token.id).await.unwrap());
		assert!(repo
			.get_refresh_token_by_hash("hash-1")
			.await
			.unwrap()
			.is_none());
		// Second delete is a no-op.
		assert!(!repo.delete_refresh_token(&token.id).await.unwrap());
	}

	#[tokio::test]
	async fn delete_by_user_clears_all_sessions() {
		let (repo, user_id) = setup().await;
		for i in 0..3 {
			repo.create_refresh_token(&user_id, &format!("hash-{i}"), Utc::now() + Duration::days(7))
				.await
				.unwrap();
		}
		assert_eq!(
			repo.delete_refresh_tokens_by_user(&user_id).await.unwrap(),
			3
		);
	}

	#[tokio::test]
	async fn cleanup_removes_only_expired() {
		let (repo, user_id) = setup().await;
		repo.create_refresh_token(&user_id, "stale", Utc::now() - Duration::hours(1))
			.await
			.unwrap();
		repo.create_refresh_token(&user_id, "fresh", Utc::now() + Duration::hours(1))
			.await
			.unwrap();

		let removed = repo
			.cleanup_expired_refresh_tokens(Utc::now())
			.await
			.unwrap();
		assert_eq!(removed, 1);
		assert!(repo.get_refresh_token_by_hash("stale").await.unwrap().is_none());
		assert!(repo.get_refresh_token_by_hash("fresh").await.unwrap().is_some());
	}
}
