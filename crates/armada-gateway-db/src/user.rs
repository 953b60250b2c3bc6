// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! User repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::entities::User;
use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_timestamp};

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn create_user(&self, email: &str, password_hash: &str, name: &str) -> Result<User>;
	async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;
	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
	async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)>;
	async fn update_user(&self, user: &User) -> Result<()>;
	async fn delete_user(&self, id: &str) -> Result<bool>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn create_user(&self, email: &str, password_hash: &str, name: &str) -> Result<User> {
		self.create_user(email, password_hash, name).await
	}

	async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
		self.get_user_by_id(id).await
	}

	async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
		self.get_user_by_email(email).await
	}

	async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
		self.list_users(limit, offset).await
	}

	async fn update_user(&self, user: &User) -> Result<()> {
		self.update_user(user).await
	}

	async fn delete_user(&self, id: &str) -> Result<bool> {
		self.delete_user(id).await
	}
}

/// Repository for user rows. Password hashes go in and out verbatim;
/// hashing is the auth layer's job.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a new user. Fails with `Conflict` when the email is taken.
	#[tracing::instrument(skip(self, password_hash), fields(email = %email))]
	pub async fn create_user(
		&self,
		email: &str,
		password_hash: &str,
		name: &str,
	) -> Result<User> {
		let id = Uuid::new_v4().to_string();
		let now = format_timestamp(Utc::now());

		sqlx::query(
			r#"
			INSERT INTO users (id, email, password_hash, name, is_active, created_at, updated_at)
			VALUES (?, ?, ?, ?, 1, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(email)
		.bind(password_hash)
		.bind(name)
		.bind(&now)
		.bind(&now)
		.execute(&self.pool)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				DbError::Conflict(format!("user with email {email} already exists"))
			}
			other => DbError::Sqlx(other),
		})?;

		tracing::debug!(user_id = %id, "user created");
		self.get_user_by_id(&id)
			.await?
			.ok_or_else(|| DbError::Internal("created user not readable".to_string()))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
		let row = sqlx::query(
			"SELECT id, email, password_hash, name, is_active, created_at, updated_at FROM users WHERE id = ?",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_user_row(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(email = %email))]
	pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
		let row = sqlx::query(
			"SELECT id, email, password_hash, name, is_active, created_at, updated_at FROM users WHERE email = ?",
		)
		.bind(email)
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| parse_user_row(&r)).transpose()
	}

	/// List users ordered by creation time, newest first. Returns the page
	/// and the total count.
	#[tracing::instrument(skip(self))]
	pub async fn list_users(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64)> {
		let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
			.fetch_one(&self.pool)
			.await?;

		let rows = sqlx::query(
			r#"
			SELECT id, email, password_hash, name, is_active, created_at, updated_at
			FROM users
			ORDER BY created_at DESC, id
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(limit)
		.bind(offset)
		.fetch_all(&self.pool)
		.await?;

		let users = rows
			.iter()
			.map(parse_user_row)
			.collect::<Result<Vec<_>>>()?;
		Ok((users, total))
	}

	/// Update mutable fields: name, password hash, active flag.
	#[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
	pub async fn update_user(&self, user: &User) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE users
			SET name = ?, password_hash = ?, is_active = ?, updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(&user.name)
		.bind(&user.password_hash)
		.bind(user.is_active as i32)
		.bind(format_timestamp(Utc::now()))
		.bind(&user.id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("user {}", user.id)));
		}
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_user(&self, id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM users WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
	Ok(User {
		id: row.try_get("id")?,
		email: row.try_get("email")?,
		password_hash: row.try_get("password_hash")?,
		name: row.try_get("name")?,
		is_active: row.try_get::<i64, _>("is_active")? != 0,
		created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
		updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
	})
}
