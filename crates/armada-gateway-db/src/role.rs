// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Role, permission, and user-role assignment repository.
//!
//! System roles (`admin`, `viewer`) are seeded by the migrations and cannot
//! be deleted. A role's permissions ride along on every read.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::entities::{Permission, Role, User};
use crate::error::{DbError, Result};
use crate::time::{format_timestamp, parse_timestamp};
use crate::user::UserRepository;

/// A permission grant supplied when creating a role.
#[derive(Debug, Clone)]
pub struct NewPermission {
	pub cluster_pattern: String,
	pub namespace_pattern: String,
	pub resource_pattern: String,
	pub verbs: String,
}

#[async_trait]
pub trait RoleStore: Send + Sync {
	async fn create_role(
		&self,
		name: &str,
		description: Option<&str>,
		permissions: &[NewPermission],
	) -> Result<Role>;
	async fn get_role_by_id(&self, id: &str) -> Result<Option<Role>>;
	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>>;
	async fn list_roles(&self) -> Result<Vec<Role>>;
	async fn delete_role(&self, id: &str) -> Result<()>;
	async fn assign_role(&self, user_id: &str, role_id: &str, assigned_by: Option<&str>)
		-> Result<()>;
	async fn unassign_role(&self, user_id: &str, role_id: &str) -> Result<bool>;
	async fn list_roles_by_user(&self, user_id: &str) -> Result<Vec<Role>>;
	async fn list_users_by_role(&self, role_id: &str) -> Result<Vec<User>>;
}

#[async_trait]
impl RoleStore for RoleRepository {
	async fn create_role(
		&self,
		name: &str,
		description: Option<&str>,
		permissions: &[NewPermission],
	) -> Result<Role> {
		self.create_role(name, description, permissions).await
	}

	async fn get_role_by_id(&self, id: &str) -> Result<Option<Role>> {
		self.get_role_by_id(id).await
	}

	async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
		self.get_role_by_name(name).await
	}

	async fn list_roles(&self) -> Result<Vec<Role>> {
		self.list_roles().await
	}

	async fn delete_role(&self, id: &str) -> Result<()> {
		self.delete_role(id).await
	}

	async fn assign_role(
		&self,
		user_id: &str,
		role_id: &str,
		assigned_by: Option<&str>,
	) -> Result<()> {
		self.assign_role(user_id, role_id, assigned_by).await
	}

	async fn unassign_role(&self, user_id: &str, role_id: &str) -> Result<bool> {
		self.unassign_role(user_id, role_id).await
	}

	async fn list_roles_by_user(&self, user_id: &str) -> Result<Vec<Role>> {
		self.list_roles_by_user(user_id).await
	}

	async fn list_users_by_role(&self, role_id: &str) -> Result<Vec<User>> {
		self.list_users_by_role(role_id).await
	}
}

#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
}

impl RoleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a non-system role with its permission set.
	#[tracing::instrument(skip(self, permissions), fields(name = %name))]
	pub async fn create_role(
		&self,
		name: &str,
		description: Option<&str>,
		permissions: &[NewPermission],
	) -> Result<Role> {
		let id = Uuid::new_v4().to_string();
		let now = format_timestamp(Utc::now());

		let mut tx = self.pool.begin().await?;

		sqlx::query(
			"INSERT INTO roles (id, name, description, is_system, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?)",
		)
		.bind(&id)
		.bind(name)
		.bind(description)
		.bind(&now)
		.bind(&now)
		.execute(&mut *tx)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db) if db.is_unique_violation() => {
				DbError::Conflict(format!("role {name} already exists"))
			}
			other => DbError::Sqlx(other),
		})?;

		for perm in permissions {
			sqlx::query(
				r#"
				INSERT INTO permissions (id, role_id, cluster_pattern, namespace_pattern, resource_pattern, verbs)
				VALUES (?, ?, ?, ?, ?, ?)
				"#,
			)
			.bind(Uuid::new_v4().to_string())
			.bind(&id)
			.bind(&perm.cluster_pattern)
			.bind(&perm.namespace_pattern)
			.bind(&perm.resource_pattern)
			.bind(&perm.verbs)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		self.get_role_by_id(&id)
			.await?
			.ok_or_else(|| DbError::Internal("created role not readable".to_string()))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role_by_id(&self, id: &str) -> Result<Option<Role>> {
		let row = sqlx::query(
			"SELECT id, name, description, is_system, created_at, updated_at FROM roles WHERE id = ?",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.hydrate_role(&row).await?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
		let row = sqlx::query(
			"SELECT id, name, description, is_system, created_at, updated_at FROM roles WHERE name = ?",
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.hydrate_role(&row).await?)),
			None => Ok(None),
		}
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<Role>> {
		let rows = sqlx::query(
			"SELECT id, name, description, is_system, created_at, updated_at FROM roles ORDER BY name",
		)
		.fetch_all(&self.pool)
		.await?;

		let mut roles = Vec::with_capacity(rows.len());
		for row in &rows {
			roles.push(self.hydrate_role(row).await?);
		}
		Ok(roles)
	}

	/// Delete a role. System roles are immutable and refuse deletion.
	#[tracing::instrument(skip(self))]
	pub async fn delete_role(&self, id: &str) -> Result<()> {
		let is_system: Option<i64> = sqlx::query_scalar("SELECT is_system FROM roles WHERE id = ?")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		match is_system {
			None => Err(DbError::NotFound(format!("role {id}"))),
			Some(flag) if flag != 0 => {
				Err(DbError::Conflict("system roles cannot be deleted".to_string()))
			}
			Some(_) => {
				sqlx::query("DELETE FROM roles WHERE id = ?")
					.bind(id)
					.execute(&self.pool)
					.await?;
				Ok(())
			}
		}
	}

	/// Assign a role to a user. Idempotent.
	#[tracing::instrument(skip(self))]
	pub async fn assign_role(
		&self,
		user_id: &str,
		role_id: &str,
		assigned_by: Option<&str>,
	) -> Result<()> {
		sqlx::query(
			r#"
			INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at, assigned_by)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(user_id)
		.bind(role_id)
		.bind(format_timestamp(Utc::now()))
		.bind(assigned_by)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn unassign_role(&self, user_id: &str, role_id: &str) -> Result<bool> {
		let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
			.bind(user_id)
			.bind(role_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// All roles held by a user, permissions included. The union of the
	/// returned permission sets is the user's effective permissions.
	#[tracing::instrument(skip(self))]
	pub async fn list_roles_by_user(&self, user_id: &str) -> Result<Vec<Role>> {
		let rows = sqlx::query(
			r#"
			SELECT r.id, r.name, r.description, r.is_system, r.created_at, r.updated_at
			FROM roles r
			JOIN user_roles ur ON ur.role_id = r.id
			WHERE ur.user_id = ?
			ORDER BY r.name
			"#,
		)
		.bind(user_id)
		.fetch_all(&self.pool)
		.await?;

		let mut roles = Vec::with_capacity(rows.len());
		for row in &rows {
			roles.push(self.hydrate_role(row).await?);
		}
		Ok(roles)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_users_by_role(&self, role_id: &str) -> Result<Vec<User>> {
		let user_repo = UserRepository::new(self.pool.clone());
		let ids: Vec<String> =
			sqlx::query_scalar("SELECT user_id FROM user_roles WHERE role_id = ?")
				.bind(role_id)
				.fetch_all(&self.pool)
				.await?;

		let mut users = Vec::with_capacity(ids.len());
		for id in &ids {
			if let Some(user) = user_repo.get_user_by_id(id).await? {
				users.push(user);
			}
		}
		Ok(users)
	}

	async fn hydrate_role(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Role> {
		let id: String = row.try_get("id")?;
		let permissions = self.list_permissions(&id).await?;
		Ok(Role {
			id,
			name: row.try_get("name")?,
			description: row.try_get("description")?,
			is_system: row.try_get::<i64, _>("is_system")? != 0,
			permissions,
			created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
			updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
		})
	}

	async fn list_permissions(&self, role_id: &str) -> Result<Vec<Permission>> {
		let rows = sqlx::query(
			r#"
			SELECT id, role_id, cluster_pattern, namespace_pattern, resource_pattern, verbs
			FROM permissions
			WHERE role_id = ?
			"#,
		)
		.bind(role_id)
		.fetch_all(&self.pool)
		.await?;

		rows.iter()
			.map(|row| {
				Ok(Permission {
					id: row.try_get("id")?,
					role_id: row.try_get("role_id")?,
					cluster_pattern: row.try_get("cluster_pattern")?,
					namespace_pattern: row.try_get("namespace_pattern")?,
					resource_pattern: row.try_get("resource_pattern")?,
					verbs: row.try_get("verbs")?,
				})
			})
			.collect()
	}
}
