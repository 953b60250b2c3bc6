// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Store facade: one handle owning the pool, handing out repositories.

use sqlx::SqlitePool;

use crate::agent_token::AgentTokenRepository;
use crate::audit::AuditRepository;
use crate::cluster::ClusterRepository;
use crate::error::Result;
use crate::migrations::run_migrations;
use crate::pool::create_pool;
use crate::refresh_token::RefreshTokenRepository;
use crate::role::RoleRepository;
use crate::user::UserRepository;

/// The gateway's persistent store. Repositories are cheap clones over the
/// shared pool.
#[derive(Clone)]
pub struct Database {
	pool: SqlitePool,
}

impl Database {
	/// Open the SQLite store at `path`, creating the file if needed.
	pub async fn open(path: &str) -> Result<Self> {
		let pool = create_pool(path).await?;
		Ok(Self { pool })
	}

	/// Wrap an existing pool (tests use an in-memory one).
	pub fn from_pool(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create schema and seed system roles. Idempotent.
	pub async fn migrate(&self) -> Result<()> {
		run_migrations(&self.pool).await
	}

	pub async fn close(&self) {
		self.pool.close().await;
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn users(&self) -> UserRepository {
		UserRepository::new(self.pool.clone())
	}

	pub fn clusters(&self) -> ClusterRepository {
		ClusterRepository::new(self.pool.clone())
	}

	pub fn agent_tokens(&self) -> AgentTokenRepository {
		AgentTokenRepository::new(self.pool.clone())
	}

	pub fn roles(&self) -> RoleRepository {
		RoleRepository::new(self.pool.clone())
	}

	pub fn refresh_tokens(&self) -> RefreshTokenRepository {
		RefreshTokenRepository::new(self.pool.clone())
	}

	pub fn audit_logs(&self) -> AuditRepository {
		AuditRepository::new(self.pool.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::create_memory_pool;

	#[tokio::test]
	async fn facade_migrates_and_serves_repositories() {
		let db = Database::from_pool(create_memory_pool().await.unwrap());
		db.migrate().await.unwrap();

		let user = db.users().create_user("a@b.c", "h", "A").await.unwrap();
		let viewer = db.roles().get_role_by_name("viewer").await.unwrap().unwrap();
		db.roles().assign_role(&user.id, &viewer.id, None).await.unwrap();

		let roles = db.roles().list_roles_by_user(&user.id).await.unwrap();
		assert_eq!(roles.len(), 1);
	}
}
