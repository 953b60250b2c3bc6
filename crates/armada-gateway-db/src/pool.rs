// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode, enforced foreign keys, and common
/// settings.
///
/// # Arguments
/// * `path` - SQLite file path (e.g., "armada.db"), or ":memory:" for tests
///
/// # Errors
/// Returns `DbError::Internal` if the path is invalid or connection fails.
#[tracing::instrument(skip(path))]
pub async fn create_pool(path: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
		.map_err(|e| DbError::Internal(format!("invalid database path: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// In-memory pool for tests. Capped at one connection so every query sees
/// the same database.
pub async fn create_memory_pool() -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.map_err(|e| DbError::Internal(format!("invalid database path: {e}")))?
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await?;
	Ok(pool)
}
