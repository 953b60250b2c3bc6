// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Persistent store for the armada gateway.
//!
//! A single-file SQLite database (WAL journal, enforced foreign keys) holds
//! users, clusters, agent tokens, roles and permissions, refresh tokens, and
//! the audit trail. Each entity has a store trait ([`UserStore`],
//! [`ClusterStore`], ...) implemented by a `Clone` repository struct over
//! the shared pool; [`Database`] is the facade that owns the pool and runs
//! migrations.
//!
//! All timestamps are stored UTC as `YYYY-MM-DDTHH:MM:SSZ`.

pub mod agent_token;
pub mod audit;
pub mod cluster;
pub mod entities;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod refresh_token;
pub mod role;
pub mod store;
pub mod time;
pub mod user;

pub use agent_token::{AgentTokenRepository, AgentTokenStore};
pub use audit::{AuditRepository, AuditStore, NewAuditLogEntry};
pub use cluster::{ClusterMetadata, ClusterRepository, ClusterStore};
pub use entities::{
	AgentToken, AuditLogEntry, AuditLogFilter, ClusterRecord, Permission, RefreshToken, Role, User,
};
pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{create_memory_pool, create_pool};
pub use refresh_token::{RefreshTokenRepository, RefreshTokenStore};
pub use role::{NewPermission, RoleRepository, RoleStore};
pub use store::Database;
pub use user::{UserRepository, UserStore};
