// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and HTTP router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use armada_gateway_auth::TokenManager;
use armada_gateway_db::Database;

use crate::auth_middleware::{require_admin, require_auth};
use crate::broker::CommandBroker;
use crate::registry::AgentRegistry;
use crate::routes;

/// Default exec timeout when the request omits one.
pub const DEFAULT_EXEC_TIMEOUT_SECS: i32 = 30;
/// Upper bound on a requested exec timeout.
pub const MAX_EXEC_TIMEOUT_SECS: i32 = 300;
/// Grace added on top of the exec timeout before the rendezvous gives up.
pub const EXEC_GRACE_SECS: u64 = 5;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub db: Database,
	pub registry: Arc<AgentRegistry>,
	pub broker: Arc<CommandBroker>,
	pub token_manager: Arc<TokenManager>,
	pub refresh_expiry: Duration,
}

impl AppState {
	pub fn new(
		db: Database,
		registry: Arc<AgentRegistry>,
		broker: Arc<CommandBroker>,
		token_manager: Arc<TokenManager>,
		refresh_expiry: Duration,
	) -> Self {
		Self {
			db,
			registry,
			broker,
			token_manager,
			refresh_expiry,
		}
	}
}

/// Build the full REST router: public endpoints, authenticated user
/// endpoints, and the admin surface.
pub fn create_router(state: AppState) -> Router {
	let public = Router::new()
		.route("/health", get(routes::health::health_check))
		.route("/auth/login", post(routes::auth::login))
		.route("/auth/refresh", post(routes::auth::refresh));

	let authed = Router::new()
		.route("/api/v1/clusters", get(routes::clusters::list_clusters))
		.route(
			"/api/v1/clusters/{name}/exec",
			post(routes::clusters::exec_command),
		)
		.route("/api/v1/auth/logout", post(routes::auth::logout))
		.route(
			"/api/v1/auth/change-password",
			post(routes::auth::change_password),
		)
		.layer(middleware::from_fn_with_state(state.clone(), require_auth));

	let admin = Router::new()
		.route(
			"/api/v1/admin/users",
			get(routes::admin::list_users).post(routes::admin::create_user),
		)
		.route("/api/v1/admin/roles", get(routes::admin::list_roles))
		.route(
			"/api/v1/admin/clusters",
			get(routes::admin::list_clusters).post(routes::admin::create_cluster),
		)
		.route(
			"/api/v1/admin/clusters/{name}/tokens",
			get(routes::admin::list_agent_tokens).post(routes::admin::create_agent_token),
		)
		.route(
			"/api/v1/admin/tokens/{id}",
			delete(routes::admin::revoke_agent_token),
		)
		.route("/api/v1/admin/audit-logs", get(routes::admin::list_audit_logs))
		.layer(middleware::from_fn(require_admin))
		.layer(middleware::from_fn_with_state(state.clone(), require_auth));

	Router::new()
		.merge(public)
		.merge(authed)
		.merge(admin)
		.with_state(state)
}
