// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Process supervisor: listeners, periodic workers, graceful shutdown.
//!
//! Three background workers run until shutdown: the liveness sweeper
//! (15-second tick demoting silent agents), the broker reaper (orphaned
//! rendezvous entries), and store maintenance (audit retention plus
//! expired refresh tokens). Shutdown on SIGINT/SIGTERM drains in-flight
//! RPCs, stops the REST listener, joins the workers, and closes the store.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use armada_gateway_config::GatewayConfig;

use crate::api::{create_router, AppState};
use crate::error::GatewayError;
use crate::grpc::AgentRpcService;

/// How often the liveness sweeper demotes silent agents.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15);
/// How often the broker reaper runs.
const BROKER_REAP_INTERVAL: Duration = Duration::from_secs(60);
/// Entries older than this are presumed orphaned by a crashed caller.
const BROKER_MAX_AGE: Duration = Duration::from_secs(600);
/// Deadline for the REST listener to finish in-flight requests.
const HTTP_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Run the gateway until a shutdown signal arrives.
pub async fn run(config: &GatewayConfig, state: AppState) -> Result<(), GatewayError> {
	let (shutdown_tx, _) = broadcast::channel::<()>(1);

	let workers = spawn_workers(config, &state, &shutdown_tx)?;

	// Agent-facing gRPC listener.
	let grpc_addr: SocketAddr = ([0, 0, 0, 0], config.server.grpc_port).into();
	let grpc_service = AgentRpcService::new(
		state.registry.clone(),
		state.broker.clone(),
		state.db.clone(),
	);
	let mut grpc_shutdown = shutdown_tx.subscribe();
	let mut grpc_task: JoinHandle<Result<(), GatewayError>> = tokio::spawn(async move {
		info!(addr = %grpc_addr, "grpc server listening");
		tonic::transport::Server::builder()
			.add_service(grpc_service.into_server())
			.serve_with_shutdown(grpc_addr, async move {
				let _ = grpc_shutdown.recv().await;
			})
			.await
			.map_err(|e| GatewayError::Internal(format!("grpc server: {e}")))
	});

	// User-facing REST listener.
	let http_addr: SocketAddr = ([0, 0, 0, 0], config.server.http_port).into();
	let listener = tokio::net::TcpListener::bind(http_addr)
		.await
		.map_err(|e| GatewayError::Internal(format!("binding {http_addr}: {e}")))?;
	let router = create_router(state.clone())
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);
	let mut http_shutdown = shutdown_tx.subscribe();
	let mut http_task: JoinHandle<Result<(), GatewayError>> = tokio::spawn(async move {
		info!(addr = %http_addr, "http server listening");
		axum::serve(
			listener,
			router.into_make_service_with_connect_info::<SocketAddr>(),
		)
		.with_graceful_shutdown(async move {
			let _ = http_shutdown.recv().await;
		})
		.await
		.map_err(|e| GatewayError::Internal(format!("http server: {e}")))
	});

	// Park until a signal or a listener failure.
	tokio::select! {
		_ = shutdown_signal() => {
			info!("shutdown signal received");
		}
		result = &mut grpc_task => {
			if let Ok(Err(e)) = &result {
				error!(error = %e, "grpc listener failed");
			}
		}
		result = &mut http_task => {
			if let Ok(Err(e)) = &result {
				error!(error = %e, "http listener failed");
			}
		}
	}

	let _ = shutdown_tx.send(());

	// Drain in order: RPC first (agents re-register on reconnect), then
	// REST within its deadline, then the periodic workers.
	if !grpc_task.is_finished() {
		if let Err(e) = (&mut grpc_task).await {
			warn!(error = %e, "grpc task join error");
		}
	}
	if !http_task.is_finished() {
		match tokio::time::timeout(HTTP_SHUTDOWN_DEADLINE, &mut http_task).await {
			Ok(Err(e)) => warn!(error = %e, "http task join error"),
			Err(_) => warn!("http server did not stop within the shutdown deadline"),
			Ok(Ok(_)) => {}
		}
	}
	for handle in workers {
		let _ = handle.await;
	}

	state.db.close().await;
	info!("gateway shutdown complete");
	Ok(())
}

fn spawn_workers(
	config: &GatewayConfig,
	state: &AppState,
	shutdown_tx: &broadcast::Sender<()>,
) -> Result<Vec<JoinHandle<()>>, GatewayError> {
	let mut handles = Vec::new();

	// Liveness sweeper.
	{
		let registry = state.registry.clone();
		let mut shutdown = shutdown_tx.subscribe();
		handles.push(tokio::spawn(async move {
			let mut tick = tokio::time::interval(SWEEP_INTERVAL);
			tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			loop {
				tokio::select! {
					_ = tick.tick() => {
						let demoted = registry.mark_stale();
						if demoted > 0 {
							info!(demoted, "marked stale agents disconnected");
						}
					}
					_ = shutdown.recv() => break,
				}
			}
		}));
	}

	// Broker reaper.
	{
		let broker = state.broker.clone();
		let mut shutdown = shutdown_tx.subscribe();
		handles.push(tokio::spawn(async move {
			let mut tick = tokio::time::interval(BROKER_REAP_INTERVAL);
			tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			loop {
				tokio::select! {
					_ = tick.tick() => {
						let removed = broker.cleanup_older_than(BROKER_MAX_AGE);
						if removed > 0 {
							warn!(removed, "reaped orphaned broker entries");
						}
					}
					_ = shutdown.recv() => break,
				}
			}
		}));
	}

	// Store maintenance: audit retention and expired refresh tokens.
	{
		let db = state.db.clone();
		let retention_days = config.audit.retention_days as i64;
		let interval = config.audit_cleanup_interval()?;
		let mut shutdown = shutdown_tx.subscribe();
		handles.push(tokio::spawn(async move {
			let mut tick = tokio::time::interval(interval);
			tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
			// The first tick fires immediately; skip it so startup stays quiet.
			tick.tick().await;
			loop {
				tokio::select! {
					_ = tick.tick() => {
						let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
						match db.audit_logs().delete_audit_logs_before(cutoff).await {
							Ok(removed) if removed > 0 => {
								info!(removed, "audit retention cleanup");
							}
							Ok(_) => {}
							Err(e) => warn!(error = %e, "audit retention cleanup failed"),
						}
						if let Err(e) = db
							.refresh_tokens()
							.cleanup_expired_refresh_tokens(chrono::Utc::now())
							.await
						{
							warn!(error = %e, "refresh token cleanup failed");
						}
					}
					_ = shutdown.recv() => break,
				}
			}
		}));
	}

	Ok(handles)
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!(error = %e, "failed to install ctrl-c handler");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				warn!(error = %e, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}
}
