// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent-facing gRPC service.
//!
//! Agents dial out to this surface: register with a pre-shared token,
//! heartbeat every 30 seconds, pull pending commands, and submit results.
//! Register failures that are the agent's fault (empty cluster name, bad
//! token) are soft: `{success: false, error_message}` rather than an RPC
//! error, so the agent can log and retry without special-casing codes.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{info, instrument, warn};

use armada_gateway_auth::hash_token;
use armada_gateway_db::{ClusterMetadata, Database};
use armada_proto::agent_service_server::{AgentService, AgentServiceServer};
use armada_proto::{
	CommandRequest, CommandResponse, GetPendingCommandsRequest, GetPendingCommandsResponse,
	HeartbeatRequest, HeartbeatResponse, RegisterRequest, RegisterResponse,
	SubmitCommandResultRequest, SubmitCommandResultResponse,
};

use crate::broker::{CommandBroker, CommandResult};
use crate::registry::{AgentRegistry, NewAgent};

/// Interval agents are told to heartbeat at, in seconds.
pub const HEARTBEAT_INTERVAL_SECS: i32 = 30;

/// The gRPC service backing the agent channel.
pub struct AgentRpcService {
	registry: Arc<AgentRegistry>,
	broker: Arc<CommandBroker>,
	db: Database,
}

impl AgentRpcService {
	pub fn new(registry: Arc<AgentRegistry>, broker: Arc<CommandBroker>, db: Database) -> Self {
		Self {
			registry,
			broker,
			db,
		}
	}

	pub fn into_server(self) -> AgentServiceServer<Self> {
		AgentServiceServer::new(self)
	}

	/// A token is acceptable when it was pre-seeded on the registry (dev
	/// path) or matches a usable persisted agent token. A persisted match
	/// has its last-used timestamp stamped.
	async fn validate_token(&self, token: &str) -> Result<bool, Status> {
		if token.is_empty() {
			return Ok(false);
		}
		if self.registry.has_token(token) {
			return Ok(true);
		}

		let hash = hash_token(token);
		let record = self
			.db
			.agent_tokens()
			.get_agent_token_by_hash(&hash)
			.await
			.map_err(|e| Status::internal(format!("token lookup: {e}")))?;

		match record {
			Some(record) if record.is_usable(Utc::now()) => {
				if let Err(e) = self.db.agent_tokens().touch_last_used(&record.id).await {
					warn!(error = %e, token_id = %record.id, "failed to stamp token use");
				}
				Ok(true)
			}
			_ => Ok(false),
		}
	}
}

#[tonic::async_trait]
impl AgentService for AgentRpcService {
	#[instrument(skip_all, fields(cluster = %request.get_ref().cluster_name))]
	async fn register(
		&self,
		request: Request<RegisterRequest>,
	) -> Result<Response<RegisterResponse>, Status> {
		let req = request.into_inner();

		if req.cluster_name.is_empty() {
			return Ok(Response::new(RegisterResponse {
				success: false,
				agent_id: String::new(),
				error_message: "cluster_name is required".to_string(),
			}));
		}

		if !self.validate_token(&req.agent_token).await? {
			warn!(cluster = %req.cluster_name, "register with invalid agent token");
			return Ok(Response::new(RegisterResponse {
				success: false,
				agent_id: String::new(),
				error_message: "invalid agent token".to_string(),
			}));
		}

		let agent_id = generate_agent_id();
		let metadata = req.metadata.unwrap_or_default();

		self.registry.register(NewAgent {
			agent_id: agent_id.clone(),
			cluster_name: req.cluster_name.clone(),
			kubernetes_version: non_empty(metadata.kubernetes_version.clone()),
			node_count: (metadata.node_count > 0).then_some(metadata.node_count),
			region: non_empty(metadata.region.clone()),
			provider: non_empty(metadata.provider.clone()),
		});

		// Keep the persisted directory row in step; the registry stays the
		// live truth.
		let row_metadata = ClusterMetadata {
			kubernetes_version: non_empty(metadata.kubernetes_version),
			node_count: (metadata.node_count > 0).then_some(metadata.node_count),
			region: non_empty(metadata.region),
			provider: non_empty(metadata.provider),
		};
		if let Err(e) = self
			.db
			.clusters()
			.mark_attached(&req.cluster_name, &agent_id, &row_metadata, Utc::now())
			.await
		{
			warn!(error = %e, cluster = %req.cluster_name, "failed to upsert cluster row");
		}

		info!(agent_id = %agent_id, cluster = %req.cluster_name, "agent registered");
		Ok(Response::new(RegisterResponse {
			success: true,
			agent_id,
			error_message: String::new(),
		}))
	}

	#[instrument(skip_all, fields(agent_id = %request.get_ref().agent_id))]
	async fn heartbeat(
		&self,
		request: Request<HeartbeatRequest>,
	) -> Result<Response<HeartbeatResponse>, Status> {
		let req = request.into_inner();

		if req.agent_id.is_empty() {
			return Err(Status::invalid_argument("agent_id is required"));
		}

		if !self.registry.heartbeat(&req.agent_id) {
			return Err(Status::not_found("agent not registered"));
		}

		Ok(Response::new(HeartbeatResponse {
			acknowledged: true,
			next_heartbeat_seconds: HEARTBEAT_INTERVAL_SECS,
		}))
	}

	type ExecuteCommandStream = ReceiverStream<Result<CommandResponse, Status>>;

	/// Reserved for future push delivery.
	async fn execute_command(
		&self,
		_request: Request<CommandRequest>,
	) -> Result<Response<Self::ExecuteCommandStream>, Status> {
		Err(Status::unimplemented(
			"ExecuteCommand not implemented - use GetPendingCommands instead",
		))
	}

	#[instrument(skip_all, fields(agent_id = %request.get_ref().agent_id))]
	async fn get_pending_commands(
		&self,
		request: Request<GetPendingCommandsRequest>,
	) -> Result<Response<GetPendingCommandsResponse>, Status> {
		let req = request.into_inner();

		if req.agent_id.is_empty() {
			return Err(Status::invalid_argument("agent_id is required"));
		}
		if !self.registry.contains(&req.agent_id) {
			return Err(Status::not_found("agent not registered"));
		}

		let pending = self.broker.pending_for(&req.agent_id);
		let mut commands = Vec::with_capacity(pending.len());
		for spec in pending {
			// Mark running so the next pull does not re-deliver.
			self.broker.mark_running(&spec.request_id);
			commands.push(CommandRequest {
				request_id: spec.request_id,
				agent_id: spec.agent_id,
				command: spec.command,
				namespace: spec.namespace.unwrap_or_default(),
				timeout_seconds: spec.timeout_seconds,
				stdin: spec.stdin.map(String::into_bytes).unwrap_or_default(),
			});
		}

		if !commands.is_empty() {
			info!(count = commands.len(), "delivering pending commands");
		}

		Ok(Response::new(GetPendingCommandsResponse { commands }))
	}

	#[instrument(skip_all, fields(request_id = %request.get_ref().request_id))]
	async fn submit_command_result(
		&self,
		request: Request<SubmitCommandResultRequest>,
	) -> Result<Response<SubmitCommandResultResponse>, Status> {
		let req = request.into_inner();

		if req.request_id.is_empty() {
			return Err(Status::invalid_argument("request_id is required"));
		}

		if req.error_message.is_empty() {
			// Completed: success or a non-zero kubectl exit, both normal.
			self.broker.complete(
				&req.request_id,
				CommandResult {
					request_id: req.request_id.clone(),
					stdout: req.stdout,
					stderr: req.stderr,
					exit_code: req.exit_code,
					error_message: None,
				},
			);
		} else {
			// The agent could not execute the command at all.
			self.broker.fail(&req.request_id, &req.error_message);
		}

		Ok(Response::new(SubmitCommandResultResponse { success: true }))
	}
}

fn generate_agent_id() -> String {
	let mut bytes = [0u8; 8];
	OsRng.fill_bytes(&mut bytes);
	format!("agent-{}", hex::encode(bytes))
}

fn non_empty(value: String) -> Option<String> {
	if value.is_empty() {
		None
	} else {
		Some(value)
	}
}
