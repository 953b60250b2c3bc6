// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The agent loop: connect, register, heartbeat, pull, execute, submit.
//!
//! Transport loss at any point falls back to the reconnect path: capped
//! exponential backoff (1s doubling to 30s, at most five attempts per
//! episode) followed by a fresh register, since the gateway forgets
//! registry state on restart.

use std::time::Duration;

use tonic::transport::Channel;
use tracing::{error, info, warn};

use armada_proto::agent_service_client::AgentServiceClient;
use armada_proto::{
	AgentStatus, ClusterMetadata, GetPendingCommandsRequest, HeartbeatRequest, RegisterRequest,
	SubmitCommandResultRequest,
};

use crate::config::AgentConfig;
use crate::executor::KubectlExecutor;

/// How often the agent asks for pending commands.
const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Fallback heartbeat cadence until the gateway dictates one.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const MAX_CONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
	#[error("connecting to gateway: {0}")]
	Connect(#[from] tonic::transport::Error),

	#[error("rpc: {0}")]
	Rpc(#[from] tonic::Status),

	#[error("registration rejected: {0}")]
	Rejected(String),

	#[error("giving up after {0} connection attempts")]
	OutOfAttempts(u32),
}

pub struct Agent {
	config: AgentConfig,
	executor: KubectlExecutor,
}

impl Agent {
	pub fn new(config: AgentConfig) -> Self {
		Self {
			config,
			executor: KubectlExecutor::new(),
		}
	}

	/// Run until the process is signalled. Each iteration of the outer loop
	/// is one connection episode; losing the transport re-enters it.
	pub async fn run(&self) -> Result<(), AgentError> {
		info!(cluster = %self.config.cluster.name, "agent starting");

		loop {
			let (mut client, agent_id) = self.connect_and_register().await?;

			match self.serve(&mut client, &agent_id).await {
				Ok(()) => return Ok(()),
				Err(e) => {
					warn!(error = %e, "connection lost; reconnecting");
				}
			}
		}
	}

	/// Dial and register with capped exponential backoff.
	async fn connect_and_register(
		&self,
	) -> Result<(AgentServiceClient<Channel>, String), AgentError> {
		let endpoint = self.config.endpoint();
		let mut backoff = BACKOFF_START;

		for attempt in 1..=MAX_CONNECT_ATTEMPTS {
			match self.try_connect_and_register(&endpoint).await {
				Ok(ok) => return Ok(ok),
				// A rejected registration (bad token, empty name) will not
				// heal by retrying.
				Err(AgentError::Rejected(message)) => {
					error!(%message, "registration rejected");
					return Err(AgentError::Rejected(message));
				}
				Err(e) => {
					warn!(attempt, error = %e, "connect attempt failed");
					if attempt < MAX_CONNECT_ATTEMPTS {
						tokio::time::sleep(backoff).await;
						backoff = (backoff * 2).min(BACKOFF_CAP);
					}
				}
			}
		}

		Err(AgentError::OutOfAttempts(MAX_CONNECT_ATTEMPTS))
	}

	async fn try_connect_and_register(
		&self,
		endpoint: &str,
	) -> Result<(AgentServiceClient<Channel>, String), AgentError> {
		info!(%endpoint, "connecting to gateway");
		let channel = Channel::from_shared(endpoint.to_string())
			.map_err(|e| AgentError::Rejected(format!("invalid endpoint {endpoint}: {e}")))?
			.connect_timeout(Duration::from_secs(10))
			.connect()
			.await?;
		let mut client = AgentServiceClient::new(channel);

		let response = client
			.register(RegisterRequest {
				cluster_name: self.config.cluster.name.clone(),
				agent_token: self.config.central.token.clone(),
				metadata: Some(ClusterMetadata {
					kubernetes_version: self.config.cluster.kubernetes_version.clone(),
					node_count: self.config.cluster.node_count,
					region: self.config.cluster.region.clone(),
					provider: self.config.cluster.provider.clone(),
				}),
			})
			.await?
			.into_inner();

		if !response.success {
			return Err(AgentError::Rejected(response.error_message));
		}

		info!(agent_id = %response.agent_id, "registered");
		Ok((client, response.agent_id))
	}

	/// Heartbeat and poll until the transport fails or the gateway forgets
	/// us (both surface as an RPC error and trigger re-registration).
	async fn serve(
		&self,
		client: &mut AgentServiceClient<Channel>,
		agent_id: &str,
	) -> Result<(), AgentError> {
		let mut heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL;
		let mut heartbeat = tokio::time::interval(heartbeat_interval);
		heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		let mut poll = tokio::time::interval(POLL_INTERVAL);
		poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = heartbeat.tick() => {
					let response = client
						.heartbeat(HeartbeatRequest {
							agent_id: agent_id.to_string(),
							status: AgentStatus::Healthy as i32,
						})
						.await?
						.into_inner();

					let next = Duration::from_secs(response.next_heartbeat_seconds.max(0) as u64);
					if !next.is_zero() && next != heartbeat_interval {
						heartbeat_interval = next;
						heartbeat = tokio::time::interval(heartbeat_interval);
						heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
					}
				}
				_ = poll.tick() => {
					// NOT_FOUND here means a restarted gateway forgot us;
					// the error path re-registers either way.
					let response = client
						.get_pending_commands(GetPendingCommandsRequest {
							agent_id: agent_id.to_string(),
						})
						.await?
						.into_inner();

					for command in response.commands {
						let client = client.clone();
						let executor = self.executor.clone();
						tokio::spawn(async move {
							handle_command(client, executor, command).await;
						});
					}
				}
			}
		}
	}
}

/// Execute one pulled command and submit its result. Failures to submit are
/// logged; the gateway-side timeout covers the loss.
async fn handle_command(
	mut client: AgentServiceClient<Channel>,
	executor: KubectlExecutor,
	command: armada_proto::CommandRequest,
) {
	info!(request_id = %command.request_id, command = ?command.command, "executing command");

	let timeout = Duration::from_secs(command.timeout_seconds.max(0) as u64);
	let result = executor
		.execute(&command.command, &command.namespace, timeout, &command.stdin)
		.await;

	let submit = SubmitCommandResultRequest {
		request_id: command.request_id.clone(),
		stdout: result.stdout,
		stderr: result.stderr,
		exit_code: result.exit_code,
		error_message: result.error.unwrap_or_default(),
	};

	if let Err(e) = client.submit_command_result(submit).await {
		warn!(request_id = %command.request_id, error = %e, "failed to submit result");
	}
}
