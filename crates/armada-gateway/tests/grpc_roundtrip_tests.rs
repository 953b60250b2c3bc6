// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end exercises of the agent channel against an in-memory store:
//! register, heartbeat, pull, submit, and the rendezvous with a waiting
//! caller.

use std::sync::Arc;
use std::time::Duration;

use tonic::{Code, Request};

use armada_gateway::{AgentRegistry, AgentRpcService, CommandBroker, CommandStatus};
use armada_gateway_auth::hash_token;
use armada_gateway_db::{create_memory_pool, Database};
use armada_proto::agent_service_server::AgentService;
use armada_proto::{
	ClusterMetadata, CommandRequest, GetPendingCommandsRequest, HeartbeatRequest, RegisterRequest,
	SubmitCommandResultRequest,
};

struct Harness {
	registry: Arc<AgentRegistry>,
	broker: Arc<CommandBroker>,
	db: Database,
	service: AgentRpcService,
}

async fn harness() -> Harness {
	let db = Database::from_pool(create_memory_pool().await.unwrap());
	db.migrate().await.unwrap();

	let registry = Arc::new(AgentRegistry::new());
	registry.add_token("dev-token");
	let broker = Arc::new(CommandBroker::new());

	let service = AgentRpcService::new(registry.clone(), broker.clone(), db.clone());
	Harness {
		registry,
		broker,
		db,
		service,
	}
}

fn register_request(cluster: &str, token: &str) -> Request<RegisterRequest> {
	Request::new(RegisterRequest {
		cluster_name: cluster.to_string(),
		agent_token: token.to_string(),
		metadata: Some(ClusterMetadata {
			kubernetes_version: "v1.31.0".to_string(),
			node_count: 3,
			region: "eu-west-1".to_string(),
			provider: "aws".to_string(),
		}),
	})
}

async fn register(h: &Harness, cluster: &str) -> String {
	let response = h
		.service
		.register(register_request(cluster, "dev-token"))
		.await
		.unwrap()
		.into_inner();
	assert!(response.success, "register failed: {}", response.error_message);
	response.agent_id
}

#[tokio::test]
async fn full_roundtrip_register_pull_submit_wait() {
	let h = harness().await;
	let agent_id = register(&h, "edge-1").await;
	assert!(agent_id.starts_with("agent-"));

	// Heartbeat acknowledges and schedules the next one.
	let hb = h
		.service
		.heartbeat(Request::new(HeartbeatRequest {
			agent_id: agent_id.clone(),
			status: 1,
		}))
		.await
		.unwrap()
		.into_inner();
	assert!(hb.acknowledged);
	assert_eq!(hb.next_heartbeat_seconds, 30);

	// Nothing queued yet.
	let empty = h
		.service
		.get_pending_commands(Request::new(GetPendingCommandsRequest {
			agent_id: agent_id.clone(),
		}))
		.await
		.unwrap()
		.into_inner();
	assert!(empty.commands.is_empty());

	// A caller enqueues and parks on the rendezvous.
	let request_id = h.broker.enqueue(
		&agent_id,
		vec!["get".to_string(), "pods".to_string(), "-A".to_string()],
		None,
		30,
		None,
	);
	let waiter = {
		let broker = h.broker.clone();
		let request_id = request_id.clone();
		tokio::spawn(async move { broker.wait(&request_id, Duration::from_secs(5)).await })
	};

	// The agent's next pull sees it exactly once.
	let pull = h
		.service
		.get_pending_commands(Request::new(GetPendingCommandsRequest {
			agent_id: agent_id.clone(),
		}))
		.await
		.unwrap()
		.into_inner();
	assert_eq!(pull.commands.len(), 1);
	assert_eq!(pull.commands[0].request_id, request_id);
	assert_eq!(pull.commands[0].command, vec!["get", "pods", "-A"]);
	assert_eq!(h.broker.status_of(&request_id), Some(CommandStatus::Running));

	let again = h
		.service
		.get_pending_commands(Request::new(GetPendingCommandsRequest {
			agent_id: agent_id.clone(),
		}))
		.await
		.unwrap()
		.into_inner();
	assert!(again.commands.is_empty(), "running entries must not re-deliver");

	// The agent submits; the waiter gets the same result.
	h.service
		.submit_command_result(Request::new(SubmitCommandResultRequest {
			request_id: request_id.clone(),
			stdout: b"NAMESPACE NAME READY".to_vec(),
			stderr: Vec::new(),
			exit_code: 0,
			error_message: String::new(),
		}))
		.await
		.unwrap();

	let result = waiter.await.unwrap().unwrap();
	assert_eq!(result.exit_code, 0);
	assert_eq!(result.stdout, b"NAMESPACE NAME READY");
	assert_eq!(
		h.broker.status_of(&request_id),
		Some(CommandStatus::Completed)
	);
}

#[tokio::test]
async fn register_soft_fails_on_empty_cluster_name() {
	let h = harness().await;
	let response = h
		.service
		.register(register_request("", "dev-token"))
		.await
		.unwrap()
		.into_inner();
	assert!(!response.success);
	assert_eq!(response.error_message, "cluster_name is required");
}

#[tokio::test]
async fn register_soft_fails_on_unknown_token() {
	let h = harness().await;
	let response = h
		.service
		.register(register_request("edge-1", "wrong-token"))
		.await
		.unwrap()
		.into_inner();
	assert!(!response.success);
	assert_eq!(response.error_message, "invalid agent token");
	assert!(h.registry.get_by_cluster_name("edge-1").is_none());
}

#[tokio::test]
async fn register_accepts_persisted_token_and_stamps_it() {
	let h = harness().await;

	let cluster = h.db.clusters().create_cluster("edge-2").await.unwrap();
	let token_plaintext = "persisted-secret";
	h.db
		.agent_tokens()
		.create_agent_token(&cluster.id, &hash_token(token_plaintext), "persiste", None, None)
		.await
		.unwrap();

	let response = h
		.service
		.register(register_request("edge-2", token_plaintext))
		.await
		.unwrap()
		.into_inner();
	assert!(response.success);

	// The token's use is stamped and the cluster row reflects the attach.
	let token = h
		.db
		.agent_tokens()
		.get_agent_token_by_hash(&hash_token(token_plaintext))
		.await
		.unwrap()
		.unwrap();
	assert!(token.last_used_at.is_some());

	let row = h
		.db
		.clusters()
		.get_cluster_by_name("edge-2")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(row.status, "connected");
	assert_eq!(row.agent_id.as_deref(), Some(response.agent_id.as_str()));
}

#[tokio::test]
async fn register_rejects_revoked_persisted_token() {
	let h = harness().await;
	let cluster = h.db.clusters().create_cluster("edge-3").await.unwrap();
	let token = h
		.db
		.agent_tokens()
		.create_agent_token(&cluster.id, &hash_token("revoked-secret"), "revoked-", None, None)
		.await
		.unwrap();
	h.db.agent_tokens().revoke_agent_token(&token.id).await.unwrap();

	let response = h
		.service
		.register(register_request("edge-3", "revoked-secret"))
		.await
		.unwrap()
		.into_inner();
	assert!(!response.success);
}

#[tokio::test]
async fn reattach_displaces_prior_agent() {
	let h = harness().await;
	let first = register(&h, "edge-1").await;
	let second = register(&h, "edge-1").await;
	assert_ne!(first, second);

	// The displaced id no longer heartbeats.
	let err = h
		.service
		.heartbeat(Request::new(HeartbeatRequest {
			agent_id: first,
			status: 1,
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::NotFound);

	let current = h.registry.get_by_cluster_name("edge-1").unwrap();
	assert_eq!(current.agent_id, second);
}

#[tokio::test]
async fn heartbeat_requires_agent_id() {
	let h = harness().await;
	let err = h
		.service
		.heartbeat(Request::new(HeartbeatRequest {
			agent_id: String::new(),
			status: 1,
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn pull_requires_known_agent() {
	let h = harness().await;

	let err = h
		.service
		.get_pending_commands(Request::new(GetPendingCommandsRequest {
			agent_id: String::new(),
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::InvalidArgument);

	let err = h
		.service
		.get_pending_commands(Request::new(GetPendingCommandsRequest {
			agent_id: "agent-ghost".to_string(),
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn submit_requires_request_id() {
	let h = harness().await;
	let err = h
		.service
		.submit_command_result(Request::new(SubmitCommandResultRequest {
			request_id: String::new(),
			stdout: Vec::new(),
			stderr: Vec::new(),
			exit_code: 0,
			error_message: String::new(),
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn submit_with_error_message_fails_the_entry() {
	let h = harness().await;
	let agent_id = register(&h, "edge-1").await;
	let request_id = h
		.broker
		.enqueue(&agent_id, vec!["get".to_string()], None, 30, None);

	h.service
		.submit_command_result(Request::new(SubmitCommandResultRequest {
			request_id: request_id.clone(),
			stdout: Vec::new(),
			stderr: Vec::new(),
			exit_code: -1,
			error_message: "kubectl: executable not found".to_string(),
		}))
		.await
		.unwrap();

	let result = h
		.broker
		.wait(&request_id, Duration::from_secs(1))
		.await
		.unwrap();
	assert_eq!(result.exit_code, -1);
	assert_eq!(
		result.error_message.as_deref(),
		Some("kubectl: executable not found")
	);
	assert_eq!(h.broker.status_of(&request_id), Some(CommandStatus::Failed));
}

#[tokio::test]
async fn execute_command_stream_is_reserved() {
	let h = harness().await;
	let err = h
		.service
		.execute_command(Request::new(CommandRequest {
			request_id: "req-x".to_string(),
			agent_id: "agent-x".to_string(),
			command: vec!["get".to_string()],
			namespace: String::new(),
			timeout_seconds: 30,
			stdin: Vec::new(),
		}))
		.await
		.unwrap_err();
	assert_eq!(err.code(), Code::Unimplemented);
}
