// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Command broker: the rendezvous between a waiting REST caller and an
//! agent's asynchronous execution.
//!
//! Every enqueued command carries a single-slot channel. The REST handler
//! waits on the receiving half with a deadline; the agent's submit path
//! resolves the sending half. The first terminal transition wins: once an
//! entry is completed, failed, or timed out, later transitions are no-ops.
//!
//! Locking rule: one mutex guards the map, and the terminal signal is sent
//! only after the lock has been released.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::oneshot;

/// Lifecycle of a brokered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
	Pending,
	Running,
	Completed,
	Failed,
	Timeout,
}

impl CommandStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			CommandStatus::Pending => "pending",
			CommandStatus::Running => "running",
			CommandStatus::Completed => "completed",
			CommandStatus::Failed => "failed",
			CommandStatus::Timeout => "timeout",
		}
	}

	fn is_terminal(&self) -> bool {
		matches!(
			self,
			CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Timeout
		)
	}
}

/// The outcome of a command execution, as submitted by an agent.
#[derive(Debug, Clone)]
pub struct CommandResult {
	pub request_id: String,
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	/// `-1` when the agent could not execute the command at all.
	pub exit_code: i32,
	/// Set only when the agent itself failed to run the command; a non-zero
	/// kubectl exit is a normal completion.
	pub error_message: Option<String>,
}

/// What an agent needs to execute a queued command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
	pub request_id: String,
	pub agent_id: String,
	pub command: Vec<String>,
	pub namespace: Option<String>,
	pub timeout_seconds: i32,
	pub stdin: Option<String>,
}

struct Entry {
	spec: CommandSpec,
	status: CommandStatus,
	created_at: Instant,
	result: Option<CommandResult>,
	result_tx: Option<oneshot::Sender<CommandResult>>,
	result_rx: Option<oneshot::Receiver<CommandResult>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BrokerError {
	#[error("command not found: {0}")]
	NotFound(String),

	#[error("command result already claimed: {0}")]
	AlreadyClaimed(String),

	#[error("command execution timed out")]
	DeadlineExceeded,
}

/// The broker. All operations are O(map) under a single mutex; nothing
/// blocks while holding it.
pub struct CommandBroker {
	commands: Mutex<HashMap<String, Entry>>,
}

impl Default for CommandBroker {
	fn default() -> Self {
		Self::new()
	}
}

impl CommandBroker {
	pub fn new() -> Self {
		Self {
			commands: Mutex::new(HashMap::new()),
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
		// A poisoned lock only means a panic elsewhere; the map itself is
		// still coherent.
		self.commands.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Queue a command for an agent. Returns the opaque request id. Never
	/// blocks.
	pub fn enqueue(
		&self,
		agent_id: &str,
		command: Vec<String>,
		namespace: Option<String>,
		timeout_seconds: i32,
		stdin: Option<String>,
	) -> String {
		let request_id = generate_request_id();
		let (tx, rx) = oneshot::channel();

		let entry = Entry {
			spec: CommandSpec {
				request_id: request_id.clone(),
				agent_id: agent_id.to_string(),
				command,
				namespace,
				timeout_seconds,
				stdin,
			},
			status: CommandStatus::Pending,
			created_at: Instant::now(),
			result: None,
			result_tx: Some(tx),
			result_rx: Some(rx),
		};

		self.lock()
			.insert(request_id.clone(), entry);

		request_id
	}

	/// Snapshot of commands still pending for an agent.
	pub fn pending_for(&self, agent_id: &str) -> Vec<CommandSpec> {
		let commands = self.lock();
		commands
			.values()
			.filter(|e| e.spec.agent_id == agent_id && e.status == CommandStatus::Pending)
			.map(|e| e.spec.clone())
			.collect()
	}

	/// Transition `pending -> running`. Idempotent for entries already
	/// running; false for unknown ids.
	pub fn mark_running(&self, request_id: &str) -> bool {
		let mut commands = self.lock();
		match commands.get_mut(request_id) {
			Some(entry) if !entry.status.is_terminal() => {
				entry.status = CommandStatus::Running;
				true
			}
			Some(_) => true,
			None => false,
		}
	}

	/// Record a completed execution and wake the waiter. No-op after a
	/// terminal transition.
	pub fn complete(&self, request_id: &str, result: CommandResult) -> bool {
		self.finish(request_id, CommandStatus::Completed, result)
	}

	/// Record an execution-level failure (`exit_code = -1`) and wake the
	/// waiter. No-op after a terminal transition.
	pub fn fail(&self, request_id: &str, error_message: &str) -> bool {
		let result = CommandResult {
			request_id: request_id.to_string(),
			stdout: Vec::new(),
			stderr: Vec::new(),
			exit_code: -1,
			error_message: Some(error_message.to_string()),
		};
		self.finish(request_id, CommandStatus::Failed, result)
	}

	fn finish(&self, request_id: &str, status: CommandStatus, result: CommandResult) -> bool {
		let tx = {
			let mut commands = self.lock();
			let Some(entry) = commands.get_mut(request_id) else {
				return false;
			};
			if entry.status.is_terminal() {
				return false;
			}
			entry.status = status;
			entry.result = Some(result.clone());
			entry.result_tx.take()
		};

		// Signal outside the lock. The channel has a slot even when the
		// waiter is late, so this never blocks; a dropped receiver is fine.
		if let Some(tx) = tx {
			let _ = tx.send(result);
		}
		true
	}

	/// Block until the result arrives or the deadline fires. On deadline,
	/// a still pending/running entry transitions to `timeout`.
	pub async fn wait(
		&self,
		request_id: &str,
		deadline: Duration,
	) -> Result<CommandResult, BrokerError> {
		let rx = {
			let mut commands = self.lock();
			let entry = commands
				.get_mut(request_id)
				.ok_or_else(|| BrokerError::NotFound(request_id.to_string()))?;
			entry
				.result_rx
				.take()
				.ok_or_else(|| BrokerError::AlreadyClaimed(request_id.to_string()))?
		};

		match tokio::time::timeout(deadline, rx).await {
			Ok(Ok(result)) => Ok(result),
			// Sender dropped without a result: the entry was reaped.
			Ok(Err(_)) => Err(BrokerError::NotFound(request_id.to_string())),
			Err(_) => {
				let mut commands = self.lock();
				if let Some(entry) = commands.get_mut(request_id) {
					if !entry.status.is_terminal() {
						entry.status = CommandStatus::Timeout;
					}
				}
				Err(BrokerError::DeadlineExceeded)
			}
		}
	}

	/// Caller cleanup after the response has been emitted.
	pub fn remove(&self, request_id: &str) {
		self.lock()
			.remove(request_id);
	}

	/// Reap entries older than `max_age` (caller crashed before `remove`).
	/// Returns the number removed.
	pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
		let mut commands = self.lock();
		let before = commands.len();
		commands.retain(|_, entry| entry.created_at.elapsed() < max_age);
		before - commands.len()
	}

	/// Current status of an entry, if it still exists.
	pub fn status_of(&self, request_id: &str) -> Option<CommandStatus> {
		self.lock()
			.get(request_id)
			.map(|e| e.status)
	}

	/// The stored result of a terminal entry, if any. The result is kept on
	/// the entry until `remove` even when no waiter received the signal.
	pub fn result_of(&self, request_id: &str) -> Option<CommandResult> {
		self.lock()
			.get(request_id)
			.and_then(|e| e.result.clone())
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn generate_request_id() -> String {
	let mut bytes = [0u8; 8];
	OsRng.fill_bytes(&mut bytes);
	format!("req-{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ok_result(request_id: &str, stdout: &str) -> CommandResult {
		CommandResult {
			request_id: request_id.to_string(),
			stdout: stdout.as_bytes().to_vec(),
			stderr: Vec::new(),
			exit_code: 0,
			error_message: None,
		}
	}

	#[tokio::test]
	async fn enqueue_then_pending_for() {
		let broker = CommandBroker::new();
		let id = broker.enqueue(
			"agent-1",
			vec!["get".to_string(), "pods".to_string()],
			None,
			30,
			None,
		);

		let pending = broker.pending_for("agent-1");
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].request_id, id);
		assert_eq!(pending[0].command, vec!["get", "pods"]);

		assert!(broker.pending_for("agent-2").is_empty());
	}

	#[tokio::test]
	async fn mark_running_removes_from_pending() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		assert!(broker.mark_running(&id));
		assert!(broker.pending_for("agent-1").is_empty());
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Running));

		// Idempotent on running entries; false for unknown ids.
		assert!(broker.mark_running(&id));
		assert!(!broker.mark_running("req-unknown"));
	}

	#[tokio::test]
	async fn complete_wakes_waiter() {
		let broker = std::sync::Arc::new(CommandBroker::new());
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		let waiter = {
			let broker = broker.clone();
			let id = id.clone();
			tokio::spawn(async move { broker.wait(&id, Duration::from_secs(5)).await })
		};

		broker.mark_running(&id);
		assert!(broker.complete(&id, ok_result(&id, "NAMESPACE ...")));

		let result = waiter.await.unwrap().unwrap();
		assert_eq!(result.exit_code, 0);
		assert_eq!(result.stdout, b"NAMESPACE ...");
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Completed));
	}

	#[tokio::test]
	async fn late_waiter_still_receives() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		// Result arrives before anyone waits; the slot buffers it.
		broker.complete(&id, ok_result(&id, "out"));

		let result = broker.wait(&id, Duration::from_secs(1)).await.unwrap();
		assert_eq!(result.stdout, b"out");
	}

	#[tokio::test]
	async fn fail_reports_minus_one() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		assert!(broker.fail(&id, "kubectl not found"));
		let result = broker.wait(&id, Duration::from_secs(1)).await.unwrap();
		assert_eq!(result.exit_code, -1);
		assert_eq!(result.error_message.as_deref(), Some("kubectl not found"));
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Failed));
	}

	#[tokio::test]
	async fn wait_times_out_and_marks_entry() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 1, None);
		broker.mark_running(&id);

		let err = broker
			.wait(&id, Duration::from_millis(50))
			.await
			.unwrap_err();
		assert_eq!(err, BrokerError::DeadlineExceeded);
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Timeout));
	}

	#[tokio::test]
	async fn first_terminal_transition_wins() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		assert!(broker.complete(&id, ok_result(&id, "first")));
		// A later fail must not alter the delivered result.
		assert!(!broker.fail(&id, "too late"));

		let result = broker.wait(&id, Duration::from_secs(1)).await.unwrap();
		assert_eq!(result.stdout, b"first");
		assert_eq!(result.exit_code, 0);
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Completed));
	}

	#[tokio::test]
	async fn submit_after_timeout_is_a_no_op() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 1, None);

		let _ = broker.wait(&id, Duration::from_millis(10)).await;
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Timeout));

		assert!(!broker.complete(&id, ok_result(&id, "late")));
		assert_eq!(broker.status_of(&id), Some(CommandStatus::Timeout));
	}

	#[tokio::test]
	async fn result_is_retained_without_a_waiter() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		broker.complete(&id, ok_result(&id, "kept"));
		let stored = broker.result_of(&id).unwrap();
		assert_eq!(stored.stdout, b"kept");

		broker.remove(&id);
		assert!(broker.result_of(&id).is_none());
	}

	#[tokio::test]
	async fn wait_on_unknown_id_errors() {
		let broker = CommandBroker::new();
		let err = broker
			.wait("req-missing", Duration::from_millis(10))
			.await
			.unwrap_err();
		assert!(matches!(err, BrokerError::NotFound(_)));
	}

	#[tokio::test]
	async fn remove_then_cleanup() {
		let broker = CommandBroker::new();
		let id = broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);
		assert_eq!(broker.len(), 1);

		broker.remove(&id);
		assert!(broker.is_empty());
		assert_eq!(broker.status_of(&id), None);
	}

	#[tokio::test]
	async fn cleanup_reaps_only_old_entries() {
		let broker = CommandBroker::new();
		broker.enqueue("agent-1", vec!["get".to_string()], None, 30, None);

		// Everything is younger than an hour.
		assert_eq!(broker.cleanup_older_than(Duration::from_secs(3600)), 0);
		// Everything is older than zero.
		assert_eq!(broker.cleanup_older_than(Duration::ZERO), 1);
		assert!(broker.is_empty());
	}

	#[test]
	fn request_ids_are_opaque_and_unique() {
		let a = generate_request_id();
		let b = generate_request_id();
		assert!(a.starts_with("req-"));
		assert_eq!(a.len(), "req-".len() + 16);
		assert_ne!(a, b);
	}
}
