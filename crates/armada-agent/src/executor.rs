// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Local kubectl execution.
//!
//! Each pulled command becomes one kubectl subprocess. The namespace is
//! passed as `-n` ahead of the argv, stdin is piped when present, and the
//! timeout kills the child. A spawn failure is an execution-level error
//! (`exit_code = -1` plus a message); a non-zero kubectl exit is a normal
//! completion.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of one subprocess run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	pub exit_code: i32,
	/// Set only when the command could not be executed (spawn failure,
	/// timeout); then `exit_code` is `-1`.
	pub error: Option<String>,
}

impl ExecutionResult {
	fn failure(message: String) -> Self {
		Self {
			stdout: Vec::new(),
			stderr: Vec::new(),
			exit_code: -1,
			error: Some(message),
		}
	}
}

#[derive(Debug, Clone)]
pub struct KubectlExecutor {
	kubectl_path: String,
}

impl Default for KubectlExecutor {
	fn default() -> Self {
		Self::new()
	}
}

impl KubectlExecutor {
	pub fn new() -> Self {
		Self {
			kubectl_path: "kubectl".to_string(),
		}
	}

	/// Override the binary (tests run plain shell tools through this).
	pub fn with_path(path: impl Into<String>) -> Self {
		Self {
			kubectl_path: path.into(),
		}
	}

	/// Run the command. `timeout` of zero means no limit.
	pub async fn execute(
		&self,
		args: &[String],
		namespace: &str,
		timeout: Duration,
		stdin: &[u8],
	) -> ExecutionResult {
		let full_args = build_args(args, namespace);
		debug!(path = %self.kubectl_path, args = ?full_args, "executing");

		let mut command = Command::new(&self.kubectl_path);
		command
			.args(&full_args)
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.stdin(if stdin.is_empty() {
				Stdio::null()
			} else {
				Stdio::piped()
			})
			.kill_on_drop(true);

		let mut child = match command.spawn() {
			Ok(child) => child,
			Err(e) => {
				return ExecutionResult::failure(format!(
					"failed to execute {}: {e}",
					self.kubectl_path
				));
			}
		};

		if !stdin.is_empty() {
			if let Some(mut handle) = child.stdin.take() {
				if let Err(e) = handle.write_all(stdin).await {
					warn!(error = %e, "failed to write stdin");
				}
				// Dropping the handle closes the pipe.
			}
		}

		let wait = child.wait_with_output();
		let output = if timeout.is_zero() {
			wait.await
		} else {
			match tokio::time::timeout(timeout, wait).await {
				Ok(result) => result,
				// The dropped future kills the child via kill_on_drop.
				Err(_) => {
					return ExecutionResult::failure(format!(
						"command timed out after {}s",
						timeout.as_secs()
					));
				}
			}
		};

		match output {
			Ok(output) => ExecutionResult {
				stdout: output.stdout,
				stderr: output.stderr,
				exit_code: output.status.code().unwrap_or(-1),
				error: None,
			},
			Err(e) => ExecutionResult::failure(format!("waiting for command: {e}")),
		}
	}
}

/// Assemble the final argv: namespace flag first, then the command.
fn build_args(args: &[String], namespace: &str) -> Vec<String> {
	let mut full = Vec::with_capacity(args.len() + 2);
	if !namespace.is_empty() {
		full.push("-n".to_string());
		full.push(namespace.to_string());
	}
	full.extend(args.iter().cloned());
	full
}

#[cfg(test)]
mod tests {
	use super::*;

	fn argv(parts: &[&str]) -> Vec<String> {
		parts.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn namespace_is_prefixed() {
		assert_eq!(
			build_args(&argv(&["get", "pods"]), "kube-system"),
			argv(&["-n", "kube-system", "get", "pods"])
		);
		assert_eq!(build_args(&argv(&["get", "pods"]), ""), argv(&["get", "pods"]));
	}

	#[tokio::test]
	async fn captures_stdout_and_exit_code() {
		let executor = KubectlExecutor::with_path("echo");
		let result = executor
			.execute(&argv(&["hello"]), "", Duration::from_secs(5), b"")
			.await;
		assert_eq!(result.exit_code, 0);
		assert_eq!(result.stdout, b"hello\n");
		assert!(result.error.is_none());
	}

	#[tokio::test]
	async fn nonzero_exit_is_not_an_error() {
		let executor = KubectlExecutor::with_path("false");
		let result = executor.execute(&[], "", Duration::from_secs(5), b"").await;
		assert_eq!(result.exit_code, 1);
		assert!(result.error.is_none());
	}

	#[tokio::test]
	async fn stdin_is_piped_through() {
		let executor = KubectlExecutor::with_path("cat");
		let result = executor
			.execute(&[], "", Duration::from_secs(5), b"apiVersion: v1\n")
			.await;
		assert_eq!(result.exit_code, 0);
		assert_eq!(result.stdout, b"apiVersion: v1\n");
	}

	#[tokio::test]
	async fn spawn_failure_reports_minus_one() {
		let executor = KubectlExecutor::with_path("/nonexistent/kubectl");
		let result = executor
			.execute(&argv(&["get", "pods"]), "", Duration::from_secs(5), b"")
			.await;
		assert_eq!(result.exit_code, -1);
		assert!(result.error.unwrap().contains("failed to execute"));
	}

	#[tokio::test]
	async fn timeout_kills_the_child() {
		let executor = KubectlExecutor::with_path("sleep");
		let result = executor
			.execute(&argv(&["5"]), "", Duration::from_millis(100), b"")
			.await;
		assert_eq!(result.exit_code, -1);
		assert!(result.error.unwrap().contains("timed out"));
	}
}
