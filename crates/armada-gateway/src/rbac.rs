// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! RBAC admission for exec requests.
//!
//! A kubectl argv is reduced to a `(cluster, namespace, resource, verb)`
//! tuple and checked against the union of the user's role permissions.
//! Any matching rule grants; a miss is surfaced as FORBIDDEN before the
//! command is enqueued.

use async_trait::async_trait;

use armada_gateway_auth::{is_allowed, PermissionRule};
use armada_gateway_db::{DbError, RoleRepository};

/// The authorization tuple derived from one exec request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScope {
	pub cluster: String,
	pub namespace: String,
	pub resource: String,
	pub verb: String,
}

/// Flags whose value occupies the following argv slot. Anything else that
/// starts with `-` is skipped on its own.
const VALUE_FLAGS: &[&str] = &[
	"-n",
	"--namespace",
	"-o",
	"--output",
	"-f",
	"--filename",
	"-l",
	"--selector",
	"-c",
	"--container",
];

/// Derive the authorization tuple from an argv.
///
/// The verb is the first argument. The resource is the first non-flag
/// argument after it, with any `/name` suffix stripped (`pod/web-1` is a
/// `pod`). An explicit request namespace wins over a `-n` flag in the argv;
/// `-A`/`--all-namespaces` widens the namespace to `*`. Verbs with no
/// resource argument (`version`, `cluster-info`) get resource `*`.
pub fn derive_scope(cluster: &str, command: &[String], request_namespace: Option<&str>) -> CommandScope {
	let verb = command
		.first()
		.map(|v| v.to_lowercase())
		.unwrap_or_else(|| "*".to_string());

	let mut resource: Option<String> = None;
	let mut flag_namespace: Option<String> = None;
	let mut all_namespaces = false;

	let mut args = command.iter().skip(1);
	while let Some(arg) = args.next() {
		if arg == "-A" || arg == "--all-namespaces" {
			all_namespaces = true;
			continue;
		}
		if let Some(rest) = arg.strip_prefix("--namespace=") {
			flag_namespace = Some(rest.to_string());
			continue;
		}
		if arg.starts_with('-') {
			if VALUE_FLAGS.contains(&arg.as_str()) {
				let value = args.next();
				if arg == "-n" || arg == "--namespace" {
					flag_namespace = value.cloned();
				}
			}
			continue;
		}
		if resource.is_none() {
			let type_part = arg.split('/').next().unwrap_or(arg);
			resource = Some(type_part.to_lowercase());
		}
	}

	let namespace = if all_namespaces {
		"*".to_string()
	} else {
		request_namespace
			.map(str::to_string)
			.or(flag_namespace)
			.unwrap_or_else(|| "default".to_string())
	};

	CommandScope {
		cluster: cluster.to_string(),
		namespace,
		resource: resource.unwrap_or_else(|| "*".to_string()),
		verb,
	}
}

/// Where a user's effective permissions come from. Separated so admission
/// can be exercised without a database.
#[async_trait]
pub trait PermissionSource: Send + Sync {
	async fn permissions_for_user(&self, user_id: &str) -> Result<Vec<PermissionRule>, DbError>;
}

#[async_trait]
impl PermissionSource for RoleRepository {
	async fn permissions_for_user(&self, user_id: &str) -> Result<Vec<PermissionRule>, DbError> {
		let roles = self.list_roles_by_user(user_id).await?;
		Ok(roles
			.into_iter()
			.flat_map(|role| role.permissions)
			.map(|perm| PermissionRule {
				cluster_pattern: perm.cluster_pattern,
				namespace_pattern: perm.namespace_pattern,
				resource_pattern: perm.resource_pattern,
				verbs: perm.verbs,
			})
			.collect())
	}
}

/// True when the user's effective permissions grant the scope.
pub async fn authorize(
	source: &(impl PermissionSource + ?Sized),
	user_id: &str,
	scope: &CommandScope,
) -> Result<bool, DbError> {
	let rules = source.permissions_for_user(user_id).await?;
	Ok(is_allowed(
		&rules,
		&scope.cluster,
		&scope.namespace,
		&scope.resource,
		&scope.verb,
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn argv(parts: &[&str]) -> Vec<String> {
		parts.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn derives_verb_and_resource() {
		let scope = derive_scope("edge-1", &argv(&["get", "pods"]), None);
		assert_eq!(scope.cluster, "edge-1");
		assert_eq!(scope.verb, "get");
		assert_eq!(scope.resource, "pods");
		assert_eq!(scope.namespace, "default");
	}

	#[test]
	fn strips_resource_name_suffix() {
		let scope = derive_scope("edge-1", &argv(&["delete", "pod/web-1"]), None);
		assert_eq!(scope.verb, "delete");
		assert_eq!(scope.resource, "pod");
	}

	#[test]
	fn all_namespaces_widens_scope() {
		let scope = derive_scope("edge-1", &argv(&["get", "pods", "-A"]), None);
		assert_eq!(scope.namespace, "*");
	}

	#[test]
	fn namespace_flag_is_honored() {
		let scope = derive_scope("edge-1", &argv(&["get", "pods", "-n", "kube-system"]), None);
		assert_eq!(scope.namespace, "kube-system");
		assert_eq!(scope.resource, "pods");

		let scope = derive_scope(
			"edge-1",
			&argv(&["get", "pods", "--namespace=team-a"]),
			None,
		);
		assert_eq!(scope.namespace, "team-a");
	}

	#[test]
	fn request_namespace_wins_over_flag() {
		let scope = derive_scope(
			"edge-1",
			&argv(&["get", "pods", "-n", "kube-system"]),
			Some("team-b"),
		);
		assert_eq!(scope.namespace, "team-b");
	}

	#[test]
	fn flag_values_are_not_resources() {
		let scope = derive_scope(
			"edge-1",
			&argv(&["get", "-o", "yaml", "deployments"]),
			None,
		);
		assert_eq!(scope.resource, "deployments");
	}

	#[test]
	fn bare_verbs_get_wildcard_resource() {
		let scope = derive_scope("edge-1", &argv(&["version"]), None);
		assert_eq!(scope.verb, "version");
		assert_eq!(scope.resource, "*");
	}

	struct FixedSource(Vec<PermissionRule>);

	#[async_trait]
	impl PermissionSource for FixedSource {
		async fn permissions_for_user(&self, _user_id: &str) -> Result<Vec<PermissionRule>, DbError> {
			Ok(self.0.clone())
		}
	}

	#[tokio::test]
	async fn viewer_cannot_delete() {
		let source = FixedSource(vec![PermissionRule {
			cluster_pattern: "*".to_string(),
			namespace_pattern: "*".to_string(),
			resource_pattern: "*".to_string(),
			verbs: "get,list,describe,logs".to_string(),
		}]);

		let read = derive_scope("edge-1", &argv(&["get", "pods", "-A"]), None);
		assert!(authorize(&source, "u-1", &read).await.unwrap());

		let write = derive_scope("edge-1", &argv(&["delete", "pod", "x"]), None);
		assert!(!authorize(&source, "u-1", &write).await.unwrap());
	}

	#[tokio::test]
	async fn no_rules_means_denied() {
		let source = FixedSource(Vec::new());
		let scope = derive_scope("edge-1", &argv(&["get", "pods"]), None);
		assert!(!authorize(&source, "u-1", &scope).await.unwrap());
	}
}
