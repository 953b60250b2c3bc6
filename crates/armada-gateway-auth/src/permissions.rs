// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Permission evaluation.
//!
//! A permission is four patterns: cluster, namespace, resource, and a verb
//! set. Patterns are glob-like; `*` matches any run of characters. A user's
//! effective permission set is the union over their roles, so any single
//! matching rule grants. There is no explicit deny.

/// One grant: three glob patterns plus a comma-separated verb set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRule {
	pub cluster_pattern: String,
	pub namespace_pattern: String,
	pub resource_pattern: String,
	pub verbs: String,
}

impl PermissionRule {
	/// True when this rule grants `verb` on `(cluster, namespace, resource)`.
	pub fn allows(&self, cluster: &str, namespace: &str, resource: &str, verb: &str) -> bool {
		pattern_matches(&self.cluster_pattern, cluster)
			&& pattern_matches(&self.namespace_pattern, namespace)
			&& pattern_matches(&self.resource_pattern, resource)
			&& verb_set_contains(&self.verbs, verb)
	}
}

/// True when any rule in the set grants the tuple.
pub fn is_allowed(
	rules: &[PermissionRule],
	cluster: &str,
	namespace: &str,
	resource: &str,
	verb: &str,
) -> bool {
	rules
		.iter()
		.any(|rule| rule.allows(cluster, namespace, resource, verb))
}

/// Glob match where `*` matches any (possibly empty) run of characters.
pub fn pattern_matches(pattern: &str, value: &str) -> bool {
	fn matches(p: &[char], v: &[char]) -> bool {
		match p.first() {
			None => v.is_empty(),
			Some(&'*') => (0..=v.len()).any(|i| matches(&p[1..], &v[i..])),
			Some(c) => v.first() == Some(c) && matches(&p[1..], &v[1..]),
		}
	}
	let p: Vec<char> = pattern.chars().collect();
	let v: Vec<char> = value.chars().collect();
	matches(&p, &v)
}

fn verb_set_contains(verbs: &str, verb: &str) -> bool {
	verbs
		.split(',')
		.map(str::trim)
		.any(|v| v == "*" || v.eq_ignore_ascii_case(verb))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rule(cluster: &str, namespace: &str, resource: &str, verbs: &str) -> PermissionRule {
		PermissionRule {
			cluster_pattern: cluster.to_string(),
			namespace_pattern: namespace.to_string(),
			resource_pattern: resource.to_string(),
			verbs: verbs.to_string(),
		}
	}

	#[test]
	fn glob_matching_table() {
		let cases = [
			("*", "anything", true),
			("*", "", true),
			("prod-*", "prod-eu-1", true),
			("prod-*", "staging-eu-1", false),
			("*-east", "us-east", true),
			("*-east", "us-west", false),
			("pod", "pod", true),
			("pod", "pods", false),
			("p*d", "pod", true),
			("p*d", "played", true),
			("", "", true),
			("", "x", false),
		];
		for (pattern, value, expected) in cases {
			assert_eq!(
				pattern_matches(pattern, value),
				expected,
				"pattern={pattern:?} value={value:?}"
			);
		}
	}

	#[test]
	fn wildcard_rule_grants_everything() {
		let rules = [rule("*", "*", "*", "*")];
		assert!(is_allowed(&rules, "edge-1", "kube-system", "pods", "delete"));
		assert!(is_allowed(&rules, "any", "ns", "secrets", "get"));
	}

	#[test]
	fn viewer_verbs_grant_reads_only() {
		let rules = [rule("*", "*", "*", "get,list,describe,logs")];
		assert!(is_allowed(&rules, "edge-1", "default", "pods", "get"));
		assert!(is_allowed(&rules, "edge-1", "default", "pods", "list"));
		assert!(!is_allowed(&rules, "edge-1", "default", "pods", "delete"));
		assert!(!is_allowed(&rules, "edge-1", "default", "pods", "apply"));
	}

	#[test]
	fn union_semantics_any_rule_grants() {
		let rules = [
			rule("prod-*", "*", "*", "get,list"),
			rule("staging", "team-a", "deployments", "*"),
		];
		assert!(is_allowed(&rules, "prod-eu", "default", "pods", "get"));
		assert!(is_allowed(&rules, "staging", "team-a", "deployments", "delete"));
		assert!(!is_allowed(&rules, "staging", "team-b", "deployments", "delete"));
		assert!(!is_allowed(&rules, "prod-eu", "default", "pods", "delete"));
	}

	#[test]
	fn verb_set_is_case_insensitive_and_trimmed() {
		let rules = [rule("*", "*", "*", "Get , List")];
		assert!(is_allowed(&rules, "c", "n", "r", "get"));
		assert!(is_allowed(&rules, "c", "n", "r", "list"));
		assert!(!is_allowed(&rules, "c", "n", "r", "watch"));
	}

	#[test]
	fn empty_rule_set_denies() {
		assert!(!is_allowed(&[], "c", "n", "r", "get"));
	}
}
