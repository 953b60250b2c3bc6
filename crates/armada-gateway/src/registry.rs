// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory registry of attached cluster agents.
//!
//! State is rebuilt from scratch on restart; agents re-register on
//! reconnect. Exactly one connected agent per cluster name: a fresh attach
//! for a name displaces the prior entry. Liveness is heartbeat-driven; the
//! supervisor calls [`AgentRegistry::mark_stale`] on a fixed tick.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Connection state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
	Connected,
	Disconnected,
}

impl AgentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			AgentStatus::Connected => "connected",
			AgentStatus::Disconnected => "disconnected",
		}
	}
}

/// A registered agent and its reported cluster metadata.
#[derive(Debug, Clone)]
pub struct AgentInfo {
	pub agent_id: String,
	pub cluster_name: String,
	pub status: AgentStatus,
	pub kubernetes_version: Option<String>,
	pub node_count: Option<i32>,
	pub region: Option<String>,
	pub provider: Option<String>,
	pub attached_at: DateTime<Utc>,
	pub last_heartbeat_at: DateTime<Utc>,
}

/// Registration input: identity plus metadata, before the registry stamps
/// times and status.
#[derive(Debug, Clone)]
pub struct NewAgent {
	pub agent_id: String,
	pub cluster_name: String,
	pub kubernetes_version: Option<String>,
	pub node_count: Option<i32>,
	pub region: Option<String>,
	pub provider: Option<String>,
}

struct Inner {
	agents: HashMap<String, AgentInfo>,
	// Pre-seeded tokens for the dev/reference register path. Production
	// attaches validate against the persisted agent-token table instead.
	valid_tokens: HashSet<String>,
}

/// Concurrency-safe agent map keyed by agent id. Reads return copies,
/// never interior references.
pub struct AgentRegistry {
	liveness_threshold: Duration,
	inner: RwLock<Inner>,
}

/// Default threshold after which a silent agent is considered disconnected.
pub const LIVENESS_THRESHOLD_SECS: i64 = 60;

impl Default for AgentRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl AgentRegistry {
	pub fn new() -> Self {
		Self::with_liveness_threshold(Duration::seconds(LIVENESS_THRESHOLD_SECS))
	}

	pub fn with_liveness_threshold(threshold: Duration) -> Self {
		Self {
			liveness_threshold: threshold,
			inner: RwLock::new(Inner {
				agents: HashMap::new(),
				valid_tokens: HashSet::new(),
			}),
		}
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
		self.inner.read().unwrap_or_else(|e| e.into_inner())
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
		self.inner.write().unwrap_or_else(|e| e.into_inner())
	}

	/// Seed a token that the register path accepts without a store lookup.
	pub fn add_token(&self, token: &str) {
		self.write().valid_tokens.insert(token.to_string());
	}

	/// True when the token was pre-seeded via [`AgentRegistry::add_token`].
	pub fn has_token(&self, token: &str) -> bool {
		self.read().valid_tokens.contains(token)
	}

	/// Insert or overwrite an agent. Forces `connected` and stamps both
	/// attach and heartbeat times. A prior entry for the same cluster name
	/// is displaced.
	pub fn register(&self, new: NewAgent) {
		let now = Utc::now();
		let info = AgentInfo {
			agent_id: new.agent_id.clone(),
			cluster_name: new.cluster_name.clone(),
			status: AgentStatus::Connected,
			kubernetes_version: new.kubernetes_version,
			node_count: new.node_count,
			region: new.region,
			provider: new.provider,
			attached_at: now,
			last_heartbeat_at: now,
		};

		let mut inner = self.write();
		inner
			.agents
			.retain(|_, existing| existing.cluster_name != new.cluster_name);
		inner.agents.insert(new.agent_id, info);
	}

	/// Update an agent's heartbeat. Restores `connected` and returns true;
	/// false for unknown ids (the caller surfaces NOT_FOUND).
	pub fn heartbeat(&self, agent_id: &str) -> bool {
		let mut inner = self.write();
		match inner.agents.get_mut(agent_id) {
			Some(agent) => {
				agent.last_heartbeat_at = Utc::now();
				agent.status = AgentStatus::Connected;
				true
			}
			None => false,
		}
	}

	pub fn get(&self, agent_id: &str) -> Option<AgentInfo> {
		self.read().agents.get(agent_id).cloned()
	}

	pub fn get_by_cluster_name(&self, cluster_name: &str) -> Option<AgentInfo> {
		self.read()
			.agents
			.values()
			.find(|a| a.cluster_name == cluster_name)
			.cloned()
	}

	pub fn contains(&self, agent_id: &str) -> bool {
		self.read().agents.contains_key(agent_id)
	}

	/// Copies of all entries, ordered by cluster name for stable output.
	pub fn list(&self) -> Vec<AgentInfo> {
		let mut agents: Vec<AgentInfo> = self.read().agents.values().cloned().collect();
		agents.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
		agents
	}

	/// Demote agents whose heartbeat is older than the liveness threshold.
	/// Returns the number demoted.
	pub fn mark_stale(&self) -> usize {
		let cutoff = Utc::now() - self.liveness_threshold;
		let mut demoted = 0;

		let mut inner = self.write();
		for agent in inner.agents.values_mut() {
			if agent.status == AgentStatus::Connected && agent.last_heartbeat_at < cutoff {
				agent.status = AgentStatus::Disconnected;
				demoted += 1;
			}
		}
		demoted
	}

	/// Remove an agent entirely.
	pub fn remove(&self, agent_id: &str) -> bool {
		self.write().agents.remove(agent_id).is_some()
	}
}
