// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Agent configuration: YAML file with `ARMADA_*` environment overrides.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("reading config: {0}")]
	Io(#[from] std::io::Error),

	#[error("parsing config: {0}")]
	Parse(#[from] serde_yaml::Error),

	#[error("invalid configuration: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
	pub central: CentralSection,
	pub cluster: ClusterSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CentralSection {
	/// Gateway gRPC endpoint, e.g. "http://gateway.example.com:9090".
	pub url: String,
	/// Pre-shared agent token authorizing the attach.
	pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
	pub name: String,
	pub kubernetes_version: String,
	pub node_count: i32,
	pub region: String,
	pub provider: String,
}

impl Default for AgentConfig {
	fn default() -> Self {
		Self {
			central: CentralSection::default(),
			cluster: ClusterSection::default(),
		}
	}
}

impl Default for CentralSection {
	fn default() -> Self {
		Self {
			url: "http://localhost:9090".to_string(),
			token: String::new(),
		}
	}
}

impl Default for ClusterSection {
	fn default() -> Self {
		Self {
			name: "default".to_string(),
			kubernetes_version: "unknown".to_string(),
			node_count: 1,
			region: "unknown".to_string(),
			provider: "unknown".to_string(),
		}
	}
}

impl AgentConfig {
	/// Defaults plus environment overrides, without a file.
	pub fn from_env() -> Self {
		let mut config = Self::default();
		config.apply_env_overrides();
		config
	}

	/// Load from a YAML file, then apply environment overrides on top.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data = std::fs::read_to_string(path.as_ref())?;
		let mut config: AgentConfig = serde_yaml::from_str(&data)?;
		config.apply_env_overrides();
		Ok(config)
	}

	fn apply_env_overrides(&mut self) {
		if let Ok(url) = std::env::var("ARMADA_CENTRAL_URL") {
			if !url.is_empty() {
				self.central.url = url;
			}
		}
		if let Ok(token) = std::env::var("ARMADA_AGENT_TOKEN") {
			if !token.is_empty() {
				self.central.token = token;
			}
		}
		// Bare AGENT_TOKEN is honored when nothing more specific is set.
		if self.central.token.is_empty() {
			if let Ok(token) = std::env::var("AGENT_TOKEN") {
				if !token.is_empty() {
					self.central.token = token;
				}
			}
		}
		if let Ok(name) = std::env::var("ARMADA_CLUSTER_NAME") {
			if !name.is_empty() {
				self.cluster.name = name;
			}
		}
		if let Ok(region) = std::env::var("ARMADA_CLUSTER_REGION") {
			if !region.is_empty() {
				self.cluster.region = region;
			}
		}
		if let Ok(provider) = std::env::var("ARMADA_CLUSTER_PROVIDER") {
			if !provider.is_empty() {
				self.cluster.provider = provider;
			}
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.central.url.is_empty() {
			return Err(ConfigError::Invalid("central.url is required".to_string()));
		}
		if self.central.token.is_empty() {
			return Err(ConfigError::Invalid(
				"central.token is required (set via config or ARMADA_AGENT_TOKEN)".to_string(),
			));
		}
		if self.cluster.name.is_empty() {
			return Err(ConfigError::Invalid("cluster.name is required".to_string()));
		}
		Ok(())
	}

	/// The endpoint with a scheme, as tonic requires one.
	pub fn endpoint(&self) -> String {
		if self.central.url.contains("://") {
			self.central.url.clone()
		} else {
			format!("http://{}", self.central.url)
		}
	}
}
