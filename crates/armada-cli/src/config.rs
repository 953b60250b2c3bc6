// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! User-scoped CLI configuration.
//!
//! Lives at `<config dir>/armada/config.yaml` and holds the gateway URL,
//! the selected cluster, and the current token pair.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
	pub central_url: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub current_cluster: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
}

impl CliConfig {
	/// Default location in the user's config directory.
	pub fn default_path() -> PathBuf {
		dirs::config_dir()
			.unwrap_or_else(|| PathBuf::from("."))
			.join("armada")
			.join("config.yaml")
	}

	/// Load from a path; a missing file is an empty config.
	pub fn load_from(path: &Path) -> anyhow::Result<Self> {
		match std::fs::read_to_string(path) {
			Ok(data) => Ok(serde_yaml::from_str(&data)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
			Err(e) => Err(anyhow::anyhow!("reading config {}: {e}", path.display())),
		}
	}

	pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, serde_yaml::to_string(self)?)?;
		Ok(())
	}

	pub fn logged_in(&self) -> bool {
		self.token.is_some()
	}

	/// Drop the stored session, keeping URL and cluster selection.
	pub fn clear_session(&mut self) {
		self.token = None;
		self.refresh_token = None;
	}
}
