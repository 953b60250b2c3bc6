// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gateway configuration.
//!
//! Configuration is a YAML file with built-in defaults. Durations are
//! humantime strings (`"24h"`, `"15m"`). `validate()` must pass before the
//! gateway starts: it refuses out-of-range or clashing ports, unknown
//! database drivers, and an empty JWT secret.

pub mod error;

pub use error::ConfigError;

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Fully resolved gateway configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
	pub server: ServerSection,
	pub database: DatabaseSection,
	pub auth: AuthSection,
	pub audit: AuditSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
	pub http_port: u16,
	pub grpc_port: u16,
}

/// Supported persistence backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
	Sqlite,
	Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
	pub driver: DatabaseDriver,
	pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
	pub jwt_secret: String,
	/// Humantime string, e.g. "24h".
	pub access_token_expiry: String,
	/// Humantime string, e.g. "168h".
	pub refresh_token_expiry: String,
	/// Bootstrap admin credentials. When set and no user with this email
	/// exists, the gateway creates it at startup with the admin role.
	pub admin_email: Option<String>,
	pub admin_password: Option<String>,
	pub admin_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditSection {
	pub retention_days: u32,
	/// Humantime string, e.g. "24h".
	pub cleanup_interval: String,
}

impl Default for GatewayConfig {
	fn default() -> Self {
		Self {
			server: ServerSection::default(),
			database: DatabaseSection::default(),
			auth: AuthSection::default(),
			audit: AuditSection::default(),
		}
	}
}

impl Default for ServerSection {
	fn default() -> Self {
		Self {
			http_port: 8080,
			grpc_port: 9090,
		}
	}
}

impl Default for DatabaseSection {
	fn default() -> Self {
		Self {
			driver: DatabaseDriver::Sqlite,
			path: "armada.db".to_string(),
		}
	}
}

impl Default for AuthSection {
	fn default() -> Self {
		Self {
			jwt_secret: String::new(),
			access_token_expiry: "24h".to_string(),
			refresh_token_expiry: "168h".to_string(),
			admin_email: None,
			admin_password: None,
			admin_name: None,
		}
	}
}

impl Default for AuditSection {
	fn default() -> Self {
		Self {
			retention_days: 90,
			cleanup_interval: "24h".to_string(),
		}
	}
}

impl GatewayConfig {
	/// Load configuration from a YAML file, filling unset fields from
	/// defaults. The result is not yet validated.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let data = std::fs::read_to_string(path.as_ref())?;
		let config: GatewayConfig = serde_yaml::from_str(&data)?;
		tracing::debug!(path = %path.as_ref().display(), "configuration loaded");
		Ok(config)
	}

	/// Check the configuration for internal consistency.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.server.http_port == 0 {
			return Err(ConfigError::Invalid(format!(
				"invalid http port: {}",
				self.server.http_port
			)));
		}
		if self.server.grpc_port == 0 {
			return Err(ConfigError::Invalid(format!(
				"invalid grpc port: {}",
				self.server.grpc_port
			)));
		}
		if self.server.http_port == self.server.grpc_port {
			return Err(ConfigError::Invalid(
				"http and grpc ports must be different".to_string(),
			));
		}
		if self.auth.jwt_secret.is_empty() {
			return Err(ConfigError::Invalid(
				"auth.jwt_secret must not be empty".to_string(),
			));
		}
		if self.access_token_expiry()?.is_zero() {
			return Err(ConfigError::Invalid(
				"auth.access_token_expiry must be greater than zero".to_string(),
			));
		}
		if self.refresh_token_expiry()?.is_zero() {
			return Err(ConfigError::Invalid(
				"auth.refresh_token_expiry must be greater than zero".to_string(),
			));
		}
		self.audit_cleanup_interval()?;
		Ok(())
	}

	pub fn access_token_expiry(&self) -> Result<Duration, ConfigError> {
		parse_duration("auth.access_token_expiry", &self.auth.access_token_expiry)
	}

	pub fn refresh_token_expiry(&self) -> Result<Duration, ConfigError> {
		parse_duration("auth.refresh_token_expiry", &self.auth.refresh_token_expiry)
	}

	pub fn audit_cleanup_interval(&self) -> Result<Duration, ConfigError> {
		parse_duration("audit.cleanup_interval", &self.audit.cleanup_interval)
	}
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
	humantime::parse_duration(value)
		.map_err(|e| ConfigError::Invalid(format!("invalid {field} {value:?}: {e}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	fn valid_config() -> GatewayConfig {
		GatewayConfig {
			auth: AuthSection {
				jwt_secret: "test-secret".to_string(),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[test]
	fn defaults_are_sensible() {
		let config = GatewayConfig::default();
		assert_eq!(config.server.http_port, 8080);
		assert_eq!(config.server.grpc_port, 9090);
		assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
		assert_eq!(config.audit.retention_days, 90);
	}

	#[test]
	fn load_merges_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			"server:\n  http_port: 8181\nauth:\n  jwt_secret: s3cret\n"
		)
		.unwrap();

		let config = GatewayConfig::load(file.path()).unwrap();
		assert_eq!(config.server.http_port, 8181);
		// Unset fields fall back to defaults.
		assert_eq!(config.server.grpc_port, 9090);
		assert_eq!(config.auth.jwt_secret, "s3cret");
		assert_eq!(config.auth.access_token_expiry, "24h");
	}

	#[test]
	fn load_rejects_unknown_driver() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "database:\n  driver: oracle\n").unwrap();

		assert!(matches!(
			GatewayConfig::load(file.path()),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn validate_accepts_valid_config() {
		assert!(valid_config().validate().is_ok());
	}

	#[test]
	fn validate_rejects_equal_ports() {
		let mut config = valid_config();
		config.server.grpc_port = config.server.http_port;
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("must be different"));
	}

	#[test]
	fn validate_rejects_zero_port() {
		let mut config = valid_config();
		config.server.http_port = 0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn validate_rejects_empty_jwt_secret() {
		let mut config = valid_config();
		config.auth.jwt_secret = String::new();
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("jwt_secret"));
	}

	#[test]
	fn validate_rejects_bad_duration() {
		let mut config = valid_config();
		config.auth.access_token_expiry = "soon".to_string();
		assert!(config.validate().is_err());
	}

	#[test]
	fn durations_parse_humantime() {
		let config = valid_config();
		assert_eq!(
			config.access_token_expiry().unwrap(),
			Duration::from_secs(24 * 3600)
		);
		assert_eq!(
			config.refresh_token_expiry().unwrap(),
			Duration::from_secs(168 * 3600)
		);
	}
}
