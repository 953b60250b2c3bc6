// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("reading config: {0}")]
	Io(#[from] std::io::Error),

	#[error("parsing config: {0}")]
	Parse(#[from] serde_yaml::Error),

	#[error("invalid configuration: {0}")]
	Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
