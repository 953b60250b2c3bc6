// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Armada agent binary.

mod config;
mod executor;
mod run;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AgentConfig;
use run::Agent;

const DEFAULT_CONFIG_PATHS: &[&str] = &["configs/agent.yaml", "/etc/armada/agent.yaml"];

/// Armada agent - runs kubectl commands on behalf of the gateway.
#[derive(Parser, Debug)]
#[command(name = "armada-agent", about = "Armada cluster agent", version)]
struct Args {
	/// Path to the YAML config file.
	#[arg(long)]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = load_config(args.config)?;
	config.validate()?;

	let agent = Agent::new(config);

	tokio::select! {
		result = agent.run() => {
			if let Err(e) = &result {
				tracing::error!(error = %e, "agent error");
			}
			result?;
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutdown signal received");
		}
	}

	tracing::info!("agent stopped");
	Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<AgentConfig, config::ConfigError> {
	if let Some(path) = path {
		return AgentConfig::load(path);
	}

	for path in DEFAULT_CONFIG_PATHS {
		if std::path::Path::new(path).exists() {
			return AgentConfig::load(path);
		}
	}

	tracing::warn!("no config file found, using defaults");
	Ok(AgentConfig::from_env())
}
