// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Armada gateway binary.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use armada_gateway::{server, AgentRegistry, AppState, CommandBroker};
use armada_gateway_auth::{hash_password, TokenManager};
use armada_gateway_config::{DatabaseDriver, GatewayConfig};
use armada_gateway_db::{migrations, Database};

/// Armada gateway - central control plane for kubectl command brokering.
#[derive(Parser, Debug)]
#[command(name = "armada-gateway", about = "Armada control plane", version)]
struct Args {
	/// Path to the YAML config file (falls back to $ARMADA_CONFIG).
	#[arg(long)]
	config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = load_config(args.config)?;
	config.validate()?;

	tracing::info!(
		http_port = config.server.http_port,
		grpc_port = config.server.grpc_port,
		database = %config.database.path,
		"starting armada-gateway"
	);

	let db = match config.database.driver {
		DatabaseDriver::Sqlite => Database::open(&config.database.path).await?,
		DatabaseDriver::Postgres => {
			return Err("postgres driver is accepted by the config surface but this build wires sqlite only".into());
		}
	};
	db.migrate().await?;

	seed_admin_user(&db, &config).await?;

	let registry = Arc::new(AgentRegistry::new());
	if let Ok(dev_token) = std::env::var("ARMADA_DEV_AGENT_TOKEN") {
		if !dev_token.is_empty() {
			tracing::warn!("dev agent token enabled via ARMADA_DEV_AGENT_TOKEN");
			registry.add_token(&dev_token);
		}
	}

	let broker = Arc::new(CommandBroker::new());
	let token_manager = Arc::new(TokenManager::new(
		&config.auth.jwt_secret,
		config.access_token_expiry()?,
	));

	let state = AppState::new(
		db,
		registry,
		broker,
		token_manager,
		config.refresh_token_expiry()?,
	);

	server::run(&config, state).await?;
	Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
	let path = path.or_else(|| std::env::var("ARMADA_CONFIG").ok().map(PathBuf::from));
	match path {
		Some(path) => Ok(GatewayConfig::load(&path)?),
		None => {
			tracing::warn!("no config file specified, using defaults");
			Ok(GatewayConfig::default())
		}
	}
}

/// Create the bootstrap admin user when configured and absent, and make
/// sure it holds the admin role.
async fn seed_admin_user(
	db: &Database,
	config: &GatewayConfig,
) -> Result<(), Box<dyn std::error::Error>> {
	let (Some(email), Some(password)) = (
		config.auth.admin_email.as_deref(),
		config.auth.admin_password.as_deref(),
	) else {
		return Ok(());
	};

	if db.users().get_user_by_email(email).await?.is_some() {
		return Ok(());
	}

	let name = config.auth.admin_name.as_deref().unwrap_or("Administrator");
	let password_hash = hash_password(password)?;
	let user = db.users().create_user(email, &password_hash, name).await?;
	db.roles()
		.assign_role(&user.id, migrations::ADMIN_ROLE_ID, None)
		.await?;

	tracing::info!(email = %email, "bootstrap admin user created");
	Ok(())
}
