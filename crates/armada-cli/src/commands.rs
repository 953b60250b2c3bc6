// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! CLI command implementations.

use anyhow::{bail, Context};
use std::path::PathBuf;

use crate::client::{ApiClient, ClientError, ExecOutcome};
use crate::config::CliConfig;

pub struct Session {
	pub config: CliConfig,
	pub config_path: PathBuf,
}

impl Session {
	pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
		let config = CliConfig::load_from(&config_path)?;
		Ok(Self {
			config,
			config_path,
		})
	}

	fn save(&self) -> anyhow::Result<()> {
		self.config.save_to(&self.config_path)
	}

	fn client(&self) -> anyhow::Result<ApiClient> {
		if self.config.central_url.is_empty() {
			bail!("not configured; run `armada login --url <gateway> ...` first");
		}
		Ok(ApiClient::new(&self.config.central_url))
	}

	fn access_token(&self) -> anyhow::Result<&str> {
		self.config
			.token
			.as_deref()
			.context("not logged in; run `armada login` first")
	}
}

pub async fn login(
	mut session: Session,
	url: Option<String>,
	email: String,
	password: String,
) -> anyhow::Result<()> {
	if let Some(url) = url {
		session.config.central_url = url;
	}
	let client = session.client()?;

	let tokens = client
		.login(&email, &password)
		.await
		.context("login failed")?;
	session.config.token = Some(tokens.access_token);
	session.config.refresh_token = Some(tokens.refresh_token);
	session.save()?;

	println!("Logged in to {}", session.config.central_url);
	Ok(())
}

pub async fn logout(mut session: Session) -> anyhow::Result<()> {
	if let (Some(access), Some(refresh)) = (
		session.config.token.clone(),
		session.config.refresh_token.clone(),
	) {
		let client = session.client()?;
		// Best effort: the session is cleared locally regardless.
		if let Err(e) = client.logout(&access, &refresh).await {
			eprintln!("warning: gateway logout failed: {e}");
		}
	}

	session.config.clear_session();
	session.save()?;
	println!("Logged out");
	Ok(())
}

pub async fn status(session: Session) -> anyhow::Result<()> {
	if session.config.central_url.is_empty() {
		println!("Not configured");
		return Ok(());
	}
	println!("Gateway:  {}", session.config.central_url);
	println!(
		"Login:    {}",
		if session.config.logged_in() {
			"active"
		} else {
			"not logged in"
		}
	);
	println!(
		"Cluster:  {}",
		session.config.current_cluster.as_deref().unwrap_or("(none)")
	);
	Ok(())
}

pub async fn clusters(mut session: Session) -> anyhow::Result<()> {
	let client = session.client()?;
	let list = with_refresh(&mut session, |access| {
		let client = &client;
		async move { client.clusters(&access).await }
	})
	.await?;

	if list.is_empty() {
		println!("No clusters attached");
		return Ok(());
	}

	println!("{:<20} {:<14} {:<10} {:<6}", "NAME", "STATUS", "VERSION", "NODES");
	for cluster in list {
		println!(
			"{:<20} {:<14} {:<10} {:<6}",
			cluster.name,
			cluster.status,
			cluster.kubernetes_version.as_deref().unwrap_or("-"),
			cluster
				.node_count
				.map(|n| n.to_string())
				.unwrap_or_else(|| "-".to_string()),
		);
	}
	Ok(())
}

pub async fn use_cluster(mut session: Session, name: String) -> anyhow::Result<()> {
	session.config.current_cluster = Some(name.clone());
	session.save()?;
	println!("Current cluster set to {name}");
	Ok(())
}

/// Kubectl passthrough: send the argv to the selected cluster and mirror
/// the remote exit code.
pub async fn kubectl(mut session: Session, argv: Vec<String>) -> anyhow::Result<i32> {
	if argv.is_empty() {
		bail!("no kubectl arguments given");
	}
	let cluster = session
		.config
		.current_cluster
		.clone()
		.context("no cluster selected; run `armada use <cluster>` first")?;

	let client = session.client()?;
	let outcome: ExecOutcome = with_refresh(&mut session, |access| {
		let client = &client;
		let cluster = cluster.clone();
		let argv = argv.clone();
		async move { client.exec(&access, &cluster, &argv, None, None).await }
	})
	.await?;

	if let Some(error) = &outcome.error {
		eprintln!("error: {error}");
	}
	if !outcome.output.is_empty() {
		println!("{}", outcome.output);
	}
	Ok(outcome.exit_code)
}

/// Run an authenticated call; on 401, rotate the refresh token once and
/// retry with the fresh access token.
async fn with_refresh<T, F, Fut>(session: &mut Session, mut call: F) -> anyhow::Result<T>
where
	F: FnMut(String) -> Fut,
	Fut: std::future::Future<Output = Result<T, ClientError>>,
{
	let access = session.access_token()?.to_string();
	match call(access).await {
		Ok(value) => Ok(value),
		Err(e) if e.is_unauthorized() => {
			let refresh = session
				.config
				.refresh_token
				.clone()
				.context("session expired; run `armada login` again")?;

			let client = session.client()?;
			let tokens = client
				.refresh(&refresh)
				.await
				.context("session expired; run `armada login` again")?;

			session.config.token = Some(tokens.access_token.clone());
			session.config.refresh_token = Some(tokens.refresh_token);
			session.save()?;

			Ok(call(tokens.access_token).await?)
		}
		Err(e) => Err(e.into()),
	}
}
