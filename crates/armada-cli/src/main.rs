// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Armada CLI.
//!
//! Any subcommand that is not one of the built-ins is forwarded verbatim as
//! a kubectl argv to the selected cluster:
//!
//! ```text
//! armada get pods -A
//! armada logs deploy/web -n team-a
//! ```

mod client;
mod commands;
mod config;

use clap::{Parser, Subcommand};

use commands::Session;
use config::CliConfig;

/// Armada - kubectl against remote clusters through the gateway.
#[derive(Parser, Debug)]
#[command(name = "armada", about = "Armada CLI", version)]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Authenticate against the gateway.
	Login {
		/// Gateway base URL, e.g. http://gateway.example.com:8080
		#[arg(long)]
		url: Option<String>,
		#[arg(long)]
		email: String,
		#[arg(long)]
		password: String,
	},
	/// Invalidate the current session.
	Logout,
	/// Show gateway, login, and cluster selection state.
	Status,
	/// List clusters attached to the gateway.
	Clusters,
	/// Select the cluster that kubectl passthrough targets.
	Use { cluster: String },
	/// Anything else is passed to kubectl on the selected cluster.
	#[command(external_subcommand)]
	Kubectl(Vec<String>),
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let session = match Session::load(CliConfig::default_path()) {
		Ok(session) => session,
		Err(e) => {
			eprintln!("error: {e:#}");
			std::process::exit(1);
		}
	};

	let result = match cli.command {
		Command::Login {
			url,
			email,
			password,
		} => commands::login(session, url, email, password).await,
		Command::Logout => commands::logout(session).await,
		Command::Status => commands::status(session).await,
		Command::Clusters => commands::clusters(session).await,
		Command::Use { cluster } => commands::use_cluster(session, cluster).await,
		Command::Kubectl(argv) => match commands::kubectl(session, argv).await {
			Ok(exit_code) => std::process::exit(exit_code),
			Err(e) => Err(e),
		},
	};

	if let Err(e) = result {
		eprintln!("error: {e:#}");
		std::process::exit(1);
	}
}
