// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Thin REST client over the gateway's documented contract.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("{message}")]
	Api { status: StatusCode, message: String },
}

impl ClientError {
	pub fn is_unauthorized(&self) -> bool {
		matches!(
			self,
			ClientError::Api {
				status: StatusCode::UNAUTHORIZED,
				..
			}
		)
	}
}

#[derive(Debug, Deserialize)]
pub struct TokenPair {
	pub access_token: String,
	pub refresh_token: String,
	#[allow(dead_code)]
	pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct ClusterInfo {
	pub name: String,
	pub status: String,
	pub kubernetes_version: Option<String>,
	pub node_count: Option<i32>,
	pub region: Option<String>,
	pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClusterListBody {
	clusters: Vec<ClusterInfo>,
}

#[derive(Debug, Serialize)]
struct ExecBody<'a> {
	command: &'a [String],
	#[serde(skip_serializing_if = "Option::is_none")]
	namespace: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	timeout: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ExecOutcome {
	pub output: String,
	pub exit_code: i32,
	pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	error: String,
}

pub struct ApiClient {
	http: reqwest::Client,
	base_url: String,
}

impl ApiClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			http: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ClientError> {
		let response = self
			.http
			.post(format!("{}/auth/login", self.base_url))
			.json(&serde_json::json!({"email": email, "password": password}))
			.send()
			.await?;
		parse(response).await
	}

	pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
		let response = self
			.http
			.post(format!("{}/auth/refresh", self.base_url))
			.json(&serde_json::json!({"refresh_token": refresh_token}))
			.send()
			.await?;
		parse(response).await
	}

	pub async fn logout(&self, access: &str, refresh_token: &str) -> Result<(), ClientError> {
		let response = self
			.http
			.post(format!("{}/api/v1/auth/logout", self.base_url))
			.bearer_auth(access)
			.json(&serde_json::json!({"refresh_token": refresh_token}))
			.send()
			.await?;
		parse::<serde_json::Value>(response).await.map(|_| ())
	}

	pub async fn clusters(&self, access: &str) -> Result<Vec<ClusterInfo>, ClientError> {
		let response = self
			.http
			.get(format!("{}/api/v1/clusters", self.base_url))
			.bearer_auth(access)
			.send()
			.await?;
		parse::<ClusterListBody>(response).await.map(|b| b.clusters)
	}

	pub async fn exec(
		&self,
		access: &str,
		cluster: &str,
		command: &[String],
		namespace: Option<&str>,
		timeout: Option<i32>,
	) -> Result<ExecOutcome, ClientError> {
		let response = self
			.http
			.post(format!(
				"{}/api/v1/clusters/{cluster}/exec",
				self.base_url
			))
			.bearer_auth(access)
			.json(&ExecBody {
				command,
				namespace,
				timeout,
			})
			.send()
			.await?;
		parse(response).await
	}
}

async fn parse<T: serde::de::DeserializeOwned>(
	response: reqwest::Response,
) -> Result<T, ClientError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response.json().await?);
	}

	let message = match response.json::<ErrorBody>().await {
		Ok(body) => body.error,
		Err(_) => format!("gateway returned {status}"),
	};
	Err(ClientError::Api { status, message })
}
