// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client IP extraction for audit records.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Best-effort client IP, as an extractor. Prefers the first
/// `X-Forwarded-For` hop (the gateway is expected to sit behind a trusted
/// proxy), then the peer address; never rejects.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
	S: Send + Sync,
{
	type Rejection = Infallible;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>();
		Ok(ClientIp(client_ip(&parts.headers, peer)))
	}
}

/// The raw lookup behind the extractor.
pub fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
	if let Some(forwarded) = headers.get("x-forwarded-for") {
		if let Ok(value) = forwarded.to_str() {
			if let Some(first) = value.split(',').next() {
				let first = first.trim();
				if !first.is_empty() {
					return Some(first.to_string());
				}
			}
		}
	}
	peer.map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	#[test]
	fn prefers_forwarded_for() {
		let mut headers = HeaderMap::new();
		headers.insert(
			"x-forwarded-for",
			HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
		);
		let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9999)));
		assert_eq!(
			client_ip(&headers, Some(&peer)),
			Some("203.0.113.9".to_string())
		);
	}

	#[test]
	fn falls_back_to_peer() {
		let peer = ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 1234)));
		assert_eq!(
			client_ip(&HeaderMap::new(), Some(&peer)),
			Some("192.168.1.7".to_string())
		);
	}

	#[test]
	fn none_when_nothing_known() {
		assert_eq!(client_ip(&HeaderMap::new(), None), None);
	}
}
