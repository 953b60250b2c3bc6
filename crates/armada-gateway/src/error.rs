// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Gateway error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use armada_gateway_config::ConfigError;
use armada_gateway_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	Forbidden(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Unavailable(String),

	#[error("{0}")]
	Timeout(String),

	#[error("{0}")]
	Internal(String),
}

/// Wire shape for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
	pub error: String,
}

impl GatewayError {
	fn status(&self) -> StatusCode {
		match self {
			GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
			GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
			GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
			GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
			GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			// Log once at the boundary; the wire gets a generic message.
			tracing::error!(error = %self, "internal error");
			return (
				status,
				Json(ErrorBody {
					error: "internal error".to_string(),
				}),
			)
				.into_response();
		}
		(
			status,
			Json(ErrorBody {
				error: self.to_string(),
			}),
		)
			.into_response()
	}
}

impl From<DbError> for GatewayError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::NotFound(msg) => GatewayError::NotFound(msg),
			DbError::Conflict(msg) => GatewayError::BadRequest(msg),
			other => GatewayError::Internal(format!("store: {other}")),
		}
	}
}

impl From<ConfigError> for GatewayError {
	fn from(err: ConfigError) -> Self {
		GatewayError::Internal(format!("config: {err}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statuses_match_taxonomy() {
		assert_eq!(
			GatewayError::BadRequest("x".into()).status(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			GatewayError::Unauthorized("x".into()).status(),
			StatusCode::UNAUTHORIZED
		);
		assert_eq!(
			GatewayError::Forbidden("x".into()).status(),
			StatusCode::FORBIDDEN
		);
		assert_eq!(
			GatewayError::NotFound("x".into()).status(),
			StatusCode::NOT_FOUND
		);
		assert_eq!(
			GatewayError::Unavailable("x".into()).status(),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(
			GatewayError::Timeout("x".into()).status(),
			StatusCode::GATEWAY_TIMEOUT
		);
		assert_eq!(
			GatewayError::Internal("x".into()).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn db_errors_map_to_taxonomy() {
		assert!(matches!(
			GatewayError::from(DbError::NotFound("user x".into())),
			GatewayError::NotFound(_)
		));
		assert!(matches!(
			GatewayError::from(DbError::Conflict("dup".into())),
			GatewayError::BadRequest(_)
		));
		assert!(matches!(
			GatewayError::from(DbError::Internal("boom".into())),
			GatewayError::Internal(_)
		));
	}
}
