// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("hashing password: {0}")]
	Hash(String),

	#[error("signing token: {0}")]
	Sign(#[from] jsonwebtoken::errors::Error),

	#[error("invalid or expired token")]
	InvalidToken,
}

pub type Result<T> = std::result::Result<T, AuthError>;
