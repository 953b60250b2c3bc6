// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authentication and authorization primitives for the armada gateway.
//!
//! This crate provides:
//! - Argon2 password hashing ([`hash_password`] / [`verify_password`])
//! - HS256 access tokens ([`TokenManager`], [`UserClaims`])
//! - Opaque refresh/agent tokens stored as SHA-256 hashes ([`generate_token`])
//! - Glob-based permission evaluation ([`PermissionRule`], [`is_allowed`])
//! - Bearer header extraction ([`extract_bearer_token`])

pub mod bearer;
pub mod error;
pub mod hasher;
pub mod permissions;
pub mod refresh;
pub mod token;

pub use bearer::extract_bearer_token;
pub use error::AuthError;
pub use hasher::{hash_password, verify_password};
pub use permissions::{is_allowed, pattern_matches, PermissionRule};
pub use refresh::{generate_token, hash_token, token_prefix, TOKEN_PREFIX_LEN};
pub use token::{TokenManager, UserClaims};
