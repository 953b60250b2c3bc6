// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Argon2 password hashing.
//!
//! Production builds use Argon2id with the library defaults (~19 MiB,
//! 2 iterations). Tests get deliberately weak parameters so the suite stays
//! fast; those parameters MUST NOT be used outside `#[cfg(test)]`.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{AuthError, Result};

#[inline]
fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		use argon2::{Algorithm, Params, Version};
		let params = Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
		Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = argon2_instance()
		.hash_password(password.as_bytes(), &salt)
		.map_err(|e| AuthError::Hash(e.to_string()))?;
	Ok(hash.to_string())
}

/// Verify a password against a stored hash. Returns false for both a wrong
/// password and an unparseable hash; the verifier performs the full KDF in
/// either branch of a well-formed hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
	let Ok(parsed) = PasswordHash::new(hash) else {
		return false;
	};
	argon2_instance()
		.verify_password(password.as_bytes(), &parsed)
		.is_ok()
}
