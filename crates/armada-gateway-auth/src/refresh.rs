// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Opaque refresh and agent tokens.
//!
//! Both are 32 cryptographically random bytes, handed out hex-encoded.
//! Only the SHA-256 hash is ever persisted; lookups hash the presented
//! value and compare.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of leading characters kept as a displayable, non-secret prefix.
pub const TOKEN_PREFIX_LEN: usize = 8;

/// Generate an opaque token, returning `(plaintext, sha256_hex)`.
pub fn generate_token() -> (String, String) {
	let mut bytes = [0u8; 32];
	OsRng.fill_bytes(&mut bytes);
	let plaintext = hex::encode(bytes);
	let hash = hash_token(&plaintext);
	(plaintext, hash)
}

/// SHA-256 of a presented token, hex-encoded.
pub fn hash_token(token: &str) -> String {
	hex::encode(Sha256::digest(token.as_bytes()))
}

/// The displayable prefix of a token plaintext.
pub fn token_prefix(plaintext: &str) -> String {
	plaintext.chars().take(TOKEN_PREFIX_LEN).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokens_are_64_hex_chars() {
		let (plaintext, hash) = generate_token();
		assert_eq!(plaintext.len(), 64);
		assert_eq!(hash.len(), 64);
		assert!(plaintext.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn tokens_are_unique() {
		let (a, _) = generate_token();
		let (b, _) = generate_token();
		assert_ne!(a, b);
	}

	#[test]
	fn hash_is_deterministic() {
		let (plaintext, hash) = generate_token();
		assert_eq!(hash_token(&plaintext), hash);
		assert_ne!(hash_token("something else"), hash);
	}

	#[test]
	fn prefix_is_short_and_stable() {
		let (plaintext, _) = generate_token();
		let prefix = token_prefix(&plaintext);
		assert_eq!(prefix.len(), TOKEN_PREFIX_LEN);
		assert!(plaintext.starts_with(&prefix));
	}
}
