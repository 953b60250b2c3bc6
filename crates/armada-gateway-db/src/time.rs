// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Canonical timestamp format for persisted rows.
//!
//! All times are stored UTC as `YYYY-MM-DDTHH:MM:SSZ`, matching the schema's
//! `strftime` defaults so rows written by SQL and by Rust compare equal.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::DbError;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a timestamp for storage.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
	ts.format(FORMAT).to_string()
}

/// Parse a stored timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DbError> {
	NaiveDateTime::parse_from_str(s, FORMAT)
		.map(|naive| naive.and_utc())
		.map_err(|e| DbError::Internal(format!("invalid timestamp {s:?}: {e}")))
}

/// Parse an optional stored timestamp.
pub fn parse_opt_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
	s.map(|v| parse_timestamp(&v)).transpose()
}
