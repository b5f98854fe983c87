// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Installation access tokens.

use beetle_common_config::SecretString;
use chrono::{DateTime, Utc};

use crate::error::GithubAppError;

/// A short-lived token scoped to one installation and repository.
///
/// The token value is secret and redacted in `Debug`.
#[derive(Debug, Clone)]
pub struct InstallationToken {
	value: SecretString,
	expires_at: DateTime<Utc>,
}

impl InstallationToken {
	pub fn new(value: impl Into<SecretString>, expires_at: DateTime<Utc>) -> Self {
		Self {
			value: value.into(),
			expires_at,
		}
	}

	pub fn secret(&self) -> &SecretString {
		&self.value
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at
	}

	/// Fail with [`GithubAppError::TokenExpired`] once `now` reaches expiry.
	pub fn ensure_valid(&self, now: DateTime<Utc>) -> Result<(), GithubAppError> {
		if self.is_expired(now) {
			return Err(GithubAppError::TokenExpired {
				expired_at: self.expires_at,
			});
		}
		Ok(())
	}
}

/// Parse GitHub's ISO 8601 `expires_at`.
pub(crate) fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, GithubAppError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| GithubAppError::InvalidResponse(format!("invalid expires_at '{raw}': {e}")))
}
