// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! JWT generation for GitHub App authentication.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GithubAppError;
use crate::key::SigningKey;

/// Smallest RSA modulus accepted for RS256.
const MIN_RS256_MODULUS_BITS: usize = 2048;

/// Issued-at backdating and lifetime of an app JWT.
///
/// GitHub refuses assertions living longer than ten minutes and compares `iat`
/// against its own clock, hence the backdated `iat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwtSettings {
	pub skew: Duration,
	pub window: Duration,
}

impl Default for JwtSettings {
	fn default() -> Self {
		Self {
			skew: Duration::seconds(60),
			window: Duration::seconds(600),
		}
	}
}

/// JWT claims for GitHub App authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppJwtClaims {
	/// Issued at (seconds since epoch).
	pub iat: i64,
	/// Expiration (seconds since epoch).
	pub exp: i64,
	/// GitHub App ID.
	pub iss: String,
}

/// A signed app assertion, used as bearer credential for app-level calls.
#[derive(Clone)]
pub struct AppJwt {
	token: String,
	issued_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AppJwt {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppJwt")
			.field("token", &beetle_common_config::REDACTED)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

impl AppJwt {
	/// Compact serialized token.
	pub fn as_str(&self) -> &str {
		&self.token
	}

	pub fn issued_at(&self) -> DateTime<Utc> {
		self.issued_at
	}

	pub fn expires_at(&self) -> DateTime<Utc> {
		self.expires_at
	}
}

/// Sign an app JWT for `app_id` at the given clock value.
///
/// The payload is `{iss: app_id, iat: now - skew, exp: iat + window}`. RS256
/// signatures are deterministic, so identical inputs give identical tokens.
#[instrument(skip(key, settings), fields(modulus_bits = key.modulus_bits()))]
pub fn sign_app_jwt(
	key: &SigningKey,
	app_id: u64,
	now: DateTime<Utc>,
	settings: &JwtSettings,
) -> Result<AppJwt, GithubAppError> {
	if key.modulus_bits() < MIN_RS256_MODULUS_BITS {
		return Err(GithubAppError::Jwt(format!(
			"RS256 requires an RSA key of at least {MIN_RS256_MODULUS_BITS} bits, got {}",
			key.modulus_bits()
		)));
	}
	if settings.window <= settings.skew {
		return Err(GithubAppError::Jwt(
			"JWT window must be longer than the clock skew allowance".to_string(),
		));
	}

	let issued_at = now - settings.skew;
	let expires_at = issued_at + settings.window;

	let claims = AppJwtClaims {
		iat: issued_at.timestamp(),
		exp: expires_at.timestamp(),
		iss: app_id.to_string(),
	};

	let header = Header::new(Algorithm::RS256);
	let token = encode(&header, &claims, key.encoding_key())
		.map_err(|e| GithubAppError::Jwt(format!("Failed to encode JWT: {e}")))?;

	debug!(app_id, exp = claims.exp, "Generated GitHub App JWT");

	Ok(AppJwt {
		token,
		issued_at: seconds_to_datetime(claims.iat)?,
		expires_at: seconds_to_datetime(claims.exp)?,
	})
}

/// Verify a token signed by `key` and return its claims.
///
/// Expiry is not enforced here; callers compare `exp` against their own clock.
pub fn verify_app_jwt(token: &str, key: &SigningKey) -> Result<AppJwtClaims, GithubAppError> {
	let mut validation = Validation::new(Algorithm::RS256);
	validation.validate_exp = false;
	validation.required_spec_claims.clear();

	decode::<AppJwtClaims>(token, &key.verifying_key(), &validation)
		.map(|data| data.claims)
		.map_err(|e| GithubAppError::Jwt(format!("Failed to verify JWT: {e}")))
}

fn seconds_to_datetime(secs: i64) -> Result<DateTime<Utc>, GithubAppError> {
	Utc.timestamp_opt(secs, 0)
		.single()
		.ok_or_else(|| GithubAppError::Jwt(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::key::test_keys;

	fn key() -> SigningKey {
		SigningKey::from_pem(&test_keys::pkcs8_pem()).unwrap()
	}

	fn fixed_now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
	}

	#[test]
	fn test_jwt_claims_are_valid() {
		let key = key();
		let now = fixed_now();
		let settings = JwtSettings::default();

		let jwt = sign_app_jwt(&key, 12345, now, &settings).unwrap();
		let claims = verify_app_jwt(jwt.as_str(), &key).unwrap();

		assert_eq!(claims.iss, "12345");
		assert!(claims.iat < now.timestamp(), "iat must precede now");
		assert!(now.timestamp() < claims.exp, "exp must follow now");
		assert_eq!(claims.exp - claims.iat, settings.window.num_seconds());
		assert!(
			claims.exp - claims.iat <= 10 * 60,
			"JWT lifetime exceeds GitHub maximum of 10 minutes"
		);
		assert_eq!(jwt.issued_at().timestamp(), claims.iat);
		assert_eq!(jwt.expires_at().timestamp(), claims.exp);
	}

	#[test]
	fn test_signing_is_deterministic_for_fixed_clock() {
		let key = key();
		let a = sign_app_jwt(&key, 42, fixed_now(), &JwtSettings::default()).unwrap();
		let b = sign_app_jwt(&key, 42, fixed_now(), &JwtSettings::default()).unwrap();
		assert_eq!(a.as_str(), b.as_str());
	}

	#[test]
	fn test_header_uses_rs256() {
		let jwt = sign_app_jwt(&key(), 42, fixed_now(), &JwtSettings::default()).unwrap();
		let header = jsonwebtoken::decode_header(jwt.as_str()).unwrap();
		assert_eq!(header.alg, Algorithm::RS256);
	}

	#[test]
	fn test_custom_settings() {
		let settings = JwtSettings {
			skew: Duration::seconds(30),
			window: Duration::seconds(300),
		};
		let key = key();
		let jwt = sign_app_jwt(&key, 7, fixed_now(), &settings).unwrap();
		let claims = verify_app_jwt(jwt.as_str(), &key).unwrap();

		assert_eq!(claims.iat, fixed_now().timestamp() - 30);
		assert_eq!(claims.exp, claims.iat + 300);
	}

	#[test]
	fn test_window_shorter_than_skew_is_rejected() {
		let settings = JwtSettings {
			skew: Duration::seconds(60),
			window: Duration::seconds(30),
		};
		let err = sign_app_jwt(&key(), 7, fixed_now(), &settings).unwrap_err();
		assert!(matches!(err, GithubAppError::Jwt(_)));
	}

	#[test]
	fn test_weak_key_is_signing_error() {
		let weak = SigningKey::from_pem(&test_keys::weak_pkcs8_pem()).unwrap();
		let err = sign_app_jwt(&weak, 7, fixed_now(), &JwtSettings::default()).unwrap_err();
		assert_eq!(err.kind(), crate::ErrorKind::Signing);
	}

	#[test]
	fn test_debug_redacts_token() {
		let jwt = sign_app_jwt(&key(), 7, fixed_now(), &JwtSettings::default()).unwrap();
		let rendered = format!("{jwt:?}");
		assert!(!rendered.contains(jwt.as_str()));
		assert!(rendered.contains("[REDACTED]"));
	}

	#[test]
	fn test_verify_rejects_foreign_token() {
		let err = verify_app_jwt("a.b.c", &key()).unwrap_err();
		assert!(matches!(err, GithubAppError::Jwt(_)));
	}
}
