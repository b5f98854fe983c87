// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Error types for the GitHub App client.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while authenticating to or calling GitHub.
#[derive(Debug, Error)]
pub enum GithubAppError {
	/// Network-level error during HTTP communication.
	#[error("Network error: {0}")]
	Network(#[from] reqwest::Error),

	/// Request timed out.
	#[error("Request timed out")]
	Timeout,

	/// 401 from GitHub: the JWT or installation token was rejected.
	#[error("Unauthorized ({status}): {message}")]
	Unauthorized { status: u16, message: String },

	/// 403 from GitHub that is not a rate limit.
	#[error("Forbidden or insufficient permissions: {message}")]
	Forbidden { message: String },

	/// 404 from GitHub.
	#[error("Not found: {message}")]
	NotFound { message: String },

	/// The app has no installation covering the repository.
	#[error("GitHub App not installed for {owner}/{repo}")]
	InstallationNotFound { owner: String, repo: String },

	/// 429, or a 403 with the rate-limit budget exhausted.
	#[error("Rate limit exceeded ({status}): {message}")]
	RateLimited { status: u16, message: String },

	/// Any other non-success status.
	#[error("GitHub API error: {status} - {message}")]
	ApiError { status: u16, message: String },

	/// Invalid or unparseable response.
	#[error("Invalid response from GitHub: {0}")]
	InvalidResponse(String),

	/// Configuration error.
	#[error("Configuration error: {0}")]
	Config(String),

	/// The PEM block is missing or the key bytes cannot be decoded.
	#[error("Invalid private key: {0}")]
	KeyFormat(String),

	/// The key file could not be read.
	#[error("Failed to read private key at {path}: {source}")]
	KeyRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// JWT signing/encoding error.
	#[error("JWT error: {0}")]
	Jwt(String),

	/// The installation token is past its expiry.
	#[error("Installation token expired at {expired_at}")]
	TokenExpired { expired_at: DateTime<Utc> },
}

/// Coarse classification surfaced to the UI when a session fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	KeyFormat,
	Signing,
	Auth,
	NotFound,
	RateLimit,
	Server,
	Network,
	Config,
	Io,
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ErrorKind::KeyFormat => "key_format",
			ErrorKind::Signing => "signing",
			ErrorKind::Auth => "auth",
			ErrorKind::NotFound => "not_found",
			ErrorKind::RateLimit => "rate_limit",
			ErrorKind::Server => "server",
			ErrorKind::Network => "network",
			ErrorKind::Config => "config",
			ErrorKind::Io => "io",
		};
		f.write_str(name)
	}
}

impl GithubAppError {
	/// Create an API error from status code and message.
	pub fn api_error(status: u16, message: impl Into<String>) -> Self {
		Self::ApiError {
			status,
			message: message.into(),
		}
	}

	/// Create an installation not found error.
	pub fn installation_not_found(owner: impl Into<String>, repo: impl Into<String>) -> Self {
		Self::InstallationNotFound {
			owner: owner.into(),
			repo: repo.into(),
		}
	}

	pub fn kind(&self) -> ErrorKind {
		match self {
			GithubAppError::Network(_) | GithubAppError::Timeout => ErrorKind::Network,
			GithubAppError::Unauthorized { .. }
			| GithubAppError::Forbidden { .. }
			| GithubAppError::TokenExpired { .. } => ErrorKind::Auth,
			GithubAppError::NotFound { .. } | GithubAppError::InstallationNotFound { .. } => {
				ErrorKind::NotFound
			}
			GithubAppError::RateLimited { .. } => ErrorKind::RateLimit,
			GithubAppError::ApiError { .. } | GithubAppError::InvalidResponse(_) => ErrorKind::Server,
			GithubAppError::Config(_) => ErrorKind::Config,
			GithubAppError::KeyFormat(_) => ErrorKind::KeyFormat,
			GithubAppError::KeyRead { .. } => ErrorKind::Io,
			GithubAppError::Jwt(_) => ErrorKind::Signing,
		}
	}

	/// HTTP status carried by the error, if GitHub answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			GithubAppError::Unauthorized { status, .. }
			| GithubAppError::RateLimited { status, .. }
			| GithubAppError::ApiError { status, .. } => Some(*status),
			GithubAppError::Forbidden { .. } => Some(403),
			GithubAppError::NotFound { .. } | GithubAppError::InstallationNotFound { .. } => Some(404),
			GithubAppError::Network(e) => e.status().map(|s| s.as_u16()),
			_ => None,
		}
	}
}
