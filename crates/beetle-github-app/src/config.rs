// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration for the GitHub App client.

use std::path::PathBuf;
use std::time::Duration;

use beetle_common_config::{load_secret_env, parse_env};
use reqwest::Url;
use tracing::warn;

use crate::error::GithubAppError;
use crate::jwt::JwtSettings;
use crate::key::{KeySource, DEFAULT_KEY_ASSET};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const DEFAULT_UPLOAD_DIR: &str = ".beetle/screenshots";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the GitHub App client.
///
/// The private key is held as a [`KeySource`]; inline PEM text is a
/// [`beetle_common_config::SecretString`] and never shows up in `Debug`.
#[derive(Debug, Clone)]
pub struct GithubAppConfig {
	/// GitHub App numeric ID
	app_id: u64,

	/// Where the PEM private key is read from
	key_source: KeySource,

	/// Base URL for GitHub API (validated, always ends with '/')
	base_url: Url,

	/// Repository directory screenshots are committed under
	upload_dir: String,

	/// Per-request timeout
	request_timeout: Duration,

	/// Skew and lifetime of app JWTs
	jwt: JwtSettings,
}

impl GithubAppConfig {
	/// Validate and normalize a base URL.
	///
	/// Requirements:
	/// - Must be a valid URL with a host
	/// - Must use HTTPS, except plain HTTP to a loopback host (local stubs)
	/// - A trailing slash is added so relative endpoints join under the path
	fn validate_and_normalize_base_url(raw: &str) -> Result<Url, GithubAppError> {
		let mut url = Url::parse(raw)
			.map_err(|e| GithubAppError::Config(format!("Invalid GitHub base URL '{raw}': {e}")))?;

		let host = url
			.host_str()
			.ok_or_else(|| GithubAppError::Config("GitHub base URL must include a host".to_string()))?;
		let loopback = matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1");

		match url.scheme() {
			"https" => {}
			"http" if loopback => {}
			other => {
				return Err(GithubAppError::Config(format!(
					"GitHub base URL must use https, got '{other}'"
				)));
			}
		}

		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());
			url.set_path(&path);
		}

		Ok(url)
	}

	/// Create a configuration reading the key from `key_source`.
	///
	/// Uses the default GitHub API URL (https://api.github.com).
	pub fn new(app_id: u64, key_source: KeySource) -> Self {
		Self {
			app_id,
			key_source,
			base_url: Self::validate_and_normalize_base_url(DEFAULT_BASE_URL)
				.expect("default URL is valid"),
			upload_dir: DEFAULT_UPLOAD_DIR.to_string(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			jwt: JwtSettings::default(),
		}
	}

	/// Create configuration from environment variables.
	///
	/// Required:
	/// - `BEETLE_GITHUB_APP_ID`: GitHub App numeric ID
	///
	/// Optional:
	/// - `BEETLE_GITHUB_APP_PRIVATE_KEY` (or `_FILE`): PEM text; takes
	///   precedence over the key path
	/// - `BEETLE_GITHUB_APP_KEY_PATH`: PEM file (defaults to `beetle.pem`)
	/// - `BEETLE_GITHUB_API_BASE_URL`: API base URL (defaults to api.github.com)
	/// - `BEETLE_SCREENSHOT_DIR`: repository directory for uploaded screenshots
	/// - `BEETLE_GITHUB_REQUEST_TIMEOUT_SECS`: per-request timeout
	pub fn from_env() -> Result<Self, GithubAppError> {
		let app_id: u64 = parse_env("BEETLE_GITHUB_APP_ID")
			.map_err(|e| GithubAppError::Config(e.to_string()))?
			.ok_or_else(|| GithubAppError::Config("BEETLE_GITHUB_APP_ID not set".to_string()))?;

		let inline_key = load_secret_env("BEETLE_GITHUB_APP_PRIVATE_KEY")
			.map_err(|e| GithubAppError::Config(e.to_string()))?;

		let key_source = match inline_key {
			Some(pem) if pem.is_blank() => {
				return Err(GithubAppError::Config(
					"BEETLE_GITHUB_APP_PRIVATE_KEY is empty".to_string(),
				));
			}
			Some(pem) => KeySource::Pem(pem),
			None => {
				let path: Option<PathBuf> = parse_env("BEETLE_GITHUB_APP_KEY_PATH")
					.map_err(|e| GithubAppError::Config(e.to_string()))?;
				KeySource::Path(path.unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_ASSET)))
			}
		};

		let mut config = Self::new(app_id, key_source);

		if let Some(raw) = parse_env::<String>("BEETLE_GITHUB_API_BASE_URL")
			.map_err(|e| GithubAppError::Config(e.to_string()))?
		{
			config.base_url = Self::validate_and_normalize_base_url(&raw)?;
		}

		if let Some(dir) = parse_env::<String>("BEETLE_SCREENSHOT_DIR")
			.map_err(|e| GithubAppError::Config(e.to_string()))?
		{
			config.upload_dir = normalize_upload_dir(&dir)?;
		}

		if let Some(secs) = parse_env::<u64>("BEETLE_GITHUB_REQUEST_TIMEOUT_SECS")
			.map_err(|e| GithubAppError::Config(e.to_string()))?
		{
			config.request_timeout = Duration::from_secs(secs.max(1));
		}

		Ok(config)
	}

	/// Set a custom base URL (for GitHub Enterprise or testing).
	///
	/// If validation fails, logs a warning and keeps the previous value.
	pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
		let url_str = url.into();
		match Self::validate_and_normalize_base_url(&url_str) {
			Ok(validated) => self.base_url = validated,
			Err(e) => {
				warn!(error = %e, url = %url_str, "Invalid base_url in with_base_url, keeping previous value");
			}
		}
		self
	}

	/// Set the repository directory screenshots are uploaded to.
	///
	/// Invalid directories are logged and ignored.
	pub fn with_upload_dir(mut self, dir: impl Into<String>) -> Self {
		let dir = dir.into();
		match normalize_upload_dir(&dir) {
			Ok(normalized) => self.upload_dir = normalized,
			Err(e) => warn!(error = %e, dir = %dir, "Invalid upload_dir, keeping previous value"),
		}
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn with_jwt_settings(mut self, settings: JwtSettings) -> Self {
		self.jwt = settings;
		self
	}

	pub fn app_id(&self) -> u64 {
		self.app_id
	}

	pub fn key_source(&self) -> &KeySource {
		&self.key_source
	}

	/// Get the validated base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn upload_dir(&self) -> &str {
		&self.upload_dir
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}

	pub fn jwt_settings(&self) -> &JwtSettings {
		&self.jwt
	}
}

/// Strip surrounding slashes and reject traversal segments.
fn normalize_upload_dir(raw: &str) -> Result<String, GithubAppError> {
	let trimmed = raw.trim().trim_matches('/');
	if trimmed.is_empty() {
		return Err(GithubAppError::Config("upload directory is empty".to_string()));
	}
	if trimmed
		.split('/')
		.any(|segment| segment.is_empty() || segment == "." || segment == "..")
	{
		return Err(GithubAppError::Config(format!(
			"upload directory '{raw}' contains empty or relative segments"
		)));
	}
	Ok(trimmed.to_string())
}
