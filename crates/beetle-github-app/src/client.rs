// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! App-level client: key loading, JWT signing and the token exchange.

use chrono::{DateTime, Utc};
use reqwest::Method;
use tracing::{debug, info, instrument, warn};

use crate::api::InstallationClient;
use crate::config::GithubAppConfig;
use crate::error::GithubAppError;
use crate::http::{read_json, segment, GithubHttp};
use crate::installation::{parse_expiry, InstallationToken};
use crate::jwt::{sign_app_jwt, AppJwt};
use crate::key::SigningKey;
use crate::types::{AccessTokenRequest, AccessTokenResponse, Installation};

/// Client authenticating as the GitHub App itself.
///
/// Holds no cached credentials; every exchange starts from a fresh JWT.
#[derive(Clone)]
pub struct GithubAppClient {
	http: GithubHttp,
	config: GithubAppConfig,
}

impl GithubAppClient {
	/// Create a new GitHub App client.
	pub fn new(config: GithubAppConfig) -> Result<Self, GithubAppError> {
		let http = GithubHttp::new(&config)?;

		info!(
			app_id = config.app_id(),
			base_url = %config.base_url(),
			"Created GitHub App client"
		);

		Ok(Self { http, config })
	}

	pub fn config(&self) -> &GithubAppConfig {
		&self.config
	}

	/// Read and parse the configured private key.
	pub fn load_signing_key(&self) -> Result<SigningKey, GithubAppError> {
		self.config.key_source().load()
	}

	/// Sign an app JWT at `now` with the configured app ID and settings.
	pub fn sign_app_jwt(
		&self,
		key: &SigningKey,
		now: DateTime<Utc>,
	) -> Result<AppJwt, GithubAppError> {
		sign_app_jwt(key, self.config.app_id(), now, self.config.jwt_settings())
	}

	/// Get the installation covering `owner/repo`.
	#[instrument(skip(self, jwt))]
	pub async fn get_repo_installation(
		&self,
		jwt: &AppJwt,
		owner: &str,
		repo: &str,
	) -> Result<Installation, GithubAppError> {
		let url = self.http.endpoint(&format!(
			"repos/{}/{}/installation",
			segment(owner),
			segment(repo)
		))?;

		debug!(url = %url, "Getting repository installation");

		let request = self.http.request(Method::GET, url, jwt.as_str());
		let response = match self.http.send(request).await {
			Ok(response) => response,
			Err(GithubAppError::NotFound { .. }) => {
				return Err(GithubAppError::installation_not_found(owner, repo));
			}
			Err(e) => return Err(e),
		};

		let installation: Installation = read_json(response, "installation").await?;

		if let Some(suspended_at) = &installation.suspended_at {
			warn!(installation_id = installation.id, %suspended_at, "Installation is suspended");
			return Err(GithubAppError::Forbidden {
				message: format!("installation {} suspended at {suspended_at}", installation.id),
			});
		}

		debug!(
			installation_id = installation.id,
			"Repository installation found"
		);

		Ok(installation)
	}

	/// Mint an installation token restricted to `repo`.
	///
	/// A token whose expiry is not after `now` is rejected.
	#[instrument(skip(self, jwt, now))]
	pub async fn create_installation_token(
		&self,
		jwt: &AppJwt,
		installation_id: i64,
		repo: &str,
		now: DateTime<Utc>,
	) -> Result<InstallationToken, GithubAppError> {
		let url = self
			.http
			.endpoint(&format!("app/installations/{installation_id}/access_tokens"))?;

		debug!(url = %url, "Fetching new installation token");

		let request = self
			.http
			.request(Method::POST, url, jwt.as_str())
			.json(&AccessTokenRequest {
				repositories: [repo],
			});
		let response = self.http.send(request).await?;

		let token_response: AccessTokenResponse = read_json(response, "access token").await?;
		let expires_at = parse_expiry(&token_response.expires_at)?;

		let token = InstallationToken::new(token_response.token, expires_at);
		if token.is_expired(now) {
			warn!(
				installation_id,
				%expires_at,
				"GitHub issued an already-expired installation token"
			);
			return Err(GithubAppError::TokenExpired {
				expired_at: expires_at,
			});
		}

		info!(installation_id, %expires_at, "Installation token issued");
		Ok(token)
	}

	/// Look up the installation for `owner/repo` and mint a token for it.
	pub async fn exchange_installation_token(
		&self,
		jwt: &AppJwt,
		owner: &str,
		repo: &str,
		now: DateTime<Utc>,
	) -> Result<InstallationToken, GithubAppError> {
		let installation = self.get_repo_installation(jwt, owner, repo).await?;
		self
			.create_installation_token(jwt, installation.id, repo, now)
			.await
	}

	/// Client for repository calls made with `token`.
	pub fn installation_client(&self, token: InstallationToken) -> InstallationClient {
		InstallationClient::new(self.http.clone(), token, self.config.upload_dir().to_string())
	}
}
