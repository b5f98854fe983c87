// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request plumbing shared by app-level and installation-level calls.

use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::config::GithubAppConfig;
use crate::error::GithubAppError;
use crate::types::GitHubErrorResponse;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Clone)]
pub(crate) struct GithubHttp {
	client: Client,
	base_url: Url,
}

impl GithubHttp {
	pub(crate) fn new(config: &GithubAppConfig) -> Result<Self, GithubAppError> {
		let client = beetle_common_http::new_client_with_timeout(config.request_timeout())
			.map_err(|e| GithubAppError::Config(format!("Failed to create HTTP client: {e}")))?;

		Ok(Self {
			client,
			base_url: config.base_url().clone(),
		})
	}

	/// Resolve an endpoint relative to the API base URL.
	pub(crate) fn endpoint(&self, path: &str) -> Result<Url, GithubAppError> {
		self
			.base_url
			.join(path)
			.map_err(|e| GithubAppError::Config(format!("Invalid URL: {e}")))
	}

	/// Start a request carrying the GitHub REST headers and a bearer token.
	pub(crate) fn request(&self, method: Method, url: Url, bearer: &str) -> RequestBuilder {
		self
			.client
			.request(method, url)
			.header(AUTHORIZATION, format!("Bearer {bearer}"))
			.header(ACCEPT, GITHUB_ACCEPT)
			.header("X-GitHub-Api-Version", GITHUB_API_VERSION)
	}

	/// Send once; non-success statuses become typed errors.
	pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, GithubAppError> {
		let response = request.send().await.map_err(|e| {
			if e.is_timeout() {
				error!("GitHub request timed out");
				return GithubAppError::Timeout;
			}
			error!(error = %e, "Network error talking to GitHub");
			GithubAppError::Network(e)
		})?;

		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}

		let headers = response.headers().clone();
		let body = response.text().await.unwrap_or_default();
		Err(map_github_error(status, &headers, &body))
	}
}

/// Parse a JSON body, reporting failures as invalid responses.
pub(crate) async fn read_json<T: DeserializeOwned>(
	response: Response,
	what: &str,
) -> Result<T, GithubAppError> {
	response.json::<T>().await.map_err(|e| {
		error!(error = %e, what, "Failed to parse GitHub response");
		GithubAppError::InvalidResponse(format!("{what}: JSON parse error: {e}"))
	})
}

/// Encode a single path segment (owner, repository, file name).
pub(crate) fn segment(value: &str) -> String {
	urlencoding::encode(value).into_owned()
}

/// Map GitHub API error responses to GithubAppError.
pub(crate) fn map_github_error(
	status: StatusCode,
	headers: &HeaderMap,
	body: &str,
) -> GithubAppError {
	let status_code = status.as_u16();
	let message = error_message(body);
	let budget_exhausted = headers
		.get(RATE_LIMIT_REMAINING)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|v| v.trim() == "0");

	match status_code {
		401 => {
			warn!(status = status_code, "Unauthorized request to GitHub");
			GithubAppError::Unauthorized {
				status: status_code,
				message,
			}
		}
		403 if budget_exhausted || mentions_rate_limit(&message) => {
			warn!(status = status_code, "GitHub rate limit exceeded");
			GithubAppError::RateLimited {
				status: status_code,
				message,
			}
		}
		403 => {
			warn!(status = status_code, "Forbidden request to GitHub");
			GithubAppError::Forbidden { message }
		}
		404 => {
			warn!(status = status_code, "GitHub resource not found");
			GithubAppError::NotFound { message }
		}
		429 => {
			warn!(status = status_code, "GitHub rate limit exceeded");
			GithubAppError::RateLimited {
				status: status_code,
				message,
			}
		}
		_ => {
			error!(status = status_code, body = %body, "GitHub API error");
			GithubAppError::api_error(status_code, message)
		}
	}
}

fn mentions_rate_limit(message: &str) -> bool {
	let lower = message.to_lowercase();
	lower.contains("rate limit") || lower.contains("api rate")
}

/// Prefer GitHub's `message` field; fall back to the raw body.
fn error_message(body: &str) -> String {
	serde_json::from_str::<GitHubErrorResponse>(body)
		.map(|e| e.message)
		.unwrap_or_else(|_| body.trim().to_string())
}
