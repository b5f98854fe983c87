// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request and response types for the issue-filing API calls.

use serde::{Deserialize, Serialize};

/// A repository member who can be assigned to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
	pub login: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar_url: Option<String>,
}

impl Collaborator {
	pub fn new(login: impl Into<String>) -> Self {
		Self {
			login: login.into(),
			id: None,
			avatar_url: None,
		}
	}
}

/// A repository label.
///
/// Only `name` is needed to apply a label; the rest round-trips GitHub's
/// representation and may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub node_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	#[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
	pub is_default: Option<bool>,
}

impl Label {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			id: None,
			node_id: None,
			url: None,
			name: name.into(),
			description: None,
			color: None,
			is_default: None,
		}
	}
}

/// Payload of `POST /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
	pub title: String,
	pub body: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub assignees: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub labels: Vec<String>,
}

/// The issue GitHub created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
	pub id: i64,
	pub number: u64,
	pub html_url: String,
}

impl CreatedIssue {
	/// Identifier shown to the reporter, e.g. `acme/widgets#42`.
	pub fn reference(&self, owner: &str, repo: &str) -> String {
		format!("{owner}/{repo}#{}", self.number)
	}
}

/// GitHub App installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
	/// Installation ID.
	pub id: i64,
	/// Account that owns the installation.
	pub account: Option<InstallationAccount>,
	/// Suspension timestamp (ISO8601) if suspended.
	#[serde(default)]
	pub suspended_at: Option<String>,
}

/// Account that owns a GitHub App installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationAccount {
	pub login: String,
	#[serde(rename = "type")]
	pub account_type: String,
}

/// Access token response from GitHub.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccessTokenResponse {
	pub token: String,
	pub expires_at: String,
}

/// Body of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
	pub repositories: [&'a str; 1],
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ContentUploadRequest<'a> {
	pub message: &'a str,
	pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentUploadResponse {
	pub content: UploadedContent,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadedContent {
	pub path: String,
	/// Blob page; stable for the lifetime of the commit.
	#[serde(default)]
	pub html_url: Option<String>,
	/// Raw URL. Carries a short-lived `token` query on private repositories.
	#[serde(default)]
	pub download_url: Option<String>,
}

/// GitHub API error response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitHubErrorResponse {
	pub message: String,
}
