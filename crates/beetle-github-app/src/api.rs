// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Repository calls made with an installation token.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::error::GithubAppError;
use crate::http::{read_json, segment, GithubHttp};
use crate::installation::InstallationToken;
use crate::types::{
	Collaborator, ContentUploadRequest, ContentUploadResponse, CreatedIssue, Label, NewIssue,
	UploadedContent,
};

/// GitHub's maximum page size.
const PER_PAGE: usize = 100;

/// Upper bound on pages fetched for a single listing.
const MAX_PAGES: u32 = 50;

/// Client for the repository endpoints used to file an issue.
///
/// Every call checks the token's expiry first; an expired token fails without
/// touching the network.
#[derive(Clone)]
pub struct InstallationClient {
	http: GithubHttp,
	token: InstallationToken,
	upload_dir: String,
}

impl std::fmt::Debug for InstallationClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstallationClient")
			.field("token", &self.token)
			.field("upload_dir", &self.upload_dir)
			.finish_non_exhaustive()
	}
}

impl InstallationClient {
	pub(crate) fn new(http: GithubHttp, token: InstallationToken, upload_dir: String) -> Self {
		Self {
			http,
			token,
			upload_dir,
		}
	}

	pub fn token(&self) -> &InstallationToken {
		&self.token
	}

	/// All collaborators of `owner/repo`, in server order, without duplicates.
	#[instrument(skip(self))]
	pub async fn list_collaborators(
		&self,
		owner: &str,
		repo: &str,
	) -> Result<Vec<Collaborator>, GithubAppError> {
		let path = format!("repos/{}/{}/collaborators", segment(owner), segment(repo));
		let all: Vec<Collaborator> = self.list_paginated(&path, "collaborators").await?;

		let mut seen = HashSet::new();
		let collaborators: Vec<Collaborator> = all
			.into_iter()
			.filter(|c| seen.insert(c.login.clone()))
			.collect();

		debug!(count = collaborators.len(), "Collaborators listed");
		Ok(collaborators)
	}

	/// All labels of `owner/repo`, in server order, without duplicates.
	///
	/// Labels with an empty name cannot be applied and are dropped.
	#[instrument(skip(self))]
	pub async fn list_labels(&self, owner: &str, repo: &str) -> Result<Vec<Label>, GithubAppError> {
		let path = format!("repos/{}/{}/labels", segment(owner), segment(repo));
		let all: Vec<Label> = self.list_paginated(&path, "labels").await?;

		let mut seen = HashSet::new();
		let mut labels = Vec::with_capacity(all.len());
		for label in all {
			if label.name.trim().is_empty() {
				warn!(label_id = ?label.id, "Dropping label with empty name");
				continue;
			}
			if seen.insert(label.name.clone()) {
				labels.push(label);
			}
		}

		debug!(count = labels.len(), "Labels listed");
		Ok(labels)
	}

	/// Commit a PNG into the repository's upload directory and return a
	/// permanent URL for it.
	///
	/// The blob page with `?raw=true` is preferred, since the raw download URL
	/// of a private repository expires with its embedded token.
	#[instrument(skip(self, png), fields(size = png.len()))]
	pub async fn upload_image(
		&self,
		owner: &str,
		repo: &str,
		png: &[u8],
	) -> Result<String, GithubAppError> {
		self.token.ensure_valid(Utc::now())?;

		let file_name = unique_file_name();
		let dir = self
			.upload_dir
			.split('/')
			.map(segment)
			.collect::<Vec<_>>()
			.join("/");
		let url = self.http.endpoint(&format!(
			"repos/{}/{}/contents/{dir}/{}",
			segment(owner),
			segment(repo),
			segment(&file_name)
		))?;

		debug!(url = %url, "Uploading screenshot");

		let message = format!("Add bug report screenshot {file_name}");
		let request = self
			.http
			.request(Method::PUT, url, self.token.secret().expose())
			.json(&ContentUploadRequest {
				message: &message,
				content: BASE64.encode(png),
			});
		let response = self.http.send(request).await?;

		let uploaded: ContentUploadResponse = read_json(response, "content upload").await?;
		let image_url = permanent_image_url(&uploaded.content)?;

		info!(path = %uploaded.content.path, url = %image_url, "Screenshot uploaded");
		Ok(image_url)
	}

	/// Open an issue in `owner/repo`.
	#[instrument(skip(self, issue), fields(title = %issue.title))]
	pub async fn create_issue(
		&self,
		owner: &str,
		repo: &str,
		issue: &NewIssue,
	) -> Result<CreatedIssue, GithubAppError> {
		self.token.ensure_valid(Utc::now())?;

		let url = self
			.http
			.endpoint(&format!("repos/{}/{}/issues", segment(owner), segment(repo)))?;

		debug!(
			url = %url,
			assignees = issue.assignees.len(),
			labels = issue.labels.len(),
			"Creating issue"
		);

		let request = self
			.http
			.request(Method::POST, url, self.token.secret().expose())
			.json(issue);
		let response = self.http.send(request).await?;

		let created: CreatedIssue = read_json(response, "issue").await?;
		info!(number = created.number, url = %created.html_url, "Issue created");
		Ok(created)
	}

	/// Fetch every page of a listing endpoint.
	///
	/// Follows `rel="next"` links when GitHub sends them; without a `Link`
	/// header the listing ends at the first short page. A listing still
	/// going after `MAX_PAGES` pages is an error rather than a partial list.
	async fn list_paginated<T: DeserializeOwned>(
		&self,
		path: &str,
		what: &str,
	) -> Result<Vec<T>, GithubAppError> {
		self.token.ensure_valid(Utc::now())?;

		let base = self.http.endpoint(path)?;
		let mut items = Vec::new();
		let mut page: u32 = 1;
		let mut url = page_url(&base, page);

		loop {
			debug!(url = %url, page, "Fetching {what} page");

			let request = self
				.http
				.request(Method::GET, url.clone(), self.token.secret().expose());
			let response = self.http.send(request).await?;

			let next = response
				.headers()
				.contains_key(LINK)
				.then(|| next_link(response.headers()));
			let batch: Vec<T> = read_json(response, what).await?;
			let short_page = batch.len() < PER_PAGE;
			items.extend(batch);

			let next_url = match next {
				Some(Some(link)) => {
					let link = Url::parse(&link).map_err(|e| {
						GithubAppError::InvalidResponse(format!("invalid next link '{link}': {e}"))
					})?;
					if link.origin() != base.origin() {
						return Err(GithubAppError::InvalidResponse(format!(
							"next link points to a different origin: {link}"
						)));
					}
					link
				}
				Some(None) => break,
				None if short_page => break,
				None => page_url(&base, page + 1),
			};

			page += 1;
			if page > MAX_PAGES {
				warn!(pages = MAX_PAGES, "Abandoning {what} listing at page limit");
				return Err(GithubAppError::InvalidResponse(format!(
					"{what} listing did not end within {MAX_PAGES} pages"
				)));
			}
			url = next_url;
		}

		Ok(items)
	}
}

fn page_url(base: &Url, page: u32) -> Url {
	let mut url = base.clone();
	url
		.query_pairs_mut()
		.append_pair("per_page", &PER_PAGE.to_string())
		.append_pair("page", &page.to_string());
	url
}

/// Extract the `rel="next"` target from GitHub's `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(LINK)?.to_str().ok()?;
	value.split(',').find_map(|part| {
		let mut pieces = part.split(';');
		let target = pieces.next()?.trim();
		let is_next = pieces.any(|p| {
			let p = p.trim();
			p == "rel=\"next\"" || p == "rel=next"
		});
		if !is_next {
			return None;
		}
		target
			.strip_prefix('<')
			.and_then(|t| t.strip_suffix('>'))
			.map(str::to_string)
	})
}

/// URL that keeps resolving after the upload token is gone.
///
/// `html_url?raw=true` redirects to fresh raw content on every request. A
/// `download_url` is only used when it has no query string, i.e. no token.
fn permanent_image_url(content: &UploadedContent) -> Result<String, GithubAppError> {
	if let Some(html_url) = &content.html_url {
		let mut url = Url::parse(html_url).map_err(|e| {
			GithubAppError::InvalidResponse(format!("upload returned bad html_url {html_url}: {e}"))
		})?;
		url.set_query(None);
		url.query_pairs_mut().append_pair("raw", "true");
		return Ok(url.into());
	}

	match &content.download_url {
		Some(download_url) if !download_url.contains('?') => Ok(download_url.clone()),
		Some(_) => Err(GithubAppError::InvalidResponse(format!(
			"upload of {} returned only a token-bearing download_url",
			content.path
		))),
		None => Err(GithubAppError::InvalidResponse(format!(
			"upload of {} returned no html_url or download_url",
			content.path
		))),
	}
}

fn unique_file_name() -> String {
	let id = uuid::Uuid::new_v4().simple().to_string();
	format!(
		"screenshot_{}_{}.png",
		Utc::now().timestamp_millis(),
		&id[..8]
	)
}
