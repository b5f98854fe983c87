// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! One issue-filing session.
//!
//! A session moves strictly forward:
//!
//! ```text
//! Start -> LoadingKey -> SigningJwt -> ExchangingToken -> FetchingMetadata
//!       -> AwaitingDraft -> UploadingImage -> SubmittingIssue -> Done
//! ```
//!
//! The first error moves it to `Failed` carrying the error kind. `Done` and
//! `Failed` are terminal. Every transition is published on a watch channel so
//! a UI can render progress without driving the flow itself.
//!
//! Dropping a future returned by [`IssueFilingSession::open`] or
//! [`IssueFilingSession::submit`] abandons the in-flight request. Nothing is
//! rolled back; the session stays in the state it had reached.

use std::fmt;
use std::path::{Path, PathBuf};

use beetle_github_app::{CreatedIssue, ErrorKind, GithubAppClient, InstallationClient};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::compose::compose_issue;
use crate::draft::{IssueDraft, MetadataSnapshot};
use crate::error::ReportError;
use crate::screenshot::Screenshot;

/// Repository and screenshot a session is opened for. Fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
	organization: String,
	repository: String,
	screenshot: Option<PathBuf>,
}

impl SessionParams {
	pub fn new(organization: impl Into<String>, repository: impl Into<String>) -> Self {
		Self {
			organization: organization.into(),
			repository: repository.into(),
			screenshot: None,
		}
	}

	/// Pin the session to the screenshot captured when the report started.
	pub fn with_screenshot(mut self, screenshot: impl Into<PathBuf>) -> Self {
		self.screenshot = Some(screenshot.into());
		self
	}

	pub fn organization(&self) -> &str {
		&self.organization
	}

	pub fn repository(&self) -> &str {
		&self.repository
	}

	/// The screenshot captured when the report was started, if any.
	pub fn screenshot(&self) -> Option<&Path> {
		self.screenshot.as_deref()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
	Start,
	LoadingKey,
	SigningJwt,
	ExchangingToken,
	FetchingMetadata,
	/// Metadata is available; waiting for the reporter's draft.
	AwaitingDraft,
	UploadingImage,
	SubmittingIssue,
	Done(CreatedIssue),
	Failed(ErrorKind),
}

impl SessionState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, SessionState::Done(_) | SessionState::Failed(_))
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionState::Start => f.write_str("start"),
			SessionState::LoadingKey => f.write_str("loading_key"),
			SessionState::SigningJwt => f.write_str("signing_jwt"),
			SessionState::ExchangingToken => f.write_str("exchanging_token"),
			SessionState::FetchingMetadata => f.write_str("fetching_metadata"),
			SessionState::AwaitingDraft => f.write_str("awaiting_draft"),
			SessionState::UploadingImage => f.write_str("uploading_image"),
			SessionState::SubmittingIssue => f.write_str("submitting_issue"),
			SessionState::Done(issue) => write!(f, "done(#{})", issue.number),
			SessionState::Failed(kind) => write!(f, "failed({kind})"),
		}
	}
}

/// Drives key loading, token exchange, metadata fetch and issue creation for
/// a single bug report.
pub struct IssueFilingSession {
	client: GithubAppClient,
	params: SessionParams,
	state: watch::Sender<SessionState>,
	installation: Option<InstallationClient>,
	snapshot: Option<MetadataSnapshot>,
}

impl IssueFilingSession {
	pub fn new(client: GithubAppClient, params: SessionParams) -> Self {
		let (state, _) = watch::channel(SessionState::Start);
		Self {
			client,
			params,
			state,
			installation: None,
			snapshot: None,
		}
	}

	pub fn params(&self) -> &SessionParams {
		&self.params
	}

	pub fn state(&self) -> SessionState {
		self.state.borrow().clone()
	}

	/// Observe state transitions.
	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.state.subscribe()
	}

	/// Metadata fetched by [`open`](Self::open), if it has completed.
	pub fn snapshot(&self) -> Option<&MetadataSnapshot> {
		self.snapshot.as_ref()
	}

	/// Authenticate and fetch the repository's collaborators and labels.
	///
	/// Only valid from `Start`; on success the session waits for a draft.
	#[instrument(skip(self), fields(org = %self.params.organization, repo = %self.params.repository))]
	pub async fn open(&mut self) -> Result<MetadataSnapshot, ReportError> {
		self.expect_state(&SessionState::Start, "open the session")?;

		match self.open_inner().await {
			Ok(snapshot) => {
				self.snapshot = Some(snapshot.clone());
				self.transition(SessionState::AwaitingDraft);
				Ok(snapshot)
			}
			Err(e) => Err(self.fail(e)),
		}
	}

	async fn open_inner(&mut self) -> Result<MetadataSnapshot, ReportError> {
		let org = self.params.organization.as_str();
		let repo = self.params.repository.as_str();

		self.transition(SessionState::LoadingKey);
		let key = self.client.load_signing_key()?;

		self.transition(SessionState::SigningJwt);
		let jwt = self.client.sign_app_jwt(&key, Utc::now())?;

		self.transition(SessionState::ExchangingToken);
		let token = self
			.client
			.exchange_installation_token(&jwt, org, repo, Utc::now())
			.await?;
		let api = self.client.installation_client(token);

		self.transition(SessionState::FetchingMetadata);
		let (collaborators, labels) = tokio::try_join!(
			api.list_collaborators(org, repo),
			api.list_labels(org, repo)
		)?;

		info!(
			collaborators = collaborators.len(),
			labels = labels.len(),
			"Repository metadata fetched"
		);

		self.installation = Some(api);
		Ok(MetadataSnapshot::new(collaborators, labels))
	}

	/// Upload the draft's screenshot and file the issue.
	///
	/// Only valid after a successful [`open`](Self::open). Assignees and
	/// labels absent from the fetched metadata are dropped. When the session
	/// was pinned to a screenshot, a draft naming another file is rejected
	/// and the session stays in `AwaitingDraft`.
	#[instrument(
		skip(self, draft),
		fields(org = %self.params.organization, repo = %self.params.repository)
	)]
	pub async fn submit(&mut self, draft: IssueDraft) -> Result<CreatedIssue, ReportError> {
		self.expect_state(&SessionState::AwaitingDraft, "submit an issue")?;
		self.expect_screenshot(&draft)?;

		match self.submit_inner(draft).await {
			Ok(issue) => {
				info!(
					issue = %issue.reference(&self.params.organization, &self.params.repository),
					url = %issue.html_url,
					"Bug report filed"
				);
				self.transition(SessionState::Done(issue.clone()));
				Ok(issue)
			}
			Err(e) => Err(self.fail(e)),
		}
	}

	async fn submit_inner(&self, draft: IssueDraft) -> Result<CreatedIssue, ReportError> {
		let (Some(api), Some(snapshot)) = (self.installation.as_ref(), self.snapshot.as_ref()) else {
			return Err(ReportError::OutOfOrder {
				operation: "submit an issue",
				state: "missing installation".to_string(),
			});
		};
		let org = self.params.organization.as_str();
		let repo = self.params.repository.as_str();

		let draft = snapshot.restrict(draft);

		self.transition(SessionState::UploadingImage);
		let screenshot = Screenshot::read(draft.screenshot()).await?;
		let image_url = api.upload_image(org, repo, screenshot.bytes()).await?;

		self.transition(SessionState::SubmittingIssue);
		let issue = compose_issue(&draft, &image_url);
		Ok(api.create_issue(org, repo, &issue).await?)
	}

	fn expect_state(
		&self,
		expected: &SessionState,
		operation: &'static str,
	) -> Result<(), ReportError> {
		let current = self.state.borrow();
		if *current != *expected {
			warn!(state = %*current, operation, "Session operation out of order");
			return Err(ReportError::OutOfOrder {
				operation,
				state: current.to_string(),
			});
		}
		Ok(())
	}

	fn expect_screenshot(&self, draft: &IssueDraft) -> Result<(), ReportError> {
		match self.params.screenshot() {
			Some(pinned) if pinned != draft.screenshot() => {
				warn!(
					pinned = %pinned.display(),
					draft = %draft.screenshot().display(),
					"Draft screenshot does not match the session"
				);
				Err(ReportError::InvalidDraft(format!(
					"draft screenshot {} is not the session screenshot {}",
					draft.screenshot().display(),
					pinned.display()
				)))
			}
			_ => Ok(()),
		}
	}

	fn transition(&self, next: SessionState) {
		debug!(to = %next, "Session transition");
		self.state.send_replace(next);
	}

	/// Record the failure and hand the error back.
	fn fail(&mut self, error: ReportError) -> ReportError {
		warn!(error = %error, kind = %error.kind(), "Issue-filing session failed");
		self.installation = None;
		self.transition(SessionState::Failed(error.kind()));
		error
	}
}
