// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Report drafts and the metadata they are drawn from.
//!
//! Collaborators and labels fetched from GitHub are held in an immutable
//! [`MetadataSnapshot`]. What the reporter picked is tracked separately in a
//! [`Selection`], so the same snapshot can back several views without any of
//! them mutating shared items.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use beetle_github_app::{Collaborator, Label};
use tracing::warn;

use crate::error::ReportError;
use crate::screenshot::Screenshot;

/// Collaborators and labels of one repository, as fetched at session start.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
	collaborators: Arc<[Collaborator]>,
	labels: Arc<[Label]>,
}

impl MetadataSnapshot {
	pub fn new(collaborators: Vec<Collaborator>, labels: Vec<Label>) -> Self {
		Self {
			collaborators: collaborators.into(),
			labels: labels.into(),
		}
	}

	pub fn collaborators(&self) -> &[Collaborator] {
		&self.collaborators
	}

	pub fn labels(&self) -> &[Label] {
		&self.labels
	}

	pub fn collaborator(&self, login: &str) -> Option<&Collaborator> {
		self.collaborators.iter().find(|c| c.login == login)
	}

	pub fn label(&self, name: &str) -> Option<&Label> {
		self.labels.iter().find(|l| l.name == name)
	}

	/// Build a draft from `selection`.
	///
	/// Only selected entries that exist in this snapshot are carried over.
	pub fn draft(
		&self,
		selection: &Selection,
		title: impl Into<String>,
		description: impl Into<String>,
		screenshot: impl Into<PathBuf>,
	) -> IssueDraft {
		let mut draft = IssueDraft::new(title, description, screenshot);
		draft.assignees = self
			.collaborators
			.iter()
			.filter(|c| selection.is_assignee_selected(&c.login))
			.map(|c| c.login.clone())
			.collect();
		draft.labels = self
			.labels
			.iter()
			.filter(|l| selection.is_label_selected(&l.name))
			.map(|l| l.name.clone())
			.collect();
		draft
	}

	/// Drop assignees and labels the repository does not know about.
	pub(crate) fn restrict(&self, mut draft: IssueDraft) -> IssueDraft {
		draft.assignees.retain(|login| {
			let known = self.collaborator(login).is_some();
			if !known {
				warn!(login = %login, "Dropping assignee who is not a collaborator");
			}
			known
		});
		draft.labels.retain(|name| {
			let known = self.label(name).is_some();
			if !known {
				warn!(label = %name, "Dropping unknown label");
			}
			known
		});
		draft
	}
}

/// Logins and label names the reporter has selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
	assignees: BTreeSet<String>,
	labels: BTreeSet<String>,
}

impl Selection {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` if the login was not already selected.
	pub fn select_assignee(&mut self, login: impl Into<String>) -> bool {
		let login = login.into();
		if login.trim().is_empty() {
			return false;
		}
		self.assignees.insert(login)
	}

	pub fn deselect_assignee(&mut self, login: &str) -> bool {
		self.assignees.remove(login)
	}

	/// Flip the selection of `login`, returning whether it is now selected.
	pub fn toggle_assignee(&mut self, login: &str) -> bool {
		if self.deselect_assignee(login) {
			false
		} else {
			self.select_assignee(login)
		}
	}

	pub fn is_assignee_selected(&self, login: &str) -> bool {
		self.assignees.contains(login)
	}

	/// Returns `true` if the label was not already selected. Empty names are
	/// never selectable.
	pub fn select_label(&mut self, name: impl Into<String>) -> bool {
		let name = name.into();
		if name.trim().is_empty() {
			warn!("Ignoring selection of a label with an empty name");
			return false;
		}
		self.labels.insert(name)
	}

	pub fn deselect_label(&mut self, name: &str) -> bool {
		self.labels.remove(name)
	}

	pub fn toggle_label(&mut self, name: &str) -> bool {
		if self.deselect_label(name) {
			false
		} else {
			self.select_label(name)
		}
	}

	pub fn is_label_selected(&self, name: &str) -> bool {
		self.labels.contains(name)
	}

	pub fn assignees(&self) -> impl Iterator<Item = &str> {
		self.assignees.iter().map(String::as_str)
	}

	pub fn labels(&self) -> impl Iterator<Item = &str> {
		self.labels.iter().map(String::as_str)
	}
}

/// What the reporter wants filed. Consumed by a single submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
	title: String,
	description: String,
	assignees: BTreeSet<String>,
	labels: BTreeSet<String>,
	screenshot: PathBuf,
}

impl IssueDraft {
	pub fn new(
		title: impl Into<String>,
		description: impl Into<String>,
		screenshot: impl Into<PathBuf>,
	) -> Self {
		Self {
			title: title.into(),
			description: description.into(),
			assignees: BTreeSet::new(),
			labels: BTreeSet::new(),
			screenshot: screenshot.into(),
		}
	}

	pub fn with_assignee(mut self, login: impl Into<String>) -> Self {
		let login = login.into();
		if !login.trim().is_empty() {
			self.assignees.insert(login);
		}
		self
	}

	pub fn with_label(mut self, name: impl Into<String>) -> Self {
		let name = name.into();
		if name.trim().is_empty() {
			warn!("Ignoring label with an empty name");
		} else {
			self.labels.insert(name);
		}
		self
	}

	pub fn title(&self) -> &str {
		&self.title
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	/// Assignee logins in sorted order.
	pub fn assignees(&self) -> &BTreeSet<String> {
		&self.assignees
	}

	/// Label names in sorted order.
	pub fn labels(&self) -> &BTreeSet<String> {
		&self.labels
	}

	pub fn screenshot(&self) -> &Path {
		&self.screenshot
	}

	/// Check the draft before handing it to a session: non-blank title and
	/// description, and a readable PNG screenshot.
	pub async fn validate(&self) -> Result<Screenshot, ReportError> {
		if self.title.trim().is_empty() {
			return Err(ReportError::InvalidDraft("title is empty".to_string()));
		}
		if self.description.trim().is_empty() {
			return Err(ReportError::InvalidDraft("description is empty".to_string()));
		}
		Ok(Screenshot::read(&self.screenshot).await?)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use tempfile::TempDir;

	use super::*;
	use crate::screenshot::test_png::png;

	fn snapshot() -> MetadataSnapshot {
		MetadataSnapshot::new(
			vec![
				Collaborator::new("carol"),
				Collaborator::new("alice"),
				Collaborator::new("bob"),
			],
			vec![Label::named("ui"), Label::named("bug")],
		)
	}

	#[test]
	fn test_draft_contains_only_selected_known_entries() {
		let mut selection = Selection::new();
		selection.select_assignee("alice");
		selection.select_assignee("mallory");
		selection.select_label("bug");

		let draft = snapshot().draft(&selection, "Crash", "Boom", "shot.png");
		assert_eq!(draft.assignees().iter().collect::<Vec<_>>(), vec!["alice"]);
		assert_eq!(draft.labels().iter().collect::<Vec<_>>(), vec!["bug"]);
	}

	#[test]
	fn test_toggle() {
		let mut selection = Selection::new();
		assert!(selection.toggle_assignee("alice"));
		assert!(selection.is_assignee_selected("alice"));
		assert!(!selection.toggle_assignee("alice"));
		assert!(!selection.is_assignee_selected("alice"));

		assert!(selection.toggle_label("bug"));
		assert!(!selection.toggle_label("bug"));
	}

	#[test]
	fn test_empty_label_cannot_be_selected() {
		let mut selection = Selection::new();
		assert!(!selection.select_label(""));
		assert!(!selection.select_label("   "));
		assert_eq!(selection.labels().count(), 0);

		let draft = IssueDraft::new("t", "d", "shot.png").with_label("");
		assert!(draft.labels().is_empty());
	}

	#[test]
	fn test_selection_does_not_touch_snapshot() {
		let snapshot = snapshot();
		let shared = snapshot.clone();
		let mut selection = Selection::new();
		selection.select_assignee("bob");

		let _ = snapshot.draft(&selection, "t", "d", "shot.png");
		assert_eq!(shared.collaborators(), snapshot.collaborators());
	}

	#[test]
	fn test_restrict_drops_unknown_entries() {
		let draft = IssueDraft::new("t", "d", "shot.png")
			.with_assignee("alice")
			.with_assignee("mallory")
			.with_label("bug")
			.with_label("wontfix");

		let restricted = snapshot().restrict(draft);
		assert_eq!(restricted.assignees().len(), 1);
		assert!(restricted.assignees().contains("alice"));
		assert_eq!(restricted.labels().len(), 1);
		assert!(restricted.labels().contains("bug"));
	}

	#[tokio::test]
	async fn test_validate() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("shot.png");
		std::fs::write(&path, png(200, 400)).unwrap();

		let shot = IssueDraft::new("Crash on launch", "App crashes immediately", &path)
			.validate()
			.await
			.unwrap();
		assert_eq!(shot.width(), 200);

		let err = IssueDraft::new("  ", "App crashes immediately", &path)
			.validate()
			.await
			.unwrap_err();
		assert!(matches!(err, ReportError::InvalidDraft(_)));

		let err = IssueDraft::new("Crash", "", &path).validate().await.unwrap_err();
		assert!(matches!(err, ReportError::InvalidDraft(_)));

		let err = IssueDraft::new("Crash", "Boom", dir.path().join("missing.png"))
			.validate()
			.await
			.unwrap_err();
		assert!(matches!(err, ReportError::Screenshot(_)));
	}

	proptest! {
		#[test]
		fn only_selected_collaborators_reach_the_draft(mask in prop::collection::vec(any::<bool>(), 0..64)) {
			let collaborators: Vec<Collaborator> = (0..mask.len())
				.map(|i| Collaborator::new(format!("user{i}")))
				.collect();
			let snapshot = MetadataSnapshot::new(collaborators, Vec::new());

			let mut selection = Selection::new();
			for (i, selected) in mask.iter().enumerate() {
				if *selected {
					selection.select_assignee(format!("user{i}"));
				}
			}

			let draft = snapshot.draft(&selection, "t", "d", "shot.png");
			let expected = mask.iter().filter(|s| **s).count();
			prop_assert_eq!(draft.assignees().len(), expected);
			for login in draft.assignees() {
				prop_assert!(selection.is_assignee_selected(login));
			}
		}
	}
}
