// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use beetle_github_app::NewIssue;

use crate::draft::IssueDraft;

/// Build the issue request for `draft` with the uploaded screenshot at
/// `image_url` embedded beneath the description.
///
/// Assignees and labels come out sorted, so equal inputs always give equal
/// requests.
pub fn compose_issue(draft: &IssueDraft, image_url: &str) -> NewIssue {
	NewIssue {
		title: draft.title().to_string(),
		body: format!("{}\n\n![screenshot]({image_url})", draft.description()),
		assignees: draft.assignees().iter().cloned().collect(),
		labels: draft.labels().iter().cloned().collect(),
	}
}
