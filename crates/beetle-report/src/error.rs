// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use beetle_github_app::{ErrorKind, GithubAppError};
use thiserror::Error;

use crate::screenshot::ScreenshotError;

#[derive(Debug, Error)]
pub enum ReportError {
	#[error(transparent)]
	Github(#[from] GithubAppError),

	#[error(transparent)]
	Screenshot(#[from] ScreenshotError),

	/// Rejected at the caller boundary before anything is sent.
	#[error("Invalid issue draft: {0}")]
	InvalidDraft(String),

	/// The operation is not allowed in the session's current state.
	#[error("Cannot {operation} while the session is {state}")]
	OutOfOrder {
		operation: &'static str,
		state: String,
	},
}

impl ReportError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			ReportError::Github(e) => e.kind(),
			ReportError::Screenshot(_) => ErrorKind::Io,
			ReportError::InvalidDraft(_) | ReportError::OutOfOrder { .. } => ErrorKind::Config,
		}
	}
}
