// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Bug reports for Beetle.
//!
//! Turns a screenshot plus the reporter's title, description and selections
//! into a GitHub issue, driven by an [`IssueFilingSession`].

pub mod compose;
pub mod draft;
pub mod error;
pub mod screenshot;
pub mod session;

pub use compose::compose_issue;
pub use draft::{IssueDraft, MetadataSnapshot, Selection};
pub use error::ReportError;
pub use screenshot::{write_screenshot, Screenshot, ScreenshotError};
pub use session::{IssueFilingSession, SessionParams, SessionState};
