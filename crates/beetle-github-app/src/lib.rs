// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GitHub App client for Beetle.
//!
//! This crate authenticates as a GitHub App (RS256 JWT from a bundled private
//! key), exchanges that assertion for a repository-scoped installation token,
//! and performs the handful of repository calls needed to file a bug report:
//! listing collaborators and labels, uploading a screenshot, and creating the
//! issue.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
mod http;
pub mod installation;
pub mod jwt;
pub mod key;
pub mod types;

pub use api::InstallationClient;
pub use client::GithubAppClient;
pub use config::GithubAppConfig;
pub use error::{ErrorKind, GithubAppError};
pub use installation::InstallationToken;
pub use jwt::{sign_app_jwt, verify_app_jwt, AppJwt, AppJwtClaims, JwtSettings};
pub use key::{
	load_signing_key, load_signing_key_from_path, KeySource, SigningKey, DEFAULT_KEY_ASSET,
};
pub use types::{Collaborator, CreatedIssue, Installation, InstallationAccount, Label, NewIssue};
