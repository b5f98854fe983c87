// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client construction for Beetle.
//!
//! GitHub rejects API requests without a `User-Agent`, so every client built
//! here carries `beetle/{version} ({os}-{arch})`.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

/// Connect timeout applied to every client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client builder preconfigured with the Beetle User-Agent and connect timeout.
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.connect_timeout(CONNECT_TIMEOUT)
}

/// Build a client whose requests time out after `timeout`.
pub fn new_client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
	builder().timeout(timeout).build()
}

/// The Beetle User-Agent string.
pub fn user_agent() -> String {
	format!(
		"beetle/{} ({}-{})",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
