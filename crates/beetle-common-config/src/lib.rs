// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Configuration primitives shared by the Beetle crates.
//!
//! - [`Secret<T>`] re-exported from [`beetle_common_secret`]
//! - [`load_secret_env`] for the `VAR` / `VAR_FILE` convention
//! - [`parse_env`] for typed, optional settings

pub mod env;

pub use beetle_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, parse_env, EnvValueError, SecretEnvError};
