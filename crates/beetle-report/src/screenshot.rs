// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Screenshot files on local disk.

use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{ImageFormat, ImageReader};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Error)]
pub enum ScreenshotError {
	#[error("Failed to read screenshot {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("Failed to write screenshot {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("{path} is not a PNG image")]
	NotPng { path: PathBuf },

	#[error("{path} is not a decodable PNG: {reason}")]
	MalformedHeader { path: PathBuf, reason: String },
}

/// A PNG screenshot that decoded cleanly.
#[derive(Clone)]
pub struct Screenshot {
	path: PathBuf,
	bytes: Vec<u8>,
	width: u32,
	height: u32,
}

impl std::fmt::Debug for Screenshot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Screenshot")
			.field("path", &self.path)
			.field("len", &self.bytes.len())
			.field("width", &self.width)
			.field("height", &self.height)
			.finish()
	}
}

impl Screenshot {
	/// Read `path` and decode it as a PNG.
	#[instrument]
	pub async fn read(path: &Path) -> Result<Self, ScreenshotError> {
		let bytes = fs::read(path).await.map_err(|source| ScreenshotError::Read {
			path: path.to_path_buf(),
			source,
		})?;

		let owned = path.to_path_buf();
		match tokio::task::spawn_blocking(move || Self::from_bytes(owned, bytes)).await {
			Ok(result) => result,
			Err(e) => Err(ScreenshotError::MalformedHeader {
				path: path.to_path_buf(),
				reason: format!("decoder task failed: {e}"),
			}),
		}
	}

	/// Validate bytes that claim to come from `path`.
	///
	/// The whole image is decoded, so a valid header in front of a corrupt
	/// body is rejected.
	pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self, ScreenshotError> {
		let path = path.into();

		if !matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
			return Err(ScreenshotError::NotPng { path });
		}

		let mut reader = ImageReader::new(Cursor::new(bytes.as_slice()));
		reader.set_format(ImageFormat::Png);
		let decoded = match reader.decode() {
			Ok(decoded) => decoded,
			Err(e) => {
				warn!(path = %path.display(), error = %e, "Screenshot failed to decode");
				return Err(ScreenshotError::MalformedHeader {
					path,
					reason: e.to_string(),
				});
			}
		};

		let (width, height) = (decoded.width(), decoded.height());
		debug!(path = %path.display(), width, height, len = bytes.len(), "Screenshot validated");

		Ok(Self {
			path,
			bytes,
			width,
			height,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}
}

/// Write captured PNG bytes to a new `bitmap_{millis}.png` file in `dir`.
///
/// `dir` is created if missing. An existing file is never overwritten; a
/// numeric suffix is added instead.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub async fn write_screenshot(bytes: &[u8], dir: &Path) -> Result<PathBuf, ScreenshotError> {
	fs::create_dir_all(dir).await.map_err(|source| {
		error!(error = %source, dir = %dir.display(), "Failed to create screenshot directory");
		ScreenshotError::Write {
			path: dir.to_path_buf(),
			source,
		}
	})?;

	let stem = format!("bitmap_{}", Utc::now().timestamp_millis());
	let mut attempt = 0u32;
	loop {
		let name = if attempt == 0 {
			format!("{stem}.png")
		} else {
			format!("{stem}_{attempt}.png")
		};
		let path = dir.join(name);

		let opened = fs::OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&path)
			.await;

		let mut file = match opened {
			Ok(file) => file,
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
				attempt += 1;
				continue;
			}
			Err(source) => {
				error!(error = %source, path = %path.display(), "Failed to create screenshot file");
				return Err(ScreenshotError::Write { path, source });
			}
		};

		let written = async {
			file.write_all(bytes).await?;
			file.flush().await
		}
		.await;

		if let Err(source) = written {
			error!(error = %source, path = %path.display(), "Failed to write screenshot");
			if let Err(e) = fs::remove_file(&path).await {
				warn!(error = %e, path = %path.display(), "Failed to remove partial screenshot");
			}
			return Err(ScreenshotError::Write { path, source });
		}

		debug!(path = %path.display(), "Screenshot written");
		return Ok(path);
	}
}
