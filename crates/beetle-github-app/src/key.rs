// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Loading the GitHub App private key.
//!
//! The key ships next to the application as a single PEM block (by default
//! `beetle.pem`). PKCS#8 (`BEGIN PRIVATE KEY`) is the expected encoding; the
//! PKCS#1 form GitHub offers for download (`BEGIN RSA PRIVATE KEY`) is also
//! accepted.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use beetle_common_config::SecretString;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use tracing::{debug, instrument};

use crate::error::GithubAppError;

/// Conventional file name of the bundled key asset.
pub const DEFAULT_KEY_ASSET: &str = "beetle.pem";

const PKCS8_TAG: &str = "PRIVATE KEY";
const PKCS1_TAG: &str = "RSA PRIVATE KEY";

/// A parsed RSA private key, ready to sign app JWTs.
///
/// Only signing material is kept. The key cannot be serialized and its
/// `Debug` output carries no key bytes.
#[derive(Clone)]
pub struct SigningKey {
	encoding: EncodingKey,
	public_der: Vec<u8>,
	modulus_bits: usize,
}

impl fmt::Debug for SigningKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SigningKey")
			.field("modulus_bits", &self.modulus_bits)
			.finish_non_exhaustive()
	}
}

impl SigningKey {
	/// Parse a key from PEM text containing one private key block.
	pub fn from_pem(text: &str) -> Result<Self, GithubAppError> {
		let block = pem::parse(text)
			.map_err(|e| GithubAppError::KeyFormat(format!("invalid PEM block: {e}")))?;
		let label = block.tag();

		let private_key = match label {
			PKCS8_TAG => RsaPrivateKey::from_pkcs8_der(block.contents())
				.map_err(|e| GithubAppError::KeyFormat(format!("invalid PKCS#8 key: {e}")))?,
			PKCS1_TAG => RsaPrivateKey::from_pkcs1_der(block.contents())
				.map_err(|e| GithubAppError::KeyFormat(format!("invalid PKCS#1 RSA key: {e}")))?,
			other => {
				return Err(GithubAppError::KeyFormat(format!(
					"expected a private key PEM block, found '{other}'"
				)));
			}
		};

		private_key
			.validate()
			.map_err(|e| GithubAppError::KeyFormat(format!("inconsistent RSA key: {e}")))?;

		let private_der = private_key
			.to_pkcs1_der()
			.map_err(|e| GithubAppError::KeyFormat(format!("failed to re-encode key: {e}")))?;
		let public_der = private_key
			.to_public_key()
			.to_pkcs1_der()
			.map_err(|e| GithubAppError::KeyFormat(format!("failed to encode public key: {e}")))?;

		let modulus_bits = private_key.size() * 8;
		debug!(label, modulus_bits, "Parsed GitHub App private key");

		Ok(Self {
			encoding: EncodingKey::from_rsa_der(private_der.as_bytes()),
			public_der: public_der.as_bytes().to_vec(),
			modulus_bits,
		})
	}

	/// Size of the RSA modulus in bits.
	pub fn modulus_bits(&self) -> usize {
		self.modulus_bits
	}

	/// Public half of the key, for verifying tokens this key signed.
	pub fn verifying_key(&self) -> DecodingKey {
		DecodingKey::from_rsa_der(&self.public_der)
	}

	pub(crate) fn encoding_key(&self) -> &EncodingKey {
		&self.encoding
	}
}

/// Read one PEM block from `reader` and parse it.
///
/// The caller owns the reader; it is only read to the end.
pub fn load_signing_key<R: Read>(mut reader: R) -> Result<SigningKey, GithubAppError> {
	let mut bytes = Vec::new();
	reader
		.read_to_end(&mut bytes)
		.map_err(|e| GithubAppError::KeyFormat(format!("failed to read key stream: {e}")))?;

	let text = std::str::from_utf8(&bytes)
		.map_err(|_| GithubAppError::KeyFormat("key stream is not valid UTF-8".to_string()))?;

	SigningKey::from_pem(text)
}

/// Open `path` and parse the key it contains.
#[instrument]
pub fn load_signing_key_from_path(path: &Path) -> Result<SigningKey, GithubAppError> {
	let file = File::open(path).map_err(|source| GithubAppError::KeyRead {
		path: path.to_path_buf(),
		source,
	})?;
	load_signing_key(file)
}

/// Where the private key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
	/// A PEM file on disk, read once per session.
	Path(PathBuf),
	/// PEM text supplied directly, e.g. from the environment.
	Pem(SecretString),
}

impl Default for KeySource {
	fn default() -> Self {
		KeySource::Path(PathBuf::from(DEFAULT_KEY_ASSET))
	}
}

impl KeySource {
	pub fn load(&self) -> Result<SigningKey, GithubAppError> {
		match self {
			KeySource::Path(path) => load_signing_key_from_path(path),
			KeySource::Pem(pem) => SigningKey::from_pem(pem.expose()),
		}
	}
}

#[cfg(test)]
pub(crate) mod test_keys {
	use std::sync::OnceLock;

	use rsa::pkcs1::EncodeRsaPrivateKey;
	use rsa::pkcs8::{EncodePrivateKey, LineEnding};
	use rsa::RsaPrivateKey;

	fn key(bits: usize) -> RsaPrivateKey {
		let mut rng = rand::thread_rng();
		RsaPrivateKey::new(&mut rng, bits).expect("Failed to generate RSA key")
	}

	fn rsa_2048() -> &'static RsaPrivateKey {
		static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
		KEY.get_or_init(|| key(2048))
	}

	/// PKCS#8 PEM of a 2048-bit key, generated once per test binary.
	pub fn pkcs8_pem() -> String {
		rsa_2048()
			.to_pkcs8_pem(LineEnding::LF)
			.expect("Failed to encode PKCS#8 PEM")
			.to_string()
	}

	pub fn pkcs1_pem() -> String {
		rsa_2048()
			.to_pkcs1_pem(LineEnding::LF)
			.expect("Failed to encode PKCS#1 PEM")
			.to_string()
	}

	/// A key too small for RS256.
	pub fn weak_pkcs8_pem() -> String {
		key(1024)
			.to_pkcs8_pem(LineEnding::LF)
			.expect("Failed to encode PKCS#8 PEM")
			.to_string()
	}
}
