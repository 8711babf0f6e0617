//! Redacting wrapper that keeps id tokens and signed responses out of logs.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const FINGERPRINT_LEN: usize = 12;

/// Redacted secret wrapper for id tokens, response JWTs, and similar bearer material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Consumes the wrapper and returns the inner value.
	pub fn into_inner(self) -> String {
		self.0
	}

	/// Short base64url SHA-256 prefix that correlates a JWT across log lines and platform
	/// reports without revealing it.
	pub fn fingerprint(&self) -> String {
		let mut digest = URL_SAFE_NO_PAD.encode(Sha256::digest(self.0.as_bytes()));

		digest.truncate(FINGERPRINT_LEN);

		digest
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("eyJhbGciOiJSUzI1NiJ9.e30.sig");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "eyJhbGciOiJSUzI1NiJ9.e30.sig");
	}

	#[test]
	fn fingerprint_is_stable_and_opaque() {
		let jwt = "eyJhbGciOiJSUzI1NiJ9.eyJub25jZSI6Im4xIn0.c2ln";
		let fingerprint = Secret::new(jwt).fingerprint();

		assert_eq!(fingerprint.len(), FINGERPRINT_LEN);
		assert_eq!(fingerprint, Secret::new(jwt).fingerprint());
		assert_ne!(fingerprint, Secret::new(format!("{jwt}x")).fingerprint());
		assert!(!jwt.contains(&fingerprint));
		assert!(fingerprint.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
	}
}
