//! Tool signing keys.
//!
//! [`ToolKeySource`] is the key-management boundary: the flows only ever ask it to sign a
//! claim set or to publish its public keyset, so the private key can live in an HSM or a
//! secrets service. [`RsaToolKey`] is the in-process implementation for PEM material supplied
//! at runtime.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::{
	RsaPrivateKey,
	pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey},
	pkcs8::DecodePrivateKey,
	traits::PublicKeyParts,
};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	error::SigningError,
	jwks::{Jwk, JwkSet},
	secret::Secret,
};

/// Signs outbound Tool tokens and publishes the matching verification keys.
pub trait ToolKeySource
where
	Self: Send + Sync,
{
	/// Key id stamped into the `kid` header of every signed token.
	fn kid(&self) -> &str;

	/// Signs `claims` with RS256 and returns the compact JWT.
	fn sign(&self, claims: &serde_json::Value) -> Result<Secret, SigningError>;

	/// Public keyset platforms use to verify Tool tokens.
	fn public_jwks(&self) -> JwkSet;
}

/// RSA private key held in process memory.
#[derive(Clone)]
pub struct RsaToolKey {
	kid: String,
	encoding_key: EncodingKey,
	modulus: String,
	exponent: String,
}
impl RsaToolKey {
	/// Parses a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM document.
	///
	/// The key id defaults to the RFC 7638 thumbprint of the public key.
	pub fn from_pem(pem: &str) -> Result<Self, SigningError> {
		let private = RsaPrivateKey::from_pkcs8_pem(pem)
			.or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
			.map_err(|e| SigningError::InvalidKey { reason: e.to_string() })?;
		let der = private
			.to_pkcs1_der()
			.map_err(|e| SigningError::InvalidKey { reason: e.to_string() })?;
		let modulus = URL_SAFE_NO_PAD.encode(private.n().to_bytes_be());
		let exponent = URL_SAFE_NO_PAD.encode(private.e().to_bytes_be());

		Ok(Self {
			kid: thumbprint(&modulus, &exponent),
			encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
			modulus,
			exponent,
		})
	}

	/// Overrides the key id (for platforms that registered the key under a fixed name).
	pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
		self.kid = kid.into();

		self
	}

	/// Public half of the key as a JWK.
	pub fn public_jwk(&self) -> Jwk {
		Jwk {
			kty: "RSA".into(),
			key_use: Some("sig".into()),
			alg: Some("RS256".into()),
			kid: Some(self.kid.clone()),
			n: Some(self.modulus.clone()),
			e: Some(self.exponent.clone()),
		}
	}
}
impl ToolKeySource for RsaToolKey {
	fn kid(&self) -> &str {
		&self.kid
	}

	fn sign(&self, claims: &serde_json::Value) -> Result<Secret, SigningError> {
		let mut header = Header::new(Algorithm::RS256);

		header.kid = Some(self.kid.clone());

		Ok(Secret::new(jsonwebtoken::encode(&header, claims, &self.encoding_key)?))
	}

	fn public_jwks(&self) -> JwkSet {
		JwkSet { keys: vec![self.public_jwk()] }
	}
}
impl Debug for RsaToolKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RsaToolKey")
			.field("kid", &self.kid)
			.field("private_key", &"<redacted>")
			.finish()
	}
}

/// RFC 7638 thumbprint of an RSA public key; members in lexicographic order.
fn thumbprint(modulus: &str, exponent: &str) -> String {
	let input = format!(r#"{{"e":"{exponent}","kty":"RSA","n":"{modulus}"}}"#);

	URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}
