//! Unguessable state and nonce values.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

const TOKEN_BYTES: usize = 32;

/// Returns 32 bytes from the thread-local CSPRNG, base64url encoded (43 characters).
pub fn random_token() -> String {
	let mut bytes = [0_u8; TOKEN_BYTES];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}
