//! Shared helpers for protocol steps (form decoding, the framework-agnostic reply).

// self
use crate::{_prelude::*, claims::DeepLinkingSettings, error::FailureKind};

/// Framework-agnostic answer the HTTP layer renders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolReply {
	/// `302 Found` to `location`.
	Redirect {
		/// Absolute redirect target.
		location: Url,
	},
	/// Hand the user to the content-selection UI.
	SelectContent {
		/// Opaque state the UI must post back to `return_deep_link`.
		selection_state: String,
		/// Platform constraints the UI should respect.
		settings: DeepLinkingSettings,
	},
	/// Non-redirecting error response.
	Deny {
		/// HTTP status (400 for protocol failures, 500 for infrastructure failures).
		status: u16,
		/// Specific failure, for logs only.
		kind: FailureKind,
		/// Generic message safe to show the end-user.
		message: &'static str,
	},
}
impl ProtocolReply {
	/// Builds the denial for `error`.
	pub fn deny(error: &Error) -> Self {
		Self::Deny { status: error.http_status(), kind: error.kind(), message: error.public_message() }
	}

	/// Returns true for denials.
	pub fn is_denied(&self) -> bool {
		matches!(self, Self::Deny { .. })
	}
}

/// Decoded `application/x-www-form-urlencoded` body; the first occurrence of a name wins.
#[derive(Clone, Debug, Default)]
pub struct FormFields(HashMap<String, String>);
impl FormFields {
	/// Parses a urlencoded body.
	pub fn parse(body: &str) -> Self {
		let mut fields = HashMap::new();

		for (name, value) in url::form_urlencoded::parse(body.as_bytes()) {
			fields.entry(name.into_owned()).or_insert_with(|| value.into_owned());
		}

		Self(fields)
	}

	/// Returns the field verbatim unless it is absent or blank.
	///
	/// Values are opaque to the Tool (hints are echoed back to the platform byte for byte), so
	/// whitespace only decides emptiness and is never stripped.
	pub fn optional(&self, name: &str) -> Option<String> {
		self.0.get(name).filter(|value| !value.trim().is_empty()).cloned()
	}

	/// Returns the field or an [`Error::InvalidRequest`] naming it.
	pub fn required(&self, name: &str) -> Result<String> {
		self.optional(name)
			.ok_or_else(|| Error::InvalidRequest { reason: format!("missing `{name}`") })
	}

	/// Parses a required absolute URL field.
	pub fn required_url(&self, name: &str) -> Result<Url> {
		let value = self.required(name)?;

		Url::parse(&value)
			.map_err(|e| Error::InvalidRequest { reason: format!("`{name}` is not a URL: {e}") })
	}
}
