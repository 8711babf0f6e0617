//! Tool-level error types shared across flows, registries, key resolution, and stores.
//!
//! Every protocol failure is terminal for the flow that produced it. Callers deny the
//! request, log [`Error::kind`], and show [`Error::public_message`] to the end-user.

// self
use crate::_prelude::*;

/// Tool-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session storage failure (backend or timeout).
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::session::StoreError,
	),
	/// Issuer registry backend failure.
	#[error("{0}")]
	Registry(#[source] crate::issuer::RegistryError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The Tool could not sign an outbound token.
	#[error(transparent)]
	Signing(#[from] SigningError),

	/// The issuer is not registered with this Tool.
	#[error("Issuer `{issuer}` is not registered.")]
	UnknownIssuer {
		/// Issuer URL supplied by the request or token.
		issuer: String,
	},
	/// The token header declares an algorithm other than RS256.
	#[error("Token algorithm `{alg}` is not accepted.")]
	UnsupportedAlgorithm {
		/// Algorithm name found in the header.
		alg: String,
	},
	/// No platform key matches the token's key id, even after refetching the JWKS.
	#[error("No signing key `{kid}` is published by `{issuer}`.")]
	KeyNotFound {
		/// Issuer whose keyset was searched.
		issuer: String,
		/// Key identifier from the token header.
		kid: String,
	},
	/// The token signature does not verify against the resolved key.
	#[error("Token signature is invalid.")]
	SignatureInvalid,
	/// The token could not be decoded or lacks a required claim.
	#[error("Token is malformed: {reason}.")]
	MalformedToken {
		/// What was wrong with the token.
		reason: String,
	},
	/// The token is outside its `exp`/`nbf` validity window.
	#[error("Token is expired or not yet valid.")]
	TokenExpired,
	/// The nonce does not belong to any live login session.
	#[error("Nonce is unknown, expired, or already used.")]
	NonceUnknownOrReused,
	/// The returned `state` does not match the session bound to the nonce.
	#[error("Returned state does not match the login session.")]
	StateMismatch,
	/// The token audience does not name this Tool's client id.
	#[error("Token audience does not match the client id.")]
	AudienceMismatch,
	/// The token issuer differs from the issuer the session was opened for.
	#[error("Token issuer `{actual}` does not match `{expected}`.")]
	IssuerMismatch {
		/// Issuer recorded in the session.
		expected: String,
		/// Issuer claimed by the token.
		actual: String,
	},
	/// The deployment id is not allowed for the issuer.
	#[error("Deployment `{deployment_id}` is not registered for the issuer.")]
	UnknownDeployment {
		/// Deployment id claimed by the token.
		deployment_id: String,
	},
	/// A deep-linking endpoint received a non deep-linking launch.
	#[error("Launch is not a deep linking request.")]
	NotDeepLinkingLaunch,
	/// The content-selection session is unknown, expired, or already finalized.
	#[error("Content selection session is expired or already used.")]
	SelectionSessionExpired,
	/// The chosen items violate the platform's deep linking settings.
	#[error("Content selection is invalid: {reason}.")]
	InvalidSelection {
		/// Which setting was violated.
		reason: String,
	},
	/// A protocol form is missing a field or carries an unparseable value.
	#[error("Request is invalid: {reason}.")]
	InvalidRequest {
		/// Which field was rejected.
		reason: String,
	},
	/// The platform posted an `error` instead of a token.
	#[error("Platform reported an error: {error}.")]
	PlatformReportedError {
		/// OAuth/OIDC error code.
		error: String,
		/// Optional human-readable description.
		description: Option<String>,
	},
}
impl Error {
	/// Returns the stable failure tag used for logs and metrics.
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::Storage(_) => FailureKind::Storage,
			Self::Registry(_) => FailureKind::Registry,
			Self::Config(_) => FailureKind::Config,
			Self::Signing(_) => FailureKind::Signing,
			Self::UnknownIssuer { .. } => FailureKind::UnknownIssuer,
			Self::UnsupportedAlgorithm { .. } => FailureKind::UnsupportedAlgorithm,
			Self::KeyNotFound { .. } => FailureKind::KeyNotFound,
			Self::SignatureInvalid => FailureKind::SignatureInvalid,
			Self::MalformedToken { .. } => FailureKind::MalformedToken,
			Self::TokenExpired => FailureKind::TokenExpired,
			Self::NonceUnknownOrReused => FailureKind::NonceUnknownOrReused,
			Self::StateMismatch => FailureKind::StateMismatch,
			Self::AudienceMismatch => FailureKind::AudienceMismatch,
			Self::IssuerMismatch { .. } => FailureKind::IssuerMismatch,
			Self::UnknownDeployment { .. } => FailureKind::UnknownDeployment,
			Self::NotDeepLinkingLaunch => FailureKind::NotDeepLinkingLaunch,
			Self::SelectionSessionExpired => FailureKind::SelectionSessionExpired,
			Self::InvalidSelection { .. } => FailureKind::InvalidSelection,
			Self::InvalidRequest { .. } => FailureKind::InvalidRequest,
			Self::PlatformReportedError { .. } => FailureKind::PlatformReportedError,
		}
	}

	/// Returns true when the failure originates from the Tool's own infrastructure rather
	/// than from the request.
	pub fn is_internal(&self) -> bool {
		matches!(self, Self::Storage(_) | Self::Registry(_) | Self::Config(_) | Self::Signing(_))
	}

	/// HTTP status the HTTP layer should answer with.
	pub fn http_status(&self) -> u16 {
		if self.is_internal() { 500 } else { 400 }
	}

	/// Generic end-user message; never reveals which check failed.
	pub fn public_message(&self) -> &'static str {
		match self {
			Self::PlatformReportedError { .. } =>
				"The learning platform could not complete the launch.",
			Self::SelectionSessionExpired =>
				"The content selection has expired. Please start again from your course.",
			_ if self.is_internal() => "The tool is temporarily unavailable.",
			_ => "The launch could not be verified.",
		}
	}
}
impl From<crate::issuer::RegistryError> for Error {
	fn from(e: crate::issuer::RegistryError) -> Self {
		match e {
			crate::issuer::RegistryError::NotFound { issuer } => Self::UnknownIssuer { issuer },
			other => Self::Registry(other),
		}
	}
}

/// Stable failure tags attached to denials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// Session store failure.
	Storage,
	/// Issuer registry failure.
	Registry,
	/// Configuration failure.
	Config,
	/// Signing failure.
	Signing,
	/// See [`Error::UnknownIssuer`].
	UnknownIssuer,
	/// See [`Error::UnsupportedAlgorithm`].
	UnsupportedAlgorithm,
	/// See [`Error::KeyNotFound`].
	KeyNotFound,
	/// See [`Error::SignatureInvalid`].
	SignatureInvalid,
	/// See [`Error::MalformedToken`].
	MalformedToken,
	/// See [`Error::TokenExpired`].
	TokenExpired,
	/// See [`Error::NonceUnknownOrReused`].
	NonceUnknownOrReused,
	/// See [`Error::StateMismatch`].
	StateMismatch,
	/// See [`Error::AudienceMismatch`].
	AudienceMismatch,
	/// See [`Error::IssuerMismatch`].
	IssuerMismatch,
	/// See [`Error::UnknownDeployment`].
	UnknownDeployment,
	/// See [`Error::NotDeepLinkingLaunch`].
	NotDeepLinkingLaunch,
	/// See [`Error::SelectionSessionExpired`].
	SelectionSessionExpired,
	/// See [`Error::InvalidSelection`].
	InvalidSelection,
	/// See [`Error::InvalidRequest`].
	InvalidRequest,
	/// See [`Error::PlatformReportedError`].
	PlatformReportedError,
}
impl FailureKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Storage => "storage",
			Self::Registry => "registry",
			Self::Config => "config",
			Self::Signing => "signing",
			Self::UnknownIssuer => "unknown_issuer",
			Self::UnsupportedAlgorithm => "unsupported_algorithm",
			Self::KeyNotFound => "key_not_found",
			Self::SignatureInvalid => "signature_invalid",
			Self::MalformedToken => "malformed_token",
			Self::TokenExpired => "token_expired",
			Self::NonceUnknownOrReused => "nonce_unknown_or_reused",
			Self::StateMismatch => "state_mismatch",
			Self::AudienceMismatch => "audience_mismatch",
			Self::IssuerMismatch => "issuer_mismatch",
			Self::UnknownDeployment => "unknown_deployment",
			Self::NotDeepLinkingLaunch => "not_deep_linking_launch",
			Self::SelectionSessionExpired => "selection_session_expired",
			Self::InvalidSelection => "invalid_selection",
			Self::InvalidRequest => "invalid_request",
			Self::PlatformReportedError => "platform_reported_error",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while assembling the Tool.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL must use HTTPS.
	#[error("The {field} URL must use HTTPS: {url}.")]
	InsecureUrl {
		/// Which setting held the URL.
		field: &'static str,
		/// Offending URL.
		url: String,
	},
	/// A duration setting is out of range.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Which setting was rejected.
		field: &'static str,
	},
	/// The JWKS policy is inconsistent.
	#[error("JWKS policy is invalid: {reason}.")]
	InvalidJwksPolicy {
		/// Which invariant was violated.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised by the Tool's key-management boundary.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// The private key material could not be parsed.
	#[error("Tool private key is invalid: {reason}.")]
	InvalidKey {
		/// Parser diagnostic.
		reason: String,
	},
	/// The claim set could not be serialized.
	#[error("Failed to serialize token claims.")]
	Claims(#[from] serde_json::Error),
	/// The JWT encoder rejected the claims or key.
	#[error("Failed to sign token.")]
	Encode(#[from] jsonwebtoken::errors::Error),
}

/// Transport-level failures while fetching a platform keyset.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while fetching the keyset.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The keyset endpoint answered with a non-success status.
	#[error("Keyset endpoint returned HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// The attempt exceeded its deadline.
	#[error("Keyset request timed out.")]
	Timeout,
	/// The keyset body was not a valid JWKS document.
	#[error("Keyset response is not a valid JWKS document.")]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			return Self::Timeout;
		}

		Self::network(e)
	}
}
