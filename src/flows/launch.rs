//! Launch verification (platform id token) and routing.
//!
//! Verification is a straight pipeline that stops at the first failing check:
//!
//! 1. A posted `error` short-circuits with [`Error::PlatformReportedError`].
//! 2. The header must declare `RS256` and carry a `kid`.
//! 3. The (still unverified) `iss` selects the registered issuer; nothing else from the token
//!    is trusted before the signature checks out.
//! 4. The key resolved from that issuer's keyset must verify the signature, and `exp`/`nbf`
//!    must hold within the configured leeway.
//! 5. The nonce must consume a live login session.
//! 6. Audience, issuer, and deployment must match that session and its issuer record.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	claims::{IdTokenClaims, LTI_VERSION, VerifiedLaunchClaims},
	flows::{FormFields, LtiTool, ProtocolReply, SelectionHandle, observe},
	http::JwksHttpClient,
	obs::{self, ProtocolStep, StepSpan},
	secret::Secret,
	session::{FlowSession, SessionContext, SessionKind},
};

/// Form posted by the platform to the launch endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchRequest {
	/// Signed platform id token.
	pub id_token: Option<Secret>,
	/// State echoed from the authentication request.
	pub state: Option<String>,
	/// OAuth/OIDC error code, posted instead of a token on failure.
	pub error: Option<String>,
	/// Human-readable companion of `error`.
	pub error_description: Option<String>,
}
impl LaunchRequest {
	/// Wraps a bare id token.
	pub fn from_id_token(id_token: impl Into<String>) -> Self {
		Self { id_token: Some(Secret::new(id_token)), ..Default::default() }
	}

	/// Echoes `state` so it is checked against the session consumed by nonce.
	pub fn with_state(mut self, state: impl Into<String>) -> Self {
		self.state = Some(state.into());

		self
	}

	/// Decodes the urlencoded launch body. Missing fields are reported by verification.
	pub fn from_form(body: &str) -> Self {
		let form = FormFields::parse(body);

		Self {
			id_token: form.optional("id_token").map(Secret::new),
			state: form.optional("state"),
			error: form.optional("error"),
			error_description: form.optional("error_description"),
		}
	}
}

/// Where a verified launch goes next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchOutcome {
	/// Resource launch: redirect into the application.
	Redirect {
		/// Application entry point.
		location: Url,
		/// Verified launch claims.
		claims: Box<VerifiedLaunchClaims>,
	},
	/// Deep linking launch: a content-selection session was opened.
	SelectContent {
		/// Selection session for the UI.
		selection: SelectionHandle,
		/// Verified launch claims.
		claims: Box<VerifiedLaunchClaims>,
	},
}
impl From<LaunchOutcome> for ProtocolReply {
	fn from(outcome: LaunchOutcome) -> Self {
		match outcome {
			LaunchOutcome::Redirect { location, .. } => Self::Redirect { location },
			LaunchOutcome::SelectContent { selection, .. } => selection.into(),
		}
	}
}

#[derive(Deserialize)]
struct RawHeader {
	alg: String,
	#[serde(default)]
	kid: Option<String>,
}

#[derive(Deserialize)]
struct UnverifiedIssuer {
	iss: String,
}

impl<C> LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Verifies the launch and routes it: deep linking requests open a content-selection
	/// session, every other message redirects to the application entry point.
	pub async fn launch(&self, request: LaunchRequest) -> Result<LaunchOutcome> {
		let span = StepSpan::new(ProtocolStep::Launch, "launch");

		observe(
			ProtocolStep::Launch,
			span.instrument(async move {
				let claims = self.verify_launch_at(request, OffsetDateTime::now_utc()).await?;

				if claims.is_deep_linking() {
					let selection = self.begin_selection(&claims).await?;

					Ok(LaunchOutcome::SelectContent { selection, claims: Box::new(claims) })
				} else {
					Ok(LaunchOutcome::Redirect {
						location: self.config.app_entry_url.clone(),
						claims: Box::new(claims),
					})
				}
			}),
		)
		.await
	}

	/// Form-level entry point for the launch endpoint.
	pub async fn handle_launch(&self, body: &str) -> ProtocolReply {
		match self.launch(LaunchRequest::from_form(body)).await {
			Ok(outcome) => outcome.into(),
			Err(e) => ProtocolReply::deny(&e),
		}
	}

	/// Runs the full verification pipeline and consumes the login session on success.
	pub async fn verify_launch(&self, request: LaunchRequest) -> Result<VerifiedLaunchClaims> {
		self.verify_launch_at(request, OffsetDateTime::now_utc()).await
	}

	pub(crate) async fn verify_launch_at(
		&self,
		request: LaunchRequest,
		now: OffsetDateTime,
	) -> Result<VerifiedLaunchClaims> {
		if let Some(error) = request.error {
			return Err(Error::PlatformReportedError {
				error,
				description: request.error_description,
			});
		}

		let token = request.id_token.ok_or_else(|| malformed("missing id_token"))?;
		let raw = token.expose();
		let header = peek_header(raw)?;

		if header.alg != "RS256" {
			return Err(Error::UnsupportedAlgorithm { alg: header.alg });
		}

		let kid = header.kid.ok_or_else(|| malformed("missing kid header"))?;
		let issuer = peek_issuer(raw)?;
		let record = self.bounded_registry(self.registry.lookup(&issuer)).await?;
		let key = self.keys.resolve(&record, &kid, now).await?;
		let mut validation = Validation::new(Algorithm::RS256);

		// `exp` stays required; its value is judged below against `now`, not the wall clock.
		validation.validate_aud = false;
		validation.validate_exp = false;
		validation.validate_nbf = false;

		let verified = jsonwebtoken::decode::<serde_json::Value>(raw, &key, &validation)
			.map_err(map_decode_error)?;
		let claims: IdTokenClaims = serde_path_to_error::deserialize(verified.claims)
			.map_err(|e| malformed(format!("claim {e}")))?;

		check_validity_window(&claims, now, self.config.clock_leeway)?;

		let session = match self
			.bounded_store(self.sessions.consume_by_nonce(SessionKind::Login, &claims.nonce, now))
			.await
		{
			Ok(session) => session,
			Err(e) if e.is_missing() => {
				obs::log_session_lookup(ProtocolStep::Launch, SessionKind::Login, &e);

				return Err(Error::NonceUnknownOrReused);
			},
			Err(e) => return Err(e.into()),
		};

		if request.state.as_deref().is_some_and(|state| state != session.state) {
			return Err(Error::StateMismatch);
		}

		check_audience(&claims, &session, &record.client_id)?;

		if claims.iss != session.issuer {
			return Err(Error::IssuerMismatch { expected: session.issuer, actual: claims.iss });
		}
		if !record.accepts_deployment(&claims.deployment_id) {
			return Err(Error::UnknownDeployment { deployment_id: claims.deployment_id });
		}
		if claims.version != LTI_VERSION {
			return Err(malformed(format!("unsupported LTI version `{}`", claims.version)));
		}

		let SessionContext::Login { target_link_uri, .. } = session.context else {
			return Err(Error::NonceUnknownOrReused);
		};
		let verified = VerifiedLaunchClaims::from_verified(claims, session.audience, target_link_uri);

		if verified.is_deep_linking() && verified.deep_linking_settings.is_none() {
			return Err(malformed("deep linking request without settings"));
		}

		Ok(verified)
	}
}

fn malformed(reason: impl Into<String>) -> Error {
	Error::MalformedToken { reason: reason.into() }
}

fn segments(raw: &str) -> Result<[&str; 3]> {
	let mut parts = raw.split('.');

	match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(header), Some(payload), Some(signature), None) => Ok([header, payload, signature]),
		_ => Err(malformed("expected three segments")),
	}
}

fn decode_segment<T>(segment: &str, what: &str) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let bytes = URL_SAFE_NO_PAD
		.decode(segment)
		.map_err(|_| malformed(format!("{what} is not base64url")))?;

	serde_json::from_slice(&bytes).map_err(|e| malformed(format!("{what}: {e}")))
}

/// Reads the header without trusting it; `alg: none` must surface as an algorithm failure.
fn peek_header(raw: &str) -> Result<RawHeader> {
	let [header, ..] = segments(raw)?;

	decode_segment(header, "header")
}

fn peek_issuer(raw: &str) -> Result<String> {
	let [_, payload, _] = segments(raw)?;

	decode_segment::<UnverifiedIssuer>(payload, "payload").map(|claims| claims.iss)
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> Error {
	match e.kind() {
		ErrorKind::InvalidSignature => Error::SignatureInvalid,
		ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => Error::TokenExpired,
		ErrorKind::InvalidAlgorithm => Error::UnsupportedAlgorithm { alg: "unknown".into() },
		_ => malformed(e.to_string()),
	}
}

/// `exp` and `nbf` against `now`, each widened by `leeway`.
fn check_validity_window(claims: &IdTokenClaims, now: OffsetDateTime, leeway: Duration) -> Result<()> {
	let now = now.unix_timestamp();
	let leeway = leeway.whole_seconds();

	if claims.exp.saturating_add(leeway) < now {
		return Err(Error::TokenExpired);
	}
	if claims.nbf.is_some_and(|nbf| nbf.saturating_sub(leeway) > now) {
		return Err(Error::TokenExpired);
	}

	Ok(())
}

/// `aud` must name the client id; with several audiences `azp` must name it too.
fn check_audience(claims: &IdTokenClaims, session: &FlowSession, client_id: &str) -> Result<()> {
	let expected = session.audience.as_str();
	let azp_ok = match claims.azp.as_deref() {
		Some(azp) => azp == expected,
		None => claims.aud.len() == 1,
	};

	if expected != client_id || !claims.aud.contains(expected) || !azp_ok {
		return Err(Error::AudienceMismatch);
	}

	Ok(())
}
