//! Third-party login initiation and the OIDC authentication request.

// self
use crate::{
	_prelude::*,
	flows::{FormFields, LtiTool, ProtocolReply, observe},
	http::JwksHttpClient,
	issuer::IssuerRecord,
	obs::{ProtocolStep, StepSpan},
	session::{SessionContext, SessionDraft, SessionHandle},
};

/// Login initiation posted by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginInitiation {
	/// Platform issuer.
	pub iss: String,
	/// Opaque user hint, echoed to the authorization endpoint.
	pub login_hint: String,
	/// Launch URL the platform will post the id token to.
	pub target_link_uri: Url,
	/// Opaque message hint, echoed when present.
	pub lti_message_hint: Option<String>,
}
impl LoginInitiation {
	/// Decodes the urlencoded login initiation body.
	pub fn from_form(body: &str) -> Result<Self> {
		let form = FormFields::parse(body);

		Ok(Self {
			iss: form.required("iss")?,
			login_hint: form.required("login_hint")?,
			target_link_uri: form.required_url("target_link_uri")?,
			lti_message_hint: form.optional("lti_message_hint"),
		})
	}
}

/// Outbound authentication request produced by [`LtiTool::login`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRequest {
	/// Authorization endpoint with the encoded OIDC parameters.
	pub redirect: Url,
	/// State bound to the login session.
	pub state: String,
	/// When the login session stops being accepted.
	pub expires_at: OffsetDateTime,
}

impl<C> LtiTool<C>
where
	C: ?Sized + JwksHttpClient,
{
	/// Opens a login session for a registered issuer and builds the redirect to its
	/// authorization endpoint.
	pub async fn login(&self, initiation: LoginInitiation) -> Result<AuthRequest> {
		let span = StepSpan::new(ProtocolStep::Login, "login");

		observe(ProtocolStep::Login, span.instrument(self.login_inner(initiation))).await
	}

	/// Form-level entry point: decodes the body, runs [`Self::login`], and renders the reply.
	pub async fn handle_login(&self, body: &str) -> ProtocolReply {
		let result = match LoginInitiation::from_form(body) {
			Ok(initiation) => self.login(initiation).await,
			Err(e) => observe(ProtocolStep::Login, async move { Err(e) }).await,
		};

		match result {
			Ok(request) => ProtocolReply::Redirect { location: request.redirect },
			Err(e) => ProtocolReply::deny(&e),
		}
	}

	async fn login_inner(&self, initiation: LoginInitiation) -> Result<AuthRequest> {
		let record = self.bounded_registry(self.registry.lookup(&initiation.iss)).await?;
		let draft = SessionDraft {
			issuer: record.issuer_url.clone(),
			audience: record.client_id.clone(),
			context: SessionContext::Login {
				target_link_uri: initiation.target_link_uri.clone(),
				login_hint: initiation.login_hint.clone(),
				lti_message_hint: initiation.lti_message_hint.clone(),
			},
			ttl: self.config.login_ttl,
		};
		let handle =
			self.bounded_store(self.sessions.create(draft, OffsetDateTime::now_utc())).await?;

		Ok(AuthRequest {
			redirect: auth_redirect(&record, &initiation, &handle),
			state: handle.state,
			expires_at: handle.expires_at,
		})
	}
}

/// Appends the authentication request parameters to the issuer's authorization endpoint.
fn auth_redirect(record: &IssuerRecord, initiation: &LoginInitiation, handle: &SessionHandle) -> Url {
	let mut redirect = record.auth_url.clone();

	{
		let mut query = redirect.query_pairs_mut();

		query
			.append_pair("client_id", &record.client_id)
			.append_pair("response_type", "id_token")
			.append_pair("scope", "openid")
			.append_pair("prompt", "none")
			.append_pair("response_mode", "form_post")
			.append_pair("redirect_uri", initiation.target_link_uri.as_str())
			.append_pair("login_hint", &initiation.login_hint)
			.append_pair("state", &handle.state)
			.append_pair("nonce", &handle.nonce);

		if let Some(hint) = initiation.lti_message_hint.as_deref() {
			query.append_pair("lti_message_hint", hint).append_pair("id_token_hint", hint);
		}
	}

	redirect
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn login_form_requires_issuer_hint_and_target() {
		let initiation = LoginInitiation::from_form(
			"iss=https%3A%2F%2Fplatform.example&login_hint=u1&target_link_uri=https%3A%2F%2Ftool.example%2Flaunch&lti_message_hint=m1",
		)
		.expect("Complete login form should decode.");

		assert_eq!(initiation.iss, "https://platform.example");
		assert_eq!(initiation.lti_message_hint.as_deref(), Some("m1"));

		let err = LoginInitiation::from_form("iss=https%3A%2F%2Fplatform.example&login_hint=u1")
			.expect_err("A form without target_link_uri must be rejected.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	#[test]
	fn auth_redirect_preserves_existing_query_and_omits_absent_hint() {
		let record = IssuerRecord::builder("https://platform.example")
			.client_id("abc")
			.auth_url(
				Url::parse("https://platform.example/auth?tenant=7").expect("Auth URL parses."),
			)
			.jwks_url(Url::parse("https://platform.example/jwks").expect("JWKS URL parses."))
			.build()
			.expect("Issuer fixture should build.");
		let initiation = LoginInitiation {
			iss: record.issuer_url.clone(),
			login_hint: "u1".into(),
			target_link_uri: Url::parse("https://tool.example/launch").expect("Target parses."),
			lti_message_hint: None,
		};
		let handle = SessionHandle {
			state: "s1".into(),
			nonce: "n1".into(),
			expires_at: OffsetDateTime::UNIX_EPOCH,
		};
		let redirect = auth_redirect(&record, &initiation, &handle);
		let query = redirect.query().expect("Redirect should carry a query.");

		assert!(query.starts_with("tenant=7&client_id=abc&response_type=id_token&scope=openid&prompt=none"));
		assert!(query.contains("redirect_uri=https%3A%2F%2Ftool.example%2Flaunch"));
		assert!(query.contains("state=s1&nonce=n1"));
		assert!(!query.contains("id_token_hint"));
	}
}
